//! Bảng chuẩn hoá tên xét nghiệm và nhóm xét nghiệm.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

/// Một nhóm nhãn đồng nghĩa quy về một nhãn chuẩn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SynonymEntry {
    pub canonical: String,
    #[serde(default)]
    pub variants: Vec<String>,
}

/// Phần `[canon]` trong file cấu hình, bổ sung lên bảng dựng sẵn.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct CanonSpec {
    pub stopwords: Vec<String>,
    pub exam: Vec<SynonymEntry>,
    pub category: Vec<SynonymEntry>,
}

/// Bảng tra nhãn chuẩn. Khoá tra cứu bỏ qua hoa thường, dấu, từ nối và thứ tự từ.
#[derive(Debug, Clone, Default)]
pub struct CanonTable {
    stopwords: HashSet<String>,
    exams: HashMap<String, String>,
    categories: HashMap<String, String>,
}

impl CanonTable {
    /// Bảng rỗng: chỉ gọn khoảng trắng, không gộp nhãn.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Bảng dựng sẵn cho các xét nghiệm thường gặp.
    pub fn builtin() -> Self {
        Self::from_spec(&CanonSpec::default())
    }

    /// Bảng dựng sẵn cộng thêm các mục trong `spec`; mục của `spec` được ưu tiên.
    pub fn from_spec(spec: &CanonSpec) -> Self {
        let mut table = Self::empty();
        table.stopwords = BUILTIN_STOPWORDS
            .iter()
            .map(|word| fold_token(word))
            .chain(spec.stopwords.iter().map(|word| fold_token(word)))
            .collect();

        for (canonical, variants) in BUILTIN_EXAMS {
            table.insert_exam(canonical, variants.iter().copied());
        }
        for (canonical, variants) in BUILTIN_CATEGORIES {
            table.insert_category(canonical, variants.iter().copied());
        }
        for entry in &spec.exam {
            table.insert_exam(&entry.canonical, entry.variants.iter().map(String::as_str));
        }
        for entry in &spec.category {
            table.insert_category(&entry.canonical, entry.variants.iter().map(String::as_str));
        }
        table
    }

    pub fn insert_exam<'a>(&mut self, canonical: &str, variants: impl IntoIterator<Item = &'a str>) {
        let canonical = collapse_whitespace(canonical);
        let keys = self.keys_for(&canonical, variants);
        insert_synonyms(&mut self.exams, keys, &canonical);
    }

    pub fn insert_category<'a>(
        &mut self,
        canonical: &str,
        variants: impl IntoIterator<Item = &'a str>,
    ) {
        let canonical = collapse_whitespace(canonical);
        let keys = self.keys_for(&canonical, variants);
        insert_synonyms(&mut self.categories, keys, &canonical);
    }

    /// Nhãn chuẩn của một tên xét nghiệm. Nhãn lạ chỉ được gọn khoảng trắng.
    pub fn canonical_exam(&self, label: &str) -> String {
        lookup(&self.exams, &self.stopwords, label)
    }

    pub fn canonical_category(&self, label: &str) -> String {
        lookup(&self.categories, &self.stopwords, label)
    }

    /// Khoá gom nhóm của một tên xét nghiệm: hai nhãn cùng khoá là cùng một xét nghiệm,
    /// kể cả khi nhãn không có trong bảng.
    pub fn exam_key(&self, label: &str) -> String {
        group_key(&self.canonical_exam(label), &self.stopwords)
    }

    pub fn category_key(&self, label: &str) -> String {
        group_key(&self.canonical_category(label), &self.stopwords)
    }

    #[cfg(test)]
    fn exam_count(&self) -> usize {
        self.exams.values().collect::<HashSet<_>>().len()
    }

    fn keys_for<'a>(
        &self,
        canonical: &str,
        variants: impl IntoIterator<Item = &'a str>,
    ) -> Vec<String> {
        let mut keys = vec![fold_key(canonical, &self.stopwords)];
        keys.extend(
            variants
                .into_iter()
                .map(|label| fold_key(label, &self.stopwords)),
        );
        keys.retain(|key| !key.is_empty());
        keys
    }
}

/// Một khoá bị nhãn chuẩn khác chiếm thì cả nhóm cũ chuyển sang nhãn mới,
/// để nhãn chuẩn luôn tra ra chính nó.
fn insert_synonyms(map: &mut HashMap<String, String>, keys: Vec<String>, canonical: &str) {
    for key in keys {
        let Some(previous) = map.insert(key, canonical.to_string()) else {
            continue;
        };
        if previous != canonical {
            for target in map.values_mut().filter(|target| **target == previous) {
                *target = canonical.to_string();
            }
        }
    }
}

fn group_key(canonical: &str, stopwords: &HashSet<String>) -> String {
    let key = fold_key(canonical, stopwords);
    if key.is_empty() {
        canonical.to_string()
    } else {
        key
    }
}

fn lookup(map: &HashMap<String, String>, stopwords: &HashSet<String>, label: &str) -> String {
    let collapsed = collapse_whitespace(label);
    let key = fold_key(&collapsed, stopwords);
    map.get(&key).cloned().unwrap_or(collapsed)
}

fn collapse_whitespace(label: &str) -> String {
    label.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn fold_key(label: &str, stopwords: &HashSet<String>) -> String {
    let tokens: Vec<String> = label
        .split(|c: char| !c.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(fold_token)
        .collect();

    let mut kept: Vec<String> = tokens
        .iter()
        .filter(|token| !stopwords.contains(*token))
        .cloned()
        .collect();
    // Nhãn toàn từ nối thì giữ nguyên các từ đó.
    if kept.is_empty() {
        kept = tokens;
    }
    kept.sort();
    kept.join(" ")
}

fn fold_token(token: &str) -> String {
    token.chars().flat_map(char::to_lowercase).map(fold_accent).collect()
}

fn fold_accent(c: char) -> char {
    match c {
        'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'ç' => 'c',
        'ñ' => 'n',
        other => other,
    }
}

const BUILTIN_STOPWORDS: [&str; 10] = ["de", "da", "do", "das", "dos", "em", "no", "na", "of", "the"];

const BUILTIN_EXAMS: [(&str, &[&str]); 16] = [
    (
        "Glicose em jejum",
        &["Glicemia de jejum", "Glicemia em jejum", "Glicose basal"],
    ),
    (
        "Hemoglobina glicada",
        &["HbA1c", "Hemoglobina glicosilada", "A1C"],
    ),
    ("Colesterol total", &["Colesterol"]),
    ("Colesterol HDL", &["HDL", "HDL-C"]),
    ("Colesterol LDL", &["LDL", "LDL-C"]),
    ("Triglicerídeos", &["Triglicérides", "Triglicerideos séricos"]),
    ("Hemácias", &["Eritrócitos", "Glóbulos vermelhos"]),
    ("Hemoglobina", &["Hb", "Hgb"]),
    ("Leucócitos", &["Glóbulos brancos", "Leucócitos totais"]),
    ("Plaquetas", &["Contagem de plaquetas", "Plaquetometria"]),
    (
        "Vitamina D",
        &["25-hidroxivitamina D", "25(OH) Vitamina D", "Vitamina D 25-OH"],
    ),
    ("Vitamina B12", &["Cobalamina"]),
    ("TSH", &["Hormônio tireoestimulante", "Tireotrofina"]),
    ("T4 livre", &["Tiroxina livre", "FT4"]),
    ("Creatinina", &["Creatinina sérica"]),
    ("Ferritina", &["Ferritina sérica"]),
];

const BUILTIN_CATEGORIES: [(&str, &[&str]); 5] = [
    ("Hemograma", &["Hemograma completo"]),
    ("Bioquímica", &["Bioquímica sérica"]),
    ("Perfil lipídico", &["Lipidograma"]),
    ("Hormônios", &["Hormonal", "Endocrinologia"]),
    ("Urina", &["Urina tipo 1", "EAS", "Urinálise"]),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_order_and_filler_words_collapse() {
        let table = CanonTable::builtin();
        assert_eq!(
            table.canonical_exam("Glicose Jejum"),
            table.canonical_exam("Glicose em jejum")
        );
        assert_eq!(table.canonical_exam("JEJUM glicose"), "Glicose em jejum");
        assert_eq!(table.canonical_exam("  Glicemia  de jejum "), "Glicose em jejum");
    }

    #[test]
    fn canonical_label_is_a_fixed_point() {
        let table = CanonTable::builtin();
        for (canonical, _) in BUILTIN_EXAMS {
            assert_eq!(table.canonical_exam(canonical), canonical);
        }
        let once = table.canonical_exam("Hemácias");
        assert_eq!(table.canonical_exam(&once), once);
    }

    #[test]
    fn accents_and_case_are_ignored() {
        let table = CanonTable::builtin();
        assert_eq!(table.canonical_exam("HEMACIAS"), "Hemácias");
        assert_eq!(table.canonical_exam("triglicerides"), "Triglicerídeos");
    }

    #[test]
    fn unknown_label_keeps_its_text() {
        let table = CanonTable::builtin();
        assert_eq!(table.canonical_exam("  Ácido   úrico "), "Ácido úrico");
        assert_eq!(table.canonical_exam("Ácido úrico"), "Ácido úrico");
    }

    #[test]
    fn user_entries_extend_and_override() {
        let spec = CanonSpec {
            stopwords: vec!["sérico".to_string()],
            exam: vec![
                SynonymEntry {
                    canonical: "Ácido úrico".to_string(),
                    variants: vec!["Urato".to_string()],
                },
                SynonymEntry {
                    canonical: "HDL".to_string(),
                    variants: vec!["Colesterol HDL".to_string()],
                },
            ],
            category: Vec::new(),
        };
        let table = CanonTable::from_spec(&spec);
        assert_eq!(table.canonical_exam("urato"), "Ácido úrico");
        assert_eq!(table.canonical_exam("Ácido úrico sérico"), "Ácido úrico");
        assert_eq!(table.canonical_exam("colesterol hdl"), "HDL");
        assert_eq!(table.canonical_exam("HDL-C"), "HDL");
    }

    #[test]
    fn canonicalizing_twice_changes_nothing() {
        let spec = CanonSpec {
            exam: vec![
                SynonymEntry {
                    canonical: "HDL".to_string(),
                    variants: vec!["Colesterol HDL".to_string()],
                },
                SynonymEntry {
                    canonical: "Glicose".to_string(),
                    variants: vec!["Glicemia de jejum".to_string()],
                },
            ],
            ..CanonSpec::default()
        };
        let table = CanonTable::from_spec(&spec);
        let labels = [
            "HDL-C",
            "Colesterol HDL",
            "hdl",
            "Glicose em jejum",
            "Glicose basal",
            "Glicemia de jejum",
            "Vitamina D 25-OH",
            "úrico ácido",
        ];
        for label in labels {
            let once = table.canonical_exam(label);
            assert_eq!(table.canonical_exam(&once), once, "label {label}");
        }
        assert_eq!(table.canonical_exam("Glicose basal"), "Glicose");
    }

    #[test]
    fn unknown_labels_share_a_key_across_case_and_order() {
        let table = CanonTable::builtin();
        let key = table.exam_key("Ácido úrico");
        assert_eq!(table.exam_key("ÁCIDO ÚRICO"), key);
        assert_eq!(table.exam_key("úrico ácido"), key);
        assert_eq!(table.exam_key("Acido  urico"), key);
        assert_ne!(table.exam_key("Ácido fólico"), key);
        assert_eq!(
            table.exam_key("Glicemia de jejum"),
            table.exam_key("Glicose em jejum")
        );
        assert_eq!(table.category_key("URINA"), table.category_key("EAS"));
    }

    #[test]
    fn categories_use_their_own_table() {
        let table = CanonTable::builtin();
        assert_eq!(table.canonical_category("lipidograma"), "Perfil lipídico");
        assert_eq!(table.canonical_exam("lipidograma"), "lipidograma");
    }

    #[test]
    fn empty_table_only_trims() {
        let table = CanonTable::empty();
        assert_eq!(table.canonical_exam(" Glicose   Jejum"), "Glicose Jejum");
        assert_eq!(table.exam_count(), 0);
    }
}
