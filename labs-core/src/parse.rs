//! Quy tắc đọc ngày và giá trị số dùng chung.

use chrono::NaiveDate;

/// Đọc ngày theo kiểu ngày trước (`25/11/2025`, `25-11-25`, `25.11.2025`).
/// Chấp nhận cả ISO `2025-11-25`; phần giờ phía sau bị bỏ qua.
pub fn parse_exam_date(text: &str) -> Option<NaiveDate> {
    let token = text.split_whitespace().next()?;
    let token = token.split('T').next()?;
    let separator = token.chars().find(|c| matches!(c, '/' | '-' | '.'))?;
    let parts: Vec<&str> = token.split(separator).collect();
    if parts.len() != 3 || parts.iter().any(|part| part.is_empty()) {
        return None;
    }

    let format = if parts[0].len() == 4 {
        format!("%Y{separator}%m{separator}%d")
    } else if parts[2].len() == 2 {
        format!("%d{separator}%m{separator}%y")
    } else if parts[2].len() == 4 {
        format!("%d{separator}%m{separator}%Y")
    } else {
        return None;
    };

    NaiveDate::parse_from_str(token, &format).ok()
}

/// Lấy số đầu tiên trong chuỗi giá trị có nhiễu.
///
/// `"$78,6~ng/mL$"` cho `78.6`; `"1.234,5"` và `"1,234.5"` cho `1234.5`.
/// Nếu chỉ có một dấu phân cách thì đó là dấu thập phân.
pub fn coerce_numeric(text: &str) -> Option<f64> {
    let chars: Vec<char> = text.chars().collect();
    let first_digit = chars.iter().position(|c| c.is_ascii_digit())?;
    let start = leading_mark(&chars, first_digit);
    let end = chars[start..]
        .iter()
        .position(|c| !(c.is_ascii_digit() || *c == '.' || *c == ','))
        .map_or(chars.len(), |offset| start + offset);

    let digits: String = chars[start..end].iter().collect();
    let digits = digits.trim_end_matches(|c: char| c == '.' || c == ',');
    let negative = start > 0
        && chars[start - 1] == '-'
        && (start < 2 || !chars[start - 2].is_alphanumeric());

    let mut resolved = resolve_separators(digits);
    if resolved.starts_with('.') {
        resolved.insert(0, '0');
    }
    let number = resolved.parse::<f64>().ok()?;
    let number = if negative { -number } else { number };
    number.is_finite().then_some(number)
}

/// Lùi về dấu thập phân đứng ngay trước chữ số đầu (`.5`, `-,5`).
fn leading_mark(chars: &[char], first_digit: usize) -> usize {
    let Some(mark) = first_digit.checked_sub(1) else {
        return first_digit;
    };
    let detached = mark == 0 || !chars[mark - 1].is_alphanumeric();
    if matches!(chars[mark], '.' | ',') && detached {
        mark
    } else {
        first_digit
    }
}

fn resolve_separators(digits: &str) -> String {
    match (digits.rfind('.'), digits.rfind(',')) {
        (Some(dot), Some(comma)) => {
            let (decimal, thousands) = if dot > comma { ('.', ',') } else { (',', '.') };
            digits
                .chars()
                .filter(|c| *c != thousands)
                .map(|c| if c == decimal { '.' } else { c })
                .collect()
        }
        (None, Some(_)) if digits.matches(',').count() == 1 => digits.replace(',', "."),
        (None, Some(_)) => digits.replace(',', ""),
        (Some(_), None) if digits.matches('.').count() > 1 => digits.replace('.', ""),
        _ => digits.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn noisy_values_coerce() {
        assert_eq!(coerce_numeric("78,6 ng/mL"), Some(78.6));
        assert_eq!(coerce_numeric("$78,6~ng/mL$"), Some(78.6));
        assert_eq!(coerce_numeric("< 0,5"), Some(0.5));
        assert_eq!(coerce_numeric("R$ 12"), Some(12.0));
        assert_eq!(coerce_numeric("1.234,5"), Some(1234.5));
        assert_eq!(coerce_numeric("1,234.5"), Some(1234.5));
        assert_eq!(coerce_numeric("250.000.000"), Some(250_000_000.0));
        assert_eq!(coerce_numeric("4,5 milhões/mm³"), Some(4.5));
        assert_eq!(coerce_numeric("-2,1 mmol/L"), Some(-2.1));
        assert_eq!(coerce_numeric("92."), Some(92.0));
        assert_eq!(coerce_numeric("92"), Some(92.0));
        assert_eq!(coerce_numeric(".5 mg/dL"), Some(0.5));
        assert_eq!(coerce_numeric("-.5"), Some(-0.5));
        assert_eq!(coerce_numeric("< ,25"), Some(0.25));
        assert_eq!(coerce_numeric("B12.300"), Some(12.3));
    }

    #[test]
    fn non_numeric_values_are_none() {
        assert_eq!(coerce_numeric("Negativo"), None);
        assert_eq!(coerce_numeric("Não reagente"), None);
        assert_eq!(coerce_numeric(""), None);
    }

    #[test]
    fn dates_are_day_first() {
        assert_eq!(parse_exam_date("25/11/2025"), Some(date(2025, 11, 25)));
        assert_eq!(parse_exam_date("05/03/2025"), Some(date(2025, 3, 5)));
        assert_eq!(parse_exam_date("05-03-25"), Some(date(2025, 3, 5)));
        assert_eq!(parse_exam_date("05.03.2025 08:30"), Some(date(2025, 3, 5)));
        assert_eq!(parse_exam_date("2025-03-05"), Some(date(2025, 3, 5)));
        assert_eq!(parse_exam_date("2025-03-05T08:30:00"), Some(date(2025, 3, 5)));
    }

    #[test]
    fn bad_dates_are_none() {
        assert_eq!(parse_exam_date("31/02/2025"), None);
        assert_eq!(parse_exam_date("13/25/2025"), None);
        assert_eq!(parse_exam_date("março de 2025"), None);
        assert_eq!(parse_exam_date("25/11"), None);
        assert_eq!(parse_exam_date("1/1/202"), None);
    }
}
