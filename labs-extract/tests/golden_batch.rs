use std::fs;
use std::path::Path;

use labs_core::LabsConfig;
use labs_extract::{normalize_response, Extractor, SidecarExtractor};
use serde_json::Value;

fn fixture_path(name: &str) -> String {
    format!("{}/tests/data/{name}", env!("CARGO_MANIFEST_DIR"))
}

#[test]
fn lab_report_matches_golden() {
    let document = fixture_path("laudo_2025_11.pdf");
    let response = SidecarExtractor::default()
        .extract(Path::new(&document))
        .expect("saved response is missing");

    let canon = LabsConfig::default().canon_table();
    let batch = normalize_response(&response, &document, &canon).expect("batch is empty");

    let actual = serde_json::to_value(&batch).expect("cannot serialize batch");
    let expected: Value = serde_json::from_str(
        &fs::read_to_string(fixture_path("laudo_2025_11_batch.json"))
            .expect("cannot read golden batch"),
    )
    .expect("golden batch is not JSON");

    assert_eq!(actual, expected);
}

#[test]
fn fenced_response_gives_the_same_batch() {
    let response =
        fs::read_to_string(fixture_path("laudo_2025_11.json")).expect("cannot read response");
    let fenced = format!("```json\n{response}\n```");
    let canon = LabsConfig::default().canon_table();

    let plain = normalize_response(&response, "laudo_2025_11.pdf", &canon).unwrap();
    let wrapped = normalize_response(&fenced, "laudo_2025_11.pdf", &canon).unwrap();

    assert_eq!(plain, wrapped);
    assert_eq!(plain.plottable_count(), 4);
}
