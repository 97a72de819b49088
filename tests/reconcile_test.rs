use ims_forms::reconcile::{build_mapping, diff, diff_headers, map_submission};
use ims_forms::schema::FormSchema;
use std::collections::HashMap;

// Helper function to build owned header rows from literals
fn headers(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

// Helper function to build a submission map
fn values(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn date_item_schema() -> FormSchema {
    FormSchema::new("Daily issue", ["Date", "Item"], ["Signed by SSE"])
}

#[test]
fn test_identical_headers_are_clean() {
    let report = diff(&date_item_schema(), &headers(&["Date", "Item", "Signed by SSE"]));
    assert!(report.missing.is_empty());
    assert!(report.extra.is_empty());
    assert!(report.order_matches);
    assert!(report.is_clean());
    assert!(report.notes.is_empty());
}

#[test]
fn test_cosmetic_differences_are_not_drift() {
    let report = diff(
        &date_item_schema(),
        &headers(&[" DATE", "item ", "Signed  By  SSE"]),
    );
    assert!(report.is_clean(), "unexpected drift: {:?}", report);
    assert_eq!(report.near_matches.len(), 3);
    assert_eq!(report.notes.len(), 3);
}

#[test]
fn test_missing_and_extra() {
    let report = diff(&date_item_schema(), &headers(&["Date", "Quantity", "Signed by SSE"]));
    assert_eq!(report.missing, vec!["Item".to_string()]);
    assert_eq!(report.extra, vec!["Quantity".to_string()]);
    assert!(!report.order_matches);
    assert!(!report.is_clean());
    assert!(!report.is_permutation());
}

#[test]
fn test_permutations_only_affect_order() {
    let expected = ["Date", "Item", "Qty", "Signed by SSE"];
    let permutations: [[&str; 4]; 4] = [
        ["Date", "Item", "Qty", "Signed by SSE"],
        ["Item", "Date", "Qty", "Signed by SSE"],
        ["Signed by SSE", "Qty", "Item", "Date"],
        ["Qty", "Date", "Signed by SSE", "Item"],
    ];
    for perm in permutations {
        let report = diff_headers(&expected, &perm);
        assert!(report.missing.is_empty(), "missing for {:?}", perm);
        assert!(report.extra.is_empty(), "extra for {:?}", perm);
        assert_eq!(report.order_matches, perm == expected, "order flag for {:?}", perm);
        assert_eq!(report.is_permutation(), perm != expected);
    }
}

#[test]
fn test_blank_headers_are_ignored() {
    let report = diff(&date_item_schema(), &headers(&["Date", "", "Item", "  ", "Signed by SSE", ""]));
    assert!(report.extra.is_empty());
    assert!(report.order_matches);
    assert!(report.is_clean());
}

#[test]
fn test_collisions_keep_first_header() {
    let mapping = build_mapping(&headers(&["Remarks", "REMARKS ", "Date"]), &["Remarks"]);
    assert_eq!(mapping.get("remarks"), Some("Remarks"));
    assert_eq!(mapping.collisions.len(), 1);
    assert_eq!(mapping.collisions[0].kept, "Remarks");
    assert_eq!(mapping.collisions[0].shadowed, "REMARKS ");
    assert!(mapping.notes.iter().any(|n| n.contains("shadowed")));

    let dupes = build_mapping(&headers(&["Date", "Date"]), &["Date"]);
    assert_eq!(dupes.collisions.len(), 1);
    assert!(dupes.notes[0].contains("duplicate header 'Date'"));
}

#[test]
fn test_map_submission_follows_sheet_order() {
    let submitted = values(&[("Date", "2025-08-05"), ("Item", "Bolt"), ("Signed by SSE", "✔️ Yes")]);
    let sheet = headers(&["Signed by SSE", "Date", "Item"]);
    assert_eq!(
        map_submission(&submitted, &sheet),
        vec!["✔️ Yes", "2025-08-05", "Bolt"]
    );
}

#[test]
fn test_map_submission_length_always_matches_headers() {
    let submitted = values(&[("Date", "2025-08-05"), ("Unknown", "x")]);
    for sheet in [
        headers(&[]),
        headers(&["Date"]),
        headers(&["Remarks", "", "Date", "Qty", "Other"]),
    ] {
        let row = map_submission(&submitted, &sheet);
        assert_eq!(row.len(), sheet.len(), "row {:?} vs headers {:?}", row, sheet);
    }

    let row = map_submission(&submitted, &headers(&["Remarks", "", "Date"]));
    assert_eq!(row, vec!["", "", "2025-08-05"]);
}

#[test]
fn test_map_submission_exact_beats_normalized() {
    let submitted = values(&[("date", "normalized"), ("Date", "exact")]);
    assert_eq!(map_submission(&submitted, &headers(&["Date"])), vec!["exact"]);
    assert_eq!(map_submission(&submitted, &headers(&["date"])), vec!["normalized"]);
    // No exact key: the lowest raw key among normalized matches wins
    assert_eq!(map_submission(&submitted, &headers(&["DATE "])), vec!["exact"]);
}

#[test]
fn test_renamed_signature_column() {
    // The sheet was renamed on the spreadsheet side but not in the config
    let schema = FormSchema::new(
        "Material receipt",
        ["Date", "Item"],
        ["Signed by Officer"],
    );
    let sheet = headers(&["Date", "Item", "Signed by Controlling Officer"]);

    let report = diff(&schema, &sheet);
    assert_eq!(report.missing, vec!["Signed by Officer".to_string()]);
    assert_eq!(report.extra, vec!["Signed by Controlling Officer".to_string()]);

    let submitted = values(&[("Date", "2025-08-05"), ("Item", "Gasket"), ("Signed by Officer", "✔️ Yes")]);
    let row = map_submission(&submitted, &sheet);
    assert_eq!(row, vec!["2025-08-05", "Gasket", ""]);
}
