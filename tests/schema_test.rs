use chrono::{Local, TimeZone};
use ims_forms::config::ImsConfig;
use ims_forms::error::ConfigError;
use ims_forms::records::{self, Record, SheetData, pad_row, tally_signatures};
use ims_forms::schema::{FormCatalog, FormSchema, FormSubmission};
use ims_forms::reconcile::map_submission;
use std::fs;
use std::time::Duration;
use tempfile::tempdir;

const FORMS_JSON: &str = r#"{
    "LW4 01A": {
        "title": "Receipt inspection",
        "fields": ["Date", "Item", "Qty"],
        "signatures": ["Signed by SSE", "Signed by Controlling Officer"]
    },
    "LW4 02B": {
        "title": "Stores issue",
        "fields": ["Date", "Issued To"]
    }
}"#;

// Helper function to turn literals into a row of cells
fn row(cells: &[&str]) -> Vec<String> {
    cells.iter().map(|s| s.to_string()).collect()
}

// Helper function to build a record from header/value pairs
fn record(pairs: &[(&str, &str)]) -> Record {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[test]
fn test_catalog_loads_in_id_order() {
    let catalog = FormCatalog::from_json_str(FORMS_JSON).unwrap();
    assert_eq!(catalog.len(), 2);
    assert_eq!(catalog.ids().collect::<Vec<_>>(), vec!["LW4 01A", "LW4 02B"]);

    let receipt = catalog.get("LW4 01A").unwrap();
    assert_eq!(
        receipt.expected_headers(),
        row(&["Date", "Item", "Qty", "Signed by SSE", "Signed by Controlling Officer"])
    );
    // Signatures are optional in the document
    assert!(catalog.get("LW4 02B").unwrap().signatures.is_empty());
    assert!(!catalog.contains("LW4 99Z"));
}

#[test]
fn test_catalog_rejects_bad_forms() {
    let blank_title = r#"{"F1": {"title": "  ", "fields": ["Date"]}}"#;
    assert!(matches!(
        FormCatalog::from_json_str(blank_title),
        Err(ConfigError::InvalidForm { ref form, .. }) if form == "F1"
    ));

    let blank_field = r#"{"F1": {"title": "T", "fields": ["Date", " "]}}"#;
    assert!(FormCatalog::from_json_str(blank_field).is_err());

    let same_column = r#"{"F1": {"title": "T", "fields": ["Date"], "signatures": ["DATE "]}}"#;
    let err = FormCatalog::from_json_str(same_column).unwrap_err();
    assert!(err.to_string().contains("name the same column"), "{}", err);

    assert!(matches!(
        FormCatalog::from_json_str("{not json"),
        Err(ConfigError::Json { .. })
    ));
}

#[test]
fn test_submission_values() {
    let ts = Local.with_ymd_and_hms(2025, 8, 5, 9, 30, 0).unwrap();
    let values = FormSubmission::new()
        .field("Date", "2025-08-05")
        .sign("Signed by SSE", true)
        .sign("Signed by Controlling Officer", false)
        .submitted_by("stores")
        .at(ts)
        .into_values();

    assert_eq!(values["Signed by SSE"], "✔️ Yes");
    assert_eq!(values["Signed by Controlling Officer"], "❌ No");
    assert_eq!(values["Timestamp"], "2025-08-05 09:30:00");
    assert_eq!(values["Submitted By"], "stores");

    // Columns the sheet lacks are dropped, columns it has are filled
    let sheet = row(&["Timestamp", "Date", "Signed by SSE"]);
    assert_eq!(
        map_submission(&values, &sheet),
        row(&["2025-08-05 09:30:00", "2025-08-05", "✔️ Yes"])
    );
}

#[test]
fn test_prefill_from_record() {
    let schema = FormSchema::new("Receipt", ["Date", "Item"], ["Signed by SSE", "Signed by QA"]);
    let existing = record(&[
        ("Date", "2025-08-05"),
        ("ITEM ", "Bolt"),
        ("Signed by SSE", "✔️ Yes"),
        ("Signed by QA", "❌ No"),
    ]);

    let prefilled = schema.prefill(&existing);
    assert_eq!(prefilled.fields["Date"], "2025-08-05");
    assert_eq!(prefilled.fields["Item"], "Bolt");
    assert_eq!(prefilled.signatures["Signed by SSE"], true);
    assert_eq!(prefilled.signatures["Signed by QA"], false);
}

#[test]
fn test_pad_row_never_truncates() {
    assert_eq!(pad_row(&row(&["a"]), 3), row(&["a", "", ""]));
    assert_eq!(pad_row(&row(&["a", "b", "c"]), 2), row(&["a", "b", "c"]));
    assert_eq!(pad_row(&[], 0), Vec::<String>::new());
}

#[test]
fn test_search_and_tally() {
    let data = SheetData::from_values(&[
        row(&["Date", "Item", "Signed by SSE"]),
        row(&["2025-08-01", "Washer", "✔️ Yes"]),
        row(&["2025-08-02", "Hex BOLT", "❌ No"]),
        row(&["2025-08-03", "Bolt", "Yes"]),
        row(&["2025-08-04", "Nut"]),
    ]);

    let hits = records::search(&data.records, "bolt");
    assert_eq!(hits.iter().map(|h| h.row).collect::<Vec<_>>(), vec![3, 4]);
    assert_eq!(records::search(&data.records, "  ").len(), 4);
    assert!(records::search(&data.records, "gasket").is_empty());

    let tally = tally_signatures(&data.records, "Signed by SSE");
    assert_eq!(tally.signed, 2);
    assert_eq!(tally.not_signed, 1);
    assert_eq!(tally.total, 4);
}

#[test]
fn test_config_defaults_and_overrides() {
    let config = ImsConfig::default();
    assert_eq!(config.sheet_types.len(), 2);
    assert_eq!(config.sheet_type("M&PR FILES").unwrap().store_id, "mpr-files");
    assert_eq!(config.sheet_type("lw-files").unwrap().name, "LW FILES");
    assert!(matches!(
        config.sheet_type("XYZ"),
        Err(ConfigError::UnknownSheetType(_))
    ));

    let partial = ImsConfig::from_json_str(r#"{"cache": {"read_ttl_secs": 30}, "quota": {"max_calls_per_minute": 10}}"#)
        .unwrap();
    let settings = partial.access_settings();
    assert_eq!(settings.read_ttl, Duration::from_secs(30));
    assert_eq!(settings.list_ttl, Duration::from_secs(600));
    assert_eq!(settings.max_calls_per_minute, 10);
    assert_eq!(settings.min_interval, Duration::from_secs(1));
    assert_eq!(settings.retry.max_attempts, 5);
    assert_eq!(settings.retry.base_delay, Duration::from_millis(750));
}

#[test]
fn test_config_resolves_paths_next_to_file() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("lw.json"), FORMS_JSON).unwrap();
    let config_path = dir.path().join("ims.json");
    fs::write(
        &config_path,
        r#"{"sheet_types": [{"name": "LW FILES", "store_id": "lw-files", "forms": "lw.json"}]}"#,
    )
    .unwrap();

    let config = ImsConfig::load_or_default(&config_path).unwrap();
    assert_eq!(config.data_dir(), dir.path().join("database"));
    let lw = config.sheet_type("LW FILES").unwrap();
    let forms = config.load_forms(lw).unwrap();
    assert_eq!(forms.len(), 2);

    let missing = ImsConfig::load_or_default(dir.path().join("absent.json")).unwrap();
    assert_eq!(missing, ImsConfig::default());
}

#[test]
fn test_omitted_signers_are_marked_not_signed() {
    let schema = FormSchema::new("Receipt", ["Date", "Item"], ["Signed by SSE", "Signed by CSO"]);
    let mut submission = FormSubmission::new()
        .field("Date", "2025-08-05")
        .field("Item", "Bolt")
        .sign("signed by cso", true);
    schema.complete(&mut submission);

    // The signer given under another spelling keeps its state
    assert_eq!(submission.signatures.len(), 2);
    assert_eq!(submission.signatures["Signed by SSE"], false);

    let sheet = row(&["Date", "Item", "Signed by SSE", "Signed by CSO"]);
    assert_eq!(
        map_submission(&submission.into_values(), &sheet),
        row(&["2025-08-05", "Bolt", "❌ No", "✔️ Yes"])
    );
}
