use std::collections::HashMap;
use std::path::PathBuf;

use snapfix_dataset::{parse_file, Dataset, FieldValue, Record};
use snapfix_recon::model::{ActualValue, MissingReason, RecordFailure};
use snapfix_recon::{render, Differ, DiffReport};

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn load(name: &str) -> Dataset {
    let path = fixtures_dir().join(name);
    parse_file(&path).unwrap_or_else(|e| panic!("cannot parse {}: {e}", path.display()))
}

fn row(pairs: &[(&str, Option<&str>)]) -> Record {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.map(str::to_string)))
        .collect()
}

fn run(dataset: &Dataset, table: &str, rows: Vec<Record>) -> DiffReport {
    let actual = HashMap::from([(table.to_string(), rows)]);
    Differ::default().reconcile_dataset(dataset, &actual)
}

// -------------------------------------------------------------------------
// End-to-end scenarios
// -------------------------------------------------------------------------

#[test]
fn identical_record_has_no_mismatches() {
    let ds = load("pages.csv");
    let report = run(&ds, "pages", vec![row(&[("uid", Some("1")), ("title", Some("Home"))])]);
    assert!(report.is_clean());
    assert_eq!(report.summary().matched, 1);
}

#[test]
fn changed_title_is_one_field_mismatch() {
    let ds = load("pages.csv");
    let report = run(&ds, "pages", vec![row(&[("uid", Some("1")), ("title", Some("Start"))])]);

    let pages = report.table("pages").unwrap();
    assert_eq!(pages.failures.len(), 1);
    match &pages.failures[0] {
        RecordFailure::Mismatch { key, fields, .. } => {
            assert_eq!(key, "1");
            assert_eq!(fields.len(), 1);
            assert_eq!(fields[0].field, "title");
            assert_eq!(fields[0].expected, FieldValue::Literal("Home".into()));
            assert_eq!(fields[0].actual, ActualValue::Value("Start".into()));
        }
        other => panic!("expected a field mismatch, got {other:?}"),
    }

    let text = render(&report);
    assert!(text.contains("Record uid=1: fields differ"));
    assert!(text.contains("title | Home     | Start"), "{text}");
}

#[test]
fn absent_record_is_missing() {
    let ds = load("pages-two.csv");
    let report = run(
        &ds,
        "pages",
        vec![row(&[("uid", Some("1")), ("pid", Some("0")), ("title", Some("Home"))])],
    );

    let pages = report.table("pages").unwrap();
    assert_eq!(pages.failures.len(), 1);
    assert!(matches!(
        &pages.failures[0],
        RecordFailure::Missing { key: Some(k), reason: MissingReason::NotFound, .. } if k == "2"
    ));
    assert!(render(&report).contains("Record uid=2: not found"));
}

#[test]
fn extra_record_is_unexpected() {
    let ds = load("pages.csv");
    let report = run(
        &ds,
        "pages",
        vec![
            row(&[("uid", Some("1")), ("title", Some("Home"))]),
            row(&[("uid", Some("3")), ("title", Some("Imprint"))]),
        ],
    );

    let pages = report.table("pages").unwrap();
    assert_eq!(pages.failures.len(), 1);
    assert!(matches!(
        &pages.failures[0],
        RecordFailure::Unexpected { key: Some(k), .. } if k == "3"
    ));
    assert!(render(&report).contains("Unexpected record uid=3"));
}

#[test]
fn wildcard_field_accepts_any_value() {
    let ds = load("pages-wildcard.csv");
    for note in [Some("anything"), Some(""), None] {
        let report = run(
            &ds,
            "pages",
            vec![row(&[("uid", Some("1")), ("title", Some("Home")), ("note", note)])],
        );
        assert!(report.is_clean(), "note = {note:?}");
    }
    let report = run(&ds, "pages", vec![row(&[("uid", Some("1")), ("title", Some("Home"))])]);
    assert!(report.is_clean(), "absent wildcard field");
}

// -------------------------------------------------------------------------
// Properties
// -------------------------------------------------------------------------

#[test]
fn no_actual_record_is_consumed_twice() {
    let ds = load("site.csv");
    let log = ds.table("sys_log").unwrap();
    let actual: Vec<Record> = (0..4)
        .map(|i| {
            row(&[
                ("action", Some("1")),
                ("details", Some("Record was inserted")),
                ("tstamp", Some(&*format!("{}", 1000 + i))),
            ])
        })
        .collect();

    let diff = Differ::default().reconcile(log, &actual);
    assert!(diff.matched.len() <= log.records.len().min(actual.len()));
    let mut seen: Vec<usize> = diff.matched.iter().map(|m| m.actual_index).collect();
    seen.sort_unstable();
    seen.dedup();
    assert_eq!(seen.len(), diff.matched.len());
    // action=2 has no candidate; three inserted rows are left over.
    assert_eq!(diff.missing(), 1);
    assert_eq!(diff.unexpected(), 3);
}

#[test]
fn key_hit_with_differing_field_is_never_missing() {
    let ds = load("pages-two.csv");
    let report = run(
        &ds,
        "pages",
        vec![
            row(&[("uid", Some("1")), ("pid", Some("0")), ("title", Some("Home"))]),
            row(&[("uid", Some("2")), ("pid", Some("7")), ("title", Some("About"))]),
        ],
    );
    let summary = report.summary();
    assert_eq!(summary.missing, 0);
    assert_eq!(summary.mismatched, 1);
    assert_eq!(summary.unexpected, 0);
}

// -------------------------------------------------------------------------
// Multi-table aggregation
// -------------------------------------------------------------------------

fn site_actual() -> HashMap<String, Vec<Record>> {
    let flexform = "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n\
<T3FlexForms><data><sheet index=\"sDEF\">\
<field index=\"layout\">grid</field></sheet></data></T3FlexForms>";
    HashMap::from([
        (
            "pages".to_string(),
            vec![
                row(&[("uid", Some("2")), ("pid", Some("1")), ("title", Some("About")), ("deleted", Some("0"))]),
                row(&[("uid", Some("1")), ("pid", Some("0")), ("title", Some("Home")), ("deleted", Some("0"))]),
            ],
        ),
        (
            "tt_content".to_string(),
            vec![row(&[
                ("hash", Some("c1a7")),
                ("pid", Some("2")),
                ("header", Some("Team")),
                ("pi_flexform", Some(flexform)),
            ])],
        ),
        (
            "sys_log".to_string(),
            vec![
                row(&[("action", Some("2")), ("details", Some("Record was updated")), ("tstamp", Some("1700000001"))]),
                row(&[("action", Some("1")), ("details", Some("Record was inserted")), ("tstamp", Some("1700000000"))]),
            ],
        ),
    ])
}

#[test]
fn site_fixture_matches_out_of_order_rows() {
    let ds = load("site.csv");
    let report = Differ::default().reconcile_dataset(&ds, &site_actual());
    assert!(report.is_clean(), "{}", render(&report));
    assert_eq!(report.summary().matched, 5);
}

#[test]
fn failures_in_every_table_are_reported_together() {
    let ds = load("site.csv");
    let mut actual = site_actual();
    actual.get_mut("pages").unwrap()[0].insert("title".into(), Some("Team".into()));
    actual.get_mut("tt_content").unwrap()[0].insert(
        "pi_flexform".into(),
        Some("<?xml version=\"1.0\"?><T3FlexForms><data/></T3FlexForms>".into()),
    );
    actual.get_mut("sys_log").unwrap().pop();

    let report = Differ::default().reconcile_dataset(&ds, &actual);
    let summary = report.summary();
    assert_eq!(summary.failing_tables, 3);
    assert_eq!(summary.mismatched, 2);
    assert_eq!(summary.missing, 1);

    let text = render(&report);
    assert!(text.contains("Table \"pages\""));
    assert!(text.contains("Table \"tt_content\""));
    assert!(text.contains("Table \"sys_log\""));
    assert!(text.contains("Diff for hash=c1a7 field \"pi_flexform\":"));
}

#[test]
fn report_serializes_to_json() {
    let ds = load("pages.csv");
    let report = run(&ds, "pages", vec![row(&[("uid", Some("1")), ("title", Some("Start"))])]);
    let json = serde_json::to_value(&report).unwrap();
    let failure = &json["tables"][0]["failures"][0];
    assert_eq!(failure["kind"], "mismatch");
    assert_eq!(failure["fields"][0]["expected"]["value"], "Home");
    assert_eq!(json["tables"][0]["strategy"], "by_id");
}
