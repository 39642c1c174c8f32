//! End-to-end orchestrator behavior: resolution, SQL generation, partial
//! failure, normalization, stats, and CSV output - driven through a fake
//! [`DataSource`].

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use studybridge::catalog::{
    CatalogError, ColumnDescriptor, StudyCatalog, StudyEntry, StudyMetadata, TableDescriptor,
};
use studybridge::config::ServerConfig;
use studybridge::extraction::{
    DataSource, ExtractionEngine, ExtractionError, SourceError, TableSelection,
};
use studybridge::resolver::LiveColumn;
use studybridge::server::csv_output;
use studybridge::sql_builder::FilterValue;

/// In-memory stand-in for the database: canned columns and rows per table,
/// optional per-table failures, and a log of every executed statement.
#[derive(Default)]
struct FakeSource {
    columns: HashMap<String, Vec<LiveColumn>>,
    rows: HashMap<String, Vec<Map<String, Value>>>,
    failing_tables: Vec<String>,
    executed: Mutex<Vec<String>>,
}

impl FakeSource {
    fn with_table(
        mut self,
        table: &str,
        columns: &[(&str, &str)],
        rows: Vec<Map<String, Value>>,
    ) -> Self {
        self.columns.insert(
            table.to_string(),
            columns
                .iter()
                .map(|(n, t)| LiveColumn::new(*n, *t))
                .collect(),
        );
        self.rows.insert(table.to_string(), rows);
        self
    }

    fn failing(mut self, table: &str) -> Self {
        self.failing_tables.push(table.to_string());
        self
    }

    fn executed_sql(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }
}

#[async_trait]
impl DataSource for FakeSource {
    async fn list_columns(
        &self,
        _schema: &str,
        table: &str,
    ) -> Result<Vec<LiveColumn>, SourceError> {
        if self.failing_tables.iter().any(|t| t == table) {
            return Err(SourceError::Introspection(format!(
                "relation {table} is broken"
            )));
        }
        self.columns
            .get(table)
            .cloned()
            .ok_or_else(|| SourceError::Introspection(format!("unknown relation {table}")))
    }

    async fn fetch_rows(&self, sql: &str) -> Result<Vec<Map<String, Value>>, SourceError> {
        self.executed.lock().unwrap().push(sql.to_string());
        let table = self
            .rows
            .keys()
            .find(|t| sql.contains(&format!("\"{t}\"")))
            .ok_or_else(|| SourceError::Query(format!("no fixture for: {sql}")))?;
        Ok(self.rows[table].clone())
    }
}

fn row(pairs: &[(&str, Value)]) -> Map<String, Value> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

fn table(name: &str, columns: &[(&str, &str)]) -> TableDescriptor {
    TableDescriptor {
        name: name.to_string(),
        description: String::new(),
        schema: "_prod_thesaurus_face_bp".to_string(),
        columns: columns
            .iter()
            .map(|(n, t)| ColumnDescriptor {
                name: n.to_string(),
                data_type: t.to_string(),
                description: None,
            })
            .collect(),
        aliases: BTreeMap::new(),
    }
}

fn fixture_catalog() -> Arc<StudyCatalog> {
    Arc::new(StudyCatalog::from_entries(vec![StudyEntry {
        study_id: "face_bp".to_string(),
        title: "FACE Bipolar".to_string(),
        description: String::new(),
        schema: "_prod_thesaurus_face_bp".to_string(),
        metadata: StudyMetadata::default(),
        last_updated: None,
        tables: vec![
            table(
                "patients",
                &[("usubjid", "text"), ("age", "integer"), ("sex", "text")],
            ),
            table("visits", &[("usubjid", "text"), ("visit_date", "date")]),
        ],
    }]))
}

fn engine(source: Arc<FakeSource>) -> ExtractionEngine {
    ExtractionEngine::new(fixture_catalog(), source, &ServerConfig::default())
}

fn selection(table: &str, variables: &[&str]) -> TableSelection {
    TableSelection {
        table: table.to_string(),
        variables: variables.iter().map(|s| s.to_string()).collect(),
        filters: BTreeMap::new(),
    }
}

fn patients_source() -> FakeSource {
    FakeSource::default().with_table(
        "patients",
        &[("usubjid_v2", "text"), ("age", "integer"), ("sex", "text")],
        vec![
            row(&[
                ("usubjid_v2", json!("P001")),
                ("age", json!(34)),
                ("sex", json!("F")),
            ]),
            row(&[
                ("usubjid_v2", json!("P002")),
                ("age", json!(58)),
                ("sex", json!("M")),
            ]),
        ],
    )
}

#[tokio::test]
async fn resolves_drifted_names_and_nulls_unmatched_ones() {
    let source = Arc::new(patients_source());
    let engine = engine(source.clone());

    let selections = vec![selection("patients", &["usubjid", "age", "not_a_column"])];
    let outcome = engine
        .extract("face_bp", &selections, None)
        .await
        .expect("request is valid");

    assert_eq!(outcome.stats.tables_processed, 1);
    assert_eq!(outcome.stats.tables_skipped, 0);
    assert_eq!(outcome.stats.rows_extracted, 2);
    assert_eq!(outcome.records.len(), 2);

    let first = &outcome.records[0];
    assert_eq!(first.table_name, "patients");
    // `usubjid` resolved to the drifted live column and came back under
    // the requested name
    assert_eq!(first.data.get("usubjid"), Some(&json!("P001")));
    assert_eq!(first.data.get("age"), Some(&json!(34)));
    // The unresolvable column degrades to an explicit null
    assert_eq!(first.data.get("not_a_column"), Some(&Value::Null));
}

#[tokio::test]
async fn unknown_table_is_skipped_not_fatal() {
    let source = Arc::new(patients_source());
    let engine = engine(source.clone());

    let selections = vec![
        selection("patients", &["usubjid"]),
        selection("no_such_table", &["usubjid"]),
    ];
    let outcome = engine.extract("face_bp", &selections, None).await.unwrap();

    assert_eq!(outcome.stats.tables_processed, 1);
    assert_eq!(outcome.stats.tables_skipped, 1);
    // The unknown table contributed no records at all
    assert!(outcome.records.iter().all(|r| r.table_name == "patients"));
}

#[tokio::test]
async fn failing_table_yields_placeholder_and_processing_continues() {
    let source = Arc::new(
        patients_source()
            .with_table("visits", &[("usubjid", "text")], vec![])
            .failing("visits"),
    );
    let engine = engine(source.clone());

    let selections = vec![
        selection("visits", &["usubjid", "visit_date"]),
        selection("patients", &["usubjid"]),
    ];
    let outcome = engine.extract("face_bp", &selections, None).await.unwrap();

    assert_eq!(outcome.stats.tables_processed, 1);
    assert_eq!(outcome.stats.tables_skipped, 1);

    // The broken table left one all-null placeholder in the caller's shape
    let placeholder = outcome
        .records
        .iter()
        .find(|r| r.table_name == "visits")
        .expect("placeholder for the failed table");
    assert_eq!(placeholder.data.get("usubjid"), Some(&Value::Null));
    assert_eq!(placeholder.data.get("visit_date"), Some(&Value::Null));

    // Placeholders are not extracted rows
    assert_eq!(outcome.stats.rows_extracted, 2);
}

#[tokio::test]
async fn unknown_study_is_a_request_level_error() {
    let engine = engine(Arc::new(patients_source()));
    let err = engine
        .extract("nope", &[selection("patients", &["usubjid"])], None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ExtractionError::Catalog(CatalogError::StudyNotFound { .. })
    ));
}

#[tokio::test]
async fn empty_selection_list_is_a_request_shape_error() {
    let engine = engine(Arc::new(patients_source()));
    let err = engine.extract("face_bp", &[], None).await.unwrap_err();
    assert!(matches!(err, ExtractionError::RequestShape(_)));
}

#[tokio::test]
async fn filters_are_resolved_typed_and_dropped_when_unmatched() {
    let source = Arc::new(patients_source());
    let engine = engine(source.clone());

    let mut filters = BTreeMap::new();
    filters.insert("age".to_string(), FilterValue::from_json(json!({"gt": 30})));
    filters.insert(
        "status".to_string(),
        FilterValue::from_json(json!({"in": ["a", "b"]})),
    );
    filters.insert(
        "ghost_column_xyz".to_string(),
        FilterValue::from_json(json!("x")),
    );

    let selections = vec![TableSelection {
        table: "patients".to_string(),
        variables: vec!["usubjid".to_string()],
        filters,
    }];
    let outcome = engine.extract("face_bp", &selections, Some(100)).await.unwrap();
    assert_eq!(outcome.stats.tables_processed, 1);

    let sql = source.executed_sql().pop().unwrap();
    assert!(sql.contains("\"age\" > 30"), "unexpected SQL: {sql}");
    // `status` fuzzy-misses every live column and the filter is dropped
    assert!(!sql.contains("ghost_column_xyz"), "unexpected SQL: {sql}");
    assert!(sql.ends_with("LIMIT 100"), "unexpected SQL: {sql}");
}

#[tokio::test]
async fn requested_limit_is_clamped_to_the_ceiling() {
    let source = Arc::new(patients_source());
    let engine = engine(source.clone());

    engine
        .extract(
            "face_bp",
            &[selection("patients", &["usubjid"])],
            Some(999_999),
        )
        .await
        .unwrap();

    let sql = source.executed_sql().pop().unwrap();
    assert!(sql.ends_with("LIMIT 10000"), "unexpected SQL: {sql}");
}

#[tokio::test]
async fn identical_requests_are_idempotent() {
    let source = Arc::new(patients_source());
    let engine = engine(source.clone());
    let selections = vec![selection("patients", &["usubjid", "age"])];

    let first = engine.extract("face_bp", &selections, None).await.unwrap();
    let second = engine.extract("face_bp", &selections, None).await.unwrap();

    assert_eq!(first.stats, second.stats);
    let sql = source.executed_sql();
    assert_eq!(sql[0], sql[1], "resolved column sets must be stable");
}

#[tokio::test]
async fn csv_roundtrip_matches_reported_stats() {
    let source = Arc::new(patients_source());
    let engine = engine(source.clone());

    let outcome = engine
        .extract(
            "face_bp",
            &[selection("patients", &["usubjid", "age"])],
            None,
        )
        .await
        .unwrap();

    let payload = csv_output::render_csv(&outcome).unwrap();
    let mut reader = csv::Reader::from_reader(payload.body.as_bytes());
    let headers: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
    assert_eq!(headers, vec!["patients.usubjid", "patients.age"]);

    let rows: Vec<_> = reader.records().collect::<Result<_, _>>().unwrap();
    assert_eq!(rows.len() as u64, outcome.stats.rows_extracted);
}

#[tokio::test]
async fn all_invalid_tables_still_yield_a_parseable_csv() {
    let source = Arc::new(patients_source());
    let engine = engine(source.clone());

    let outcome = engine
        .extract(
            "face_bp",
            &[selection("ghost_a", &["x"]), selection("ghost_b", &["y"])],
            None,
        )
        .await
        .unwrap();
    assert_eq!(outcome.stats.tables_skipped, 2);
    assert!(outcome.records.is_empty());

    let payload = csv_output::render_csv(&outcome).unwrap();
    let mut reader = csv::Reader::from_reader(payload.body.as_bytes());
    let rows: Vec<_> = reader.records().collect::<Result<_, _>>().unwrap();
    assert_eq!(rows.len(), 1, "diagnostic row must be present");
    assert_eq!(&rows[0][1], "0");
    assert_eq!(&rows[0][2], "2");
}
