//! CSV rendering for `/extract`.
//!
//! Multiple tables are flattened into one wide sheet. Every column is
//! prefixed with its source table name so two questionnaires that both
//! export `usubjid` never collide in the header. When nothing at all was
//! extracted the payload is a single diagnostic row - callers must always
//! receive a parseable, non-empty artifact.

use anyhow::Context;
use serde_json::Value;

use crate::extraction::ExtractionOutcome;

pub struct CsvPayload {
    pub filename: String,
    pub body: String,
}

pub fn render_csv(outcome: &ExtractionOutcome) -> anyhow::Result<CsvPayload> {
    let filename = format!(
        "{}_extract_{}tables.csv",
        outcome.study_id, outcome.stats.tables_processed
    );

    let mut writer = csv::Writer::from_writer(Vec::new());

    if outcome.records.is_empty() {
        writer.write_record(["message", "tables_processed", "tables_skipped"])?;
        writer.write_record([
            "No rows were extracted".to_string(),
            outcome.stats.tables_processed.to_string(),
            outcome.stats.tables_skipped.to_string(),
        ])?;
    } else {
        // Union of table-prefixed columns, in first-seen order
        let mut headers: Vec<String> = Vec::new();
        for record in &outcome.records {
            for key in record.data.keys() {
                let header = format!("{}.{}", record.table_name, key);
                if !headers.contains(&header) {
                    headers.push(header);
                }
            }
        }

        writer.write_record(&headers)?;
        for record in &outcome.records {
            let row: Vec<String> = headers
                .iter()
                .map(|header| {
                    header
                        .strip_prefix(&format!("{}.", record.table_name))
                        .and_then(|key| record.data.get(key))
                        .map(cell_text)
                        .unwrap_or_default()
                })
                .collect();
            writer.write_record(&row)?;
        }
    }

    let bytes = writer.into_inner().context("finalizing CSV writer")?;
    let body = String::from_utf8(bytes).context("CSV output was not valid UTF-8")?;

    Ok(CsvPayload { filename, body })
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
