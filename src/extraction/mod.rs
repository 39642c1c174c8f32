//! Per-request extraction pipeline.
//!
//! For each requested table: resolve columns, build SQL, execute, and
//! normalize rows back to the caller's names. The unit of failure is the
//! table: one broken table is logged, counted in `tables_skipped`, and
//! (when the caller named variables) replaced by a single all-null
//! placeholder record so the response shape stays predictable. Only
//! request-level validation - unknown study, no table selection at all -
//! fails the request.

pub mod source;
pub mod stats;

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::catalog::{CatalogError, StudyCatalog, StudyEntry, TableDescriptor};
use crate::config::ServerConfig;
use crate::resolver::{ColumnResolver, Resolution};
use crate::sql_builder::{FilterValue, SelectBuilder, SqlBuildError};

pub use source::{DataSource, SourceError};
pub use stats::ExtractionStats;

/// One table's worth of a request: which table, which variables, and the
/// filter map keyed by logical column name. An empty variable list means
/// "all live columns".
#[derive(Debug, Clone, Default)]
pub struct TableSelection {
    pub table: String,
    pub variables: Vec<String>,
    pub filters: BTreeMap<String, FilterValue>,
}

/// A normalized record tagged with the table it came from.
#[derive(Debug, Clone, Serialize)]
pub struct TaggedRecord {
    pub table_name: String,
    pub data: Map<String, Value>,
}

/// Aggregated result of one extraction request.
#[derive(Debug)]
pub struct ExtractionOutcome {
    pub study_id: String,
    pub records: Vec<TaggedRecord>,
    pub stats: ExtractionStats,
}

/// Request-level failures; everything below the table level degrades
/// instead of erroring.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Invalid extraction request: {0}")]
    RequestShape(String),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// Failures contained to a single table.
#[derive(Debug, Error)]
enum TableError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Sql(#[from] SqlBuildError),
}

pub struct ExtractionEngine {
    catalog: Arc<StudyCatalog>,
    source: Arc<dyn DataSource>,
    default_row_limit: u32,
    max_row_limit: u32,
}

impl ExtractionEngine {
    pub fn new(catalog: Arc<StudyCatalog>, source: Arc<dyn DataSource>, config: &ServerConfig) -> Self {
        Self {
            catalog,
            source,
            default_row_limit: config.default_row_limit,
            max_row_limit: config.max_row_limit,
        }
    }

    pub fn catalog(&self) -> &StudyCatalog {
        &self.catalog
    }

    /// Run one extraction request.
    ///
    /// Fails only on an unknown/unloadable study or an empty selection
    /// list; per-table trouble shows up in the stats, not as an `Err`.
    pub async fn extract(
        &self,
        study_id: &str,
        selections: &[TableSelection],
        limit: Option<u32>,
    ) -> Result<ExtractionOutcome, ExtractionError> {
        let study = self.catalog.study(study_id)?;

        if selections.is_empty() {
            return Err(ExtractionError::RequestShape(
                "either a table list or per-table selections must be provided".to_string(),
            ));
        }

        let limit = limit.unwrap_or(self.default_row_limit).min(self.max_row_limit);

        let mut records = Vec::new();
        let mut stats = ExtractionStats::default();

        for selection in selections {
            let Some(table) = study.table(&selection.table) else {
                log::warn!(
                    "Table '{}' does not exist in study '{}'; skipping",
                    selection.table,
                    study_id
                );
                stats.tables_skipped += 1;
                continue;
            };

            match self.extract_table(study, table, selection, limit).await {
                Ok((rows, extracted)) => {
                    stats.tables_processed += 1;
                    stats.rows_extracted += extracted;
                    records.extend(rows.into_iter().map(|data| TaggedRecord {
                        table_name: table.name.clone(),
                        data,
                    }));
                }
                Err(e) => {
                    log::error!(
                        "Error processing table '{}' in study '{}': {}",
                        selection.table,
                        study_id,
                        e
                    );
                    stats.tables_skipped += 1;
                    if !selection.variables.is_empty() {
                        records.push(TaggedRecord {
                            table_name: table.name.clone(),
                            data: null_record(&selection.variables),
                        });
                    }
                }
            }
        }

        Ok(ExtractionOutcome {
            study_id: study_id.to_string(),
            records,
            stats,
        })
    }

    /// Resolve, build, execute, and normalize a single table.
    ///
    /// Returns the normalized records plus the count of rows actually
    /// extracted (structural placeholders do not count).
    async fn extract_table(
        &self,
        study: &StudyEntry,
        table: &TableDescriptor,
        selection: &TableSelection,
        limit: u32,
    ) -> Result<(Vec<Map<String, Value>>, u64), TableError> {
        let live = self.source.list_columns(&table.schema, &table.name).await?;

        let resolver = ColumnResolver::new(table);
        let resolution = resolver.resolve(&live, &selection.variables);

        // Every requested variable missed: return the request's shape as
        // nulls without touching the database.
        if !selection.variables.is_empty() && resolution.resolved.is_empty() {
            return Ok((vec![null_record(&selection.variables)], 0));
        }

        let projection: Vec<String> = if selection.variables.is_empty() {
            live.iter().map(|c| c.name.clone()).collect()
        } else {
            resolution.db_columns()
        };

        let mut builder =
            SelectBuilder::new(table.qualified_name(), limit).columns(&projection);

        for (logical, value) in &selection.filters {
            match resolver.find_matching_column(logical, &live) {
                Some(m) => {
                    let data_type = live
                        .iter()
                        .find(|c| c.name == m.db_name)
                        .map(|c| c.data_type.as_str())
                        .unwrap_or("");
                    builder.filter(&m.db_name, data_type, value)?;
                }
                None => {
                    log::warn!(
                        "Filter column '{}' not found in table '{}'; filter ignored",
                        logical,
                        table.name
                    );
                }
            }
        }

        let sql = builder.build()?;
        log::debug!("Generated SQL for {}.{}: {}", study.study_id, table.name, sql);

        let rows = self.source.fetch_rows(&sql).await?;
        let extracted = rows.len() as u64;

        let normalized = rows
            .into_iter()
            .map(|row| normalize_row(row, &selection.variables, &resolution))
            .collect();

        Ok((normalized, extracted))
    }
}

/// Map a database row back to the caller's requested names, in request
/// order, with explicit nulls for unresolved names. An empty request passes
/// the row through under its database names.
fn normalize_row(
    row: Map<String, Value>,
    variables: &[String],
    resolution: &Resolution,
) -> Map<String, Value> {
    if variables.is_empty() {
        return row;
    }

    let mut normalized = Map::new();
    for var in variables {
        let value = resolution
            .get(var)
            .and_then(|m| row.get(&m.db_name).cloned())
            .unwrap_or(Value::Null);
        normalized.insert(var.clone(), value);
    }
    normalized
}

fn null_record(variables: &[String]) -> Map<String, Value> {
    variables
        .iter()
        .map(|v| (v.clone(), Value::Null))
        .collect()
}
