use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::catalog::{StudyEntry, StudyMetadata, TableDescriptor};
use crate::extraction::{ExtractionStats, TableSelection, TaggedRecord};
use crate::sql_builder::FilterValue;

/// Output format for `/extract` (CSV is the historical default)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Csv,
    Json,
}

/// Body of `POST /extract`
#[derive(Debug, Deserialize)]
pub struct ExtractRequest {
    pub study: String,
    #[serde(default)]
    pub selections: Vec<SelectionSpec>,
    pub limit: Option<u32>,
    #[serde(default)]
    pub format: OutputFormat,
}

#[derive(Debug, Deserialize)]
pub struct SelectionSpec {
    pub table: String,
    #[serde(default)]
    pub variables: Vec<String>,
}

impl ExtractRequest {
    pub fn selections(&self) -> Vec<TableSelection> {
        self.selections
            .iter()
            .map(|s| TableSelection {
                table: s.table.clone(),
                variables: s.variables.clone(),
                filters: BTreeMap::new(),
            })
            .collect()
    }
}

/// Body of `POST /data`.
///
/// Accepts either the advanced format (per-table variables and filters via
/// `tables_with_variables`) or the simple format (`table_names` with one
/// shared `variable_names`/`filters` set). The advanced format wins when
/// both are present.
#[derive(Debug, Deserialize)]
pub struct DataRequest {
    pub study: String,
    #[serde(default)]
    pub tables_with_variables: Vec<TableVariables>,
    #[serde(default)]
    pub table_names: Vec<String>,
    #[serde(default)]
    pub variable_names: Vec<String>,
    #[serde(default)]
    pub filters: Option<BTreeMap<String, Value>>,
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct TableVariables {
    pub table_name: String,
    #[serde(default)]
    pub variable_names: Vec<String>,
    #[serde(default)]
    pub filters: Option<BTreeMap<String, Value>>,
}

impl DataRequest {
    /// Normalize both accepted request forms to per-table selections.
    pub fn selections(&self) -> Vec<TableSelection> {
        if !self.tables_with_variables.is_empty() {
            return self
                .tables_with_variables
                .iter()
                .map(|t| TableSelection {
                    table: t.table_name.clone(),
                    variables: t.variable_names.clone(),
                    filters: filter_map(t.filters.as_ref()),
                })
                .collect();
        }

        self.table_names
            .iter()
            .map(|name| TableSelection {
                table: name.clone(),
                variables: self.variable_names.clone(),
                filters: filter_map(self.filters.as_ref()),
            })
            .collect()
    }
}

fn filter_map(raw: Option<&BTreeMap<String, Value>>) -> BTreeMap<String, FilterValue> {
    raw.map(|map| {
        map.iter()
            .map(|(k, v)| (k.clone(), FilterValue::from_json(v.clone())))
            .collect()
    })
    .unwrap_or_default()
}

/// One study in the `GET /studies` listing
#[derive(Debug, Serialize)]
pub struct StudySummary {
    pub study_id: String,
    pub title: String,
    pub description: String,
    pub metadata: StudyMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
}

impl From<&StudyEntry> for StudySummary {
    fn from(study: &StudyEntry) -> Self {
        Self {
            study_id: study.study_id.clone(),
            title: study.title.clone(),
            description: study.description.clone(),
            metadata: study.metadata.clone(),
            last_updated: study.last_updated.clone(),
        }
    }
}

/// One table in the `GET /studies/{study}/tables` listing
#[derive(Debug, Serialize)]
pub struct TableSummary {
    pub name: String,
    pub description: String,
    pub columns: Vec<String>,
}

impl From<&TableDescriptor> for TableSummary {
    fn from(table: &TableDescriptor) -> Self {
        Self {
            name: table.name.clone(),
            description: table.description.clone(),
            columns: table.column_names(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ColumnsResponse {
    pub columns: Vec<String>,
}

/// JSON response for `POST /data`
#[derive(Debug, Serialize)]
pub struct DataResponse {
    pub status: String,
    pub study: String,
    pub data: Vec<TaggedRecord>,
    pub count: usize,
    pub stats: ExtractionStats,
}

/// JSON response for `POST /extract?format=json`
#[derive(Debug, Serialize)]
pub struct ExtractJsonResponse {
    pub status: String,
    pub study: String,
    pub data: Vec<TaggedRecord>,
    pub row_count: u64,
    pub stats: ExtractionStats,
}
