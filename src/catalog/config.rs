//! Serde types for the catalog configuration files.
//!
//! The catalog directory holds one `studies.yml` registry plus one
//! subdirectory per study with dbt-style table definition files:
//!
//! ```yaml
//! # studies.yml
//! studies:
//!   - study_id: face_bp
//!     title: FACE Bipolar
//!     description: Clinical dataset for the bipolar cohort
//!     schema: _prod_thesaurus_face_bp
//!     metadata:
//!       study_type: Longitudinal Cohort Study
//!       year_started: 2019
//!       principal_investigator: Dr. Michael Rodriguez
//!       patient_count: 895
//! ```
//!
//! ```yaml
//! # face_bp/face_bp_1_patients.yml
//! models:
//!   - name: face_bp_1_patients
//!     description: Patient inclusion records
//!     columns:
//!       - name: usubjid
//!         data_type: text
//!       - name: age
//!         data_type: integer
//! ```
//!
//! A companion `face_bp/face_bp_1_patients.sql` template, when present, is
//! mined for `expr AS alias` pairs to seed database-side column names.

use serde::{Deserialize, Serialize};

/// Top-level study registry (`studies.yml`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudyRegistryFile {
    pub studies: Vec<StudyDefinition>,
}

/// One study entry in the registry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudyDefinition {
    pub study_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Database schema the study's tables live in
    pub schema: String,
    #[serde(default)]
    pub metadata: StudyMetadata,
    #[serde(default)]
    pub last_updated: Option<String>,
}

/// Free-form study metadata surfaced verbatim by the listing endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StudyMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub study_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year_started: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub principal_investigator: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient_count: Option<u32>,
}

/// Per-table definition file (`<study>/<table>.yml`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableFile {
    pub models: Vec<TableModel>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableModel {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub columns: Vec<ColumnDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnDefinition {
    pub name: String,
    #[serde(default)]
    pub data_type: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Normalize a registry `last_updated` value to a plain `YYYY-MM-DD` date.
/// Accepts RFC 3339 timestamps (the form the upstream warehouse exports)
/// or an already-plain date, which passes through unchanged.
pub fn normalize_last_updated(raw: &str) -> Option<String> {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(raw) {
        return Some(dt.format("%Y-%m-%d").to_string());
    }
    chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .map(|d| d.to_string())
}
