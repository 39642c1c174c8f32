//! Error types for catalog loading and lookup.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum CatalogError {
    #[error("No study found for `{study_id}`")]
    StudyNotFound { study_id: String },
    #[error("No table `{table}` in study `{study_id}`")]
    TableNotFound { study_id: String, table: String },
    #[error("Study `{study_id}` is unavailable: {detail}")]
    StudyLoadFailure { study_id: String, detail: String },
    #[error("Failed to read catalog file: {error}")]
    ConfigReadError { error: String },
    #[error("Failed to parse catalog file: {error}")]
    ConfigParseError { error: String },
}

impl CatalogError {
    pub fn read_error(path: &std::path::Path, err: impl std::fmt::Display) -> Self {
        CatalogError::ConfigReadError {
            error: format!("{}: {}", path.display(), err),
        }
    }

    pub fn parse_error(path: &std::path::Path, err: impl std::fmt::Display) -> Self {
        CatalogError::ConfigParseError {
            error: format!("{}: {}", path.display(), err),
        }
    }
}
