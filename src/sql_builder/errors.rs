use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum SqlBuildError {
    #[error("Filter operator `in` expects a list value for column `{column}`")]
    InExpectsList { column: String },
    #[error("Unsupported filter operator `{op}` for column `{column}`")]
    UnknownOperator { op: String, column: String },
    #[error("No columns to select from `{table}`")]
    EmptyProjection { table: String },
}
