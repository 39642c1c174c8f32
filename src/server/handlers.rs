use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Map, Value};

use crate::catalog::CatalogError;
use crate::extraction::{ExtractionError, ExtractionStats, TaggedRecord};

use super::{
    csv_output,
    models::{
        ColumnsResponse, DataRequest, DataResponse, ExtractJsonResponse, ExtractRequest,
        OutputFormat, StudySummary, TableSummary,
    },
    AppState,
};

type ErrorResponse = (StatusCode, Json<Value>);

fn error_body(message: impl Into<String>) -> Json<Value> {
    Json(json!({ "error": message.into() }))
}

/// Map catalog failures to HTTP statuses: lookups are 404, a study whose
/// configuration failed to load is a server-side fault.
fn catalog_error_response(e: CatalogError) -> ErrorResponse {
    let status = match e {
        CatalogError::StudyNotFound { .. } | CatalogError::TableNotFound { .. } => {
            StatusCode::NOT_FOUND
        }
        CatalogError::StudyLoadFailure { .. }
        | CatalogError::ConfigReadError { .. }
        | CatalogError::ConfigParseError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, error_body(e.to_string()))
}

fn extraction_error_response(e: ExtractionError) -> ErrorResponse {
    match e {
        ExtractionError::RequestShape(message) => (StatusCode::BAD_REQUEST, error_body(message)),
        ExtractionError::Catalog(e) => catalog_error_response(e),
    }
}

/// Callers must always receive a non-empty payload: when nothing at all
/// was extracted, the record list carries one diagnostic entry describing
/// how the request went instead.
fn records_or_diagnostic(
    records: Vec<TaggedRecord>,
    stats: &ExtractionStats,
) -> Vec<TaggedRecord> {
    if !records.is_empty() {
        return records;
    }

    let mut data = Map::new();
    data.insert("message".to_string(), json!("No rows were extracted"));
    data.insert(
        "tables_processed".to_string(),
        json!(stats.tables_processed),
    );
    data.insert("tables_skipped".to_string(), json!(stats.tables_skipped));
    vec![TaggedRecord {
        table_name: "diagnostics".to_string(),
        data,
    }]
}

/// Simple health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "service": "studybridge",
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

pub async fn list_studies_handler(State(app_state): State<Arc<AppState>>) -> impl IntoResponse {
    let studies: Vec<StudySummary> = app_state.catalog.studies().map(StudySummary::from).collect();
    Json(studies)
}

pub async fn list_tables_handler(
    State(app_state): State<Arc<AppState>>,
    Path(study): Path<String>,
) -> Result<Json<Vec<TableSummary>>, ErrorResponse> {
    let tables = app_state
        .catalog
        .list_tables(&study)
        .map_err(catalog_error_response)?;
    Ok(Json(tables.iter().map(TableSummary::from).collect()))
}

pub async fn table_columns_handler(
    State(app_state): State<Arc<AppState>>,
    Path((study, table)): Path<(String, String)>,
) -> Result<Json<ColumnsResponse>, ErrorResponse> {
    let table = app_state
        .catalog
        .table(&study, &table)
        .map_err(catalog_error_response)?;
    Ok(Json(ColumnsResponse {
        columns: table.column_names(),
    }))
}

pub async fn extract_handler(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<ExtractRequest>,
) -> Result<Response, ErrorResponse> {
    log::info!(
        "Extraction request: study={}, {} selections",
        payload.study,
        payload.selections.len()
    );

    let selections = payload.selections();
    let outcome = app_state
        .engine
        .extract(&payload.study, &selections, payload.limit)
        .await
        .map_err(extraction_error_response)?;

    match payload.format {
        OutputFormat::Json => {
            let stats = outcome.stats;
            Ok(Json(ExtractJsonResponse {
                status: "success".to_string(),
                study: outcome.study_id,
                row_count: stats.rows_extracted,
                data: records_or_diagnostic(outcome.records, &stats),
                stats,
            })
            .into_response())
        }
        OutputFormat::Csv => {
            let csv = csv_output::render_csv(&outcome).map_err(|e| {
                log::error!("CSV rendering failed for study '{}': {}", outcome.study_id, e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    error_body("Failed to render CSV output"),
                )
            })?;

            let mut response = (StatusCode::OK, csv.body).into_response();
            let headers = response.headers_mut();
            headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/csv"));
            if let Ok(disposition) = HeaderValue::try_from(format!(
                "attachment; filename=\"{}\"",
                csv.filename
            )) {
                headers.insert(header::CONTENT_DISPOSITION, disposition);
            }
            Ok(response)
        }
    }
}

pub async fn data_handler(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<DataRequest>,
) -> Result<Json<DataResponse>, ErrorResponse> {
    let selections = payload.selections();
    let outcome = app_state
        .engine
        .extract(&payload.study, &selections, payload.limit)
        .await
        .map_err(extraction_error_response)?;

    let stats = outcome.stats;
    let count = outcome.records.len();
    Ok(Json(DataResponse {
        status: "success".to_string(),
        study: outcome.study_id,
        count,
        stats,
        data: records_or_diagnostic(outcome.records, &stats),
    }))
}
