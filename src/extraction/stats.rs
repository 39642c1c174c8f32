use serde::Serialize;

/// Aggregate counters for one extraction request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExtractionStats {
    pub tables_processed: u32,
    pub tables_skipped: u32,
    pub rows_extracted: u64,
}
