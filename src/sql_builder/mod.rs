//! SQL SELECT construction for extraction queries.
//!
//! Builds exactly one statement per table:
//! `SELECT "c1", "c2" FROM schema."table" WHERE p1 AND p2 LIMIT n`.
//! Identifiers are double-quoted; predicates come from [`filters`] and are
//! ANDed; the LIMIT is always present and already clamped by the caller.

pub mod errors;
pub mod filters;

pub use errors::SqlBuildError;
pub use filters::{FilterOp, FilterValue};

/// Double-quote an identifier, escaping embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Builder for one extraction SELECT.
#[derive(Debug, Clone)]
pub struct SelectBuilder {
    qualified_table: String,
    projection: Vec<String>,
    predicates: Vec<String>,
    limit: u32,
}

impl SelectBuilder {
    /// `qualified_table` is the schema-qualified, already-quoted target
    /// (see `TableDescriptor::qualified_name`).
    pub fn new(qualified_table: impl Into<String>, limit: u32) -> Self {
        Self {
            qualified_table: qualified_table.into(),
            projection: Vec::new(),
            predicates: Vec::new(),
            limit,
        }
    }

    /// Add projection columns (live db names, unquoted; deduplicated here).
    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for col in columns {
            let quoted = quote_ident(col.as_ref());
            if !self.projection.contains(&quoted) {
                self.projection.push(quoted);
            }
        }
        self
    }

    /// Add all predicates for one resolved filter column.
    pub fn filter(
        &mut self,
        db_col: &str,
        data_type: &str,
        value: &FilterValue,
    ) -> Result<(), SqlBuildError> {
        self.predicates
            .extend(filters::render_filter(db_col, data_type, value)?);
        Ok(())
    }

    /// Render the final statement.
    pub fn build(&self) -> Result<String, SqlBuildError> {
        if self.projection.is_empty() {
            return Err(SqlBuildError::EmptyProjection {
                table: self.qualified_table.clone(),
            });
        }

        let mut sql = format!(
            "SELECT {} FROM {}",
            self.projection.join(", "),
            self.qualified_table
        );
        if !self.predicates.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.predicates.join(" AND "));
        }
        sql.push_str(&format!(" LIMIT {}", self.limit));
        Ok(sql)
    }
}
