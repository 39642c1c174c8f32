//! ClickHouse-backed implementation of the extraction [`DataSource`].

use std::env;

use async_trait::async_trait;
use clickhouse::Client;
use serde::Deserialize;
use serde_json::{Map, Value};
use tokio::io::AsyncBufReadExt;

use crate::extraction::{DataSource, SourceError};
use crate::resolver::LiveColumn;

fn read_env_var(key: &str) -> Option<String> {
    env::var(key).ok()
}

/// Build a client from environment variables, if they are all present.
pub fn try_get_client() -> Option<Client> {
    let url = read_env_var("CLICKHOUSE_URL")?;
    let user = read_env_var("CLICKHOUSE_USER")?;
    let password = read_env_var("CLICKHOUSE_PASSWORD")?;

    Some(
        Client::default()
            .with_url(url)
            .with_user(user)
            .with_password(password)
            .with_option("join_use_nulls", "1"), // NULL for unmatched columns
    )
}

/// Escape a value for interpolation into a single-quoted SQL string.
fn escape_sql_str(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

pub struct ClickhouseSource {
    client: Client,
}

impl ClickhouseSource {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DataSource for ClickhouseSource {
    async fn list_columns(
        &self,
        schema: &str,
        table: &str,
    ) -> Result<Vec<LiveColumn>, SourceError> {
        #[derive(Debug, clickhouse::Row, Deserialize)]
        struct ColumnRow {
            name: String,
            #[serde(rename = "type")]
            data_type: String,
        }

        let query = format!(
            "SELECT name, type FROM system.columns WHERE database = '{}' AND table = '{}' ORDER BY position",
            escape_sql_str(schema),
            escape_sql_str(table)
        );

        let rows: Vec<ColumnRow> = self
            .client
            .query(&query)
            .fetch_all()
            .await
            .map_err(|e| SourceError::Introspection(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|c| LiveColumn {
                name: c.name,
                data_type: c.data_type,
            })
            .collect())
    }

    async fn fetch_rows(&self, sql: &str) -> Result<Vec<Map<String, Value>>, SourceError> {
        let mut lines = self
            .client
            .clone()
            .query(sql)
            .fetch_bytes("JSONEachRow")
            .map_err(|e| {
                log::error!("ClickHouse query failed. SQL was:\n{}\nError: {}", sql, e);
                SourceError::Query(e.to_string())
            })?
            .lines();

        let mut rows = Vec::new();
        while let Some(line) = lines
            .next_line()
            .await
            .map_err(|e| SourceError::Query(e.to_string()))?
        {
            let row: Map<String, Value> =
                serde_json::from_str(&line).map_err(|e| SourceError::Query(e.to_string()))?;
            rows.push(row);
        }

        Ok(rows)
    }
}
