//! PostgreSQL data store
//!
//! Opens a fresh connection for every call and closes it before returning.

use super::{returns_rows, ColumnInfo, DataStore, QueryOutcome};
use crate::config::DatabaseConfig;
use crate::types::DbError;
use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::postgres::{PgConnectOptions, PgConnection, PgSslMode};
use sqlx::{Column, Connection, Either, Row};
use std::time::Duration;
use tracing::{debug, warn};

const LIST_TABLES_SQL: &str = r#"
SELECT table_name::text
FROM information_schema.tables
WHERE table_type = 'BASE TABLE'
  AND table_schema NOT IN ('pg_catalog', 'information_schema')
  AND ($1::text IS NULL OR table_schema = $1)
ORDER BY table_name
"#;

const DESCRIBE_TABLE_SQL: &str = r#"
SELECT
    column_name::text,
    data_type::text,
    is_nullable::text,
    column_default::text,
    character_maximum_length::int4
FROM information_schema.columns
WHERE table_name = $1
  AND table_schema = COALESCE($2, current_schema())
ORDER BY ordinal_position
"#;

pub struct PgStore {
    options: PgConnectOptions,
    connect_timeout: Duration,
}

impl PgStore {
    pub fn new(config: &DatabaseConfig) -> Result<Self, DbError> {
        let ssl_mode: PgSslMode = config.ssl_mode.parse()?;

        let mut options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .database(&config.database)
            .username(&config.user)
            .ssl_mode(ssl_mode)
            .application_name(env!("CARGO_PKG_NAME"));

        if let Some(password) = &config.password {
            options = options.password(password);
        }

        Ok(Self {
            options,
            connect_timeout: config.connect_timeout(),
        })
    }

    async fn connect(&self) -> Result<PgConnection, DbError> {
        debug!("Opening database connection");
        tokio::time::timeout(self.connect_timeout, PgConnection::connect_with(&self.options))
            .await
            .map_err(|_| DbError::ConnectTimeout(self.connect_timeout.as_secs()))?
            .map_err(DbError::from)
    }

    async fn close(conn: PgConnection) {
        if let Err(e) = conn.close().await {
            warn!("Failed to close database connection cleanly: {}", e);
        }
    }
}

#[async_trait]
impl DataStore for PgStore {
    async fn execute(&self, query: &str) -> Result<QueryOutcome, DbError> {
        let mut conn = self.connect().await?;
        let result = run_statement(&mut conn, query).await;
        Self::close(conn).await;
        result
    }

    async fn list_tables(&self, schema: Option<&str>) -> Result<Vec<String>, DbError> {
        let mut conn = self.connect().await?;
        let result = sqlx::query_scalar::<_, String>(LIST_TABLES_SQL)
            .bind(schema)
            .fetch_all(&mut conn)
            .await
            .map_err(DbError::from);
        Self::close(conn).await;
        result
    }

    async fn describe_table(&self, table: &str) -> Result<Vec<ColumnInfo>, DbError> {
        let (schema, name) = split_table_name(table);

        let mut conn = self.connect().await?;
        let result = sqlx::query_as::<_, (String, String, String, Option<String>, Option<i32>)>(
            DESCRIBE_TABLE_SQL,
        )
        .bind(name)
        .bind(schema)
        .fetch_all(&mut conn)
        .await
        .map_err(DbError::from);
        Self::close(conn).await;

        Ok(result?
            .into_iter()
            .map(|(name, data_type, is_nullable, default, max_length)| ColumnInfo {
                name,
                data_type,
                is_nullable: is_nullable.eq_ignore_ascii_case("YES"),
                default,
                max_length,
            })
            .collect())
    }
}

/// `schema.table` into its parts. An unqualified name has no schema and is
/// looked up in the current one.
fn split_table_name(table: &str) -> (Option<&str>, &str) {
    match table.split_once('.') {
        Some((schema, name)) if !schema.is_empty() && !name.is_empty() => (Some(schema), name),
        _ => (None, table),
    }
}

/// Folds the result stream of a possibly multi-statement query. The rows of
/// the last statement that produced any are kept and affected counts are
/// summed.
#[derive(Debug, Default)]
struct ResultCollector {
    columns: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
    affected: u64,
    in_statement: bool,
}

impl ResultCollector {
    fn row(&mut self, columns: impl FnOnce() -> Vec<String>, values: Vec<Option<String>>) {
        if !self.in_statement {
            self.columns = columns();
            self.rows.clear();
            self.in_statement = true;
        }
        self.rows.push(values);
    }

    fn statement_done(&mut self, rows_affected: u64) {
        self.affected += rows_affected;
        self.in_statement = false;
    }

    fn finish(self, query: &str) -> QueryOutcome {
        if !self.rows.is_empty() || returns_rows(query) {
            QueryOutcome::Rows {
                columns: self.columns,
                rows: self.rows,
            }
        } else {
            QueryOutcome::Affected(self.affected)
        }
    }
}

/// Run arbitrary SQL over the simple query protocol, so every value arrives
/// as text.
async fn run_statement(conn: &mut PgConnection, query: &str) -> Result<QueryOutcome, DbError> {
    let mut collector = ResultCollector::default();

    let mut stream = sqlx::raw_sql(query).fetch_many(&mut *conn);
    while let Some(item) = stream.try_next().await? {
        match item {
            Either::Left(done) => collector.statement_done(done.rows_affected()),
            Either::Right(row) => {
                let values = (0..row.len())
                    .map(|i| {
                        row.try_get_unchecked::<Option<String>, _>(i)
                            .map_err(|e| DbError::Decode(format!("column {}: {}", i, e)))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                collector.row(
                    || row.columns().iter().map(|c| c.name().to_string()).collect(),
                    values,
                );
            }
        }
    }

    Ok(collector.finish(query))
}
