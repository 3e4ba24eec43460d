//! Database access for the SQL tools

mod postgres;

pub use postgres::PgStore;

use crate::types::DbError;
use async_trait::async_trait;

/// Result of running a single statement.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    /// Column names in result order, then one entry per row. `None` is SQL NULL.
    Rows {
        columns: Vec<String>,
        rows: Vec<Vec<Option<String>>>,
    },
    /// The statement produced no row set.
    Affected(u64),
}

/// One column of a table, as reported by the catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub is_nullable: bool,
    pub default: Option<String>,
    pub max_length: Option<i32>,
}

/// The database the tools talk to.
///
/// Implementations open what they need per call; nothing is shared between
/// concurrent invocations.
#[async_trait]
pub trait DataStore: Send + Sync {
    async fn execute(&self, query: &str) -> Result<QueryOutcome, DbError>;

    /// Base table names ordered by name, optionally restricted to one schema.
    async fn list_tables(&self, schema: Option<&str>) -> Result<Vec<String>, DbError>;

    /// Columns in ordinal order. Empty when the table does not exist.
    async fn describe_table(&self, table: &str) -> Result<Vec<ColumnInfo>, DbError>;
}

/// Whether a statement that returned nothing should still count as an empty
/// row set, judged by its leading keyword.
pub(crate) fn returns_rows(query: &str) -> bool {
    const ROW_KEYWORDS: &[&str] = &["select", "with", "show", "values", "table", "explain"];

    let keyword: String = strip_leading_comments(query)
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();

    ROW_KEYWORDS
        .iter()
        .any(|k| keyword.eq_ignore_ascii_case(k))
}

fn strip_leading_comments(mut query: &str) -> &str {
    loop {
        query = query.trim_start_matches(|c: char| c.is_whitespace() || c == '(');
        if let Some(rest) = query.strip_prefix("--") {
            query = rest.split_once('\n').map_or("", |(_, tail)| tail);
        } else if let Some(rest) = query.strip_prefix("/*") {
            query = rest.split_once("*/").map_or("", |(_, tail)| tail);
        } else {
            return query;
        }
    }
}
