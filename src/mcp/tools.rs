//! SQL tools
//!
//! `execute_sql`, `list_tables` and `describe_table`, backed by a [`DataStore`].

use crate::db::{ColumnInfo, DataStore, QueryOutcome};
use crate::mcp::protocol::CallToolResult;
use crate::mcp::registry::{Tool, ToolDescriptor, ToolRegistry};
use crate::mcp::schema::{InputSchema, PropertyType};
use crate::types::{RegistryError, ToolError};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::debug;

/// Register all SQL tools against `store`.
pub fn register_sql_tools(
    registry: &mut ToolRegistry,
    store: Arc<dyn DataStore>,
    display_rows: usize,
) -> Result<(), RegistryError> {
    registry.register(ExecuteSql {
        store: store.clone(),
        display_rows,
    })?;
    registry.register(ListTables {
        store: store.clone(),
    })?;
    registry.register(DescribeTable { store })?;
    Ok(())
}

pub struct ExecuteSql {
    store: Arc<dyn DataStore>,
    display_rows: usize,
}

#[derive(Debug, Deserialize)]
pub struct ExecuteSqlArgs {
    query: String,
}

#[async_trait]
impl Tool for ExecuteSql {
    type Args = ExecuteSqlArgs;

    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: "execute_sql".to_string(),
            description: "Execute SQL query against the connected database".to_string(),
            input_schema: InputSchema::object().required(
                "query",
                PropertyType::String,
                "SQL query to execute",
            ),
        }
    }

    async fn call(&self, args: ExecuteSqlArgs) -> Result<CallToolResult, ToolError> {
        let query = args.query.trim();
        if query.is_empty() {
            return Err(ToolError::InvalidArgument("No SQL query provided".to_string()));
        }

        debug!("execute_sql: {} bytes", query.len());
        let outcome = self.store.execute(query).await?;
        Ok(CallToolResult::text(format_outcome(&outcome, self.display_rows)))
    }
}

pub struct ListTables {
    store: Arc<dyn DataStore>,
}

#[derive(Debug, Deserialize)]
pub struct ListTablesArgs {
    #[serde(default)]
    schema: Option<String>,
}

#[async_trait]
impl Tool for ListTables {
    type Args = ListTablesArgs;

    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: "list_tables".to_string(),
            description: "List all tables in the database".to_string(),
            input_schema: InputSchema::object().optional(
                "schema",
                PropertyType::String,
                "Only list tables in this schema",
            ),
        }
    }

    async fn call(&self, args: ListTablesArgs) -> Result<CallToolResult, ToolError> {
        let schema = args.schema.as_deref().map(str::trim).filter(|s| !s.is_empty());
        let tables = self.store.list_tables(schema).await?;
        Ok(CallToolResult::text(format_tables(&tables)))
    }
}

pub struct DescribeTable {
    store: Arc<dyn DataStore>,
}

#[derive(Debug, Deserialize)]
pub struct DescribeTableArgs {
    table_name: String,
}

#[async_trait]
impl Tool for DescribeTable {
    type Args = DescribeTableArgs;

    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: "describe_table".to_string(),
            description: "Get schema information for a specific table".to_string(),
            input_schema: InputSchema::object().required(
                "table_name",
                PropertyType::String,
                "Name of the table to describe, optionally schema-qualified",
            ),
        }
    }

    async fn call(&self, args: DescribeTableArgs) -> Result<CallToolResult, ToolError> {
        let table = args.table_name.trim();
        if table.is_empty() {
            return Err(ToolError::InvalidArgument("No table name provided".to_string()));
        }

        let columns = self.store.describe_table(table).await?;
        Ok(CallToolResult::text(format_columns(table, &columns)))
    }
}

// Formatting helpers

fn format_outcome(outcome: &QueryOutcome, display_rows: usize) -> String {
    let (columns, rows) = match outcome {
        QueryOutcome::Affected(n) => {
            return format!("Query executed successfully. {} rows affected.", n);
        }
        QueryOutcome::Rows { columns, rows } => (columns, rows),
    };

    if rows.is_empty() {
        return "Query executed successfully. No results returned.".to_string();
    }

    let mut text = format!(
        "Query executed successfully. Found {} result(s):\n\n",
        rows.len()
    );
    for (i, row) in rows.iter().take(display_rows).enumerate() {
        let _ = writeln!(text, "Row {}: {}", i + 1, format_row(columns, row));
    }
    if rows.len() > display_rows {
        let _ = write!(text, "\n... and {} more rows", rows.len() - display_rows);
    }

    text
}

/// `{"col": "value", "other": null}`, keeping column order.
fn format_row(columns: &[String], row: &[Option<String>]) -> String {
    let fields: Vec<String> = columns
        .iter()
        .zip(row)
        .map(|(name, value)| {
            let value = match value {
                Some(v) => Value::String(v.clone()),
                None => Value::Null,
            };
            format!("{}: {}", Value::String(name.clone()), value)
        })
        .collect();

    format!("{{{}}}", fields.join(", "))
}

fn format_tables(tables: &[String]) -> String {
    if tables.is_empty() {
        return "No tables found in the database.".to_string();
    }

    let listing: Vec<String> = tables.iter().map(|t| format!("- {}", t)).collect();
    format!(
        "Found {} tables in the database:\n\n{}",
        tables.len(),
        listing.join("\n")
    )
}

fn format_columns(table: &str, columns: &[ColumnInfo]) -> String {
    if columns.is_empty() {
        return format!("Table '{}' not found or has no columns.", table);
    }

    let mut text = format!("Schema for table '{}':\n\n", table);
    text.push_str("| Column | Type | Nullable | Default | Max Length |\n");
    text.push_str("|--------|------|----------|---------|------------|\n");

    for col in columns {
        let _ = writeln!(
            text,
            "| {} | {} | {} | {} | {} |",
            col.name,
            col.data_type,
            if col.is_nullable { "YES" } else { "NO" },
            col.default.as_deref().unwrap_or("NULL"),
            col.max_length
                .map(|n| n.to_string())
                .unwrap_or_else(|| "N/A".to_string()),
        );
    }

    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::dispatcher::{Dispatcher, InvocationRequest};
    use crate::mcp::protocol::RequestId;
    use crate::types::DbError;
    use serde_json::json;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct FakeStore {
        outcome: Option<QueryOutcome>,
        tables: Vec<String>,
        columns: Vec<ColumnInfo>,
        fail_with: Option<String>,
        seen: Mutex<Vec<String>>,
    }

    impl FakeStore {
        fn seen(&self) -> Vec<String> {
            self.seen.lock().unwrap().clone()
        }

        fn check(&self, call: String) -> Result<(), DbError> {
            self.seen.lock().unwrap().push(call);
            match &self.fail_with {
                Some(msg) => Err(DbError::Decode(msg.clone())),
                None => Ok(()),
            }
        }
    }

    #[async_trait]
    impl DataStore for FakeStore {
        async fn execute(&self, query: &str) -> Result<QueryOutcome, DbError> {
            self.check(format!("execute:{}", query))?;
            Ok(self.outcome.clone().unwrap_or(QueryOutcome::Affected(0)))
        }

        async fn list_tables(&self, schema: Option<&str>) -> Result<Vec<String>, DbError> {
            self.check(format!("list:{}", schema.unwrap_or("*")))?;
            Ok(self.tables.clone())
        }

        async fn describe_table(&self, table: &str) -> Result<Vec<ColumnInfo>, DbError> {
            self.check(format!("describe:{}", table))?;
            Ok(self.columns.clone())
        }
    }

    fn dispatcher(store: Arc<FakeStore>) -> Dispatcher {
        let mut registry = ToolRegistry::new();
        register_sql_tools(&mut registry, store, 10).unwrap();
        Dispatcher::new(Arc::new(registry), Duration::from_secs(5))
    }

    async fn call(d: &Dispatcher, name: &str, arguments: Value) -> CallToolResult {
        d.dispatch(InvocationRequest {
            id: RequestId::from(7),
            name: name.to_string(),
            arguments: arguments.as_object().cloned().unwrap(),
        })
        .await
    }

    fn numbered_rows(n: usize) -> QueryOutcome {
        QueryOutcome::Rows {
            columns: vec!["id".to_string(), "note".to_string()],
            rows: (1..=n)
                .map(|i| vec![Some(i.to_string()), None])
                .collect(),
        }
    }

    #[test]
    fn test_registers_in_order() {
        let mut registry = ToolRegistry::new();
        register_sql_tools(&mut registry, Arc::new(FakeStore::default()), 10).unwrap();

        let names: Vec<String> = registry.list().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["execute_sql", "list_tables", "describe_table"]);

        let schema = serde_json::to_value(&registry.list()[2].input_schema).unwrap();
        assert_eq!(schema["required"], json!(["table_name"]));
    }

    #[tokio::test]
    async fn test_execute_truncates_after_ten_rows() {
        let store = Arc::new(FakeStore {
            outcome: Some(numbered_rows(25)),
            ..Default::default()
        });
        let d = dispatcher(store);

        let result = call(&d, "execute_sql", json!({"query": "SELECT id, note FROM t"})).await;
        let text = result.joined_text();

        assert!(!result.is_error);
        assert!(text.starts_with("Query executed successfully. Found 25 result(s):\n\n"));
        assert!(text.contains("Row 1: {\"id\": \"1\", \"note\": null}\n"));
        assert!(text.contains("Row 10: {\"id\": \"10\", \"note\": null}\n"));
        assert!(!text.contains("Row 11:"));
        assert!(text.ends_with("\n... and 15 more rows"));
    }

    #[tokio::test]
    async fn test_execute_exact_display_limit_has_no_footer() {
        let store = Arc::new(FakeStore {
            outcome: Some(numbered_rows(10)),
            ..Default::default()
        });
        let d = dispatcher(store);

        let text = call(&d, "execute_sql", json!({"query": "SELECT 1"}))
            .await
            .joined_text();
        assert!(text.contains("Row 10:"));
        assert!(!text.contains("more rows"));
    }

    #[tokio::test]
    async fn test_execute_null_differs_from_string_null() {
        let store = Arc::new(FakeStore {
            outcome: Some(QueryOutcome::Rows {
                columns: vec!["a".to_string(), "b".to_string()],
                rows: vec![vec![None, Some("null".to_string())]],
            }),
            ..Default::default()
        });
        let d = dispatcher(store);

        let text = call(&d, "execute_sql", json!({"query": "SELECT a, b FROM t"}))
            .await
            .joined_text();
        assert!(text.contains("Row 1: {\"a\": null, \"b\": \"null\"}"));
    }

    #[tokio::test]
    async fn test_execute_empty_and_affected() {
        let store = Arc::new(FakeStore {
            outcome: Some(numbered_rows(0)),
            ..Default::default()
        });
        let text = call(&dispatcher(store), "execute_sql", json!({"query": "SELECT 1 WHERE false"}))
            .await
            .joined_text();
        assert_eq!(text, "Query executed successfully. No results returned.");

        let store = Arc::new(FakeStore {
            outcome: Some(QueryOutcome::Affected(3)),
            ..Default::default()
        });
        let text = call(&dispatcher(store), "execute_sql", json!({"query": "DELETE FROM t"}))
            .await
            .joined_text();
        assert_eq!(text, "Query executed successfully. 3 rows affected.");
    }

    #[tokio::test]
    async fn test_blank_query_does_not_reach_store() {
        let store = Arc::new(FakeStore::default());
        let d = dispatcher(store.clone());

        let result = call(&d, "execute_sql", json!({"query": "   \n"})).await;

        assert!(result.is_error);
        assert_eq!(result.joined_text(), "Error: No SQL query provided");
        assert!(store.seen().is_empty());
    }

    #[tokio::test]
    async fn test_missing_query_is_rejected_before_handler() {
        let store = Arc::new(FakeStore::default());
        let d = dispatcher(store.clone());

        let result = call(&d, "execute_sql", json!({})).await;

        assert!(result.is_error);
        assert!(result.joined_text().contains("query"));
        assert!(store.seen().is_empty());
    }

    #[tokio::test]
    async fn test_downstream_error_is_wrapped() {
        let store = Arc::new(FakeStore {
            fail_with: Some("relation \"nope\" does not exist".to_string()),
            ..Default::default()
        });
        let d = dispatcher(store);

        let result = call(&d, "execute_sql", json!({"query": "SELECT * FROM nope"})).await;

        assert!(result.is_error);
        let text = result.joined_text();
        assert!(text.starts_with("Error executing tool 'execute_sql':"));
        assert!(text.contains("relation \"nope\" does not exist"));
    }

    #[tokio::test]
    async fn test_list_tables_format() {
        let store = Arc::new(FakeStore {
            tables: vec!["customers".to_string(), "orders".to_string()],
            ..Default::default()
        });
        let d = dispatcher(store.clone());

        let text = call(&d, "list_tables", json!({})).await.joined_text();
        assert_eq!(
            text,
            "Found 2 tables in the database:\n\n- customers\n- orders"
        );

        call(&d, "list_tables", json!({"schema": "sales"})).await;
        assert_eq!(store.seen(), vec!["list:*", "list:sales"]);
    }

    #[tokio::test]
    async fn test_list_tables_empty() {
        let d = dispatcher(Arc::new(FakeStore::default()));
        let text = call(&d, "list_tables", json!({})).await.joined_text();
        assert_eq!(text, "No tables found in the database.");
    }

    #[tokio::test]
    async fn test_describe_table_markdown() {
        let store = Arc::new(FakeStore {
            columns: vec![
                ColumnInfo {
                    name: "id".to_string(),
                    data_type: "integer".to_string(),
                    is_nullable: false,
                    default: Some("nextval('items_id_seq'::regclass)".to_string()),
                    max_length: None,
                },
                ColumnInfo {
                    name: "sku".to_string(),
                    data_type: "character varying".to_string(),
                    is_nullable: true,
                    default: None,
                    max_length: Some(32),
                },
            ],
            ..Default::default()
        });
        let d = dispatcher(store.clone());

        let text = call(&d, "describe_table", json!({"table_name": "inventory.items"}))
            .await
            .joined_text();

        assert!(text.starts_with("Schema for table 'inventory.items':\n\n"));
        assert!(text.contains("| Column | Type | Nullable | Default | Max Length |\n"));
        assert!(text.contains("| id | integer | NO | nextval('items_id_seq'::regclass) | N/A |\n"));
        assert!(text.contains("| sku | character varying | YES | NULL | 32 |\n"));
        assert_eq!(store.seen(), vec!["describe:inventory.items"]);
    }

    #[tokio::test]
    async fn test_describe_unknown_table() {
        let d = dispatcher(Arc::new(FakeStore::default()));

        let result = call(&d, "describe_table", json!({"table_name": "ghost"})).await;

        assert!(!result.is_error);
        assert_eq!(
            result.joined_text(),
            "Table 'ghost' not found or has no columns."
        );
    }

    #[tokio::test]
    async fn test_describe_blank_name() {
        let store = Arc::new(FakeStore::default());
        let d = dispatcher(store.clone());

        let result = call(&d, "describe_table", json!({"table_name": " "})).await;

        assert!(result.is_error);
        assert_eq!(result.joined_text(), "Error: No table name provided");
        assert!(store.seen().is_empty());
    }
}
