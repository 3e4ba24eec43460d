use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use tempfile::NamedTempFile;

const INITIALIZE: &str = r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2025-06-18","capabilities":{},"clientInfo":{"name":"cli-test","version":"0.0.1"}}}"#;
const INITIALIZED: &str = r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#;
const LIST_TOOLS: &str = r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#;

fn config_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

fn sqlmcp(config: &NamedTempFile) -> Command {
    let mut cmd = Command::cargo_bin("sqlmcp").unwrap();
    cmd.arg("--config")
        .arg(config.path())
        .arg("--log-level")
        .arg("error")
        .env_remove("SQL_SERVER")
        .env_remove("SQL_DATABASE")
        .env_remove("SQL_USER")
        .env_remove("SQL_PASSWORD")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_lists_tools_over_stdio() {
    let config = config_file("[database]\nhost = \"127.0.0.1\"\n");
    let input = format!("{}\n{}\n{}\n", INITIALIZE, INITIALIZED, LIST_TOOLS);

    sqlmcp(&config)
        .write_stdin(input)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"protocolVersion\":\"2025-06-18\""))
        .stdout(predicate::str::contains("execute_sql"))
        .stdout(predicate::str::contains("list_tables"))
        .stdout(predicate::str::contains("describe_table"));
}

#[test]
fn test_empty_stdin_exits_cleanly() {
    let config = config_file("");

    sqlmcp(&config)
        .write_stdin("")
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn test_garbage_line_gets_parse_error() {
    let config = config_file("");

    sqlmcp(&config)
        .write_stdin("this is not json\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("-32700"));
}

#[test]
fn test_missing_config_file_fails() {
    let mut cmd = Command::cargo_bin("sqlmcp").unwrap();
    cmd.arg("--config")
        .arg("/nonexistent/sqlmcp.toml")
        .write_stdin("")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load configuration"));
}

#[test]
fn test_invalid_config_fails() {
    let config = config_file("[server]\nmax_concurrent_calls = 0\n");

    sqlmcp(&config)
        .write_stdin("")
        .assert()
        .failure();
}
