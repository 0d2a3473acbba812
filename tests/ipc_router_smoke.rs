use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_quizbankd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn quizbankd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(true),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn error_code(value: &serde_json::Value) -> &str {
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
        .unwrap_or("")
}

#[test]
fn router_dispatch_smoke_covers_handler_families() {
    let workspace = temp_dir("quizbank-router-smoke");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let health = request_ok(&mut stdin, &mut reader, "1", "health", json!({}));
    assert_eq!(health["version"], json!(env!("CARGO_PKG_VERSION")));
    assert!(health["workspacePath"].is_null());
    assert!(health["storageTimeoutMs"].as_u64().unwrap_or(0) > 0);

    let early = request(
        &mut stdin,
        &mut reader,
        "2",
        "import.apply",
        json!({ "json": "[]" }),
    );
    assert_eq!(error_code(&early), "no_workspace");

    let missing = request(&mut stdin, &mut reader, "3", "workspace.select", json!({}));
    assert_eq!(error_code(&missing), "bad_params");

    request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    assert!(workspace.join("quizbank.sqlite3").is_file());

    let preview = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "import.preview",
        json!({ "json": [], "fallbackDate": "2026-01-28" }),
    );
    assert_eq!(preview["total"], json!(0));
    assert_eq!(preview["dryRun"], json!(true));

    let applied = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "import.apply",
        json!({ "json": "[]", "fallbackDate": "2026-01-28" }),
    );
    assert_eq!(applied["dryRun"], json!(false));

    let listed = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "records.list",
        json!({ "kind": "mcq" }),
    );
    assert_eq!(listed["records"], json!([]));

    let missing_record = request(
        &mut stdin,
        &mut reader,
        "8",
        "records.get",
        json!({ "kind": "descriptive", "id": "nope" }),
    );
    assert_eq!(error_code(&missing_record), "not_found");

    let bad_kind = request(
        &mut stdin,
        &mut reader,
        "9",
        "records.list",
        json!({ "kind": "essay" }),
    );
    assert_eq!(error_code(&bad_kind), "bad_params");

    let unknown = request(&mut stdin, &mut reader, "10", "records.purge", json!({}));
    assert_eq!(error_code(&unknown), "not_implemented");

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn unparseable_request_line_gets_bad_json_and_the_loop_continues() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    writeln!(stdin, "{{not json").expect("write garbage");
    stdin.flush().expect("flush");
    let mut line = String::new();
    reader.read_line(&mut line).expect("read bad_json response");
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse");
    assert_eq!(value["ok"], json!(false));
    assert_eq!(error_code(&value), "bad_json");

    request_ok(&mut stdin, &mut reader, "1", "health", json!({}));

    drop(stdin);
    let _ = child.wait();
}
