use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn fixture_path(rel: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join(rel)
}

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

fn select_workspace(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    prefix: &str,
) -> PathBuf {
    let workspace = temp_dir(prefix);
    request_ok(
        stdin,
        reader,
        "ws",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    workspace
}

#[test]
fn one_malformed_record_is_rejected_at_its_index() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    select_workspace(&mut stdin, &mut reader, "quizbank-isolation");

    let params = json!({
        "inPath": fixture_path("fixtures/imports/mixed_with_bad.json").to_string_lossy(),
        "bank": "geography",
        "fallbackDate": "2026-03-10",
    });
    let report = request_ok(&mut stdin, &mut reader, "1", "import.apply", params.clone());
    assert_eq!(report["total"], json!(5));
    assert_eq!(report["created"], json!(4));
    assert_eq!(report["updated"], json!(0));
    let rejected = report["rejected"].as_array().expect("rejected");
    assert_eq!(rejected.len(), 1);
    assert_eq!(rejected[0]["index"], json!(2));
    assert_eq!(rejected[0]["code"], json!("date.partial_date"));
    assert!(rejected[0]["reason"]
        .as_str()
        .unwrap_or("")
        .contains("month"));
    assert_eq!(report["outcomes"][2]["status"], json!("rejected"));
    assert_eq!(report["outcomes"][4]["kind"], json!("currentaffairs_descriptive"));

    let listed = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "records.list",
        json!({ "kind": "mcq", "bank": "geography", "day": "2026-03-10" }),
    );
    assert_eq!(listed["records"].as_array().map(|a| a.len()), Some(3));

    // Same batch again: everything that landed is now an update.
    let again = request_ok(&mut stdin, &mut reader, "3", "import.apply", params);
    assert_eq!(again["created"], json!(0));
    assert_eq!(again["updated"], json!(4));
    assert_eq!(again["rejected"][0]["index"], json!(2));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn batch_level_failures_are_reported_as_errors() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    select_workspace(&mut stdin, &mut reader, "quizbank-batch-errors");

    let not_array = request(
        &mut stdin,
        &mut reader,
        "1",
        "import.apply",
        json!({ "json": "{\"question\": \"q\"}" }),
    );
    assert_eq!(error_code(&not_array), "bad_json_payload");

    let truncated = request(
        &mut stdin,
        &mut reader,
        "2",
        "import.apply",
        json!({ "json": "[{\"question\": " }),
    );
    assert_eq!(error_code(&truncated), "bad_json_payload");

    let unknown_bank = request(
        &mut stdin,
        &mut reader,
        "3",
        "import.apply",
        json!({ "json": "[]", "bank": "astrology" }),
    );
    assert_eq!(error_code(&unknown_bank), "bad_params");

    let bad_date = request(
        &mut stdin,
        &mut reader,
        "4",
        "import.preview",
        json!({ "json": "[]", "fallbackDate": "tomorrow" }),
    );
    assert_eq!(error_code(&bad_date), "bad_params");

    let bad_timeout = request(
        &mut stdin,
        &mut reader,
        "5",
        "import.apply",
        json!({ "json": "[]", "timeoutMs": 0 }),
    );
    assert_eq!(error_code(&bad_timeout), "bad_params");

    let missing_file = request(
        &mut stdin,
        &mut reader,
        "6",
        "import.apply",
        json!({ "inPath": fixture_path("fixtures/imports/does_not_exist.json").to_string_lossy() }),
    );
    assert_eq!(error_code(&missing_file), "read_failed");

    let no_payload = request(&mut stdin, &mut reader, "7", "import.apply", json!({}));
    assert_eq!(error_code(&no_payload), "bad_params");

    let listed = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "records.list",
        json!({ "kind": "mcq" }),
    );
    assert_eq!(listed["records"], json!([]));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn unknown_category_rejects_only_that_record() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    select_workspace(&mut stdin, &mut reader, "quizbank-unknown-tag");

    let batch = json!([
        {
            "question": "Who won the 2026 Australian Open men's title?",
            "option_1": "A", "option_2": "B", "option_3": "C", "option_4": "D",
            "ans": 1,
            "categories": ["Sports", "Foobar"]
        },
        {
            "question": "Which state launched the new solar mission?",
            "option_1": "A", "option_2": "B", "option_3": "C", "option_4": "D",
            "ans": 4,
            "categories": ["State"]
        }
    ]);
    let report = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "import.apply",
        json!({ "json": batch, "fallbackDate": "2026-02-01" }),
    );
    assert_eq!(report["created"], json!(1));
    assert_eq!(report["rejected"][0]["index"], json!(0));
    assert_eq!(report["rejected"][0]["code"], json!("category.unknown_tag"));

    let listed = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "records.list",
        json!({ "kind": "mcq", "bank": "currentaffairs_mcq" }),
    );
    let records = listed["records"].as_array().expect("records");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["ans"], json!(4));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn held_write_lock_times_out_only_the_records_that_write() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let workspace = select_workspace(&mut stdin, &mut reader, "quizbank-busy");

    let other = rusqlite::Connection::open(workspace.join("quizbank.sqlite3")).expect("open db");
    other.execute_batch("BEGIN IMMEDIATE").expect("hold write lock");

    let batch = json!([
        "not a record",
        {
            "question": "Which river is the longest in India?",
            "option_1": "Ganga", "option_2": "Godavari", "option_3": "Yamuna",
            "ans": 1,
            "day": "2026-03-10"
        }
    ]);
    let report = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "import.apply",
        json!({ "json": batch, "bank": "geography", "timeoutMs": 200 }),
    );
    assert_eq!(report["created"], json!(0));
    let rejected = report["rejected"].as_array().expect("rejected");
    assert_eq!(rejected.len(), 2);
    assert_eq!(rejected[0]["index"], json!(0));
    assert_eq!(rejected[1]["index"], json!(1));
    assert_eq!(rejected[1]["code"], json!("storage.timeout"));

    other.execute_batch("ROLLBACK").expect("release lock");
    let listed = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "records.list",
        json!({ "kind": "mcq" }),
    );
    assert_eq!(listed["records"].as_array().map(|a| a.len()), Some(0));

    drop(stdin);
    let _ = child.wait();
}
