use std::path::PathBuf;
use std::time::Duration;

use chrono::{Local, NaiveTime};
use serde_json::json;

use crate::db::SqliteStore;
use crate::import::dates::{parse_day, parse_time};
use crate::import::normalize::is_standard_bank;
use crate::import::{run_batch, Fallback, ImportMode, ImportOptions};
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};

struct HandlerErr {
    code: &'static str,
    message: String,
    details: Option<serde_json::Value>,
}

impl HandlerErr {
    fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }
}

fn bad_params(message: impl Into<String>) -> HandlerErr {
    HandlerErr {
        code: "bad_params",
        message: message.into(),
        details: None,
    }
}

fn get_optional_str<'a>(params: &'a serde_json::Value, key: &str) -> Result<Option<&'a str>, HandlerErr> {
    match params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(v) => v
            .as_str()
            .map(|s| Some(s.trim()))
            .ok_or_else(|| bad_params(format!("{} must be a string", key))),
    }
}

/// The batch text, from `json` (inline text or an already-parsed value) or
/// from the file named by `inPath`.
fn read_payload(params: &serde_json::Value) -> Result<String, HandlerErr> {
    if let Some(v) = params.get("json") {
        return Ok(match v {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        });
    }
    let Some(in_path) = get_optional_str(params, "inPath")? else {
        return Err(bad_params("missing json or inPath"));
    };
    let path = PathBuf::from(in_path);
    std::fs::read_to_string(&path).map_err(|e| HandlerErr {
        code: "read_failed",
        message: e.to_string(),
        details: Some(json!({ "path": path.to_string_lossy() })),
    })
}

fn parse_options(state: &AppState, params: &serde_json::Value) -> Result<ImportOptions, HandlerErr> {
    let bank = get_optional_str(params, "bank")?
        .unwrap_or(state.config.default_bank.as_str())
        .to_string();
    if !is_standard_bank(&bank) {
        return Err(HandlerErr {
            code: "bad_params",
            message: format!("unknown bank: {}", bank),
            details: Some(json!({ "bank": bank })),
        });
    }

    let date = match get_optional_str(params, "fallbackDate")? {
        Some(s) => parse_day(s).ok_or_else(|| bad_params(format!("invalid fallbackDate: {}", s)))?,
        None => Local::now().date_naive(),
    };
    let time = match get_optional_str(params, "fallbackTime")? {
        Some(s) => parse_time(s).ok_or_else(|| bad_params(format!("invalid fallbackTime: {}", s)))?,
        None => NaiveTime::MIN,
    };

    Ok(ImportOptions {
        fallback: Fallback { date, time },
        bank,
    })
}

fn parse_timeout(state: &AppState, params: &serde_json::Value) -> Result<Duration, HandlerErr> {
    match params.get("timeoutMs") {
        None | Some(serde_json::Value::Null) => Ok(state.config.storage_timeout),
        Some(v) => match v.as_u64() {
            Some(ms) if ms > 0 => Ok(Duration::from_millis(ms)),
            _ => Err(bad_params("timeoutMs must be a positive integer")),
        },
    }
}

fn run_import(state: &AppState, req: &Request, mode: ImportMode) -> Result<serde_json::Value, HandlerErr> {
    let Some(conn) = state.db.as_ref() else {
        return Err(HandlerErr {
            code: "no_workspace",
            message: "select a workspace first".into(),
            details: None,
        });
    };

    let opts = parse_options(state, &req.params)?;
    let timeout = parse_timeout(state, &req.params)?;
    let payload = read_payload(&req.params)?;

    let mut store = SqliteStore::new(conn, timeout).map_err(|e| HandlerErr {
        code: "db_query_failed",
        message: e.to_string(),
        details: None,
    })?;

    let report = run_batch(&mut store, &payload, &opts, mode).map_err(|e| {
        tracing::warn!(error = %e, "import payload rejected");
        HandlerErr {
            code: "bad_json_payload",
            message: e.to_string(),
            details: None,
        }
    })?;

    serde_json::to_value(&report).map_err(|e| HandlerErr {
        code: "db_query_failed",
        message: e.to_string(),
        details: None,
    })
}

fn handle_import(state: &mut AppState, req: &Request, mode: ImportMode) -> serde_json::Value {
    match run_import(state, req, mode) {
        Ok(report) => ok(&req.id, report),
        Err(e) => e.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "import.preview" => Some(handle_import(state, req, ImportMode::Preview)),
        "import.apply" => Some(handle_import(state, req, ImportMode::Apply)),
        _ => None,
    }
}
