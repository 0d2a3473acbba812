use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use rusqlite::Connection;
use serde_json::json;

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

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Mcq,
    Descriptive,
}

fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr {
            code: "bad_params",
            message: format!("missing {}", key),
            details: None,
        })
}

fn get_kind(params: &serde_json::Value) -> Result<Kind, HandlerErr> {
    match get_required_str(params, "kind")?.as_str() {
        "mcq" => Ok(Kind::Mcq),
        "descriptive" => Ok(Kind::Descriptive),
        other => Err(HandlerErr {
            code: "bad_params",
            message: format!("kind must be mcq or descriptive, got {}", other),
            details: None,
        }),
    }
}

fn query_err(e: rusqlite::Error) -> HandlerErr {
    HandlerErr {
        code: "db_query_failed",
        message: e.to_string(),
        details: None,
    }
}

fn require_db(state: &AppState) -> Result<&Connection, HandlerErr> {
    state.db.as_ref().ok_or_else(|| HandlerErr {
        code: "no_workspace",
        message: "select a workspace first".into(),
        details: None,
    })
}

fn records_list(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let kind = get_kind(params)?;
    let day = params.get("day").and_then(|v| v.as_str());
    let records = match kind {
        Kind::Mcq => {
            let bank = params.get("bank").and_then(|v| v.as_str());
            db::mcq_list(conn, bank, day).map_err(query_err)?
        }
        Kind::Descriptive => db::descriptive_list(conn, day).map_err(query_err)?,
    };
    Ok(json!({ "records": records }))
}

fn records_get(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let kind = get_kind(params)?;
    let id = get_required_str(params, "id")?;
    let found = match kind {
        Kind::Mcq => db::mcq_get(conn, &id),
        Kind::Descriptive => db::descriptive_get(conn, &id),
    }
    .map_err(query_err)?;
    let Some(record) = found else {
        return Err(HandlerErr {
            code: "not_found",
            message: "record not found".into(),
            details: Some(json!({ "id": id })),
        });
    };
    Ok(json!({ "record": record }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "records.list" => records_list(state, &req.params),
        "records.get" => records_get(state, &req.params),
        _ => return None,
    };
    Some(match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    })
}
