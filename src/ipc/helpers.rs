use crate::error::LessonError;
use crate::host::HostError;
use crate::ipc::error::err;
use crate::ipc::types::{AppState, Request};
use crate::roster::RowSelection;
use crate::settings::LessonSettings;
use rusqlite::Connection;
use serde::Serialize;
use serde_json::{json, Value};

pub fn db_conn<'a>(state: &'a AppState, req: &Request) -> Result<&'a Connection, Value> {
    state
        .db
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

pub fn required_str(req: &Request, key: &str) -> Result<String, Value> {
    opt_str(req, key).ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

pub fn opt_str(req: &Request, key: &str) -> Option<String> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Positive integer parameter (rows and columns are 1-based).
pub fn required_index(req: &Request, key: &str) -> Result<usize, Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_u64())
        .filter(|n| *n >= 1)
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| {
            err(
                &req.id,
                "bad_params",
                format!("{} must be a positive integer", key),
                None,
            )
        })
}

pub fn opt_bool(req: &Request, key: &str, default: bool) -> Result<bool, Value> {
    match req.params.get(key) {
        None | Some(Value::Null) => Ok(default),
        Some(v) => v
            .as_bool()
            .ok_or_else(|| err(&req.id, "bad_params", format!("{} must be boolean", key), None)),
    }
}

pub fn selection(req: &Request) -> Result<RowSelection, Value> {
    Ok(RowSelection {
        sheet: required_str(req, "sheet")?,
        row: required_index(req, "row")?,
    })
}

pub fn load_settings(req: &Request, conn: &Connection) -> Result<LessonSettings, Value> {
    LessonSettings::load(conn).map_err(|e| err(&req.id, "db_query_failed", e.to_string(), None))
}

pub fn lesson_error(req: &Request, e: &LessonError) -> Value {
    let details = match e {
        LessonError::Parse { raw, .. } => Some(json!({ "raw": raw })),
        LessonError::Collaborator(host) => Some(json!({ "host": host.to_string() })),
        _ => None,
    };
    err(&req.id, e.code(), e.to_string(), details)
}

pub fn host_error(req: &Request, e: &HostError) -> Value {
    let code = match e {
        HostError::SheetNotFound(_) | HostError::FolderNotFound(_) | HostError::FileNotFound(_) => {
            "not_found"
        }
        HostError::InvalidCell { .. } | HostError::CopyIntoSelf { .. } => "bad_params",
        HostError::Backend { .. } => "collaborator_failure",
    };
    err(&req.id, code, e.to_string(), None)
}

pub fn to_result<T: Serialize>(req: &Request, value: &T) -> Result<Value, Value> {
    serde_json::to_value(value).map_err(|e| err(&req.id, "internal", e.to_string(), None))
}
