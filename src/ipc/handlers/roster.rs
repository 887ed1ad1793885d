use crate::activity::{self, MessageUpdate, PracticeUpdate};
use crate::inactive;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, lesson_error, load_settings, opt_str, to_result};
use crate::ipc::types::{AppState, Request};
use crate::sheets::SqliteSheets;
use chrono::{NaiveDate, NaiveDateTime};
use serde::de::DeserializeOwned;
use serde_json::json;

fn handle_inactive(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let today = match opt_str(req, "today") {
        Some(raw) => match NaiveDate::parse_from_str(&raw, "%Y-%m-%d") {
            Ok(d) => d,
            Err(_) => return err(&req.id, "bad_params", "today must be YYYY-MM-DD", None),
        },
        None => chrono::Local::now().date_naive(),
    };
    let settings = match load_settings(req, conn) {
        Ok(s) => s,
        Err(e) => return e,
    };
    let days = match req.params.get("days") {
        None | Some(serde_json::Value::Null) => settings.inactive_days,
        Some(v) => match v.as_u64().filter(|n| (1..=365).contains(n)) {
            Some(n) => n as u32,
            None => return err(&req.id, "bad_params", "days must be in 1..=365", None),
        },
    };

    match inactive::scan(&SqliteSheets::new(conn), today, days) {
        Ok(students) => ok(
            &req.id,
            json!({
                "today": today.to_string(),
                "thresholdDays": days,
                "students": students
            }),
        ),
        Err(e) => lesson_error(req, &e),
    }
}

/// Absent or null means an empty list.
fn update_list<T: DeserializeOwned>(req: &Request, key: &str) -> Result<Vec<T>, serde_json::Value> {
    match req.params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(Vec::new()),
        Some(v) => serde_json::from_value(v.clone()).map_err(|e| {
            err(
                &req.id,
                "bad_params",
                format!("{key} must be a list of updates: {e}"),
                None,
            )
        }),
    }
}

fn handle_record_activity(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let practice: Vec<PracticeUpdate> = match update_list(req, "practice") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let messages: Vec<MessageUpdate> = match update_list(req, "messages") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let now = match opt_str(req, "now") {
        Some(raw) => match NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S") {
            Ok(t) => t,
            Err(_) => return err(&req.id, "bad_params", "now must be YYYY-MM-DDTHH:MM:SS", None),
        },
        None => chrono::Local::now().naive_local(),
    };

    let tx = match conn.unchecked_transaction() {
        Ok(t) => t,
        Err(e) => return err(&req.id, "db_tx_failed", e.to_string(), None),
    };
    let mut sheets = SqliteSheets::new(&tx);
    let report = match activity::record(&mut sheets, &practice, &messages, now) {
        Ok(r) => r,
        Err(e) => return lesson_error(req, &e),
    };
    if let Err(e) = tx.commit() {
        return err(&req.id, "db_commit_failed", e.to_string(), None);
    }
    match to_result(req, &report) {
        Ok(v) => ok(&req.id, v),
        Err(e) => e,
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "roster.inactive" => Some(handle_inactive(state, req)),
        "roster.recordActivity" => Some(handle_record_activity(state, req)),
        _ => None,
    }
}
