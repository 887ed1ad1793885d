use crate::advance::{self, AdvanceOutcome, LessonContext};
use crate::error::LessonError;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    db_conn, lesson_error, load_settings, opt_bool, selection, to_result,
};
use crate::ipc::types::{AppState, Request};
use crate::lesson::LessonFormat;
use crate::maintenance;
use crate::settings::LessonSettings;
use crate::sheets::SqliteSheets;
use crate::storage::SqliteStorage;
use serde_json::{json, Value};

fn lesson_format(req: &Request, settings: &LessonSettings) -> Result<LessonFormat, Value> {
    settings.format().map_err(|e| {
        err(
            &req.id,
            "lookup_failed",
            format!("lesson marker setting is invalid: {}", e),
            None,
        )
    })
}

/// Settings of the open workspace, or the defaults when none is open.
fn settings_or_default(state: &AppState, req: &Request) -> Result<LessonSettings, Value> {
    match state.db.as_ref() {
        Some(conn) => load_settings(req, conn),
        None => Ok(LessonSettings::default()),
    }
}

fn handle_resolve(state: &mut AppState, req: &Request) -> Value {
    let settings = match settings_or_default(state, req) {
        Ok(s) => s,
        Err(e) => return e,
    };
    let format = match lesson_format(req, &settings) {
        Ok(f) => f,
        Err(e) => return e,
    };
    let raw = req
        .params
        .get("label")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    match format.resolve(raw) {
        Ok(n) => ok(&req.id, json!({ "number": n, "label": format.label(n) })),
        Err(e) => lesson_error(req, &LessonError::from_resolve(e, "lesson label")),
    }
}

fn handle_advance_preview(state: &mut AppState, req: &Request) -> Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let sel = match selection(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let settings = match load_settings(req, conn) {
        Ok(s) => s,
        Err(e) => return e,
    };
    let mut sheets = SqliteSheets::new(conn);
    let mut storage = SqliteStorage::new(conn);
    let ctx = LessonContext {
        sheets: &mut sheets,
        storage: &mut storage,
        settings: &settings,
    };
    let plan = match advance::plan(&ctx, &sel) {
        Ok(p) => p,
        Err(e) => return lesson_error(req, &e),
    };
    let message = plan.confirm_message();
    match to_result(req, &plan) {
        Ok(v) => ok(
            &req.id,
            json!({
                "plan": v,
                "confirm": { "title": advance::CONFIRM_TITLE, "message": message }
            }),
        ),
        Err(e) => e,
    }
}

fn handle_advance(state: &mut AppState, req: &Request) -> Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let sel = match selection(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let confirmed = match req.params.get("confirm").and_then(|v| v.as_bool()) {
        Some(b) => b,
        None => return err(&req.id, "bad_params", "confirm must be boolean", None),
    };
    let settings = match load_settings(req, conn) {
        Ok(s) => s,
        Err(e) => return e,
    };
    let mut sheets = SqliteSheets::new(conn);
    let mut storage = SqliteStorage::new(conn);
    let mut ctx = LessonContext {
        sheets: &mut sheets,
        storage: &mut storage,
        settings: &settings,
    };
    let mut answer = |_: &str, _: &str| confirmed;
    let outcome = match advance::advance(&mut ctx, &sel, &mut answer) {
        Ok(o) => o,
        Err(e) => return lesson_error(req, &e),
    };
    let advanced = matches!(outcome, AdvanceOutcome::Advanced { .. });
    match to_result(req, &outcome) {
        Ok(v) => ok(&req.id, json!({ "advanced": advanced, "outcome": v })),
        Err(e) => e,
    }
}

fn handle_fix(state: &mut AppState, req: &Request) -> Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let sel = match selection(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let input = match req.params.get("lesson") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => return err(&req.id, "bad_params", "missing lesson", None),
    };
    let settings = match load_settings(req, conn) {
        Ok(s) => s,
        Err(e) => return e,
    };
    let format = match lesson_format(req, &settings) {
        Ok(f) => f,
        Err(e) => return e,
    };
    let mut sheets = SqliteSheets::new(conn);
    match maintenance::fix_lesson(&mut sheets, &format, &sel, &input) {
        Ok(outcome) => match to_result(req, &outcome) {
            Ok(v) => ok(&req.id, v),
            Err(e) => e,
        },
        Err(e) => lesson_error(req, &e),
    }
}

fn handle_cleanup(state: &mut AppState, req: &Request) -> Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let dry_run = match opt_bool(req, "dryRun", false) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let settings = match load_settings(req, conn) {
        Ok(s) => s,
        Err(e) => return e,
    };
    let format = match lesson_format(req, &settings) {
        Ok(f) => f,
        Err(e) => return e,
    };

    let tx = match conn.unchecked_transaction() {
        Ok(t) => t,
        Err(e) => return err(&req.id, "db_tx_failed", e.to_string(), None),
    };
    let mut sheets = SqliteSheets::new(&tx);
    let report = match maintenance::cleanup(&mut sheets, &format, dry_run) {
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

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "lessons.resolve" => Some(handle_resolve(state, req)),
        "lessons.advance.preview" => Some(handle_advance_preview(state, req)),
        "lessons.advance" => Some(handle_advance(state, req)),
        "lessons.fix" => Some(handle_fix(state, req)),
        "lessons.cleanup" => Some(handle_cleanup(state, req)),
        _ => None,
    }
}

