use crate::host::TabularStore;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, host_error, required_index, required_str};
use crate::ipc::types::{AppState, Request};
use crate::sheets::{self, SqliteSheets};
use serde_json::json;
use std::path::PathBuf;

fn handle_sheets_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    match sheets::list_sheets(conn) {
        Ok(list) => ok(&req.id, json!({ "sheets": list })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_sheets_read(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let sheet = match required_str(req, "sheet") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match SqliteSheets::new(conn).read_all(&sheet) {
        Ok(rows) => ok(&req.id, json!({ "sheet": sheet, "rows": rows })),
        Err(e) => host_error(req, &e),
    }
}

fn handle_sheets_import_csv(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let sheet = match required_str(req, "sheet") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let path = match required_str(req, "path") {
        Ok(v) => PathBuf::from(v),
        Err(e) => return e,
    };
    if !path.is_file() {
        return err(
            &req.id,
            "not_found",
            "csv file not found",
            Some(json!({ "path": path.to_string_lossy() })),
        );
    }
    match sheets::import_csv(conn, &sheet, &path) {
        Ok(rows) => {
            tracing::info!(sheet = %sheet, rows, "sheet imported from csv");
            ok(&req.id, json!({ "sheet": sheet, "rowCount": rows }))
        }
        Err(e) => err(
            &req.id,
            "io_failed",
            format!("{e:#}"),
            Some(json!({ "path": path.to_string_lossy() })),
        ),
    }
}

fn handle_sheets_set_cell(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let sheet = match required_str(req, "sheet") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let row = match required_index(req, "row") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let col = match required_index(req, "col") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let value = match req.params.get("value") {
        None | Some(serde_json::Value::Null) => String::new(),
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    };
    // Writing into a sheet that does not exist yet creates it.
    if let Err(e) = sheets::ensure_sheet(conn, &sheet) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    match SqliteSheets::new(conn).write_cell(&sheet, row, col, &value) {
        Ok(()) => ok(&req.id, json!({ "sheet": sheet, "row": row, "col": col })),
        Err(e) => host_error(req, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "sheets.list" => Some(handle_sheets_list(state, req)),
        "sheets.read" => Some(handle_sheets_read(state, req)),
        "sheets.importCsv" => Some(handle_sheets_import_csv(state, req)),
        "sheets.setCell" => Some(handle_sheets_set_cell(state, req)),
        _ => None,
    }
}
