use crate::backup;
use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{opt_str, required_str};
use crate::ipc::types::{AppState, Request};
use crate::sheets;
use serde_json::{json, Value};
use std::path::PathBuf;
use tracing::{info, warn};

fn io_failed(req: &Request, e: anyhow::Error, path: &str) -> Value {
    err(&req.id, "io_failed", format!("{e:#}"), Some(json!({ "path": path })))
}

fn export(state: &AppState, req: &Request) -> Result<Value, Value> {
    let out_path = required_str(req, "outPath")?;
    let (Some(workspace), Some(conn)) = (state.workspace.as_deref(), state.db.as_ref()) else {
        return Err(err(&req.id, "no_workspace", "select a workspace first", None));
    };

    // Fold any WAL pages into the main file so the copied database is whole.
    if let Err(e) = conn.execute_batch("PRAGMA wal_checkpoint(FULL)") {
        warn!(error = %e, "checkpoint before export failed");
    }
    let dump = sheets::dump_all(conn)
        .map_err(|e| err(&req.id, "db_query_failed", e.to_string(), None))?;

    let summary = backup::export_workspace_bundle(workspace, &dump, &PathBuf::from(&out_path))
        .map_err(|e| io_failed(req, e, &out_path))?;
    info!(path = %out_path, entries = summary.entry_count, "workspace bundle exported");

    Ok(json!({
        "path": out_path,
        "bundleFormat": summary.bundle_format,
        "entryCount": summary.entry_count,
        "sheetEntries": summary.sheet_entries,
    }))
}

/// Restores into `workspacePath` (or the open workspace) and leaves that
/// workspace selected.
fn import(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let in_path = required_str(req, "inPath")?;
    let target = opt_str(req, "workspacePath")
        .map(PathBuf::from)
        .or_else(|| state.workspace.clone())
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))?;
    let source = PathBuf::from(&in_path);
    if !source.is_file() {
        return Err(err(
            &req.id,
            "not_found",
            "bundle file not found",
            Some(json!({ "path": in_path })),
        ));
    }

    // The database file is about to be replaced; drop the connection first.
    state.db = None;
    state.workspace = None;

    let summary = backup::import_workspace_bundle(&source, &target)
        .map_err(|e| io_failed(req, e, &in_path))?;
    let conn = db::open_db(&target)
        .map_err(|e| err(&req.id, "db_open_failed", format!("{e:#}"), None))?;
    info!(
        workspace = %target.display(),
        format = %summary.bundle_format_detected,
        sheets = summary.sheets.len(),
        "workspace restored"
    );
    state.workspace = Some(target.clone());
    state.db = Some(conn);

    Ok(json!({
        "workspacePath": target.to_string_lossy(),
        "bundleFormatDetected": summary.bundle_format_detected,
        "sheets": summary.sheets,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "backup.exportWorkspaceBundle" => export(state, req),
        "backup.importWorkspaceBundle" => import(state, req),
        _ => return None,
    };
    Some(match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => e,
    })
}
