use crate::host::ContentStore;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, host_error, opt_str, required_str, to_result};
use crate::ipc::types::{AppState, Request};
use crate::replicate::replicate;
use crate::storage::{self, SqliteStorage};
use serde_json::json;
use std::path::PathBuf;

fn handle_folders_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let name = match required_str(req, "name") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let mut store = SqliteStorage::new(conn);
    let created = match opt_str(req, "parentId") {
        Some(parent) => store.create_folder(&parent, &name),
        None => store.create_root(&name),
    };
    match created {
        Ok(folder) => ok(&req.id, json!({ "folder": folder })),
        Err(e) => host_error(req, &e),
    }
}

fn handle_folders_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let store = SqliteStorage::new(conn);
    let listed = match opt_str(req, "parentId") {
        Some(parent) => store.child_folders(&parent),
        None => store.roots(),
    };
    match listed {
        Ok(folders) => ok(&req.id, json!({ "folders": folders })),
        Err(e) => host_error(req, &e),
    }
}

fn handle_import_dir(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let path = match required_str(req, "path") {
        Ok(v) => PathBuf::from(v),
        Err(e) => return e,
    };
    if !path.is_dir() {
        return err(
            &req.id,
            "not_found",
            "directory not found",
            Some(json!({ "path": path.to_string_lossy() })),
        );
    }
    let parent = opt_str(req, "parentId");

    let tx = match conn.unchecked_transaction() {
        Ok(t) => t,
        Err(e) => return err(&req.id, "db_tx_failed", e.to_string(), None),
    };
    let mut store = SqliteStorage::new(&tx);
    let summary = match storage::import_dir(&mut store, parent.as_deref(), &path) {
        Ok(v) => v,
        Err(e) => {
            return err(
                &req.id,
                "io_failed",
                format!("{e:#}"),
                Some(json!({ "path": path.to_string_lossy() })),
            )
        }
    };
    if let Err(e) = tx.commit() {
        return err(&req.id, "db_commit_failed", e.to_string(), None);
    }
    tracing::info!(
        root = %summary.root.id,
        folders = summary.folders,
        files = summary.files,
        "directory imported"
    );
    match to_result(req, &summary) {
        Ok(v) => ok(&req.id, v),
        Err(e) => e,
    }
}

fn handle_tree(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let folder_id = match required_str(req, "folderId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match storage::tree(&SqliteStorage::new(conn), &folder_id) {
        Ok(tree) => ok(&req.id, json!({ "tree": tree })),
        Err(e) => host_error(req, &e),
    }
}

fn handle_replicate(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let source_id = match required_str(req, "sourceId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let destination_id = match required_str(req, "destinationId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let mut store = SqliteStorage::new(conn);
    let source = match store.folder(&source_id) {
        Ok(f) => f,
        Err(e) => return host_error(req, &e),
    };
    let replica = match replicate(&mut store, &source, &destination_id) {
        Ok(r) => r,
        Err(e) => return host_error(req, &e),
    };
    match to_result(req, &replica) {
        Ok(v) => ok(&req.id, v),
        Err(e) => e,
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "storage.folders.create" => Some(handle_folders_create(state, req)),
        "storage.folders.list" => Some(handle_folders_list(state, req)),
        "storage.importDir" => Some(handle_import_dir(state, req)),
        "storage.tree" => Some(handle_tree(state, req)),
        "storage.replicate" => Some(handle_replicate(state, req)),
        _ => None,
    }
}
