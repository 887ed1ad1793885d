//! Workspace-database implementation of [`ContentStore`].
//!
//! Folders and files live in the `folders` and `files` tables; file bytes are
//! kept inline as blobs with their size and sha256. Children are enumerated
//! by `sort_order`, which is assigned in creation order within a parent.

use crate::db;
use crate::host::{ContentStore, FileNode, FolderNode, HostError};
use anyhow::Context;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::debug;
use uuid::Uuid;

pub struct SqliteStorage<'a> {
    conn: &'a Connection,
}

fn backend(e: rusqlite::Error) -> HostError {
    HostError::backend(e)
}

fn next_folder_order(conn: &Connection, parent_id: Option<&str>) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COALESCE(MAX(sort_order), -1) + 1 FROM folders WHERE parent_id IS ?",
        [parent_id],
        |r| r.get(0),
    )
}

fn next_file_order(conn: &Connection, folder_id: &str) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COALESCE(MAX(sort_order), -1) + 1 FROM files WHERE folder_id = ?",
        [folder_id],
        |r| r.get(0),
    )
}

fn file_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<FileNode> {
    Ok(FileNode {
        id: r.get(0)?,
        name: r.get(1)?,
        size: r.get::<_, i64>(2)?.max(0) as u64,
        sha256: r.get(3)?,
    })
}

impl<'a> SqliteStorage<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn ensure_folder(&self, id: &str) -> Result<(), HostError> {
        self.folder(id).map(|_| ())
    }

    fn insert_folder(&mut self, parent_id: Option<&str>, name: &str) -> Result<FolderNode, HostError> {
        let id = Uuid::new_v4().to_string();
        let order = next_folder_order(self.conn, parent_id).map_err(backend)?;
        self.conn
            .execute(
                "INSERT INTO folders(id, parent_id, name, sort_order, created_at) VALUES(?, ?, ?, ?, ?)",
                params![id, parent_id, name, order, db::now_ts()],
            )
            .map_err(backend)?;
        Ok(FolderNode {
            id,
            name: name.to_string(),
        })
    }

    /// A top-level folder (no parent), e.g. the lesson library or a
    /// student's drive folder.
    pub fn create_root(&mut self, name: &str) -> Result<FolderNode, HostError> {
        self.insert_folder(None, name)
    }

    pub fn put_file(&mut self, folder_id: &str, name: &str, bytes: &[u8]) -> Result<FileNode, HostError> {
        self.ensure_folder(folder_id)?;
        let id = Uuid::new_v4().to_string();
        let sha256 = format!("{:x}", Sha256::digest(bytes));
        let order = next_file_order(self.conn, folder_id).map_err(backend)?;
        self.conn
            .execute(
                "INSERT INTO files(id, folder_id, name, content, size, sha256, sort_order, created_at)
                 VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
                params![
                    id,
                    folder_id,
                    name,
                    bytes,
                    bytes.len() as i64,
                    sha256,
                    order,
                    db::now_ts()
                ],
            )
            .map_err(backend)?;
        Ok(FileNode {
            id,
            name: name.to_string(),
            size: bytes.len() as u64,
            sha256,
        })
    }

    #[cfg(test)]
    pub fn file_content(&self, file_id: &str) -> Result<Vec<u8>, HostError> {
        self.conn
            .query_row("SELECT content FROM files WHERE id = ?", [file_id], |r| r.get(0))
            .optional()
            .map_err(backend)?
            .ok_or_else(|| HostError::FileNotFound(file_id.to_string()))
    }

    pub fn roots(&self) -> Result<Vec<FolderNode>, HostError> {
        self.folders_where_parent(None)
    }

    fn folders_where_parent(&self, parent_id: Option<&str>) -> Result<Vec<FolderNode>, HostError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name FROM folders WHERE parent_id IS ? ORDER BY sort_order, name")
            .map_err(backend)?;
        let rows = stmt
            .query_map([parent_id], |r| {
                Ok(FolderNode {
                    id: r.get(0)?,
                    name: r.get(1)?,
                })
            })
            .map_err(backend)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(backend)
    }
}

impl ContentStore for SqliteStorage<'_> {
    fn folder(&self, id: &str) -> Result<FolderNode, HostError> {
        self.conn
            .query_row("SELECT id, name FROM folders WHERE id = ?", [id], |r| {
                Ok(FolderNode {
                    id: r.get(0)?,
                    name: r.get(1)?,
                })
            })
            .optional()
            .map_err(backend)?
            .ok_or_else(|| HostError::FolderNotFound(id.to_string()))
    }

    fn parent_id(&self, id: &str) -> Result<Option<String>, HostError> {
        self.conn
            .query_row("SELECT parent_id FROM folders WHERE id = ?", [id], |r| {
                r.get::<_, Option<String>>(0)
            })
            .optional()
            .map_err(backend)?
            .ok_or_else(|| HostError::FolderNotFound(id.to_string()))
    }

    fn child_files(&self, folder_id: &str) -> Result<Vec<FileNode>, HostError> {
        self.ensure_folder(folder_id)?;
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, name, size, sha256 FROM files WHERE folder_id = ? ORDER BY sort_order, name",
            )
            .map_err(backend)?;
        let rows = stmt.query_map([folder_id], file_from_row).map_err(backend)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(backend)
    }

    fn child_folders(&self, folder_id: &str) -> Result<Vec<FolderNode>, HostError> {
        self.ensure_folder(folder_id)?;
        self.folders_where_parent(Some(folder_id))
    }

    fn create_folder(&mut self, parent_id: &str, name: &str) -> Result<FolderNode, HostError> {
        self.ensure_folder(parent_id)?;
        self.insert_folder(Some(parent_id), name)
    }

    fn copy_file(&mut self, file_id: &str, destination_id: &str) -> Result<FileNode, HostError> {
        self.ensure_folder(destination_id)?;
        let id = Uuid::new_v4().to_string();
        let order = next_file_order(self.conn, destination_id).map_err(backend)?;
        let copied = self
            .conn
            .execute(
                "INSERT INTO files(id, folder_id, name, content, size, sha256, sort_order, created_at)
                 SELECT ?, ?, name, content, size, sha256, ?, ? FROM files WHERE id = ?",
                params![id, destination_id, order, db::now_ts(), file_id],
            )
            .map_err(backend)?;
        if copied == 0 {
            return Err(HostError::FileNotFound(file_id.to_string()));
        }
        self.conn
            .query_row(
                "SELECT id, name, size, sha256 FROM files WHERE id = ?",
                [&id],
                file_from_row,
            )
            .map_err(backend)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderTree {
    pub id: String,
    pub name: String,
    pub files: Vec<FileNode>,
    pub folders: Vec<FolderTree>,
}

/// The folder and everything below it, in enumeration order.
pub fn tree<S>(store: &S, folder_id: &str) -> Result<FolderTree, HostError>
where
    S: ContentStore + ?Sized,
{
    let folder = store.folder(folder_id)?;
    let files = store.child_files(&folder.id)?;
    let mut folders = Vec::new();
    for child in store.child_folders(&folder.id)? {
        folders.push(tree(store, &child.id)?);
    }
    Ok(FolderTree {
        id: folder.id,
        name: folder.name,
        files,
        folders,
    })
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub root: FolderNode,
    pub folders: usize,
    pub files: usize,
}

/// Copies a directory from disk into the store, as a new root folder or under
/// `parent_id`. Entries are imported in file-name order; symlinks and other
/// special files are skipped.
pub fn import_dir(
    storage: &mut SqliteStorage<'_>,
    parent_id: Option<&str>,
    path: &Path,
) -> anyhow::Result<ImportSummary> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .filter(|n| !n.is_empty())
        .with_context(|| format!("directory has no name: {}", path.display()))?;
    let root = match parent_id {
        Some(p) => storage.create_folder(p, &name)?,
        None => storage.create_root(&name)?,
    };
    let mut summary = ImportSummary {
        root: root.clone(),
        folders: 1,
        files: 0,
    };
    import_children(storage, &root, path, &mut summary)?;
    Ok(summary)
}

fn import_children(
    storage: &mut SqliteStorage<'_>,
    folder: &FolderNode,
    path: &Path,
    summary: &mut ImportSummary,
) -> anyhow::Result<()> {
    let mut entries = std::fs::read_dir(path)
        .with_context(|| format!("read dir: {}", path.display()))?
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("read dir entry: {}", path.display()))?;
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let child_path = entry.path();
        let file_type = entry.file_type()?;
        let child_name = entry.file_name().to_string_lossy().to_string();
        if file_type.is_dir() {
            let child = storage.create_folder(&folder.id, &child_name)?;
            summary.folders += 1;
            import_children(storage, &child, &child_path, summary)?;
        } else if file_type.is_file() {
            let bytes = std::fs::read(&child_path)
                .with_context(|| format!("read file: {}", child_path.display()))?;
            storage.put_file(&folder.id, &child_name, &bytes)?;
            summary.files += 1;
        } else {
            debug!(path = %child_path.display(), "skipping special file");
        }
    }
    Ok(())
}
