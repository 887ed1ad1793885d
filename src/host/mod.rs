//! Capability interfaces over the spreadsheet and content-storage hosts.
//!
//! Everything the lesson logic needs from the outside world goes through the
//! three traits here. The workspace database implements the first two
//! (`sheets::SqliteSheets`, `storage::SqliteStorage`); tests use the
//! in-memory versions in [`memory`].

#[cfg(test)]
pub mod memory;

use serde::Serialize;
use thiserror::Error;

/// A folder handle. The id is opaque and stable across sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderNode {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileNode {
    pub id: String,
    pub name: String,
    pub size: u64,
    pub sha256: String,
}

#[derive(Debug, Error)]
pub enum HostError {
    #[error("sheet \"{0}\" not found")]
    SheetNotFound(String),

    #[error("folder {0} not found")]
    FolderNotFound(String),

    #[error("file {0} not found")]
    FileNotFound(String),

    #[error("invalid cell position (row {row}, column {col})")]
    InvalidCell { row: usize, col: usize },

    /// Destination lies inside the folder being copied.
    #[error("cannot copy folder {folder_id} into its own subtree")]
    CopyIntoSelf { folder_id: String },

    #[error("storage backend failed: {message}")]
    Backend { message: String },
}

impl HostError {
    pub fn backend(e: impl std::fmt::Display) -> Self {
        Self::Backend {
            message: e.to_string(),
        }
    }

    /// True for "the thing you asked for does not exist" failures.
    pub fn is_lookup(&self) -> bool {
        matches!(
            self,
            Self::SheetNotFound(_) | Self::FolderNotFound(_) | Self::FileNotFound(_)
        )
    }
}

/// Row/cell access to named sheets.
///
/// Rows and columns are 1-based in `write_cell`, matching what a user sees in
/// a spreadsheet. `read_all` returns rows 0-based, so `rows[0]` is the header
/// row. Rows may be ragged.
pub trait TabularStore {
    fn has_sheet(&self, sheet: &str) -> Result<bool, HostError>;

    fn read_all(&self, sheet: &str) -> Result<Vec<Vec<String>>, HostError>;

    fn write_cell(
        &mut self,
        sheet: &str,
        row: usize,
        col: usize,
        value: &str,
    ) -> Result<(), HostError>;
}

/// Folder/file operations on the content library.
pub trait ContentStore {
    fn folder(&self, id: &str) -> Result<FolderNode, HostError>;

    fn parent_id(&self, id: &str) -> Result<Option<String>, HostError>;

    fn child_files(&self, folder_id: &str) -> Result<Vec<FileNode>, HostError>;

    fn child_folders(&self, folder_id: &str) -> Result<Vec<FolderNode>, HostError>;

    fn create_folder(&mut self, parent_id: &str, name: &str) -> Result<FolderNode, HostError>;

    /// Copies the file's bytes into `destination_id` under the same name.
    fn copy_file(&mut self, file_id: &str, destination_id: &str) -> Result<FileNode, HostError>;
}

/// Yes/no gate before a long-running or destructive action.
pub trait Confirmer {
    fn confirm(&mut self, title: &str, message: &str) -> bool;
}

impl<F> Confirmer for F
where
    F: FnMut(&str, &str) -> bool,
{
    fn confirm(&mut self, title: &str, message: &str) -> bool {
        self(title, message)
    }
}
