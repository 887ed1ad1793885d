use super::{ContentStore, FileNode, FolderNode, HostError, TabularStore};
use sha2::{Digest, Sha256};

#[derive(Debug, Default)]
pub struct MemorySheets {
    sheets: Vec<(String, Vec<Vec<String>>)>,
}

impl MemorySheets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sheet(mut self, name: &str, rows: &[&[&str]]) -> Self {
        let rows = rows
            .iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect();
        self.sheets.push((name.to_string(), rows));
        self
    }

    pub fn cell(&self, sheet: &str, row: usize, col: usize) -> Option<&str> {
        self.sheets
            .iter()
            .find(|(n, _)| n == sheet)
            .and_then(|(_, rows)| rows.get(row - 1))
            .and_then(|r| r.get(col - 1))
            .map(|s| s.as_str())
    }
}

impl TabularStore for MemorySheets {
    fn has_sheet(&self, sheet: &str) -> Result<bool, HostError> {
        Ok(self.sheets.iter().any(|(n, _)| n == sheet))
    }

    fn read_all(&self, sheet: &str) -> Result<Vec<Vec<String>>, HostError> {
        self.sheets
            .iter()
            .find(|(n, _)| n == sheet)
            .map(|(_, rows)| rows.clone())
            .ok_or_else(|| HostError::SheetNotFound(sheet.to_string()))
    }

    fn write_cell(
        &mut self,
        sheet: &str,
        row: usize,
        col: usize,
        value: &str,
    ) -> Result<(), HostError> {
        if row == 0 || col == 0 {
            return Err(HostError::InvalidCell { row, col });
        }
        let Some((_, rows)) = self.sheets.iter_mut().find(|(n, _)| n == sheet) else {
            return Err(HostError::SheetNotFound(sheet.to_string()));
        };
        if rows.len() < row {
            rows.resize_with(row, Vec::new);
        }
        let r = &mut rows[row - 1];
        if r.len() < col {
            r.resize(col, String::new());
        }
        r[col - 1] = value.to_string();
        Ok(())
    }
}

#[derive(Debug)]
struct MemFolder {
    id: String,
    parent: Option<String>,
    name: String,
}

#[derive(Debug)]
struct MemFile {
    id: String,
    folder: String,
    name: String,
    bytes: Vec<u8>,
}

/// In-memory content library. `fail_after` makes the n-th mutating call
/// (folder creation or file copy) fail, to exercise partial copies.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    folders: Vec<MemFolder>,
    files: Vec<MemFile>,
    next_id: usize,
    mutations: usize,
    pub fail_after: Option<usize>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn mint(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }

    fn tick(&mut self) -> Result<(), HostError> {
        self.mutations += 1;
        match self.fail_after {
            Some(limit) if self.mutations > limit => Err(HostError::backend("quota exceeded")),
            _ => Ok(()),
        }
    }

    pub fn add_root(&mut self, name: &str) -> FolderNode {
        let id = self.mint("folder");
        self.folders.push(MemFolder {
            id: id.clone(),
            parent: None,
            name: name.to_string(),
        });
        FolderNode {
            id,
            name: name.to_string(),
        }
    }

    pub fn add_folder(&mut self, parent: &FolderNode, name: &str) -> FolderNode {
        let id = self.mint("folder");
        self.folders.push(MemFolder {
            id: id.clone(),
            parent: Some(parent.id.clone()),
            name: name.to_string(),
        });
        FolderNode {
            id,
            name: name.to_string(),
        }
    }

    pub fn add_file(&mut self, folder: &FolderNode, name: &str, bytes: &[u8]) -> String {
        let id = self.mint("file");
        self.files.push(MemFile {
            id: id.clone(),
            folder: folder.id.clone(),
            name: name.to_string(),
            bytes: bytes.to_vec(),
        });
        id
    }

    pub fn file_bytes(&self, folder_id: &str, name: &str) -> Option<&[u8]> {
        self.files
            .iter()
            .find(|f| f.folder == folder_id && f.name == name)
            .map(|f| f.bytes.as_slice())
    }

    pub fn folder_count(&self) -> usize {
        self.folders.len()
    }

    fn exists(&self, id: &str) -> bool {
        self.folders.iter().any(|f| f.id == id)
    }

    fn file_node(f: &MemFile) -> FileNode {
        FileNode {
            id: f.id.clone(),
            name: f.name.clone(),
            size: f.bytes.len() as u64,
            sha256: format!("{:x}", Sha256::digest(&f.bytes)),
        }
    }
}

impl ContentStore for MemoryStorage {
    fn folder(&self, id: &str) -> Result<FolderNode, HostError> {
        self.folders
            .iter()
            .find(|f| f.id == id)
            .map(|f| FolderNode {
                id: f.id.clone(),
                name: f.name.clone(),
            })
            .ok_or_else(|| HostError::FolderNotFound(id.to_string()))
    }

    fn parent_id(&self, id: &str) -> Result<Option<String>, HostError> {
        self.folders
            .iter()
            .find(|f| f.id == id)
            .map(|f| f.parent.clone())
            .ok_or_else(|| HostError::FolderNotFound(id.to_string()))
    }

    fn child_files(&self, folder_id: &str) -> Result<Vec<FileNode>, HostError> {
        if !self.exists(folder_id) {
            return Err(HostError::FolderNotFound(folder_id.to_string()));
        }
        Ok(self
            .files
            .iter()
            .filter(|f| f.folder == folder_id)
            .map(Self::file_node)
            .collect())
    }

    fn child_folders(&self, folder_id: &str) -> Result<Vec<FolderNode>, HostError> {
        if !self.exists(folder_id) {
            return Err(HostError::FolderNotFound(folder_id.to_string()));
        }
        Ok(self
            .folders
            .iter()
            .filter(|f| f.parent.as_deref() == Some(folder_id))
            .map(|f| FolderNode {
                id: f.id.clone(),
                name: f.name.clone(),
            })
            .collect())
    }

    fn create_folder(&mut self, parent_id: &str, name: &str) -> Result<FolderNode, HostError> {
        if !self.exists(parent_id) {
            return Err(HostError::FolderNotFound(parent_id.to_string()));
        }
        self.tick()?;
        let id = self.mint("folder");
        self.folders.push(MemFolder {
            id: id.clone(),
            parent: Some(parent_id.to_string()),
            name: name.to_string(),
        });
        Ok(FolderNode {
            id,
            name: name.to_string(),
        })
    }

    fn copy_file(&mut self, file_id: &str, destination_id: &str) -> Result<FileNode, HostError> {
        if !self.exists(destination_id) {
            return Err(HostError::FolderNotFound(destination_id.to_string()));
        }
        let Some(src) = self.files.iter().find(|f| f.id == file_id) else {
            return Err(HostError::FileNotFound(file_id.to_string()));
        };
        let (name, bytes) = (src.name.clone(), src.bytes.clone());
        self.tick()?;
        let copy = MemFile {
            id: self.mint("file"),
            folder: destination_id.to_string(),
            name,
            bytes,
        };
        let node = Self::file_node(&copy);
        self.files.push(copy);
        Ok(node)
    }
}
