use crate::host::{ContentStore, FolderNode, HostError};
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Replica {
    pub root: FolderNode,
    pub folders_created: usize,
    pub files_copied: usize,
}

/// Copies `source` and everything below it into `destination_id`.
///
/// Nothing is staged: if the host fails part way, the folders and files
/// created so far stay where they are.
pub fn replicate<S>(store: &mut S, source: &FolderNode, destination_id: &str) -> Result<Replica, HostError>
where
    S: ContentStore + ?Sized,
{
    ensure_outside(store, &source.id, destination_id)?;
    let mut replica = Replica {
        root: source.clone(),
        folders_created: 0,
        files_copied: 0,
    };
    replica.root = copy_tree(store, source, destination_id, &mut replica)?;
    Ok(replica)
}

fn copy_tree<S>(
    store: &mut S,
    source: &FolderNode,
    parent_id: &str,
    replica: &mut Replica,
) -> Result<FolderNode, HostError>
where
    S: ContentStore + ?Sized,
{
    let copy = store.create_folder(parent_id, &source.name)?;
    replica.folders_created += 1;

    for file in store.child_files(&source.id)? {
        store.copy_file(&file.id, &copy.id)?;
        replica.files_copied += 1;
    }
    for child in store.child_folders(&source.id)? {
        copy_tree(store, &child, &copy.id, replica)?;
    }

    debug!(source = %source.id, copy = %copy.id, name = %source.name, "folder copied");
    Ok(copy)
}

// Walks up from the destination so a copy never lands inside its own source.
fn ensure_outside<S>(store: &S, source_id: &str, destination_id: &str) -> Result<(), HostError>
where
    S: ContentStore + ?Sized,
{
    let mut cursor = Some(destination_id.to_string());
    while let Some(id) = cursor {
        if id == source_id {
            return Err(HostError::CopyIntoSelf {
                folder_id: source_id.to_string(),
            });
        }
        cursor = store.parent_id(&id)?;
    }
    Ok(())
}
