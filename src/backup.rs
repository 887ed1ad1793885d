//! Workspace backup bundles.
//!
//! A bundle is a zip holding `manifest.json`, the workspace database under
//! `db/`, and a CSV rendering of every sheet under `sheets/` so the roster
//! can be read without the app. Restoring only needs the database entry; the
//! CSVs are for people.

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::File;
use std::io::{Read, Seek, Write};
use std::path::{Path, PathBuf};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

pub const BUNDLE_FORMAT: &str = "lessond-workspace-v1";
pub const RAW_SQLITE_FORMAT: &str = "raw-sqlite3";

const DB_FILE_NAME: &str = "lessond.sqlite3";
const MANIFEST_PATH: &str = "manifest.json";
const DATABASE_PATH: &str = "db/lessond.sqlite3";
const ZIP_MAGIC: [u8; 4] = *b"PK\x03\x04";

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Manifest {
    format: String,
    app_version: String,
    exported_at: String,
    #[serde(default)]
    sheets: Vec<ManifestSheet>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ManifestSheet {
    name: String,
    entry: String,
    rows: usize,
}

#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub bundle_format: String,
    pub entry_count: usize,
    pub sheet_entries: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ImportSummary {
    pub bundle_format_detected: String,
    /// Sheet names listed in the manifest; empty for a raw database copy.
    pub sheets: Vec<String>,
}

/// Sheet name reduced to alphanumerics, space, `-` and `_`.
pub fn safe_sheet_name(name: &str) -> String {
    let safe: String = name
        .chars()
        .map(|c| match c {
            ' ' | '-' | '_' => c,
            c if c.is_alphanumeric() => c,
            _ => '_',
        })
        .collect();
    if safe.trim().is_empty() {
        "sheet".to_string()
    } else {
        safe
    }
}

/// One `sheets/<name>.csv` path per sheet; a name that collides with an
/// earlier one gets `-2`, `-3`, ... appended.
fn sheet_entry_paths<'a>(names: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut taken = HashSet::new();
    names
        .map(|name| {
            let base = safe_sheet_name(name);
            let mut path = format!("sheets/{base}.csv");
            let mut suffix = 2;
            while !taken.insert(path.clone()) {
                path = format!("sheets/{base}-{suffix}.csv");
                suffix += 1;
            }
            path
        })
        .collect()
}

fn sheet_csv(rows: &[Vec<String>]) -> anyhow::Result<Vec<u8>> {
    let mut w = csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(Vec::new());
    for row in rows {
        // A record with no fields would be dropped; keep blank rows visible.
        if row.is_empty() {
            w.write_record([""])?;
        } else {
            w.write_record(row)?;
        }
    }
    w.into_inner()
        .map_err(|e| anyhow::anyhow!("csv buffer: {}", e.error()))
}

fn add_entry<W: Write + Seek>(zip: &mut ZipWriter<W>, path: &str, mut body: impl Read) -> anyhow::Result<()> {
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);
    zip.start_file(path, opts)
        .with_context(|| format!("start zip entry {path}"))?;
    std::io::copy(&mut body, zip).with_context(|| format!("write zip entry {path}"))?;
    Ok(())
}

/// Writes the workspace database and a CSV per sheet to `out_path`.
/// `sheets` is the full sheet dump in display order.
pub fn export_workspace_bundle(
    workspace_path: &Path,
    sheets: &[(String, Vec<Vec<String>>)],
    out_path: &Path,
) -> anyhow::Result<ExportSummary> {
    let db_path = workspace_path.join(DB_FILE_NAME);
    if !db_path.is_file() {
        bail!("no workspace database at {}", db_path.display());
    }
    if let Some(dir) = out_path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    }

    let sheet_entries = sheet_entry_paths(sheets.iter().map(|(name, _)| name.as_str()));
    let manifest = Manifest {
        format: BUNDLE_FORMAT.to_string(),
        app_version: env!("CARGO_PKG_VERSION").to_string(),
        exported_at: chrono::Utc::now().to_rfc3339(),
        sheets: sheets
            .iter()
            .zip(&sheet_entries)
            .map(|((name, rows), entry)| ManifestSheet {
                name: name.clone(),
                entry: entry.clone(),
                rows: rows.len(),
            })
            .collect(),
    };

    let file = File::create(out_path).with_context(|| format!("create {}", out_path.display()))?;
    let mut zip = ZipWriter::new(file);
    let manifest_json = serde_json::to_vec_pretty(&manifest).context("encode manifest")?;
    add_entry(&mut zip, MANIFEST_PATH, manifest_json.as_slice())?;
    let db_file = File::open(&db_path).with_context(|| format!("open {}", db_path.display()))?;
    add_entry(&mut zip, DATABASE_PATH, db_file)?;
    for ((name, rows), entry) in sheets.iter().zip(&sheet_entries) {
        let body = sheet_csv(rows).with_context(|| format!("render sheet {name}"))?;
        add_entry(&mut zip, entry, body.as_slice())?;
    }
    zip.finish().context("finish zip bundle")?;

    Ok(ExportSummary {
        bundle_format: BUNDLE_FORMAT.to_string(),
        entry_count: 2 + sheet_entries.len(),
        sheet_entries,
    })
}

fn looks_like_zip(path: &Path) -> anyhow::Result<bool> {
    let mut head = Vec::with_capacity(ZIP_MAGIC.len());
    File::open(path)
        .with_context(|| format!("open {}", path.display()))?
        .take(ZIP_MAGIC.len() as u64)
        .read_to_end(&mut head)
        .with_context(|| format!("read {}", path.display()))?;
    Ok(head == ZIP_MAGIC)
}

/// Replaces `dst` with the bytes from `src`, going through a sibling file so
/// a failed extraction never leaves a truncated database behind.
fn install_database(mut src: impl Read, dst: &Path) -> anyhow::Result<()> {
    let staged = PathBuf::from(format!("{}.restore", dst.display()));
    {
        let mut out = File::create(&staged).with_context(|| format!("create {}", staged.display()))?;
        std::io::copy(&mut src, &mut out).context("extract database")?;
        out.sync_all().context("flush restored database")?;
    }
    if dst.exists() {
        std::fs::remove_file(dst).with_context(|| format!("remove {}", dst.display()))?;
    }
    std::fs::rename(&staged, dst).with_context(|| format!("move restored database to {}", dst.display()))?;
    Ok(())
}

/// Restores the workspace database from a bundle, or from a plain sqlite
/// copy. Any open connection to the workspace must be closed first.
pub fn import_workspace_bundle(
    in_path: &Path,
    workspace_path: &Path,
) -> anyhow::Result<ImportSummary> {
    std::fs::create_dir_all(workspace_path)
        .with_context(|| format!("create {}", workspace_path.display()))?;
    let dst = workspace_path.join(DB_FILE_NAME);

    if !looks_like_zip(in_path)? {
        let src = File::open(in_path).with_context(|| format!("open {}", in_path.display()))?;
        install_database(src, &dst)?;
        return Ok(ImportSummary {
            bundle_format_detected: RAW_SQLITE_FORMAT.to_string(),
            sheets: Vec::new(),
        });
    }

    let file = File::open(in_path).with_context(|| format!("open {}", in_path.display()))?;
    let mut archive = ZipArchive::new(file).context("not a readable zip archive")?;
    let manifest: Manifest = {
        let entry = archive
            .by_name(MANIFEST_PATH)
            .context("bundle has no manifest.json")?;
        serde_json::from_reader(entry).context("manifest.json is not a bundle manifest")?
    };
    if manifest.format != BUNDLE_FORMAT {
        bail!("unsupported bundle format: {}", manifest.format);
    }
    let db_entry = archive
        .by_name(DATABASE_PATH)
        .with_context(|| format!("bundle has no {DATABASE_PATH}"))?;
    install_database(db_entry, &dst)?;

    Ok(ImportSummary {
        bundle_format_detected: manifest.format,
        sheets: manifest.sheets.into_iter().map(|s| s.name).collect(),
    })
}
