#[path = "../src/backup.rs"]
mod backup;
mod test_support;

use serde_json::json;
use std::fs::File;
use std::io::Read;
use test_support::{request_ok, spawn_sidecar, temp_dir};

fn sheet(rows: &[&[&str]]) -> Vec<Vec<String>> {
    rows.iter()
        .map(|r| r.iter().map(|c| c.to_string()).collect())
        .collect()
}

#[test]
fn zip_export_and_import_roundtrip() {
    let workspace = temp_dir("lessond-backup-src");
    let workspace2 = temp_dir("lessond-backup-dst");
    let out_dir = temp_dir("lessond-backup-out");

    let bytes = b"sqlite-test-payload";
    std::fs::write(workspace.join("lessond.sqlite3"), bytes).expect("write source db");

    let sheets = vec![
        (
            "students".to_string(),
            sheet(&[&["#", "name", "", "folder", "lesson"], &["1", "Dana", "", "f1", "שיעור 3"]]),
        ),
        ("main/summary".to_string(), sheet(&[&["#", "lesson", "name"]])),
        ("main:summary".to_string(), sheet(&[])),
    ];

    let bundle_path = out_dir.join("workspace.lessond.zip");
    let export = backup::export_workspace_bundle(&workspace, &sheets, &bundle_path)
        .expect("export bundle");
    assert_eq!(export.bundle_format, backup::BUNDLE_FORMAT);
    assert_eq!(export.entry_count, 5);
    assert_eq!(
        export.sheet_entries,
        vec![
            "sheets/students.csv",
            "sheets/main_summary.csv",
            "sheets/main_summary-2.csv"
        ]
    );

    let f = File::open(&bundle_path).expect("open bundle");
    let mut archive = zip::ZipArchive::new(f).expect("open zip archive");
    let mut manifest = String::new();
    archive
        .by_name("manifest.json")
        .expect("manifest entry")
        .read_to_string(&mut manifest)
        .expect("read manifest");
    let manifest: serde_json::Value = serde_json::from_str(&manifest).expect("manifest json");
    assert_eq!(manifest["format"], json!(backup::BUNDLE_FORMAT));
    assert_eq!(manifest["sheets"][0]["name"], json!("students"));
    assert_eq!(manifest["sheets"][0]["rows"], json!(2));

    let mut csv_text = String::new();
    archive
        .by_name("sheets/students.csv")
        .expect("students csv")
        .read_to_string(&mut csv_text)
        .expect("read csv");
    assert!(csv_text.contains("1,Dana,,f1,שיעור 3"));
    archive
        .by_name("db/lessond.sqlite3")
        .expect("database entry in bundle");

    let import =
        backup::import_workspace_bundle(&bundle_path, &workspace2).expect("import bundle");
    assert_eq!(import.bundle_format_detected, backup::BUNDLE_FORMAT);
    assert_eq!(import.sheets, vec!["students", "main/summary", "main:summary"]);
    let restored = std::fs::read(workspace2.join("lessond.sqlite3")).expect("read restored db");
    assert_eq!(restored, bytes);

    let _ = std::fs::remove_dir_all(workspace);
    let _ = std::fs::remove_dir_all(workspace2);
    let _ = std::fs::remove_dir_all(out_dir);
}

#[test]
fn raw_sqlite_import_is_supported() {
    let out_dir = temp_dir("lessond-backup-raw");
    let workspace = temp_dir("lessond-backup-raw-dst");

    let raw_file = out_dir.join("copy.sqlite3");
    let bytes = b"raw-sqlite-copy";
    std::fs::write(&raw_file, bytes).expect("write sqlite file");

    let import = backup::import_workspace_bundle(&raw_file, &workspace).expect("import sqlite");
    assert_eq!(import.bundle_format_detected, backup::RAW_SQLITE_FORMAT);
    let restored = std::fs::read(workspace.join("lessond.sqlite3")).expect("read restored");
    assert_eq!(restored, bytes);

    let _ = std::fs::remove_dir_all(out_dir);
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn bundle_restores_sheets_over_ipc() {
    let workspace = temp_dir("lessond-backup-ipc-src");
    let restored = temp_dir("lessond-backup-ipc-dst");
    let bundle = restored.join("bundle.zip");

    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "sheets.setCell",
        json!({ "sheet": "students", "row": 2, "col": 5, "value": "שיעור 7" }),
    );
    let export = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "backup.exportWorkspaceBundle",
        json!({ "outPath": bundle.to_string_lossy() }),
    );
    assert_eq!(export["bundleFormat"], json!("lessond-workspace-v1"));
    assert_eq!(export["sheetEntries"], json!(["sheets/students.csv"]));

    let import = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "backup.importWorkspaceBundle",
        json!({ "inPath": bundle.to_string_lossy(), "workspacePath": restored.join("ws").to_string_lossy() }),
    );
    assert_eq!(import["bundleFormatDetected"], json!("lessond-workspace-v1"));
    assert_eq!(import["sheets"], json!(["students"]));

    let rows = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "sheets.read",
        json!({ "sheet": "students" }),
    );
    assert_eq!(rows["rows"][1][4], json!("שיעור 7"));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
    let _ = std::fs::remove_dir_all(restored);
}
