mod test_support;

use serde_json::json;
use test_support::{request, request_ok, spawn_sidecar, temp_dir};

#[test]
fn router_dispatch_smoke_covers_handler_families() {
    let workspace = temp_dir("lessond-router-smoke");
    let bundle_out = workspace.join("smoke-backup.zip");

    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let health = request_ok(&mut stdin, &mut reader, "1", "health", json!({}));
    assert_eq!(health["workspacePath"], json!(null));

    let before = request(&mut stdin, &mut reader, "2", "sheets.list", json!({}));
    assert_eq!(before["error"]["code"], json!("no_workspace"));

    request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let setup = request_ok(&mut stdin, &mut reader, "4", "setup.get", json!({}));
    assert_eq!(setup["lessons"]["marker"], json!("שיעור"));
    assert_eq!(setup["lessons"]["inactiveDays"], json!(7));
    assert_eq!(setup["lessons"]["strictFolderMatch"], json!(false));

    let bad = request(
        &mut stdin,
        &mut reader,
        "5",
        "setup.update",
        json!({ "patch": { "inactiveDays": 900 } }),
    );
    assert_eq!(bad["error"]["code"], json!("bad_params"));

    let calls: Vec<(&str, serde_json::Value)> = vec![
        ("sheets.list", json!({})),
        ("sheets.setCell", json!({ "sheet": "main", "row": 1, "col": 1, "value": "#" })),
        ("sheets.read", json!({ "sheet": "main" })),
        ("storage.folders.create", json!({ "name": "Master" })),
        ("storage.folders.list", json!({})),
        ("lessons.resolve", json!({ "label": "שיעור 2" })),
        ("lessons.cleanup", json!({ "dryRun": true })),
        ("roster.inactive", json!({ "today": "2025-09-10" })),
        ("roster.recordActivity", json!({ "practice": [], "messages": [] })),
        ("backup.exportWorkspaceBundle", json!({ "outPath": bundle_out.to_string_lossy() })),
    ];
    for (i, (method, params)) in calls.into_iter().enumerate() {
        let resp = request(&mut stdin, &mut reader, &format!("c{i}"), method, params);
        let code = resp["error"]["code"].as_str().unwrap_or("");
        assert_ne!(code, "not_implemented", "unknown method {}", method);
        assert_ne!(code, "no_workspace", "{} lost the workspace", method);
    }

    let unknown = request(&mut stdin, &mut reader, "6", "grades.compute", json!({}));
    assert_eq!(unknown["error"]["code"], json!("not_implemented"));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn malformed_line_gets_bad_json_reply() {
    use std::io::{BufRead, Write};

    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    writeln!(stdin, "{{not json").expect("write");
    stdin.flush().expect("flush");
    let mut line = String::new();
    reader.read_line(&mut line).expect("read");
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("json reply");
    assert_eq!(value["ok"], json!(false));
    assert_eq!(value["error"]["code"], json!("bad_json"));

    // The loop keeps serving after a bad line.
    let health = request_ok(&mut stdin, &mut reader, "1", "health", json!({}));
    assert!(health["version"].is_string());

    drop(stdin);
    let _ = child.wait();
}
