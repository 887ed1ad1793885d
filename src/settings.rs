//! Per-workspace lesson settings, stored as one JSON object under
//! `setup.lessons`. Saved values are merged over the defaults on read; a
//! malformed saved field falls back to its default.

use crate::db;
use crate::lesson::{LessonFormat, MarkerError, DEFAULT_MARKER};
use crate::locator::Locator;
use rusqlite::Connection;
use serde_json::{json, Map, Value};

pub const SETTINGS_KEY: &str = "setup.lessons";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LessonSettings {
    pub marker: String,
    pub master_folder_id: String,
    pub inactive_days: u32,
    pub strict_folder_match: bool,
}

impl Default for LessonSettings {
    fn default() -> Self {
        Self {
            marker: DEFAULT_MARKER.to_string(),
            master_folder_id: String::new(),
            inactive_days: 7,
            strict_folder_match: false,
        }
    }
}

impl LessonSettings {
    pub fn load(conn: &Connection) -> anyhow::Result<Self> {
        Ok(Self::from_json(&load_json(conn)?))
    }

    pub fn format(&self) -> Result<LessonFormat, MarkerError> {
        LessonFormat::new(&self.marker)
    }

    pub fn locator(&self) -> Locator {
        Locator::new(&self.marker, self.strict_folder_match)
    }

    fn from_json(v: &Value) -> Self {
        let d = Self::default();
        Self {
            marker: v
                .get("marker")
                .and_then(|v| v.as_str())
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or(d.marker),
            master_folder_id: v
                .get("masterFolderId")
                .and_then(|v| v.as_str())
                .map(|s| s.trim().to_string())
                .unwrap_or(d.master_folder_id),
            inactive_days: v
                .get("inactiveDays")
                .and_then(|v| v.as_u64())
                .and_then(|n| u32::try_from(n).ok())
                .filter(|n| *n > 0)
                .unwrap_or(d.inactive_days),
            strict_folder_match: v
                .get("strictFolderMatch")
                .and_then(|v| v.as_bool())
                .unwrap_or(d.strict_folder_match),
        }
    }

    pub fn to_json(&self) -> Value {
        json!({
            "marker": self.marker,
            "masterFolderId": self.master_folder_id,
            "inactiveDays": self.inactive_days,
            "strictFolderMatch": self.strict_folder_match,
        })
    }
}

fn parse_string_max(v: &Value, key: &str, max_len: usize) -> Result<String, String> {
    let s = v.as_str().ok_or_else(|| format!("{} must be string", key))?;
    let s = s.trim();
    if s.chars().count() > max_len {
        return Err(format!("{} length must be <= {}", key, max_len));
    }
    Ok(s.to_string())
}

fn parse_i64_range(v: &Value, key: &str, min: i64, max: i64) -> Result<i64, String> {
    let n = v
        .as_i64()
        .ok_or_else(|| format!("{} must be integer", key))?;
    if !(min..=max).contains(&n) {
        return Err(format!("{} must be in {}..={}", key, min, max));
    }
    Ok(n)
}

pub fn merge_patch(current: &mut Value, patch: &Map<String, Value>) -> Result<(), String> {
    let obj = current
        .as_object_mut()
        .ok_or_else(|| "internal settings object must be a JSON object".to_string())?;
    for (k, v) in patch {
        match k.as_str() {
            "marker" => {
                let s = parse_string_max(v, k, 32)?;
                LessonFormat::new(&s).map_err(|e| e.to_string())?;
                obj.insert(k.clone(), Value::String(s));
            }
            "masterFolderId" => {
                obj.insert(k.clone(), Value::String(parse_string_max(v, k, 128)?));
            }
            "inactiveDays" => {
                obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 1, 365)?));
            }
            "strictFolderMatch" => {
                let b = v
                    .as_bool()
                    .ok_or_else(|| format!("{} must be boolean", k))?;
                obj.insert(k.clone(), Value::Bool(b));
            }
            _ => return Err(format!("unknown lessons field: {}", k)),
        }
    }
    Ok(())
}

pub fn load_json(conn: &Connection) -> anyhow::Result<Value> {
    let mut current = LessonSettings::default().to_json();
    if let Some(saved) = db::settings_get_json(conn, SETTINGS_KEY)? {
        if let Some(saved_obj) = saved.as_object() {
            // Apply field by field so one bad historical value does not
            // discard the rest.
            for (k, v) in saved_obj {
                let mut single = Map::new();
                single.insert(k.clone(), v.clone());
                let _ = merge_patch(&mut current, &single);
            }
        }
    }
    Ok(current)
}
