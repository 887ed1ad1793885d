//! Per-student activity written back to the summary sheet.
//!
//! Rows are matched on the `phone number` column. A practice update sets the
//! practice timestamp and the last-activity date and bumps the practice
//! counter; a message update sets the message timestamp and bumps the message
//! counter. Either only happens when the incoming timestamp differs from the
//! stored one, so replaying the same batch changes nothing.

use crate::error::LessonError;
use crate::host::TabularStore;
use crate::roster::{
    cell, MAIN_ACTIVITY_COL, MAIN_MESSAGE_COUNT_COL, MAIN_MESSAGE_TIME_COL, MAIN_NAME_COL,
    MAIN_PRACTICE_COUNT_COL, MAIN_PRACTICE_TIME_COL, MAIN_SHEET,
};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info};

pub const PHONE_HEADER: &str = "phone number";
pub const DASHBOARD_SHEET: &str = "dashboard";
/// `C9` on the dashboard.
pub const DASHBOARD_STAMP_CELL: (usize, usize) = (9, 3);
const STAMP_FORMAT: &str = "%d-%m %H:%M";

#[derive(Debug, Clone, Deserialize)]
pub struct PracticeUpdate {
    pub phone: String,
    pub date: String,
    pub datetime: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageUpdate {
    pub phone: String,
    pub datetime: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityChange {
    pub row: usize,
    pub name: String,
    pub phone: String,
    pub count: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityReport {
    pub practice: Vec<ActivityChange>,
    pub messages: Vec<ActivityChange>,
    /// Update phones with no matching row, normalized and sorted.
    pub unmatched: Vec<String>,
    pub stamped_at: Option<String>,
}

/// Strips spaces, dashes and a leading `+`.
pub fn normalize_phone(raw: &str) -> String {
    let compact: String = raw.chars().filter(|c| *c != ' ' && *c != '-').collect();
    compact.trim_start_matches('+').to_string()
}

fn clean_value(raw: &str) -> &str {
    raw.trim().trim_matches(|c| c == '\'' || c == '"')
}

/// Blank or non-numeric counters start from zero.
fn bump(current: &str) -> u64 {
    current.parse::<u64>().unwrap_or(0) + 1
}

fn phone_column(header: Option<&Vec<String>>) -> Option<usize> {
    header?
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case(PHONE_HEADER))
        .map(|i| i + 1)
}

/// Applies the updates to the summary sheet. When several updates share a
/// phone the last one wins. The dashboard stamp is written only if that
/// sheet exists.
pub fn record<T>(
    store: &mut T,
    practice: &[PracticeUpdate],
    messages: &[MessageUpdate],
    now: NaiveDateTime,
) -> Result<ActivityReport, LessonError>
where
    T: TabularStore + ?Sized,
{
    let rows = store.read_all(MAIN_SHEET)?;
    let phone_col = phone_column(rows.first()).ok_or_else(|| {
        LessonError::LookupFailed(format!(
            "\"{MAIN_SHEET}\" has no \"{PHONE_HEADER}\" column"
        ))
    })?;

    let practice_by_phone: HashMap<String, &PracticeUpdate> = practice
        .iter()
        .map(|u| (normalize_phone(&u.phone), u))
        .collect();
    let messages_by_phone: HashMap<String, &MessageUpdate> = messages
        .iter()
        .map(|u| (normalize_phone(&u.phone), u))
        .collect();
    let mut unmatched: BTreeSet<String> = practice_by_phone
        .keys()
        .chain(messages_by_phone.keys())
        .cloned()
        .collect();

    let mut report = ActivityReport::default();
    for index in 1..rows.len() {
        let raw_phone = cell(&rows, index, phone_col);
        if raw_phone.is_empty() {
            continue;
        }
        let phone = normalize_phone(raw_phone);
        let row = index + 1;
        let name = cell(&rows, index, MAIN_NAME_COL).to_string();

        if let Some(update) = practice_by_phone.get(&phone) {
            unmatched.remove(&phone);
            let datetime = clean_value(&update.datetime);
            if cell(&rows, index, MAIN_PRACTICE_TIME_COL) != datetime {
                let count = bump(cell(&rows, index, MAIN_PRACTICE_COUNT_COL));
                store.write_cell(MAIN_SHEET, row, MAIN_PRACTICE_TIME_COL, datetime)?;
                store.write_cell(MAIN_SHEET, row, MAIN_ACTIVITY_COL, clean_value(&update.date))?;
                store.write_cell(MAIN_SHEET, row, MAIN_PRACTICE_COUNT_COL, &count.to_string())?;
                report.practice.push(ActivityChange {
                    row,
                    name: name.clone(),
                    phone: phone.clone(),
                    count,
                });
            } else {
                debug!(row, phone = %phone, "practice time unchanged");
            }
        }

        if let Some(update) = messages_by_phone.get(&phone) {
            unmatched.remove(&phone);
            let datetime = clean_value(&update.datetime);
            if cell(&rows, index, MAIN_MESSAGE_TIME_COL) != datetime {
                let count = bump(cell(&rows, index, MAIN_MESSAGE_COUNT_COL));
                store.write_cell(MAIN_SHEET, row, MAIN_MESSAGE_TIME_COL, datetime)?;
                store.write_cell(MAIN_SHEET, row, MAIN_MESSAGE_COUNT_COL, &count.to_string())?;
                report.messages.push(ActivityChange {
                    row,
                    name,
                    phone,
                    count,
                });
            } else {
                debug!(row, phone = %phone, "message time unchanged");
            }
        }
    }

    if store.has_sheet(DASHBOARD_SHEET)? {
        let stamp = now.format(STAMP_FORMAT).to_string();
        let (row, col) = DASHBOARD_STAMP_CELL;
        store.write_cell(DASHBOARD_SHEET, row, col, &stamp)?;
        report.stamped_at = Some(stamp);
    }

    report.unmatched = unmatched.into_iter().collect();
    info!(
        practice = report.practice.len(),
        messages = report.messages.len(),
        unmatched = report.unmatched.len(),
        "activity recorded"
    );
    Ok(report)
}
