use crate::error::LessonError;
use crate::host::TabularStore;
use crate::roster::{cell, MAIN_ACTIVITY_COL, MAIN_NAME_COL, MAIN_SHEET};
use chrono::{Days, NaiveDate};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InactiveStudent {
    pub row: usize,
    pub name: String,
    pub last_active: NaiveDate,
    pub days_inactive: i64,
}

/// Accepts `2025-09-01`, `01/09/25`, `01/09/2025`, with an optional trailing
/// time (`2025-09-01 10:00:00`, `2025-09-01T10:00:00Z`).
pub fn parse_activity_date(raw: &str) -> Option<NaiveDate> {
    let token = raw.split_whitespace().next()?;
    let token = token.split('T').next().unwrap_or(token);
    if let Ok(d) = NaiveDate::parse_from_str(token, "%Y-%m-%d") {
        return Some(d);
    }
    let year = token.rsplit('/').next()?;
    let fmt = if year.len() == 2 { "%d/%m/%y" } else { "%d/%m/%Y" };
    NaiveDate::parse_from_str(token, fmt).ok()
}

/// Students on the summary sheet whose last activity falls on or before
/// `today - threshold_days`. Rows without a name or a readable date are
/// skipped.
pub fn scan<T>(store: &T, today: NaiveDate, threshold_days: u32) -> Result<Vec<InactiveStudent>, LessonError>
where
    T: TabularStore + ?Sized,
{
    let cutoff = today
        .checked_sub_days(Days::new(u64::from(threshold_days)))
        .ok_or_else(|| {
            LessonError::InputMissing(format!("{today} minus {threshold_days} days is out of range"))
        })?;
    let rows = store.read_all(MAIN_SHEET)?;

    let mut out = Vec::new();
    for index in 1..rows.len() {
        let name = cell(&rows, index, MAIN_NAME_COL);
        let raw = cell(&rows, index, MAIN_ACTIVITY_COL);
        if name.is_empty() || raw.is_empty() {
            continue;
        }
        let Some(last_active) = parse_activity_date(raw) else {
            tracing::debug!(row = index + 1, value = raw, "unreadable activity date");
            continue;
        };
        if last_active <= cutoff {
            out.push(InactiveStudent {
                row: index + 1,
                name: name.to_string(),
                last_active,
                days_inactive: (today - last_active).num_days(),
            });
        }
    }
    Ok(out)
}
