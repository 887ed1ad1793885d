//! Manual correction and bulk normalization of lesson labels.

use crate::error::LessonError;
use crate::host::TabularStore;
use crate::lesson::LessonFormat;
use crate::roster::{
    self, LabelWrite, RosterIndex, RowSelection, MAIN_LESSON_COL, MAIN_NAME_COL, MAIN_SHEET,
    STUDENTS_LESSON_COL, STUDENTS_NAME_COL, STUDENTS_SHEET,
};
use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FixOutcome {
    pub name: String,
    pub previous_label: String,
    pub label: String,
    pub written: LabelWrite,
}

/// Sets the selected student's lesson from user input such as `"5"` or
/// `"{marker} 5"`.
pub fn fix_lesson<T>(
    store: &mut T,
    format: &LessonFormat,
    selection: &RowSelection,
    input: &str,
) -> Result<FixOutcome, LessonError>
where
    T: TabularStore + ?Sized,
{
    let name = roster::student_name_at(&*store, selection)?;
    let student = roster::find_student(&*store, &name)?;
    let number = format
        .resolve(input)
        .map_err(|e| LessonError::from_resolve(e, "lesson number"))?;
    let label = format.label(number);
    let written = roster::write_lesson_label(store, &student, &label)?;
    info!(student = %student.name, from = %student.lesson_label.trim(), to = %label, "lesson fixed");
    Ok(FixOutcome {
        name: student.name,
        previous_label: student.lesson_label,
        label,
        written,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum InvalidReason {
    Negative,
    Unparseable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelChange {
    pub row: usize,
    pub name: String,
    pub from: String,
    pub to: String,
    pub main_row: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidLabel {
    pub row: usize,
    pub name: String,
    pub label: String,
    pub reason: InvalidReason,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupReport {
    pub dry_run: bool,
    pub examined: usize,
    pub changed: Vec<LabelChange>,
    pub invalid: Vec<InvalidLabel>,
}

/// Rewrites every resolvable label on the students sheet to its canonical
/// form (mirrored to the summary sheet) and lists the ones that cannot be
/// resolved. With `dry_run` nothing is written.
pub fn cleanup<T>(store: &mut T, format: &LessonFormat, dry_run: bool) -> Result<CleanupReport, LessonError>
where
    T: TabularStore + ?Sized,
{
    let rows = store.read_all(STUDENTS_SHEET)?;
    let main_index = if store.has_sheet(MAIN_SHEET)? {
        RosterIndex::build(&store.read_all(MAIN_SHEET)?, MAIN_NAME_COL)
    } else {
        RosterIndex::default()
    };

    let mut report = CleanupReport {
        dry_run,
        ..CleanupReport::default()
    };
    for index in 1..rows.len() {
        let raw = rows[index]
            .get(STUDENTS_LESSON_COL - 1)
            .map(String::as_str)
            .unwrap_or("");
        if raw.trim().is_empty() {
            continue;
        }
        report.examined += 1;
        let row = index + 1;
        let name = roster::cell(&rows, index, STUDENTS_NAME_COL).to_string();

        let number = match format.resolve(raw) {
            Ok(n) => n,
            Err(_) => {
                let reason = if format.is_negative(raw) {
                    InvalidReason::Negative
                } else {
                    InvalidReason::Unparseable
                };
                report.invalid.push(InvalidLabel {
                    row,
                    name,
                    label: raw.to_string(),
                    reason,
                });
                continue;
            }
        };
        let canonical = format.label(number);
        if raw == canonical {
            continue;
        }

        let main_row = main_index.row_of(&name);
        if !dry_run {
            store.write_cell(STUDENTS_SHEET, row, STUDENTS_LESSON_COL, &canonical)?;
            if let Some(r) = main_row {
                store.write_cell(MAIN_SHEET, r, MAIN_LESSON_COL, &canonical)?;
            }
        }
        report.changed.push(LabelChange {
            row,
            name,
            from: raw.to_string(),
            to: canonical,
            main_row,
        });
    }

    if !report.invalid.is_empty() {
        warn!(count = report.invalid.len(), "lesson labels need manual attention");
    }
    info!(
        examined = report.examined,
        changed = report.changed.len(),
        invalid = report.invalid.len(),
        dry_run,
        "lesson cleanup finished"
    );
    Ok(report)
}
