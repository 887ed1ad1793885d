//! Fixed layout of the two tracking sheets and lookups over them.
//!
//! `students` is the detail view (one row per student, with storage folder
//! and current lesson). `main` is the summary view that mirrors the lesson
//! label and carries the last-activity date plus practice and message
//! timestamps and counters.

use crate::error::LessonError;
use crate::host::TabularStore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const STUDENTS_SHEET: &str = "students";
pub const MAIN_SHEET: &str = "main";

pub const STUDENTS_NAME_COL: usize = 2;
pub const STUDENTS_FOLDER_COL: usize = 4;
pub const STUDENTS_LESSON_COL: usize = 5;

pub const MAIN_LESSON_COL: usize = 2;
pub const MAIN_NAME_COL: usize = 3;
pub const MAIN_ACTIVITY_COL: usize = 4;
pub const MAIN_MESSAGE_TIME_COL: usize = 6;
pub const MAIN_MESSAGE_COUNT_COL: usize = 7;
pub const MAIN_PRACTICE_COUNT_COL: usize = 8;
pub const MAIN_PRACTICE_TIME_COL: usize = 9;

/// A selected row, 1-based as displayed; row 1 is the header.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RowSelection {
    pub sheet: String,
    pub row: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRecord {
    pub row: usize,
    pub name: String,
    pub folder_id: String,
    pub lesson_label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelWrite {
    pub students_row: usize,
    pub main_row: Option<usize>,
}

/// Trimmed cell text; `col` is 1-based, `rows` 0-based as returned by
/// [`TabularStore::read_all`].
pub fn cell(rows: &[Vec<String>], index: usize, col: usize) -> &str {
    rows.get(index)
        .and_then(|r| r.get(col - 1))
        .map(|s| s.trim())
        .unwrap_or("")
}

pub fn student_name_at<T>(store: &T, selection: &RowSelection) -> Result<String, LessonError>
where
    T: TabularStore + ?Sized,
{
    let col = match selection.sheet.as_str() {
        MAIN_SHEET => MAIN_NAME_COL,
        STUDENTS_SHEET => STUDENTS_NAME_COL,
        _ => {
            return Err(LessonError::InputMissing(format!(
                "select a row on the \"{}\" or \"{}\" sheet",
                MAIN_SHEET, STUDENTS_SHEET
            )))
        }
    };
    if selection.row < 2 {
        return Err(LessonError::InputMissing(
            "select a row with a student name".to_string(),
        ));
    }
    let rows = store.read_all(&selection.sheet)?;
    let name = cell(&rows, selection.row - 1, col);
    if name.is_empty() {
        return Err(LessonError::InputMissing(
            "select a row with a student name".to_string(),
        ));
    }
    Ok(name.to_string())
}

/// First `students` row whose name matches after trimming.
pub fn find_student<T>(store: &T, name: &str) -> Result<StudentRecord, LessonError>
where
    T: TabularStore + ?Sized,
{
    let wanted = name.trim();
    let rows = store.read_all(STUDENTS_SHEET)?;
    for index in 1..rows.len() {
        if cell(&rows, index, STUDENTS_NAME_COL) != wanted || wanted.is_empty() {
            continue;
        }
        return Ok(StudentRecord {
            row: index + 1,
            name: wanted.to_string(),
            folder_id: cell(&rows, index, STUDENTS_FOLDER_COL).to_string(),
            lesson_label: rows
                .get(index)
                .and_then(|r| r.get(STUDENTS_LESSON_COL - 1))
                .cloned()
                .unwrap_or_default(),
        });
    }
    Err(LessonError::LookupFailed(format!(
        "student \"{}\" not found in {} sheet",
        wanted, STUDENTS_SHEET
    )))
}

/// Writes the lesson label to the student's row and to the first matching
/// row of the summary sheet, if that sheet exists.
pub fn write_lesson_label<T>(
    store: &mut T,
    student: &StudentRecord,
    label: &str,
) -> Result<LabelWrite, LessonError>
where
    T: TabularStore + ?Sized,
{
    store.write_cell(STUDENTS_SHEET, student.row, STUDENTS_LESSON_COL, label)?;
    let main_row = if store.has_sheet(MAIN_SHEET)? {
        let rows = store.read_all(MAIN_SHEET)?;
        RosterIndex::build(&rows, MAIN_NAME_COL).row_of(&student.name)
    } else {
        None
    };
    if let Some(row) = main_row {
        store.write_cell(MAIN_SHEET, row, MAIN_LESSON_COL, label)?;
    }
    Ok(LabelWrite {
        students_row: student.row,
        main_row,
    })
}

/// Name -> sheet row (1-based) over the data rows of one sheet. The first
/// row carrying a name wins, like the linear scans.
#[derive(Debug, Default)]
pub struct RosterIndex {
    rows: HashMap<String, usize>,
}

impl RosterIndex {
    pub fn build(rows: &[Vec<String>], name_col: usize) -> Self {
        let mut index = HashMap::new();
        for i in 1..rows.len() {
            let name = cell(rows, i, name_col);
            if !name.is_empty() {
                index.entry(name.to_string()).or_insert(i + 1);
            }
        }
        Self { rows: index }
    }

    pub fn row_of(&self, name: &str) -> Option<usize> {
        self.rows.get(name.trim()).copied()
    }
}
