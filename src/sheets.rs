//! Workspace-database implementation of [`TabularStore`], plus CSV import.
//!
//! Cells are stored sparsely in `sheet_cells` with 1-based row/column
//! numbers; blank cells are simply absent.

use crate::host::{HostError, TabularStore};
use anyhow::Context;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use std::path::Path;

pub struct SqliteSheets<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteSheets<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

fn sheet_exists(conn: &Connection, name: &str) -> rusqlite::Result<bool> {
    conn.query_row("SELECT 1 FROM sheets WHERE name = ?", [name], |_| Ok(()))
        .optional()
        .map(|r| r.is_some())
}

impl TabularStore for SqliteSheets<'_> {
    fn has_sheet(&self, sheet: &str) -> Result<bool, HostError> {
        sheet_exists(self.conn, sheet).map_err(HostError::backend)
    }

    fn read_all(&self, sheet: &str) -> Result<Vec<Vec<String>>, HostError> {
        if !self.has_sheet(sheet)? {
            return Err(HostError::SheetNotFound(sheet.to_string()));
        }
        read_rows(self.conn, sheet).map_err(HostError::backend)
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
        if !self.has_sheet(sheet)? {
            return Err(HostError::SheetNotFound(sheet.to_string()));
        }
        set_cell(self.conn, sheet, row, col, value).map_err(HostError::backend)
    }
}

fn read_rows(conn: &Connection, sheet: &str) -> rusqlite::Result<Vec<Vec<String>>> {
    let mut stmt = conn.prepare(
        "SELECT row, col, value FROM sheet_cells WHERE sheet = ? ORDER BY row, col",
    )?;
    let cells = stmt
        .query_map([sheet], |r| {
            Ok((
                r.get::<_, i64>(0)?,
                r.get::<_, i64>(1)?,
                r.get::<_, String>(2)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut rows: Vec<Vec<String>> = Vec::new();
    for (row, col, value) in cells {
        let (r, c) = (row.max(1) as usize - 1, col.max(1) as usize - 1);
        if rows.len() <= r {
            rows.resize_with(r + 1, Vec::new);
        }
        let cells = &mut rows[r];
        if cells.len() <= c {
            cells.resize(c + 1, String::new());
        }
        cells[c] = value;
    }
    Ok(rows)
}

fn set_cell(conn: &Connection, sheet: &str, row: usize, col: usize, value: &str) -> rusqlite::Result<()> {
    if value.is_empty() {
        conn.execute(
            "DELETE FROM sheet_cells WHERE sheet = ? AND row = ? AND col = ?",
            params![sheet, row as i64, col as i64],
        )?;
    } else {
        conn.execute(
            "INSERT INTO sheet_cells(sheet, row, col, value) VALUES(?, ?, ?, ?)
             ON CONFLICT(sheet, row, col) DO UPDATE SET value = excluded.value",
            params![sheet, row as i64, col as i64, value],
        )?;
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetSummary {
    pub name: String,
    pub row_count: i64,
}

pub fn list_sheets(conn: &Connection) -> rusqlite::Result<Vec<SheetSummary>> {
    let mut stmt = conn.prepare(
        "SELECT s.name, COALESCE((SELECT MAX(c.row) FROM sheet_cells c WHERE c.sheet = s.name), 0)
         FROM sheets s
         ORDER BY s.sort_order, s.name",
    )?;
    let rows = stmt.query_map([], |r| {
        Ok(SheetSummary {
            name: r.get(0)?,
            row_count: r.get(1)?,
        })
    })?;
    rows.collect()
}

/// Creates the sheet if it does not exist yet. Returns true when created.
pub fn ensure_sheet(conn: &Connection, name: &str) -> rusqlite::Result<bool> {
    if sheet_exists(conn, name)? {
        return Ok(false);
    }
    conn.execute(
        "INSERT INTO sheets(name, sort_order)
         VALUES(?, (SELECT COALESCE(MAX(sort_order), -1) + 1 FROM sheets))",
        [name],
    )?;
    Ok(true)
}

/// Replaces the whole content of a sheet, creating it if needed.
pub fn replace_sheet(conn: &Connection, name: &str, rows: &[Vec<String>]) -> anyhow::Result<()> {
    let tx = conn.unchecked_transaction()?;
    ensure_sheet(&tx, name)?;
    tx.execute("DELETE FROM sheet_cells WHERE sheet = ?", [name])?;
    {
        let mut insert =
            tx.prepare("INSERT INTO sheet_cells(sheet, row, col, value) VALUES(?, ?, ?, ?)")?;
        for (r, cells) in rows.iter().enumerate() {
            for (c, value) in cells.iter().enumerate() {
                if value.is_empty() {
                    continue;
                }
                insert.execute(params![name, (r + 1) as i64, (c + 1) as i64, value])?;
            }
        }
    }
    tx.commit()?;
    Ok(())
}

/// Reads a CSV file (no header handling, ragged rows allowed) into a sheet.
/// Returns the number of rows imported.
pub fn import_csv(conn: &Connection, name: &str, path: &Path) -> anyhow::Result<usize> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("read csv: {}", path.display()))?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.with_context(|| format!("read record: {}", path.display()))?;
        let mut row: Vec<String> = record.iter().map(|v| v.to_string()).collect();
        if rows.is_empty() {
            if let Some(first) = row.first_mut() {
                *first = first.trim_start_matches('\u{feff}').to_string();
            }
        }
        rows.push(row);
    }
    replace_sheet(conn, name, &rows)?;
    Ok(rows.len())
}

/// Every sheet with its rows, in display order.
pub fn dump_all(conn: &Connection) -> rusqlite::Result<Vec<(String, Vec<Vec<String>>)>> {
    let mut out = Vec::new();
    for summary in list_sheets(conn)? {
        let rows = read_rows(conn, &summary.name)?;
        out.push((summary.name, rows));
    }
    Ok(out)
}
