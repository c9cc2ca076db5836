//! Admin: dashboard figures and the guarded download/clear actions.
//!
//! Every mutating or exporting action goes through an [`AdminGuard`] before
//! the store is touched. A rejected request has no effect.

use crate::error::AdminError;
use crate::export::{export, Export, ExportFormat};
use crate::store::{record_cells, RecordStore, RecordTable, HEADERS};
use crate::types::NEWSLETTER_DECLINED;
use chrono::NaiveDateTime;
use subtle::ConstantTimeEq;

/// Cells longer than this are shortened in previews.
pub const PREVIEW_CELL_CHARS: usize = 50;

// ---------------------------------------------------------------------------
// Authorisation
// ---------------------------------------------------------------------------

/// An administrative action that needs authorisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdminAction {
    Download,
    Clear,
}

impl std::fmt::Display for AdminAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AdminAction::Download => write!(f, "download"),
            AdminAction::Clear => write!(f, "clear"),
        }
    }
}

/// An action plus the credential presented with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdminRequest<'a> {
    pub action: AdminAction,
    pub token: Option<&'a str>,
}

impl<'a> AdminRequest<'a> {
    pub fn new(action: AdminAction, token: Option<&'a str>) -> Self {
        Self { action, token }
    }
}

/// Decides whether an admin request may proceed.
pub trait AdminGuard {
    fn authorize(&self, request: &AdminRequest<'_>) -> Result<(), AdminError>;
}

/// Compares the presented token against a configured secret. With no secret
/// configured every request is allowed (local operator).
#[derive(Debug, Clone, Default)]
pub struct TokenGuard {
    expected: Option<String>,
}

impl TokenGuard {
    pub fn new(expected: Option<&str>) -> Self {
        Self {
            expected: expected.filter(|t| !t.is_empty()).map(str::to_string),
        }
    }
}

impl AdminGuard for TokenGuard {
    fn authorize(&self, request: &AdminRequest<'_>) -> Result<(), AdminError> {
        let Some(expected) = &self.expected else {
            return Ok(());
        };
        match request.token {
            None => Err(AdminError::Unauthorized("missing token")),
            Some(given) if bool::from(given.as_bytes().ct_eq(expected.as_bytes())) => Ok(()),
            Some(_) => Err(AdminError::Unauthorized("token mismatch")),
        }
    }
}

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

/// Export the current table. Fails with [`AdminError::NothingToExport`] when
/// there is no backing file.
pub fn download(
    guard: &dyn AdminGuard,
    request: &AdminRequest<'_>,
    store: &dyn RecordStore,
    format: ExportFormat,
    at: NaiveDateTime,
) -> Result<Export, AdminError> {
    guard
        .authorize(request)
        .inspect_err(|e| {
            tracing::warn!(action = %request.action, error = %e, "admin request rejected")
        })?;
    if !store.exists() {
        return Err(AdminError::NothingToExport);
    }
    let table = store.load();
    let out = export(&table, format, at)?;
    tracing::info!(
        store = %store.describe(),
        %format,
        rows = table.len(),
        file = %out.file_name,
        "exported table"
    );
    Ok(out)
}

/// Delete the backing file. Returns whether one existed.
pub fn clear(
    guard: &dyn AdminGuard,
    request: &AdminRequest<'_>,
    store: &dyn RecordStore,
) -> Result<bool, AdminError> {
    guard
        .authorize(request)
        .inspect_err(|e| {
            tracing::warn!(action = %request.action, error = %e, "admin request rejected")
        })?;
    Ok(store.clear()?)
}

// ---------------------------------------------------------------------------
// Dashboard
// ---------------------------------------------------------------------------

/// Summary figures for one backing file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dashboard {
    pub file_exists: bool,
    pub total_submissions: usize,
    /// Timestamp of the last row, or `None` when there are no rows.
    pub latest_submission: Option<String>,
    pub file_size: Option<u64>,
}

impl Dashboard {
    pub fn collect(store: &dyn RecordStore) -> Self {
        let table = store.load();
        Self {
            file_exists: store.exists(),
            total_submissions: table.len(),
            latest_submission: table.last().map(|r| r.timestamp.clone()),
            file_size: store.size_bytes(),
        }
    }

    pub fn latest_display(&self) -> &str {
        self.latest_submission
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or("N/A")
    }

    pub fn size_display(&self) -> String {
        format_size(self.file_size.unwrap_or(0))
    }
}

/// Human-readable byte count, e.g. `0 B`, `512 B`, `1.5 KB`, `2 MB`.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let rounded = (value * 10.0).round() / 10.0;
    if rounded.fract() == 0.0 {
        format!("{rounded:.0} {}", UNITS[unit])
    } else {
        format!("{rounded:.1} {}", UNITS[unit])
    }
}

// ---------------------------------------------------------------------------
// Preview
// ---------------------------------------------------------------------------

/// How a preview cell should be highlighted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellTone {
    Plain,
    Positive,
    Negative,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewCell {
    pub text: String,
    pub tone: CellTone,
}

/// The most recent rows, newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preview {
    pub headers: Vec<&'static str>,
    pub rows: Vec<Vec<PreviewCell>>,
}

impl Preview {
    pub fn build(table: &RecordTable, limit: usize) -> Self {
        let rows = table
            .rows()
            .iter()
            .rev()
            .take(limit)
            .map(|row| {
                record_cells(row)
                    .iter()
                    .enumerate()
                    .map(|(idx, cell)| preview_cell(idx, cell))
                    .collect()
            })
            .collect();
        Self {
            headers: HEADERS.to_vec(),
            rows,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

const NEWSLETTER_COLUMN: usize = 4;
const FLAG_COLUMNS: std::ops::RangeInclusive<usize> = 5..=8;

fn preview_cell(column: usize, cell: &str) -> PreviewCell {
    let trimmed = cell.trim();
    if column == NEWSLETTER_COLUMN {
        let tone = if trimmed == NEWSLETTER_DECLINED {
            CellTone::Negative
        } else {
            CellTone::Plain
        };
        return PreviewCell {
            text: cell.to_string(),
            tone,
        };
    }
    if FLAG_COLUMNS.contains(&column) {
        let tone = if trimmed == "Yes" {
            CellTone::Positive
        } else {
            CellTone::Negative
        };
        return PreviewCell {
            text: cell.to_string(),
            tone,
        };
    }
    PreviewCell {
        text: truncate(cell, PREVIEW_CELL_CHARS),
        tone: CellTone::Plain,
    }
}

fn truncate(cell: &str, max_chars: usize) -> String {
    if cell.chars().count() <= max_chars {
        return cell.to_string();
    }
    let mut out: String = cell.chars().take(max_chars).collect();
    out.push_str("...");
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
