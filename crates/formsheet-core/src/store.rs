//! Store: the record table and its CSV backing file.
//!
//! A [`RecordTable`] is read whole from disk at the start of a request,
//! changed by at most one [`RecordTable::upsert`], and written back whole.
//! Writes go to a temporary file in the same directory that is then renamed
//! over the target, so readers only ever see a complete file.
//!
//! Reads are forgiving: [`RecordStore::load`] turns a missing or malformed
//! file into an empty table. Use [`RecordStore::try_load`] to see the error.

use crate::config::{DedupKey, StorageConfig};
use crate::error::{ParseError, StoreError};
use crate::types::{Consent, SubmissionRecord};
use std::cell::RefCell;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Column headers, in storage order.
pub const HEADERS: [&str; 10] = [
    "Entry ID",
    "Timestamp",
    "Email",
    "Phone",
    "Newsletter Consent",
    "E-Mail Consent",
    "Phone/SMS Consent",
    "Mail Consent",
    "Terms Accepted",
    "Token",
];

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

// ---------------------------------------------------------------------------
// RecordTable
// ---------------------------------------------------------------------------

/// Ordered rows under the fixed [`HEADERS`] schema.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RecordTable {
    rows: Vec<SubmissionRecord>,
}

/// Where an upserted record ended up (zero-based row index).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted { row: usize },
    Replaced { row: usize },
}

impl UpsertOutcome {
    pub fn row(self) -> usize {
        match self {
            UpsertOutcome::Inserted { row } | UpsertOutcome::Replaced { row } => row,
        }
    }
}

impl RecordTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from rows, applying the consent override to each.
    pub fn from_rows(rows: Vec<SubmissionRecord>) -> Self {
        let mut table = Self { rows };
        for row in &mut table.rows {
            row.enforce_consent_override();
        }
        table
    }

    pub fn headers() -> &'static [&'static str] {
        &HEADERS
    }

    pub fn rows(&self) -> &[SubmissionRecord] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn last(&self) -> Option<&SubmissionRecord> {
        self.rows.last()
    }

    /// Index of the row that `record` should replace, if any.
    ///
    /// Blank keys never match, so submissions without an email (or entry id)
    /// always append.
    pub fn position_of(&self, record: &SubmissionRecord, key: DedupKey) -> Option<usize> {
        match key {
            DedupKey::Email => {
                let wanted = record.email_key()?;
                self.rows
                    .iter()
                    .position(|r| r.email_key().as_deref() == Some(wanted.as_str()))
            }
            DedupKey::EntryId => {
                let wanted = record.entry_id.trim();
                if wanted.is_empty() {
                    return None;
                }
                self.rows.iter().position(|r| r.entry_id.trim() == wanted)
            }
        }
    }

    /// Replace the matching row in place, or append.
    pub fn upsert(&mut self, mut record: SubmissionRecord, key: DedupKey) -> UpsertOutcome {
        record.enforce_consent_override();
        match self.position_of(&record, key) {
            Some(row) => {
                self.rows[row] = record;
                UpsertOutcome::Replaced { row }
            }
            None => {
                self.rows.push(record);
                UpsertOutcome::Inserted {
                    row: self.rows.len() - 1,
                }
            }
        }
    }
}

/// Value-style upsert: consumes the table and returns the updated one.
pub fn upsert(mut table: RecordTable, record: SubmissionRecord, key: DedupKey) -> RecordTable {
    table.upsert(record, key);
    table
}

// ---------------------------------------------------------------------------
// CSV codec
// ---------------------------------------------------------------------------

/// Serialise the table as BOM-prefixed CSV with a header row.
pub fn encode_csv(table: &RecordTable) -> Result<Vec<u8>, csv::Error> {
    let mut writer = csv::Writer::from_writer(UTF8_BOM.to_vec());
    writer.write_record(HEADERS)?;
    for row in table.rows() {
        writer.write_record(record_cells(row))?;
    }
    writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))
}

/// The cells of one row, in [`HEADERS`] order.
pub fn record_cells(row: &SubmissionRecord) -> [&str; 10] {
    [
        &row.entry_id,
        &row.timestamp,
        &row.email,
        &row.phone,
        &row.newsletter_consent,
        row.email_consent.as_str(),
        row.phone_sms_consent.as_str(),
        row.mail_consent.as_str(),
        row.terms_accepted.as_str(),
        &row.token,
    ]
}

/// Parse CSV produced by [`encode_csv`] (or an older revision of it).
///
/// Columns are located by header name, so missing optional columns default
/// to empty / `No`. Only the `Email` column is required. Rows may be ragged.
pub fn decode_csv(bytes: &[u8]) -> Result<RecordTable, ParseError> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(RecordTable::new());
    }

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .has_headers(true)
        .from_reader(bytes);

    let headers = reader.headers()?.clone();
    let column = |name: &str| headers.iter().position(|h| h.trim() == name);
    let email_col = column("Email").ok_or(ParseError::MissingColumn("Email"))?;
    let cols: [Option<usize>; 10] = HEADERS.map(column);

    let mut rows = Vec::new();
    for result in reader.records() {
        let raw = result?;
        let cell = |idx: Option<usize>| -> String {
            idx.and_then(|i| raw.get(i))
                .map(str::to_string)
                .unwrap_or_default()
        };
        let flag = |idx: Option<usize>| Consent::from_exact(cell(idx).trim());
        rows.push(SubmissionRecord {
            entry_id: cell(cols[0]),
            timestamp: cell(cols[1]),
            email: cell(Some(email_col)),
            phone: cell(cols[3]),
            newsletter_consent: cell(cols[4]),
            email_consent: flag(cols[5]),
            phone_sms_consent: flag(cols[6]),
            mail_consent: flag(cols[7]),
            terms_accepted: flag(cols[8]),
            token: cell(cols[9]),
        });
    }
    Ok(RecordTable::from_rows(rows))
}

// ---------------------------------------------------------------------------
// RecordStore
// ---------------------------------------------------------------------------

/// Persistence for one record table.
pub trait RecordStore {
    /// Read the table. A missing backing file is an empty table.
    fn try_load(&self) -> Result<RecordTable, ParseError>;

    /// Overwrite the backing file with `table`.
    fn save(&self, table: &RecordTable) -> Result<(), StoreError>;

    /// Delete the backing file. Returns whether there was one.
    fn clear(&self) -> Result<bool, StoreError>;

    fn exists(&self) -> bool;

    /// Size of the backing file in bytes, if present.
    fn size_bytes(&self) -> Option<u64>;

    /// Short human-readable location, for logs.
    fn describe(&self) -> String;

    /// Forgiving read: malformed content is logged and treated as empty.
    fn load(&self) -> RecordTable {
        self.try_load().unwrap_or_else(|err| {
            tracing::warn!(
                store = %self.describe(),
                error = %err,
                "unreadable table; starting empty"
            );
            RecordTable::new()
        })
    }
}

/// CSV file on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvFileStore {
    path: PathBuf,
}

impl CsvFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordStore for CsvFileStore {
    fn try_load(&self) -> Result<RecordTable, ParseError> {
        try_load(&self.path)
    }

    fn save(&self, table: &RecordTable) -> Result<(), StoreError> {
        save(table, &self.path)
    }

    fn clear(&self) -> Result<bool, StoreError> {
        clear(&self.path)
    }

    fn exists(&self) -> bool {
        self.path.is_file()
    }

    fn size_bytes(&self) -> Option<u64> {
        std::fs::metadata(&self.path).ok().map(|m| m.len())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Read and parse `path`. A missing file is an empty table.
pub fn try_load(path: &Path) -> Result<RecordTable, ParseError> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(RecordTable::new()),
        Err(source) => {
            return Err(ParseError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    decode_csv(&bytes)
}

/// Forgiving read of `path`.
pub fn load(path: &Path) -> RecordTable {
    CsvFileStore::new(path).load()
}

/// Atomically replace `path` with the encoded table.
pub fn save(table: &RecordTable, path: &Path) -> Result<(), StoreError> {
    let bytes = encode_csv(table)?;
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir).map_err(|source| StoreError::Directory {
        path: dir.to_path_buf(),
        source,
    })?;

    let write_err = |source| StoreError::Write {
        path: path.to_path_buf(),
        source,
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(&bytes).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tmp.as_file()
            .set_permissions(std::fs::Permissions::from_mode(0o644))
            .map_err(write_err)?;
    }
    tmp.persist(path).map_err(|e| write_err(e.error))?;

    tracing::debug!(path = %path.display(), rows = table.len(), "table saved");
    Ok(())
}

/// Delete `path`. Returns `false` if it did not exist.
pub fn clear(path: &Path) -> Result<bool, StoreError> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            tracing::info!(path = %path.display(), "table cleared");
            Ok(true)
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(source) => Err(StoreError::Remove {
            path: path.to_path_buf(),
            source,
        }),
    }
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// Keeps the encoded file in memory. Goes through the same CSV codec as the
/// file store, so it also exercises round-tripping.
#[derive(Debug, Default)]
pub struct MemoryStore {
    bytes: RefCell<Option<Vec<u8>>>,
    read_only: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with raw file contents (possibly malformed).
    pub fn with_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: RefCell::new(Some(bytes.into())),
            read_only: false,
        }
    }

    /// A store whose saves and clears always fail.
    pub fn read_only() -> Self {
        Self {
            bytes: RefCell::new(None),
            read_only: true,
        }
    }

    pub fn bytes(&self) -> Option<Vec<u8>> {
        self.bytes.borrow().clone()
    }

    fn denied(&self) -> StoreError {
        StoreError::Write {
            path: PathBuf::from(self.describe()),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only store"),
        }
    }
}

impl RecordStore for MemoryStore {
    fn try_load(&self) -> Result<RecordTable, ParseError> {
        match self.bytes.borrow().as_deref() {
            Some(bytes) => decode_csv(bytes),
            None => Ok(RecordTable::new()),
        }
    }

    fn save(&self, table: &RecordTable) -> Result<(), StoreError> {
        if self.read_only {
            return Err(self.denied());
        }
        let encoded = encode_csv(table)?;
        *self.bytes.borrow_mut() = Some(encoded);
        Ok(())
    }

    fn clear(&self) -> Result<bool, StoreError> {
        if self.read_only {
            return Err(self.denied());
        }
        Ok(self.bytes.borrow_mut().take().is_some())
    }

    fn exists(&self) -> bool {
        self.bytes.borrow().is_some()
    }

    fn size_bytes(&self) -> Option<u64> {
        self.bytes.borrow().as_ref().map(|b| b.len() as u64)
    }

    fn describe(&self) -> String {
        "<memory>".to_string()
    }
}

// ---------------------------------------------------------------------------
// Data directory
// ---------------------------------------------------------------------------

const HTACCESS: &str = "# Protect form submission files\nOrder Deny,Allow\nDeny from all\n";
const INDEX_PHP: &str = "<?php // Silence is golden\n";

/// The directory holding one CSV file per form group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataDir {
    root: PathBuf,
    default_file: String,
    protect: bool,
}

impl DataDir {
    pub fn new(root: impl Into<PathBuf>, default_file: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            default_file: default_file.into(),
            protect: false,
        }
    }

    pub fn from_config(storage: &StorageConfig) -> Self {
        Self {
            root: storage.data_dir.clone(),
            default_file: storage.file_name.clone(),
            protect: storage.protect_directory,
        }
    }

    /// Write web-server guard files when the directory is created.
    pub fn protected(mut self, protect: bool) -> Self {
        self.protect = protect;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Backing file for `group`, or the default file when `None`.
    pub fn path_for(&self, group: Option<&str>) -> PathBuf {
        match group {
            Some(name) => self.root.join(format!("{name}.csv")),
            None => self.root.join(&self.default_file),
        }
    }

    pub fn store_for(&self, group: Option<&str>) -> CsvFileStore {
        CsvFileStore::new(self.path_for(group))
    }

    /// Create the directory (and guard files) if it does not exist yet.
    pub fn ensure(&self) -> Result<(), StoreError> {
        if self.root.is_dir() {
            return Ok(());
        }
        let dir_err = |source| StoreError::Directory {
            path: self.root.clone(),
            source,
        };
        std::fs::create_dir_all(&self.root).map_err(dir_err)?;
        if self.protect {
            std::fs::write(self.root.join(".htaccess"), HTACCESS).map_err(dir_err)?;
            std::fs::write(self.root.join("index.php"), INDEX_PHP).map_err(dir_err)?;
        }
        tracing::info!(
            path = %self.root.display(),
            protected = self.protect,
            "created data directory"
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
