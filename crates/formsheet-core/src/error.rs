//! Error types for formsheet-core.
//!
//! Each layer owns one enum. The store's forgiving read path turns a
//! [`ParseError`] into an empty table at the boundary; everything else is
//! surfaced to the caller.

use std::path::PathBuf;

/// The backing file exists but could not be understood as a record table.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("header is missing the required `{0}` column")]
    MissingColumn(&'static str),
}

/// Writing or deleting the backing file failed.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to prepare data directory {path}: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode table: {0}")]
    Encode(#[from] csv::Error),

    #[error("failed to remove {path}: {source}")]
    Remove {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Configuration could not be loaded or failed validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Load(#[from] config::ConfigError),

    #[error("field `{role}` has an empty form identifier")]
    EmptyIdentifier { role: &'static str },

    #[error("fields `{first}` and `{second}` share the form identifier `{identifier}`")]
    DuplicateIdentifier {
        first: &'static str,
        second: &'static str,
        identifier: String,
    },

    #[error("invalid group name `{0}` (allowed: letters, digits, `-`, `_`)")]
    InvalidGroupName(String),

    #[error("group `{0}` is defined more than once")]
    DuplicateGroup(String),

    #[error("form `{form}` is assigned to both `{first}` and `{second}`")]
    FormInTwoGroups {
        form: String,
        first: String,
        second: String,
    },

    #[error("group `{group}` would share the default table file `{file}`")]
    GroupShadowsDefaultFile { group: String, file: String },

    #[error("unknown group `{0}`")]
    UnknownGroup(String),
}

/// A download could not be produced.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("xlsx writer failed: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("failed to encode CSV: {0}")]
    Csv(#[from] csv::Error),
}

/// An administrative action was rejected or failed.
#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    #[error("unauthorized: {0}")]
    Unauthorized(&'static str),

    #[error("there are no submissions to export")]
    NothingToExport,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Export(#[from] ExportError),
}
