//! Command-line arguments.

use clap::{Parser, Subcommand};
use formsheet_core::export::ExportFormat;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "formsheet",
    version,
    about = "Store form submissions in a spreadsheet file, one row per email"
)]
pub struct Cli {
    /// Config file (default: ~/.config/formsheet/config.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Override `storage.data_dir`.
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Read a JSON submission and upsert it into its table.
    Submit {
        /// Form id used to pick the form group (overrides `formId` in the payload).
        #[arg(long)]
        form: Option<String>,
        /// JSON file with the posted fields, or `-` for stdin.
        #[arg(long, default_value = "-")]
        input: PathBuf,
    },

    /// Show totals for a table.
    Status {
        #[arg(long)]
        group: Option<String>,
    },

    /// Show the most recent submissions, newest first.
    Preview {
        #[arg(long)]
        group: Option<String>,
        /// Number of rows (default: `admin.preview_limit`).
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Export a table as csv, xml (Excel 2003) or xlsx.
    Download {
        #[arg(long, default_value = "xlsx")]
        format: ExportFormat,
        /// Output file (default: form-submissions-<timestamp>.<ext>).
        #[arg(long)]
        output: Option<PathBuf>,
        #[arg(long)]
        group: Option<String>,
        /// Admin token, required when `admin.token` is configured.
        #[arg(long)]
        token: Option<String>,
    },

    /// Delete a table's backing file.
    Clear {
        #[arg(long)]
        group: Option<String>,
        #[arg(long)]
        token: Option<String>,
        /// Confirm the deletion.
        #[arg(long)]
        yes: bool,
    },

    /// Validate the configuration and print the field map.
    CheckConfig,
}
