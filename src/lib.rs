//! formsheet: store form submissions in a spreadsheet file.
//!
//! The binary is a thin shell over [`formsheet_core`]: [`cli`] declares the
//! arguments and [`commands`] runs them. Both are public so integration
//! tests can drive the CLI without spawning a process.

pub mod cli;
pub mod commands;

pub use formsheet_core;
