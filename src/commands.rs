//! Subcommand implementations.
//!
//! Each command writes its human-readable result to `out`; logs go to
//! stderr through `tracing`.

use crate::cli::{Cli, Command};
use anyhow::{bail, Context, Result};
use formsheet_core::admin::{self, AdminAction, AdminRequest, Dashboard, Preview, TokenGuard};
use formsheet_core::export::ExportFormat;
use formsheet_core::store::{CsvFileStore, DataDir, RecordStore};
use formsheet_core::{Config, Submission, SubmissionHandler, UpsertOutcome};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// Load configuration, apply CLI overrides, and run the chosen command.
pub fn dispatch(cli: Cli, out: &mut dyn Write) -> Result<()> {
    let mut config = Config::load(cli.config.as_deref()).context("loading configuration")?;
    if let Some(dir) = cli.data_dir {
        config.storage.data_dir = dir;
    }

    match cli.command {
        Command::Submit { form, input } => submit(config, form, &input, out),
        Command::Status { group } => status(&config, group.as_deref(), out),
        Command::Preview { group, limit } => preview(&config, group.as_deref(), limit, out),
        Command::Download {
            format,
            output,
            group,
            token,
        } => download(&config, format, output, group.as_deref(), token.as_deref(), out),
        Command::Clear { group, token, yes } => {
            clear(&config, group.as_deref(), token.as_deref(), yes, out)
        }
        Command::CheckConfig => check_config(&config, out),
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn submit(config: Config, form: Option<String>, input: &Path, out: &mut dyn Write) -> Result<()> {
    let raw = read_input(input)?;
    let payload: serde_json::Value =
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", input.display()))?;
    let submission = Submission::from_json(&payload, form);
    tracing::debug!(fields = submission.len(), form = ?submission.form_id, "submission received");

    let handler = SubmissionHandler::new(config);
    let handled = handler
        .handle(&submission)
        .context("saving submission")?;

    let verb = match handled.outcome {
        UpsertOutcome::Inserted { .. } => "added",
        UpsertOutcome::Replaced { .. } => "updated",
    };
    writeln!(
        out,
        "{verb} row {} in {}",
        handled.outcome.row() + 1,
        handler.store_for(submission.form_id.as_deref()).path().display()
    )?;
    Ok(())
}

fn status(config: &Config, group: Option<&str>, out: &mut dyn Write) -> Result<()> {
    let store = store_for_group(config, group)?;
    let dash = Dashboard::collect(&store);
    writeln!(out, "File:               {}", store.path().display())?;
    writeln!(out, "Total submissions:  {}", dash.total_submissions)?;
    writeln!(out, "Latest submission:  {}", dash.latest_display())?;
    writeln!(out, "File size:          {}", dash.size_display())?;
    Ok(())
}

fn preview(
    config: &Config,
    group: Option<&str>,
    limit: Option<usize>,
    out: &mut dyn Write,
) -> Result<()> {
    let store = store_for_group(config, group)?;
    let limit = limit.unwrap_or(config.admin.preview_limit);
    let preview = Preview::build(&store.load(), limit);
    if preview.is_empty() {
        writeln!(out, "No submissions to preview.")?;
        return Ok(());
    }

    let mut widths: Vec<usize> = preview.headers.iter().map(|h| h.chars().count()).collect();
    for row in &preview.rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.text.chars().count());
        }
    }
    let line = |cells: Vec<&str>| -> String {
        cells
            .iter()
            .zip(&widths)
            .map(|(c, &w)| format!("{c:<w$}"))
            .collect::<Vec<_>>()
            .join(" | ")
            .trim_end()
            .to_string()
    };

    writeln!(out, "{}", line(preview.headers.clone()))?;
    for row in &preview.rows {
        writeln!(out, "{}", line(row.iter().map(|c| c.text.as_str()).collect()))?;
    }
    Ok(())
}

fn download(
    config: &Config,
    format: ExportFormat,
    output: Option<PathBuf>,
    group: Option<&str>,
    token: Option<&str>,
    out: &mut dyn Write,
) -> Result<()> {
    let store = store_for_group(config, group)?;
    let guard = TokenGuard::new(config.admin.token());
    let request = AdminRequest::new(AdminAction::Download, token);
    let export = admin::download(
        &guard,
        &request,
        &store,
        format,
        chrono::Local::now().naive_local(),
    )?;

    let path = output.unwrap_or_else(|| PathBuf::from(&export.file_name));
    std::fs::write(&path, &export.bytes).with_context(|| format!("writing {}", path.display()))?;
    writeln!(
        out,
        "wrote {} ({}, {} bytes)",
        path.display(),
        export.format.content_type(),
        export.bytes.len()
    )?;
    Ok(())
}

fn clear(
    config: &Config,
    group: Option<&str>,
    token: Option<&str>,
    yes: bool,
    out: &mut dyn Write,
) -> Result<()> {
    let store = store_for_group(config, group)?;
    let guard = TokenGuard::new(config.admin.token());
    let request = AdminRequest::new(AdminAction::Clear, token);
    if !yes {
        bail!(
            "refusing to delete {} without --yes",
            store.path().display()
        );
    }
    if admin::clear(&guard, &request, &store)? {
        writeln!(out, "All submissions cleared from {}", store.path().display())?;
    } else {
        writeln!(out, "Nothing to clear at {}", store.path().display())?;
    }
    Ok(())
}

fn check_config(config: &Config, out: &mut dyn Write) -> Result<()> {
    config.validate()?;
    writeln!(out, "data_dir:  {}", config.storage.data_dir.display())?;
    writeln!(out, "file:      {}", config.storage.file_name)?;
    writeln!(out, "dedup key: {:?}", config.storage.dedup_key)?;
    writeln!(out, "fields:")?;
    for (role, identifier) in config.fields.roles() {
        writeln!(out, "  {role:<18} {identifier}")?;
    }
    for group in &config.groups {
        writeln!(out, "group {}: {}", group.name, group.forms.join(", "))?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn store_for_group(config: &Config, group: Option<&str>) -> Result<CsvFileStore> {
    if let Some(name) = group {
        config.group(name)?;
    }
    Ok(DataDir::from_config(&config.storage).store_for(group))
}

fn read_input(input: &Path) -> Result<String> {
    if input.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("reading submission from stdin")?;
        return Ok(buf);
    }
    std::fs::read_to_string(input).with_context(|| format!("reading {}", input.display()))
}
