//! Export: renders a [`RecordTable`] as a downloadable file.
//!
//! Three formats are supported: the CSV backing format itself, the XML
//! Spreadsheet 2003 dialect (opens in Excel as `.xls`), and a real `.xlsx`
//! workbook written with `rust_xlsxwriter`. Every cell is exported as text.

use crate::error::ExportError;
use crate::store::{encode_csv, record_cells, RecordTable, HEADERS};
use chrono::NaiveDateTime;
use rust_xlsxwriter::{Format, Workbook};
use std::fmt::Write as _;

/// Worksheet title used by the spreadsheet formats.
pub const SHEET_NAME: &str = "Form Submissions";

/// Output file format for a download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportFormat {
    Csv,
    SpreadsheetXml,
    Xlsx,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::SpreadsheetXml => "xls",
            ExportFormat::Xlsx => "xlsx",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv; charset=utf-8",
            ExportFormat::SpreadsheetXml => "application/vnd.ms-excel",
            ExportFormat::Xlsx => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
        }
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportFormat::Csv => write!(f, "csv"),
            ExportFormat::SpreadsheetXml => write!(f, "xml"),
            ExportFormat::Xlsx => write!(f, "xlsx"),
        }
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "xml" | "xls" => Ok(ExportFormat::SpreadsheetXml),
            "xlsx" => Ok(ExportFormat::Xlsx),
            other => Err(format!("unknown export format: {other} (expected csv, xml or xlsx)")),
        }
    }
}

/// A rendered download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Export {
    pub format: ExportFormat,
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Render `table` in `format`, naming the file after `at`.
pub fn export(
    table: &RecordTable,
    format: ExportFormat,
    at: NaiveDateTime,
) -> Result<Export, ExportError> {
    let bytes = match format {
        ExportFormat::Csv => encode_csv(table)?,
        ExportFormat::SpreadsheetXml => to_spreadsheet_xml(table).into_bytes(),
        ExportFormat::Xlsx => to_xlsx(table)?,
    };
    Ok(Export {
        format,
        file_name: download_file_name(format, at),
        bytes,
    })
}

/// `form-submissions-YYYY-MM-DD-HHMMSS.<ext>`
pub fn download_file_name(format: ExportFormat, at: NaiveDateTime) -> String {
    format!(
        "form-submissions-{}.{}",
        at.format("%Y-%m-%d-%H%M%S"),
        format.extension()
    )
}

// ---------------------------------------------------------------------------
// XML Spreadsheet 2003
// ---------------------------------------------------------------------------

/// Render the table as an XML Spreadsheet 2003 document with a bold header.
pub fn to_spreadsheet_xml(table: &RecordTable) -> String {
    let mut xml = String::new();
    xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    xml.push_str("<?mso-application progid=\"Excel.Sheet\"?>\n");
    xml.push_str("<Workbook xmlns=\"urn:schemas-microsoft-com:office:spreadsheet\"\n");
    xml.push_str(" xmlns:ss=\"urn:schemas-microsoft-com:office:spreadsheet\">\n");
    xml.push_str("<Styles>\n<Style ss:ID=\"header\"><Font ss:Bold=\"1\"/></Style>\n</Styles>\n");
    let _ = writeln!(xml, "<Worksheet ss:Name=\"{}\">", escape_xml(SHEET_NAME));
    xml.push_str("<Table>\n");

    push_xml_row(&mut xml, HEADERS, Some("header"));
    for row in table.rows() {
        push_xml_row(&mut xml, record_cells(row), None);
    }

    xml.push_str("</Table>\n</Worksheet>\n</Workbook>\n");
    xml
}

fn push_xml_row<'a>(
    xml: &mut String,
    cells: impl IntoIterator<Item = &'a str>,
    style: Option<&str>,
) {
    xml.push_str("<Row>\n");
    for cell in cells {
        match style {
            Some(id) => {
                let _ = write!(xml, "<Cell ss:StyleID=\"{id}\">");
            }
            None => xml.push_str("<Cell>"),
        }
        let _ = writeln!(
            xml,
            "<Data ss:Type=\"String\">{}</Data></Cell>",
            escape_xml(cell)
        );
    }
    xml.push_str("</Row>\n");
}

fn escape_xml(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            '\n' => out.push_str("&#10;"),
            c if c.is_control() && c != '\t' => {}
            c => out.push(c),
        }
    }
    out
}

// ---------------------------------------------------------------------------
// XLSX
// ---------------------------------------------------------------------------

/// Render the table as an `.xlsx` workbook.
pub fn to_xlsx(table: &RecordTable) -> Result<Vec<u8>, ExportError> {
    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();

    let worksheet = workbook.add_worksheet();
    worksheet.set_name(SHEET_NAME)?;
    for (col, title) in HEADERS.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, *title, &header)?;
    }
    for (i, row) in table.rows().iter().enumerate() {
        let r = (i + 1) as u32;
        for (col, cell) in record_cells(row).iter().enumerate() {
            worksheet.write_string(r, col as u16, clamp_cell(cell))?;
        }
    }
    worksheet.set_freeze_panes(1, 0)?;
    worksheet.autofit();

    Ok(workbook.save_to_buffer()?)
}

/// Longest string Excel stores in one cell.
pub const XLSX_MAX_CELL_CHARS: usize = 32_767;

/// Cut `cell` to [`XLSX_MAX_CELL_CHARS`] characters. The stored table keeps
/// the full value; only the workbook copy is shortened.
fn clamp_cell(cell: &str) -> &str {
    match cell.char_indices().nth(XLSX_MAX_CELL_CHARS) {
        Some((end, _)) => {
            tracing::warn!(chars = cell.chars().count(), "cell too long for xlsx; truncated");
            &cell[..end]
        }
        None => cell,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
