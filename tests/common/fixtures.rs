//! Static file contents and configs used across harnesses.

use std::path::{Path, PathBuf};

/// A table written by an older revision: no `Token` column.
pub const CSV_WITHOUT_TOKEN: &str = "\u{feff}Entry ID,Timestamp,Email,Phone,Newsletter Consent,E-Mail Consent,Phone/SMS Consent,Mail Consent,Terms Accepted\n\
1,2024-01-15 10:00:00,a@x.com,555-0100,Yes,Yes,No,Yes,Yes\n\
2,2024-01-15 10:05:00,b@x.com,,I do not agree,No,No,No,Yes\n";

/// Backing-file contents that cannot be read as a table.
pub const MALFORMED_FILES: &[&[u8]] = &[
    b"\x00\x01\x02 binary junk",
    b"name,phone\nAda,555\n",
    b"Email,Phone\n\xff\xfe\xfd,1\n",
    b"<?xml version=\"1.0\"?><Workbook></Workbook>",
];

/// Write `contents` as `config.toml` in `dir`, pointing `data_dir` at
/// `dir/form-data`. Returns the config path.
pub fn write_config(dir: &Path, extra: &str) -> PathBuf {
    let data_dir = dir.join("form-data");
    let body = format!(
        "[storage]\ndata_dir = {:?}\n\n{extra}\n",
        data_dir.display().to_string()
    );
    let path = dir.join("config.toml");
    std::fs::write(&path, body).expect("write test config");
    path
}

/// A submission payload as the form builder would post it.
pub fn signup_json(email: &str, newsletter: &str) -> serde_json::Value {
    serde_json::json!({
        "formId": "signup",
        "form-field-ehvmdc": "101",
        "form-field-2ba381": email,
        "form-field-vsjpsv": "+49 170 1234567",
        "form-field-wfejpt": [newsletter],
        "form-field-vkpqeq": ["Yes"],
        "form-field-gakgwk": ["Yes"],
        "form-field-ytzddf": ["No"],
        "form-field-csfous": ["on"],
    })
}
