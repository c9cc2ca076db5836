//! Custom assertion macros and helpers for formsheet tests.

use formsheet_core::{Consent, RecordTable, SubmissionRecord};

// ---------------------------------------------------------------------------
// Record assertions
// ---------------------------------------------------------------------------

/// Assert the three channel consents of a record.
///
/// ```rust
/// assert_channels!(record, No, No, No);
/// ```
#[macro_export]
macro_rules! assert_channels {
    ($record:expr, $email:ident, $phone:ident, $mail:ident) => {{
        let record: &formsheet_core::SubmissionRecord = &$record;
        let actual = (
            record.email_consent,
            record.phone_sms_consent,
            record.mail_consent,
        );
        let expected = (
            formsheet_core::Consent::$email,
            formsheet_core::Consent::$phone,
            formsheet_core::Consent::$mail,
        );
        if actual != expected {
            panic!(
                "assert_channels! failed:\n  expected: {:?}\n  actual:   {:?}\n  record:   {:?}",
                expected, actual, record
            );
        }
    }};
}

/// Panic if a record breaks the newsletter override rule.
pub fn assert_consent_invariant(record: &SubmissionRecord) {
    if record.declined_newsletter() {
        assert_eq!(
            (record.email_consent, record.phone_sms_consent, record.mail_consent),
            (Consent::No, Consent::No, Consent::No),
            "declined newsletter must force every channel off: {record:?}"
        );
    }
}

/// Panic unless `table` holds exactly the given emails, in order.
pub fn assert_emails(table: &RecordTable, expected: &[&str]) {
    let actual: Vec<&str> = table.rows().iter().map(|r| r.email.as_str()).collect();
    assert_eq!(actual, expected, "table emails differ");
}

/// Panic if two rows share a (case-insensitive) email.
pub fn assert_unique_emails(table: &RecordTable) {
    let mut seen = std::collections::HashSet::new();
    for key in table.rows().iter().filter_map(SubmissionRecord::email_key) {
        assert!(seen.insert(key.clone()), "duplicate email in table: {key}");
    }
}
