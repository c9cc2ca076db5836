//! Normalizer: maps a raw [`Submission`] onto a canonical [`SubmissionRecord`].
//!
//! Field identifiers are looked up through the configured [`FieldMap`]; every
//! value is reduced to its first element and sanitised to plain text. The
//! newsletter answer then decides the channel consents: declining the
//! newsletter forces every channel to `No` regardless of what was posted.
//!
//! Normalisation is total. Unknown keys are ignored and missing keys fall back
//! to empty strings or `No`.

use crate::config::FieldMap;
use crate::types::{Consent, FieldValue, Submission, SubmissionRecord};
use chrono::NaiveDateTime;
use regex::Regex;
use std::sync::LazyLock;

/// Timestamp layout written to the `Timestamp` column.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

static SCRIPT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(script|style)\b[^>]*>.*?</(script|style)\s*>")
        .expect("script pattern is valid")
});
static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("tag pattern is valid"));

// ---------------------------------------------------------------------------
// Normalizer
// ---------------------------------------------------------------------------

/// Builds [`SubmissionRecord`]s from raw submissions.
#[derive(Debug, Clone)]
pub struct Normalizer {
    fields: FieldMap,
}

impl Normalizer {
    pub fn new(fields: FieldMap) -> Self {
        Self { fields }
    }

    /// Normalise using the current local time as the record timestamp.
    pub fn normalize(&self, submission: &Submission) -> SubmissionRecord {
        self.normalize_at(submission, chrono::Local::now().naive_local())
    }

    /// Normalise with an explicit timestamp.
    pub fn normalize_at(&self, submission: &Submission, at: NaiveDateTime) -> SubmissionRecord {
        let text = |identifier: &str| resolve(submission.get(identifier)).unwrap_or_default();
        let f = &self.fields;

        let mut record = SubmissionRecord {
            entry_id: text(&f.entry_id),
            timestamp: at.format(TIMESTAMP_FORMAT).to_string(),
            email: submission
                .get(&f.email)
                .and_then(FieldValue::first)
                .map(sanitize_email)
                .unwrap_or_default(),
            phone: text(&f.phone),
            newsletter_consent: text(&f.newsletter),
            terms_accepted: Consent::from_presence(&text(&f.terms)),
            token: f.token.as_deref().map(text).unwrap_or_default(),
            ..Default::default()
        };

        if record.declined_newsletter() {
            for identifier in [&f.email_consent, &f.phone_sms_consent, &f.mail_consent] {
                if let Some(submitted) = resolve(submission.get(identifier)) {
                    tracing::debug!(
                        field = %identifier,
                        %submitted,
                        "newsletter declined; overriding to No"
                    );
                }
            }
            record.enforce_consent_override();
        } else {
            record.email_consent = Consent::from_exact(&text(&f.email_consent));
            record.phone_sms_consent = Consent::from_exact(&text(&f.phone_sms_consent));
            record.mail_consent = Consent::from_exact(&text(&f.mail_consent));
        }

        tracing::debug!(
            entry_id = %record.entry_id,
            email = %record.email,
            newsletter = %record.newsletter_consent,
            email_consent = %record.email_consent,
            phone_sms_consent = %record.phone_sms_consent,
            mail_consent = %record.mail_consent,
            terms = %record.terms_accepted,
            "normalised submission"
        );
        record
    }
}

// ---------------------------------------------------------------------------
// Value resolution and sanitisation
// ---------------------------------------------------------------------------

/// First element of a (possibly sequence) value, sanitised. `None` when the
/// key is missing or the sequence is empty.
pub fn resolve(value: Option<&FieldValue>) -> Option<String> {
    value.and_then(FieldValue::first).map(sanitize_text)
}

/// Reduce input to a single line of plain text: markup removed, control
/// characters dropped, whitespace runs collapsed, ends trimmed.
pub fn sanitize_text(input: &str) -> String {
    let without_scripts = SCRIPT_RE.replace_all(input, "");
    let without_tags = TAG_RE.replace_all(&without_scripts, "");
    let mut out = String::with_capacity(without_tags.len());
    for word in without_tags
        .split(|c: char| c.is_whitespace() || c.is_control())
        .filter(|w| !w.is_empty())
    {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
    }
    out
}

/// Strip everything not allowed in an address. Returns an empty string if
/// what remains is not shaped like `local@domain.tld`.
pub fn sanitize_email(input: &str) -> String {
    let text = sanitize_text(input);
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || "!#$%&'*+/=?^_`{|}~.@-".contains(*c))
        .collect();

    let mut parts = cleaned.split('@');
    let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
        return String::new();
    };
    let domain = domain.trim_matches(|c| c == '.' || c == '-');
    if local.is_empty() || !domain.contains('.') || domain.contains("..") {
        return String::new();
    }
    format!("{local}@{domain}")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
