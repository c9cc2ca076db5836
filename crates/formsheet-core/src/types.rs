//! Core types for formsheet-core.
//!
//! This module defines the canonical [`SubmissionRecord`], its [`Consent`]
//! flags, and the raw inbound [`Submission`] the normalizer consumes.

use std::collections::BTreeMap;

/// Newsletter answer that withdraws consent on every channel.
pub const NEWSLETTER_DECLINED: &str = "I do not agree";

/// A yes/no flag as stored in the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Consent {
    Yes,
    #[default]
    No,
}

impl Consent {
    /// `Yes` only for the exact string `"Yes"`.
    pub fn from_exact(value: &str) -> Self {
        if value == "Yes" {
            Consent::Yes
        } else {
            Consent::No
        }
    }

    /// `Yes` for any non-empty value.
    pub fn from_presence(value: &str) -> Self {
        if value.is_empty() {
            Consent::No
        } else {
            Consent::Yes
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Consent::Yes => "Yes",
            Consent::No => "No",
        }
    }

    pub fn is_yes(self) -> bool {
        self == Consent::Yes
    }
}

impl std::fmt::Display for Consent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One normalised form submission: a row of the record table.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SubmissionRecord {
    /// External entry identifier from the form builder. May be empty.
    pub entry_id: String,
    /// Creation/update time, `YYYY-MM-DD HH:MM:SS`.
    pub timestamp: String,
    /// Deduplication key (compared trimmed and case-insensitively).
    pub email: String,
    pub phone: String,
    /// Free text answer to the newsletter question.
    pub newsletter_consent: String,
    pub email_consent: Consent,
    pub phone_sms_consent: Consent,
    pub mail_consent: Consent,
    pub terms_accepted: Consent,
    /// Opaque per-submission identifier. Empty when the form has none.
    pub token: String,
}

impl SubmissionRecord {
    /// Whether the newsletter answer withdraws all channel consent.
    pub fn declined_newsletter(&self) -> bool {
        self.newsletter_consent == NEWSLETTER_DECLINED
    }

    /// Force every channel to `No` when the newsletter was declined.
    ///
    /// Returns `true` if any channel was changed.
    pub fn enforce_consent_override(&mut self) -> bool {
        if !self.declined_newsletter() {
            return false;
        }
        let changed = self.email_consent.is_yes()
            || self.phone_sms_consent.is_yes()
            || self.mail_consent.is_yes();
        self.email_consent = Consent::No;
        self.phone_sms_consent = Consent::No;
        self.mail_consent = Consent::No;
        changed
    }

    /// Lower-cased, trimmed email, or `None` when blank.
    pub fn email_key(&self) -> Option<String> {
        let key = self.email.trim();
        (!key.is_empty()).then(|| key.to_lowercase())
    }
}

// ---------------------------------------------------------------------------
// Inbound submission
// ---------------------------------------------------------------------------

/// A posted value: radio groups and checkboxes arrive as sequences.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Single(String),
    Multi(Vec<String>),
}

impl FieldValue {
    /// The single value, or the first element of a sequence.
    pub fn first(&self) -> Option<&str> {
        match self {
            FieldValue::Single(s) => Some(s),
            FieldValue::Multi(items) => items.first().map(String::as_str),
        }
    }

    /// Lenient conversion from arbitrary JSON. `null` means absent.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        use serde_json::Value;
        match value {
            Value::Null => None,
            Value::String(s) => Some(FieldValue::Single(s.clone())),
            Value::Array(items) => Some(FieldValue::Multi(
                items.iter().filter_map(json_scalar).collect(),
            )),
            Value::Bool(_) | Value::Number(_) => json_scalar(value).map(FieldValue::Single),
            Value::Object(_) => Some(FieldValue::Single(value.to_string())),
        }
    }
}

fn json_scalar(value: &serde_json::Value) -> Option<String> {
    use serde_json::Value;
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Single(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Single(value)
    }
}

impl From<Vec<&str>> for FieldValue {
    fn from(values: Vec<&str>) -> Self {
        FieldValue::Multi(values.into_iter().map(str::to_string).collect())
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(values: Vec<String>) -> Self {
        FieldValue::Multi(values)
    }
}

/// The raw field map of one form submission, keyed by form identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Submission {
    /// Form builder id, used to route the record to a form group.
    pub form_id: Option<String>,
    fields: BTreeMap<String, FieldValue>,
}

impl Submission {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn field(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Build a submission from any JSON value.
    ///
    /// Objects become field maps; a top-level `formId` / `form_id` string
    /// sets [`Submission::form_id`] unless `form_id` is given explicitly.
    /// Anything other than an object yields an empty submission.
    pub fn from_json(value: &serde_json::Value, form_id: Option<String>) -> Self {
        let mut submission = Submission {
            form_id,
            fields: BTreeMap::new(),
        };
        let Some(object) = value.as_object() else {
            return submission;
        };
        for (key, raw) in object {
            if let Some(v) = FieldValue::from_json(raw) {
                submission.fields.insert(key.clone(), v);
            }
        }
        if submission.form_id.is_none() {
            submission.form_id = ["formId", "form_id"]
                .iter()
                .find_map(|k| object.get(*k).and_then(|v| v.as_str()))
                .map(str::to_string);
        }
        submission
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
