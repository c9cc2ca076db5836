//! Test builders: ergonomic constructors for submissions and records.
//!
//! These builders are designed for readability in test assertions, not for
//! production use. Field identifiers come from the default configuration.

use formsheet_core::{Config, Consent, FieldValue, Submission, SubmissionRecord};

// ---------------------------------------------------------------------------
// SubmissionBuilder
// ---------------------------------------------------------------------------

/// Fluent builder for raw [`Submission`]s keyed by canonical role.
///
/// # Example
///
/// ```rust
/// let submission = SubmissionBuilder::new()
///     .email("a@x.com")
///     .newsletter("I do not agree")
///     .email_consent(vec!["Yes"])
///     .build();
/// ```
pub struct SubmissionBuilder {
    fields: formsheet_core::FieldMap,
    submission: Submission,
}

impl SubmissionBuilder {
    pub fn new() -> Self {
        Self {
            fields: Config::defaults().fields,
            submission: Submission::new(),
        }
    }

    pub fn form(mut self, form_id: &str) -> Self {
        self.submission.form_id = Some(form_id.to_string());
        self
    }

    pub fn entry_id(self, v: impl Into<FieldValue>) -> Self {
        let key = self.fields.entry_id.clone();
        self.raw(&key, v)
    }

    pub fn email(self, v: impl Into<FieldValue>) -> Self {
        let key = self.fields.email.clone();
        self.raw(&key, v)
    }

    pub fn phone(self, v: impl Into<FieldValue>) -> Self {
        let key = self.fields.phone.clone();
        self.raw(&key, v)
    }

    pub fn newsletter(self, v: impl Into<FieldValue>) -> Self {
        let key = self.fields.newsletter.clone();
        self.raw(&key, v)
    }

    pub fn email_consent(self, v: impl Into<FieldValue>) -> Self {
        let key = self.fields.email_consent.clone();
        self.raw(&key, v)
    }

    pub fn phone_sms_consent(self, v: impl Into<FieldValue>) -> Self {
        let key = self.fields.phone_sms_consent.clone();
        self.raw(&key, v)
    }

    pub fn mail_consent(self, v: impl Into<FieldValue>) -> Self {
        let key = self.fields.mail_consent.clone();
        self.raw(&key, v)
    }

    pub fn terms(self, v: impl Into<FieldValue>) -> Self {
        let key = self.fields.terms.clone();
        self.raw(&key, v)
    }

    /// Set an arbitrary form identifier.
    pub fn raw(mut self, key: &str, v: impl Into<FieldValue>) -> Self {
        self.submission.insert(key, v);
        self
    }

    pub fn build(self) -> Submission {
        self.submission
    }
}

// ---------------------------------------------------------------------------
// RecordBuilder
// ---------------------------------------------------------------------------

/// Fluent builder for canonical [`SubmissionRecord`]s.
pub struct RecordBuilder {
    record: SubmissionRecord,
}

impl RecordBuilder {
    pub fn new(email: &str) -> Self {
        Self {
            record: SubmissionRecord {
                timestamp: "2024-01-15 10:00:00".to_string(),
                email: email.to_string(),
                newsletter_consent: "Yes".to_string(),
                terms_accepted: Consent::Yes,
                ..Default::default()
            },
        }
    }

    pub fn entry_id(mut self, id: &str) -> Self {
        self.record.entry_id = id.to_string();
        self
    }

    pub fn timestamp(mut self, ts: &str) -> Self {
        self.record.timestamp = ts.to_string();
        self
    }

    pub fn phone(mut self, phone: &str) -> Self {
        self.record.phone = phone.to_string();
        self
    }

    pub fn newsletter(mut self, answer: &str) -> Self {
        self.record.newsletter_consent = answer.to_string();
        self
    }

    pub fn channels(mut self, email: Consent, phone_sms: Consent, mail: Consent) -> Self {
        self.record.email_consent = email;
        self.record.phone_sms_consent = phone_sms;
        self.record.mail_consent = mail;
        self
    }

    pub fn build(self) -> SubmissionRecord {
        self.record
    }
}

// ---------------------------------------------------------------------------
// Convenience constructors
// ---------------------------------------------------------------------------

/// A fixed normalisation timestamp: 2024-01-15 10:00:`sec`.
pub fn at(sec: u32) -> chrono::NaiveDateTime {
    chrono::NaiveDate::from_ymd_opt(2024, 1, 15)
        .and_then(|d| d.and_hms_opt(10, 0, sec))
        .expect("valid test timestamp")
}

/// Build `n` distinct records `user0@x.com`, `user1@x.com`, ...
pub fn build_records(n: usize) -> Vec<SubmissionRecord> {
    (0..n)
        .map(|i| {
            RecordBuilder::new(&format!("user{i}@x.com"))
                .entry_id(&i.to_string())
                .build()
        })
        .collect()
}
