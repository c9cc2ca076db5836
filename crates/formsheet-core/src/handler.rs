//! Handler: one submission from raw fields to a saved row.
//!
//! ```text
//! Submission ──► Normalizer ──► RecordStore::load ──► upsert ──► save
//! ```
//!
//! The store is passed in, so tests can run the full flow against a
//! [`MemoryStore`](crate::store::MemoryStore).

use crate::config::{Config, DedupKey};
use crate::error::StoreError;
use crate::normalizer::Normalizer;
use crate::store::{CsvFileStore, DataDir, RecordStore, UpsertOutcome};
use crate::types::{Submission, SubmissionRecord};
use chrono::NaiveDateTime;

/// Result of handling one submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handled {
    pub record: SubmissionRecord,
    pub outcome: UpsertOutcome,
    /// Form group the record was routed to (`None` = default file).
    pub group: Option<String>,
}

/// Routes submissions to their group's backing file and upserts them.
#[derive(Debug, Clone)]
pub struct SubmissionHandler {
    config: Config,
    normalizer: Normalizer,
    data_dir: DataDir,
}

impl SubmissionHandler {
    pub fn new(config: Config) -> Self {
        let normalizer = Normalizer::new(config.fields.clone());
        let data_dir = DataDir::from_config(&config.storage);
        Self {
            config,
            normalizer,
            data_dir,
        }
    }

    pub fn data_dir(&self) -> &DataDir {
        &self.data_dir
    }

    pub fn dedup_key(&self) -> DedupKey {
        self.config.storage.dedup_key
    }

    /// Name of the group `form_id` belongs to, if any.
    pub fn group_for(&self, form_id: Option<&str>) -> Option<&str> {
        self.config.group_for_form(form_id).map(|g| g.name.as_str())
    }

    pub fn store_for(&self, form_id: Option<&str>) -> CsvFileStore {
        self.data_dir.store_for(self.group_for(form_id))
    }

    /// Store `submission` in its group's file, stamped with the current time.
    pub fn handle(&self, submission: &Submission) -> Result<Handled, StoreError> {
        self.data_dir.ensure()?;
        let store = self.store_for(submission.form_id.as_deref());
        self.handle_with(&store, submission, chrono::Local::now().naive_local())
    }

    /// Store `submission` in an explicit store.
    pub fn handle_with(
        &self,
        store: &dyn RecordStore,
        submission: &Submission,
        at: NaiveDateTime,
    ) -> Result<Handled, StoreError> {
        let record = self.normalizer.normalize_at(submission, at);
        let outcome = process(store, record.clone(), self.dedup_key())?;
        Ok(Handled {
            record,
            outcome,
            group: self.group_for(submission.form_id.as_deref()).map(str::to_string),
        })
    }
}

/// Load, upsert, save. A failed save drops the record for this request.
pub fn process(
    store: &dyn RecordStore,
    record: SubmissionRecord,
    key: DedupKey,
) -> Result<UpsertOutcome, StoreError> {
    let mut table = store.load();
    let email = record.email.clone();
    let outcome = table.upsert(record, key);

    if let Err(err) = store.save(&table) {
        tracing::error!(store = %store.describe(), error = %err, "could not save submission");
        return Err(err);
    }

    match outcome {
        UpsertOutcome::Inserted { row } => {
            tracing::info!(store = %store.describe(), row, %email, "added new entry")
        }
        UpsertOutcome::Replaced { row } => {
            tracing::info!(store = %store.describe(), row, %email, "updated existing entry")
        }
    }
    Ok(outcome)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::types::Consent;
    use pretty_assertions::assert_eq;

    fn at(sec: u32) -> NaiveDateTime {
        chrono::NaiveDate::from_ymd_opt(2024, 1, 15)
            .and_then(|d| d.and_hms_opt(10, 0, sec))
            .unwrap()
    }

    fn handler() -> SubmissionHandler {
        SubmissionHandler::new(Config::defaults())
    }

    fn signup(email: &str, entry_id: &str) -> Submission {
        Submission::new()
            .field("form-field-ehvmdc", entry_id)
            .field("form-field-2ba381", email)
            .field("form-field-wfejpt", vec!["Yes"])
            .field("form-field-vkpqeq", vec!["Yes"])
            .field("form-field-csfous", "on")
    }

    #[test]
    fn resubmission_replaces_row_in_place() {
        let store = MemoryStore::new();
        let h = handler();
        h.handle_with(&store, &signup("a@x.com", "1"), at(0)).unwrap();
        h.handle_with(&store, &signup("b@x.com", "2"), at(1)).unwrap();
        let handled = h.handle_with(&store, &signup("A@X.com", "3"), at(2)).unwrap();

        assert_eq!(handled.outcome, UpsertOutcome::Replaced { row: 0 });
        let table = store.load();
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows()[0].entry_id, "3");
        assert_eq!(table.rows()[0].timestamp, "2024-01-15 10:00:02");
        assert_eq!(table.rows()[0].email_consent, Consent::Yes);
        assert_eq!(table.rows()[0].terms_accepted, Consent::Yes);
    }

    #[test]
    fn corrupt_store_is_replaced_by_fresh_table() {
        let store = MemoryStore::with_bytes(b"\x00\x01garbage".to_vec());
        let handled = handler()
            .handle_with(&store, &signup("a@x.com", "1"), at(0))
            .unwrap();
        assert_eq!(handled.outcome, UpsertOutcome::Inserted { row: 0 });
        assert_eq!(store.load().len(), 1);
    }

    #[test]
    fn failed_save_is_surfaced() {
        let err = handler()
            .handle_with(&MemoryStore::read_only(), &signup("a@x.com", "1"), at(0))
            .unwrap_err();
        assert!(matches!(err, StoreError::Write { .. }));
    }

    #[test]
    fn groups_route_to_their_own_file() {
        let mut config = Config::from_toml(
            r#"
            [[groups]]
            name = "events"
            forms = ["evt01"]
            "#,
        )
        .unwrap();
        let dir = tempfile::tempdir().unwrap();
        config.storage.data_dir = dir.path().join("form-data");
        let h = SubmissionHandler::new(config);

        let mut grouped = signup("a@x.com", "1");
        grouped.form_id = Some("evt01".to_string());
        let handled = h.handle(&grouped).unwrap();
        assert_eq!(handled.group.as_deref(), Some("events"));
        h.handle(&signup("b@x.com", "2")).unwrap();

        let events = h.data_dir().store_for(Some("events")).load();
        let default = h.data_dir().store_for(None).load();
        assert_eq!(events.rows()[0].email, "a@x.com");
        assert_eq!(default.rows()[0].email, "b@x.com");
        assert!(h.data_dir().root().join(".htaccess").is_file());
    }
}
