//! Normalizer integration harness.
//!
//! # What this covers
//!
//! - **Newsletter override**: when the newsletter answer is exactly
//!   `I do not agree`, every channel consent is `No` whatever was posted.
//! - **Channel consents**: otherwise each channel is `Yes` iff its resolved
//!   value is exactly `Yes`.
//! - **Terms**: `Yes` iff the resolved value is non-empty.
//! - **Value resolution**: sequences contribute their first element; empty
//!   sequences count as absent.
//! - **Totality**: arbitrary field maps (unknown keys, odd values) always
//!   produce a record. Verified with proptest.
//!
//! # Running
//!
//! ```sh
//! cargo test --test normalization_harness
//! ```

mod common;
use common::*;
use formsheet_core::{Config, Consent, FieldValue, Normalizer, Submission, NEWSLETTER_DECLINED};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use rstest::rstest;

fn normalizer() -> Normalizer {
    Normalizer::new(Config::defaults().fields)
}

// ---------------------------------------------------------------------------
// Worked examples
// ---------------------------------------------------------------------------

/// `{newsletter: "I do not agree", email_consent: "Yes"}` stores `No`.
#[test]
fn declined_newsletter_overrides_email_consent() {
    let s = SubmissionBuilder::new()
        .newsletter(NEWSLETTER_DECLINED)
        .email_consent("Yes")
        .build();
    let record = normalizer().normalize_at(&s, at(0));
    assert_channels!(record, No, No, No);
}

/// `{newsletter: "Yes", email_consent: "Yes", phone: "No"}` keeps each answer.
#[test]
fn agreed_newsletter_keeps_channel_answers() {
    let s = SubmissionBuilder::new()
        .newsletter("Yes")
        .email_consent("Yes")
        .phone_sms_consent("No")
        .build();
    let record = normalizer().normalize_at(&s, at(0));
    assert_channels!(record, Yes, No, No);
}

/// Absent terms → `No`; `on` → `Yes`.
#[test]
fn terms_presence() {
    let n = normalizer();
    let absent = n.normalize_at(&SubmissionBuilder::new().build(), at(0));
    let on = n.normalize_at(&SubmissionBuilder::new().terms("on").build(), at(0));
    assert_eq!(absent.terms_accepted, Consent::No);
    assert_eq!(on.terms_accepted, Consent::Yes);
}

// ---------------------------------------------------------------------------
// Parameterised channel cases
// ---------------------------------------------------------------------------

#[rstest]
#[case::radio_sequence(vec!["Yes"].into(), Consent::Yes)]
#[case::plain_string("Yes".into(), Consent::Yes)]
#[case::lowercase("yes".into(), Consent::No)]
#[case::padded(" Yes ".into(), Consent::Yes)]
#[case::first_of_many(vec!["No", "Yes"].into(), Consent::No)]
#[case::empty_sequence(FieldValue::Multi(vec![]), Consent::No)]
#[case::checkbox_on("on".into(), Consent::No)]
fn channel_value_resolution(#[case] value: FieldValue, #[case] expected: Consent) {
    let s = SubmissionBuilder::new()
        .newsletter("Yes")
        .mail_consent(value)
        .build();
    assert_eq!(normalizer().normalize_at(&s, at(0)).mail_consent, expected);
}

#[rstest]
#[case::exact(NEWSLETTER_DECLINED, true)]
#[case::sequence_first("I do not agree", true)]
#[case::different_case("i do not agree", false)]
#[case::agree("I agree", false)]
#[case::empty("", false)]
fn only_the_exact_phrase_declines(#[case] answer: &str, #[case] declines: bool) {
    let s = SubmissionBuilder::new()
        .newsletter(vec![answer])
        .email_consent("Yes")
        .phone_sms_consent("Yes")
        .mail_consent("Yes")
        .build();
    let record = normalizer().normalize_at(&s, at(0));
    assert_eq!(record.declined_newsletter(), declines);
    let expected = if declines { Consent::No } else { Consent::Yes };
    assert_eq!(record.email_consent, expected);
}

/// Markup in the newsletter answer is stripped before the comparison.
#[test]
fn newsletter_answer_is_sanitised_before_matching() {
    let s = SubmissionBuilder::new()
        .newsletter("<b>I do not agree</b>")
        .email_consent("Yes")
        .build();
    let record = normalizer().normalize_at(&s, at(0));
    assert_eq!(record.newsletter_consent, NEWSLETTER_DECLINED);
    assert_channels!(record, No, No, No);
}

/// A JSON payload from the form builder normalises end to end.
#[test]
fn json_payload_normalises() {
    let payload = signup_json("Ada@Example.com", "Yes");
    let s = Submission::from_json(&payload, None);
    let record = normalizer().normalize_at(&s, at(5));

    assert_eq!(s.form_id.as_deref(), Some("signup"));
    assert_eq!(record.entry_id, "101");
    assert_eq!(record.email, "Ada@Example.com");
    assert_eq!(record.phone, "+49 170 1234567");
    assert_eq!(record.timestamp, "2024-01-15 10:00:05");
    assert_channels!(record, Yes, Yes, No);
    assert_eq!(record.terms_accepted, Consent::Yes);
}

// ---------------------------------------------------------------------------
// Property tests
// ---------------------------------------------------------------------------

fn answer() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("Yes".to_string()),
        Just("No".to_string()),
        Just(NEWSLETTER_DECLINED.to_string()),
        Just(String::new()),
        "[ -~]{0,12}",
    ]
}

fn field_value() -> impl Strategy<Value = FieldValue> {
    prop_oneof![
        answer().prop_map(FieldValue::Single),
        prop::collection::vec(answer(), 0..3).prop_map(FieldValue::Multi),
    ]
}

fn any_submission() -> impl Strategy<Value = Submission> {
    let keys = prop_oneof![
        Just("form-field-wfejpt".to_string()),
        Just("form-field-vkpqeq".to_string()),
        Just("form-field-gakgwk".to_string()),
        Just("form-field-ytzddf".to_string()),
        Just("form-field-csfous".to_string()),
        Just("form-field-2ba381".to_string()),
        "[a-z-]{1,12}",
    ];
    prop::collection::vec((keys, field_value()), 0..10).prop_map(|pairs| {
        pairs
            .into_iter()
            .fold(Submission::new(), |s, (k, v)| s.field(k, v))
    })
}

proptest! {
    /// The override holds for every possible submission.
    #[test]
    fn prop_consent_invariant_holds(s in any_submission()) {
        let record = normalizer().normalize_at(&s, at(0));
        assert_consent_invariant(&record);
    }

    /// Without a decline, each channel is `Yes` iff its resolved input is `Yes`.
    #[test]
    fn prop_channels_follow_input(s in any_submission()) {
        let record = normalizer().normalize_at(&s, at(0));
        prop_assume!(!record.declined_newsletter());
        let resolved = |key: &str| formsheet_core::normalizer::resolve(s.get(key));
        prop_assert_eq!(
            record.email_consent.is_yes(),
            resolved("form-field-vkpqeq").as_deref() == Some("Yes")
        );
        prop_assert_eq!(
            record.phone_sms_consent.is_yes(),
            resolved("form-field-gakgwk").as_deref() == Some("Yes")
        );
        prop_assert_eq!(
            record.mail_consent.is_yes(),
            resolved("form-field-ytzddf").as_deref() == Some("Yes")
        );
    }

    /// Terms are `Yes` iff the resolved value is non-empty.
    #[test]
    fn prop_terms_follow_presence(s in any_submission()) {
        let record = normalizer().normalize_at(&s, at(0));
        let resolved = formsheet_core::normalizer::resolve(s.get("form-field-csfous"))
            .unwrap_or_default();
        prop_assert_eq!(record.terms_accepted.is_yes(), !resolved.is_empty());
    }
}
