//! Raw event submissions and the gate that accepts or rejects them.
//!
//! A submission is an untrusted map of field name to value. The gate runs in
//! two steps, both pure: [`missing_required_field`] on the raw map, then
//! [`check_submission`] on the raw map plus the sanitized free-text fields.

use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

use serde::de::{self, Deserializer, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde::Deserialize;

use crate::sanitize::{sanitize, SanitizedText};
use crate::validate::{
    valid_boolean, valid_bounded_string, valid_date, valid_email, valid_integer, valid_time,
    valid_url, FieldLimits,
};

/// Fields that must be present and non-empty in every submission.
pub const REQUIRED_FIELDS: [&str; 7] = [
    "name",
    "time",
    "date",
    "location",
    "link",
    "email",
    "organization",
];

/// One raw value from a submission payload.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    /// A list; only its length is kept.
    Sequence(usize),
    /// A nested object; only its entry count is kept.
    Mapping(usize),
}

impl FieldValue {
    /// Whether the value counts as "present": not null, not false, not zero
    /// and not empty.
    pub fn is_truthy(&self) -> bool {
        match self {
            FieldValue::Null => false,
            FieldValue::Bool(b) => *b,
            FieldValue::Int(n) => *n != 0,
            FieldValue::Float(f) => *f != 0.0,
            FieldValue::Text(s) => !s.is_empty(),
            FieldValue::Sequence(len) | FieldValue::Mapping(len) => *len != 0,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Numeric reading of the value; text is trimmed and parsed.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Int(n) => Some(*n as f64),
            FieldValue::Float(f) => Some(*f),
            FieldValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Bool(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Int(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Text(v)
    }
}

impl<'de> Deserialize<'de> for FieldValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(FieldValueVisitor)
    }
}

struct FieldValueVisitor;

impl<'de> Visitor<'de> for FieldValueVisitor {
    type Value = FieldValue;

    fn expecting(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("any value")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<FieldValue, E> {
        Ok(FieldValue::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<FieldValue, E> {
        Ok(FieldValue::Int(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<FieldValue, E> {
        Ok(match i64::try_from(v) {
            Ok(n) => FieldValue::Int(n),
            Err(_) => FieldValue::Float(v as f64),
        })
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<FieldValue, E> {
        Ok(FieldValue::Float(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<FieldValue, E> {
        Ok(FieldValue::Text(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<FieldValue, E> {
        Ok(FieldValue::Text(v))
    }

    fn visit_unit<E: de::Error>(self) -> Result<FieldValue, E> {
        Ok(FieldValue::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<FieldValue, E> {
        Ok(FieldValue::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<FieldValue, D::Error> {
        FieldValue::deserialize(deserializer)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<FieldValue, A::Error> {
        let mut len = 0;
        while seq.next_element::<IgnoredAny>()?.is_some() {
            len += 1;
        }
        Ok(FieldValue::Sequence(len))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<FieldValue, A::Error> {
        let mut len = 0;
        while map.next_entry::<IgnoredAny, IgnoredAny>()?.is_some() {
            len += 1;
        }
        Ok(FieldValue::Mapping(len))
    }
}

/// A candidate event as submitted: field name to raw value.
///
/// Recognized keys are `name, description, organization, location, date,
/// time, price, link, kids, email`; anything else is carried but ignored.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct EventSubmission {
    fields: BTreeMap<String, FieldValue>,
}

impl EventSubmission {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with<K: Into<String>, V: Into<FieldValue>>(mut self, key: K, value: V) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert<K: Into<String>, V: Into<FieldValue>>(&mut self, key: K, value: V) {
        self.fields.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    /// The key exists and its value is truthy.
    pub fn is_present(&self, key: &str) -> bool {
        self.get(key).is_some_and(FieldValue::is_truthy)
    }

    /// The value under `key` if it is text.
    pub fn text(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(FieldValue::as_text)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<String>, V: Into<FieldValue>> FromIterator<(K, V)> for EventSubmission {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut submission = Self::new();
        for (key, value) in iter {
            submission.insert(key, value);
        }
        submission
    }
}

/// The four free-text fields, each sanitized once.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SanitizedFields {
    pub name: Option<SanitizedText>,
    pub description: Option<SanitizedText>,
    pub organization: Option<SanitizedText>,
    pub location: Option<SanitizedText>,
}

impl SanitizedFields {
    /// Sanitize the free-text fields of `submission`. Missing, empty and
    /// non-text values yield `None`.
    pub fn from_submission(submission: &EventSubmission) -> Self {
        let field = |key: &str| sanitize(submission.text(key));
        Self {
            name: field("name"),
            description: field("description"),
            organization: field("organization"),
            location: field("location"),
        }
    }
}

/// The first field of a submission that failed validation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rejection {
    pub field: &'static str,
}

impl Display for Rejection {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}", self.field)
    }
}

/// The first required field that is missing or falsy, if any.
pub fn missing_required_field(submission: &EventSubmission) -> Option<&'static str> {
    REQUIRED_FIELDS
        .iter()
        .copied()
        .find(|key| !submission.is_present(key))
}

/// All seven required fields are present and truthy.
pub fn has_required_fields(submission: &EventSubmission) -> bool {
    missing_required_field(submission).is_none()
}

/// Validate every present field, stopping at the first failure.
///
/// Absent or falsy fields are skipped; required-ness is checked separately by
/// [`missing_required_field`]. Checks run in the order time, date, price,
/// link, kids, email, name, description, organization, location.
pub fn check_submission(
    submission: &EventSubmission,
    sanitized: &SanitizedFields,
    limits: &FieldLimits,
) -> Result<(), Rejection> {
    check_raw(submission, "time", |v| v.as_text().is_some_and(valid_time))?;
    check_raw(submission, "date", |v| v.as_text().is_some_and(valid_date))?;
    check_raw(submission, "price", valid_integer)?;
    check_raw(submission, "link", valid_url)?;
    check_raw(submission, "kids", valid_boolean)?;
    check_raw(submission, "email", valid_email)?;
    check_text(submission, "name", sanitized.name.as_ref(), limits.name)?;
    check_text(
        submission,
        "description",
        sanitized.description.as_ref(),
        limits.description,
    )?;
    check_text(
        submission,
        "organization",
        sanitized.organization.as_ref(),
        limits.organization,
    )?;
    check_text(
        submission,
        "location",
        sanitized.location.as_ref(),
        limits.location,
    )?;
    Ok(())
}

/// Boolean verdict of [`check_submission`].
pub fn validate_submission(
    submission: &EventSubmission,
    sanitized: &SanitizedFields,
    limits: &FieldLimits,
) -> bool {
    check_submission(submission, sanitized, limits).is_ok()
}

fn check_raw(
    submission: &EventSubmission,
    field: &'static str,
    valid: impl Fn(&FieldValue) -> bool,
) -> Result<(), Rejection> {
    match submission.get(field) {
        Some(value) if value.is_truthy() && !valid(value) => Err(Rejection { field }),
        _ => Ok(()),
    }
}

fn check_text(
    submission: &EventSubmission,
    field: &'static str,
    sanitized: Option<&SanitizedText>,
    max_chars: usize,
) -> Result<(), Rejection> {
    // A present free-text field must be text to begin with.
    if submission
        .get(field)
        .is_some_and(|v| v.is_truthy() && v.as_text().is_none())
    {
        return Err(Rejection { field });
    }
    match sanitized {
        Some(text) if !text.is_empty() && !valid_bounded_string(text.as_str(), max_chars) => {
            Err(Rejection { field })
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete() -> EventSubmission {
        EventSubmission::new()
            .with("name", "Community Yoga")
            .with("time", "09:00")
            .with("date", "2026-06-20")
            .with("location", "Riverside Park")
            .with("organization", "Community")
            .with("link", "https://example.com")
            .with("email", "test@example.com")
    }

    fn verdict(submission: &EventSubmission) -> Result<(), Rejection> {
        let sanitized = SanitizedFields::from_submission(submission);
        check_submission(submission, &sanitized, &FieldLimits::default())
    }

    #[test]
    fn deserializes_json_object() {
        let json = r#"{
            "name": "Yoga", "price": 10, "big": 18446744073709551615, "fee": 2.5,
            "kids": true, "description": null, "tags": ["a", "b"], "meta": {}
        }"#;
        let submission: EventSubmission = serde_json::from_str(json).expect("valid json");
        assert_eq!(submission.get("name"), Some(&FieldValue::Text("Yoga".into())));
        assert_eq!(submission.get("price"), Some(&FieldValue::Int(10)));
        assert_eq!(
            submission.get("big"),
            Some(&FieldValue::Float(18446744073709551615.0))
        );
        assert_eq!(submission.get("fee"), Some(&FieldValue::Float(2.5)));
        assert_eq!(submission.get("kids"), Some(&FieldValue::Bool(true)));
        assert_eq!(submission.get("description"), Some(&FieldValue::Null));
        assert_eq!(submission.get("tags"), Some(&FieldValue::Sequence(2)));
        assert_eq!(submission.get("meta"), Some(&FieldValue::Mapping(0)));
        assert_eq!(submission.len(), 8);
    }

    #[test]
    fn non_object_payload_does_not_deserialize() {
        assert!(serde_json::from_str::<EventSubmission>("[1, 2]").is_err());
        assert!(serde_json::from_str::<EventSubmission>("\"name\"").is_err());
    }

    #[test]
    fn truthiness() {
        assert!(!FieldValue::Null.is_truthy());
        assert!(!FieldValue::Bool(false).is_truthy());
        assert!(!FieldValue::Int(0).is_truthy());
        assert!(!FieldValue::Float(0.0).is_truthy());
        assert!(!FieldValue::Text(String::new()).is_truthy());
        assert!(!FieldValue::Sequence(0).is_truthy());
        assert!(FieldValue::Text(" ".into()).is_truthy());
        assert!(FieldValue::Int(-1).is_truthy());
        assert!(FieldValue::Mapping(1).is_truthy());
    }

    #[test]
    fn required_fields_empty_map() {
        assert!(!has_required_fields(&EventSubmission::new()));
        assert_eq!(missing_required_field(&EventSubmission::new()), Some("name"));
    }

    #[test]
    fn required_fields_all_present() {
        assert!(has_required_fields(&complete()));
    }

    #[test]
    fn required_fields_each_missing_or_falsy() {
        for key in REQUIRED_FIELDS {
            let blank = complete().with(key, "");
            assert_eq!(missing_required_field(&blank), Some(key));

            let null = complete().with(key, FieldValue::Null);
            assert!(!has_required_fields(&null), "{key} = null should fail");

            let removed: EventSubmission = complete()
                .fields
                .into_iter()
                .filter(|(k, _)| k != key)
                .collect();
            assert!(!has_required_fields(&removed), "{key} removed should fail");
        }
    }

    #[test]
    fn required_fields_ignore_optional_and_extra_keys() {
        let extended = complete()
            .with("description", "")
            .with("price", FieldValue::Null)
            .with("unexpected", "value")
            .with("kids", false);
        assert!(has_required_fields(&extended));
        assert!(!has_required_fields(
            &EventSubmission::new().with("unexpected", "value")
        ));
    }

    #[test]
    fn complete_submission_passes() {
        assert_eq!(verdict(&complete()), Ok(()));
        let full = complete()
            .with("description", "Bring a mat")
            .with("price", "15")
            .with("kids", true);
        assert_eq!(verdict(&full), Ok(()));
    }

    #[test]
    fn absent_optional_fields_are_skipped() {
        let submission = EventSubmission::new().with("name", "Only a name");
        assert!(validate_submission(
            &submission,
            &SanitizedFields::from_submission(&submission),
            &FieldLimits::default()
        ));
    }

    #[test]
    fn falsy_values_are_not_validated() {
        // Falsy values count as absent, whatever their type.
        let submission = complete()
            .with("kids", false)
            .with("price", 0i64)
            .with("description", "");
        assert_eq!(verdict(&submission), Ok(()));
    }

    #[test]
    fn reports_first_failing_field_in_order() {
        let submission = complete()
            .with("time", "25:00")
            .with("date", "2020-01-01")
            .with("email", "nope");
        assert_eq!(verdict(&submission), Err(Rejection { field: "time" }));

        let submission = complete().with("date", "2020-01-01").with("email", "nope");
        assert_eq!(verdict(&submission), Err(Rejection { field: "date" }));

        let cases: [(&str, FieldValue); 6] = [
            ("price", "-5".into()),
            ("link", "file://example.com".into()),
            ("kids", 1i64.into()),
            ("email", "user..name@example.com".into()),
            ("time", FieldValue::Int(900)),
            ("date", FieldValue::Sequence(3)),
        ];
        for (field, value) in cases {
            let submission = complete().with(field, value);
            assert_eq!(verdict(&submission), Err(Rejection { field }));
        }
    }

    #[test]
    fn bounded_strings_use_sanitized_length() {
        let limits = FieldLimits::default();
        let ok = complete().with("organization", "a".repeat(limits.organization));
        assert_eq!(verdict(&ok), Ok(()));

        let long = complete().with("organization", "a".repeat(limits.organization + 1));
        assert_eq!(verdict(&long), Err(Rejection { field: "organization" }));

        // 100 ampersands become 500 characters once escaped.
        let escaped = complete().with("location", "&".repeat(100));
        assert_eq!(verdict(&escaped), Err(Rejection { field: "location" }));

        let blank = complete().with("description", "   ");
        assert_eq!(verdict(&blank), Err(Rejection { field: "description" }));
    }

    #[test]
    fn non_text_free_text_field_is_rejected() {
        let submission = complete().with("name", 42i64);
        assert_eq!(verdict(&submission), Err(Rejection { field: "name" }));
    }

    #[test]
    fn text_emptied_by_sanitizing_is_skipped() {
        let submission = complete().with("description", "<script>x()</script>");
        let sanitized = SanitizedFields::from_submission(&submission);
        assert_eq!(
            sanitized.description.as_ref().map(SanitizedText::as_str),
            Some("")
        );
        assert_eq!(verdict(&submission), Ok(()));
    }

    #[test]
    fn sanitized_fields_only_cover_text() {
        let submission = EventSubmission::new()
            .with("name", "<b>Fair</b>")
            .with("organization", 7i64)
            .with("location", "");
        let sanitized = SanitizedFields::from_submission(&submission);
        assert_eq!(
            sanitized.name.as_ref().map(SanitizedText::as_str),
            Some("&lt;b&gt;Fair&lt;/b&gt;")
        );
        assert_eq!(sanitized.organization, None);
        assert_eq!(sanitized.location, None);
        assert_eq!(sanitized.description, None);
    }

    #[test]
    fn as_number_readings() {
        assert_eq!(FieldValue::from("  12 ").as_number(), Some(12.0));
        assert_eq!(FieldValue::Int(3).as_number(), Some(3.0));
        assert_eq!(FieldValue::Bool(true).as_number(), None);
    }
}
