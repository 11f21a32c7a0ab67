//! Document field whitelist and field-level validation.

use chrono::{DateTime, Utc};
use masail_core::error::DomainError;
use serde::{Deserialize, Deserializer, Serialize};

/// Maximum length, in characters, of `title`.
pub const MAX_TITLE_LEN: usize = 255;
/// Maximum length, in characters, of `source_document` and
/// `geographical_context`.
pub const MAX_SHORT_TEXT_LEN: usize = 255;

/// Distinguishes an explicit `null` (`Some(None)`) from an absent key
/// (`None`) for clearable fields.
fn deserialize_present<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// The fields an update may touch. Anything else is rejected when the patch
/// is deserialized.
///
/// Required fields are `Option<String>`: absent means unchanged, and they
/// cannot be cleared. Optional fields are `Option<Option<_>>`: absent means
/// unchanged, `null` clears.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DocumentPatch {
    /// New title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// New question text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
    /// New answer text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    /// New prolog, or `Some(None)` to clear it.
    #[serde(
        default,
        deserialize_with = "deserialize_present",
        skip_serializing_if = "Option::is_none"
    )]
    pub prolog: Option<Option<String>>,
    /// New mushoheh (authenticating scholars), or `Some(None)` to clear it.
    #[serde(
        default,
        deserialize_with = "deserialize_present",
        skip_serializing_if = "Option::is_none"
    )]
    pub mushoheh: Option<Option<String>>,
    /// New source document reference, or `Some(None)` to clear it.
    #[serde(
        default,
        deserialize_with = "deserialize_present",
        skip_serializing_if = "Option::is_none"
    )]
    pub source_document: Option<Option<String>>,
    /// New historical context, or `Some(None)` to clear it.
    #[serde(
        default,
        deserialize_with = "deserialize_present",
        skip_serializing_if = "Option::is_none"
    )]
    pub historical_context: Option<Option<String>>,
    /// New geographical context, or `Some(None)` to clear it.
    #[serde(
        default,
        deserialize_with = "deserialize_present",
        skip_serializing_if = "Option::is_none"
    )]
    pub geographical_context: Option<Option<String>>,
    /// New publication date, or `Some(None)` to clear it.
    #[serde(
        default,
        deserialize_with = "deserialize_present",
        skip_serializing_if = "Option::is_none"
    )]
    pub publication_date: Option<Option<DateTime<Utc>>>,
}

impl DocumentPatch {
    /// Names of the fields this patch changes, in declaration order.
    #[must_use]
    pub fn changed_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.title.is_some() {
            fields.push("title");
        }
        if self.question.is_some() {
            fields.push("question");
        }
        if self.answer.is_some() {
            fields.push("answer");
        }
        if self.prolog.is_some() {
            fields.push("prolog");
        }
        if self.mushoheh.is_some() {
            fields.push("mushoheh");
        }
        if self.source_document.is_some() {
            fields.push("source_document");
        }
        if self.historical_context.is_some() {
            fields.push("historical_context");
        }
        if self.geographical_context.is_some() {
            fields.push("geographical_context");
        }
        if self.publication_date.is_some() {
            fields.push("publication_date");
        }
        fields
    }

    /// Returns `true` when the patch changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changed_fields().is_empty()
    }

    /// Validates the patch.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the patch is empty, a required
    /// field is blank, or a field exceeds its length limit.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.is_empty() {
            return Err(DomainError::Validation(
                "update must change at least one field".into(),
            ));
        }
        if let Some(title) = &self.title {
            require_text("title", title)?;
            limit_len("title", title, MAX_TITLE_LEN)?;
        }
        if let Some(question) = &self.question {
            require_text("question", question)?;
        }
        if let Some(answer) = &self.answer {
            require_text("answer", answer)?;
        }
        if let Some(Some(source)) = &self.source_document {
            limit_len("source_document", source, MAX_SHORT_TEXT_LEN)?;
        }
        if let Some(Some(context)) = &self.geographical_context {
            limit_len("geographical_context", context, MAX_SHORT_TEXT_LEN)?;
        }
        Ok(())
    }

    /// Returns a copy with blank optional texts turned into explicit clears.
    #[must_use]
    pub fn normalized(&self) -> Self {
        let clear_blank = |value: &Option<Option<String>>| {
            value.as_ref().map(|inner| non_blank(inner.as_deref()))
        };
        Self {
            title: self.title.clone(),
            question: self.question.clone(),
            answer: self.answer.clone(),
            prolog: clear_blank(&self.prolog),
            mushoheh: clear_blank(&self.mushoheh),
            source_document: clear_blank(&self.source_document),
            historical_context: clear_blank(&self.historical_context),
            geographical_context: clear_blank(&self.geographical_context),
            publication_date: self.publication_date,
        }
    }
}

/// Fails when `value` is empty or whitespace only.
pub(crate) fn require_text(field: &str, value: &str) -> Result<(), DomainError> {
    if value.trim().is_empty() {
        return Err(DomainError::Validation(format!("{field} must not be blank")));
    }
    Ok(())
}

/// Fails when `value` is longer than `max` characters.
pub(crate) fn limit_len(field: &str, value: &str, max: usize) -> Result<(), DomainError> {
    if value.chars().count() > max {
        return Err(DomainError::Validation(format!(
            "{field} must be at most {max} characters"
        )));
    }
    Ok(())
}

/// Maps blank optional text to `None`.
pub(crate) fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .filter(|text| !text.trim().is_empty())
        .map(ToOwned::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_null_and_value_are_distinguished() {
        let patch: DocumentPatch = serde_json::from_value(serde_json::json!({
            "title": "B",
            "prolog": null,
            "mushoheh": "KH. Ahmad"
        }))
        .unwrap();

        assert_eq!(patch.title.as_deref(), Some("B"));
        assert_eq!(patch.prolog, Some(None));
        assert_eq!(patch.mushoheh, Some(Some("KH. Ahmad".to_owned())));
        assert_eq!(patch.source_document, None);
        assert_eq!(patch.changed_fields(), vec!["title", "prolog", "mushoheh"]);
    }

    #[test]
    fn test_serialization_keeps_only_present_fields() {
        let patch = DocumentPatch {
            title: Some("B".to_owned()),
            prolog: Some(None),
            ..DocumentPatch::default()
        };

        let value = serde_json::to_value(&patch).unwrap();

        assert_eq!(value, serde_json::json!({ "title": "B", "prolog": null }));
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        let result = serde_json::from_value::<DocumentPatch>(serde_json::json!({
            "is_deleted": true
        }));

        assert!(result.is_err());
    }

    #[test]
    fn test_empty_patch_fails_validation() {
        let result = DocumentPatch::default().validate();

        match result {
            Err(DomainError::Validation(msg)) => assert!(msg.contains("at least one field")),
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[test]
    fn test_blank_required_field_fails_validation() {
        let patch = DocumentPatch {
            answer: Some("   ".to_owned()),
            ..DocumentPatch::default()
        };

        match patch.validate() {
            Err(DomainError::Validation(msg)) => assert!(msg.contains("answer")),
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[test]
    fn test_overlong_title_fails_validation() {
        let patch = DocumentPatch {
            title: Some("x".repeat(MAX_TITLE_LEN + 1)),
            ..DocumentPatch::default()
        };

        assert!(matches!(patch.validate(), Err(DomainError::Validation(_))));
    }

    #[test]
    fn test_normalized_turns_blank_optional_text_into_clear() {
        let patch = DocumentPatch {
            prolog: Some(Some("  ".to_owned())),
            historical_context: Some(Some("Muktamar NU 1926".to_owned())),
            ..DocumentPatch::default()
        };

        let normalized = patch.normalized();

        assert_eq!(normalized.prolog, Some(None));
        assert_eq!(
            normalized.historical_context,
            Some(Some("Muktamar NU 1926".to_owned()))
        );
    }
}
