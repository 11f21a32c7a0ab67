//! Commands for the Document context.

use chrono::{DateTime, Utc};
use masail_core::command::Command;
use masail_core::error::DomainError;
use serde::Deserialize;
use uuid::Uuid;

use super::fields::{
    DocumentPatch, MAX_SHORT_TEXT_LEN, MAX_TITLE_LEN, limit_len, non_blank, require_text,
};

/// Command to create a new document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateDocument {
    /// The correlation ID for tracing.
    #[serde(default = "Uuid::new_v4")]
    pub correlation_id: Uuid,
    /// Identifier of the document to create.
    #[serde(default = "Uuid::new_v4")]
    pub document_id: Uuid,
    /// Document title.
    pub title: String,
    /// The question put to the forum.
    pub question: String,
    /// The forum's answer.
    pub answer: String,
    /// Introductory text.
    #[serde(default)]
    pub prolog: Option<String>,
    /// Authenticating scholars.
    #[serde(default)]
    pub mushoheh: Option<String>,
    /// Source document reference.
    #[serde(default)]
    pub source_document: Option<String>,
    /// Historical context.
    #[serde(default)]
    pub historical_context: Option<String>,
    /// Geographical context.
    #[serde(default)]
    pub geographical_context: Option<String>,
    /// Publication date.
    #[serde(default)]
    pub publication_date: Option<DateTime<Utc>>,
    /// Initial madhab tags.
    #[serde(default)]
    pub madhab_ids: Vec<Uuid>,
    /// Initial category tags.
    #[serde(default)]
    pub category_ids: Vec<Uuid>,
}

impl Command for CreateDocument {
    fn command_type(&self) -> &'static str {
        "documents.create_document"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

impl CreateDocument {
    /// Checks required fields and length limits.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if a required field is blank or a
    /// field exceeds its length limit.
    pub fn validate(&self) -> Result<(), DomainError> {
        require_text("title", &self.title)?;
        limit_len("title", &self.title, MAX_TITLE_LEN)?;
        require_text("question", &self.question)?;
        require_text("answer", &self.answer)?;
        if let Some(source) = &self.source_document {
            limit_len("source_document", source, MAX_SHORT_TEXT_LEN)?;
        }
        if let Some(context) = &self.geographical_context {
            limit_len("geographical_context", context, MAX_SHORT_TEXT_LEN)?;
        }
        Ok(())
    }

    /// Returns a copy with blank optional texts dropped and tag lists
    /// de-duplicated in first-seen order.
    #[must_use]
    pub fn normalized(&self) -> Self {
        Self {
            prolog: non_blank(self.prolog.as_deref()),
            mushoheh: non_blank(self.mushoheh.as_deref()),
            source_document: non_blank(self.source_document.as_deref()),
            historical_context: non_blank(self.historical_context.as_deref()),
            geographical_context: non_blank(self.geographical_context.as_deref()),
            madhab_ids: dedup(&self.madhab_ids),
            category_ids: dedup(&self.category_ids),
            ..self.clone()
        }
    }
}

fn dedup(ids: &[Uuid]) -> Vec<Uuid> {
    let mut unique = Vec::with_capacity(ids.len());
    for id in ids {
        if !unique.contains(id) {
            unique.push(*id);
        }
    }
    unique
}

/// Command to change whitelisted document fields.
#[derive(Debug, Clone)]
pub struct UpdateDocument {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The document identifier.
    pub document_id: Uuid,
    /// Fields to change.
    pub changes: DocumentPatch,
}

impl Command for UpdateDocument {
    fn command_type(&self) -> &'static str {
        "documents.update_document"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to delete a document.
#[derive(Debug, Clone)]
pub struct DeleteDocument {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The document identifier.
    pub document_id: Uuid,
}

impl Command for DeleteDocument {
    fn command_type(&self) -> &'static str {
        "documents.delete_document"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to tag a document with a madhab.
#[derive(Debug, Clone)]
pub struct AddMadhab {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The document identifier.
    pub document_id: Uuid,
    /// The madhab identifier.
    pub madhab_id: Uuid,
}

impl Command for AddMadhab {
    fn command_type(&self) -> &'static str {
        "documents.add_madhab"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to remove a madhab tag from a document.
#[derive(Debug, Clone)]
pub struct RemoveMadhab {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The document identifier.
    pub document_id: Uuid,
    /// The madhab identifier.
    pub madhab_id: Uuid,
}

impl Command for RemoveMadhab {
    fn command_type(&self) -> &'static str {
        "documents.remove_madhab"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to tag a document with a category.
#[derive(Debug, Clone)]
pub struct AddCategory {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The document identifier.
    pub document_id: Uuid,
    /// The category identifier.
    pub category_id: Uuid,
}

impl Command for AddCategory {
    fn command_type(&self) -> &'static str {
        "documents.add_category"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to remove a category tag from a document.
#[derive(Debug, Clone)]
pub struct RemoveCategory {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The document identifier.
    pub document_id: Uuid,
    /// The category identifier.
    pub category_id: Uuid,
}

impl Command for RemoveCategory {
    fn command_type(&self) -> &'static str {
        "documents.remove_category"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_create() -> CreateDocument {
        CreateDocument {
            correlation_id: Uuid::new_v4(),
            document_id: Uuid::new_v4(),
            title: "Hukum Rokok".to_owned(),
            question: "Bagaimana hukum merokok?".to_owned(),
            answer: "Makruh.".to_owned(),
            ..CreateDocument::default()
        }
    }

    #[test]
    fn test_valid_create_passes() {
        assert!(valid_create().validate().is_ok());
    }

    #[test]
    fn test_blank_title_fails() {
        let command = CreateDocument {
            title: " ".to_owned(),
            ..valid_create()
        };

        match command.validate().unwrap_err() {
            DomainError::Validation(msg) => assert!(msg.contains("title")),
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[test]
    fn test_overlong_geographical_context_fails() {
        let command = CreateDocument {
            geographical_context: Some("g".repeat(MAX_SHORT_TEXT_LEN + 1)),
            ..valid_create()
        };

        assert!(matches!(command.validate(), Err(DomainError::Validation(_))));
    }

    #[test]
    fn test_normalized_dedups_tags_and_drops_blank_text() {
        let m1 = Uuid::new_v4();
        let m2 = Uuid::new_v4();
        let command = CreateDocument {
            prolog: Some(String::new()),
            madhab_ids: vec![m1, m2, m1],
            ..valid_create()
        };

        let normalized = command.normalized();

        assert_eq!(normalized.prolog, None);
        assert_eq!(normalized.madhab_ids, vec![m1, m2]);
        assert_eq!(normalized.title, command.title);
    }

    #[test]
    fn test_create_deserializes_with_generated_ids() {
        let command: CreateDocument = serde_json::from_value(serde_json::json!({
            "title": "T",
            "question": "Q",
            "answer": "A"
        }))
        .unwrap();

        assert!(!command.document_id.is_nil());
        assert!(command.madhab_ids.is_empty());
        assert_eq!(command.command_type(), "documents.create_document");
    }
}
