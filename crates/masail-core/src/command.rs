//! Command contract shared by the document handlers.

use uuid::Uuid;

/// A request to change one aggregate, such as creating a document or
/// tagging it with a madhab.
///
/// Handlers record `command_type` in the stored event's metadata and copy
/// `correlation_id` onto the event, so every log entry traces back to the
/// request that caused it.
pub trait Command: Send + Sync + std::fmt::Debug {
    /// Dotted name such as `documents.add_madhab`.
    fn command_type(&self) -> &'static str;

    /// Identifier shared by the request, its event and its log lines.
    fn correlation_id(&self) -> Uuid;
}
