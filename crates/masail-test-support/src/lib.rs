//! Shared test doubles for the Masail document archive.

mod clock;
mod notification;
mod repository;

pub use clock::FixedClock;
pub use notification::{FailingNotificationHook, RecordingNotificationHook};
pub use repository::{ConflictingEventRepository, FailingEventRepository};
