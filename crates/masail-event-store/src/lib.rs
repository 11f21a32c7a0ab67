//! Masail Event Store — append-only event log implementations.
//!
//! Both implementations enforce the same contract: per-aggregate versions
//! are contiguous from 1, appends are compare-and-append on the expected
//! version, and every stored event receives a global sequence number.

pub mod memory_event_repository;
pub mod pg_event_repository;
pub mod schema;

pub use memory_event_repository::InMemoryEventRepository;
pub use pg_event_repository::PgEventRepository;
