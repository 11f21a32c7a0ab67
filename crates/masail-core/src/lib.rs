//! Masail Core — shared event-sourcing abstractions.
//!
//! This crate defines the traits and record types that the event log,
//! the document context, and the read model agree on. It contains no
//! infrastructure code.

pub mod aggregate;
pub mod clock;
pub mod command;
pub mod error;
pub mod event;
pub mod notification;
pub mod repository;
