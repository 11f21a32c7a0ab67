//! Masail — Document bounded context.
//!
//! Responsible for the event-sourced lifecycle of Bahtsul Masail documents:
//! the `Document` aggregate and its events, the command handler that
//! replays, validates, appends and projects, and the denormalized read model
//! kept alongside the event log.

pub mod application;
pub mod domain;
pub mod read_model;
