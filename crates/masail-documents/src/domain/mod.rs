//! Domain layer: aggregate, commands, events and the update whitelist.

pub mod aggregates;
pub mod commands;
pub mod events;
pub mod fields;
