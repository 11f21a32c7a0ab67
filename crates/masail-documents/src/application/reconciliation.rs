//! Projection reconciliation.
//!
//! Walks the event log forward from just behind the projection's checkpoint
//! and rebuilds every row that is behind the events it has seen. This
//! repairs rows left stale by a failed projection write after a committed
//! append.

use std::collections::HashMap;

use masail_core::aggregate::AggregateRoot;
use masail_core::error::DomainError;
use masail_core::repository::EventRepository;
use serde::Serialize;
use tracing::{info, instrument};
use uuid::Uuid;

use super::command_handlers::reconstitute;
use crate::domain::aggregates::Document;
use crate::read_model::{DocumentProjectionStore, DocumentRow};

/// Sequences behind the saved checkpoint that every pass reads again.
///
/// Concurrent appends can become visible out of sequence order, so an event
/// may appear below a checkpoint that already passed its position.
pub const RESCAN_WINDOW: i64 = 1_000;

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconciliationReport {
    /// Events past the previous checkpoint read during the pass.
    pub scanned_events: usize,
    /// Events inside the trailing window read again during the pass.
    pub rescanned_events: usize,
    /// Documents whose rows were rebuilt, in the order they were repaired.
    pub repaired: Vec<Uuid>,
    /// Checkpoint saved at the end of the pass.
    pub checkpoint: i64,
}

/// Rebuilds the projection row of `document_id` by full replay and writes it.
///
/// Returns `None` when the log holds no events for the document.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` if the log or the projection store
/// fails, or the stream is corrupt.
pub async fn rebuild_document_row(
    events: &dyn EventRepository,
    projection: &dyn DocumentProjectionStore,
    document_id: Uuid,
) -> Result<Option<DocumentRow>, DomainError> {
    let stored = events.load_events(document_id).await?;
    let Some(last) = stored.last() else {
        return Ok(None);
    };
    let document = reconstitute(document_id, &stored)?;
    let row = DocumentRow::from_aggregate(&document, last.sequence);
    projection.upsert(&row).await?;
    Ok(Some(row))
}

/// Brings the projection up to date with the log.
///
/// Reads events in batches of `batch_size`, starting `RESCAN_WINDOW`
/// sequences behind the saved checkpoint. A document whose row is missing or
/// older than an event it has is rebuilt from its full stream. The
/// checkpoint is saved after every batch that moves it forward.
///
/// An event that stays invisible for longer than `RESCAN_WINDOW` sequences
/// is only repaired by the next write to its document.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` if the log or the projection store
/// fails. Batches completed before the failure keep their checkpoint.
#[instrument(skip(events, projection))]
pub async fn reconcile_projection(
    events: &dyn EventRepository,
    projection: &dyn DocumentProjectionStore,
    batch_size: usize,
) -> Result<ReconciliationReport, DomainError> {
    let batch_size = batch_size.max(1);
    let previous = projection.checkpoint().await?;
    let mut report = ReconciliationReport {
        checkpoint: previous,
        ..ReconciliationReport::default()
    };
    // Highest version each document's row is known to cover.
    let mut verified: HashMap<Uuid, i64> = HashMap::new();
    let mut position = previous.saturating_sub(RESCAN_WINDOW).max(0);

    loop {
        let batch = events.events_after_sequence(position, batch_size).await?;
        let Some(last) = batch.last() else {
            break;
        };
        let last_sequence = last.sequence;

        for stored in &batch {
            if stored.sequence <= previous {
                report.rescanned_events += 1;
            } else {
                report.scanned_events += 1;
            }
            if stored.aggregate_type != Document::AGGREGATE_TYPE
                || verified
                    .get(&stored.aggregate_id)
                    .is_some_and(|version| *version >= stored.version)
            {
                continue;
            }
            let covered = projection
                .find(stored.aggregate_id)
                .await?
                .map(|row| row.version)
                .filter(|version| *version >= stored.version);
            let version = match covered {
                Some(version) => version,
                None => {
                    let rebuilt =
                        rebuild_document_row(events, projection, stored.aggregate_id).await?;
                    if !report.repaired.contains(&stored.aggregate_id) {
                        report.repaired.push(stored.aggregate_id);
                    }
                    rebuilt.map_or(stored.version, |row| row.version)
                }
            };
            verified.insert(stored.aggregate_id, version);
        }

        position = last_sequence;
        if last_sequence > report.checkpoint {
            projection.save_checkpoint(last_sequence).await?;
            report.checkpoint = last_sequence;
        }
        if batch.len() < batch_size {
            break;
        }
    }

    info!(
        scanned_events = report.scanned_events,
        rescanned_events = report.rescanned_events,
        repaired = report.repaired.len(),
        checkpoint = report.checkpoint,
        "projection reconciled"
    );
    Ok(report)
}
