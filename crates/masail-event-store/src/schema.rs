//! Event store database schema.

/// SQL to create the event log table, its indexes, and the trigger that
/// rejects any update or delete of stored events.
pub const CREATE_EVENT_STORE_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS event_store (
    sequence        BIGINT GENERATED ALWAYS AS IDENTITY PRIMARY KEY,
    event_id        UUID NOT NULL UNIQUE,
    aggregate_id    UUID NOT NULL,
    aggregate_type  VARCHAR(50) NOT NULL,
    event_type      VARCHAR(50) NOT NULL,
    version         BIGINT NOT NULL CHECK (version >= 1),
    payload         JSONB NOT NULL,
    metadata        JSONB,
    correlation_id  UUID NOT NULL,
    causation_id    UUID NOT NULL,
    occurred_at     TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    CONSTRAINT event_store_aggregate_version_unique UNIQUE (aggregate_id, version)
);

CREATE INDEX IF NOT EXISTS idx_event_store_event_type_occurred_at
    ON event_store (event_type, occurred_at);

CREATE INDEX IF NOT EXISTS idx_event_store_correlation_id
    ON event_store (correlation_id);

CREATE OR REPLACE FUNCTION event_store_reject_mutation() RETURNS trigger AS $$
BEGIN
    RAISE EXCEPTION 'event_store is append-only';
END;
$$ LANGUAGE plpgsql;

DROP TRIGGER IF EXISTS event_store_append_only ON event_store;
CREATE TRIGGER event_store_append_only
    BEFORE UPDATE OR DELETE ON event_store
    FOR EACH ROW EXECUTE FUNCTION event_store_reject_mutation();
";

/// Name of the unique constraint that arbitrates concurrent appends.
pub const AGGREGATE_VERSION_CONSTRAINT: &str = "event_store_aggregate_version_unique";
