//! Projection database schema.

/// SQL to create the projection tables, their indexes and the checkpoint
/// table.
pub const CREATE_PROJECTION_TABLES: &str = r"
CREATE TABLE IF NOT EXISTS document_projection (
    id                    UUID PRIMARY KEY,
    title                 VARCHAR(255) NOT NULL,
    question              TEXT NOT NULL,
    answer                TEXT NOT NULL,
    prolog                TEXT,
    mushoheh              TEXT,
    source_document       VARCHAR(255),
    historical_context    TEXT,
    geographical_context  VARCHAR(255),
    publication_date      TIMESTAMPTZ,
    is_deleted            BOOLEAN NOT NULL DEFAULT FALSE,
    version               BIGINT NOT NULL,
    last_sequence         BIGINT NOT NULL,
    created_at            TIMESTAMPTZ NOT NULL,
    updated_at            TIMESTAMPTZ NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_document_projection_created_at
    ON document_projection (created_at) WHERE NOT is_deleted;

CREATE INDEX IF NOT EXISTS idx_document_projection_updated_at
    ON document_projection (updated_at) WHERE NOT is_deleted;

CREATE TABLE IF NOT EXISTS document_projection_madhabs (
    document_id  UUID NOT NULL REFERENCES document_projection (id) ON DELETE CASCADE,
    madhab_id    UUID NOT NULL,
    position     BIGINT NOT NULL,
    PRIMARY KEY (document_id, madhab_id)
);

CREATE INDEX IF NOT EXISTS idx_document_projection_madhabs_madhab_id
    ON document_projection_madhabs (madhab_id);

CREATE TABLE IF NOT EXISTS document_projection_categories (
    document_id  UUID NOT NULL REFERENCES document_projection (id) ON DELETE CASCADE,
    category_id  UUID NOT NULL,
    position     BIGINT NOT NULL,
    PRIMARY KEY (document_id, category_id)
);

CREATE INDEX IF NOT EXISTS idx_document_projection_categories_category_id
    ON document_projection_categories (category_id);

CREATE TABLE IF NOT EXISTS projection_checkpoints (
    name      TEXT PRIMARY KEY,
    position  BIGINT NOT NULL
);
";

/// Checkpoint row used by document projection reconciliation.
pub const DOCUMENT_PROJECTION_CHECKPOINT: &str = "document_projection";
