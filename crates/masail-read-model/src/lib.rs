//! Masail Read Model — PostgreSQL storage for the document projection.
//!
//! Implements `DocumentProjectionStore` over three tables: the projected
//! rows, and one association table each for madhab and category tags.

pub mod pg_document_projection;
pub mod schema;

pub use pg_document_projection::PgDocumentProjection;
