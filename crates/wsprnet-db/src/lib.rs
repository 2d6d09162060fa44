//! Typed batched-insert client over the columnar analytics database. The
//! database engine itself is an external collaborator; this crate only
//! implements the narrow interface the three services need:
//! `insert_batch`, `query`, `exec`, `ensure_schema`, `ensure_read_only_user`.

pub mod client;
pub mod error;
pub mod retry;

pub use client::{Database, DbConfig, BATCH_CHUNK_DEFAULT};
pub use error::DbError;
