// src/lib.rs
// Public library surface for the runner binary and integration tests.

pub mod analyze;
pub mod config;
pub mod destination;
pub mod ingest;
pub mod schema;
pub mod state;

// ---- Re-exports for stable public API ----
pub use crate::config::Configuration;
pub use crate::ingest::types::{Article, Operation};
pub use crate::ingest::{Connector, OperationStream};
pub use crate::schema::schema;
pub use crate::state::SyncState;

/// Host entry point: one run from `state`, as a stream of upserts and checkpoints.
/// The stream owns its clients; drop it to abandon the run.
pub fn update(
    configuration: &Configuration,
    state: SyncState,
) -> anyhow::Result<OperationStream<'static>> {
    Ok(Connector::from_config(configuration)?.into_update(state))
}
