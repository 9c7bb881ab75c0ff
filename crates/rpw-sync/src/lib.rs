//! rpw-sync
//!
//! Ledger-to-store reconciliation.
//!
//! - Local store is converged to the remote ledger with create-or-update
//!   writes keyed on natural keys; re-running a sync changes nothing.
//! - Holders are aggregated per address before writing.
//! - Orders are diffed by transaction hash; nothing is deleted.
//! - Incremental runs scan only the blocks after the checkpoint, and the
//!   checkpoint only advances after every touched asset is written.
//!
//! All I/O goes through the `LocalStore` and `LedgerSource` traits.

pub mod checkpoint;
pub mod engine;
pub mod holdings;
pub mod normalizer;
pub mod orders;
pub mod report;
pub mod scanner;
pub mod upsert;

pub use checkpoint::{Advance, CheckpointError, CheckpointStore};
pub use engine::SyncEngine;
pub use report::{SyncMode, SyncReport, TableCounts};
pub use upsert::UpsertOutcome;
