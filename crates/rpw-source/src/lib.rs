//! rpw-source
//!
//! Remote ledger access. This crate owns the source abstraction and the
//! concrete HTTP adapter. It does **not** write anywhere; the sync engine
//! fetches records and hands them to the local store.

pub mod provider;
pub mod xchain;

pub use provider::{LedgerSource, SourceError};
pub use xchain::XChainSource;
