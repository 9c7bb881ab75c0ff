//! rpw-testkit
//!
//! In-memory fakes for the two I/O seams of the sync engine:
//! [`MemoryStore`] for [`LocalStore`] and [`ScriptedSource`] for
//! [`LedgerSource`]. Used by scenario tests only.

mod memory_store;
mod scripted_source;

pub use memory_store::MemoryStore;
pub use scripted_source::{Endpoint, ScriptedSource};

use rpw_schemas::{FieldValue, Record};

/// Build a record from `(field, value)` pairs.
pub fn record<I, K, V>(pairs: I) -> Record
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<FieldValue>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

pub use rpw_db::LocalStore;
pub use rpw_source::LedgerSource;
