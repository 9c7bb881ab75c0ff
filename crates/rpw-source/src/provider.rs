//! Ledger source boundary.
//!
//! Defines only the source trait and its error type. The HTTP adapter lives
//! in `xchain.rs`; in-memory fakes live in `rpw-testkit`.

use std::collections::BTreeSet;
use std::fmt;

use async_trait::async_trait;
use rpw_schemas::{BlockNumber, OrderSides, Record};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors a [`LedgerSource`] may return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// Network failure or timeout, after retries.
    Transport(String),
    /// Non-success HTTP status, after retries for 5xx.
    Http { status: u16, url: String },
    /// The upstream does not know the requested object.
    NotFound(String),
    /// A response payload could not be decoded into the expected shape.
    MalformedResponse(String),
}

impl SourceError {
    /// Per-record failures the engine may log and skip.
    pub fn is_contained(&self) -> bool {
        matches!(self, SourceError::MalformedResponse(_) | SourceError::NotFound(_))
    }
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceError::Transport(msg) => write!(f, "transport error: {msg}"),
            SourceError::Http { status, url } => write!(f, "http status {status} from {url}"),
            SourceError::NotFound(what) => write!(f, "not found upstream: {what}"),
            SourceError::MalformedResponse(msg) => write!(f, "malformed response: {msg}"),
        }
    }
}

impl std::error::Error for SourceError {}

// ---------------------------------------------------------------------------
// Source trait
// ---------------------------------------------------------------------------

/// Read-only view of the remote ledger.
///
/// Calls are awaited one at a time by the engine; implementations need not
/// support overlapping requests.
#[async_trait]
pub trait LedgerSource: Send + Sync {
    /// Short identifier used in logs (e.g. `"xchain"`).
    fn source_name(&self) -> &'static str;

    /// Current chain height.
    async fn current_block(&self) -> Result<BlockNumber, SourceError>;

    /// Asset metadata object.
    async fn asset_details(&self, asset: &str) -> Result<Record, SourceError>;

    /// Complete holder/transfer list; one address may appear many times.
    async fn holdings(&self, asset: &str) -> Result<Vec<Record>, SourceError>;

    async fn dispensers(&self, asset: &str) -> Result<Vec<Record>, SourceError>;

    /// Orders split by whether `asset` is the given or the requested leg.
    async fn orders(&self, asset: &str) -> Result<OrderSides<Record>, SourceError>;

    /// Asset names referenced by any message in `block`.
    async fn assets_in_block(&self, block: BlockNumber) -> Result<BTreeSet<String>, SourceError>;
}
