//! Persisted sync checkpoint.
//!
//! # Invariants
//!
//! - The file holds one line: the highest block fully synchronized, base 10.
//! - A missing file is seeded with the genesis block on first read.
//! - [`CheckpointStore::advance`] never lowers the stored value; only
//!   [`CheckpointStore::write`] (administrative override) can.
//! - Writes replace the file atomically (temp file + rename).

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use rpw_config::SyncConfig;
use rpw_schemas::BlockNumber;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckpointError {
    /// The file could not be read, created or replaced.
    StorageUnavailable { path: PathBuf, reason: String },
    /// The first line is not a base-10 block number.
    Malformed { path: PathBuf, content: String },
}

impl fmt::Display for CheckpointError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckpointError::StorageUnavailable { path, reason } => {
                write!(f, "checkpoint storage unavailable at {}: {reason}", path.display())
            }
            CheckpointError::Malformed { path, content } => {
                write!(f, "checkpoint at {} is not a block number: {content:?}", path.display())
            }
        }
    }
}

impl std::error::Error for CheckpointError {}

/// Result of [`CheckpointStore::advance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    Advanced { from: BlockNumber, to: BlockNumber },
    Unchanged(BlockNumber),
    /// The request was below the stored value; nothing was written.
    Refused {
        current: BlockNumber,
        requested: BlockNumber,
    },
}

#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
    genesis: BlockNumber,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>, genesis: BlockNumber) -> Self {
        Self {
            path: path.into(),
            genesis,
        }
    }

    pub fn from_config(cfg: &SyncConfig) -> Self {
        Self::new(cfg.paths.state_file.clone(), cfg.sync.genesis_block)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn unavailable(&self, err: io::Error) -> CheckpointError {
        CheckpointError::StorageUnavailable {
            path: self.path.clone(),
            reason: err.to_string(),
        }
    }

    pub fn read(&self) -> Result<BlockNumber, CheckpointError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                self.write(self.genesis)?;
                return Ok(self.genesis);
            }
            Err(e) => return Err(self.unavailable(e)),
        };

        let first = raw.lines().next().unwrap_or("").trim();
        first.parse::<BlockNumber>().map_err(|_| CheckpointError::Malformed {
            path: self.path.clone(),
            content: first.to_string(),
        })
    }

    /// Overwrite unconditionally.
    pub fn write(&self, block: BlockNumber) -> Result<(), CheckpointError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|e| self.unavailable(e))?;
        }

        let mut tmp_name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "checkpoint".into());
        tmp_name.push(".tmp");
        let tmp = self.path.with_file_name(tmp_name);

        fs::write(&tmp, format!("{block}\n")).map_err(|e| self.unavailable(e))?;
        fs::rename(&tmp, &self.path).map_err(|e| self.unavailable(e))?;
        Ok(())
    }

    /// Move forward to `block`; never backwards.
    pub fn advance(&self, block: BlockNumber) -> Result<Advance, CheckpointError> {
        let current = self.read()?;
        if block < current {
            return Ok(Advance::Refused {
                current,
                requested: block,
            });
        }
        if block == current {
            return Ok(Advance::Unchanged(current));
        }
        self.write(block)?;
        Ok(Advance::Advanced {
            from: current,
            to: block,
        })
    }
}
