//! Runtime secret resolution.
//!
//! Config YAML stores only env var NAMES. [`resolve_secrets`] is called once
//! at startup and the result is passed into constructors. Error messages name
//! the variable, never its value, and `Debug` output is redacted.

use anyhow::{bail, Result};

use crate::SyncConfig;

#[derive(Clone)]
pub struct ResolvedSecrets {
    pub database_url: String,
}

impl std::fmt::Debug for ResolvedSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedSecrets")
            .field("database_url", &"<REDACTED>")
            .finish()
    }
}

/// Resolve a named environment variable; blank counts as unset.
fn resolve_env(var_name: &str) -> Option<String> {
    match std::env::var(var_name) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

pub fn resolve_secrets(cfg: &SyncConfig) -> Result<ResolvedSecrets> {
    let name = cfg.database.url_env.trim();
    if name.is_empty() {
        bail!("SECRETS_MISSING: database.url_env is empty");
    }
    let Some(database_url) = resolve_env(name) else {
        bail!(
            "SECRETS_MISSING: required env var '{}' (database url) is not set or empty",
            name
        );
    };
    Ok(ResolvedSecrets { database_url })
}
