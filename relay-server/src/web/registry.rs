//! Path to secret lookup table.
//!
//! Built once at startup, then shared read-only behind an `Arc` by every
//! request handler.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use crate::error::ConfigError;
use crate::web::signature::SignatureVerifier;

#[derive(Debug, Default)]
pub struct SecretRegistry {
    verifiers: HashMap<String, Arc<SignatureVerifier>>,
}

impl SecretRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from `(path, secret)` pairs.
    ///
    /// An empty table or a path given twice is a configuration error.
    pub fn from_secrets<I, P, S>(secrets: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (P, S)>,
        P: AsRef<str>,
        S: Into<Vec<u8>>,
    {
        let mut registry = Self::new();
        for (path, secret) in secrets {
            registry.register(path.as_ref(), secret)?;
        }

        if registry.is_empty() {
            return Err(ConfigError::Missing("SECRETS"));
        }
        Ok(registry)
    }

    /// Register `secret` under the normalized form of `path`.
    pub fn register(&mut self, path: &str, secret: impl Into<Vec<u8>>) -> Result<(), ConfigError> {
        let path = normalize_path(path);
        if self.verifiers.contains_key(&path) {
            return Err(ConfigError::DuplicatePath(path));
        }

        info!(path = %path, "secret_registered");
        self.verifiers
            .insert(path, Arc::new(SignatureVerifier::new(secret)));
        Ok(())
    }

    /// Exact match on the request path. No prefix or wildcard matching.
    pub fn lookup(&self, path: &str) -> Option<Arc<SignatureVerifier>> {
        self.verifiers.get(path).cloned()
    }

    pub fn len(&self) -> usize {
        self.verifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.verifiers.is_empty()
    }
}

/// Normalize a configured path name to `/<name>/`.
pub fn normalize_path(path: &str) -> String {
    format!("/{}/", path.trim().trim_matches('/'))
}
