//! Configuration module for environment variable parsing.
//!
//! Everything is read once at startup. Request handling only ever sees the
//! finished [`Config`].

use std::env;
use std::fmt;
use std::str::FromStr;

use tracing::warn;
use url::Url;

use crate::error::ConfigError;

/// One `path,secret` pair from the secret table.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretEntry {
    pub path: String,
    pub secret: String,
}

impl fmt::Debug for SecretEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretEntry")
            .field("path", &self.path)
            .field("secret", &"<REDACTED>")
            .finish()
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port for the web server to listen on
    pub port: u16,

    /// Registered webhook paths and their shared secrets
    pub secrets: Vec<SecretEntry>,

    /// Downstream URL that accepted deliveries are relayed to
    pub forward_url: Option<Url>,

    /// Upper bound for handling one inbound request, body included
    pub request_timeout_ms: u64,

    /// Timeout for a single outbound forwarding attempt
    pub forward_timeout_ms: u64,

    /// Upper bound for the lifetime of one inbound connection
    pub connection_timeout_ms: u64,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// `SECRETS` is removed from the environment once it has been read.
    pub fn from_env() -> Result<Self, ConfigError> {
        let raw_secrets = env::var("SECRETS").map_err(|_| ConfigError::Missing("SECRETS"))?;
        env::remove_var("SECRETS");
        let secrets = parse_secret_table(&raw_secrets)?;

        let forward_url = match env::var("FORWARD") {
            Ok(raw) if !raw.trim().is_empty() => Some(parse_forward_url(&raw)?),
            _ => None,
        };

        Ok(Config {
            port: parse_or("PORT", 8080),
            secrets,
            forward_url,
            request_timeout_ms: parse_or("REQUEST_TIMEOUT_MS", 5000),
            forward_timeout_ms: parse_or("FORWARD_TIMEOUT_MS", 10_000),
            connection_timeout_ms: parse_or("CONNECTION_TIMEOUT_MS", 10_000),
        })
    }
}

/// Parse `path,secret,path,secret,...` into entries.
///
/// So `testa,A,testb,B` registers `/testa/` with secret `A` and `/testb/`
/// with secret `B`.
pub fn parse_secret_table(raw: &str) -> Result<Vec<SecretEntry>, ConfigError> {
    let tokens: Vec<&str> = raw.split(',').map(str::trim).collect();
    if tokens.len() % 2 != 0 {
        return Err(ConfigError::OddSecretTable(tokens.len()));
    }

    tokens
        .chunks_exact(2)
        .enumerate()
        .map(|(index, pair)| {
            let (path, secret) = (pair[0], pair[1]);
            if path.trim_matches('/').is_empty() {
                return Err(ConfigError::EmptySecretField { index, field: "path" });
            }
            if secret.is_empty() {
                return Err(ConfigError::EmptySecretField { index, field: "secret" });
            }
            Ok(SecretEntry {
                path: path.to_string(),
                secret: secret.to_string(),
            })
        })
        .collect()
}

/// Parse the forwarding target, which must be an absolute http(s) URL.
pub fn parse_forward_url(raw: &str) -> Result<Url, ConfigError> {
    let raw = raw.trim();
    let invalid = |reason: String| ConfigError::InvalidForwardUrl {
        url: raw.to_string(),
        reason,
    };

    let url = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(invalid(format!("unsupported scheme {other}"))),
    }
    if url.host_str().is_none() {
        return Err(invalid("missing host".to_string()));
    }
    Ok(url)
}

/// Parse a numeric variable, falling back to `default` when unset or invalid.
fn parse_or<T>(name: &str, default: T) -> T
where
    T: FromStr + Copy,
{
    match env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(env_var = name, value = %raw, "Invalid number, using default");
            default
        }),
        Err(_) => default,
    }
}
