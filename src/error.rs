use thiserror::Error;

/// Error returned by a single RouterOS session.
///
/// A `SwitchError` always scopes to one switch for one cycle — it never
/// propagates to other switches or aborts the poll orchestrator (spec §7).
#[derive(Debug, Error)]
pub enum SwitchError {
    #[error("connect to {host}:{port} timed out")]
    ConnectTimeout { host: String, port: u16 },

    #[error("connect to {host}:{port} failed: {source}")]
    Connect {
        host: String,
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("login to {host} rejected: {0}")]
    LoginRejected(String, #[source] std::io::Error),

    #[error("query {path} timed out")]
    QueryTimeout { path: String },

    #[error("query {path} failed: {source}")]
    Query {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed sentence from switch: {0}")]
    Protocol(String),
}

/// Error returned while loading YAML inventory files.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Crate-level error, used by the binary entrypoint and the HTTP API.
#[derive(Debug, Error)]
pub enum NlnsError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Switch(#[from] SwitchError),

    #[error("bind address {0} is invalid: {1}")]
    InvalidBindAddr(String, #[source] std::net::AddrParseError),
}
