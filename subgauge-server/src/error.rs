//! Error types for the assembly pipeline.

use std::path::PathBuf;

use subgauge_core::UpstreamError;
use thiserror::Error;

/// Per-request pipeline failure.
///
/// Both variants abort the whole assembly; nothing is cached for the
/// failed call. Annotation failures are not represented here because
/// they are recovered inside the assembler.
#[derive(Debug, Error)]
pub enum ServeError {
    /// Unknown route key or missing/unreadable backing file. Maps to 404.
    #[error("route or subscription not found")]
    NotFound,

    /// Vendor usage fetch failed. Maps to 500, never retried.
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

/// Startup configuration failure. Fatal: the process refuses to start.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// Offending path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid YAML for the expected shape.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// The providers section is missing or empty.
    #[error("providers section is required")]
    NoProviders,

    /// A provider tag has no entries.
    #[error("at least one entry is required for provider {0}")]
    EmptyProvider(String),

    /// No client is registered for a configured tag.
    #[error("unknown provider tag: {0}")]
    UnknownProvider(String),

    /// A required entry field is missing.
    #[error("{field} is required for provider {tag}, route_prefix {prefix}")]
    MissingField {
        /// Name of the missing field.
        field: &'static str,
        /// Provider tag of the entry.
        tag: String,
        /// Route prefix of the entry.
        prefix: String,
    },

    /// An override that must be positive was set to zero.
    #[error("{field} cannot be 0 for provider {tag}, route_prefix {prefix}")]
    ZeroInterval {
        /// Name of the zero-valued field.
        field: &'static str,
        /// Provider tag of the entry.
        tag: String,
        /// Route prefix of the entry.
        prefix: String,
    },

    /// Two entries resolve to the same route key.
    #[error("duplicate route key: {0}")]
    DuplicateRoute(String),
}

/// Annotation failure. Recovered by the assembler: logged at warn and
/// the original document is served instead.
#[derive(Debug, Error)]
pub enum AnnotateError {
    /// The document is not parseable YAML.
    #[error("failed to parse document: {0}")]
    Parse(#[source] serde_yaml::Error),

    /// The document has no usable `proxy-groups` sequence.
    #[error("no proxy-groups found in document")]
    NoProxyGroups,

    /// The modified tree failed to serialize.
    #[error("failed to serialize document: {0}")]
    Serialize(#[source] serde_yaml::Error),
}
