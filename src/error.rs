//! Typed error handling for routing and delivery operations.
//!
//! Every variant is a configuration or usage mistake surfaced synchronously
//! at the point of detection; nothing is retried or recovered internally.
//! Failures of a backend itself pass through as [`Error::Backend`] or
//! [`Error::Smtp`] untouched.

use thiserror::Error;

/// Boxed error carrier for failures originating outside this crate.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised while configuring backends or routing a message.
#[derive(Debug, Error)]
pub enum Error {
    /// Registration was attempted under an empty or blank name.
    #[error("backend name must be a non-empty string")]
    InvalidBackendName,

    /// An unrecognized option was set on a backend registration entry.
    #[error("invalid backend option: {0}")]
    InvalidBackendOption(String),

    /// An unrecognized key or value was set on the routing configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The raw message source could not be parsed into a mail object.
    #[error("invalid message: {0}")]
    InvalidMessage(#[from] mailparse::MailParseError),

    /// The resolved fields value is not a list of field identifiers.
    #[error("invalid field list: {0}")]
    InvalidFieldList(String),

    /// The resolved defaults value is present but not a map.
    #[error("invalid default options: {0}")]
    InvalidDefaults(String),

    /// The resolved settings value is not a recognized settings map.
    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    /// No client is configured for the resolved backend, or the client
    /// factory refused to construct one.
    #[error("invalid api client: {0}")]
    InvalidApiClient(String),

    /// Backend resolution was required but produced no name.
    #[error("no delivery system could be resolved for this message")]
    UndefinedBackend,

    /// The resolved name does not match any registered backend.
    #[error("unknown delivery system `{name}` (registered: {known:?})")]
    UnknownBackend {
        /// The name that failed to resolve.
        name: String,
        /// Every name the registry knows about.
        known: Vec<String>,
    },

    /// The SMTP transport rejected the message or its envelope.
    #[error("smtp transport failure: {0}")]
    Smtp(#[source] BoxError),

    /// A backend client's own failure, passed through verbatim.
    #[error("backend failure: {0}")]
    Backend(#[source] BoxError),
}

impl Error {
    /// Returns `true` if the error originated in a backend rather than in
    /// this crate's configuration or usage checks.
    #[must_use]
    pub const fn is_backend_failure(&self) -> bool {
        matches!(self, Self::Backend(_) | Self::Smtp(_))
    }
}
