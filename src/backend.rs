//! Backend-side primitives: polymorphic configuration values, recognized
//! settings, and the client contract.

use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    error::{BoxError, Error},
    extract::DeliveryData,
    smtp::SmtpSettings,
};

/// A configuration value that either applies to every backend or is keyed
/// by backend name.
///
/// Fields, clients, defaults and settings all come in both shapes; the one
/// [`ConfigValue::lookup`] function resolves them uniformly. Per-backend
/// entries keep registration order, because that order drives the
/// first-registered and round-robin strategies.
#[derive(Debug, Clone)]
pub enum ConfigValue<T> {
    /// One value shared by every backend.
    Shared(T),
    /// Values keyed by backend name, in registration order.
    PerBackend(Vec<(String, T)>),
}

impl<T> ConfigValue<T> {
    /// Resolve the value applying to `name`.
    ///
    /// A shared value resolves regardless of `name`; a per-backend value
    /// resolves to the most recent entry stored under `name`.
    pub fn lookup(&self, name: Option<&str>) -> Option<&T> {
        match self {
            Self::Shared(value) => Some(value),
            Self::PerBackend(entries) => name.and_then(|name| {
                entries
                    .iter()
                    .rev()
                    .find(|(key, _)| key == name)
                    .map(|(_, value)| value)
            }),
        }
    }

    /// Whether this value is keyed by backend name.
    #[must_use]
    pub const fn is_per_backend(&self) -> bool {
        matches!(self, Self::PerBackend(_))
    }

    /// Distinct backend names, in insertion order. Empty for shared values.
    #[must_use]
    pub fn backend_names(&self) -> Vec<String> {
        match self {
            Self::Shared(_) => Vec::new(),
            Self::PerBackend(entries) => {
                let mut names: Vec<String> = Vec::new();
                for (name, _) in entries {
                    if !names.contains(name) {
                        names.push(name.clone());
                    }
                }
                names
            }
        }
    }

    /// Store `value` under `name`.
    ///
    /// Re-inserting a name replaces its value in place, so lookup sees the
    /// most recent configuration while the name keeps its original
    /// position. A shared value becomes per-backend.
    pub fn insert(&mut self, name: impl Into<String>, value: T) {
        let name = name.into();
        match self {
            Self::PerBackend(entries) => {
                if let Some(entry) = entries.iter_mut().find(|(key, _)| *key == name) {
                    entry.1 = value;
                } else {
                    entries.push((name, value));
                }
            }
            Self::Shared(_) => *self = Self::PerBackend(vec![(name, value)]),
        }
    }
}

/// Recognized per-backend settings.
///
/// `smtp` and `return_response` drive the real orchestrator; the remaining
/// keys only take effect in fake mode. Unrecognized keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Deliver through the message's own SMTP transport.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub smtp: Option<SmtpSettings>,
    /// Return the extracted data map instead of invoking the client.
    pub return_response: bool,
    /// Fake mode: emit a structured snapshot of the resolved delivery.
    pub debug: bool,
    /// Fake mode: emit the unmodified message source.
    pub raw_message: bool,
    /// Fake mode: hand the message to the installed inspector hook.
    pub use_inspector: bool,
    /// Fake mode: canned value returned instead of delivering.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
}

impl Settings {
    /// Parse a resolved settings value.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::InvalidSettings`] when the value is not a map or
    /// carries unrecognized keys.
    pub fn from_value(value: &Value) -> Result<Self, Error> {
        if !value.is_object() {
            return Err(Error::InvalidSettings(format!(
                "settings must be a map, got {value}"
            )));
        }

        let mut settings: Self = serde_json::from_value(value.clone())
            .map_err(|error| Error::InvalidSettings(error.to_string()))?;

        // An explicitly empty smtp map does not select the SMTP path.
        if value
            .get("smtp")
            .and_then(Value::as_object)
            .is_some_and(serde_json::Map::is_empty)
        {
            settings.smtp = None;
        }

        Ok(settings)
    }

    /// The canned response, if one is configured. Null counts as absent.
    #[must_use]
    pub fn canned_response(&self) -> Option<&Value> {
        self.response.as_ref().filter(|value| !value.is_null())
    }

    /// Whether a canned response asks for the extracted data map instead.
    #[must_use]
    pub fn wants_delivery_data(response: &Value) -> bool {
        response.get("return_delivery_data").and_then(Value::as_bool) == Some(true)
    }
}

/// The send contract a backend client exposes.
///
/// A client is constructed once per delivery attempt from the extracted
/// data (see [`ClientFactory`]) and its `deliver` result passes through to
/// the caller verbatim.
pub trait ApiClient: fmt::Debug {
    /// Perform the send.
    fn deliver(&self) -> Result<Value, BoxError>;
}

type FactoryFn = dyn Fn(DeliveryData) -> Result<Box<dyn ApiClient>, BoxError> + Send + Sync;

/// Constructs an [`ApiClient`] from extracted delivery data.
///
/// This is the Rust rendition of handing the router a client class: the
/// factory owns whatever state a constructor would close over.
#[derive(Clone)]
pub struct ClientFactory(Arc<FactoryFn>);

impl ClientFactory {
    /// Wrap a constructor closure.
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn(DeliveryData) -> Result<Box<dyn ApiClient>, BoxError> + Send + Sync + 'static,
    {
        Self(Arc::new(factory))
    }

    /// Construct a client for one delivery attempt.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::InvalidApiClient`] when the factory refuses.
    pub fn build(&self, data: DeliveryData) -> Result<Box<dyn ApiClient>, Error> {
        (self.0)(data).map_err(|error| Error::InvalidApiClient(error.to_string()))
    }
}

impl fmt::Debug for ClientFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientFactory").finish_non_exhaustive()
    }
}
