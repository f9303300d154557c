//! Per-attempt backend resolution.

use std::cell::OnceCell;

use rand::Rng;
use serde_json::Value;

use crate::{
    backend::{ClientFactory, Settings},
    error::Error,
    extract::{self, Field},
    message::Message,
    registry::{Registry, Strategy},
};

/// Resolution state for a single delivery attempt.
///
/// The backend name is derived once and memoized — including a
/// deliberately-empty result — so later reads never re-derive it and never
/// advance shared round-robin state a second time.
pub struct ResolvedContext<'attempt> {
    registry: &'attempt Registry,
    message: &'attempt dyn Message,
    attempt_default: Option<&'attempt str>,
    system: OnceCell<Option<String>>,
}

impl<'attempt> ResolvedContext<'attempt> {
    /// Begin resolution for one delivery attempt.
    #[must_use]
    pub fn new(
        registry: &'attempt Registry,
        message: &'attempt dyn Message,
        attempt_default: Option<&'attempt str>,
    ) -> Self {
        Self {
            registry,
            message,
            attempt_default,
            system: OnceCell::new(),
        }
    }

    /// The backend name handling this attempt.
    ///
    /// `None` means the configuration is flat and the shared values apply.
    ///
    /// # Errors
    ///
    /// When resolution is required (any of fields, client or settings is
    /// keyed by backend name): [`Error::UndefinedBackend`] if no name could
    /// be derived, [`Error::UnknownBackend`] if the derived name is not
    /// registered.
    pub fn system(&self) -> Result<Option<String>, Error> {
        if let Some(cached) = self.system.get() {
            return Ok(cached.clone());
        }

        let derived = self.derive()?;
        Ok(self.system.get_or_init(|| derived).clone())
    }

    fn derive(&self) -> Result<Option<String>, Error> {
        let explicit = self
            .message
            .delivery_system()
            .filter(|name| !name.trim().is_empty());
        let candidate = match explicit {
            Some(name) => Some(name),
            None => self.default_name(),
        };

        if self.registry.resolution_required() {
            match &candidate {
                None => return Err(Error::UndefinedBackend),
                Some(name) => {
                    let known = self.registry.names();
                    if !known.iter().any(|registered| registered == name) {
                        return Err(Error::UnknownBackend {
                            name: name.clone(),
                            known,
                        });
                    }
                }
            }
        }

        tracing::trace!(
            system = candidate.as_deref().unwrap_or("shared"),
            "resolved delivery system"
        );
        Ok(candidate)
    }

    /// Derive the fallback name by strategy.
    fn default_name(&self) -> Option<String> {
        let configured_default = self
            .attempt_default
            .map(str::to_string)
            .or_else(|| self.registry.default_system().map(str::to_string));

        let strategy = match self.registry.strategy() {
            None if self.attempt_default.is_some() => Strategy::DefaultSystem,
            None => Strategy::FirstRegistered,
            Some(Strategy::DefaultSystem) if configured_default.is_none() => {
                Strategy::FirstRegistered
            }
            Some(strategy) => strategy,
        };

        match strategy {
            Strategy::DefaultSystem => configured_default,
            Strategy::FirstRegistered => self.registry.names().into_iter().next(),
            Strategy::Random => {
                let names = self.registry.names();
                if names.is_empty() {
                    None
                } else {
                    let index = rand::rng().random_range(0..names.len());
                    names.into_iter().nth(index)
                }
            }
            Strategy::RoundRobin => self.registry.next_rotation(),
        }
    }

    /// Resolved field list for this backend. Unconfigured resolves empty.
    pub fn fields(&self) -> Result<Vec<Field>, Error> {
        let system = self.system()?;
        match self.registry.lookup_fields(system.as_deref()) {
            Some(value) => extract::field_list(value),
            None => Ok(Vec::new()),
        }
    }

    /// Resolved defaults value for this backend, unvalidated.
    pub fn defaults(&self) -> Result<Option<Value>, Error> {
        let system = self.system()?;
        Ok(self.registry.lookup_defaults(system.as_deref()).cloned())
    }

    /// Resolved, parsed settings for this backend.
    pub fn settings(&self) -> Result<Settings, Error> {
        let system = self.system()?;
        match self.registry.lookup_settings(system.as_deref()) {
            Some(value) => Settings::from_value(value),
            None => Ok(Settings::default()),
        }
    }

    /// Resolved client factory for this backend.
    pub fn client(&self) -> Result<Option<ClientFactory>, Error> {
        let system = self.system()?;
        Ok(self.registry.lookup_client(system.as_deref()).cloned())
    }
}
