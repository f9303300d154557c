//! Registered backends and global routing policy.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    backend::{ClientFactory, ConfigValue},
    error::Error,
};

/// How a backend is chosen when a message does not select one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Use the configured default system name.
    DefaultSystem,
    /// Always the first registered backend.
    FirstRegistered,
    /// A uniformly random registered backend.
    Random,
    /// Cycle through registered backends, one step per delivery attempt.
    RoundRobin,
}

/// The set of registered delivery backends and the policy for choosing
/// between them.
///
/// One registry is built at startup and shared behind an [`Arc`] by every
/// orchestrator. Registration takes `&mut self`, so resolution can never
/// observe a partially-registered backend; the only state mutated after
/// startup is the round-robin cursor, which lives under its own lock.
///
/// [`Arc`]: std::sync::Arc
#[derive(Debug, Default)]
pub struct Registry {
    registered: Vec<String>,
    clients: Option<ConfigValue<ClientFactory>>,
    fields: Option<ConfigValue<Value>>,
    defaults: Option<ConfigValue<Value>>,
    settings: Option<ConfigValue<Value>>,
    default_system: Option<String>,
    strategy: Option<Strategy>,
    cursor: Mutex<usize>,
}

impl Registry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin registering a backend under `name`.
    ///
    /// Duplicate names are allowed: the rotation list gains another entry,
    /// while lookup sees the most recent configuration stored under the
    /// name.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::InvalidBackendName`] for an empty or blank name.
    pub fn register(&mut self, name: impl Into<String>) -> Result<BackendBuilder<'_>, Error> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(Error::InvalidBackendName);
        }

        self.registered.push(name.clone());
        Ok(BackendBuilder {
            registry: self,
            name,
        })
    }

    /// Set a global policy key.
    ///
    /// Recognized keys: `default_delivery_system`, `strategy`.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::InvalidConfiguration`] for anything else, or for
    /// a value of the wrong shape.
    pub fn configure(&mut self, key: &str, value: &Value) -> Result<(), Error> {
        match key {
            "default_delivery_system" => match value.as_str() {
                Some(name) if !name.trim().is_empty() => {
                    self.default_system = Some(name.to_string());
                    Ok(())
                }
                _ => Err(Error::InvalidConfiguration(format!(
                    "default_delivery_system must be a non-empty string, got {value}"
                ))),
            },
            "strategy" => {
                self.strategy = Some(serde_json::from_value(value.clone()).map_err(|_| {
                    Error::InvalidConfiguration(format!("unrecognized strategy {value}"))
                })?);
                Ok(())
            }
            other => Err(Error::InvalidConfiguration(format!(
                "unrecognized configuration key `{other}`"
            ))),
        }
    }

    /// Set the default system name used by the `default_system` strategy.
    pub fn set_default_system(&mut self, name: impl Into<String>) {
        self.default_system = Some(name.into());
    }

    /// Set the backend-selection strategy.
    pub fn set_strategy(&mut self, strategy: Strategy) {
        self.strategy = Some(strategy);
    }

    /// Place a fields value directly, without registering backends.
    pub fn set_fields(&mut self, fields: ConfigValue<Value>) {
        self.fields = Some(fields);
    }

    /// Place a defaults value directly, without registering backends.
    pub fn set_defaults(&mut self, defaults: ConfigValue<Value>) {
        self.defaults = Some(defaults);
    }

    /// Place a settings value directly, without registering backends.
    pub fn set_settings(&mut self, settings: ConfigValue<Value>) {
        self.settings = Some(settings);
    }

    /// Place a client value directly, without registering backends.
    pub fn set_clients(&mut self, clients: ConfigValue<ClientFactory>) {
        self.clients = Some(clients);
    }

    /// Attach a client for `name` without adding a rotation entry.
    ///
    /// Used after declarative loading, where clients (being code) cannot
    /// appear in the configuration tree.
    pub fn set_client(&mut self, name: impl Into<String>, client: ClientFactory) {
        match &mut self.clients {
            Some(clients) => clients.insert(name, client),
            None => {
                self.clients = Some(ConfigValue::PerBackend(vec![(name.into(), client)]));
            }
        }
    }

    /// Ordered distinct backend names.
    ///
    /// When nothing was registered explicitly, falls back to the backend
    /// keys of whichever configuration value is per-backend (fields, then
    /// client, then settings) — the direct-options pattern.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        if !self.registered.is_empty() {
            let mut names: Vec<String> = Vec::new();
            for name in &self.registered {
                if !names.contains(name) {
                    names.push(name.clone());
                }
            }
            return names;
        }

        if let Some(fields) = &self.fields {
            let names = fields.backend_names();
            if !names.is_empty() {
                return names;
            }
        }
        if let Some(clients) = &self.clients {
            let names = clients.backend_names();
            if !names.is_empty() {
                return names;
            }
        }
        if let Some(settings) = &self.settings {
            let names = settings.backend_names();
            if !names.is_empty() {
                return names;
            }
        }

        Vec::new()
    }

    /// Advance the shared round-robin cursor one step and return the name
    /// under it.
    pub(crate) fn next_rotation(&self) -> Option<String> {
        let rotation = if self.registered.is_empty() {
            self.names()
        } else {
            self.registered.clone()
        };
        if rotation.is_empty() {
            return None;
        }

        let mut cursor = self.cursor.lock();
        let index = *cursor % rotation.len();
        *cursor = (*cursor + 1) % rotation.len();
        Some(rotation[index].clone())
    }

    /// Resolution is only required when at least one of fields, client or
    /// settings is keyed by backend name.
    pub(crate) fn resolution_required(&self) -> bool {
        self.fields.as_ref().is_some_and(ConfigValue::is_per_backend)
            || self.clients.as_ref().is_some_and(ConfigValue::is_per_backend)
            || self.settings.as_ref().is_some_and(ConfigValue::is_per_backend)
    }

    pub(crate) fn lookup_fields(&self, name: Option<&str>) -> Option<&Value> {
        self.fields.as_ref().and_then(|fields| fields.lookup(name))
    }

    pub(crate) fn lookup_defaults(&self, name: Option<&str>) -> Option<&Value> {
        self.defaults
            .as_ref()
            .and_then(|defaults| defaults.lookup(name))
    }

    pub(crate) fn lookup_settings(&self, name: Option<&str>) -> Option<&Value> {
        self.settings
            .as_ref()
            .and_then(|settings| settings.lookup(name))
    }

    pub(crate) fn lookup_client(&self, name: Option<&str>) -> Option<&ClientFactory> {
        self.clients.as_ref().and_then(|clients| clients.lookup(name))
    }

    pub(crate) fn default_system(&self) -> Option<&str> {
        self.default_system.as_deref()
    }

    pub(crate) fn strategy(&self) -> Option<Strategy> {
        self.strategy
    }
}

/// Mutable registration handle for one backend.
///
/// Each setter writes into that field's backend-keyed map under the name
/// being registered.
#[derive(Debug)]
pub struct BackendBuilder<'registry> {
    registry: &'registry mut Registry,
    name: String,
}

impl BackendBuilder<'_> {
    /// Attach the backend's client factory.
    pub fn client(self, client: ClientFactory) -> Self {
        self.registry.set_client(self.name.clone(), client);
        self
    }

    /// Set the fields to extract for this backend.
    pub fn fields<I, S>(self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let value = Value::Array(
            fields
                .into_iter()
                .map(|field| Value::String(field.into()))
                .collect(),
        );
        self.store(Slot::Fields, value)
    }

    /// Set default field values for this backend.
    pub fn defaults(self, defaults: Value) -> Self {
        self.store(Slot::Defaults, defaults)
    }

    /// Set backend-specific settings.
    pub fn settings(self, settings: Value) -> Self {
        self.store(Slot::Settings, settings)
    }

    /// Dynamic setter used by the declarative loader.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::InvalidBackendOption`] for unrecognized options.
    pub fn set(self, option: &str, value: Value) -> Result<Self, Error> {
        match option {
            "fields" => Ok(self.store(Slot::Fields, value)),
            "defaults" => Ok(self.store(Slot::Defaults, value)),
            "settings" => Ok(self.store(Slot::Settings, value)),
            "client" => Err(Error::InvalidBackendOption(format!(
                "clients are code and cannot be configured declaratively; \
                 attach one to `{name}` with `Registry::set_client`",
                name = self.name
            ))),
            other => Err(Error::InvalidBackendOption(format!(
                "unrecognized option `{other}` for backend `{name}`",
                name = self.name
            ))),
        }
    }

    fn store(self, slot: Slot, value: Value) -> Self {
        let field = match slot {
            Slot::Fields => &mut self.registry.fields,
            Slot::Defaults => &mut self.registry.defaults,
            Slot::Settings => &mut self.registry.settings,
        };
        match field {
            Some(existing) => existing.insert(self.name.clone(), value),
            None => *field = Some(ConfigValue::PerBackend(vec![(self.name.clone(), value)])),
        }
        self
    }
}

enum Slot {
    Fields,
    Defaults,
    Settings,
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn rejects_blank_names() {
        let mut registry = Registry::new();
        assert!(matches!(
            registry.register("").unwrap_err(),
            Error::InvalidBackendName
        ));
        assert!(matches!(
            registry.register("   ").unwrap_err(),
            Error::InvalidBackendName
        ));
    }

    #[test]
    fn registration_keeps_order_and_dedupes_lookup() {
        let mut registry = Registry::new();
        registry
            .register("ses")
            .unwrap()
            .fields(["from"])
            .settings(json!({"return_response": true}));
        registry.register("postmark").unwrap().fields(["to"]);
        registry.register("ses").unwrap().fields(["subject"]);

        assert_eq!(registry.names(), vec!["ses", "postmark"]);
        // Most recent registration wins for lookup.
        assert_eq!(
            registry.lookup_fields(Some("ses")),
            Some(&json!(["subject"]))
        );
        // The earlier settings survive unless overwritten.
        assert_eq!(
            registry.lookup_settings(Some("ses")),
            Some(&json!({"return_response": true}))
        );
    }

    #[test]
    fn configure_rejects_unknown_keys() {
        let mut registry = Registry::new();
        assert!(matches!(
            registry.configure("retries", &json!(3)).unwrap_err(),
            Error::InvalidConfiguration(_)
        ));
        assert!(matches!(
            registry
                .configure("strategy", &json!("least_loaded"))
                .unwrap_err(),
            Error::InvalidConfiguration(_)
        ));
        assert!(matches!(
            registry
                .configure("default_delivery_system", &json!(""))
                .unwrap_err(),
            Error::InvalidConfiguration(_)
        ));
    }

    #[test]
    fn configure_sets_policy() {
        let mut registry = Registry::new();
        registry
            .configure("default_delivery_system", &json!("ses"))
            .unwrap();
        registry.configure("strategy", &json!("round_robin")).unwrap();

        assert_eq!(registry.default_system(), Some("ses"));
        assert_eq!(registry.strategy(), Some(Strategy::RoundRobin));
    }

    #[test]
    fn builder_rejects_unknown_options() {
        let mut registry = Registry::new();
        let error = registry
            .register("ses")
            .unwrap()
            .set("retry", json!(3))
            .unwrap_err();
        assert!(matches!(error, Error::InvalidBackendOption(_)));
    }

    #[test]
    fn names_fall_back_to_per_backend_keys() {
        let mut registry = Registry::new();
        registry.set_settings(ConfigValue::PerBackend(vec![
            ("ses".to_string(), json!({})),
            ("postmark".to_string(), json!({})),
        ]));

        assert_eq!(registry.names(), vec!["ses", "postmark"]);
    }

    #[test]
    fn rotation_cycles_through_duplicates() {
        let mut registry = Registry::new();
        registry.register("a").unwrap();
        registry.register("b").unwrap();
        registry.register("a").unwrap();

        let picks: Vec<_> = (0..4).map(|_| registry.next_rotation().unwrap()).collect();
        assert_eq!(picks, vec!["a", "b", "a", "a"]);
    }

    #[test]
    fn resolution_required_only_for_per_backend_shapes() {
        let mut registry = Registry::new();
        assert!(!registry.resolution_required());

        registry.set_fields(ConfigValue::Shared(json!(["from"])));
        registry.set_defaults(ConfigValue::PerBackend(vec![(
            "ses".to_string(),
            json!({}),
        )]));
        assert!(!registry.resolution_required());

        registry.set_settings(ConfigValue::PerBackend(vec![(
            "ses".to_string(),
            json!({}),
        )]));
        assert!(registry.resolution_required());
    }
}
