//! Declarative registry construction.
//!
//! A registry can be described as a data tree — deserialized from RON,
//! TOML or JSON through serde into a [`serde_json::Value`] — and built
//! with [`Registry::from_value`]. Clients are code and cannot appear in
//! the tree; attach them afterwards with [`Registry::set_client`].

use serde_json::Value;

use crate::{backend::ConfigValue, error::Error, registry::Registry};

impl Registry {
    /// Build a registry from a configuration tree.
    ///
    /// Recognized top-level keys: `default_delivery_system`, `strategy`,
    /// `fields` / `defaults` / `settings` (shared values), and `backends`
    /// (a map of backend name to its options, registered in document
    /// order).
    ///
    /// # Errors
    ///
    /// [`Error::InvalidConfiguration`] for a non-map tree or an
    /// unrecognized top-level key; [`Error::InvalidBackendOption`] for an
    /// unrecognized key inside a backend entry;
    /// [`Error::InvalidBackendName`] for a blank backend name.
    pub fn from_value(config: &Value) -> Result<Self, Error> {
        let Some(map) = config.as_object() else {
            return Err(Error::InvalidConfiguration(format!(
                "registry configuration must be a map, got {config}"
            )));
        };

        let mut registry = Self::new();
        for (key, value) in map {
            match key.as_str() {
                "default_delivery_system" | "strategy" => registry.configure(key, value)?,
                "fields" => registry.set_fields(ConfigValue::Shared(value.clone())),
                "defaults" => registry.set_defaults(ConfigValue::Shared(value.clone())),
                "settings" => registry.set_settings(ConfigValue::Shared(value.clone())),
                "backends" => register_backends(&mut registry, value)?,
                other => {
                    return Err(Error::InvalidConfiguration(format!(
                        "unrecognized configuration key `{other}`"
                    )));
                }
            }
        }

        Ok(registry)
    }
}

fn register_backends(registry: &mut Registry, backends: &Value) -> Result<(), Error> {
    let Some(backends) = backends.as_object() else {
        return Err(Error::InvalidConfiguration(format!(
            "backends must be a map of name to options, got {backends}"
        )));
    };

    for (name, entry) in backends {
        let Some(options) = entry.as_object() else {
            return Err(Error::InvalidBackendOption(format!(
                "backend `{name}` must map to its options, got {entry}"
            )));
        };

        let mut builder = registry.register(name.clone())?;
        for (option, value) in options {
            builder = builder.set(option, value.clone())?;
        }
    }

    Ok(())
}
