//! The no-send orchestrator variant.
//!
//! Performs the same resolution and extraction as the real orchestrator,
//! then stops short of the network: useful in tests and staging
//! environments where delivery must be observable but never happen.

use std::{fmt, sync::Arc};

use crate::{
    backend::Settings,
    delivery::{DeliveryResponse, prepare},
    error::{BoxError, Error},
    message::Message,
    registry::Registry,
    resolve::ResolvedContext,
};

/// Best-effort hook receiving messages when a backend enables
/// `use_inspector`.
pub type Inspector = Arc<dyn Fn(&dyn Message) -> Result<(), BoxError> + Send + Sync>;

/// Resolves and extracts like [`crate::Delivery`] but never sends.
///
/// Side effects and the return value are driven by the resolved settings:
/// `debug` and `raw_message` emit tracing events, `use_inspector` hands
/// the message to the installed hook, and a configured `response` is
/// returned as-is (or, with the `return_delivery_data` marker, replaced by
/// the extracted data). Without a canned response the SMTP path still
/// calls the message's send capability — expected to be a no-op double
/// here — and the API path returns the constructed client without ever
/// invoking it.
pub struct FakeDelivery {
    registry: Arc<Registry>,
    default_system: Option<String>,
    inspector: Option<Inspector>,
}

impl FakeDelivery {
    /// A fake orchestrator over `registry`.
    #[must_use]
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            default_system: None,
            inspector: None,
        }
    }

    /// Set a default system name for attempts made through this instance.
    #[must_use]
    pub fn with_default_system(mut self, name: impl Into<String>) -> Self {
        self.default_system = Some(name.into());
        self
    }

    /// Install the inspector hook.
    #[must_use]
    pub fn with_inspector(mut self, inspector: Inspector) -> Self {
        self.inspector = Some(inspector);
        self
    }

    /// Run a delivery attempt without sending.
    ///
    /// # Errors
    ///
    /// Resolution and extraction errors as in [`crate::Delivery::deliver`];
    /// the inspector hook is the one call whose failure is swallowed.
    pub fn deliver(&self, message: &dyn Message) -> Result<DeliveryResponse, Error> {
        let context = ResolvedContext::new(&self.registry, message, self.default_system.as_deref());
        let (system, settings, data) = prepare(&context, message)?;

        if settings.debug {
            let fields = context.fields()?;
            let has_client = context.client()?.is_some();
            tracing::debug!(
                system = system.as_deref().unwrap_or("shared"),
                has_client,
                fields = ?fields,
                settings = ?settings,
                data = ?data,
                "fake delivery snapshot"
            );
        }

        if settings.raw_message {
            tracing::debug!(source = %message.source(), "fake delivery raw message");
        }

        if settings.use_inspector {
            if let Some(inspector) = &self.inspector {
                // Best-effort: the inspector's failure is not ours.
                if let Err(error) = inspector(message) {
                    tracing::debug!(%error, "inspector rejected message");
                }
            }
        }

        if let Some(response) = settings.canned_response() {
            if Settings::wants_delivery_data(response) {
                return Ok(DeliveryResponse::Data(data));
            }
            return Ok(DeliveryResponse::Canned(response.clone()));
        }

        if let Some(smtp) = &settings.smtp {
            message.smtp_send(smtp)?;
            return Ok(DeliveryResponse::Sent);
        }

        let factory = context.client()?.ok_or_else(|| {
            Error::InvalidApiClient(format!(
                "no client configured for `{}`",
                system.as_deref().unwrap_or("shared")
            ))
        })?;

        Ok(DeliveryResponse::Client(factory.build(data)?))
    }
}

impl fmt::Debug for FakeDelivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FakeDelivery")
            .field("default_system", &self.default_system)
            .field("inspector", &self.inspector.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use pretty_assertions::assert_eq;
    use serde_json::{Value, json};

    use super::*;
    use crate::{
        backend::{ApiClient, ClientFactory},
        parsed::ParsedMessage,
    };

    fn message() -> ParsedMessage {
        ParsedMessage::parse(
            "From: sender@example.com\r\nTo: rcpt@example.com\r\nSubject: hi\r\n\r\nbody",
        )
        .unwrap()
    }

    #[derive(Debug)]
    struct InertClient {
        delivered: Arc<AtomicBool>,
    }

    impl ApiClient for InertClient {
        fn deliver(&self) -> Result<Value, BoxError> {
            self.delivered.store(true, Ordering::SeqCst);
            Ok(Value::Null)
        }
    }

    fn registry_with(settings: Value, delivered: &Arc<AtomicBool>) -> Registry {
        let delivered = Arc::clone(delivered);
        let mut registry = Registry::new();
        registry
            .register("fake")
            .unwrap()
            .client(ClientFactory::new(move |_| {
                Ok(Box::new(InertClient {
                    delivered: Arc::clone(&delivered),
                }) as Box<dyn ApiClient>)
            }))
            .fields(["subject"])
            .settings(settings);
        registry
    }

    #[test]
    fn canned_response_returns_verbatim_without_a_client() {
        let delivered = Arc::new(AtomicBool::new(false));
        let registry = registry_with(json!({"response": {"status": 202}}), &delivered);

        let fake = FakeDelivery::new(Arc::new(registry));
        let response = fake.deliver(&message().with_delivery_system("fake")).unwrap();

        assert!(!delivered.load(Ordering::SeqCst));
        match response {
            DeliveryResponse::Canned(value) => assert_eq!(value, json!({"status": 202})),
            other => panic!("expected Canned response, got {other:?}"),
        }
    }

    #[test]
    fn delivery_data_marker_returns_the_extracted_map() {
        let delivered = Arc::new(AtomicBool::new(false));
        let registry = registry_with(
            json!({"response": {"return_delivery_data": true}}),
            &delivered,
        );

        let fake = FakeDelivery::new(Arc::new(registry));
        let response = fake.deliver(&message().with_delivery_system("fake")).unwrap();

        assert!(!delivered.load(Ordering::SeqCst));
        match response {
            DeliveryResponse::Data(data) => assert_eq!(data.get("subject"), Some(&json!("hi"))),
            other => panic!("expected Data response, got {other:?}"),
        }
    }

    #[test]
    fn canned_response_wins_over_return_response() {
        let delivered = Arc::new(AtomicBool::new(false));
        let registry = registry_with(
            json!({"response": "done", "return_response": true}),
            &delivered,
        );

        let fake = FakeDelivery::new(Arc::new(registry));
        let response = fake.deliver(&message().with_delivery_system("fake")).unwrap();

        assert!(matches!(response, DeliveryResponse::Canned(_)));
    }

    #[test]
    fn api_path_returns_the_client_without_invoking_it() {
        let delivered = Arc::new(AtomicBool::new(false));
        let registry = registry_with(json!({}), &delivered);

        let fake = FakeDelivery::new(Arc::new(registry));
        let response = fake.deliver(&message().with_delivery_system("fake")).unwrap();

        match response {
            DeliveryResponse::Client(client) => {
                assert!(!delivered.load(Ordering::SeqCst));
                // The caller may still choose to invoke it.
                client.deliver().unwrap();
                assert!(delivered.load(Ordering::SeqCst));
            }
            other => panic!("expected Client response, got {other:?}"),
        }
    }

    #[test]
    fn inspector_failures_are_swallowed() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let delivered = Arc::new(AtomicBool::new(false));
        let registry = registry_with(
            json!({"use_inspector": true, "response": "inspected"}),
            &delivered,
        );

        let fake = FakeDelivery::new(Arc::new(registry)).with_inspector(Arc::new(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
            Err("inspector exploded".into())
        }));

        let response = fake.deliver(&message().with_delivery_system("fake")).unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(response, DeliveryResponse::Canned(_)));
    }

    #[test]
    fn inspector_is_not_called_unless_enabled() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let delivered = Arc::new(AtomicBool::new(false));
        let registry = registry_with(json!({"response": "ok"}), &delivered);

        let fake = FakeDelivery::new(Arc::new(registry)).with_inspector(Arc::new(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }));

        fake.deliver(&message().with_delivery_system("fake")).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
