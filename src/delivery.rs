//! The real delivery orchestrator.

use std::sync::Arc;

use serde_json::Value;

use crate::{
    backend::{ApiClient, Settings},
    error::Error,
    extract::{self, DeliveryData},
    message::Message,
    registry::Registry,
    resolve::ResolvedContext,
};

/// What a delivery attempt produced.
#[derive(Debug)]
pub enum DeliveryResponse {
    /// SMTP path: the message was handed to its own transport.
    Sent,
    /// The API client's own response, verbatim.
    Api(Value),
    /// The extracted delivery data.
    Data(DeliveryData),
    /// A configured canned response (fake mode), verbatim.
    Canned(Value),
    /// The constructed-but-never-invoked client (fake mode).
    Client(Box<dyn ApiClient>),
}

/// Routes outgoing messages to their resolved backend and sends.
#[derive(Debug, Clone)]
pub struct Delivery {
    registry: Arc<Registry>,
    default_system: Option<String>,
}

impl Delivery {
    /// An orchestrator over `registry`.
    #[must_use]
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            default_system: None,
        }
    }

    /// Set a default system name for attempts made through this instance.
    #[must_use]
    pub fn with_default_system(mut self, name: impl Into<String>) -> Self {
        self.default_system = Some(name.into());
        self
    }

    /// Deliver `message` through its resolved backend.
    ///
    /// Backends whose settings carry SMTP configuration are sent through
    /// the message's own transport; everything else goes through the
    /// backend's client, constructed from the extracted data. A backend
    /// with `return_response` set skips the client and returns the data.
    ///
    /// # Errors
    ///
    /// Resolution and extraction errors per [`ResolvedContext`] and
    /// [`extract`](crate::extract()); [`Error::InvalidApiClient`] when the
    /// API path has no usable client; backend runtime failures pass
    /// through as [`Error::Backend`] or [`Error::Smtp`].
    pub fn deliver(&self, message: &dyn Message) -> Result<DeliveryResponse, Error> {
        let context = ResolvedContext::new(&self.registry, message, self.default_system.as_deref());
        let (system, settings, data) = prepare(&context, message)?;

        if let Some(smtp) = &settings.smtp {
            tracing::debug!(
                system = system.as_deref().unwrap_or("shared"),
                "delivering via smtp transport"
            );
            message.smtp_send(smtp)?;
            return Ok(DeliveryResponse::Sent);
        }

        if settings.return_response {
            return Ok(DeliveryResponse::Data(data));
        }

        let factory = context.client()?.ok_or_else(|| {
            Error::InvalidApiClient(format!(
                "no client configured for `{}`",
                system.as_deref().unwrap_or("shared")
            ))
        })?;
        let client = factory.build(data)?;

        tracing::debug!(
            system = system.as_deref().unwrap_or("shared"),
            "delivering via api client"
        );
        client.deliver().map(DeliveryResponse::Api).map_err(Error::Backend)
    }
}

/// The steps shared by the real and fake orchestrators: resolve the
/// backend, parse its settings, extract the data.
pub(crate) fn prepare(
    context: &ResolvedContext<'_>,
    message: &dyn Message,
) -> Result<(Option<String>, Settings, DeliveryData), Error> {
    let system = context.system()?;
    let settings = context.settings()?;
    let fields = context.fields()?;
    let defaults = context.defaults()?;
    let data = extract::extract(message, &fields, defaults.as_ref())?;

    Ok((system, settings, data))
}
