//! Delivery-system routing for outgoing mail.
//!
//! `mailmux` sits between an application's outgoing messages and its
//! configured delivery backends — SMTP relays or arbitrary API clients —
//! deciding which backend handles a given message and translating the
//! message into the shape that backend expects.
//!
//! Backends are registered once at startup on a [`Registry`], which is
//! then shared by [`Delivery`] (real sends) and [`FakeDelivery`] (resolve
//! and extract, but never send) orchestrators:
//!
//! ```
//! use std::sync::Arc;
//!
//! use mailmux::{ApiClient, ClientFactory, Delivery, ParsedMessage, Registry};
//!
//! # #[derive(Debug)]
//! # struct HttpClient(mailmux::DeliveryData);
//! # impl ApiClient for HttpClient {
//! #     fn deliver(&self) -> Result<serde_json::Value, mailmux::BoxError> {
//! #         Ok(serde_json::Value::Null)
//! #     }
//! # }
//! let mut registry = Registry::new();
//! registry
//!     .register("postal")?
//!     .client(ClientFactory::new(|data| {
//!         Ok(Box::new(HttpClient(data)) as Box<dyn ApiClient>)
//!     }))
//!     .fields(["from", "to", "subject", "body"]);
//!
//! let delivery = Delivery::new(Arc::new(registry));
//! let message = ParsedMessage::parse(
//!     "From: a@example.com\r\nTo: b@example.com\r\nSubject: hi\r\n\r\nhello",
//! )?
//! .with_delivery_system("postal");
//!
//! let response = delivery.deliver(&message)?;
//! # let _ = response;
//! # Ok::<(), mailmux::Error>(())
//! ```
//!
//! Messages select their backend through a routing value (attached with
//! [`ParsedMessage::with_delivery_system`] or carried as a
//! `delivery-system` header); unselected messages fall back to the
//! registry's [`Strategy`].

mod backend;
mod config;
mod delivery;
mod error;
mod extract;
mod fake;
mod message;
mod parsed;
mod registry;
mod resolve;
mod smtp;

pub use backend::{ApiClient, ClientFactory, ConfigValue, Settings};
pub use delivery::{Delivery, DeliveryResponse};
pub use error::{BoxError, Error};
pub use extract::{DeliveryData, Field, extract};
pub use fake::{FakeDelivery, Inspector};
pub use message::{Attachment, Message};
pub use parsed::{DELIVERY_SYSTEM_HEADER, ParsedMessage};
pub use registry::{BackendBuilder, Registry, Strategy};
pub use resolve::ResolvedContext;
pub use smtp::SmtpSettings;
