//! SMTP settings and the transport leg behind [`Message::smtp_send`].
//!
//! [`Message::smtp_send`]: crate::Message::smtp_send

use lettre::{Address, SmtpTransport, Transport, address::Envelope,
             transport::smtp::authentication::Credentials};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Connection settings for the SMTP path of a backend.
///
/// A backend whose resolved settings carry one of these is delivered
/// through the message's own transport instead of an API client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SmtpSettings {
    /// Relay hostname.
    pub host: String,
    /// Relay port.
    pub port: u16,
    /// Credentials for authenticated relays.
    pub username: Option<String>,
    /// Credentials for authenticated relays.
    pub password: Option<String>,
    /// Negotiate STARTTLS with the relay. Off for local mail catchers.
    pub use_tls: bool,
}

impl Default for SmtpSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 25,
            username: None,
            password: None,
            use_tls: false,
        }
    }
}

/// Build the blocking transport for these settings.
fn build_transport(settings: &SmtpSettings) -> Result<SmtpTransport, Error> {
    let builder = if settings.use_tls {
        SmtpTransport::starttls_relay(&settings.host).map_err(|error| Error::Smtp(Box::new(error)))?
    } else {
        SmtpTransport::builder_dangerous(&settings.host)
    };

    let builder = match (&settings.username, &settings.password) {
        (Some(username), Some(password)) => {
            builder.credentials(Credentials::new(username.clone(), password.clone()))
        }
        _ => builder,
    };

    Ok(builder.port(settings.port).build())
}

/// Build an envelope from the message's address fields.
///
/// Recipient addresses that do not parse are dropped from the envelope.
pub(crate) fn build_envelope(from: &[String], recipients: &[String]) -> Result<Envelope, Error> {
    let sender = from.first().and_then(|from| from.parse::<Address>().ok());
    let recipients = recipients
        .iter()
        .flat_map(|recipient| recipient.parse::<Address>())
        .collect();

    Envelope::new(sender, recipients).map_err(|error| Error::Smtp(Box::new(error)))
}

/// Hand raw message bytes to the relay described by `settings`.
pub(crate) fn send_raw(
    settings: &SmtpSettings,
    from: &[String],
    recipients: &[String],
    raw: &[u8],
) -> Result<(), Error> {
    let transport = build_transport(settings)?;
    let envelope = build_envelope(from, recipients)?;

    transport
        .send_raw(&envelope, raw)
        .map_err(|error| Error::Smtp(Box::new(error)))?;

    Ok(())
}
