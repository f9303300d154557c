//! The outgoing-message boundary.
//!
//! The router consumes messages through the [`Message`] trait rather than a
//! concrete mail type: one adapter per supported mail library binds the
//! accessors below to that library's own parsing. The crate ships a single
//! adapter, [`crate::ParsedMessage`].

use serde_json::Value;

use crate::{error::Error, smtp::SmtpSettings};

/// A single attachment lifted off a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// Filename as carried by the part's disposition or content type.
    pub filename: String,
    /// MIME type of the part.
    pub mime_type: String,
    /// Transfer-decoded content bytes.
    pub content: Vec<u8>,
    /// Whether the part is inline (referenced from the message body).
    pub inline: bool,
    /// Content-ID of the part, without angle brackets.
    pub content_id: Option<String>,
}

/// Accessors the router needs from an outgoing message, plus the message's
/// own SMTP send capability.
///
/// Implementations must be read-only views: extraction never mutates the
/// message it reads from.
pub trait Message {
    /// Sender addresses.
    fn from(&self) -> Vec<String>;

    /// Primary recipient addresses.
    fn to(&self) -> Vec<String>;

    /// Carbon-copy recipient addresses.
    fn cc(&self) -> Vec<String>;

    /// Blind-carbon-copy recipient addresses.
    fn bcc(&self) -> Vec<String>;

    /// Decoded subject line.
    fn subject(&self) -> Option<String>;

    /// Decoded body of a single-part message.
    fn body(&self) -> Option<String>;

    /// Decoded `text/plain` part of a multipart message.
    fn text_part(&self) -> Option<String>;

    /// Decoded `text/html` part of a multipart message.
    fn html_part(&self) -> Option<String>;

    /// Attachment parts, in message order.
    fn attachments(&self) -> Vec<Attachment>;

    /// Structured value of an arbitrary named header or attached field.
    ///
    /// The value is the *unparsed* payload: a string for wire headers, or
    /// whatever structured value (boolean, list, nested map) was attached
    /// at construction.
    fn header(&self, name: &str) -> Option<Value>;

    /// The routing value selecting a delivery system for this message.
    fn delivery_system(&self) -> Option<String>;

    /// Raw RFC 822 source of the message.
    fn source(&self) -> String;

    /// Hand the message to its own SMTP transport.
    fn smtp_send(&self, settings: &SmtpSettings) -> Result<(), Error>;
}
