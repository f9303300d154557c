//! `mailparse`-backed adapter for the [`Message`] trait.

use mailparse::{DispositionType, MailAddr, MailHeaderMap, ParsedMail};
use serde_json::Value;

use crate::{
    error::Error,
    message::{Attachment, Message},
    smtp::{self, SmtpSettings},
};

/// Reserved header name carrying the backend-selection routing value.
pub const DELIVERY_SYSTEM_HEADER: &str = "delivery-system";

/// An outgoing message parsed from raw RFC 822 source.
///
/// Parsing happens once at construction; the accessors read the owned
/// result. Arbitrary structured fields can be attached after parsing and
/// take precedence over wire headers of the same name — this is how the
/// routing value travels with a message.
///
/// ```
/// use mailmux::{Message, ParsedMessage};
///
/// let message = ParsedMessage::parse(
///     "From: a@example.com\r\nTo: b@example.com\r\nSubject: hi\r\n\r\nbody",
/// )
/// .unwrap()
/// .with_delivery_system("ses");
///
/// assert_eq!(message.delivery_system().as_deref(), Some("ses"));
/// assert_eq!(message.to(), vec!["b@example.com".to_string()]);
/// ```
#[derive(Debug, Clone)]
pub struct ParsedMessage {
    raw: String,
    headers: Vec<(String, String)>,
    body: Option<String>,
    text: Option<String>,
    html: Option<String>,
    attachments: Vec<Attachment>,
    extra: Vec<(String, Value)>,
}

impl ParsedMessage {
    /// Parse raw message source.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::InvalidMessage`] when the source is not
    /// parseable mail.
    pub fn parse(raw: impl Into<String>) -> Result<Self, Error> {
        let raw = raw.into();
        let mail = mailparse::parse_mail(raw.as_bytes())?;

        let headers = mail
            .headers
            .iter()
            .map(|header| (header.get_key(), header.get_value()))
            .collect();

        let mut parts = PartWalk::default();
        let body = if mail.subparts.is_empty() {
            Some(mail.get_body()?)
        } else {
            for part in &mail.subparts {
                parts.walk(part)?;
            }
            None
        };

        Ok(Self {
            raw,
            headers,
            body,
            text: parts.text,
            html: parts.html,
            attachments: parts.attachments,
            extra: Vec::new(),
        })
    }

    /// Attach the routing value selecting the delivery system.
    #[must_use]
    pub fn with_delivery_system(self, name: impl Into<String>) -> Self {
        self.with_field(DELIVERY_SYSTEM_HEADER, Value::String(name.into()))
    }

    /// Attach an arbitrary named structured field.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.extra.push((name.into(), value));
        self
    }

    fn header_value(&self, name: &str) -> Option<String> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.clone())
    }

    fn address_list(&self, name: &str) -> Vec<String> {
        let Some(value) = self.header_value(name) else {
            return Vec::new();
        };

        mailparse::addrparse(&value).map_or_else(
            |_| Vec::new(),
            |list| {
                list.iter()
                    .flat_map(|address| match address {
                        MailAddr::Single(single) => vec![single.addr.clone()],
                        MailAddr::Group(group) => {
                            group.addrs.iter().map(|addr| addr.addr.clone()).collect()
                        }
                    })
                    .collect()
            },
        )
    }
}

impl Message for ParsedMessage {
    fn from(&self) -> Vec<String> {
        self.address_list("from")
    }

    fn to(&self) -> Vec<String> {
        self.address_list("to")
    }

    fn cc(&self) -> Vec<String> {
        self.address_list("cc")
    }

    fn bcc(&self) -> Vec<String> {
        self.address_list("bcc")
    }

    fn subject(&self) -> Option<String> {
        self.header_value("subject")
    }

    fn body(&self) -> Option<String> {
        self.body.clone()
    }

    fn text_part(&self) -> Option<String> {
        self.text.clone()
    }

    fn html_part(&self) -> Option<String> {
        self.html.clone()
    }

    fn attachments(&self) -> Vec<Attachment> {
        self.attachments.clone()
    }

    fn header(&self, name: &str) -> Option<Value> {
        self.extra
            .iter()
            .rev()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.clone())
            .or_else(|| self.header_value(name).map(Value::String))
    }

    fn delivery_system(&self) -> Option<String> {
        match self.header(DELIVERY_SYSTEM_HEADER) {
            Some(Value::String(name)) if !name.trim().is_empty() => Some(name),
            _ => None,
        }
    }

    fn source(&self) -> String {
        self.raw.clone()
    }

    fn smtp_send(&self, settings: &SmtpSettings) -> Result<(), Error> {
        let recipients: Vec<String> = [self.to(), self.cc(), self.bcc()].concat();
        smtp::send_raw(settings, &self.from(), &recipients, self.raw.as_bytes())
    }
}

/// Accumulates leaf parts while walking a multipart tree.
#[derive(Default)]
struct PartWalk {
    text: Option<String>,
    html: Option<String>,
    attachments: Vec<Attachment>,
}

impl PartWalk {
    fn walk(&mut self, part: &ParsedMail<'_>) -> Result<(), Error> {
        if !part.subparts.is_empty() {
            for sub in &part.subparts {
                self.walk(sub)?;
            }
            return Ok(());
        }

        let disposition = part.get_content_disposition();
        let filename = disposition
            .params
            .get("filename")
            .or_else(|| part.ctype.params.get("name"))
            .cloned();
        let content_id = content_id(part);

        match disposition.disposition {
            DispositionType::Attachment => self.push_attachment(part, filename, false)?,
            // An inline part with a filename or content-id is an embedded
            // attachment; a bare inline part is a body alternative.
            DispositionType::Inline if filename.is_some() || content_id.is_some() => {
                self.push_attachment(part, filename, true)?;
            }
            _ => match part.ctype.mimetype.as_str() {
                "text/plain" if self.text.is_none() => self.text = Some(part.get_body()?),
                "text/html" if self.html.is_none() => self.html = Some(part.get_body()?),
                _ => {}
            },
        }

        Ok(())
    }

    fn push_attachment(
        &mut self,
        part: &ParsedMail<'_>,
        filename: Option<String>,
        inline: bool,
    ) -> Result<(), Error> {
        self.attachments.push(Attachment {
            filename: filename.unwrap_or_default(),
            mime_type: part.ctype.mimetype.clone(),
            content: part.get_body_raw()?,
            inline,
            content_id: content_id(part),
        });

        Ok(())
    }
}

fn content_id(part: &ParsedMail<'_>) -> Option<String> {
    part.headers
        .get_first_value("Content-ID")
        .map(|value| value.trim_matches(['<', '>']).to_string())
}
