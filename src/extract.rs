//! Field extraction: one message in, backend-agnostic delivery data out.

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;

use crate::{
    error::Error,
    message::{Attachment, Message},
};

/// A field identifier the extraction engine knows how to read.
///
/// Identifiers are a closed set with one escape hatch: anything the engine
/// does not recognize is read as a named message header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field {
    /// Sender address list.
    From,
    /// Recipient address list.
    To,
    /// Carbon-copy address list.
    Cc,
    /// Blind-carbon-copy address list.
    Bcc,
    /// Subject line.
    Subject,
    /// Decoded single-part body.
    Body,
    /// Decoded `text/plain` part.
    TextPart,
    /// Decoded `text/html` part.
    HtmlPart,
    /// Attachment descriptor list.
    Attachments,
    /// Embed the raw message source (message-is-the-payload backends).
    Message,
    /// Any other identifier: read as a named message header.
    Header(String),
}

impl Field {
    /// The key this field produces in the extracted map.
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::From => "from",
            Self::To => "to",
            Self::Cc => "cc",
            Self::Bcc => "bcc",
            Self::Subject => "subject",
            Self::Body => "body",
            Self::TextPart => "text_part",
            Self::HtmlPart => "html_part",
            Self::Attachments => "attachments",
            Self::Message => "message",
            Self::Header(name) => name,
        }
    }
}

impl From<&str> for Field {
    fn from(identifier: &str) -> Self {
        match identifier.to_ascii_lowercase().as_str() {
            "from" => Self::From,
            "to" => Self::To,
            "cc" => Self::Cc,
            "bcc" => Self::Bcc,
            "subject" => Self::Subject,
            "body" => Self::Body,
            "text_part" => Self::TextPart,
            "html_part" => Self::HtmlPart,
            "attachments" => Self::Attachments,
            "message" => Self::Message,
            _ => Self::Header(identifier.to_string()),
        }
    }
}

impl From<String> for Field {
    fn from(identifier: String) -> Self {
        Self::from(identifier.as_str())
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// Parse a resolved fields value into a field list.
///
/// # Errors
///
/// Fails with [`Error::InvalidFieldList`] when the value is not a list of
/// string identifiers.
pub(crate) fn field_list(value: &Value) -> Result<Vec<Field>, Error> {
    let Some(items) = value.as_array() else {
        return Err(Error::InvalidFieldList(format!(
            "fields must be a list, got {value}"
        )));
    };

    items
        .iter()
        .map(|item| {
            item.as_str().map(Field::from).ok_or_else(|| {
                Error::InvalidFieldList(format!("field identifiers must be strings, got {item}"))
            })
        })
        .collect()
}

/// Ordered, case-indifferent data extracted from one message.
///
/// Produced fresh per delivery attempt; the source message is never
/// mutated. Serializes as a map in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeliveryData {
    entries: Vec<(String, Value)>,
}

impl DeliveryData {
    /// An empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under `key`, replacing a case-insensitive match.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        if let Some(entry) = self
            .entries
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(&key))
        {
            entry.1 = value;
        } else {
            self.entries.push((key, value));
        }
    }

    /// Look up `key`, ignoring ASCII case.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(key))
            .map(|(_, value)| value)
    }

    /// Whether `key` is present, ignoring ASCII case.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_str(), value))
    }

    /// Convert into a JSON map, preserving insertion order.
    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Object(self.entries.into_iter().collect())
    }
}

impl Serialize for DeliveryData {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Extract `fields` from `message`, merging `defaults` underneath.
///
/// Values actually present in the message win; keys only present in the
/// defaults pass through unchanged. Absent parts, headers and empty
/// address lists are omitted rather than stored as nulls, so a default for
/// such a key survives.
///
/// # Errors
///
/// Fails with [`Error::InvalidDefaults`] when `defaults` is present and
/// not a map.
pub fn extract<M: Message + ?Sized>(
    message: &M,
    fields: &[Field],
    defaults: Option<&Value>,
) -> Result<DeliveryData, Error> {
    let defaults = match defaults {
        None | Some(Value::Null) => None,
        Some(Value::Object(map)) => Some(map),
        Some(other) => {
            return Err(Error::InvalidDefaults(format!(
                "defaults must be a map, got {other}"
            )));
        }
    };

    let mut data = DeliveryData::new();
    for field in fields {
        match field {
            Field::From => insert_addresses(&mut data, "from", message.from()),
            Field::To => insert_addresses(&mut data, "to", message.to()),
            Field::Cc => insert_addresses(&mut data, "cc", message.cc()),
            Field::Bcc => insert_addresses(&mut data, "bcc", message.bcc()),
            Field::Subject => insert_text(&mut data, "subject", message.subject()),
            Field::Body => insert_text(&mut data, "body", message.body()),
            Field::TextPart => insert_text(&mut data, "text_part", message.text_part()),
            Field::HtmlPart => insert_text(&mut data, "html_part", message.html_part()),
            Field::Attachments => {
                let attachments = message.attachments();
                if !attachments.is_empty() {
                    data.insert(
                        "attachments",
                        Value::Array(attachments.iter().map(attachment_value).collect()),
                    );
                }
            }
            Field::Message => data.insert("message", Value::String(message.source())),
            Field::Header(name) => {
                if let Some(value) = message.header(name) {
                    data.insert(name.clone(), value);
                }
            }
        }
    }

    if let Some(defaults) = defaults {
        for (key, value) in defaults {
            if !data.contains(key) {
                data.insert(key.clone(), value.clone());
            }
        }
    }

    Ok(data)
}

fn insert_addresses(data: &mut DeliveryData, key: &str, addresses: Vec<String>) {
    if !addresses.is_empty() {
        data.insert(
            key,
            Value::Array(addresses.into_iter().map(Value::String).collect()),
        );
    }
}

fn insert_text(data: &mut DeliveryData, key: &str, value: Option<String>) {
    if let Some(value) = value {
        data.insert(key, Value::String(value));
    }
}

fn attachment_value(attachment: &Attachment) -> Value {
    let mut descriptor = serde_json::Map::new();
    descriptor.insert(
        "filename".to_string(),
        Value::String(attachment.filename.clone()),
    );
    descriptor.insert(
        "type".to_string(),
        Value::String(attachment.mime_type.clone()),
    );
    descriptor.insert(
        "content".to_string(),
        Value::String(BASE64.encode(&attachment.content)),
    );
    if attachment.inline {
        if let Some(content_id) = &attachment.content_id {
            descriptor.insert("cid".to_string(), Value::String(content_id.clone()));
        }
    }

    Value::Object(descriptor)
}
