//! Shared doubles for the integration suite.
#![allow(dead_code)] // Test utility module - not all items used in every test

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use mailmux::{ApiClient, Attachment, BoxError, ClientFactory, DeliveryData, Message, SmtpSettings};
use parking_lot::Mutex;
use serde_json::Value;

/// A settable message double whose send capability records instead of
/// sending.
#[derive(Debug, Default, Clone)]
pub struct TestMessage {
    pub from: Vec<String>,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub subject: Option<String>,
    pub body: Option<String>,
    pub text: Option<String>,
    pub html: Option<String>,
    pub attachments: Vec<Attachment>,
    pub headers: Vec<(String, Value)>,
    pub delivery_system: Option<String>,
    pub smtp_sends: Arc<Mutex<Vec<SmtpSettings>>>,
}

impl TestMessage {
    pub fn new() -> Self {
        Self {
            from: vec!["sender@example.com".to_string()],
            to: vec!["rcpt@example.com".to_string()],
            subject: Some("hello".to_string()),
            body: Some("body text".to_string()),
            ..Self::default()
        }
    }

    pub fn selecting(system: &str) -> Self {
        let mut message = Self::new();
        message.delivery_system = Some(system.to_string());
        message
    }

    pub fn smtp_send_count(&self) -> usize {
        self.smtp_sends.lock().len()
    }
}

impl Message for TestMessage {
    fn from(&self) -> Vec<String> {
        self.from.clone()
    }

    fn to(&self) -> Vec<String> {
        self.to.clone()
    }

    fn cc(&self) -> Vec<String> {
        self.cc.clone()
    }

    fn bcc(&self) -> Vec<String> {
        self.bcc.clone()
    }

    fn subject(&self) -> Option<String> {
        self.subject.clone()
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
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.clone())
    }

    fn delivery_system(&self) -> Option<String> {
        self.delivery_system.clone()
    }

    fn source(&self) -> String {
        format!(
            "From: {}\r\nSubject: {}\r\n\r\n{}",
            self.from.join(", "),
            self.subject.clone().unwrap_or_default(),
            self.body.clone().unwrap_or_default()
        )
    }

    fn smtp_send(&self, settings: &SmtpSettings) -> Result<(), mailmux::Error> {
        self.smtp_sends.lock().push(settings.clone());
        Ok(())
    }
}

/// A client double that records construction data and deliveries.
#[derive(Debug)]
pub struct RecordingClient {
    pub data: DeliveryData,
    deliveries: Arc<AtomicUsize>,
    response: Value,
}

impl ApiClient for RecordingClient {
    fn deliver(&self) -> Result<Value, BoxError> {
        self.deliveries.fetch_add(1, Ordering::SeqCst);
        Ok(self.response.clone())
    }
}

/// A factory handing out [`RecordingClient`]s, plus handles observing what
/// they saw.
pub struct Recorder {
    pub constructed: Arc<Mutex<Vec<DeliveryData>>>,
    pub deliveries: Arc<AtomicUsize>,
}

impl Recorder {
    pub fn new() -> Self {
        Self {
            constructed: Arc::new(Mutex::new(Vec::new())),
            deliveries: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn factory(&self, response: Value) -> ClientFactory {
        let constructed = Arc::clone(&self.constructed);
        let deliveries = Arc::clone(&self.deliveries);
        ClientFactory::new(move |data| {
            constructed.lock().push(data.clone());
            Ok(Box::new(RecordingClient {
                data,
                deliveries: Arc::clone(&deliveries),
                response: response.clone(),
            }) as Box<dyn ApiClient>)
        })
    }

    pub fn delivery_count(&self) -> usize {
        self.deliveries.load(Ordering::SeqCst)
    }
}
