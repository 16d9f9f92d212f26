// src/notify/mod.rs
pub mod email;

use anyhow::Result;
use std::sync::Mutex;

pub use email::SmtpTransport;

/// One outgoing digest, addressed to every recipient at once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub recipients: Vec<String>,
    pub subject: String,
    pub text: String,
    pub html: Option<String>,
}

#[async_trait::async_trait]
pub trait MessageTransport: Send + Sync {
    async fn send(&self, msg: &OutgoingMessage) -> Result<()>;
    fn name(&self) -> &'static str;
}

/// Dry-run transport: prints the plain-text message instead of sending it.
pub struct StdoutTransport;

#[async_trait::async_trait]
impl MessageTransport for StdoutTransport {
    async fn send(&self, msg: &OutgoingMessage) -> Result<()> {
        println!("To: {}", msg.recipients.join(", "));
        println!("Subject: {}\n", msg.subject);
        println!("{}", msg.text);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "stdout"
    }
}

// --- Test helper ---
pub struct RecordingTransport {
    pub sent: Mutex<Vec<OutgoingMessage>>,
    fail_with: Option<String>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(vec![]),
            fail_with: None,
        }
    }

    /// A transport whose every send fails with `reason`.
    pub fn failing(reason: &str) -> Self {
        Self {
            sent: Mutex::new(vec![]),
            fail_with: Some(reason.to_string()),
        }
    }

    pub fn messages(&self) -> Vec<OutgoingMessage> {
        self.sent.lock().expect("transport mutex poisoned").clone()
    }
}

impl Default for RecordingTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl MessageTransport for RecordingTransport {
    async fn send(&self, msg: &OutgoingMessage) -> Result<()> {
        if let Some(reason) = &self.fail_with {
            anyhow::bail!("{reason}");
        }
        self.sent
            .lock()
            .expect("transport mutex poisoned")
            .push(msg.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}
