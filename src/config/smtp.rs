// src/config/smtp.rs
use serde::{Deserialize, Serialize};

fn default_host() -> String {
    "smtp.gmail.com".to_string()
}
fn env_marker() -> String {
    "ENV".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SmtpTls {
    /// TLS from the first byte (port 465).
    #[default]
    Implicit,
    /// Plain connection upgraded with STARTTLS (port 587).
    Starttls,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct SmtpSettings {
    #[serde(default = "default_host")]
    pub host: String,
    /// Defaults to the TLS mode's standard port.
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub tls: SmtpTls,
    /// "ENV" means: read from SMTP_USER.
    #[serde(default = "env_marker")]
    pub username: String,
    /// "ENV" means: read from SMTP_PASS.
    #[serde(default = "env_marker")]
    pub password: String,
    /// Sender mailbox, e.g. "Noticias <bot@example.com>". Empty means the username.
    #[serde(default)]
    pub from: String,
}

impl Default for SmtpSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: None,
            tls: SmtpTls::default(),
            username: env_marker(),
            password: env_marker(),
            from: String::new(),
        }
    }
}

// Hand-written so the password never reaches a log line.
impl std::fmt::Debug for SmtpSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("tls", &self.tls)
            .field("username", &self.username)
            .field("password_len", &self.password.len())
            .field("from", &self.from)
            .finish()
    }
}
