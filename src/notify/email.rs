use anyhow::{anyhow, Context, Result};
use lettre::message::{header, Mailbox, Message, MultiPart, SinglePart};
use lettre::transport::smtp::{authentication::Credentials, AsyncSmtpTransport};
use lettre::{AsyncTransport, Tokio1Executor};

use super::{MessageTransport, OutgoingMessage};
use crate::config::smtp::{SmtpSettings, SmtpTls};

pub struct SmtpTransport {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpTransport {
    /// Build from resolved settings (secrets already pulled from the environment).
    pub fn from_settings(cfg: &SmtpSettings) -> Result<Self> {
        let creds = Credentials::new(cfg.username.clone(), cfg.password.clone());
        let mut builder = match cfg.tls {
            SmtpTls::Implicit => AsyncSmtpTransport::<Tokio1Executor>::relay(&cfg.host),
            SmtpTls::Starttls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&cfg.host),
        }
        .with_context(|| format!("invalid SMTP host {}", cfg.host))?
        .credentials(creds);
        if let Some(port) = cfg.port {
            builder = builder.port(port);
        }

        let from_raw = if cfg.from.trim().is_empty() {
            cfg.username.as_str()
        } else {
            cfg.from.as_str()
        };
        let from: Mailbox = from_raw
            .parse()
            .with_context(|| format!("invalid sender address {from_raw}"))?;

        Ok(Self {
            mailer: builder.build(),
            from,
        })
    }

    fn build_message(&self, msg: &OutgoingMessage) -> Result<Message> {
        if msg.recipients.is_empty() {
            return Err(anyhow!("no recipients"));
        }
        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(msg.subject.clone());
        for rcpt in &msg.recipients {
            let mb: Mailbox = rcpt
                .parse()
                .with_context(|| format!("invalid recipient {rcpt}"))?;
            builder = builder.to(mb);
        }

        let email = match &msg.html {
            Some(html) => builder.multipart(MultiPart::alternative_plain_html(
                msg.text.clone(),
                html.clone(),
            )),
            None => builder.singlepart(
                SinglePart::builder()
                    .header(header::ContentType::TEXT_PLAIN)
                    .body(msg.text.clone()),
            ),
        }
        .context("build email")?;
        Ok(email)
    }
}

#[async_trait::async_trait]
impl MessageTransport for SmtpTransport {
    async fn send(&self, msg: &OutgoingMessage) -> Result<()> {
        let email = self.build_message(msg)?;
        self.mailer.send(email).await.context("send email")?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "smtp"
    }
}
