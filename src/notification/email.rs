use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox, Message};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use tracing::info;

use crate::config::SmtpConfig;
use crate::models::Channel;
use crate::notification::NotificationProvider;

/// Email channel that only logs what it would send
#[derive(Debug, Default, Clone)]
pub struct LogEmailProvider;

#[async_trait]
impl NotificationProvider for LogEmailProvider {
    async fn send(&self, destination: &str, message: &str, subject: Option<&str>) -> Result<bool> {
        info!(
            to = destination,
            subject = subject.unwrap_or("(No Subject)"),
            body = message,
            "[LOG EMAIL] Sending email"
        );
        Ok(true)
    }

    fn channel(&self) -> Channel {
        Channel::Email
    }
}

/// Email channel delivering through an SMTP relay
pub struct SmtpEmailProvider {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpEmailProvider {
    pub fn new(config: &SmtpConfig) -> Result<Self> {
        let creds = Credentials::new(config.username.clone(), config.password.clone());

        // 1025: local catcher without TLS, 465: implicit TLS, otherwise STARTTLS
        let mailer = if config.port == 1025 {
            info!("Using insecure SMTP connection for port 1025 without TLS");
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.server)
                .port(config.port)
                .tls(Tls::None)
                .build()
        } else {
            let tls_params = TlsParameters::new(config.server.clone())
                .map_err(|e| anyhow!("Failed to create TLS parameters: {}", e))?;
            let tls = if config.port == 465 {
                info!("Using implicit TLS (SMTPS) for port 465");
                Tls::Wrapper(tls_params)
            } else {
                info!("Using STARTTLS for port {}", config.port);
                Tls::Required(tls_params)
            };
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.server)
                .context("Invalid SMTP server")?
                .port(config.port)
                .credentials(creds)
                .tls(tls)
                .build()
        };

        let from = Mailbox::new(
            Some(config.from_name.clone()),
            config
                .from_email
                .parse()
                .with_context(|| format!("Invalid FROM_EMAIL '{}'", config.from_email))?,
        );

        Ok(Self { mailer, from })
    }
}

#[async_trait]
impl NotificationProvider for SmtpEmailProvider {
    async fn send(&self, destination: &str, message: &str, subject: Option<&str>) -> Result<bool> {
        let email = Message::builder()
            .from(self.from.clone())
            .to(destination
                .parse()
                .with_context(|| format!("Invalid email address '{destination}'"))?)
            .subject(subject.unwrap_or("Notification"))
            .header(ContentType::TEXT_PLAIN)
            .body(message.to_string())?;

        let response = self.mailer.send(email).await?;
        info!(to = destination, code = %response.code(), "Email sent");
        Ok(response.is_positive())
    }

    fn channel(&self) -> Channel {
        Channel::Email
    }
}
