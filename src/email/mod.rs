pub mod templates;

use async_trait::async_trait;
use chrono::Duration;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::SmtpConfig;
use crate::reset::ResetNotifier;

pub struct SystemMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl SystemMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self, String> {
        let creds = Credentials::new(config.user.clone(), config.pass.clone());

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| format!("System SMTP error: {e}"))?
            .port(config.port)
            .credentials(creds)
            .build();

        Ok(Self {
            transport,
            from: config.from.clone(),
        })
    }

    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<(), String> {
        let message = Message::builder()
            .from(
                self.from
                    .parse()
                    .map_err(|e| format!("Invalid from address: {e}"))?,
            )
            .to(to.parse().map_err(|e| format!("Invalid to address: {e}"))?)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html_body.to_string())
            .map_err(|e| format!("Failed to build email: {e}"))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| format!("Failed to send email: {e}"))?;

        Ok(())
    }
}

#[async_trait]
impl ResetNotifier for SystemMailer {
    fn name(&self) -> &str {
        "smtp"
    }

    async fn send_reset_code(
        &self,
        to_email: &str,
        to_name: &str,
        code: &str,
        valid_for: Duration,
    ) -> Result<(), String> {
        let html =
            templates::render_password_reset_code(to_name, code, valid_for.num_minutes().max(1))
                .map_err(|e| format!("Failed to render reset email: {e}"))?;
        self.send(to_email, "Your BloodLine password reset code", &html)
            .await
    }
}
