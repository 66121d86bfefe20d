use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    Message, SmtpTransport, Transport,
};
use service_core::axum::async_trait;
use service_core::error::AppError;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::SmtpConfig;

pub const FORGOT_OTP_SUBJECT: &str = "Forgot Password OTP";

pub fn forgot_otp_body(otp: &str, expiry_minutes: i64) -> String {
    format!(
        "Please use this OTP below to change your password: {}. OTP only valid for {} minute. Do not share this to anyone.",
        otp, expiry_minutes
    )
}

#[async_trait]
pub trait EmailProvider: Send + Sync {
    async fn send_forgot_otp(
        &self,
        to_email: &str,
        otp: &str,
        expiry_minutes: i64,
    ) -> Result<(), AppError>;
}

#[derive(Clone)]
pub struct EmailService {
    mailer: SmtpTransport,
    from: Mailbox,
}

impl EmailService {
    pub fn new(config: &SmtpConfig) -> Result<Self, AppError> {
        let mailer = if config.username.is_empty() {
            // Unauthenticated relay, e.g. a local catch-all SMTP server
            SmtpTransport::builder_dangerous(config.host.as_str())
                .port(config.port)
                .timeout(Some(Duration::from_secs(10)))
                .build()
        } else {
            let creds = Credentials::new(config.username.clone(), config.password.clone());
            SmtpTransport::starttls_relay(&config.host)
                .map_err(|e| AppError::InternalError(anyhow::anyhow!(e.to_string())))?
                .credentials(creds)
                .port(config.port)
                .timeout(Some(Duration::from_secs(10)))
                .build()
        };

        let from = format!("{} <{}>", config.from_name, config.from_email)
            .parse::<Mailbox>()
            .map_err(|e| AppError::ConfigError(anyhow::anyhow!("Invalid SMTP sender: {}", e)))?;

        tracing::info!(host = %config.host, port = config.port, "Email service initialized");

        Ok(Self { mailer, from })
    }

    async fn send_email(&self, to_email: &str, subject: &str, body: &str) -> Result<(), AppError> {
        let email = Message::builder()
            .from(self.from.clone())
            .to(to_email
                .parse()
                .map_err(|e: lettre::address::AddressError| AppError::InternalError(e.into()))?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())?;

        // SmtpTransport is blocking
        let mailer = self.mailer.clone();
        let result = tokio::task::spawn_blocking(move || mailer.send(&email))
            .await
            .map_err(|e| AppError::InternalError(e.into()))?;

        match result {
            Ok(_) => {
                tracing::info!(to = %to_email, subject = %subject, "Email sent successfully");
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, to = %to_email, "Failed to send email");
                Err(AppError::EmailError(e.to_string()))
            }
        }
    }
}

#[async_trait]
impl EmailProvider for EmailService {
    async fn send_forgot_otp(
        &self,
        to_email: &str,
        otp: &str,
        expiry_minutes: i64,
    ) -> Result<(), AppError> {
        self.send_email(
            to_email,
            FORGOT_OTP_SUBJECT,
            &forgot_otp_body(otp, expiry_minutes),
        )
        .await
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SentEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Records outgoing mail instead of sending it.
#[derive(Clone, Default)]
pub struct MockEmailService {
    sent: Arc<Mutex<Vec<SentEmail>>>,
}

impl MockEmailService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<SentEmail> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl EmailProvider for MockEmailService {
    async fn send_forgot_otp(
        &self,
        to_email: &str,
        otp: &str,
        expiry_minutes: i64,
    ) -> Result<(), AppError> {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(SentEmail {
                to: to_email.to_string(),
                subject: FORGOT_OTP_SUBJECT.to_string(),
                body: forgot_otp_body(otp, expiry_minutes),
            });
        }
        Ok(())
    }
}
