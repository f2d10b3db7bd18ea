//! Password-recovery mail delivery via SMTP.

use lettre::{
    message::header::ContentType, transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::config::MailConfig;

#[derive(Debug)]
pub enum MailError {
    Transport(lettre::transport::smtp::Error),
    Address(lettre::address::AddressError),
    Build(String),
}

impl std::fmt::Display for MailError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MailError::Transport(e) => write!(f, "SMTP transport error: {}", e),
            MailError::Address(e) => write!(f, "Email address parse error: {}", e),
            MailError::Build(e) => write!(f, "Email build error: {}", e),
        }
    }
}

impl std::error::Error for MailError {}

impl From<lettre::transport::smtp::Error> for MailError {
    fn from(e: lettre::transport::smtp::Error) -> Self {
        MailError::Transport(e)
    }
}

impl From<lettre::address::AddressError> for MailError {
    fn from(e: lettre::address::AddressError) -> Self {
        MailError::Address(e)
    }
}

/// Sends the plain-text password-recovery email containing the reset link.
pub struct Mailer {
    config: MailConfig,
}

impl Mailer {
    pub fn new(config: MailConfig) -> Self {
        Self { config }
    }

    pub async fn send_password_recovery(
        &self,
        to_email: &str,
        reset_link: &str,
    ) -> Result<(), MailError> {
        let body = format!(
            "You requested a password reset.\n\n\
             Follow this link to choose a new password:\n\n\
             {}\n\n\
             If you did not request this, ignore this email.",
            reset_link
        );

        let email = Message::builder()
            .from(self.config.from_address.parse()?)
            .to(to_email.parse()?)
            .subject("Password recovery")
            .header(ContentType::TEXT_PLAIN)
            .body(body)
            .map_err(|e| MailError::Build(e.to_string()))?;

        let mut builder =
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.smtp_host)?
                .port(self.config.smtp_port);

        if let (Some(user), Some(password)) =
            (&self.config.smtp_user, &self.config.smtp_password)
        {
            builder = builder.credentials(Credentials::new(user.clone(), password.clone()));
        }

        let transport = builder.build();
        transport.send(email).await?;
        Ok(())
    }
}
