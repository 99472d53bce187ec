use lettre::{
    message::{header::ContentType, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    Message, SmtpTransport, Transport,
};
use std::fs;
use tera::{Context, Tera};

use crate::{
    config::EmailConfig,
    error::{ApiError, ApiResult},
};

/// The notification templates the workflows can trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateKind {
    OtpRegistration,
    OtpPasswordReset,
    ApprovalSubmitted,
    ApprovalApproved,
    ApprovalRejected,
}

impl TemplateKind {
    pub fn template_name(&self) -> &'static str {
        match self {
            TemplateKind::OtpRegistration => "otp_registration",
            TemplateKind::OtpPasswordReset => "otp_password_reset",
            TemplateKind::ApprovalSubmitted => "approval_submitted",
            TemplateKind::ApprovalApproved => "approval_approved",
            TemplateKind::ApprovalRejected => "approval_rejected",
        }
    }

    pub fn subject(&self) -> &'static str {
        match self {
            TemplateKind::OtpRegistration => "Seva Setu - Verify Your Registration",
            TemplateKind::OtpPasswordReset => "Seva Setu - Password Reset Request",
            TemplateKind::ApprovalSubmitted => "Seva Setu - Account Request Under Review",
            TemplateKind::ApprovalApproved => "Seva Setu - Account Clearance Granted",
            TemplateKind::ApprovalRejected => "Seva Setu - Account Request Update",
        }
    }

    fn all() -> [TemplateKind; 5] {
        [
            TemplateKind::OtpRegistration,
            TemplateKind::OtpPasswordReset,
            TemplateKind::ApprovalSubmitted,
            TemplateKind::ApprovalApproved,
            TemplateKind::ApprovalRejected,
        ]
    }
}

/// Sends templated notifications out of band. Delivery is best-effort from
/// the workflows' perspective: callers log failures and move on, a failed
/// send never rolls back the state transition that triggered it.
pub struct Notifier {
    config: EmailConfig,
    transport: SmtpTransport,
    templates: Tera,
}

impl Notifier {
    pub fn new(config: EmailConfig) -> ApiResult<Self> {
        let transport = if config.smtp_port == 587 {
            SmtpTransport::starttls_relay(&config.smtp_host)
                .map_err(|e| ApiError::Internal(format!("SMTP relay error: {}", e)))?
                .port(config.smtp_port)
                .credentials(Credentials::new(
                    config.smtp_username.clone(),
                    config.smtp_password.clone(),
                ))
                .build()
        } else {
            SmtpTransport::relay(&config.smtp_host)
                .map_err(|e| ApiError::Internal(format!("SMTP relay error: {}", e)))?
                .port(config.smtp_port)
                .credentials(Credentials::new(
                    config.smtp_username.clone(),
                    config.smtp_password.clone(),
                ))
                .build()
        };

        let mut tera = Tera::default();
        for kind in TemplateKind::all() {
            let name = kind.template_name();
            let path = format!("templates/{}.html", name);
            let raw = fs::read_to_string(&path)
                .map_err(|e| ApiError::Internal(format!("Failed to load template {}: {}", path, e)))?;
            tera.add_raw_template(name, &raw)
                .map_err(|e| ApiError::Internal(format!("Template engine error: {}", e)))?;
        }

        Ok(Self {
            config,
            transport,
            templates: tera,
        })
    }

    /// Render and deliver one notification. Returns an error the caller is
    /// expected to log and swallow.
    pub fn send(
        &self,
        recipient_email: &str,
        recipient_name: &str,
        kind: TemplateKind,
        context: &Context,
    ) -> ApiResult<()> {
        let html = self
            .templates
            .render(kind.template_name(), context)
            .map_err(|e| ApiError::Internal(format!("Template render error: {}", e)))?;
        let plain = strip_tags(&html);

        let from = format!("{} <{}>", self.config.from_name, self.config.from_email)
            .parse()
            .map_err(|e| ApiError::Internal(format!("Invalid from address: {}", e)))?;
        let to = format!("{} <{}>", recipient_name, recipient_email)
            .parse()
            .map_err(|e| ApiError::Internal(format!("Invalid to address: {}", e)))?;

        let email = Message::builder()
            .from(from)
            .to(to)
            .subject(kind.subject())
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(plain),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html),
                    ),
            )
            .map_err(|e| ApiError::Internal(format!("Email build error: {}", e)))?;

        self.transport
            .send(&email)
            .map_err(|e| ApiError::Internal(format!("Email send error: {}", e)))?;

        Ok(())
    }
}

fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_template_kind_has_a_name_and_subject() {
        for kind in TemplateKind::all() {
            assert!(!kind.template_name().is_empty());
            assert!(kind.subject().starts_with("Seva Setu"));
        }
    }

    #[test]
    fn strip_tags_keeps_text_content() {
        assert_eq!(strip_tags("<p>Hello <b>there</b></p>"), "Hello there");
        assert_eq!(strip_tags("no markup"), "no markup");
    }
}
