//! Outbound notification port.
//!
//! The core never talks to SMTP or an SMS gateway directly; the host
//! application supplies an implementation of this trait. Both calls are
//! best-effort and report delivery failure as `false` so the caller can
//! surface it instead of silently swallowing it.

use async_trait::async_trait;

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send a password-reset link. `reset_url_base` is the page the token
    /// gets appended to, e.g. `https://example.com/admin/reset-password`.
    async fn send_password_reset_email(
        &self,
        email: &str,
        reset_token: &str,
        reset_url_base: &str,
    ) -> bool;

    /// Send a short reset code over SMS.
    async fn send_password_reset_sms(&self, phone_number: &str, reset_code: &str) -> bool;
}

/// Development fallback: logs the message that would have been sent and
/// reports success, so reset flows stay testable without SMTP or Twilio
/// credentials configured.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_password_reset_email(
        &self,
        email: &str,
        reset_token: &str,
        reset_url_base: &str,
    ) -> bool {
        tracing::info!(
            "Email would be sent to {}: reset link {}?token={}",
            email,
            reset_url_base,
            reset_token
        );
        true
    }

    async fn send_password_reset_sms(&self, phone_number: &str, reset_code: &str) -> bool {
        tracing::info!(
            "SMS would be sent to {}: reset code {}",
            phone_number,
            reset_code
        );
        true
    }
}
