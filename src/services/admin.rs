//! Admin Identity Service
//!
//! Owns the single admin credential record, the session-token set, and the
//! password-reset-token set, each in its own file under `<data>/secure/`.
//! All mutating operations hold the service lock for the full
//! load-mutate-save cycle; reads go straight to the store and rely on
//! atomic saves for consistency.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{Duration, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::path::Path;
use tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::models::{AdminCredentials, AdminSession, PasswordResetToken};
use crate::services::notify::Notifier;
use crate::store::DurableStore;

/// Session lifetime in hours
const SESSION_EXPIRY_HOURS: i64 = 24;

/// Reset-token lifetime in minutes
const RESET_TOKEN_EXPIRY_MINUTES: i64 = 15;

const SESSION_TOKEN_BYTES: usize = 32;
const RESET_TOKEN_BYTES: usize = 16;
const SALT_BYTES: usize = 16;

/// Length of the short code sent over SMS, taken from the front of the
/// reset token.
const SMS_CODE_LEN: usize = 6;

/// How a password-reset request should be delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetMethod {
    Email,
    Sms,
}

pub struct AdminService {
    credentials: DurableStore,
    sessions: DurableStore,
    reset_tokens: DurableStore,
    lock: Mutex<()>,
}

impl AdminService {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        let secure = data_dir.as_ref().join("secure");
        Self {
            credentials: DurableStore::new(secure.join("admin_credentials.json")),
            sessions: DurableStore::new(secure.join("admin_sessions.json")),
            reset_tokens: DurableStore::new(secure.join("reset_tokens.json")),
            lock: Mutex::new(()),
        }
    }

    // ========================================================================
    // Initialization and credentials
    // ========================================================================

    pub async fn is_initialized(&self) -> bool {
        self.load_credentials()
            .await
            .map(|c| c.is_initialized)
            .unwrap_or(false)
    }

    /// Create the one admin account. Returns `Ok(false)` without touching
    /// anything if an account already exists or username/password are empty.
    ///
    /// Password length policy is enforced at the boundary before this call.
    pub async fn initialize(
        &self,
        username: &str,
        password: &str,
        email: &str,
        phone_number: &str,
    ) -> Result<bool> {
        if username.is_empty() || password.is_empty() {
            return Ok(false);
        }

        let _guard = self.lock.lock().await;

        if self
            .load_credentials()
            .await
            .map(|c| c.is_initialized)
            .unwrap_or(false)
        {
            return Ok(false);
        }

        let now = Utc::now();
        let salt = generate_salt();
        let credentials = AdminCredentials {
            username: username.to_string(),
            password_hash: hash_password(password, &salt),
            salt,
            email: email.to_string(),
            phone_number: phone_number.to_string(),
            created_at: now,
            last_modified: now,
            is_initialized: true,
        };

        self.credentials.save(&credentials).await?;
        tracing::info!("Admin account initialized for {}", username);
        Ok(true)
    }

    /// Case-insensitive username compare, exact hash compare. Never errors:
    /// missing or unreadable state is just a failed login.
    pub async fn validate_credentials(&self, username: &str, password: &str) -> bool {
        let Some(credentials) = self.load_credentials().await else {
            return false;
        };
        if !credentials.is_initialized {
            return false;
        }
        if !credentials.username.eq_ignore_ascii_case(username) {
            return false;
        }
        hash_password(password, &credentials.salt) == credentials.password_hash
    }

    pub async fn get_admin_info(&self) -> Option<AdminCredentials> {
        self.load_credentials().await
    }

    pub async fn update_admin_info(&self, email: &str, phone_number: &str) -> Result<bool> {
        let _guard = self.lock.lock().await;

        let Some(mut credentials) = self.load_credentials().await else {
            return Ok(false);
        };
        credentials.email = email.to_string();
        credentials.phone_number = phone_number.to_string();
        credentials.last_modified = Utc::now();

        self.credentials.save(&credentials).await?;
        Ok(true)
    }

    // ========================================================================
    // Sessions
    // ========================================================================

    /// Mint a session token for `username`, valid for 24 hours.
    ///
    /// A username holds at most one live session: any prior sessions for the
    /// same name are evicted here, along with every expired session. Two
    /// concurrent logins therefore invalidate each other; that is intended,
    /// and keeps the session file from growing without bound.
    pub async fn generate_session_token(&self, username: &str) -> Result<String> {
        let now = Utc::now();
        let token = random_token(SESSION_TOKEN_BYTES);
        let session = AdminSession {
            session_token: token.clone(),
            username: username.to_string(),
            expires_at: now + Duration::hours(SESSION_EXPIRY_HOURS),
        };

        let _guard = self.lock.lock().await;

        let mut sessions: Vec<AdminSession> = self.sessions.load().await.unwrap_or_default();
        sessions.retain(|s| s.username != username && s.expires_at >= now);
        sessions.push(session);
        self.sessions.save(&sessions).await?;

        Ok(token)
    }

    /// True iff a session with this exact token exists and has not expired.
    pub async fn validate_session_token(&self, token: &str) -> bool {
        let now = Utc::now();
        let sessions: Vec<AdminSession> = self.sessions.load().await.unwrap_or_default();
        sessions
            .iter()
            .any(|s| s.session_token == token && s.expires_at > now)
    }

    /// Session check for boundary layers gating mutating routes: same test
    /// as `validate_session_token`, but a missing, expired, or unknown
    /// token surfaces as `Error::Unauthorized` instead of a bare `false`.
    pub async fn require_session_token(&self, token: &str) -> Result<()> {
        if self.validate_session_token(token).await {
            Ok(())
        } else {
            Err(Error::Unauthorized)
        }
    }

    // ========================================================================
    // Password reset
    // ========================================================================

    /// Mint a reset token for `username`, valid for 15 minutes. Expired
    /// tokens are pruned as a side effect of every call.
    pub async fn generate_password_reset_token(&self, username: &str) -> Result<String> {
        let now = Utc::now();
        let token = random_token(RESET_TOKEN_BYTES);
        let request = PasswordResetToken {
            reset_token: token.clone(),
            username: username.to_string(),
            expires_at: now + Duration::minutes(RESET_TOKEN_EXPIRY_MINUTES),
        };

        let _guard = self.lock.lock().await;

        let mut tokens: Vec<PasswordResetToken> =
            self.reset_tokens.load().await.unwrap_or_default();
        tokens.retain(|t| t.expires_at >= now);
        tokens.push(request);
        self.reset_tokens.save(&tokens).await?;

        Ok(token)
    }

    pub async fn validate_reset_token(&self, token: &str) -> bool {
        let now = Utc::now();
        let tokens: Vec<PasswordResetToken> = self.reset_tokens.load().await.unwrap_or_default();
        tokens
            .iter()
            .any(|t| t.reset_token == token && t.expires_at > now)
    }

    /// Consume a reset token and set a new password.
    ///
    /// `Ok(false)` when no unexpired token matches or no credential record
    /// exists; callers report that as a generic "invalid or expired" result.
    /// On success the token is deleted, so a second call with the same token
    /// fails.
    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<bool> {
        let now = Utc::now();
        let _guard = self.lock.lock().await;

        let mut tokens: Vec<PasswordResetToken> =
            self.reset_tokens.load().await.unwrap_or_default();
        let Some(pos) = tokens
            .iter()
            .position(|t| t.reset_token == token && t.expires_at > now)
        else {
            return Ok(false);
        };

        let Some(mut credentials) = self.load_credentials().await else {
            return Ok(false);
        };

        let salt = generate_salt();
        credentials.password_hash = hash_password(new_password, &salt);
        credentials.salt = salt;
        credentials.last_modified = now;
        self.credentials.save(&credentials).await?;

        tokens.remove(pos);
        self.reset_tokens.save(&tokens).await?;

        tracing::info!("Admin password reset completed");
        Ok(true)
    }

    /// Mint a reset token and dispatch it via the notifier.
    ///
    /// The token mutation completes (and is durable) before any network
    /// send, and the send happens outside the service lock. Email carries
    /// the full token; SMS carries a short uppercase code cut from its
    /// front. Delivery failure surfaces as `Error::Notification`.
    pub async fn request_password_reset(
        &self,
        method: ResetMethod,
        notifier: &dyn Notifier,
        reset_url_base: &str,
    ) -> Result<()> {
        let admin = self
            .get_admin_info()
            .await
            .filter(|c| c.is_initialized)
            .ok_or(Error::NotFound)?;

        let contact_missing = match method {
            ResetMethod::Email => admin.email.trim().is_empty(),
            ResetMethod::Sms => admin.phone_number.trim().is_empty(),
        };
        if contact_missing {
            return Err(Error::Validation(
                "No valid contact method configured".to_string(),
            ));
        }

        let token = self.generate_password_reset_token(&admin.username).await?;

        let delivered = match method {
            ResetMethod::Email => {
                notifier
                    .send_password_reset_email(&admin.email, &token, reset_url_base)
                    .await
            }
            ResetMethod::Sms => {
                let code: String = token.chars().take(SMS_CODE_LEN).collect::<String>();
                notifier
                    .send_password_reset_sms(&admin.phone_number, &code.to_uppercase())
                    .await
            }
        };

        if delivered {
            Ok(())
        } else {
            let channel = match method {
                ResetMethod::Email => "email",
                ResetMethod::Sms => "sms",
            };
            Err(Error::Notification(format!(
                "reset {} could not be delivered",
                channel
            )))
        }
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    async fn load_credentials(&self) -> Option<AdminCredentials> {
        self.credentials.load().await
    }
}

fn random_token(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::rng().fill_bytes(&mut bytes);
    BASE64.encode(&bytes)
}

fn generate_salt() -> String {
    random_token(SALT_BYTES)
}

/// SHA-256 over the password concatenated with the salt, base64-encoded.
fn hash_password(password: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hasher.update(salt.as_bytes());
    BASE64.encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::Mutex as StdMutex;

    fn temp_data_dir() -> PathBuf {
        std::env::temp_dir().join(format!("portfolio-admin-{}", uuid::Uuid::new_v4()))
    }

    async fn initialized_service() -> AdminService {
        let service = AdminService::new(temp_data_dir());
        let created = service
            .initialize("alice", "correct horse", "alice@example.com", "+15550100")
            .await
            .unwrap();
        assert!(created);
        service
    }

    #[test]
    fn test_hash_is_deterministic_and_salt_sensitive() {
        let a = hash_password("secret", "salt-one");
        let b = hash_password("secret", "salt-one");
        let c = hash_password("secret", "salt-two");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[tokio::test]
    async fn test_initialize_rejects_empty_username_or_password() {
        let service = AdminService::new(temp_data_dir());
        assert!(!service.initialize("", "password123", "", "").await.unwrap());
        assert!(!service.initialize("alice", "", "", "").await.unwrap());
        assert!(!service.is_initialized().await);
    }

    #[tokio::test]
    async fn test_initialize_is_one_shot() {
        let service = initialized_service().await;
        assert!(service.is_initialized().await);

        let again = service
            .initialize("mallory", "other password", "", "")
            .await
            .unwrap();
        assert!(!again);

        // The original account must be untouched
        assert!(service.validate_credentials("alice", "correct horse").await);
    }

    #[tokio::test]
    async fn test_validate_credentials_username_case_insensitive() {
        let service = initialized_service().await;
        assert!(service.validate_credentials("ALICE", "correct horse").await);
        assert!(service.validate_credentials("Alice", "correct horse").await);
        assert!(!service.validate_credentials("alice", "wrong").await);
        assert!(!service.validate_credentials("bob", "correct horse").await);
    }

    #[tokio::test]
    async fn test_validate_credentials_without_state_is_false() {
        let service = AdminService::new(temp_data_dir());
        assert!(!service.validate_credentials("alice", "anything").await);
    }

    #[tokio::test]
    async fn test_session_token_validates_until_superseded() {
        let service = initialized_service().await;

        let first = service.generate_session_token("alice").await.unwrap();
        assert!(service.validate_session_token(&first).await);

        // A second login evicts the first session
        let second = service.generate_session_token("alice").await.unwrap();
        assert!(!service.validate_session_token(&first).await);
        assert!(service.validate_session_token(&second).await);
    }

    #[tokio::test]
    async fn test_sessions_for_other_usernames_survive() {
        let service = initialized_service().await;
        let alice = service.generate_session_token("alice").await.unwrap();
        let bob = service.generate_session_token("bob").await.unwrap();
        assert!(service.validate_session_token(&alice).await);
        assert!(service.validate_session_token(&bob).await);
    }

    #[tokio::test]
    async fn test_require_session_token_gates_on_validity() {
        let service = initialized_service().await;

        let token = service.generate_session_token("alice").await.unwrap();
        assert!(service.require_session_token(&token).await.is_ok());
        assert!(matches!(
            service.require_session_token("no-such-token").await,
            Err(Error::Unauthorized)
        ));

        // Superseded by a new login
        let _second = service.generate_session_token("alice").await.unwrap();
        assert!(matches!(
            service.require_session_token(&token).await,
            Err(Error::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn test_expired_session_is_rejected_and_pruned() {
        let data_dir = temp_data_dir();
        let service = AdminService::new(&data_dir);

        // Seed an already-expired session directly into the backing file
        let stale = AdminSession {
            session_token: "stale-token".to_string(),
            username: "alice".to_string(),
            expires_at: Utc::now() - Duration::hours(1),
        };
        DurableStore::new(data_dir.join("secure").join("admin_sessions.json"))
            .save(&vec![stale])
            .await
            .unwrap();

        assert!(!service.validate_session_token("stale-token").await);

        // Any new issuance sweeps expired sessions out of the file
        let _fresh = service.generate_session_token("bob").await.unwrap();
        let sessions: Vec<AdminSession> =
            DurableStore::new(data_dir.join("secure").join("admin_sessions.json"))
                .load()
                .await
                .unwrap();
        assert!(sessions.iter().all(|s| s.session_token != "stale-token"));
    }

    #[tokio::test]
    async fn test_reset_token_is_single_use() {
        let service = initialized_service().await;

        let token = service
            .generate_password_reset_token("alice")
            .await
            .unwrap();
        assert!(service.validate_reset_token(&token).await);

        assert!(service.reset_password(&token, "newpass123").await.unwrap());
        assert!(service.validate_credentials("alice", "newpass123").await);
        assert!(!service.validate_credentials("alice", "correct horse").await);

        // Consumed: the same token cannot reset again
        assert!(!service.reset_password(&token, "another pass").await.unwrap());
    }

    #[tokio::test]
    async fn test_reset_rotates_salt() {
        let service = initialized_service().await;
        let before = service.get_admin_info().await.unwrap();

        let token = service
            .generate_password_reset_token("alice")
            .await
            .unwrap();
        assert!(service.reset_password(&token, "newpass123").await.unwrap());

        let after = service.get_admin_info().await.unwrap();
        assert_ne!(before.salt, after.salt);
        assert_ne!(before.password_hash, after.password_hash);
        assert!(after.last_modified >= before.last_modified);
    }

    #[tokio::test]
    async fn test_reset_with_unknown_token_fails() {
        let service = initialized_service().await;
        assert!(!service
            .reset_password("no-such-token", "newpass123")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_expired_reset_tokens_are_pruned_on_generate() {
        let data_dir = temp_data_dir();
        let service = AdminService::new(&data_dir);

        let store = DurableStore::new(data_dir.join("secure").join("reset_tokens.json"));
        let expired = PasswordResetToken {
            reset_token: "expired-token".to_string(),
            username: "alice".to_string(),
            expires_at: Utc::now() - Duration::minutes(1),
        };
        store.save(&vec![expired]).await.unwrap();

        let _fresh = service
            .generate_password_reset_token("alice")
            .await
            .unwrap();

        let tokens: Vec<PasswordResetToken> = store.load().await.unwrap();
        assert_eq!(tokens.len(), 1);
        assert_ne!(tokens[0].reset_token, "expired-token");
    }

    #[tokio::test]
    async fn test_update_admin_info_refreshes_last_modified() {
        let service = initialized_service().await;
        let before = service.get_admin_info().await.unwrap();

        assert!(service
            .update_admin_info("new@example.com", "+15550199")
            .await
            .unwrap());

        let after = service.get_admin_info().await.unwrap();
        assert_eq!(after.email, "new@example.com");
        assert_eq!(after.phone_number, "+15550199");
        assert!(after.last_modified >= before.last_modified);
        // Credentials themselves are untouched
        assert_eq!(after.password_hash, before.password_hash);
    }

    #[tokio::test]
    async fn test_update_admin_info_without_account_fails() {
        let service = AdminService::new(temp_data_dir());
        assert!(!service.update_admin_info("a@b.c", "").await.unwrap());
    }

    #[derive(Default)]
    struct RecordingNotifier {
        emails: StdMutex<Vec<(String, String)>>,
        sms: StdMutex<Vec<(String, String)>>,
        fail: bool,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send_password_reset_email(
            &self,
            email: &str,
            reset_token: &str,
            _reset_url_base: &str,
        ) -> bool {
            self.emails
                .lock()
                .unwrap()
                .push((email.to_string(), reset_token.to_string()));
            !self.fail
        }

        async fn send_password_reset_sms(&self, phone_number: &str, reset_code: &str) -> bool {
            self.sms
                .lock()
                .unwrap()
                .push((phone_number.to_string(), reset_code.to_string()));
            !self.fail
        }
    }

    #[tokio::test]
    async fn test_request_reset_via_email_sends_usable_token() {
        let service = initialized_service().await;
        let notifier = RecordingNotifier::default();

        service
            .request_password_reset(
                ResetMethod::Email,
                &notifier,
                "https://example.com/admin/reset-password",
            )
            .await
            .unwrap();

        let emails = notifier.emails.lock().unwrap();
        assert_eq!(emails.len(), 1);
        assert_eq!(emails[0].0, "alice@example.com");
        let token = emails[0].1.clone();
        drop(emails);

        assert!(service.validate_reset_token(&token).await);
    }

    #[tokio::test]
    async fn test_request_reset_via_sms_sends_short_code() {
        let service = initialized_service().await;
        let notifier = RecordingNotifier::default();

        service
            .request_password_reset(ResetMethod::Sms, &notifier, "")
            .await
            .unwrap();

        let sms = notifier.sms.lock().unwrap();
        assert_eq!(sms.len(), 1);
        assert_eq!(sms[0].0, "+15550100");
        assert_eq!(sms[0].1.len(), SMS_CODE_LEN);
        assert_eq!(sms[0].1, sms[0].1.to_uppercase());
    }

    #[tokio::test]
    async fn test_request_reset_reports_delivery_failure() {
        let service = initialized_service().await;
        let notifier = RecordingNotifier {
            fail: true,
            ..Default::default()
        };

        let result = service
            .request_password_reset(ResetMethod::Email, &notifier, "")
            .await;
        assert!(matches!(result, Err(Error::Notification(_))));
    }

    #[tokio::test]
    async fn test_request_reset_rejects_blank_contact_for_channel() {
        let service = AdminService::new(temp_data_dir());
        assert!(service
            .initialize("alice", "correct horse", "", "  ")
            .await
            .unwrap());
        let notifier = RecordingNotifier::default();

        let email = service
            .request_password_reset(ResetMethod::Email, &notifier, "")
            .await;
        assert!(matches!(email, Err(Error::Validation(_))));

        let sms = service
            .request_password_reset(ResetMethod::Sms, &notifier, "")
            .await;
        assert!(matches!(sms, Err(Error::Validation(_))));

        // Nothing was dispatched and no token was minted
        assert!(notifier.emails.lock().unwrap().is_empty());
        assert!(notifier.sms.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_request_reset_without_account_is_not_found() {
        let service = AdminService::new(temp_data_dir());
        let notifier = RecordingNotifier::default();

        let result = service
            .request_password_reset(ResetMethod::Email, &notifier, "")
            .await;
        assert!(matches!(result, Err(Error::NotFound)));
        assert!(notifier.emails.lock().unwrap().is_empty());
    }
}
