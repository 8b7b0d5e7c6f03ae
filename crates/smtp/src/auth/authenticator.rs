/*
 * SPDX-FileCopyrightText: 2024 A3Mailer Project
 *
 * SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-SEL
 */

//! Ties the SASL decoders, the rate limiter, the directory and the OAuth2
//! validator into the single ordered policy spec §4.1 describes.

use std::sync::Arc;

use chrono::Utc;
use directory::{model::normalize_email, AuthMechanism, AuthResult, LoginFailureReason, Repository, User, UserStatus};
use store::RateLimiting;

use common::sasl::{decode_oauthbearer, decode_plain, decode_xoauth2, step_login, LoginState, LoginStep};
use common::TrustConfig;

use super::oauth2::TokenValidator;

/// What's being verified for a given identity: a password, or a bearer
/// token to hand to the [`TokenValidator`].
enum Credential {
    Password(String),
    OAuthToken(String),
}

/// Outcome of one step of the LOGIN mechanism's state machine (spec
/// §4.1's `AuthenticateLoginStep`).
pub enum LoginStepOutcome {
    /// Send this (already base64-ready) challenge back to the client.
    Challenge(Vec<u8>),
    Success(AuthResult),
    Failure(trc::Error),
}

pub struct Authenticator {
    repo: Arc<dyn Repository>,
    limiter: Arc<dyn RateLimiting>,
    validator: Arc<dyn TokenValidator>,
    config: Arc<TrustConfig>,
}

impl Authenticator {
    pub fn new(
        repo: Arc<dyn Repository>,
        limiter: Arc<dyn RateLimiting>,
        validator: Arc<dyn TokenValidator>,
        config: Arc<TrustConfig>,
    ) -> Self {
        Self {
            repo,
            limiter,
            validator,
            config,
        }
    }

    /// `AuthenticatePlain` (spec §4.1).
    pub async fn authenticate_plain(
        &self,
        payload: &[u8],
        client_ip: &str,
        is_tls: bool,
    ) -> Result<AuthResult, trc::Error> {
        let Some(creds) = decode_plain(payload) else {
            return Err(trc::AuthEvent::InvalidCredentials.into_err().details("malformed PLAIN payload"));
        };
        self.authenticate(
            &creds.authentication_id,
            Credential::Password(creds.password),
            client_ip,
            is_tls,
            AuthMechanism::Plain,
        )
        .await
    }

    /// `AuthenticateXOAuth2` (spec §4.1).
    pub async fn authenticate_xoauth2(
        &self,
        payload: &[u8],
        client_ip: &str,
        is_tls: bool,
    ) -> Result<AuthResult, trc::Error> {
        let Some(creds) = decode_xoauth2(payload) else {
            return Err(trc::AuthEvent::InvalidCredentials.into_err().details("malformed XOAUTH2 payload"));
        };
        self.authenticate(
            &creds.email,
            Credential::OAuthToken(creds.token),
            client_ip,
            is_tls,
            AuthMechanism::XOauth2,
        )
        .await
    }

    /// `AuthenticateOAuthBearer` (spec §4.1).
    pub async fn authenticate_oauthbearer(
        &self,
        payload: &[u8],
        client_ip: &str,
        is_tls: bool,
    ) -> Result<AuthResult, trc::Error> {
        let Some(creds) = decode_oauthbearer(payload) else {
            return Err(trc::AuthEvent::InvalidCredentials
                .into_err()
                .details("malformed OAUTHBEARER payload"));
        };
        self.authenticate(
            &creds.email,
            Credential::OAuthToken(creds.token),
            client_ip,
            is_tls,
            AuthMechanism::OauthBearer,
        )
        .await
    }

    /// `AuthenticateLoginStep` (spec §4.1): advances the caller-owned LOGIN
    /// state machine by one round. Only the final round performs the TLS
    /// gate, rate-limit check and credential verification; the first
    /// round only collects the username.
    pub async fn authenticate_login_step(
        &self,
        state: &mut LoginState,
        response: &[u8],
        client_ip: &str,
        is_tls: bool,
    ) -> LoginStepOutcome {
        match step_login(state, response) {
            LoginStep::Challenge(bytes) => LoginStepOutcome::Challenge(bytes),
            LoginStep::Invalid => {
                LoginStepOutcome::Failure(trc::AuthEvent::InvalidCredentials.into_err().details("empty LOGIN payload"))
            }
            LoginStep::Credentials { username, password } => {
                match self
                    .authenticate(&username, Credential::Password(password), client_ip, is_tls, AuthMechanism::Login)
                    .await
                {
                    Ok(result) => LoginStepOutcome::Success(result),
                    Err(err) => LoginStepOutcome::Failure(err),
                }
            }
        }
    }

    async fn authenticate(
        &self,
        identity: &str,
        credential: Credential,
        client_ip: &str,
        is_tls: bool,
        mechanism: AuthMechanism,
    ) -> Result<AuthResult, trc::Error> {
        if !is_tls {
            trc::event!(trc::EventType::Auth(trc::AuthEvent::TlsRequired));
            return Err(trc::AuthEvent::TlsRequired.into_err());
        }

        let email = normalize_email(identity);

        if self.limiter.is_blocked(&email, client_ip).await {
            self.record(None, &email, client_ip, mechanism, LoginFailureReason::RateLimited).await;
            return Err(trc::AuthEvent::RateLimited.into_err());
        }

        let user = match self.repo.get_user_by_email(&email).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                self.fail(&email, client_ip, mechanism, None, LoginFailureReason::UnknownIdentity).await;
                return Err(trc::AuthEvent::InvalidCredentials.into_err());
            }
            Err(e) => return Err(e),
        };

        if !user.status.can_authenticate() {
            let reason = if user.status == UserStatus::Pending {
                LoginFailureReason::AccountPending
            } else {
                LoginFailureReason::AccountDisabled
            };
            self.fail(&email, client_ip, mechanism, Some(&user.id), reason).await;
            return Err(trc::AuthEvent::AccountDisabled.into_err());
        }

        let now = Utc::now();
        if user.is_locked(now) {
            self.fail(&email, client_ip, mechanism, Some(&user.id), LoginFailureReason::AccountLocked)
                .await;
            return Err(trc::AuthEvent::AccountLocked.into_err());
        }

        match credential {
            Credential::Password(password) => self.verify_password_credential(&user, &password, &email, client_ip, mechanism).await,
            Credential::OAuthToken(token) => self.verify_oauth_credential(&user, &token, &email, client_ip, mechanism).await,
        }
    }

    async fn verify_password_credential(
        &self,
        user: &User,
        password: &str,
        email: &str,
        client_ip: &str,
        mechanism: AuthMechanism,
    ) -> Result<AuthResult, trc::Error> {
        let Some(hash) = &user.password_hash else {
            self.fail(email, client_ip, mechanism, Some(&user.id), LoginFailureReason::NoPasswordSet)
                .await;
            return Err(trc::AuthEvent::NoPassword.into_err());
        };
        if !directory::verify_password(password, hash) {
            self.fail(email, client_ip, mechanism, Some(&user.id), LoginFailureReason::WrongPassword)
                .await;
            return Err(trc::AuthEvent::InvalidCredentials.into_err());
        }
        self.succeed(user, email, client_ip, mechanism).await
    }

    async fn verify_oauth_credential(
        &self,
        user: &User,
        token: &str,
        email: &str,
        client_ip: &str,
        mechanism: AuthMechanism,
    ) -> Result<AuthResult, trc::Error> {
        let info = match self.validator.validate_token(token).await {
            Ok(info) => info,
            Err(e) => {
                let reason = if e.matches(trc::EventType::Oauth2(trc::Oauth2Event::ProviderError)) {
                    LoginFailureReason::OauthProviderError
                } else {
                    LoginFailureReason::InvalidOauthToken
                };
                self.fail(email, client_ip, mechanism, Some(&user.id), reason).await;
                // Propagate the validator's own typed failure (invalid-token,
                // token-expired, provider-error, unsupported-provider) rather
                // than collapsing it into the password-mechanism taxonomy.
                return Err(e);
            }
        };

        if info.email.to_lowercase() != email {
            self.fail(email, client_ip, mechanism, Some(&user.id), LoginFailureReason::OauthEmailMismatch)
                .await;
            return Err(trc::Oauth2Event::InvalidToken.into_err());
        }

        let _ = self.config.arc_authserv_id;
        self.succeed(user, email, client_ip, mechanism).await
    }

    async fn succeed(
        &self,
        user: &User,
        email: &str,
        client_ip: &str,
        mechanism: AuthMechanism,
    ) -> Result<AuthResult, trc::Error> {
        self.limiter.clear(email, client_ip).await;
        self.repo.update_login_success(&user.id).await?;
        let row = common::audit::success(Some(&user.id), email, client_ip, mechanism);
        common::audit::log(&row);
        self.repo.record_login_attempt(row).await?;
        trc::event!(trc::EventType::Auth(trc::AuthEvent::Success), identity = common::mask_email(email));

        Ok(AuthResult {
            user_id: user.id.clone(),
            org_id: user.org_id.clone(),
            email: email.to_string(),
            display_name: user.display_name.clone(),
            domain_id: domain_label(email),
        })
    }

    /// Increments both failure counters and, for password mechanisms,
    /// asks the repository to apply its own persistent lockout policy
    /// (spec §4.1 step 9).
    async fn fail(
        &self,
        email: &str,
        client_ip: &str,
        mechanism: AuthMechanism,
        user_id: Option<&str>,
        reason: LoginFailureReason,
    ) {
        self.limiter.record_failure(email, client_ip).await;
        if let (Some(uid), AuthMechanism::Plain | AuthMechanism::Login) = (user_id, mechanism) {
            let _ = self.repo.update_login_failure(uid, Utc::now()).await;
        }
        self.record(user_id, email, client_ip, mechanism, reason).await;
    }

    /// Records an audit row without touching the failure counters — used
    /// for the rate-limited case, which must not double-count itself.
    async fn record(
        &self,
        user_id: Option<&str>,
        email: &str,
        client_ip: &str,
        mechanism: AuthMechanism,
        reason: LoginFailureReason,
    ) {
        let row = common::audit::failure(user_id, email, client_ip, mechanism, reason);
        common::audit::log(&row);
        let _ = self.repo.record_login_attempt(row).await;
    }
}

fn domain_label(email: &str) -> String {
    email.rsplit('@').next().unwrap_or_default().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use directory::testing::MemoryDirectory;
    use directory::{User as DirUser, UserStatus as Status};
    use store::testing::MemoryRateLimiter;

    use super::super::oauth2::testing::StaticValidator;
    use super::super::oauth2::{Provider, TokenInfo};

    fn config() -> Arc<TrustConfig> {
        Arc::new(TrustConfig::default())
    }

    fn active_user(password_hash: Option<String>) -> DirUser {
        DirUser {
            id: "user-A".to_string(),
            org_id: "org-1".to_string(),
            display_name: "Alice".to_string(),
            status: Status::Active,
            password_hash,
            lock_expiry: None,
            failed_login_attempts: 0,
        }
    }

    fn hash_of(password: &str) -> String {
        pwhash::bcrypt::hash(password).unwrap()
    }

    fn fixture(directory: MemoryDirectory, validator: StaticValidator) -> Authenticator {
        Authenticator::new(
            Arc::new(directory),
            Arc::new(MemoryRateLimiter::new()),
            Arc::new(validator),
            config(),
        )
    }

    #[test]
    fn domain_label_extracts_host_part() {
        assert_eq!(domain_label("alice@example.com"), "example.com");
        assert_eq!(domain_label("no-at-sign"), "no-at-sign");
    }

    #[tokio::test]
    async fn tls_gate_rejects_before_any_lookup() {
        let directory = MemoryDirectory::new().with_user("alice@example.com", active_user(None));
        let auth = fixture(directory, StaticValidator::new());
        let err = auth
            .authenticate_plain(b"\x00alice@example.com\x00Secret1!", "203.0.113.1", false)
            .await
            .unwrap_err();
        assert!(err.matches(trc::EventType::Auth(trc::AuthEvent::TlsRequired)));
    }

    #[tokio::test]
    async fn successful_plain_login_clears_counters_and_records_audit() {
        let directory =
            MemoryDirectory::new().with_user("alice@example.com", active_user(Some(hash_of("Secret1!"))));
        let auth = fixture(directory, StaticValidator::new());
        let result = auth
            .authenticate_plain(b"\x00alice@example.com\x00Secret1!", "203.0.113.1", true)
            .await
            .unwrap();
        assert_eq!(result.user_id, "user-A");
        assert_eq!(result.domain_id, "example.com");
    }

    #[tokio::test]
    async fn wrong_password_is_invalid_credentials() {
        let directory =
            MemoryDirectory::new().with_user("alice@example.com", active_user(Some(hash_of("Secret1!"))));
        let auth = fixture(directory, StaticValidator::new());
        let err = auth
            .authenticate_plain(b"\x00alice@example.com\x00WrongPassword", "203.0.113.1", true)
            .await
            .unwrap_err();
        assert!(err.matches(trc::EventType::Auth(trc::AuthEvent::InvalidCredentials)));
    }

    #[tokio::test]
    async fn unknown_identity_is_invalid_credentials() {
        let directory = MemoryDirectory::new();
        let auth = fixture(directory, StaticValidator::new());
        let err = auth
            .authenticate_plain(b"\x00nobody@example.com\x00whatever", "203.0.113.1", true)
            .await
            .unwrap_err();
        assert!(err.matches(trc::EventType::Auth(trc::AuthEvent::InvalidCredentials)));
    }

    #[tokio::test]
    async fn account_without_password_hash_is_no_password() {
        let directory = MemoryDirectory::new().with_user("alice@example.com", active_user(None));
        let auth = fixture(directory, StaticValidator::new());
        let err = auth
            .authenticate_plain(b"\x00alice@example.com\x00Secret1!", "203.0.113.1", true)
            .await
            .unwrap_err();
        assert!(err.matches(trc::EventType::Auth(trc::AuthEvent::NoPassword)));
    }

    #[tokio::test]
    async fn locked_account_is_rejected() {
        let mut user = active_user(Some(hash_of("Secret1!")));
        user.lock_expiry = Some(Utc::now() + chrono::Duration::minutes(5));
        let directory = MemoryDirectory::new().with_user("alice@example.com", user);
        let auth = fixture(directory, StaticValidator::new());
        let err = auth
            .authenticate_plain(b"\x00alice@example.com\x00Secret1!", "203.0.113.1", true)
            .await
            .unwrap_err();
        assert!(err.matches(trc::EventType::Auth(trc::AuthEvent::AccountLocked)));
    }

    #[tokio::test]
    async fn disabled_account_is_rejected() {
        let mut user = active_user(Some(hash_of("Secret1!")));
        user.status = Status::Suspended;
        let directory = MemoryDirectory::new().with_user("alice@example.com", user);
        let auth = fixture(directory, StaticValidator::new());
        let err = auth
            .authenticate_plain(b"\x00alice@example.com\x00Secret1!", "203.0.113.1", true)
            .await
            .unwrap_err();
        assert!(err.matches(trc::EventType::Auth(trc::AuthEvent::AccountDisabled)));
    }

    #[tokio::test]
    async fn pending_account_is_rejected_with_its_own_audit_reason() {
        let mut user = active_user(Some(hash_of("Secret1!")));
        user.status = Status::Pending;
        let directory = Arc::new(MemoryDirectory::new().with_user("alice@example.com", user));
        let auth = Authenticator::new(
            directory.clone(),
            Arc::new(MemoryRateLimiter::new()),
            Arc::new(StaticValidator::new()),
            config(),
        );
        let err = auth
            .authenticate_plain(b"\x00alice@example.com\x00Secret1!", "203.0.113.1", true)
            .await
            .unwrap_err();
        assert!(err.matches(trc::EventType::Auth(trc::AuthEvent::AccountDisabled)));
        let attempts = directory.attempts.lock().unwrap();
        assert_eq!(attempts.last().unwrap().failure_reason, Some(LoginFailureReason::AccountPending));
    }

    #[tokio::test]
    async fn fifth_consecutive_failure_locks_the_account() {
        let directory =
            MemoryDirectory::new().with_user("alice@example.com", active_user(Some(hash_of("Secret1!"))));
        let directory = std::sync::Arc::new(directory);
        let auth = Authenticator::new(
            directory.clone(),
            Arc::new(MemoryRateLimiter::new()),
            Arc::new(StaticValidator::new()),
            config(),
        );
        for _ in 0..5 {
            let _ = auth
                .authenticate_plain(b"\x00alice@example.com\x00WrongPassword", "203.0.113.1", true)
                .await;
        }
        let user = directory.user("alice@example.com").unwrap();
        assert!(user.is_locked(Utc::now()));
    }

    #[tokio::test]
    async fn xoauth2_success_cross_checks_token_email() {
        let directory = MemoryDirectory::new().with_user("bob@example.com", active_user(None));
        let validator = StaticValidator::new().with_token(
            "tok-X",
            Ok(TokenInfo {
                email: "bob@example.com".to_string(),
                subject: "sub-1".to_string(),
                issuer: "accounts.google.com".to_string(),
                provider: Provider::Google,
                expires_at: 9_999_999_999,
            }),
        );
        let auth = fixture(directory, validator);
        let payload = common::sasl::encode_xoauth2("bob@example.com", "tok-X");
        let result = auth.authenticate_xoauth2(&payload, "203.0.113.1", true).await.unwrap();
        assert_eq!(result.user_id, "user-A");
    }

    #[tokio::test]
    async fn xoauth2_email_mismatch_is_rejected() {
        let directory = MemoryDirectory::new().with_user("bob@example.com", active_user(None));
        let validator = StaticValidator::new().with_token(
            "tok-X",
            Ok(TokenInfo {
                email: "someone-else@example.com".to_string(),
                subject: "sub-1".to_string(),
                issuer: "accounts.google.com".to_string(),
                provider: Provider::Google,
                expires_at: 9_999_999_999,
            }),
        );
        let auth = fixture(directory, validator);
        let payload = common::sasl::encode_xoauth2("bob@example.com", "tok-X");
        let err = auth.authenticate_xoauth2(&payload, "203.0.113.1", true).await.unwrap_err();
        assert!(err.matches(trc::EventType::Oauth2(trc::Oauth2Event::InvalidToken)));
    }

    #[tokio::test]
    async fn invalid_oauth_token_surfaces_the_validator_specific_error() {
        let directory = MemoryDirectory::new().with_user("bob@example.com", active_user(None));
        let validator = StaticValidator::new().with_token(
            "tok-expired",
            Err(trc::Oauth2Event::TokenExpired.into_err()),
        );
        let auth = fixture(directory, validator);
        let payload = common::sasl::encode_xoauth2("bob@example.com", "tok-expired");
        let err = auth.authenticate_xoauth2(&payload, "203.0.113.1", true).await.unwrap_err();
        assert!(err.matches(trc::EventType::Oauth2(trc::Oauth2Event::TokenExpired)));
    }

    #[tokio::test]
    async fn login_state_machine_reaches_success_on_second_round() {
        let directory =
            MemoryDirectory::new().with_user("alice@example.com", active_user(Some(hash_of("Secret1!"))));
        let auth = fixture(directory, StaticValidator::new());
        let mut state = LoginState::AwaitingUser;
        match auth.authenticate_login_step(&mut state, b"alice@example.com", "203.0.113.1", true).await {
            LoginStepOutcome::Challenge(c) => assert_eq!(c, b"Password:"),
            _ => panic!("expected challenge"),
        }
        match auth.authenticate_login_step(&mut state, b"Secret1!", "203.0.113.1", true).await {
            LoginStepOutcome::Success(result) => assert_eq!(result.user_id, "user-A"),
            LoginStepOutcome::Failure(e) => panic!("expected success, got {e}"),
            LoginStepOutcome::Challenge(_) => panic!("expected success, got another challenge"),
        }
    }
}
