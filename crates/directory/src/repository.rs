/*
 * SPDX-FileCopyrightText: 2024 A3Mailer Project
 *
 * SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-SEL
 */

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::model::User;

/// Why a login attempt failed, as recorded in the audit trail (spec §4.1,
/// §6). Distinct from [`trc::AuthEvent`]: this taxonomy is never sent to
/// the client, only ever written to the append-only log, so it may be as
/// granular as the underlying cause warrants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginFailureReason {
    UnknownIdentity,
    WrongPassword,
    NoPasswordSet,
    AccountLocked,
    AccountDisabled,
    AccountPending,
    RateLimited,
    InvalidOauthToken,
    OauthEmailMismatch,
    OauthProviderError,
    TlsRequired,
    Malformed,
}

/// The SASL mechanism used for a login attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum AuthMechanism {
    Plain,
    Login,
    XOauth2,
    OauthBearer,
}

impl std::fmt::Display for AuthMechanism {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AuthMechanism::Plain => "PLAIN",
            AuthMechanism::Login => "LOGIN",
            AuthMechanism::XOauth2 => "XOAUTH2",
            AuthMechanism::OauthBearer => "OAUTHBEARER",
        };
        f.write_str(s)
    }
}

impl AuthMechanism {
    /// Collapses the four wire mechanisms to the two-value method tag
    /// spec §3/§6 record on the audit row: password mechanisms are
    /// `smtp`, bearer-token mechanisms are `oauth2`.
    pub fn method(self) -> AuthMethod {
        match self {
            AuthMechanism::Plain | AuthMechanism::Login => AuthMethod::Smtp,
            AuthMechanism::XOauth2 | AuthMechanism::OauthBearer => AuthMethod::Oauth2,
        }
    }
}

/// The audited method tag (spec §3 "LoginAttempt": "method tag (smtp |
/// oauth2)"), derived from the wire mechanism rather than recorded
/// directly — the audit trail distinguishes password from bearer-token
/// logins, not PLAIN from LOGIN.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    Smtp,
    Oauth2,
}

/// One row of the append-only login audit trail (spec §3 "LoginAttempt",
/// §6). Never updated or deleted once written.
#[derive(Debug, Clone, serde::Serialize)]
pub struct LoginAttempt {
    pub user_id: Option<String>,
    pub masked_email: String,
    pub client_ip: String,
    pub method: AuthMethod,
    pub succeeded: bool,
    pub failure_reason: Option<LoginFailureReason>,
    pub occurred_at: DateTime<Utc>,
}

/// User lookup and mutation contract the authenticator depends on.
///
/// Implementations own the actual storage (SQL, LDAP, an in-memory map for
/// tests); the authenticator only ever talks to this trait, never to a
/// concrete backend, so the trust logic is storage-agnostic and testable
/// with a fake.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Resolves a verified email address to its owning user. Returns
    /// `Ok(None)` for an unknown or unverified address — never an error,
    /// since "no such user" is an expected outcome on the hot path, not a
    /// storage failure.
    async fn get_user_by_email(&self, email: &str) -> trc::Result<Option<User>>;

    /// Records one more consecutive failure and, if the threshold (spec
    /// §4.1: 5 consecutive failures) is reached, sets `lock_expiry` 15
    /// minutes into the future. Implementations must perform the read,
    /// increment and conditional lock as a single atomic unit against
    /// concurrent logins for the same user.
    async fn update_login_failure(&self, user_id: &str, now: DateTime<Utc>) -> trc::Result<()>;

    /// Resets `failed_login_attempts` to zero and clears `lock_expiry`.
    async fn update_login_success(&self, user_id: &str) -> trc::Result<()>;

    /// Appends one immutable row to the login audit trail.
    async fn record_login_attempt(&self, attempt: LoginAttempt) -> trc::Result<()>;
}
