/*
 * SPDX-FileCopyrightText: 2024 A3Mailer Project
 *
 * SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-SEL
 */

use chrono::{DateTime, Utc};

/// A user's account status (spec §3 "User").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserStatus {
    Active,
    Pending,
    Suspended,
    Deleted,
}

impl UserStatus {
    /// Only `Active` accounts may authenticate via any mechanism.
    pub fn can_authenticate(self) -> bool {
        matches!(self, UserStatus::Active)
    }
}

/// The subject of authentication.
///
/// Invariants (spec §3):
/// - a user without `password_hash` cannot authenticate via a password
///   mechanism;
/// - a user whose `status` is not `Active` cannot authenticate via any
///   mechanism;
/// - a user whose `lock_expiry` is in the future is locked.
#[derive(Debug, Clone)]
pub struct User {
    pub id: String,
    pub org_id: String,
    pub display_name: String,
    pub status: UserStatus,
    pub password_hash: Option<String>,
    pub lock_expiry: Option<DateTime<Utc>>,
    pub failed_login_attempts: u32,
}

impl User {
    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.lock_expiry.is_some_and(|expiry| expiry > now)
    }
}

/// A verified email address bound to a user (many-to-one).
///
/// Authentication accepts any verified address of any user; the address is
/// normalized to lowercase before lookup. Unverified addresses MUST NOT
/// resolve — the directory's `get_user_by_email` contract only returns
/// verified addresses, so there is deliberately no `verified` field here
/// for callers to accidentally ignore.
#[derive(Debug, Clone)]
pub struct EmailAddress {
    pub address: String,
    pub user_id: String,
}

/// Normalizes an email address for lookup: lowercase, ASCII-whitespace
/// trimmed (spec §4.1 step 4).
pub fn normalize_email(email: &str) -> String {
    email.trim_matches(|c: char| c.is_ascii_whitespace()).to_lowercase()
}

/// A DKIM/ARC signing key bound to a domain (spec §3 "DKIMKey").
#[derive(Clone)]
pub struct DkimKey {
    pub id: String,
    pub domain: String,
    pub selector: String,
    pub algorithm: SigningAlgorithm,
    pub private_key_pkcs8_der: Vec<u8>,
}

impl std::fmt::Debug for DkimKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DkimKey")
            .field("id", &self.id)
            .field("domain", &self.domain)
            .field("selector", &self.selector)
            .field("algorithm", &self.algorithm)
            .field("private_key_pkcs8_der", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigningAlgorithm {
    RsaSha256,
}

impl SigningAlgorithm {
    pub fn as_str(self) -> &'static str {
        match self {
            SigningAlgorithm::RsaSha256 => "rsa-sha256",
        }
    }
}

/// Returned to the SMTP session on successful authentication (spec §3
/// "AuthResult"). Owned by the in-flight session; discarded when the
/// connection closes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthResult {
    pub user_id: String,
    pub org_id: String,
    pub email: String,
    pub display_name: String,
    pub domain_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_lowercases_and_trims() {
        assert_eq!(normalize_email("  Alice@Example.COM  "), "alice@example.com");
    }

    #[test]
    fn lock_expiry_in_past_is_not_locked() {
        let user = User {
            id: "u1".into(),
            org_id: "o1".into(),
            display_name: "Alice".into(),
            status: UserStatus::Active,
            password_hash: None,
            lock_expiry: Some(Utc::now() - chrono::Duration::minutes(1)),
            failed_login_attempts: 5,
        };
        assert!(!user.is_locked(Utc::now()));
    }

    #[test]
    fn lock_expiry_in_future_is_locked() {
        let user = User {
            id: "u1".into(),
            org_id: "o1".into(),
            display_name: "Alice".into(),
            status: UserStatus::Active,
            password_hash: None,
            lock_expiry: Some(Utc::now() + chrono::Duration::minutes(1)),
            failed_login_attempts: 5,
        };
        assert!(user.is_locked(Utc::now()));
    }

    #[test]
    fn only_active_status_can_authenticate() {
        assert!(UserStatus::Active.can_authenticate());
        assert!(!UserStatus::Pending.can_authenticate());
        assert!(!UserStatus::Suspended.can_authenticate());
        assert!(!UserStatus::Deleted.can_authenticate());
    }
}
