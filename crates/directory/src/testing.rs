/*
 * SPDX-FileCopyrightText: 2024 A3Mailer Project
 *
 * SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-SEL
 */

//! Fixtures shared by this crate's own tests and by the signing/verifying
//! tests in the `smtp` crate. Not gated behind `#[cfg(test)]` so that a
//! dependent crate's integration tests can build the same fixtures without
//! reimplementing RSA key generation.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rsa::pkcs8::EncodePrivateKey;
use rsa::RsaPrivateKey;

use crate::key_provider::KeyProvider;
use crate::model::{DkimKey, EmailAddress, SigningAlgorithm, User};
use crate::repository::{LoginAttempt, Repository};

/// Generates a fresh 2048-bit RSA key and wraps it as a [`DkimKey`] for the
/// given `domain`/`selector`. Slow (RSA keygen) — use sparingly, once per
/// test module rather than once per test case.
pub fn generate_dkim_key(domain: &str, selector: &str) -> DkimKey {
    // rsa pins its own rand_core version; use its re-export rather than the
    // workspace's `rand` crate to avoid a trait-version mismatch on the RNG.
    let mut rng = rsa::rand_core::OsRng;
    let key = RsaPrivateKey::new(&mut rng, 2048).expect("rsa keygen");
    let der = key
        .to_pkcs8_der()
        .expect("pkcs8 encoding")
        .as_bytes()
        .to_vec();
    DkimKey {
        id: format!("{domain}-{selector}"),
        domain: domain.to_string(),
        selector: selector.to_string(),
        algorithm: SigningAlgorithm::RsaSha256,
        private_key_pkcs8_der: der,
    }
}

/// An in-process, non-persistent [`Repository`] and [`KeyProvider`] used by
/// this workspace's tests. Mirrors the shape of the backend the teacher
/// keeps for its own unit-test fixtures: a `Mutex`-guarded map rather than
/// a real store, with the same atomicity contract the trait documents.
///
/// Addresses and users are held separately, matching [`EmailAddress`]'s
/// many-to-one relationship: several addresses can resolve to the same
/// `user_id`, e.g. a primary address plus an alias.
#[derive(Default)]
pub struct MemoryDirectory {
    addresses_by_email: Mutex<HashMap<String, EmailAddress>>,
    users_by_id: Mutex<HashMap<String, User>>,
    keys_by_domain: Mutex<HashMap<String, DkimKey>>,
    pub attempts: Mutex<Vec<LoginAttempt>>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `user` under `email`, its primary address.
    pub fn with_user(self, email: &str, user: User) -> Self {
        let user_id = user.id.clone();
        self.users_by_id.lock().unwrap().insert(user_id.clone(), user);
        self.addresses_by_email.lock().unwrap().insert(
            crate::model::normalize_email(email),
            EmailAddress {
                address: crate::model::normalize_email(email),
                user_id,
            },
        );
        self
    }

    /// Binds an additional verified address to an already-registered user,
    /// exercising the many-to-one side of [`EmailAddress`].
    pub fn with_alias(self, email: &str, user_id: &str) -> Self {
        self.addresses_by_email.lock().unwrap().insert(
            crate::model::normalize_email(email),
            EmailAddress {
                address: crate::model::normalize_email(email),
                user_id: user_id.to_string(),
            },
        );
        self
    }

    pub fn with_key(self, key: DkimKey) -> Self {
        self.keys_by_domain
            .lock()
            .unwrap()
            .insert(key.domain.clone(), key);
        self
    }

    pub fn user(&self, email: &str) -> Option<User> {
        let address = self
            .addresses_by_email
            .lock()
            .unwrap()
            .get(&crate::model::normalize_email(email))
            .cloned()?;
        self.users_by_id.lock().unwrap().get(&address.user_id).cloned()
    }
}

#[async_trait]
impl Repository for MemoryDirectory {
    async fn get_user_by_email(&self, email: &str) -> trc::Result<Option<User>> {
        let address = self
            .addresses_by_email
            .lock()
            .unwrap()
            .get(&crate::model::normalize_email(email))
            .cloned();
        Ok(match address {
            Some(address) => self.users_by_id.lock().unwrap().get(&address.user_id).cloned(),
            None => None,
        })
    }

    async fn update_login_failure(&self, user_id: &str, now: DateTime<Utc>) -> trc::Result<()> {
        let mut users = self.users_by_id.lock().unwrap();
        if let Some(user) = users.get_mut(user_id) {
            user.failed_login_attempts += 1;
            if user.failed_login_attempts >= 5 {
                user.lock_expiry = Some(now + chrono::Duration::minutes(15));
            }
        }
        Ok(())
    }

    async fn update_login_success(&self, user_id: &str) -> trc::Result<()> {
        let mut users = self.users_by_id.lock().unwrap();
        if let Some(user) = users.get_mut(user_id) {
            user.failed_login_attempts = 0;
            user.lock_expiry = None;
        }
        Ok(())
    }

    async fn record_login_attempt(&self, attempt: LoginAttempt) -> trc::Result<()> {
        self.attempts.lock().unwrap().push(attempt);
        Ok(())
    }
}

#[async_trait]
impl KeyProvider for MemoryDirectory {
    async fn get_active_dkim_key(&self, domain: &str) -> trc::Result<Option<DkimKey>> {
        Ok(self.keys_by_domain.lock().unwrap().get(domain).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::UserStatus;

    fn user(id: &str) -> User {
        User {
            id: id.to_string(),
            org_id: "org-1".to_string(),
            display_name: "Alice".to_string(),
            status: UserStatus::Active,
            password_hash: None,
            lock_expiry: None,
            failed_login_attempts: 0,
        }
    }

    #[tokio::test]
    async fn alias_address_resolves_to_the_same_user() {
        let directory = MemoryDirectory::new()
            .with_user("alice@example.com", user("user-A"))
            .with_alias("a.lias@example.com", "user-A");

        let primary = directory.get_user_by_email("alice@example.com").await.unwrap();
        let alias = directory.get_user_by_email("a.lias@example.com").await.unwrap();
        assert_eq!(primary.unwrap().id, "user-A");
        assert_eq!(alias.unwrap().id, "user-A");
    }

    #[tokio::test]
    async fn failure_recorded_against_one_address_is_visible_through_its_alias() {
        let directory = MemoryDirectory::new()
            .with_user("alice@example.com", user("user-A"))
            .with_alias("a.lias@example.com", "user-A");

        directory.update_login_failure("user-A", Utc::now()).await.unwrap();
        let via_alias = directory.get_user_by_email("a.lias@example.com").await.unwrap().unwrap();
        assert_eq!(via_alias.failed_login_attempts, 1);
    }

    #[tokio::test]
    async fn unknown_address_resolves_to_nothing() {
        let directory = MemoryDirectory::new();
        assert!(directory.get_user_by_email("nobody@example.com").await.unwrap().is_none());
    }
}
