/*
 * SPDX-FileCopyrightText: 2024 A3Mailer Project
 *
 * SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-SEL
 */

use std::sync::Arc;

use async_trait::async_trait;
use common::TrustConfig;
use redis::AsyncCommands;

use crate::RedisStore;

/// Outcome of a failure-counter increment: whether the caller has now
/// crossed its limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitCheck {
    pub count: u64,
    pub limited: bool,
}

/// The authenticator's view of the failure-counter store (spec §4.1, §5).
/// A trait rather than a concrete type so the authenticator's own tests
/// can substitute an in-memory fake instead of dialing Redis, the same
/// contract-first shape the directory crate uses for [`Repository`].
///
/// [`Repository`]: directory::Repository
#[async_trait]
pub trait RateLimiting: Send + Sync {
    async fn is_blocked(&self, email: &str, ip: &str) -> bool;
    async fn record_failure(&self, email: &str, ip: &str) -> (Option<LimitCheck>, Option<LimitCheck>);
    async fn clear(&self, email: &str, ip: &str);
}

/// Distributed login-failure counters keyed by identity and by client IP
/// (spec §4.1). Every operation fails open: if Redis cannot be reached the
/// check is skipped rather than treated as a lockout, since an
/// infrastructure outage must never lock every user out at once.
pub struct RateLimiter {
    store: RedisStore,
    config: Arc<TrustConfig>,
}

fn identity_key(email: &str) -> String {
    format!("smtp:auth:fail:email:{email}")
}

fn ip_key(ip: &str) -> String {
    format!("smtp:auth:fail:ip:{ip}")
}

impl RateLimiter {
    pub fn new(store: RedisStore, config: Arc<TrustConfig>) -> Self {
        Self { store, config }
    }

    async fn current_count(&self, key: &str) -> Option<u64> {
        let mut conn = self.store.connection();
        match conn.get::<_, Option<u64>>(key).await {
            Ok(v) => v,
            Err(e) => {
                trc::event!(
                    trc::EventType::Auth(trc::AuthEvent::Error),
                    detail = format!("rate limiter read failed: {e}"),
                );
                None
            }
        }
    }

    async fn increment(&self, key: &str, limit: u64) -> Option<LimitCheck> {
        let mut conn = self.store.connection();
        let count: u64 = match conn.incr(key, 1u64).await {
            Ok(c) => c,
            Err(e) => {
                trc::event!(
                    trc::EventType::Auth(trc::AuthEvent::Error),
                    detail = format!("rate limiter increment failed: {e}"),
                );
                return None;
            }
        };
        if let Err(e) = conn
            .expire::<_, ()>(key, self.config.lockout_window.as_secs() as i64)
            .await
        {
            trc::event!(
                trc::EventType::Auth(trc::AuthEvent::Error),
                detail = format!("rate limiter expire failed: {e}"),
            );
        }
        Some(LimitCheck {
            count,
            limited: count >= limit,
        })
    }

}

#[async_trait]
impl RateLimiting for RateLimiter {
    /// True if either the identity or the IP counter has already reached
    /// its limit. Call before attempting credential verification so a
    /// locked-out caller never reaches the directory or the bcrypt check.
    async fn is_blocked(&self, email: &str, ip: &str) -> bool {
        let identity_count = self.current_count(&identity_key(email)).await;
        let ip_count = self.current_count(&ip_key(ip)).await;
        identity_count.is_some_and(|c| c >= self.config.max_identity_failures as u64)
            || ip_count.is_some_and(|c| c >= self.config.max_ip_failures as u64)
    }

    /// Increments both the identity and IP failure counters, extending
    /// each TTL to the full lockout window on every increment (spec §4.1:
    /// "re-extended on every INCR"). Returns the post-increment counts, or
    /// `None` for a counter whose increment failed — treated as "not yet
    /// limited" by the caller per the fail-open policy.
    async fn record_failure(&self, email: &str, ip: &str) -> (Option<LimitCheck>, Option<LimitCheck>) {
        let identity = self
            .increment(&identity_key(email), self.config.max_identity_failures as u64)
            .await;
        let ip_result = self
            .increment(&ip_key(ip), self.config.max_ip_failures as u64)
            .await;
        (identity, ip_result)
    }

    /// Clears both counters on a successful login (spec §4.1 step 10).
    /// Deleting an absent key is a no-op, so this is safe to call
    /// unconditionally.
    async fn clear(&self, email: &str, ip: &str) {
        let mut conn = self.store.connection();
        if let Err(e) = conn
            .del::<_, ()>(vec![identity_key(email), ip_key(ip)])
            .await
        {
            trc::event!(
                trc::EventType::Auth(trc::AuthEvent::Error),
                detail = format!("rate limiter clear failed: {e}"),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_key_is_lowercase_scoped() {
        assert_eq!(
            identity_key("alice@example.com"),
            "smtp:auth:fail:email:alice@example.com"
        );
    }

    #[test]
    fn ip_key_is_scoped() {
        assert_eq!(ip_key("203.0.113.1"), "smtp:auth:fail:ip:203.0.113.1");
    }

    #[test]
    fn limit_check_flags_at_threshold() {
        let limit = TrustConfig::default().max_identity_failures as u64;
        let check = LimitCheck {
            count: limit,
            limited: limit >= limit,
        };
        assert!(check.limited);
    }
}
