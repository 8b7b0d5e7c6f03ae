/*
 * SPDX-FileCopyrightText: 2024 A3Mailer Project
 *
 * SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-SEL
 */

//! An in-process [`RateLimiting`] fixture for tests that exercise the
//! authenticator without a live Redis instance. Mirrors the directory
//! crate's `MemoryDirectory` fixture.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::rate_limiter::{LimitCheck, RateLimiting};

const IDENTITY_LIMIT: u64 = 5;
const IP_LIMIT: u64 = 15;

#[derive(Default)]
pub struct MemoryRateLimiter {
    counts: Mutex<HashMap<String, u64>>,
}

impl MemoryRateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    fn identity_key(email: &str) -> String {
        format!("email:{email}")
    }

    fn ip_key(ip: &str) -> String {
        format!("ip:{ip}")
    }
}

#[async_trait]
impl RateLimiting for MemoryRateLimiter {
    async fn is_blocked(&self, email: &str, ip: &str) -> bool {
        let counts = self.counts.lock().unwrap();
        counts.get(&Self::identity_key(email)).is_some_and(|c| *c >= IDENTITY_LIMIT)
            || counts.get(&Self::ip_key(ip)).is_some_and(|c| *c >= IP_LIMIT)
    }

    async fn record_failure(&self, email: &str, ip: &str) -> (Option<LimitCheck>, Option<LimitCheck>) {
        let mut counts = self.counts.lock().unwrap();
        let identity_count = counts.entry(Self::identity_key(email)).or_insert(0);
        *identity_count += 1;
        let identity = LimitCheck {
            count: *identity_count,
            limited: *identity_count >= IDENTITY_LIMIT,
        };
        let ip_count = counts.entry(Self::ip_key(ip)).or_insert(0);
        *ip_count += 1;
        let ip_result = LimitCheck {
            count: *ip_count,
            limited: *ip_count >= IP_LIMIT,
        };
        (Some(identity), Some(ip_result))
    }

    async fn clear(&self, email: &str, ip: &str) {
        let mut counts = self.counts.lock().unwrap();
        counts.remove(&Self::identity_key(email));
        counts.remove(&Self::ip_key(ip));
    }
}
