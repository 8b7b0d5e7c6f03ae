/*
 * SPDX-FileCopyrightText: 2024 A3Mailer Project
 *
 * SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-SEL
 */

use redis::AsyncCommands;
use sha2::{Digest, Sha256};

use crate::RedisStore;

/// Default cache TTL for a validated token (spec §6: "default 5 min"),
/// further bounded per-token by its own time-to-expiry.
pub const DEFAULT_CACHE_TTL_SECONDS: i64 = 300;

/// Derives the cache key for a raw bearer token: the first 32 hex
/// characters of its SHA-256 digest (spec §6). The raw token never appears
/// in the key or anywhere else this cache touches.
pub fn token_cache_key(raw_token: &str) -> String {
    let digest = Sha256::digest(raw_token.as_bytes());
    let hex = base16_lower(&digest);
    format!("oauth2:token:{}", &hex[..32])
}

fn base16_lower(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

/// Redis-backed cache of validated OAuth2/JWT token results, keyed by a
/// truncated SHA-256 of the raw token so the token itself is never
/// persisted (spec §4.2, §6).
pub struct TokenCache {
    store: RedisStore,
}

impl TokenCache {
    pub fn new(store: RedisStore) -> Self {
        Self { store }
    }

    /// Looks up a cached, JSON-serialized token-info value. A cache miss
    /// or a Redis error are both treated as "not cached" — the caller
    /// falls back to validating against the provider.
    pub async fn get(&self, raw_token: &str) -> Option<String> {
        let key = token_cache_key(raw_token);
        let mut conn = self.store.connection();
        match conn.get::<_, Option<String>>(&key).await {
            Ok(v) => v,
            Err(e) => {
                trc::event!(
                    trc::EventType::Oauth2(trc::Oauth2Event::ProviderError),
                    detail = format!("token cache read failed: {e}"),
                );
                None
            }
        }
    }

    /// Caches `value` (expected to be the JSON-serialized token info)
    /// under the token's derived key. `ttl_seconds` must already be
    /// `min(DEFAULT_CACHE_TTL_SECONDS, time_to_expiry)` — this method does
    /// not re-clamp it, since only the caller knows the token's expiry.
    pub async fn put(&self, raw_token: &str, value: &str, ttl_seconds: i64) {
        if ttl_seconds <= 0 {
            return;
        }
        let key = token_cache_key(raw_token);
        let mut conn = self.store.connection();
        if let Err(e) = conn
            .set_ex::<_, _, ()>(&key, value, ttl_seconds as u64)
            .await
        {
            trc::event!(
                trc::EventType::Oauth2(trc::Oauth2Event::ProviderError),
                detail = format!("token cache write failed: {e}"),
            );
        }
    }
}
