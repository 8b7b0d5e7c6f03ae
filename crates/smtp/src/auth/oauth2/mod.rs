/*
 * SPDX-FileCopyrightText: 2024 A3Mailer Project
 *
 * SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-SEL
 */

//! Bearer-token validation for Google, Microsoft and internally issued
//! JWTs (spec §4.2). Each provider lives in its own module so the HTTP
//! call and the response-parsing logic can be tested independently.

pub mod google;
pub mod internal;
pub mod microsoft;
pub mod provider;
pub mod testing;

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use common::TrustConfig;
use store::TokenCache;

pub use provider::{detect_provider, Provider};

/// The authenticator's view of the OAuth2 validator (spec §4.2). A trait
/// so the authenticator's own tests can substitute a fixed response
/// instead of making live HTTP calls; see [`testing::StaticValidator`].
#[async_trait]
pub trait TokenValidator: Send + Sync {
    async fn validate_token(&self, token: &str) -> trc::Result<TokenInfo>;
}

/// Validated bearer-token outcome (spec §3 "OAuth2TokenInfo", §4.2).
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TokenInfo {
    pub email: String,
    pub subject: String,
    pub issuer: String,
    pub provider: Provider,
    /// Unix timestamp the token itself expires at.
    pub expires_at: i64,
}

/// Validates `token`, consulting the cache first (spec §4.2 step 1) and
/// writing a fresh cache entry after a live provider check (step 4).
pub struct Validator {
    http: reqwest::Client,
    cache: TokenCache,
    config: Arc<TrustConfig>,
}

impl Validator {
    pub fn new(http: reqwest::Client, cache: TokenCache, config: Arc<TrustConfig>) -> Self {
        Self { http, cache, config }
    }

    async fn cache_write(&self, token: &str, info: &TokenInfo) {
        let Ok(json) = serde_json::to_string(info) else {
            return;
        };
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        let ttl = (self.config.oauth_cache_ttl.as_secs() as i64).min(info.expires_at - now);
        self.cache.put(token, &json, ttl).await;
    }
}

#[async_trait]
impl TokenValidator for Validator {
    async fn validate_token(&self, token: &str) -> trc::Result<TokenInfo> {
        if let Some(cached) = self.cache.get(token).await {
            if let Ok(info) = serde_json::from_str::<TokenInfo>(&cached) {
                trc::event!(trc::EventType::Oauth2(trc::Oauth2Event::CacheHit));
                return Ok(info);
            }
        }
        trc::event!(trc::EventType::Oauth2(trc::Oauth2Event::CacheMiss));

        let provider = detect_provider(token, &self.config)?;
        let info = match provider {
            Provider::Google => google::validate(&self.http, token, &self.config).await?,
            Provider::Microsoft => microsoft::validate(&self.http, token, &self.config).await?,
            Provider::Internal => internal::validate(token, &self.config)?,
        };

        self.cache_write(token, &info).await;
        Ok(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_info_round_trips_through_json() {
        let info = TokenInfo {
            email: "bob@example.com".to_string(),
            subject: "sub-1".to_string(),
            issuer: "accounts.google.com".to_string(),
            provider: Provider::Google,
            expires_at: 1_700_000_000,
        };
        let json = serde_json::to_string(&info).unwrap();
        let parsed: TokenInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, info);
    }
}
