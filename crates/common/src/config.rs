/*
 * SPDX-FileCopyrightText: 2024 A3Mailer Project
 *
 * SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-SEL
 */

//! Runtime configuration for the trust subsystem.
//!
//! `TrustConfig::default()` holds the values spec.md prescribes; the
//! `TRUST_*` environment variables override them at process startup, the
//! same layered pattern the whole-server configuration loader uses for its
//! own settings.

use std::time::Duration;

/// Failure-taxonomy thresholds and provider endpoints shared by the
/// Authenticator and the OAuth2 Validator.
#[derive(Debug, Clone)]
pub struct TrustConfig {
    /// Consecutive failures before an identity is locked out (spec §4.1: 5).
    pub max_identity_failures: u32,
    /// Failures from one client IP before it is rate-limited (spec §4.1: 15).
    pub max_ip_failures: u32,
    /// How long a lockout or IP block lasts once triggered (spec §4.1/§5: 900s).
    pub lockout_window: Duration,
    /// Upper bound on how long a validated token may be cached (spec §4.2: 5 min).
    pub oauth_cache_ttl: Duration,
    /// `https://oauth2.googleapis.com/tokeninfo` by default.
    pub google_tokeninfo_url: String,
    /// `https://graph.microsoft.com/v1.0/me` by default.
    pub microsoft_graph_url: String,
    /// Google OAuth2 client IDs a token's `aud`/`azp` must match (spec
    /// §4.2 step 3). Empty means no allow-list is enforced.
    pub google_client_id_allowlist: Vec<String>,
    /// Shared secret for HS256-signed internal JWTs, if configured.
    pub internal_jwt_hmac_secret: Option<String>,
    /// PEM-encoded public key for RS256-signed internal JWTs, if configured.
    pub internal_jwt_rsa_public_key_pem: Option<String>,
    /// Expected `iss` claim on internal JWTs.
    pub internal_jwt_issuer: String,
    /// Hostname this instance identifies itself as in ARC-Authentication-Results.
    pub arc_authserv_id: String,
}

impl Default for TrustConfig {
    fn default() -> Self {
        Self {
            max_identity_failures: 5,
            max_ip_failures: 15,
            lockout_window: Duration::from_secs(900),
            oauth_cache_ttl: Duration::from_secs(300),
            google_tokeninfo_url: "https://oauth2.googleapis.com/tokeninfo".to_string(),
            microsoft_graph_url: "https://graph.microsoft.com/v1.0/me".to_string(),
            google_client_id_allowlist: Vec::new(),
            internal_jwt_hmac_secret: None,
            internal_jwt_rsa_public_key_pem: None,
            internal_jwt_issuer: "a3mailer".to_string(),
            arc_authserv_id: "mail.local".to_string(),
        }
    }
}

impl TrustConfig {
    /// Applies `TRUST_*` environment variable overrides on top of the
    /// defaults. Only variables that are actually set are consulted; a
    /// malformed value for a numeric field is reported rather than
    /// silently ignored, since a config typo silently keeping the default
    /// lockout threshold is exactly the kind of bug this subsystem exists
    /// to avoid.
    pub fn from_env() -> trc::Result<Self> {
        let mut config = Self::default();

        if let Ok(v) = std::env::var("TRUST_MAX_IDENTITY_FAILURES") {
            config.max_identity_failures = parse_env("TRUST_MAX_IDENTITY_FAILURES", &v)?;
        }
        if let Ok(v) = std::env::var("TRUST_MAX_IP_FAILURES") {
            config.max_ip_failures = parse_env("TRUST_MAX_IP_FAILURES", &v)?;
        }
        if let Ok(v) = std::env::var("TRUST_LOCKOUT_WINDOW_SECONDS") {
            config.lockout_window = Duration::from_secs(parse_env(
                "TRUST_LOCKOUT_WINDOW_SECONDS",
                &v,
            )?);
        }
        if let Ok(v) = std::env::var("TRUST_OAUTH_CACHE_TTL_SECONDS") {
            config.oauth_cache_ttl =
                Duration::from_secs(parse_env("TRUST_OAUTH_CACHE_TTL_SECONDS", &v)?);
        }
        if let Ok(v) = std::env::var("TRUST_GOOGLE_TOKENINFO_URL") {
            config.google_tokeninfo_url = v;
        }
        if let Ok(v) = std::env::var("TRUST_MICROSOFT_GRAPH_URL") {
            config.microsoft_graph_url = v;
        }
        if let Ok(v) = std::env::var("TRUST_GOOGLE_CLIENT_ID_ALLOWLIST") {
            config.google_client_id_allowlist = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Ok(v) = std::env::var("TRUST_INTERNAL_JWT_HMAC_SECRET") {
            config.internal_jwt_hmac_secret = Some(v);
        }
        if let Ok(v) = std::env::var("TRUST_INTERNAL_JWT_RSA_PUBLIC_KEY_PEM") {
            config.internal_jwt_rsa_public_key_pem = Some(v);
        }
        if let Ok(v) = std::env::var("TRUST_INTERNAL_JWT_ISSUER") {
            config.internal_jwt_issuer = v;
        }
        if let Ok(v) = std::env::var("TRUST_ARC_AUTHSERV_ID") {
            config.arc_authserv_id = v;
        }

        Ok(config)
    }
}

fn parse_env<T: std::str::FromStr>(name: &'static str, raw: &str) -> trc::Result<T> {
    raw.parse().map_err(|_| {
        trc::ConfigEvent::InvalidValue
            .into_err()
            .details(format!("{name}={raw}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_thresholds() {
        let config = TrustConfig::default();
        assert_eq!(config.max_identity_failures, 5);
        assert_eq!(config.max_ip_failures, 15);
        assert_eq!(config.lockout_window, Duration::from_secs(900));
    }

    #[test]
    fn invalid_env_override_is_rejected() {
        std::env::set_var("TRUST_MAX_IDENTITY_FAILURES", "not-a-number");
        let result = TrustConfig::from_env();
        std::env::remove_var("TRUST_MAX_IDENTITY_FAILURES");
        assert!(result.is_err());
    }
}
