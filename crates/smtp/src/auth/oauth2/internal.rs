/*
 * SPDX-FileCopyrightText: 2024 A3Mailer Project
 *
 * SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-SEL
 */

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use parking_lot::RwLock;

use common::TrustConfig;

use super::{Provider, TokenInfo};

#[derive(Debug, serde::Deserialize)]
struct Claims {
    sub: String,
    iss: String,
    #[serde(default)]
    aud: Option<String>,
    exp: i64,
}

/// Caches the parsed RS256 decoding key so a PEM is only ever parsed once,
/// behind a reader-preferring lock (spec §4.2 "Concurrency": "JWKS caches
/// ... are guarded by a reader-preferring lock with a single refresh at a
/// time"). There is a single configured key rather than a fetched set, so
/// "refresh" here is the first caller to observe an empty cache.
static RSA_KEY_CACHE: RwLock<Option<DecodingKey>> = RwLock::new(None);

fn rsa_decoding_key(pem: &str) -> trc::Result<DecodingKey> {
    if let Some(key) = RSA_KEY_CACHE.read().clone() {
        return Ok(key);
    }
    let mut cache = RSA_KEY_CACHE.write();
    if let Some(key) = cache.clone() {
        return Ok(key);
    }
    let key = DecodingKey::from_rsa_pem(pem.as_bytes())
        .map_err(|e| trc::Oauth2Event::InvalidToken.into_err().caused_by(e))?;
    *cache = Some(key.clone());
    Ok(key)
}

/// Validates an internally issued JWT against the configured HMAC secret
/// or RSA public key (spec §4.2 step 3 "Internal JWT").
pub fn validate(token: &str, config: &TrustConfig) -> trc::Result<TokenInfo> {
    let (key, algorithm) = if let Some(pem) = &config.internal_jwt_rsa_public_key_pem {
        (rsa_decoding_key(pem)?, Algorithm::RS256)
    } else if let Some(secret) = &config.internal_jwt_hmac_secret {
        (DecodingKey::from_secret(secret.as_bytes()), Algorithm::HS256)
    } else {
        return Err(trc::Oauth2Event::UnsupportedProvider
            .into_err()
            .details("no internal signing key configured"));
    };

    let mut validation = Validation::new(algorithm);
    validation.set_issuer(&[config.internal_jwt_issuer.clone()]);

    let data = decode::<Claims>(token, &key, &validation).map_err(|e| {
        use jsonwebtoken::errors::ErrorKind;
        match e.kind() {
            ErrorKind::ExpiredSignature => trc::Oauth2Event::TokenExpired.into_err(),
            _ => trc::Oauth2Event::InvalidToken.into_err().caused_by(e),
        }
    })?;

    Ok(TokenInfo {
        email: data.claims.sub.clone(),
        subject: data.claims.sub,
        issuer: data.claims.iss,
        provider: Provider::Internal,
        expires_at: data.claims.exp,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn issue_hs256(secret: &str, issuer: &str, sub: &str, exp: i64) -> String {
        let claims = serde_json::json!({"sub": sub, "iss": issuer, "exp": exp});
        encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    #[test]
    fn validates_well_formed_hmac_token() {
        let mut config = TrustConfig::default();
        config.internal_jwt_hmac_secret = Some("shh".to_string());
        config.internal_jwt_issuer = "a3mailer".to_string();
        let token = issue_hs256("shh", "a3mailer", "user-1", 9_999_999_999);
        let info = validate(&token, &config).unwrap();
        assert_eq!(info.subject, "user-1");
        assert_eq!(info.provider, Provider::Internal);
    }

    #[test]
    fn rejects_expired_token() {
        let mut config = TrustConfig::default();
        config.internal_jwt_hmac_secret = Some("shh".to_string());
        config.internal_jwt_issuer = "a3mailer".to_string();
        let token = issue_hs256("shh", "a3mailer", "user-1", 1);
        let err = validate(&token, &config).unwrap_err();
        assert!(err.matches(trc::EventType::Oauth2(trc::Oauth2Event::TokenExpired)));
    }

    #[test]
    fn rejects_wrong_secret() {
        let mut config = TrustConfig::default();
        config.internal_jwt_hmac_secret = Some("shh".to_string());
        config.internal_jwt_issuer = "a3mailer".to_string();
        let token = issue_hs256("different-secret", "a3mailer", "user-1", 9_999_999_999);
        assert!(validate(&token, &config).is_err());
    }

    #[test]
    fn unconfigured_internal_key_is_unsupported() {
        let config = TrustConfig::default();
        let token = issue_hs256("shh", "a3mailer", "user-1", 9_999_999_999);
        let err = validate(&token, &config).unwrap_err();
        assert!(err.matches(trc::EventType::Oauth2(trc::Oauth2Event::UnsupportedProvider)));
    }
}
