/*
 * SPDX-FileCopyrightText: 2024 A3Mailer Project
 *
 * SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-SEL
 */

use base64::Engine;
use common::TrustConfig;

/// Which OAuth2/JWT issuer a bearer token belongs to (spec §4.2 step 2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Provider {
    Google,
    Microsoft,
    Internal,
}

/// Classifies a raw bearer token without verifying its signature.
///
/// A token that isn't a three-part dot-separated JWT is provisionally
/// treated as a Google opaque access token (spec §4.2 step 2). A JWT's
/// middle segment is decoded (unverified) just far enough to read `iss`.
pub fn detect_provider(token: &str, config: &TrustConfig) -> trc::Result<Provider> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Ok(Provider::Google);
    }

    let Ok(payload_bytes) = base64::engine::general_purpose::URL_SAFE_NO_PAD.decode(parts[1]) else {
        return Err(trc::Oauth2Event::InvalidToken.into_err().details("unparsable jwt payload"));
    };
    let Ok(payload) = serde_json::from_slice::<serde_json::Value>(&payload_bytes) else {
        return Err(trc::Oauth2Event::InvalidToken.into_err().details("jwt payload not json"));
    };
    let issuer = payload.get("iss").and_then(|v| v.as_str()).unwrap_or("");

    if issuer.contains("accounts.google.com") || issuer.contains("googleapis.com") {
        return Ok(Provider::Google);
    }
    if issuer.contains("login.microsoftonline.com") || issuer.contains("sts.windows.net") {
        return Ok(Provider::Microsoft);
    }
    if issuer.contains(&config.internal_jwt_issuer)
        || config.internal_jwt_hmac_secret.is_some()
        || config.internal_jwt_rsa_public_key_pem.is_some()
    {
        return Ok(Provider::Internal);
    }

    Err(trc::Oauth2Event::UnsupportedProvider
        .into_err()
        .details(format!("iss={issuer}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_jwt(payload_json: &str) -> String {
        let header = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(b"{\"alg\":\"none\"}");
        let payload = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(payload_json);
        format!("{header}.{payload}.sig")
    }

    #[test]
    fn opaque_token_is_google() {
        let config = TrustConfig::default();
        assert_eq!(detect_provider("ya29.not-a-jwt", &config).unwrap(), Provider::Google);
    }

    #[test]
    fn google_issuer_is_detected() {
        let config = TrustConfig::default();
        let token = encode_jwt(r#"{"iss":"accounts.google.com"}"#);
        assert_eq!(detect_provider(&token, &config).unwrap(), Provider::Google);
    }

    #[test]
    fn microsoft_issuer_is_detected() {
        let config = TrustConfig::default();
        let token = encode_jwt(r#"{"iss":"https://login.microsoftonline.com/tenant/v2.0"}"#);
        assert_eq!(detect_provider(&token, &config).unwrap(), Provider::Microsoft);
    }

    #[test]
    fn internal_issuer_is_detected_by_name() {
        let mut config = TrustConfig::default();
        config.internal_jwt_issuer = "a3mailer".to_string();
        let token = encode_jwt(r#"{"iss":"a3mailer"}"#);
        assert_eq!(detect_provider(&token, &config).unwrap(), Provider::Internal);
    }

    #[test]
    fn internal_issuer_is_detected_by_configured_secret_when_issuer_unrecognized() {
        let mut config = TrustConfig::default();
        config.internal_jwt_hmac_secret = Some("shh".to_string());
        let token = encode_jwt(r#"{"iss":"some-other-realm"}"#);
        assert_eq!(detect_provider(&token, &config).unwrap(), Provider::Internal);
    }

    #[test]
    fn unrecognized_issuer_without_internal_secret_is_unsupported() {
        let config = TrustConfig::default();
        let token = encode_jwt(r#"{"iss":"example.org"}"#);
        let err = detect_provider(&token, &config).unwrap_err();
        assert!(err.matches(trc::EventType::Oauth2(trc::Oauth2Event::UnsupportedProvider)));
    }
}
