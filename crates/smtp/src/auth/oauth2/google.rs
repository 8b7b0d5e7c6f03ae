/*
 * SPDX-FileCopyrightText: 2024 A3Mailer Project
 *
 * SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-SEL
 */

use std::time::{SystemTime, UNIX_EPOCH};

use common::TrustConfig;

use super::{Provider, TokenInfo};

#[derive(Debug, serde::Deserialize)]
struct TokenInfoResponse {
    #[serde(default)]
    aud: Option<String>,
    #[serde(default)]
    azp: Option<String>,
    sub: String,
    email: String,
    #[serde(default)]
    email_verified: Option<String>,
    expires_in: String,
    #[serde(default)]
    scope: String,
}

/// Calls Google's tokeninfo endpoint and parses the result (spec §4.2
/// step 3 "Google").
pub async fn validate(client: &reqwest::Client, token: &str, config: &TrustConfig) -> trc::Result<TokenInfo> {
    let response = client
        .get(&config.google_tokeninfo_url)
        .query(&[("access_token", token)])
        .timeout(std::time::Duration::from_secs(10))
        .send()
        .await
        .map_err(|e| trc::Oauth2Event::ProviderError.into_err().caused_by(e))?;

    if response.status() == reqwest::StatusCode::UNAUTHORIZED
        || response.status() == reqwest::StatusCode::BAD_REQUEST
    {
        return Err(trc::Oauth2Event::InvalidToken.into_err());
    }
    if !response.status().is_success() {
        return Err(trc::Oauth2Event::ProviderError
            .into_err()
            .details(format!("status={}", response.status())));
    }

    let body = response
        .text()
        .await
        .map_err(|e| trc::Oauth2Event::ProviderError.into_err().caused_by(e))?;
    parse_response(&body, &config.google_client_id_allowlist, None)
}

/// Parses Google's tokeninfo JSON body into a [`TokenInfo`], independent
/// of the HTTP call itself (spec §4.2 step 3).
///
/// `allowed_client_ids` is the optional configured allow-list: when
/// non-empty, `aud` or `azp` must match one of them. `now` overrides the
/// wall clock (used by this module's own tests); `None` uses
/// [`SystemTime::now`].
fn parse_response(body: &str, allowed_client_ids: &[String], now: Option<i64>) -> trc::Result<TokenInfo> {
    let parsed: TokenInfoResponse = serde_json::from_str(body)
        .map_err(|e| trc::Oauth2Event::InvalidToken.into_err().caused_by(e))?;

    if !parsed.scope.split_whitespace().any(|s| s == "email") {
        return Err(trc::Oauth2Event::InvalidToken
            .into_err()
            .details("scope missing email"));
    }
    if parsed.email_verified.as_deref() == Some("false") {
        return Err(trc::Oauth2Event::InvalidToken
            .into_err()
            .details("email not verified"));
    }

    if !allowed_client_ids.is_empty() {
        let matches = parsed
            .aud
            .as_deref()
            .is_some_and(|aud| allowed_client_ids.iter().any(|id| id == aud))
            || parsed
                .azp
                .as_deref()
                .is_some_and(|azp| allowed_client_ids.iter().any(|id| id == azp));
        if !matches {
            return Err(trc::Oauth2Event::InvalidToken
                .into_err()
                .details("client id not in allow-list"));
        }
    }

    let expires_in: i64 = parsed
        .expires_in
        .parse()
        .map_err(|_| trc::Oauth2Event::InvalidToken.into_err().details("bad expires_in"))?;
    let now = now.unwrap_or_else(|| {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    });
    if expires_in <= 0 {
        return Err(trc::Oauth2Event::TokenExpired.into_err());
    }

    Ok(TokenInfo {
        email: parsed.email,
        subject: parsed.sub,
        issuer: "accounts.google.com".to_string(),
        provider: Provider::Google,
        expires_at: now + expires_in,
    })
}
