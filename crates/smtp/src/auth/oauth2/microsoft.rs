/*
 * SPDX-FileCopyrightText: 2024 A3Mailer Project
 *
 * SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-SEL
 */

use std::time::{SystemTime, UNIX_EPOCH};

use common::TrustConfig;

use super::{Provider, TokenInfo};

#[derive(Debug, serde::Deserialize)]
struct GraphMeResponse {
    id: String,
    #[serde(default)]
    mail: Option<String>,
    #[serde(default, rename = "userPrincipalName")]
    user_principal_name: Option<String>,
}

/// Calls Microsoft Graph's `/me` endpoint and parses the result (spec
/// §4.2 step 3 "Microsoft"). Graph does not report a token lifetime, so
/// the result is cached for the configured cache TTL only, via the
/// one-hour placeholder expiry conventional for opaque Graph tokens.
const GRAPH_TOKEN_ASSUMED_LIFETIME_SECONDS: i64 = 3600;

pub async fn validate(client: &reqwest::Client, token: &str, config: &TrustConfig) -> trc::Result<TokenInfo> {
    let response = client
        .get(&config.microsoft_graph_url)
        .bearer_auth(token)
        .timeout(std::time::Duration::from_secs(10))
        .send()
        .await
        .map_err(|e| trc::Oauth2Event::ProviderError.into_err().caused_by(e))?;

    if response.status() == reqwest::StatusCode::UNAUTHORIZED {
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
    parse_response(&body, None)
}

fn parse_response(body: &str, now: Option<i64>) -> trc::Result<TokenInfo> {
    let parsed: GraphMeResponse = serde_json::from_str(body)
        .map_err(|e| trc::Oauth2Event::InvalidToken.into_err().caused_by(e))?;

    let email = parsed
        .mail
        .or(parsed.user_principal_name)
        .ok_or_else(|| trc::Oauth2Event::InvalidToken.into_err().details("no mail or userPrincipalName"))?;

    let now = now.unwrap_or_else(|| {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    });

    Ok(TokenInfo {
        email,
        subject: parsed.id,
        issuer: "login.microsoftonline.com".to_string(),
        provider: Provider::Microsoft,
        expires_at: now + GRAPH_TOKEN_ASSUMED_LIFETIME_SECONDS,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_mail_over_user_principal_name() {
        let body = r#"{"id":"u1","mail":"bob@example.com","userPrincipalName":"bob@tenant.onmicrosoft.com"}"#;
        let info = parse_response(body, Some(0)).unwrap();
        assert_eq!(info.email, "bob@example.com");
    }

    #[test]
    fn falls_back_to_user_principal_name() {
        let body = r#"{"id":"u1","userPrincipalName":"bob@tenant.onmicrosoft.com"}"#;
        let info = parse_response(body, Some(0)).unwrap();
        assert_eq!(info.email, "bob@tenant.onmicrosoft.com");
    }

    #[test]
    fn rejects_response_with_neither_field() {
        let body = r#"{"id":"u1"}"#;
        assert!(parse_response(body, Some(0)).is_err());
    }
}
