/*
 * SPDX-FileCopyrightText: 2024 A3Mailer Project
 *
 * SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-SEL
 */

//! Decoders for the four SASL wire formats the Authenticator accepts
//! (spec §4.1, §6). These functions only parse bytes; they never touch
//! the directory, the rate limiter or the OAuth2 validator.

/// A decoded SASL PLAIN response: `\0authentication-id\0password`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlainCredentials {
    pub authorization_id: String,
    pub authentication_id: String,
    pub password: String,
}

/// Splits a raw PLAIN payload into its three NUL-separated fields.
///
/// Returns `None` for anything that isn't exactly two NUL bytes with valid
/// UTF-8 either side — wrong arity, non-UTF-8 fields, or a non-empty
/// authorization-id that differs from the authentication-id are all
/// reported the same way by the caller (spec §4.1: "Authorization-id is
/// ignored (must be empty or equal to authentication-id)").
pub fn decode_plain(payload: &[u8]) -> Option<PlainCredentials> {
    let mut parts = payload.splitn(3, |&b| b == 0);
    let authorization_id = parts.next()?;
    let authentication_id = parts.next()?;
    let password = parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    let authorization_id = std::str::from_utf8(authorization_id).ok()?.to_string();
    let authentication_id = std::str::from_utf8(authentication_id).ok()?.to_string();
    let password = std::str::from_utf8(password).ok()?.to_string();
    if authentication_id.is_empty() || password.is_empty() {
        return None;
    }
    if !authorization_id.is_empty() && authorization_id != authentication_id {
        return None;
    }
    Some(PlainCredentials {
        authorization_id,
        authentication_id,
        password,
    })
}

/// A decoded XOAUTH2 or OAUTHBEARER bearer credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BearerCredentials {
    pub email: String,
    pub token: String,
}

/// Parses `user=<email>\x01auth=Bearer <token>\x01\x01` (spec §4.1, §6).
pub fn decode_xoauth2(payload: &[u8]) -> Option<BearerCredentials> {
    let text = std::str::from_utf8(payload).ok()?;
    let text = text.strip_suffix('\x01').unwrap_or(text);
    let mut email = None;
    let mut token = None;
    for field in text.split('\x01') {
        if let Some(rest) = field.strip_prefix("user=") {
            email = Some(rest.to_string());
        } else if let Some(rest) = field.strip_prefix("auth=Bearer ") {
            token = Some(rest.to_string());
        }
    }
    match (email, token) {
        (Some(email), Some(token)) if !email.is_empty() && !token.is_empty() => {
            Some(BearerCredentials { email, token })
        }
        _ => None,
    }
}

/// Serializes the XOAUTH2 wire form for `email`/`token`, the inverse of
/// [`decode_xoauth2`] (used by this crate's own round-trip tests and by
/// any client-side code this workspace grows later).
pub fn encode_xoauth2(email: &str, token: &str) -> Vec<u8> {
    format!("user={email}\x01auth=Bearer {token}\x01\x01").into_bytes()
}

/// Parses the RFC 7628 OAUTHBEARER format: a GS2 header line
/// `n,a=<email>,` followed by `\x01`-separated `host=`/`port=`/`auth=`
/// fields, terminated by `\x01\x01` (spec §4.1, §6).
pub fn decode_oauthbearer(payload: &[u8]) -> Option<BearerCredentials> {
    let text = std::str::from_utf8(payload).ok()?;
    let text = text.strip_suffix('\x01').unwrap_or(text);
    let mut fields = text.split('\x01');
    let gs2_header = fields.next()?;
    let email = gs2_header
        .strip_prefix("n,a=")
        .and_then(|rest| rest.strip_suffix(','))?
        .to_string();
    let mut token = None;
    for field in fields {
        if let Some(rest) = field.strip_prefix("auth=Bearer ") {
            token = Some(rest.to_string());
        }
    }
    let token = token?;
    if email.is_empty() || token.is_empty() {
        return None;
    }
    Some(BearerCredentials { email, token })
}

/// Steps the two-round LOGIN mechanism's state machine (spec §4.1's
/// `AuthenticateLoginStep`, restated as a state enum per spec §6's
/// `{awaiting-user, awaiting-password, terminal}`). The caller owns one
/// instance per connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginState {
    AwaitingUser,
    AwaitingPassword { username: String },
    Terminal,
}

/// Outcome of one LOGIN step.
pub enum LoginStep {
    /// Advance to `AwaitingPassword`; the caller base64-encodes these raw
    /// bytes (always the literal `Password:`) before writing the challenge
    /// to the wire.
    Challenge(Vec<u8>),
    /// Terminal: username and password were both collected.
    Credentials { username: String, password: String },
    /// Terminal: the payload was empty at a non-terminal state, or a step
    /// was attempted after the state machine already reached `Terminal`.
    Invalid,
}

/// Advances `state` in place given the next raw (already base64-decoded)
/// payload, returning what the caller should do next.
pub fn step_login(state: &mut LoginState, payload: &[u8]) -> LoginStep {
    match state {
        LoginState::Terminal => LoginStep::Invalid,
        LoginState::AwaitingUser => {
            if payload.is_empty() {
                *state = LoginState::Terminal;
                return LoginStep::Invalid;
            }
            let username = String::from_utf8_lossy(payload).into_owned();
            *state = LoginState::AwaitingPassword { username };
            LoginStep::Challenge(b"Password:".to_vec())
        }
        LoginState::AwaitingPassword { username } => {
            let username = std::mem::take(username);
            if payload.is_empty() {
                *state = LoginState::Terminal;
                return LoginStep::Invalid;
            }
            *state = LoginState::Terminal;
            LoginStep::Credentials {
                username,
                password: String::from_utf8_lossy(payload).into_owned(),
            }
        }
    }
}
