/*
 * SPDX-FileCopyrightText: 2024 A3Mailer Project
 *
 * SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-SEL
 */

//! The event/error catalog this subsystem emits.
//!
//! The teacher's real `trc` crate generates its event catalog from an
//! external TOML file via a proc-macro; that pipeline is out of scope for
//! a three-component trust subsystem, so the catalog is hand-declared here,
//! restricted to the closed-set taxonomy spec §7 requires.

use std::fmt;

use crate::Severity;

/// Top-level event kind, one variant per component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum EventType {
    Auth(AuthEvent),
    Oauth2(Oauth2Event),
    Arc(ArcEvent),
    Config(ConfigEvent),
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventType::Auth(e) => write!(f, "auth.{e}"),
            EventType::Oauth2(e) => write!(f, "oauth2.{e}"),
            EventType::Arc(e) => write!(f, "arc.{e}"),
            EventType::Config(e) => write!(f, "config.{e}"),
        }
    }
}

/// Authenticator events (spec §4.1, §7). Mechanism-agnostic: the same
/// kind is raised whether the mechanism was PLAIN, LOGIN, XOAUTH2 or
/// OAUTHBEARER.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum AuthEvent {
    /// Connection was not TLS-protected; no lookup was attempted.
    TlsRequired,
    /// Collapsed client-visible failure for any password-mechanism
    /// credential problem (unknown user, wrong password, malformed
    /// payload). The precise cause lives only in the audit record.
    InvalidCredentials,
    /// Rejected before any directory lookup by the rate limiter.
    RateLimited,
    /// Account `lock_expiry` is in the future.
    AccountLocked,
    /// Account status is suspended, deleted or pending.
    AccountDisabled,
    /// User has no password hash (SSO-only account) on a password mechanism.
    NoPassword,
    /// Authentication succeeded.
    Success,
    /// Generic internal failure not covered by a more specific variant
    /// (malformed SASL wiring, protocol-step errors, etc).
    Error,
}

impl fmt::Display for AuthEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AuthEvent::TlsRequired => "tls_required",
            AuthEvent::InvalidCredentials => "invalid_credentials",
            AuthEvent::RateLimited => "rate_limited",
            AuthEvent::AccountLocked => "account_locked",
            AuthEvent::AccountDisabled => "account_disabled",
            AuthEvent::NoPassword => "no_password",
            AuthEvent::Success => "success",
            AuthEvent::Error => "error",
        };
        f.write_str(s)
    }
}

impl AuthEvent {
    pub fn into_err(self) -> crate::Error {
        crate::Error::new(EventType::Auth(self))
    }
}

/// OAuth2 validator events (spec §4.2, §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum Oauth2Event {
    InvalidToken,
    TokenExpired,
    /// Network or non-2xx/non-401 failure talking to a provider.
    ProviderError,
    UnsupportedProvider,
    /// Token email did not match the authentication identity
    /// (cross-checked by the Authenticator, recorded here too for the
    /// validator's own logs).
    EmailMismatch,
    CacheHit,
    CacheMiss,
}

impl fmt::Display for Oauth2Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Oauth2Event::InvalidToken => "invalid_token",
            Oauth2Event::TokenExpired => "token_expired",
            Oauth2Event::ProviderError => "provider_error",
            Oauth2Event::UnsupportedProvider => "unsupported_provider",
            Oauth2Event::EmailMismatch => "email_mismatch",
            Oauth2Event::CacheHit => "cache_hit",
            Oauth2Event::CacheMiss => "cache_miss",
        };
        f.write_str(s)
    }
}

impl Oauth2Event {
    pub fn into_err(self) -> crate::Error {
        crate::Error::new(EventType::Oauth2(self))
    }
}

/// ARC signer/verifier events (spec §4.3, §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum ArcEvent {
    Signed,
    Verified,
    /// Next instance number would exceed the 50-hop limit.
    ChainTooLong,
    /// Structural or density failure in an existing chain.
    ChainInvalid,
    /// No signing key registered for the domain.
    NoSigningKey,
}

impl fmt::Display for ArcEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ArcEvent::Signed => "signed",
            ArcEvent::Verified => "verified",
            ArcEvent::ChainTooLong => "chain_too_long",
            ArcEvent::ChainInvalid => "chain_invalid",
            ArcEvent::NoSigningKey => "no_signing_key",
        };
        f.write_str(s)
    }
}

impl ArcEvent {
    pub fn into_err(self) -> crate::Error {
        crate::Error::new(EventType::Arc(self))
    }
}

/// Configuration-loading events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum ConfigEvent {
    InvalidValue,
    MissingRequiredValue,
}

impl fmt::Display for ConfigEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConfigEvent::InvalidValue => "invalid_value",
            ConfigEvent::MissingRequiredValue => "missing_required_value",
        };
        f.write_str(s)
    }
}

impl ConfigEvent {
    pub fn into_err(self) -> crate::Error {
        crate::Error::new(EventType::Config(self))
    }
}

pub fn severity(event: &EventType) -> Severity {
    match event {
        EventType::Auth(AuthEvent::Success) => Severity::Info,
        EventType::Auth(AuthEvent::TlsRequired | AuthEvent::Error) => Severity::Warn,
        EventType::Auth(_) => Severity::Info,
        EventType::Oauth2(Oauth2Event::ProviderError) => Severity::Warn,
        EventType::Oauth2(Oauth2Event::CacheHit | Oauth2Event::CacheMiss) => Severity::Debug,
        EventType::Oauth2(_) => Severity::Info,
        EventType::Arc(ArcEvent::ChainInvalid | ArcEvent::NoSigningKey) => Severity::Warn,
        EventType::Arc(_) => Severity::Info,
        EventType::Config(_) => Severity::Error,
    }
}
