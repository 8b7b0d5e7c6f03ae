/*
 * SPDX-FileCopyrightText: 2024 A3Mailer Project
 *
 * SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-SEL
 */

//! Structured events and a closed-set error taxonomy shared by the
//! authenticator, the OAuth2 validator and the ARC signer/verifier.
//!
//! Every fallible operation in this workspace returns [`Result<T>`], and
//! every event worth logging goes through [`event!`] rather than a bare
//! `tracing::info!`, so that a single masking/formatting policy applies
//! everywhere an email address or a security outcome is recorded.

use std::fmt;

pub mod events;

pub use events::{ArcEvent, AuthEvent, ConfigEvent, EventType, Oauth2Event};

/// Severity bucket an [`EventType`] maps to for log-level selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Debug,
    Info,
    Warn,
    Error,
}

/// The error type returned by every public operation in this workspace.
///
/// Carries the closed-set [`EventType`] that the client-visible failure
/// taxonomy (spec §7) is built from, plus an optional free-text detail
/// string for logs and an optional cause chain. `Display` never includes
/// the detail string by default for [`EventType`] variants that are
/// externally visible credential failures, so that accidentally
/// `format!("{err}")`-ing an error into a client response cannot leak
/// more than the taxonomy allows; call [`Error::detail`] explicitly for
/// logging.
#[derive(Debug, Clone)]
pub struct Error {
    event: EventType,
    detail: Option<String>,
    cause: Option<String>,
}

impl Error {
    pub fn new(event: EventType) -> Self {
        Self {
            event,
            detail: None,
            cause: None,
        }
    }

    pub fn details(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn caused_by(mut self, cause: impl fmt::Display) -> Self {
        self.cause = Some(cause.to_string());
        self
    }

    pub fn event_type(&self) -> &EventType {
        &self.event
    }

    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    /// True if this error was raised for the given event kind. Mirrors the
    /// teacher's `err.matches(trc::EventType::Auth(trc::AuthEvent::Failed))`
    /// call used to decide whether to bump an auth-failure counter.
    pub fn matches(&self, event: EventType) -> bool {
        self.event == event
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.event)?;
        if let Some(detail) = &self.detail {
            write!(f, ": {detail}")?;
        }
        if let Some(cause) = &self.cause {
            write!(f, " (caused by: {cause})")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {}

/// Result alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, Error>;

/// Emit a structured event at the severity its [`EventType`] maps to.
///
/// ```ignore
/// trc::event!(
///     trc::EventType::Auth(trc::AuthEvent::Success),
///     identity = masked_email,
///     client_ip = client_ip,
/// );
/// ```
#[macro_export]
macro_rules! event {
    ($event:expr $(, $key:ident = $val:expr)* $(,)?) => {{
        let __evt = $event;
        #[allow(unused_mut)]
        let mut __fields = String::new();
        $(
            __fields.push_str(&format!(" {}={}", stringify!($key), $val));
        )*
        match $crate::events::severity(&__evt) {
            $crate::Severity::Debug => tracing::debug!("{}{}", __evt, __fields),
            $crate::Severity::Info => tracing::info!("{}{}", __evt, __fields),
            $crate::Severity::Warn => tracing::warn!("{}{}", __evt, __fields),
            $crate::Severity::Error => tracing::error!("{}{}", __evt, __fields),
        }
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_matches_its_own_event() {
        let err = Error::new(EventType::Auth(AuthEvent::InvalidCredentials)).details("bad password");
        assert!(err.matches(EventType::Auth(AuthEvent::InvalidCredentials)));
        assert!(!err.matches(EventType::Auth(AuthEvent::TlsRequired)));
        assert!(format!("{err}").contains("bad password"));
    }

    #[test]
    fn event_macro_compiles_with_and_without_fields() {
        event!(EventType::Auth(AuthEvent::Success));
        event!(EventType::Oauth2(Oauth2Event::CacheHit), identity = "a***b@example.com");
    }
}
