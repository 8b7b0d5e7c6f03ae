/*
 * SPDX-FileCopyrightText: 2024 A3Mailer Project
 *
 * SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-SEL
 */

//! Builds the append-only [`LoginAttempt`] row the Authenticator hands to
//! the repository at the end of every attempt (spec §3, §4.1 steps 9-10).

use chrono::Utc;
use directory::{AuthMechanism, LoginAttempt, LoginFailureReason};

use crate::mask::mask_email;

/// Serializes a [`LoginAttempt`] to a structured log line and emits it at
/// `info` (success) or `warn` (failure), mirroring the teacher's
/// `AuditLogger::to_structured_log` shape without the enterprise-only
/// sinks (SIEM export, file rotation) that shape also carried.
pub fn log(attempt: &LoginAttempt) {
    let json = serde_json::to_string(attempt).unwrap_or_else(|_| "{}".to_string());
    if attempt.succeeded {
        tracing::info!(target: "trust_audit", "{json}");
    } else {
        tracing::warn!(target: "trust_audit", "{json}");
    }
}

/// Builds a successful [`LoginAttempt`] row.
pub fn success(user_id: Option<&str>, email: &str, client_ip: &str, mechanism: AuthMechanism) -> LoginAttempt {
    LoginAttempt {
        user_id: user_id.map(str::to_string),
        masked_email: mask_email(email),
        client_ip: client_ip.to_string(),
        method: mechanism.method(),
        succeeded: true,
        failure_reason: None,
        occurred_at: Utc::now(),
    }
}

/// Builds a failed [`LoginAttempt`] row.
pub fn failure(
    user_id: Option<&str>,
    email: &str,
    client_ip: &str,
    mechanism: AuthMechanism,
    reason: LoginFailureReason,
) -> LoginAttempt {
    LoginAttempt {
        user_id: user_id.map(str::to_string),
        masked_email: mask_email(email),
        client_ip: client_ip.to_string(),
        method: mechanism.method(),
        succeeded: false,
        failure_reason: Some(reason),
        occurred_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use directory::AuthMethod;

    #[test]
    fn success_row_masks_email_and_has_no_reason() {
        let row = success(Some("user-A"), "alice@example.com", "203.0.113.1", AuthMechanism::Plain);
        assert!(row.succeeded);
        assert!(row.failure_reason.is_none());
        assert_eq!(row.masked_email, "a***e@example.com");
        assert_eq!(row.user_id, Some("user-A".to_string()));
    }

    #[test]
    fn failure_row_carries_reason() {
        let row = failure(
            Some("user-A"),
            "alice@example.com",
            "203.0.113.1",
            AuthMechanism::Plain,
            LoginFailureReason::WrongPassword,
        );
        assert!(!row.succeeded);
        assert_eq!(row.failure_reason, Some(LoginFailureReason::WrongPassword));
    }

    #[test]
    fn unknown_identity_failure_has_no_user_id() {
        let row = failure(None, "nobody@example.com", "203.0.113.1", AuthMechanism::Plain, LoginFailureReason::UnknownIdentity);
        assert_eq!(row.user_id, None);
    }

    #[test]
    fn method_tag_collapses_wire_mechanism() {
        let smtp_row = success(None, "a@example.com", "203.0.113.1", AuthMechanism::Login);
        let oauth_row = success(None, "a@example.com", "203.0.113.1", AuthMechanism::XOauth2);
        assert_eq!(smtp_row.method, AuthMethod::Smtp);
        assert_eq!(oauth_row.method, AuthMethod::Oauth2);
    }
}
