/*
 * SPDX-FileCopyrightText: 2024 A3Mailer Project
 *
 * SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-SEL
 */

//! ARC (Authenticated Received Chain, RFC 8617) signing and verification.
//!
//! The teacher's DKIM/ARC modules delegate the actual cryptography to
//! `mail-auth`; this subsystem implements RFC 8617 §4-5 directly against
//! `rsa`/`sha2`, since the whole point of this crate is the ARC state
//! machine itself, not a thin wrapper around an existing implementation.

pub mod canonicalize;
pub mod headers;
pub mod signer;
pub mod verifier;

pub use canonicalize::Canonicalization;
pub use signer::{sign_arc, SignError};
pub use verifier::{verify_arc, ChainResult, ChainValidation, NoKeySource, PublicKeySource};

/// Upstream authentication-method outcomes the caller hands to the Signer
/// (spec §4.3 "a list of upstream AuthResults"); rendered verbatim into
/// the `arc-authentication-results` header.
#[derive(Debug, Clone)]
pub struct MethodResult {
    pub method: String,
    pub result: String,
}

impl MethodResult {
    pub fn new(method: impl Into<String>, result: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            result: result.into(),
        }
    }
}

/// Headers (spec §4.3 step 3's default list) considered for the AMS `h=`
/// tag, in signing-priority order. Only headers actually present in the
/// message are included.
pub const DEFAULT_SIGNED_HEADERS: &[&str] = &[
    "from",
    "to",
    "cc",
    "subject",
    "date",
    "message-id",
    "reply-to",
    "references",
    "in-reply-to",
    "content-type",
    "mime-version",
    "dkim-signature",
];

/// Folds a base64 signature to 72-character lines joined by `\r\n\t`
/// (spec §4.3 step 3/4).
pub fn fold_signature(b64: &str) -> String {
    let mut out = String::with_capacity(b64.len() + b64.len() / 72 * 3);
    for (i, chunk) in b64.as_bytes().chunks(72).enumerate() {
        if i > 0 {
            out.push_str("\r\n\t");
        }
        out.push_str(std::str::from_utf8(chunk).unwrap());
    }
    out
}
