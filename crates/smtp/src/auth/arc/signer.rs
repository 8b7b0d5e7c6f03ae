/*
 * SPDX-FileCopyrightText: 2024 A3Mailer Project
 *
 * SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-SEL
 */

use base64::Engine;
use rsa::pkcs8::DecodePrivateKey;
use rsa::{Pkcs1v15Sign, RsaPrivateKey};
use sha2::{Digest, Sha256};

use directory::DkimKey;

use super::canonicalize::{canonicalize_body, canonicalize_header, Canonicalization};
use super::headers::{headers_named, split_message};
use super::{fold_signature, MethodResult, DEFAULT_SIGNED_HEADERS};

const MAX_CHAIN_LENGTH: u32 = 50;

/// Failure modes for [`sign_arc`] (spec §4.3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignError {
    /// The chain already has 50 instances; a 51st would exceed the limit.
    ChainTooLong,
    /// The signing key's bytes don't decode as a PKCS#8 RSA private key.
    MalformedKey,
    /// The RSA signing operation itself failed.
    SigningFailed,
}

/// Signs `message` for `domain`, producing the three new ARC header lines
/// in emission order (AS, AMS, AAR) to prepend to the message (spec §4.3
/// steps 1-5).
///
/// `chain_validation` is the Verifier's outcome over instances `1..i-1`,
/// or `"none"` when this is instance 1.
pub fn sign_arc(
    message: &[u8],
    key: &DkimKey,
    chain_validation: &str,
    auth_results: &[MethodResult],
    authserv_id: &str,
    signed_at: i64,
) -> Result<Vec<String>, SignError> {
    let (headers, body) = split_message(message);

    let instance = next_instance(&headers)?;

    let private_key =
        RsaPrivateKey::from_pkcs8_der(&key.private_key_pkcs8_der).map_err(|_| SignError::MalformedKey)?;

    let body_canon = Canonicalization::Relaxed;
    let header_canon = Canonicalization::Relaxed;

    let aar_value = build_aar_value(instance, authserv_id, chain_validation, auth_results);

    let canonical_body = canonicalize_body(body_canon, body);
    let bh = base64::engine::general_purpose::STANDARD.encode(Sha256::digest(&canonical_body));

    let signed_header_names: Vec<&str> = DEFAULT_SIGNED_HEADERS
        .iter()
        .copied()
        .filter(|name| !headers_named(&headers, name).is_empty())
        .collect();
    let h_list = signed_header_names.join(":");

    let ams_params = format!(
        "i={instance}; a=rsa-sha256; c={}/{}; d={}; s={}; t={signed_at}; h={h_list}; bh={bh}; ",
        header_canon.as_str(),
        body_canon.as_str(),
        key.domain,
        key.selector,
    );

    let mut ams_data_block = String::new();
    for name in &signed_header_names {
        if let Some(header) = headers_named(&headers, name).first() {
            ams_data_block.push_str(&canonicalize_header(header_canon, &header.name, &header.value));
            ams_data_block.push_str("\r\n");
        }
    }
    ams_data_block.push_str("arc-message-signature:");
    ams_data_block.push_str(&ams_params);

    let ams_signature = sign_bytes(&private_key, ams_data_block.as_bytes())?;
    let ams_value = format!("{ams_params}b={}", fold_signature(&ams_signature));

    let as_params = format!(
        "i={instance}; a=rsa-sha256; cv={chain_validation}; d={}; s={}; t={signed_at}; ",
        key.domain, key.selector,
    );

    let mut as_data_block = String::new();
    for prior in 1..instance {
        for (tag, value) in prior_instance_values(&headers, prior) {
            as_data_block.push_str(&canonicalize_header(header_canon, tag, &value));
            as_data_block.push_str("\r\n");
        }
    }
    as_data_block.push_str(&canonicalize_header(
        header_canon,
        "arc-authentication-results",
        &aar_value,
    ));
    as_data_block.push_str("\r\n");
    as_data_block.push_str(&canonicalize_header(
        header_canon,
        "arc-message-signature",
        &ams_value,
    ));
    as_data_block.push_str("\r\n");
    as_data_block.push_str("arc-seal:");
    as_data_block.push_str(&as_params);

    let as_signature = sign_bytes(&private_key, as_data_block.as_bytes())?;
    let as_value = format!("{as_params}b={}", fold_signature(&as_signature));

    Ok(vec![
        format!("ARC-Seal: {as_value}"),
        format!("ARC-Message-Signature: {ams_value}"),
        format!("ARC-Authentication-Results: {aar_value}"),
    ])
}

/// Prepends the signed headers to `message` in AS, AMS, AAR order (spec
/// §4.3 step 5).
pub fn prepend_headers(headers: &[String], message: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(message.len() + headers.iter().map(|h| h.len() + 2).sum::<usize>());
    for header in headers {
        out.extend_from_slice(header.as_bytes());
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(message);
    out
}

fn next_instance(headers: &[super::headers::RawHeader]) -> Result<u32, SignError> {
    let max = headers_named(headers, "arc-seal")
        .iter()
        .filter_map(|h| instance_tag(&h.value))
        .max()
        .unwrap_or(0);
    let next = max + 1;
    if next > MAX_CHAIN_LENGTH {
        return Err(SignError::ChainTooLong);
    }
    Ok(next)
}

fn instance_tag(params: &str) -> Option<u32> {
    params.split(';').find_map(|tag| {
        let tag = tag.trim();
        tag.strip_prefix("i=").and_then(|v| v.trim().parse().ok())
    })
}

fn build_aar_value(
    instance: u32,
    authserv_id: &str,
    chain_validation: &str,
    auth_results: &[MethodResult],
) -> String {
    let mut out = format!("i={instance}; {authserv_id}; arc={chain_validation}");
    for result in auth_results {
        out.push_str("; ");
        out.push_str(&result.method);
        out.push('=');
        out.push_str(&result.result);
    }
    out
}

/// Pulls the raw `arc-seal`/`arc-message-signature`/`arc-authentication-results`
/// values for one prior instance, in the fixed emission order (spec §4.3
/// step 4: "canonicalized arc-seal, then arc-message-signature, then
/// arc-authentication-results").
fn prior_instance_values(
    headers: &[super::headers::RawHeader],
    instance: u32,
) -> Vec<(&'static str, String)> {
    let mut out = Vec::with_capacity(3);
    for (name, tag) in [
        ("arc-seal", "arc-seal"),
        ("arc-message-signature", "arc-message-signature"),
        ("arc-authentication-results", "arc-authentication-results"),
    ] {
        if let Some(header) = headers_named(headers, name)
            .into_iter()
            .find(|h| instance_tag(&h.value) == Some(instance))
        {
            out.push((tag, header.value.clone()));
        }
    }
    out
}

fn sign_bytes(key: &RsaPrivateKey, data: &[u8]) -> Result<String, SignError> {
    let digest = Sha256::digest(data);
    let signature = key
        .sign(Pkcs1v15Sign::new::<Sha256>(), &digest)
        .map_err(|_| SignError::SigningFailed)?;
    Ok(base64::engine::general_purpose::STANDARD.encode(signature))
}
