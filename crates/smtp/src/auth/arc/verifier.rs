/*
 * SPDX-FileCopyrightText: 2024 A3Mailer Project
 *
 * SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-SEL
 */

use std::collections::{HashMap, HashSet};

use base64::Engine;
use rsa::pkcs1v15::Signature;
use rsa::pkcs8::DecodePublicKey;
use rsa::signature::Verifier as _;
use rsa::{pkcs1v15::VerifyingKey, RsaPublicKey};
use sha2::{Digest, Sha256};

use super::canonicalize::{canonicalize_body, canonicalize_header, Canonicalization};
use super::headers::{headers_named, split_message, RawHeader};

/// Overall chain outcome (spec §4.4, RFC 8617 `cv=` values plus `none`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainValidation {
    /// No ARC headers present at all.
    None,
    /// Every ARC set verified.
    Pass,
    /// A structural or density problem, or a verified-bad signature.
    Fail,
    /// Structurally sound but no key was available to check a signature
    /// (spec.md §9 open-question resolution: never silently reported as
    /// `Pass`).
    Unknown,
}

impl ChainValidation {
    pub fn as_tag(self) -> &'static str {
        match self {
            ChainValidation::None => "none",
            ChainValidation::Pass => "pass",
            ChainValidation::Fail => "fail",
            ChainValidation::Unknown => "unknown",
        }
    }
}

/// The Verifier's full answer (spec §4.4).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainResult {
    pub validation: ChainValidation,
    pub total_sets: u32,
    /// Set when `validation` is `Fail`: the first instance whose Seal or
    /// Message-Signature did not verify.
    pub failing_instance: Option<u32>,
}

/// Resolves an ARC/DKIM public key (DER SubjectPublicKeyInfo) for a
/// `(domain, selector)` pair, typically backed by a DNS TXT lookup. The
/// default used by this crate's own tests never resolves anything, which
/// is exactly the `Unknown`-not-`Pass` case spec.md's open questions call
/// for.
pub trait PublicKeySource {
    fn resolve(&self, domain: &str, selector: &str) -> Option<Vec<u8>>;
}

/// A [`PublicKeySource`] that never finds a key.
pub struct NoKeySource;

impl PublicKeySource for NoKeySource {
    fn resolve(&self, _domain: &str, _selector: &str) -> Option<Vec<u8>> {
        None
    }
}

struct ArcSet {
    instance: u32,
    seal: RawHeader,
    seal_tags: HashMap<String, String>,
    signature: RawHeader,
    signature_tags: HashMap<String, String>,
    results: Option<RawHeader>,
}

/// Verifies the ARC chain in `message` (spec §4.4 steps 1-5).
pub fn verify_arc(message: &[u8], keys: &dyn PublicKeySource) -> ChainResult {
    let (headers, body) = split_message(message);

    let seals = headers_named(&headers, "arc-seal");
    if seals.is_empty() {
        return ChainResult {
            validation: ChainValidation::None,
            total_sets: 0,
            failing_instance: None,
        };
    }

    let signatures = headers_named(&headers, "arc-message-signature");
    let results = headers_named(&headers, "arc-authentication-results");

    let mut sets = Vec::new();
    for seal in &seals {
        let seal_tags = parse_tags(&seal.value);
        let Some(instance) = seal_tags.get("i").and_then(|v| v.parse::<u32>().ok()) else {
            return fail(seals.len() as u32, None);
        };
        if !has_all(&seal_tags, &["i", "a", "cv", "d", "s", "b"]) {
            return fail(seals.len() as u32, Some(instance));
        }

        let Some(signature) = signatures
            .iter()
            .find(|h| tag(&h.value, "i") == seal_tags.get("i").map(|s| s.as_str()))
        else {
            return fail(seals.len() as u32, Some(instance));
        };
        let signature_tags = parse_tags(&signature.value);
        if !has_all(&signature_tags, &["i", "a", "c", "d", "s", "h", "bh", "b"]) {
            return fail(seals.len() as u32, Some(instance));
        }
        if signature_tags.get("i") != Some(&instance.to_string()) {
            return fail(seals.len() as u32, Some(instance));
        }

        let result_header = results
            .iter()
            .find(|h| tag(&h.value, "i") == Some(&instance.to_string()))
            .map(|h| (*h).clone());

        sets.push(ArcSet {
            instance,
            seal: (*seal).clone(),
            seal_tags,
            signature: (*signature).clone(),
            signature_tags,
            results: result_header,
        });
    }

    sets.sort_by_key(|s| s.instance);
    let total = sets.len() as u32;

    let instance_set: HashSet<u32> = sets.iter().map(|s| s.instance).collect();
    let expected: HashSet<u32> = (1..=total).collect();
    if instance_set != expected {
        return fail(total, None);
    }

    let mut any_unknown = false;
    for (idx, set) in sets.iter().enumerate() {
        match verify_set(set, &headers, body, keys) {
            SetOutcome::Pass => {}
            SetOutcome::Unknown => any_unknown = true,
            SetOutcome::Fail => {
                return ChainResult {
                    validation: ChainValidation::Fail,
                    total_sets: total,
                    failing_instance: Some(sets[idx].instance),
                };
            }
        }
    }

    ChainResult {
        validation: if any_unknown {
            ChainValidation::Unknown
        } else {
            ChainValidation::Pass
        },
        total_sets: total,
        failing_instance: None,
    }
}

enum SetOutcome {
    Pass,
    Fail,
    Unknown,
}

fn verify_set(
    set: &ArcSet,
    all_headers: &[RawHeader],
    body: &[u8],
    keys: &dyn PublicKeySource,
) -> SetOutcome {
    let Some(domain) = set.signature_tags.get("d") else {
        return SetOutcome::Fail;
    };
    let Some(selector) = set.signature_tags.get("s") else {
        return SetOutcome::Fail;
    };

    let Some((header_canon, body_canon)) = set
        .signature_tags
        .get("c")
        .and_then(|c| c.split_once('/'))
        .map(|(h, b)| (parse_canon(h), parse_canon(b)))
    else {
        return SetOutcome::Fail;
    };

    let canonical_body = canonicalize_body(body_canon, body);
    let expected_bh = base64::engine::general_purpose::STANDARD.encode(Sha256::digest(&canonical_body));
    if set.signature_tags.get("bh") != Some(&expected_bh) {
        return SetOutcome::Fail;
    }

    let Some(key_der) = keys.resolve(domain, selector) else {
        return SetOutcome::Unknown;
    };
    let Ok(public_key) = RsaPublicKey::from_public_key_der(&key_der) else {
        return SetOutcome::Fail;
    };

    let h_list: Vec<&str> = set
        .signature_tags
        .get("h")
        .map(|h| h.split(':').collect())
        .unwrap_or_default();

    let mut ams_data_block = String::new();
    for name in &h_list {
        if let Some(header) = headers_named(all_headers, name).first() {
            ams_data_block.push_str(&canonicalize_header(header_canon, &header.name, &header.value));
            ams_data_block.push_str("\r\n");
        }
    }
    let ams_params_no_b = strip_b_tag(&set.signature.value);
    ams_data_block.push_str("arc-message-signature:");
    ams_data_block.push_str(&ams_params_no_b);

    if !verify_signature(&public_key, ams_data_block.as_bytes(), &set.signature_tags) {
        return SetOutcome::Fail;
    }

    let as_params_no_b = strip_b_tag(&set.seal.value);
    let mut as_data_block = String::new();
    for prior in 1..set.instance {
        for name in ["arc-seal", "arc-message-signature", "arc-authentication-results"] {
            if let Some(h) = headers_named(all_headers, name)
                .into_iter()
                .find(|h| tag(&h.value, "i") == Some(&prior.to_string()))
            {
                as_data_block.push_str(&canonicalize_header(header_canon, &h.name, &h.value));
                as_data_block.push_str("\r\n");
            }
        }
    }
    if let Some(results) = &set.results {
        as_data_block.push_str(&canonicalize_header(header_canon, &results.name, &results.value));
        as_data_block.push_str("\r\n");
    }
    as_data_block.push_str(&canonicalize_header(
        header_canon,
        &set.signature.name,
        &set.signature.value,
    ));
    as_data_block.push_str("\r\n");
    as_data_block.push_str("arc-seal:");
    as_data_block.push_str(&as_params_no_b);

    if !verify_signature(&public_key, as_data_block.as_bytes(), &set.seal_tags) {
        return SetOutcome::Fail;
    }

    SetOutcome::Pass
}

fn verify_signature(public_key: &RsaPublicKey, data: &[u8], tags: &HashMap<String, String>) -> bool {
    let Some(b64) = tags.get("b") else {
        return false;
    };
    let cleaned: String = b64.chars().filter(|c| !c.is_whitespace()).collect();
    let Ok(sig_bytes) = base64::engine::general_purpose::STANDARD.decode(cleaned) else {
        return false;
    };
    let Ok(signature) = Signature::try_from(sig_bytes.as_slice()) else {
        return false;
    };
    let verifying_key = VerifyingKey::<Sha256>::new(public_key.clone());
    verifying_key.verify(data, &signature).is_ok()
}

/// Recovers the exact parameter string the Signer hashed, by cutting the
/// header value right before its trailing `b=` tag (the signature itself
/// never contains `;`, so this is unambiguous).
fn strip_b_tag(value: &str) -> String {
    match value.rfind("; b=").or_else(|| value.rfind(" b=")) {
        Some(idx) => value[..idx + 2].to_string(),
        None => value.to_string(),
    }
}

fn parse_canon(s: &str) -> Canonicalization {
    if s.trim() == "simple" {
        Canonicalization::Simple
    } else {
        Canonicalization::Relaxed
    }
}

fn parse_tags(value: &str) -> HashMap<String, String> {
    value
        .split(';')
        .filter_map(|tag| {
            let tag = tag.trim();
            let (k, v) = tag.split_once('=')?;
            Some((k.trim().to_string(), v.trim().replace(['\r', '\n', '\t'], "")))
        })
        .collect()
}

fn tag<'a>(value: &'a str, key: &str) -> Option<&'a str> {
    value.split(';').find_map(|t| {
        let t = t.trim();
        t.strip_prefix(&format!("{key}="))
    })
}

fn has_all(tags: &HashMap<String, String>, required: &[&str]) -> bool {
    required.iter().all(|k| tags.contains_key(*k))
}

fn fail(total: u32, failing_instance: Option<u32>) -> ChainResult {
    ChainResult {
        validation: ChainValidation::Fail,
        total_sets: total,
        failing_instance,
    }
}
