/*
 * SPDX-FileCopyrightText: 2024 A3Mailer Project
 *
 * SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-SEL
 */

use pwhash::bcrypt;

/// Verifies `candidate` against a stored bcrypt hash (spec §4.1 step 6).
///
/// `bcrypt::verify` re-derives the hash with the salt and cost embedded in
/// `hash` and compares the two digests in constant time; a malformed hash
/// is treated as a verification failure rather than propagated, since the
/// caller only ever needs to know pass/fail.
pub fn verify_password(candidate: &str, hash: &str) -> bool {
    bcrypt::verify(candidate, hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_bcrypt() {
        let hash = bcrypt::hash("correct horse battery staple").unwrap();
        assert!(verify_password("correct horse battery staple", &hash));
        assert!(!verify_password("wrong password", &hash));
    }

    #[test]
    fn malformed_hash_never_verifies() {
        assert!(!verify_password("anything", "not-a-bcrypt-hash"));
    }
}
