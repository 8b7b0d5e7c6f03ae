/*
 * SPDX-FileCopyrightText: 2024 A3Mailer Project
 *
 * SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-SEL
 */

use async_trait::async_trait;

use crate::model::DkimKey;

/// Signing-key lookup the ARC signer depends on (spec §4.3).
#[async_trait]
pub trait KeyProvider: Send + Sync {
    /// Returns the single active DKIM/ARC key for `domain`, or `None` if
    /// the domain has no key provisioned. A domain with more than one key
    /// marked active is a configuration error upstream of this trait; the
    /// provider is expected to resolve that ambiguity itself (most recent
    /// wins) rather than surface it here.
    async fn get_active_dkim_key(&self, domain: &str) -> trc::Result<Option<DkimKey>>;
}
