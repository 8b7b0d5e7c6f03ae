/*
 * SPDX-FileCopyrightText: 2024 A3Mailer Project
 *
 * SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-SEL
 */

//! Configuration, email masking, SASL wire decoding and audit-row shaping
//! shared by the Authenticator and the OAuth2 Validator.

pub mod audit;
pub mod config;
pub mod mask;
pub mod sasl;

pub use config::TrustConfig;
pub use mask::mask_email;
