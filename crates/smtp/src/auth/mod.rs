/*
 * SPDX-FileCopyrightText: 2024 A3Mailer Project
 *
 * SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-SEL
 */

//! SASL authentication, OAuth2 bearer-token validation and ARC chains —
//! the three trust mechanisms this crate implements.

pub mod arc;
pub mod authenticator;
pub mod oauth2;

pub use authenticator::{Authenticator, LoginStepOutcome};
