/*
 * SPDX-FileCopyrightText: 2024 A3Mailer Project
 *
 * SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-SEL
 */

//! SMTP-edge trust subsystem: SASL authentication, OAuth2 bearer-token
//! validation and ARC signing/verification.

pub mod auth;

pub use auth::arc::{sign_arc, verify_arc, ChainResult, ChainValidation, MethodResult, PublicKeySource};
pub use auth::oauth2::{Provider, TokenInfo, TokenValidator, Validator};
pub use auth::{Authenticator, LoginStepOutcome};
