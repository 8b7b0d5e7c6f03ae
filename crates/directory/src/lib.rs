/*
 * SPDX-FileCopyrightText: 2024 A3Mailer Project
 *
 * SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-SEL
 */

//! The user directory: account data, the [`Repository`] and [`KeyProvider`]
//! contracts the authenticator and ARC signer depend on, and bcrypt
//! password verification.
//!
//! This crate defines contracts, not a concrete backend. A production
//! deployment supplies its own [`Repository`]/[`KeyProvider`] pair backed
//! by whatever store holds account data; [`testing::MemoryDirectory`]
//! supplies an in-process pair for this workspace's own tests.

pub mod key_provider;
pub mod model;
pub mod password;
pub mod repository;
pub mod testing;

pub use key_provider::KeyProvider;
pub use model::{AuthResult, DkimKey, EmailAddress, SigningAlgorithm, User, UserStatus};
pub use password::verify_password;
pub use repository::{AuthMechanism, AuthMethod, LoginAttempt, LoginFailureReason, Repository};
