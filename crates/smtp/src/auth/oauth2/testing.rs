/*
 * SPDX-FileCopyrightText: 2024 A3Mailer Project
 *
 * SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-SEL
 */

//! A fixed-response [`TokenValidator`] fixture for tests that exercise
//! the authenticator without making a live HTTP call.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{TokenInfo, TokenValidator};

#[derive(Default)]
pub struct StaticValidator {
    responses: Mutex<HashMap<String, trc::Result<TokenInfo>>>,
}

impl StaticValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(self, token: &str, result: trc::Result<TokenInfo>) -> Self {
        self.responses.lock().unwrap().insert(token.to_string(), result);
        self
    }
}

#[async_trait]
impl TokenValidator for StaticValidator {
    async fn validate_token(&self, token: &str) -> trc::Result<TokenInfo> {
        self.responses
            .lock()
            .unwrap()
            .get(token)
            .cloned()
            .unwrap_or_else(|| Err(trc::Oauth2Event::InvalidToken.into_err().details("no fixture for token")))
    }
}
