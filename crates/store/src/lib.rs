/*
 * SPDX-FileCopyrightText: 2024 A3Mailer Project
 *
 * SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-SEL
 */

//! The Redis-backed stores this subsystem needs: a distributed login-failure
//! rate limiter and a validated-token cache.
//!
//! The teacher's `store` crate fans out over a dozen backends behind
//! Cargo features (RocksDB, FoundationDB, Postgres, S3, Elasticsearch...);
//! a trust subsystem that only ever talks to Redis keeps the connection
//! wrapper and the `fail open, never fail closed` philosophy but drops
//! every backend this domain has no use for.

pub mod rate_limiter;
pub mod testing;
pub mod token_cache;

pub use rate_limiter::{LimitCheck, RateLimiter, RateLimiting};
pub use token_cache::TokenCache;

use redis::aio::ConnectionManager;

/// A cheap-to-clone Redis handle shared by the rate limiter and the token
/// cache. `ConnectionManager` reconnects transparently, so callers never
/// need to special-case a dropped connection — only a failed command.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    pub async fn connect(url: &str) -> trc::Result<Self> {
        let client = redis::Client::open(url).map_err(|e| {
            trc::ConfigEvent::InvalidValue
                .into_err()
                .details("redis url")
                .caused_by(e)
        })?;
        let conn = client.get_connection_manager().await.map_err(|e| {
            trc::ConfigEvent::InvalidValue
                .into_err()
                .details("redis connect")
                .caused_by(e)
        })?;
        Ok(Self { conn })
    }

    pub(crate) fn connection(&self) -> ConnectionManager {
        self.conn.clone()
    }
}
