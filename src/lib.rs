//! library-manager - A small library circulation service
//!
//! This crate tracks books, members and borrow/return transactions with:
//! - Borrow and return as single atomic units of work
//! - Signed bearer tokens and Argon2id account passwords
//! - redb embedded database (ACID, MVCC, crash-safe)
//! - REST API with JSend responses

pub mod api;
pub mod circulation;
pub mod config;
pub mod storage;
#[cfg(test)]
pub mod testutil;
pub mod tokens;

use config::Config;
use storage::Database;
use tokens::TokenService;

/// Shared application state
pub struct AppState {
    pub config: Config,
    pub db: Database,
    pub tokens: TokenService,
}

impl AppState {
    pub fn new(config: Config, db: Database) -> Result<Self, tokens::TokenError> {
        let tokens = TokenService::new(&config.tokens.secret, config.tokens.ttl_seconds)?;
        Ok(Self { config, db, tokens })
    }
}
