//! Shared test helpers, available to all `#[cfg(test)]` modules in the crate.

use std::sync::Arc;

use tempfile::TempDir;

use crate::config::{CirculationConfig, Config, ServerConfig, TokenConfig};
use crate::storage::models::{Book, Member, NewAccount, NewBook, NewMember};
use crate::storage::Database;
use crate::AppState;

/// Open a fresh database in a temporary directory.
///
/// Returns both the `Database` and the `TempDir` guard. The caller must
/// keep the `TempDir` alive for the duration of the test.
pub fn setup_db() -> (Database, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db = Database::open(temp_dir.path()).unwrap();
    (db, temp_dir)
}

/// A minimal `Config` suitable for unit tests.
pub fn test_config() -> Config {
    Config {
        circulation: CirculationConfig::default(),
        demo_login: false,
        dev_mode: true,
        server: ServerConfig::default(),
        tokens: TokenConfig {
            secret: "unit-test-secret-unit-test-secret-0000".to_string(),
            ttl_seconds: 3600,
        },
    }
}

/// Build a full `Arc<AppState>` around the given database.
pub fn test_state(db: Database) -> Arc<AppState> {
    Arc::new(AppState::new(test_config(), db).unwrap())
}

/// A catalog entry; only the ISBN differs between calls.
pub fn new_book(isbn: &str) -> NewBook {
    NewBook {
        author: "Ursula K. Le Guin".to_string(),
        category: "Fiction".to_string(),
        copies: 1,
        isbn: isbn.to_string(),
        status: Default::default(),
        title: "The Dispossessed".to_string(),
    }
}

/// An active basic member with the given email.
pub fn new_member(email: &str) -> NewMember {
    NewMember {
        email: email.to_string(),
        membership_type: Default::default(),
        name: "Test Member".to_string(),
        phone: "555-0100".to_string(),
        status: Default::default(),
    }
}

/// Account input with a placeholder hash; email is `{username}@library.test`.
pub fn new_account(username: &str) -> NewAccount {
    NewAccount {
        email: format!("{username}@library.test"),
        password_hash: "$argon2id$placeholder".to_string(),
        username: username.to_string(),
    }
}

pub fn seed_book(db: &Database, isbn: &str) -> Book {
    db.create_book(new_book(isbn)).unwrap()
}

pub fn seed_member(db: &Database, email: &str) -> Member {
    db.create_member(new_member(email)).unwrap()
}
