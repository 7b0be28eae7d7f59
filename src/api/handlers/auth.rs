use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

use super::{timestamp, with_db};
use crate::api::middleware::CurrentAccount;
use crate::api::response::{ApiError, AppForm, AppJson, JSend};
use crate::storage::models::{Account, NewAccount};
use crate::tokens::{hash_password, verify_password, PasswordError};
use crate::AppState;

const BAD_CREDENTIALS: &str = "Incorrect username or password";

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
    #[validate(length(min = 1))]
    pub username: String,
}

/// Form-encoded, as sent by OAuth2 password-flow clients
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    pub password: String,
    #[validate(length(min = 1))]
    pub username: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub expires_in: i64,
    pub token_type: String,
}

#[derive(Debug, Serialize)]
pub struct AccountResponse {
    pub created_at: String,
    pub email: String,
    pub id: u64,
    pub is_active: bool,
    pub username: String,
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn register(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<RegisterRequest>,
) -> Result<(StatusCode, Json<JSend<AccountResponse>>), ApiError> {
    req.validate()?;

    let password_hash = hash(req.password).await?;
    let new = NewAccount {
        email: req.email,
        password_hash,
        username: req.username,
    };
    let account = with_db(&state, move |db| db.create_account(new)).await?;

    tracing::info!(account_id = account.id, username = %account.username, "Registered account");
    Ok(JSend::created(account_to_response(&account)))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    AppForm(req): AppForm<LoginRequest>,
) -> Result<Json<JSend<TokenResponse>>, ApiError> {
    req.validate()?;
    let username = req.username.trim().to_string();

    let lookup = username.clone();
    let existing = with_db(&state, move |db| db.find_account_by_username(&lookup)).await?;

    let account = match existing {
        Some(account) => {
            if !check(req.password, account.password_hash.clone()).await? {
                tracing::debug!(username = %username, "Login rejected: wrong password");
                return Err(ApiError::unauthenticated(BAD_CREDENTIALS));
            }
            account
        }
        None if state.config.demo_login => demo_account(&state, username, req.password).await?,
        None => {
            tracing::debug!(username = %username, "Login rejected: unknown username");
            return Err(ApiError::unauthenticated(BAD_CREDENTIALS));
        }
    };

    if !account.is_active {
        return Err(ApiError::unauthenticated("Inactive account"));
    }

    let access_token = state.tokens.issue(account.id)?;
    tracing::debug!(account_id = account.id, "Issued access token");

    Ok(JSend::success(TokenResponse {
        access_token,
        expires_in: state.tokens.ttl_seconds(),
        token_type: "bearer".to_string(),
    }))
}

pub async fn me(
    Extension(CurrentAccount(account)): Extension<CurrentAccount>,
) -> Json<JSend<AccountResponse>> {
    JSend::success(account_to_response(&account))
}

// ============================================================================
// Helpers
// ============================================================================

/// Demo mode: the first login on an empty store creates that account.
async fn demo_account(
    state: &AppState,
    username: String,
    password: String,
) -> Result<Account, ApiError> {
    let password_hash = hash(password).await?;
    let new = NewAccount {
        email: format!("{username}@demo.local"),
        password_hash,
        username,
    };
    with_db(state, move |db| db.create_first_account(new))
        .await?
        .ok_or_else(|| ApiError::unauthenticated(BAD_CREDENTIALS))
}

async fn hash(password: String) -> Result<String, ApiError> {
    Ok(tokio::task::spawn_blocking(move || hash_password(&password)).await??)
}

async fn check(password: String, hash: String) -> Result<bool, ApiError> {
    let verified = tokio::task::spawn_blocking(move || verify_password(&password, &hash)).await?;
    match verified {
        Ok(ok) => Ok(ok),
        Err(PasswordError::InvalidHash(e)) => {
            tracing::warn!(error = %e, "Stored password hash is unreadable");
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}

pub(crate) fn account_to_response(account: &Account) -> AccountResponse {
    AccountResponse {
        created_at: timestamp(account.created_at),
        email: account.email.clone(),
        id: account.id,
        is_active: account.is_active,
        username: account.username.clone(),
    }
}
