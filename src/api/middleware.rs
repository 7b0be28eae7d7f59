//! Bearer token authentication
//!
//! Applied to every route except health, register and login. Verifies the
//! token, then loads the account it names and attaches it to the request.

use axum::{
    body::Body,
    extract::State,
    http::{header, Request},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use crate::api::response::ApiError;
use crate::storage::models::Account;
use crate::storage::StoreError;
use crate::tokens::extract_bearer;
use crate::AppState;

/// The authenticated account, available to handlers as an `Extension`.
#[derive(Debug, Clone)]
pub struct CurrentAccount(pub Account);

const CHALLENGE: &str = "Could not validate credentials";

pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(extract_bearer)
        .ok_or_else(|| ApiError::unauthenticated("Not authenticated"))?;

    let account_id = state.tokens.verify(token)?;

    let db = state.db.clone();
    let account = match tokio::task::spawn_blocking(move || db.get_account(account_id)).await? {
        Ok(account) => account,
        Err(StoreError::NotFound(_)) => {
            tracing::debug!(account_id, "Token names an unknown account");
            return Err(ApiError::unauthenticated(CHALLENGE));
        }
        Err(e) => return Err(e.into()),
    };

    if !account.is_active {
        tracing::debug!(account_id, "Token names an inactive account");
        return Err(ApiError::unauthenticated(CHALLENGE));
    }

    request.extensions_mut().insert(CurrentAccount(account));
    Ok(next.run(request).await)
}
