use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

use super::{timestamp, with_db, DeletedResponse, PaginationParams};
use crate::api::response::{ApiError, AppJson, AppPath, AppQuery, JSend, JSendPaginated};
use crate::storage::models::{
    Member, MemberFilter, MemberPatch, MemberStats, MemberStatus, MembershipType, NewMember,
};
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ListMembersParams {
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default, alias = "skip")]
    pub offset: Option<u32>,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub status: Option<MemberStatus>,
}

#[derive(Debug, Serialize)]
pub struct MemberResponse {
    pub active_loan_count: u32,
    pub created_at: String,
    pub email: String,
    pub id: u64,
    pub joined_at: String,
    pub membership_type: MembershipType,
    pub name: String,
    pub phone: String,
    pub status: MemberStatus,
    pub updated_at: String,
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn list_members(
    State(state): State<Arc<AppState>>,
    AppQuery(params): AppQuery<ListMembersParams>,
) -> Result<Json<JSendPaginated<MemberResponse>>, ApiError> {
    let page = PaginationParams::new(params.limit, params.offset)?;
    let filter = MemberFilter {
        search: params.search,
        status: params.status,
    };

    let members = with_db(&state, move |db| db.list_members(&filter)).await?;
    let (members, pagination) = page.apply(members);
    let items = members.iter().map(member_to_response).collect();
    Ok(JSendPaginated::success(items, pagination))
}

pub async fn create_member(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<NewMember>,
) -> Result<(StatusCode, Json<JSend<MemberResponse>>), ApiError> {
    req.validate()?;
    let member = with_db(&state, move |db| db.create_member(req)).await?;
    Ok(JSend::created(member_to_response(&member)))
}

pub async fn get_member(
    State(state): State<Arc<AppState>>,
    AppPath(id): AppPath<u64>,
) -> Result<Json<JSend<MemberResponse>>, ApiError> {
    let member = with_db(&state, move |db| db.get_member(id)).await?;
    Ok(JSend::success(member_to_response(&member)))
}

/// Partial update. Unknown fields, including the loan counter, are ignored.
pub async fn update_member(
    State(state): State<Arc<AppState>>,
    AppPath(id): AppPath<u64>,
    AppJson(req): AppJson<MemberPatch>,
) -> Result<Json<JSend<MemberResponse>>, ApiError> {
    req.validate()?;
    let member = with_db(&state, move |db| db.update_member(id, req)).await?;
    Ok(JSend::success(member_to_response(&member)))
}

pub async fn delete_member(
    State(state): State<Arc<AppState>>,
    AppPath(id): AppPath<u64>,
) -> Result<Json<JSend<DeletedResponse>>, ApiError> {
    with_db(&state, move |db| db.delete_member(id)).await?;
    Ok(JSend::success(DeletedResponse {
        id,
        message: "Member deleted successfully".to_string(),
    }))
}

pub async fn member_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<JSend<MemberStats>>, ApiError> {
    let stats = with_db(&state, |db| db.member_stats()).await?;
    Ok(JSend::success(stats))
}

fn member_to_response(member: &Member) -> MemberResponse {
    MemberResponse {
        active_loan_count: member.active_loan_count,
        created_at: timestamp(member.created_at),
        email: member.email.clone(),
        id: member.id,
        joined_at: timestamp(member.joined_at),
        membership_type: member.membership_type,
        name: member.name.clone(),
        phone: member.phone.clone(),
        status: member.status,
        updated_at: timestamp(member.updated_at),
    }
}
