//! /policy handlers: UID firewall configuration and queries.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

use netbroker_core::{BackgroundPolicy, PolicyBits, Uid};

use super::{ok, ApiResult, ApiState, Caller};

// ── /policy/uid/{uid} ─────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct UidPolicyRequest {
    pub policy: PolicyBits,
}

pub async fn handle_set_uid_policy(
    State(state): State<ApiState>,
    Caller(caller): Caller,
    Path(uid): Path<Uid>,
    Json(req): Json<UidPolicyRequest>,
) -> ApiResult<()> {
    state.broker.set_uid_policy(caller, uid, req.policy).await?;
    ok(())
}

pub async fn handle_get_uid_policy(
    State(state): State<ApiState>,
    _caller: Caller,
    Path(uid): Path<Uid>,
) -> ApiResult<PolicyBits> {
    ok(state.broker.get_uid_policy(uid)?)
}

pub async fn handle_uids_by_policy(
    State(state): State<ApiState>,
    _caller: Caller,
    Path(policy): Path<PolicyBits>,
) -> ApiResult<Vec<Uid>> {
    ok(state.broker.get_uids_by_policy(policy)?)
}

#[derive(Deserialize)]
pub struct AccessQuery {
    #[serde(default)]
    pub metered: bool,
    #[serde(default)]
    pub background: bool,
}

pub async fn handle_uid_allowed(
    State(state): State<ApiState>,
    _caller: Caller,
    Path(uid): Path<Uid>,
    Query(q): Query<AccessQuery>,
) -> ApiResult<bool> {
    ok(state
        .broker
        .is_uid_net_access_allowed(uid, q.metered, q.background)?)
}

#[derive(Deserialize)]
pub struct UidStateRequest {
    pub background: bool,
}

pub async fn handle_set_uid_state(
    State(state): State<ApiState>,
    Caller(caller): Caller,
    Path(uid): Path<Uid>,
    Json(req): Json<UidStateRequest>,
) -> ApiResult<()> {
    state
        .broker
        .set_uid_background(caller, uid, req.background)
        .await?;
    ok(())
}

// ── /policy/background ────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct BackgroundRequest {
    pub restricted: bool,
}

pub async fn handle_set_background(
    State(state): State<ApiState>,
    Caller(caller): Caller,
    Json(req): Json<BackgroundRequest>,
) -> ApiResult<()> {
    state
        .broker
        .set_background_policy(caller, req.restricted)
        .await?;
    ok(())
}

pub async fn handle_get_background(
    State(state): State<ApiState>,
    _caller: Caller,
) -> ApiResult<bool> {
    ok(state.broker.get_background_policy()?)
}

pub async fn handle_background_for_uid(
    State(state): State<ApiState>,
    _caller: Caller,
    Path(uid): Path<Uid>,
) -> ApiResult<BackgroundPolicy> {
    ok(state.broker.get_background_policy_for_uid(uid)?)
}
