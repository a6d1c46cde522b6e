//! /suppliers handlers: supplier registration and state pushes.

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;

use netbroker_core::{Capabilities, LinkInfo, NetType, SupplierId, SupplierInfo};
use netbroker_services::SupplierEntry;

use super::{ok, ApiResult, ApiState, Caller};

// ── /suppliers (POST) ─────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct RegisterSupplierRequest {
    pub net_type: NetType,
    pub identity: String,
    #[serde(default)]
    pub capabilities: Capabilities,
}

pub async fn handle_register_supplier(
    State(state): State<ApiState>,
    Caller(uid): Caller,
    Json(req): Json<RegisterSupplierRequest>,
) -> ApiResult<SupplierId> {
    let id = state
        .broker
        .register_supplier(uid, req.net_type, req.identity, req.capabilities)
        .await?;
    ok(id)
}

// ── /suppliers/{id} ───────────────────────────────────────────────────────────

pub async fn handle_unregister_supplier(
    State(state): State<ApiState>,
    Caller(uid): Caller,
    Path(id): Path<SupplierId>,
) -> ApiResult<()> {
    state.broker.unregister_supplier(uid, id).await?;
    ok(())
}

pub async fn handle_get_supplier(
    State(state): State<ApiState>,
    _caller: Caller,
    Path(id): Path<SupplierId>,
) -> ApiResult<SupplierEntry> {
    ok(state.broker.get_supplier(id)?)
}

// ── /suppliers/{id}/info, /capabilities, /link (PUT) ─────────────────────────

pub async fn handle_update_info(
    State(state): State<ApiState>,
    Caller(uid): Caller,
    Path(id): Path<SupplierId>,
    Json(info): Json<SupplierInfo>,
) -> ApiResult<()> {
    state.broker.update_supplier_info(uid, id, info).await?;
    ok(())
}

#[derive(Deserialize)]
pub struct CapabilitiesRequest {
    pub capabilities: Capabilities,
}

pub async fn handle_update_capabilities(
    State(state): State<ApiState>,
    Caller(uid): Caller,
    Path(id): Path<SupplierId>,
    Json(req): Json<CapabilitiesRequest>,
) -> ApiResult<()> {
    state
        .broker
        .update_capabilities(uid, id, req.capabilities)
        .await?;
    ok(())
}

pub async fn handle_update_link(
    State(state): State<ApiState>,
    Caller(uid): Caller,
    Path(id): Path<SupplierId>,
    Json(link): Json<LinkInfo>,
) -> ApiResult<()> {
    state.broker.update_link_info(uid, id, link).await?;
    ok(())
}
