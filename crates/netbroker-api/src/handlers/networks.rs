//! /networks and /default handlers: read-only views of the registry.

use axum::extract::{Path, State};
use serde::Serialize;

use netbroker_core::{BrokerError, Capabilities, LinkInfo, NetType, SupplierId};
use netbroker_services::SupplierEntry;

use super::{ok, ApiResult, ApiState, Caller};

// ── /networks ─────────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct NetworksResponse {
    /// Ids of available suppliers, ascending.
    pub available: Vec<SupplierId>,
    /// Every registered supplier, available or not.
    pub suppliers: Vec<SupplierEntry>,
}

pub async fn handle_networks(
    State(state): State<ApiState>,
    _caller: Caller,
) -> ApiResult<NetworksResponse> {
    ok(NetworksResponse {
        available: state.broker.get_all_networks()?,
        suppliers: state.broker.list_suppliers()?,
    })
}

pub async fn handle_networks_by_type(
    State(state): State<ApiState>,
    _caller: Caller,
    Path(net_type): Path<String>,
) -> ApiResult<Vec<SupplierId>> {
    let net_type = NetType::parse(&net_type)
        .ok_or_else(|| BrokerError::InvalidSpecifier(format!("unknown net type {net_type:?}")))?;
    ok(state.broker.get_networks_by_type(net_type)?)
}

// ── /networks/{id}/link, /networks/{id}/capabilities ─────────────────────────

pub async fn handle_link_info(
    State(state): State<ApiState>,
    _caller: Caller,
    Path(id): Path<SupplierId>,
) -> ApiResult<Option<LinkInfo>> {
    ok(state.broker.get_link_info(id)?)
}

pub async fn handle_capabilities(
    State(state): State<ApiState>,
    _caller: Caller,
    Path(id): Path<SupplierId>,
) -> ApiResult<Capabilities> {
    ok(state.broker.get_capabilities(id)?)
}

// ── /default ──────────────────────────────────────────────────────────────────

pub async fn handle_default_network(
    State(state): State<ApiState>,
    _caller: Caller,
) -> ApiResult<Option<SupplierId>> {
    ok(state.broker.get_default_network()?)
}

pub async fn handle_default_exists(
    State(state): State<ApiState>,
    _caller: Caller,
) -> ApiResult<bool> {
    ok(state.broker.has_default_network()?)
}
