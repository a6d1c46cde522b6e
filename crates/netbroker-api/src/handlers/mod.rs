//! HTTP API handlers: one route per broker operation, JSON envelopes out.

pub mod callbacks;
pub mod networks;
pub mod policy;
pub mod status;
pub mod suppliers;

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use netbroker_core::config::BrokerConfig;
use netbroker_core::{BrokerError, ResultCode, Uid};
use netbroker_services::BrokerHandle;

pub const INTERFACE_HEADER: &str = "x-netbroker-interface";
pub const UID_HEADER: &str = "x-netbroker-uid";

/// UID assumed when a call does not name one. Never a system UID.
pub const ANONYMOUS_UID: Uid = u32::MAX;

#[derive(Clone)]
pub struct ApiState {
    pub broker: BrokerHandle,
    /// Token every call must present in [`INTERFACE_HEADER`].
    pub interface_token: Arc<str>,
    /// Bound on undelivered notifications per stream.
    pub listener_queue_depth: usize,
}

impl ApiState {
    pub fn new(broker: BrokerHandle, config: &BrokerConfig) -> Self {
        Self {
            broker,
            interface_token: Arc::from(config.api.interface_token.as_str()),
            listener_queue_depth: config.dispatch.listener_queue_depth.max(1),
        }
    }
}

// ── Envelope ──────────────────────────────────────────────────────────────────

/// Body of every non-streaming response.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub code: ResultCode,
    pub value: Option<T>,
    pub error: Option<String>,
}

pub type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

fn ok<T>(value: T) -> ApiResult<T> {
    Ok(Json(ApiResponse {
        code: ResultCode::Ok,
        value: Some(value),
        error: None,
    }))
}

#[derive(Debug)]
pub struct ApiError {
    pub code: ResultCode,
    pub message: String,
}

impl ApiError {
    fn invalid_interface(message: impl Into<String>) -> Self {
        Self {
            code: ResultCode::InvalidInterface,
            message: message.into(),
        }
    }
}

impl From<BrokerError> for ApiError {
    fn from(e: BrokerError) -> Self {
        Self {
            code: e.code(),
            message: e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiResponse::<()> {
            code: self.code,
            value: None,
            error: Some(self.message),
        };
        (http_status(self.code), Json(body)).into_response()
    }
}

pub fn http_status(code: ResultCode) -> StatusCode {
    match code {
        ResultCode::Ok => StatusCode::OK,
        ResultCode::UnknownSupplier | ResultCode::UnknownRequest => StatusCode::NOT_FOUND,
        ResultCode::DuplicateSupplier => StatusCode::CONFLICT,
        ResultCode::InvalidSpecifier => StatusCode::BAD_REQUEST,
        ResultCode::PermissionDenied => StatusCode::FORBIDDEN,
        ResultCode::TransportFailure => StatusCode::BAD_GATEWAY,
        ResultCode::Uninitialized => StatusCode::SERVICE_UNAVAILABLE,
        ResultCode::InvalidInterface => StatusCode::UNAUTHORIZED,
    }
}

// ── Caller ────────────────────────────────────────────────────────────────────

/// Identity of the calling process, after the interface token checked out.
#[derive(Debug, Clone, Copy)]
pub struct Caller(pub Uid);

impl FromRequestParts<ApiState> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &ApiState) -> Result<Self, ApiError> {
        let token = parts
            .headers
            .get(INTERFACE_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::invalid_interface("missing interface token"))?;
        if token != &*state.interface_token {
            tracing::debug!(token, "call rejected: wrong interface token");
            return Err(ApiError::invalid_interface("wrong interface token"));
        }

        let uid = match parts.headers.get(UID_HEADER) {
            None => ANONYMOUS_UID,
            Some(v) => v
                .to_str()
                .ok()
                .and_then(|s| s.trim().parse::<Uid>().ok())
                .ok_or_else(|| ApiError::invalid_interface("malformed uid header"))?,
        };
        Ok(Caller(uid))
    }
}

// Re-export handler functions for use in router setup.
pub use callbacks::{
    handle_activate_network, handle_deactivate, handle_register_callback,
    handle_register_default_callback,
};
pub use networks::{
    handle_capabilities, handle_default_exists, handle_default_network, handle_link_info,
    handle_networks, handle_networks_by_type,
};
pub use policy::{
    handle_background_for_uid, handle_get_background, handle_get_uid_policy,
    handle_set_background, handle_set_uid_policy, handle_set_uid_state, handle_uid_allowed,
    handle_uids_by_policy,
};
pub use status::handle_status;
pub use suppliers::{
    handle_get_supplier, handle_register_supplier, handle_unregister_supplier,
    handle_update_capabilities, handle_update_info, handle_update_link,
};
