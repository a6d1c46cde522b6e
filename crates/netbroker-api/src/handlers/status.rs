//! /status handler.

use axum::extract::State;

use netbroker_services::BrokerStatus;

use super::{ok, ApiResult, ApiState, Caller};

pub async fn handle_status(
    State(state): State<ApiState>,
    _caller: Caller,
) -> ApiResult<BrokerStatus> {
    ok(state.broker.status().await?)
}
