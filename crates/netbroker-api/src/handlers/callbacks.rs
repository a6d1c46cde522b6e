//! /requests and /callbacks handlers: notification streams.
//!
//! Each stream is one listener with one request. The first event is
//! `registered`, then one `notification` event per delivered notification.
//! Dropping the connection drops the receiving end of the listener, which
//! the broker treats as the listener dying.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures::stream::{self, Stream, StreamExt};
use serde::Serialize;
use tokio_stream::wrappers::ReceiverStream;

use netbroker_core::{ListenerId, RequestId, RequestKind, RequestSpecifier, Uid};
use netbroker_services::ChannelListener;

use super::{ok, ApiError, ApiResult, ApiState, Caller};

#[derive(Serialize)]
pub struct Registered {
    pub listener: ListenerId,
    pub request: RequestId,
}

async fn open_stream(
    state: ApiState,
    uid: Uid,
    kind: RequestKind,
    specifier: RequestSpecifier,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, ApiError> {
    let (sink, rx) = ChannelListener::new(state.listener_queue_depth);
    let listener = state.broker.register_listener(uid, Arc::new(sink)).await?;

    let activated = match kind {
        RequestKind::Request => state.broker.activate_network(specifier, listener).await,
        RequestKind::Listen => state.broker.register_callback(specifier, listener).await,
        RequestKind::TrackDefault => state.broker.register_default_callback(listener).await,
    };
    let request = match activated {
        Ok(request) => request,
        Err(e) => {
            let _ = state.broker.unregister_listener(listener).await;
            return Err(e.into());
        }
    };
    tracing::info!(uid, listener, request, "notification stream opened");

    let registered = Registered { listener, request };
    let head = stream::once(async move { Event::default().event("registered").json_data(registered) });
    let notifications = ReceiverStream::new(rx)
        .map(|notification| Event::default().event("notification").json_data(notification));

    Ok(Sse::new(head.chain(notifications)).keep_alive(KeepAlive::default()))
}

// ── /requests (POST) ──────────────────────────────────────────────────────────

pub async fn handle_activate_network(
    State(state): State<ApiState>,
    Caller(uid): Caller,
    Json(specifier): Json<RequestSpecifier>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, ApiError> {
    open_stream(state, uid, RequestKind::Request, specifier).await
}

// ── /callbacks (POST), /callbacks/default (GET) ──────────────────────────────

pub async fn handle_register_callback(
    State(state): State<ApiState>,
    Caller(uid): Caller,
    Json(specifier): Json<RequestSpecifier>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, ApiError> {
    open_stream(state, uid, RequestKind::Listen, specifier).await
}

pub async fn handle_register_default_callback(
    State(state): State<ApiState>,
    Caller(uid): Caller,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, ApiError> {
    open_stream(state, uid, RequestKind::TrackDefault, RequestSpecifier::default()).await
}

// ── /requests/{id}, /callbacks/{id} (DELETE) ─────────────────────────────────

pub async fn handle_deactivate(
    State(state): State<ApiState>,
    Caller(uid): Caller,
    Path(id): Path<RequestId>,
) -> ApiResult<()> {
    state.broker.deactivate_network(uid, id).await?;
    ok(())
}
