//! Notifications pushed to listeners.

use serde::{Deserialize, Serialize};

use crate::types::{Capabilities, LinkInfo, RequestId, SupplierId};

/// A state change observed by one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum NetworkEvent {
    Available(SupplierId),
    Lost(SupplierId),
    CapabilitiesChanged(Capabilities),
    LinkPropertiesChanged(LinkInfo),
}

/// A [`NetworkEvent`] addressed to a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub request_id: RequestId,
    pub event: NetworkEvent,
}

impl Notification {
    pub fn new(request_id: RequestId, event: NetworkEvent) -> Self {
        Self { request_id, event }
    }
}
