//! Request matching and default-network election.
//!
//! Owned by the broker task; nothing here locks. Each request moves
//! `Unbound -> Bound(supplier) -> Unbound` and leaves the table when it is
//! deactivated or its listener dies.
//!
//! Bindings are sticky: a bound request keeps its supplier while that
//! supplier stays available and still satisfies the specifier. Only
//! default-tracking requests move when a better default is elected.

use std::cmp::Reverse;
use std::collections::BTreeMap;

use serde::Serialize;

use netbroker_core::{
    BrokerError, BrokerResult, Capabilities, ListenerId, NetType, RequestId, RequestKind,
    RequestSpecifier, SupplierId,
};

use crate::registry::{Candidate, SupplierRegistry};

/// A client request and its current binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActiveRequest {
    pub request_id: RequestId,
    pub kind: RequestKind,
    pub specifier: RequestSpecifier,
    pub listener: ListenerId,
    pub bound: Option<SupplierId>,
    /// Supplier the listener was last told is available.
    pub announced: Option<SupplierId>,
}

/// Which requests a re-evaluation covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    All,
    /// A supplier of this type changed. Covers requests that could match it
    /// plus requests bound to it.
    Supplier(SupplierId, NetType),
    Request(RequestId),
}

/// A request whose binding changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub request_id: RequestId,
    pub from: Option<SupplierId>,
    pub to: Option<SupplierId>,
}

/// Default network before and after an election.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefaultChange {
    pub from: Option<SupplierId>,
    pub to: Option<SupplierId>,
}

/// Reject specifiers no supplier could ever satisfy.
pub fn validate_specifier(spec: &RequestSpecifier) -> BrokerResult<()> {
    let unknown = spec.required_capabilities.unknown_bits();
    if unknown != 0 {
        return Err(BrokerError::InvalidSpecifier(format!(
            "unknown capability bits {unknown:#x}"
        )));
    }
    if spec.net_type == Some(NetType::Vpn)
        && spec.required_capabilities.contains(Capabilities::NOT_VPN)
    {
        return Err(BrokerError::InvalidSpecifier(
            "NOT_VPN cannot be required of a vpn supplier".into(),
        ));
    }
    Ok(())
}

/// Best candidate satisfying `spec`: strongest signal, then most recently
/// made available, then lowest id.
pub fn select_best(candidates: &[Candidate], spec: &RequestSpecifier) -> Option<SupplierId> {
    candidates
        .iter()
        .filter(|c| spec.is_satisfied_by(c.net_type, c.capabilities))
        .max_by_key(|c| (c.signal_strength, c.available_seq, Reverse(c.supplier_id)))
        .map(|c| c.supplier_id)
}

/// Active requests plus the elected default network.
#[derive(Debug)]
pub struct RequestMatcher {
    requests: BTreeMap<RequestId, ActiveRequest>,
    next_id: RequestId,
    default_network: Option<SupplierId>,
}

impl Default for RequestMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestMatcher {
    pub fn new() -> Self {
        Self {
            requests: BTreeMap::new(),
            next_id: 1,
            default_network: None,
        }
    }

    /// Add an unbound request. The caller runs [`Self::reevaluate`] on it.
    pub fn activate(
        &mut self,
        kind: RequestKind,
        specifier: RequestSpecifier,
        listener: ListenerId,
    ) -> RequestId {
        let request_id = self.allocate_id();
        self.requests.insert(
            request_id,
            ActiveRequest {
                request_id,
                kind,
                specifier,
                listener,
                bound: None,
                announced: None,
            },
        );
        request_id
    }

    /// Remove a request for good.
    pub fn deactivate(&mut self, request_id: RequestId) -> BrokerResult<ActiveRequest> {
        self.requests
            .remove(&request_id)
            .ok_or(BrokerError::UnknownRequest(request_id))
    }

    pub fn get(&self, request_id: RequestId) -> Option<&ActiveRequest> {
        self.requests.get(&request_id)
    }

    pub fn get_mut(&mut self, request_id: RequestId) -> Option<&mut ActiveRequest> {
        self.requests.get_mut(&request_id)
    }

    pub fn default_network(&self) -> Option<SupplierId> {
        self.default_network
    }

    /// Request ids announced on `supplier_id`, ascending.
    pub fn announced_on(&self, supplier_id: SupplierId) -> Vec<RequestId> {
        self.requests
            .values()
            .filter(|r| r.announced == Some(supplier_id))
            .map(|r| r.request_id)
            .collect()
    }

    /// Request ids currently bound to `supplier_id`, ascending.
    pub fn bound_to(&self, supplier_id: SupplierId) -> Vec<RequestId> {
        self.requests
            .values()
            .filter(|r| r.bound == Some(supplier_id))
            .map(|r| r.request_id)
            .collect()
    }

    /// Request ids owned by any of `listeners`, ascending.
    pub fn owned_by(&self, listeners: &[ListenerId]) -> Vec<RequestId> {
        self.requests
            .values()
            .filter(|r| listeners.contains(&r.listener))
            .map(|r| r.request_id)
            .collect()
    }

    pub fn ids(&self) -> Vec<RequestId> {
        self.requests.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn bound_count(&self) -> usize {
        self.requests.values().filter(|r| r.bound.is_some()).count()
    }

    /// Re-elect the default network over every available supplier.
    pub fn elect_default(&mut self, registry: &SupplierRegistry) -> Option<DefaultChange> {
        let candidates = registry.candidates();
        self.elect_from(&candidates)
    }

    /// Recompute bindings for the requests in `scope`, then the default
    /// network and every default-tracking request. Returns the requests
    /// whose binding changed, ascending by id.
    pub fn reevaluate(
        &mut self,
        registry: &SupplierRegistry,
        scope: Scope,
    ) -> (Vec<Transition>, Option<DefaultChange>) {
        let candidates = registry.candidates();
        let default_change = self.elect_from(&candidates);
        let default_network = self.default_network;

        let mut transitions = Vec::new();
        for request in self.requests.values_mut() {
            let next = match request.kind {
                RequestKind::TrackDefault => default_network,
                RequestKind::Request | RequestKind::Listen => {
                    if !in_scope(request, scope) {
                        continue;
                    }
                    match request.bound {
                        Some(current) if still_satisfies(&candidates, current, &request.specifier) => {
                            Some(current)
                        }
                        _ => select_best(&candidates, &request.specifier),
                    }
                }
            };
            if next != request.bound {
                transitions.push(Transition {
                    request_id: request.request_id,
                    from: request.bound,
                    to: next,
                });
                request.bound = next;
            }
        }
        (transitions, default_change)
    }

    fn elect_from(&mut self, candidates: &[Candidate]) -> Option<DefaultChange> {
        let elected = select_best(candidates, &RequestSpecifier::default());
        if elected == self.default_network {
            return None;
        }
        let change = DefaultChange {
            from: self.default_network,
            to: elected,
        };
        self.default_network = elected;
        Some(change)
    }

    fn allocate_id(&mut self) -> RequestId {
        loop {
            let id = self.next_id;
            self.next_id = self.next_id.wrapping_add(1).max(1);
            if !self.requests.contains_key(&id) {
                return id;
            }
        }
    }
}

fn in_scope(request: &ActiveRequest, scope: Scope) -> bool {
    match scope {
        Scope::All => true,
        Scope::Request(id) => request.request_id == id,
        Scope::Supplier(id, net_type) => {
            request.bound == Some(id) || request.specifier.concerns(net_type)
        }
    }
}

fn still_satisfies(candidates: &[Candidate], supplier_id: SupplierId, spec: &RequestSpecifier) -> bool {
    candidates
        .iter()
        .find(|c| c.supplier_id == supplier_id)
        .map_or(false, |c| spec.is_satisfied_by(c.net_type, c.capabilities))
}
