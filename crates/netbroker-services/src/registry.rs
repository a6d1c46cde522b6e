//! Supplier registry: the set of live suppliers and their runtime state.
//!
//! Writes come only from the broker task; readers (the call surface,
//! status views) share the same `DashMap` and never queue behind it.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;

use netbroker_core::config::DuplicatePolicy;
use netbroker_core::{
    BrokerError, BrokerResult, Capabilities, LinkInfo, NetType, SupplierDescriptor, SupplierId,
    SupplierInfo,
};

/// Tracked state for a registered supplier.
#[derive(Debug, Clone, Serialize)]
pub struct SupplierEntry {
    pub descriptor: SupplierDescriptor,
    pub info: SupplierInfo,
    /// Attached once the supplier reports its link configuration.
    pub link_info: Option<LinkInfo>,
    /// Sequence number of the last unavailable → available transition.
    /// Higher means more recently made available.
    pub available_seq: u64,
}

impl SupplierEntry {
    pub fn is_available(&self) -> bool {
        self.info.is_available
    }
}

/// A supplier eligible for matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub supplier_id: SupplierId,
    pub net_type: NetType,
    pub capabilities: Capabilities,
    pub signal_strength: u8,
    pub available_seq: u64,
}

/// Outcome of [`SupplierRegistry::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registration {
    pub supplier_id: SupplierId,
    /// False when an existing registration was returned.
    pub created: bool,
}

/// Availability before and after an info update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InfoChange {
    pub was_available: bool,
    pub is_available: bool,
}

/// Registry of live suppliers, keyed on supplier id.
#[derive(Clone)]
pub struct SupplierRegistry {
    suppliers: Arc<DashMap<SupplierId, SupplierEntry>>,
    next_id: Arc<AtomicU32>,
    available_seq: Arc<AtomicU64>,
    duplicates: DuplicatePolicy,
}

impl Default for SupplierRegistry {
    fn default() -> Self {
        Self::new(DuplicatePolicy::default())
    }
}

impl SupplierRegistry {
    pub fn new(duplicates: DuplicatePolicy) -> Self {
        Self {
            suppliers: Arc::new(DashMap::new()),
            next_id: Arc::new(AtomicU32::new(1)),
            available_seq: Arc::new(AtomicU64::new(0)),
            duplicates,
        }
    }

    /// Register a supplier. New suppliers start unavailable.
    pub fn register(
        &self,
        net_type: NetType,
        identity: &str,
        capabilities: Capabilities,
    ) -> BrokerResult<Registration> {
        if let Some(existing) = self.find(net_type, identity) {
            return match self.duplicates {
                DuplicatePolicy::Reject => Err(BrokerError::DuplicateSupplier {
                    net_type,
                    identity: identity.to_string(),
                    existing,
                }),
                DuplicatePolicy::ReturnExisting => Ok(Registration {
                    supplier_id: existing,
                    created: false,
                }),
            };
        }

        let supplier_id = self.allocate_id();
        self.suppliers.insert(
            supplier_id,
            SupplierEntry {
                descriptor: SupplierDescriptor {
                    supplier_id,
                    net_type,
                    identity: identity.to_string(),
                    capabilities,
                },
                info: SupplierInfo::default(),
                link_info: None,
                available_seq: 0,
            },
        );
        tracing::info!(supplier = supplier_id, %net_type, identity, "supplier registered");
        Ok(Registration {
            supplier_id,
            created: true,
        })
    }

    /// Remove a supplier and its runtime state.
    pub fn unregister(&self, supplier_id: SupplierId) -> BrokerResult<SupplierEntry> {
        let (_, entry) = self
            .suppliers
            .remove(&supplier_id)
            .ok_or(BrokerError::UnknownSupplier(supplier_id))?;
        tracing::info!(supplier = supplier_id, "supplier unregistered");
        Ok(entry)
    }

    /// Replace the runtime info of a supplier.
    pub fn update_info(
        &self,
        supplier_id: SupplierId,
        info: SupplierInfo,
    ) -> BrokerResult<InfoChange> {
        let mut entry = self
            .suppliers
            .get_mut(&supplier_id)
            .ok_or(BrokerError::UnknownSupplier(supplier_id))?;
        let was_available = entry.info.is_available;
        if info.is_available && !was_available {
            entry.available_seq = self.available_seq.fetch_add(1, Ordering::Relaxed) + 1;
        }
        entry.info = info;
        Ok(InfoChange {
            was_available,
            is_available: info.is_available,
        })
    }

    /// Replace the capability set. Returns the previous set.
    pub fn update_capabilities(
        &self,
        supplier_id: SupplierId,
        capabilities: Capabilities,
    ) -> BrokerResult<Capabilities> {
        let mut entry = self
            .suppliers
            .get_mut(&supplier_id)
            .ok_or(BrokerError::UnknownSupplier(supplier_id))?;
        Ok(std::mem::replace(
            &mut entry.descriptor.capabilities,
            capabilities,
        ))
    }

    /// Replace the link configuration.
    pub fn update_link_info(&self, supplier_id: SupplierId, link_info: LinkInfo) -> BrokerResult<()> {
        let mut entry = self
            .suppliers
            .get_mut(&supplier_id)
            .ok_or(BrokerError::UnknownSupplier(supplier_id))?;
        entry.link_info = Some(link_info);
        Ok(())
    }

    pub fn get(&self, supplier_id: SupplierId) -> Option<SupplierEntry> {
        self.suppliers.get(&supplier_id).map(|e| e.clone())
    }

    pub fn contains(&self, supplier_id: SupplierId) -> bool {
        self.suppliers.contains_key(&supplier_id)
    }

    pub fn net_type(&self, supplier_id: SupplierId) -> Option<NetType> {
        self.suppliers
            .get(&supplier_id)
            .map(|e| e.descriptor.net_type)
    }

    pub fn capabilities(&self, supplier_id: SupplierId) -> Option<Capabilities> {
        self.suppliers
            .get(&supplier_id)
            .map(|e| e.descriptor.capabilities)
    }

    /// All suppliers, ordered by id.
    pub fn list(&self) -> Vec<SupplierEntry> {
        let mut all: Vec<SupplierEntry> = self.suppliers.iter().map(|e| e.value().clone()).collect();
        all.sort_by_key(|e| e.descriptor.supplier_id);
        all
    }

    /// Ids of available suppliers, optionally narrowed to one net type.
    pub fn available_ids(&self, net_type: Option<NetType>) -> Vec<SupplierId> {
        let mut ids: Vec<SupplierId> = self
            .suppliers
            .iter()
            .filter(|e| e.is_available())
            .filter(|e| net_type.map_or(true, |t| e.descriptor.net_type == t))
            .map(|e| *e.key())
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Available suppliers, ordered by id.
    pub fn candidates(&self) -> Vec<Candidate> {
        let mut candidates: Vec<Candidate> = self
            .suppliers
            .iter()
            .filter(|e| e.is_available())
            .map(|e| Candidate {
                supplier_id: e.descriptor.supplier_id,
                net_type: e.descriptor.net_type,
                capabilities: e.descriptor.capabilities,
                signal_strength: e.info.signal_strength,
                available_seq: e.available_seq,
            })
            .collect();
        candidates.sort_by_key(|c| c.supplier_id);
        candidates
    }

    pub fn len(&self) -> usize {
        self.suppliers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.suppliers.is_empty()
    }

    fn find(&self, net_type: NetType, identity: &str) -> Option<SupplierId> {
        self.suppliers
            .iter()
            .find(|e| e.descriptor.net_type == net_type && e.descriptor.identity == identity)
            .map(|e| *e.key())
    }

    /// Next id not held by a live supplier. Ids only come back into use
    /// after the counter wraps past an unregistered one.
    fn allocate_id(&self) -> SupplierId {
        loop {
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            if id != 0 && !self.suppliers.contains_key(&id) {
                return id;
            }
        }
    }
}
