//! Network configurator seam: pushes link configuration to the device.
//!
//! Calls are synchronous and best-effort. The broker logs failures and keeps
//! its own view of link info; the device converges on it eventually.

use anyhow::Result;

use netbroker_core::{LinkInfo, SupplierId};

/// Applies link configuration for a supplier to the host.
pub trait NetworkConfigurator: Send + Sync {
    /// Apply (or re-apply) the link configuration of a supplier.
    fn apply_link_info(&self, supplier_id: SupplierId, link_info: &LinkInfo) -> Result<()>;

    /// Remove everything previously applied for a supplier.
    fn clear_link_info(&self, supplier_id: SupplierId) -> Result<()>;
}

/// Configurator that only records what it would do in the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingConfigurator;

impl NetworkConfigurator for LoggingConfigurator {
    fn apply_link_info(&self, supplier_id: SupplierId, link_info: &LinkInfo) -> Result<()> {
        tracing::info!(
            supplier = supplier_id,
            iface = %link_info.iface_name,
            addresses = link_info.addresses.len(),
            routes = link_info.routes.len(),
            dns = link_info.dns_servers.len(),
            mtu = link_info.mtu,
            "apply link info"
        );
        Ok(())
    }

    fn clear_link_info(&self, supplier_id: SupplierId) -> Result<()> {
        tracing::info!(supplier = supplier_id, "clear link info");
        Ok(())
    }
}
