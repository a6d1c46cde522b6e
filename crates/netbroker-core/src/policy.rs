//! Per-UID network policy bits and the derived background-policy state.

use serde::{Deserialize, Serialize};

/// Bitmask stored per UID. Absence of an entry means [`UidPolicy::NONE`].
pub type PolicyBits = u32;

/// Named policy bits.
pub struct UidPolicy;

impl UidPolicy {
    pub const NONE: PolicyBits = 0;
    pub const ALLOW_METERED_BACKGROUND: PolicyBits = 1 << 0;
    pub const TEMPORARY_ALLOW_METERED: PolicyBits = 1 << 1;
    pub const REJECT_METERED_BACKGROUND: PolicyBits = 1 << 2;
    pub const ALLOW_METERED: PolicyBits = 1 << 3;
    pub const REJECT_METERED: PolicyBits = 1 << 4;
    pub const ALLOW_ALL: PolicyBits = 1 << 5;
    pub const REJECT_ALL: PolicyBits = 1 << 6;
}

/// Background access state for a UID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackgroundPolicy {
    /// Background access is restricted.
    Enabled,
    /// Background access is unrestricted.
    Disable,
    /// The UID is exempted from the restriction.
    Allowlisted,
}
