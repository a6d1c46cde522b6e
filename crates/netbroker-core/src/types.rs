//! Value model: supplier descriptors, capability sets, link configuration
//! and request specifiers.
//!
//! Everything here is a plain value. The registry owns the live copies;
//! every other component refers to suppliers and requests by id.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity assigned to a supplier on registration.
pub type SupplierId = u32;

/// Identity assigned to a request on activation.
pub type RequestId = u32;

/// Identity assigned to a listener on registration.
pub type ListenerId = u32;

/// Process/user identity of a caller.
pub type Uid = u32;

// ── Net type ──────────────────────────────────────────────────────────────────

/// Supplier category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetType {
    Cellular,
    Wifi,
    Bluetooth,
    Ethernet,
    Vpn,
    WifiAware,
}

impl NetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cellular => "cellular",
            Self::Wifi => "wifi",
            Self::Bluetooth => "bluetooth",
            Self::Ethernet => "ethernet",
            Self::Vpn => "vpn",
            Self::WifiAware => "wifiaware",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "cellular" => Some(Self::Cellular),
            "wifi" => Some(Self::Wifi),
            "bluetooth" => Some(Self::Bluetooth),
            "ethernet" => Some(Self::Ethernet),
            "vpn" => Some(Self::Vpn),
            "wifiaware" => Some(Self::WifiAware),
            _ => None,
        }
    }
}

impl fmt::Display for NetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Capabilities ──────────────────────────────────────────────────────────────

/// 64-bit capability set.
///
/// Bit positions follow the platform capability numbering, so the
/// serialized form is the raw `u64`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Capabilities(pub u64);

impl Capabilities {
    pub const MMS: Capabilities = Capabilities(1 << 0);
    pub const SUPL: Capabilities = Capabilities(1 << 1);
    pub const DUN: Capabilities = Capabilities(1 << 2);
    pub const IA: Capabilities = Capabilities(1 << 3);
    pub const XCAP: Capabilities = Capabilities(1 << 4);
    pub const NOT_METERED: Capabilities = Capabilities(1 << 11);
    pub const INTERNET: Capabilities = Capabilities(1 << 12);
    pub const NOT_VPN: Capabilities = Capabilities(1 << 15);
    pub const VALIDATED: Capabilities = Capabilities(1 << 16);
    pub const PORTAL: Capabilities = Capabilities(1 << 17);
    pub const INTERNAL_DEFAULT: Capabilities = Capabilities(1 << 18);
    pub const CHECKING_CONNECTIVITY: Capabilities = Capabilities(1 << 31);

    /// Every bit the broker knows how to interpret.
    pub const KNOWN: Capabilities = Capabilities(
        Self::MMS.0
            | Self::SUPL.0
            | Self::DUN.0
            | Self::IA.0
            | Self::XCAP.0
            | Self::NOT_METERED.0
            | Self::INTERNET.0
            | Self::NOT_VPN.0
            | Self::VALIDATED.0
            | Self::PORTAL.0
            | Self::INTERNAL_DEFAULT.0
            | Self::CHECKING_CONNECTIVITY.0,
    );

    pub const fn empty() -> Self {
        Capabilities(0)
    }

    pub const fn bits(&self) -> u64 {
        self.0
    }

    pub const fn union(self, other: Capabilities) -> Self {
        Capabilities(self.0 | other.0)
    }

    /// True if every bit of `other` is set in `self`.
    pub const fn contains(&self, other: Capabilities) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Bits outside [`Capabilities::KNOWN`].
    pub const fn unknown_bits(&self) -> u64 {
        self.0 & !Self::KNOWN.0
    }

    /// A supplier without `NOT_METERED` is metered.
    pub const fn is_metered(&self) -> bool {
        !self.contains(Self::NOT_METERED)
    }
}

impl std::ops::BitOr for Capabilities {
    type Output = Capabilities;

    fn bitor(self, rhs: Capabilities) -> Capabilities {
        self.union(rhs)
    }
}

// ── Supplier ──────────────────────────────────────────────────────────────────

/// Static description of a registered supplier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierDescriptor {
    pub supplier_id: SupplierId,
    pub net_type: NetType,
    /// Supplier-chosen identity, e.g. "simId1" or "eth0".
    pub identity: String,
    pub capabilities: Capabilities,
}

/// Runtime state of a supplier, updated independently of its descriptor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierInfo {
    pub is_available: bool,
    pub is_roaming: bool,
    pub signal_strength: u8,
    pub frequency: u32,
}

// ── Link configuration ────────────────────────────────────────────────────────

/// Address family of a [`NetAddress`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressFamily {
    Ipv4,
    Ipv6,
}

/// What a [`NetAddress`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressKind {
    Unicast,
    Gateway,
    Dns,
}

/// A network address. Equality is structural over every field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NetAddress {
    pub kind: AddressKind,
    pub family: AddressFamily,
    pub prefix_length: u8,
    pub address: String,
    #[serde(default)]
    pub netmask: String,
    #[serde(default)]
    pub hostname: String,
}

impl NetAddress {
    pub fn unicast(family: AddressFamily, address: impl Into<String>, prefix_length: u8) -> Self {
        Self {
            kind: AddressKind::Unicast,
            family,
            prefix_length,
            address: address.into(),
            netmask: String::new(),
            hostname: String::new(),
        }
    }

    pub fn dns(family: AddressFamily, address: impl Into<String>) -> Self {
        Self {
            kind: AddressKind::Dns,
            family,
            prefix_length: 0,
            address: address.into(),
            netmask: String::new(),
            hostname: String::new(),
        }
    }
}

/// A route entry attached to a link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub iface: String,
    pub destination: NetAddress,
    pub gateway: NetAddress,
    #[serde(default)]
    pub has_gateway: bool,
    #[serde(default)]
    pub is_default_route: bool,
}

/// Link configuration attached to an available supplier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkInfo {
    pub iface_name: String,
    #[serde(default)]
    pub addresses: Vec<NetAddress>,
    #[serde(default)]
    pub routes: Vec<Route>,
    /// Ordered; duplicates are kept as given.
    #[serde(default)]
    pub dns_servers: Vec<NetAddress>,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub mtu: u16,
}

// ── Requests ──────────────────────────────────────────────────────────────────

/// Client-declared requirement matched against supplier capabilities.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestSpecifier {
    #[serde(default)]
    pub required_capabilities: Capabilities,
    #[serde(default)]
    pub net_type: Option<NetType>,
}

impl RequestSpecifier {
    pub fn new(required_capabilities: Capabilities, net_type: Option<NetType>) -> Self {
        Self {
            required_capabilities,
            net_type,
        }
    }

    /// Does a supplier with these properties satisfy the specifier?
    /// Availability is checked by the caller.
    pub fn is_satisfied_by(&self, net_type: NetType, capabilities: Capabilities) -> bool {
        if let Some(wanted) = self.net_type {
            if wanted != net_type {
                return false;
            }
        }
        capabilities.contains(self.required_capabilities)
    }

    /// Could a change to a supplier of `net_type` affect this specifier?
    pub fn concerns(&self, net_type: NetType) -> bool {
        self.net_type.map_or(true, |t| t == net_type)
    }
}

/// How a request follows suppliers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    /// `ActivateNetwork`: sticky binding to the best matching supplier.
    Request,
    /// `RegisterCallback(specifier)`: matched like a request.
    Listen,
    /// `RegisterDefaultCallback`: follows the elected default network.
    TrackDefault,
}
