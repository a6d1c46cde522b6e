//! netbroker-core: value model, events, errors and configuration shared by
//! every broker crate.

pub mod config;
pub mod error;
pub mod event;
pub mod policy;
pub mod types;

pub use error::{BrokerError, BrokerResult, ResultCode};
pub use event::{NetworkEvent, Notification};
pub use policy::{BackgroundPolicy, PolicyBits, UidPolicy};
pub use types::{
    AddressFamily, AddressKind, Capabilities, LinkInfo, ListenerId, NetAddress, NetType,
    RequestId, RequestKind, RequestSpecifier, Route, SupplierDescriptor, SupplierId,
    SupplierInfo, Uid,
};
