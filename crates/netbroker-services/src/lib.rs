//! netbroker-services: supplier registry, UID firewall, request matching
//! and callback dispatch, tied together by the broker task.

pub mod broker;
pub mod configurator;
pub mod firewall;
pub mod hub;
pub mod matcher;
pub mod registry;

pub use broker::{Broker, BrokerHandle, BrokerStatus};
pub use configurator::{LoggingConfigurator, NetworkConfigurator};
pub use firewall::PolicyFirewall;
pub use hub::{CallbackHub, ChannelListener, RemoteListener};
pub use matcher::{ActiveRequest, RequestMatcher};
pub use registry::{SupplierEntry, SupplierRegistry};
