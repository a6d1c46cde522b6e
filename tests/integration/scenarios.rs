// ── Broker scenarios ──────────────────────────────────────────────────────────
//
// Drive the broker through its handle the way a supplier process and a
// client process would, and check bindings, default election and what
// each listener is told.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};
use tokio::time::timeout;

use netbroker_core::{
    BrokerError, BrokerResult, Capabilities, NetType, NetworkEvent, Notification,
    RequestSpecifier, SupplierInfo, UidPolicy,
};
use netbroker_services::{BrokerHandle, ChannelListener, RemoteListener};

use crate::*;

fn available(strength: u8) -> SupplierInfo {
    SupplierInfo {
        is_available: true,
        signal_strength: strength,
        ..Default::default()
    }
}

fn internet() -> RequestSpecifier {
    RequestSpecifier::new(Capabilities::INTERNET, None)
}

async fn next(rx: &mut mpsc::Receiver<Notification>) -> Notification {
    timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("timed out waiting for notification")
        .expect("listener channel closed")
}

async fn silent(rx: &mut mpsc::Receiver<Notification>) -> bool {
    timeout(Duration::from_millis(150), rx.recv()).await.is_err()
}

async fn listener(
    broker: &BrokerHandle,
    uid: u32,
) -> (u32, mpsc::Receiver<Notification>) {
    let (sink, rx) = ChannelListener::new(32);
    let id = broker.register_listener(uid, Arc::new(sink)).await.unwrap();
    (id, rx)
}

/// Keeps every notification it is handed, even after it reports itself
/// closed, so late dispatches stay visible.
struct RecordingListener {
    seen: Mutex<Vec<Notification>>,
    closed: watch::Sender<bool>,
}

impl RecordingListener {
    fn new() -> Arc<Self> {
        let (closed, _) = watch::channel(false);
        Arc::new(Self {
            seen: Mutex::new(Vec::new()),
            closed,
        })
    }

    fn kill(&self) {
        self.closed.send_replace(true);
    }

    fn seen(&self) -> Vec<Notification> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteListener for RecordingListener {
    async fn notify(&self, notification: Notification) -> BrokerResult<()> {
        self.seen.lock().unwrap().push(notification);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    async fn closed(&self) {
        let mut rx = self.closed.subscribe();
        let _ = rx.wait_for(|closed| *closed).await;
    }
}

/// Unbound request binds once its supplier comes up, then stays put when a
/// stronger supplier appears, while the default network moves.
#[tokio::test]
async fn test_request_binding_is_sticky_while_default_moves() {
    let broker = start_broker(&test_config()).await.unwrap();

    let a = broker
        .register_supplier(SYSTEM_UID, NetType::Wifi, "wifi-a", Capabilities::INTERNET)
        .await
        .unwrap();
    let (l, mut rx) = listener(&broker, APP_UID).await;
    let r = broker.activate_network(internet(), l).await.unwrap();
    assert_eq!(broker.request(r).await.unwrap().bound, None);
    assert!(silent(&mut rx).await);

    broker
        .update_supplier_info(SYSTEM_UID, a, available(80))
        .await
        .unwrap();
    assert_eq!(broker.request(r).await.unwrap().bound, Some(a));
    assert_eq!(next(&mut rx).await, Notification::new(r, NetworkEvent::Available(a)));
    assert!(silent(&mut rx).await, "expected exactly one Available");

    let b = broker
        .register_supplier(SYSTEM_UID, NetType::Wifi, "wifi-b", Capabilities::INTERNET)
        .await
        .unwrap();
    broker
        .update_supplier_info(SYSTEM_UID, b, available(90))
        .await
        .unwrap();

    assert_eq!(broker.get_default_network().unwrap(), Some(b));
    assert_eq!(broker.request(r).await.unwrap().bound, Some(a));
    assert!(silent(&mut rx).await);

    // A going down moves the request to B.
    broker
        .update_supplier_info(SYSTEM_UID, a, SupplierInfo::default())
        .await
        .unwrap();
    assert_eq!(next(&mut rx).await.event, NetworkEvent::Lost(a));
    assert_eq!(next(&mut rx).await.event, NetworkEvent::Available(b));
    assert_eq!(broker.request(r).await.unwrap().bound, Some(b));
}

/// A capability drop on the bound supplier rebinds the request.
#[tokio::test]
async fn test_capability_loss_rebinds() {
    let broker = start_broker(&test_config()).await.unwrap();
    let a = broker
        .register_supplier(SYSTEM_UID, NetType::Cellular, "sim1", Capabilities::INTERNET)
        .await
        .unwrap();
    let b = broker
        .register_supplier(SYSTEM_UID, NetType::Wifi, "wlan0", Capabilities::INTERNET)
        .await
        .unwrap();
    broker.update_supplier_info(SYSTEM_UID, a, available(90)).await.unwrap();
    broker.update_supplier_info(SYSTEM_UID, b, available(10)).await.unwrap();

    let (l, mut rx) = listener(&broker, APP_UID).await;
    let r = broker.activate_network(internet(), l).await.unwrap();
    assert_eq!(next(&mut rx).await.event, NetworkEvent::Available(a));

    broker
        .update_capabilities(SYSTEM_UID, a, Capabilities::MMS)
        .await
        .unwrap();
    assert_eq!(next(&mut rx).await.event, NetworkEvent::Lost(a));
    assert_eq!(next(&mut rx).await.event, NetworkEvent::Available(b));
    assert_eq!(broker.request(r).await.unwrap().bound, Some(b));
}

/// Replaying the same sequence gives the same bindings and default.
#[tokio::test]
async fn test_matching_is_deterministic() {
    async fn replay() -> (Vec<Option<u32>>, Option<u32>) {
        let broker = start_broker(&test_config()).await.unwrap();
        let mut ids = Vec::new();
        for (name, strength) in [("a", 50u8), ("b", 50), ("c", 70), ("d", 70)] {
            let id = broker
                .register_supplier(SYSTEM_UID, NetType::Wifi, name, Capabilities::INTERNET)
                .await
                .unwrap();
            broker
                .update_supplier_info(SYSTEM_UID, id, available(strength))
                .await
                .unwrap();
            ids.push(id);
        }
        let (l, _rx) = listener(&broker, APP_UID).await;
        let mut bindings = Vec::new();
        for spec in [
            internet(),
            RequestSpecifier::new(Capabilities::INTERNET, Some(NetType::Wifi)),
            RequestSpecifier::new(Capabilities::MMS, None),
        ] {
            let r = broker.activate_network(spec, l).await.unwrap();
            bindings.push(broker.request(r).await.unwrap().bound);
        }
        (bindings, broker.get_default_network().unwrap())
    }

    let first = replay().await;
    let second = replay().await;
    assert_eq!(first, second);
    // Equal strength: the most recently available wins.
    assert_eq!(first.1, Some(4));
    assert_eq!(first.0[2], None);
}

/// No policy entry for uid 1000: metered background access follows the
/// global background toggle.
#[tokio::test]
async fn test_uid_without_policy_follows_background_toggle() {
    let broker = start_broker(&test_config()).await.unwrap();
    assert_eq!(broker.get_uid_policy(APP_UID).unwrap(), UidPolicy::NONE);

    broker.set_background_policy(SYSTEM_UID, false).await.unwrap();
    assert!(broker.is_uid_net_access_allowed(APP_UID, true, true).unwrap());

    broker.set_background_policy(SYSTEM_UID, true).await.unwrap();
    assert!(!broker.is_uid_net_access_allowed(APP_UID, true, true).unwrap());
}

/// Unprivileged callers cannot touch suppliers or policy.
#[tokio::test]
async fn test_mutations_require_system_uid() {
    let broker = start_broker(&test_config()).await.unwrap();
    let a = broker
        .register_supplier(SYSTEM_UID, NetType::Wifi, "wlan0", Capabilities::INTERNET)
        .await
        .unwrap();

    assert_eq!(
        broker
            .update_supplier_info(APP_UID, a, available(10))
            .await
            .unwrap_err(),
        BrokerError::PermissionDenied(APP_UID)
    );
    assert_eq!(
        broker
            .set_uid_policy(APP_UID, APP_UID, UidPolicy::ALLOW_ALL)
            .await
            .unwrap_err(),
        BrokerError::PermissionDenied(APP_UID)
    );
    assert_eq!(broker.get_uid_policy(APP_UID).unwrap(), UidPolicy::NONE);
    assert!(!broker.get_supplier(a).unwrap().info.is_available);
}

/// A listener whose process goes away loses all of its requests, and
/// nobody else is affected.
#[tokio::test]
async fn test_dead_listener_is_cleaned_up() {
    let broker = start_broker(&test_config()).await.unwrap();
    let a = broker
        .register_supplier(SYSTEM_UID, NetType::Ethernet, "eth0", Capabilities::INTERNET)
        .await
        .unwrap();
    broker.update_supplier_info(SYSTEM_UID, a, available(100)).await.unwrap();

    let (dead, dead_rx) = listener(&broker, APP_UID).await;
    let (alive, mut alive_rx) = listener(&broker, APP_UID + 1).await;
    for _ in 0..3 {
        broker.register_callback(internet(), dead).await.unwrap();
    }
    let kept = broker.register_default_callback(alive).await.unwrap();
    assert_eq!(next(&mut alive_rx).await, Notification::new(kept, NetworkEvent::Available(a)));

    drop(dead_rx);
    let cleaned = eventually(|| async {
        let status = broker.status().await.unwrap();
        status.listeners == 1 && status.requests == 1
    })
    .await;
    assert!(cleaned, "dead listener's requests were not removed");

    broker.unregister_supplier(SYSTEM_UID, a).await.unwrap();
    assert_eq!(next(&mut alive_rx).await.event, NetworkEvent::Lost(a));
}

/// Once a listener's death is processed, networks coming up later are never
/// dispatched to it.
#[tokio::test]
async fn test_dead_listener_receives_nothing_afterwards() {
    let broker = start_broker(&test_config()).await.unwrap();
    let sink = RecordingListener::new();
    let l = broker.register_listener(APP_UID, sink.clone()).await.unwrap();
    broker.activate_network(internet(), l).await.unwrap();
    broker.register_callback(internet(), l).await.unwrap();

    sink.kill();
    let cleaned = eventually(|| async {
        let status = broker.status().await.unwrap();
        status.listeners == 0 && status.requests == 0
    })
    .await;
    assert!(cleaned, "dead listener was not removed");

    let a = broker
        .register_supplier(SYSTEM_UID, NetType::Wifi, "wifi-a", Capabilities::INTERNET)
        .await
        .unwrap();
    broker.update_supplier_info(SYSTEM_UID, a, available(80)).await.unwrap();
    broker
        .update_capabilities(
            SYSTEM_UID,
            a,
            Capabilities::INTERNET | Capabilities::NOT_METERED,
        )
        .await
        .unwrap();
    assert_eq!(broker.get_default_network().unwrap(), Some(a));

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(sink.seen().is_empty(), "dispatched after death: {:?}", sink.seen());
}

/// Duplicate registration either fails or hands back the existing id,
/// depending on configuration.
#[tokio::test]
async fn test_duplicate_supplier_policy() {
    let broker = start_broker(&test_config()).await.unwrap();
    let a = broker
        .register_supplier(SYSTEM_UID, NetType::Wifi, "wlan0", Capabilities::INTERNET)
        .await
        .unwrap();
    let err = broker
        .register_supplier(SYSTEM_UID, NetType::Wifi, "wlan0", Capabilities::INTERNET)
        .await
        .unwrap_err();
    assert!(matches!(err, BrokerError::DuplicateSupplier { existing, .. } if existing == a));

    let mut config = test_config();
    config.registry.duplicate_suppliers = netbroker_core::config::DuplicatePolicy::ReturnExisting;
    let broker = start_broker(&config).await.unwrap();
    let first = broker
        .register_supplier(SYSTEM_UID, NetType::Wifi, "wlan0", Capabilities::INTERNET)
        .await
        .unwrap();
    let second = broker
        .register_supplier(SYSTEM_UID, NetType::Wifi, "wlan0", Capabilities::INTERNET)
        .await
        .unwrap();
    assert_eq!(first, second);
    assert_eq!(broker.list_suppliers().unwrap().len(), 1);
}
