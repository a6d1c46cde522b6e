//! Callback dispatch hub: listener registry, ordered delivery and
//! liveness tracking.
//!
//! Each listener gets two tasks:
//!   - a delivery task draining a bounded per-listener queue into the
//!     listener's sink, so a slow sink only ever stalls itself;
//!   - a watchdog that waits for the sink to close and reports the death
//!     exactly once on the broker's death channel.
//!
//! Drop policy: a notification still queued when its request is removed is
//! dropped at dispatch time; one already handed to the sink is delivered.
//! A notification sent while the queue is full is dropped.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashSet;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;

use netbroker_core::{
    BrokerError, BrokerResult, ListenerId, Notification, RequestId, Uid,
};

use crate::firewall::PolicyFirewall;

/// Outbound half of a remote listener.
///
/// `closed` resolving is the liveness signal: the remote end is gone.
#[async_trait]
pub trait RemoteListener: Send + Sync {
    /// Deliver one notification. An error means the peer is unreachable.
    async fn notify(&self, notification: Notification) -> BrokerResult<()>;

    /// Is the peer already unreachable?
    fn is_closed(&self) -> bool;

    /// Resolves once the peer becomes unreachable.
    async fn closed(&self);
}

/// A listener backed by a bounded channel. Dropping the receiver is the
/// peer's death.
#[derive(Clone)]
pub struct ChannelListener {
    tx: mpsc::Sender<Notification>,
}

impl ChannelListener {
    pub fn new(depth: usize) -> (Self, mpsc::Receiver<Notification>) {
        let (tx, rx) = mpsc::channel(depth.max(1));
        (Self { tx }, rx)
    }
}

#[async_trait]
impl RemoteListener for ChannelListener {
    async fn notify(&self, notification: Notification) -> BrokerResult<()> {
        self.tx
            .send(notification)
            .await
            .map_err(|_| BrokerError::TransportFailure)
    }

    fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    async fn closed(&self) {
        self.tx.closed().await
    }
}

struct ListenerSlot {
    uid: Uid,
    queue: mpsc::Sender<Notification>,
    /// Requests whose notifications may still be dispatched.
    live: Arc<DashSet<RequestId>>,
    requests: BTreeSet<RequestId>,
    delivery: JoinHandle<()>,
    watchdog: JoinHandle<()>,
}

/// Maps listeners to the requests they own and pushes notifications to them.
pub struct CallbackHub {
    listeners: HashMap<ListenerId, ListenerSlot>,
    next_id: ListenerId,
    deaths: mpsc::UnboundedSender<ListenerId>,
    queue_depth: usize,
}

impl CallbackHub {
    /// `deaths` receives each listener id once, when its peer goes away.
    /// `queue_depth` bounds the notifications pending per listener.
    pub fn new(deaths: mpsc::UnboundedSender<ListenerId>, queue_depth: usize) -> Self {
        Self {
            listeners: HashMap::new(),
            next_id: 1,
            deaths,
            queue_depth: queue_depth.max(1),
        }
    }

    /// Install a listener and its liveness monitor.
    pub fn register(&mut self, uid: Uid, sink: Arc<dyn RemoteListener>) -> BrokerResult<ListenerId> {
        if sink.is_closed() {
            return Err(BrokerError::TransportFailure);
        }
        let listener = self.allocate_id();
        let (queue, rx) = mpsc::channel(self.queue_depth);
        let live = Arc::new(DashSet::new());

        let delivery = tokio::spawn(deliver_loop(listener, sink.clone(), rx, live.clone()));
        let watchdog = {
            let deaths = self.deaths.clone();
            tokio::spawn(async move {
                sink.closed().await;
                let _ = deaths.send(listener);
            })
        };

        self.listeners.insert(
            listener,
            ListenerSlot {
                uid,
                queue,
                live,
                requests: BTreeSet::new(),
                delivery,
                watchdog,
            },
        );
        tracing::info!(listener, uid, "listener registered");
        Ok(listener)
    }

    /// Remove a listener. Returns the requests it owned, ascending.
    /// Unknown listeners yield nothing; a death can race an explicit removal.
    pub fn remove(&mut self, listener: ListenerId) -> Vec<RequestId> {
        let Some(slot) = self.listeners.remove(&listener) else {
            return Vec::new();
        };
        slot.live.clear();
        slot.watchdog.abort();
        // Closing the queue ends the delivery task once it drains.
        drop(slot.queue);
        slot.requests.into_iter().collect()
    }

    pub fn contains(&self, listener: ListenerId) -> bool {
        self.listeners.contains_key(&listener)
    }

    pub fn uid_of(&self, listener: ListenerId) -> Option<Uid> {
        self.listeners.get(&listener).map(|s| s.uid)
    }

    /// Listeners owned by `uid`, ascending.
    pub fn listeners_of(&self, uid: Uid) -> Vec<ListenerId> {
        let mut ids: Vec<ListenerId> = self
            .listeners
            .iter()
            .filter(|(_, s)| s.uid == uid)
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        ids
    }

    pub fn attach(&mut self, listener: ListenerId, request_id: RequestId) -> BrokerResult<()> {
        let slot = self
            .listeners
            .get_mut(&listener)
            .ok_or(BrokerError::TransportFailure)?;
        slot.requests.insert(request_id);
        slot.live.insert(request_id);
        Ok(())
    }

    /// Stop dispatching for a request. Anything still queued for it is dropped.
    pub fn detach(&mut self, listener: ListenerId, request_id: RequestId) {
        if let Some(slot) = self.listeners.get_mut(&listener) {
            slot.requests.remove(&request_id);
            slot.live.remove(&request_id);
        }
    }

    /// May this listener observe a network with the given metering?
    pub fn access_allowed(
        &self,
        firewall: &PolicyFirewall,
        listener: ListenerId,
        is_metered: bool,
    ) -> bool {
        match self.uid_of(listener) {
            Some(uid) => {
                firewall.is_access_allowed(uid, is_metered, firewall.is_uid_background(uid))
            }
            None => false,
        }
    }

    /// Queue a notification. Never blocks; a full queue drops it.
    pub fn send(&self, listener: ListenerId, notification: Notification) {
        let Some(slot) = self.listeners.get(&listener) else {
            return;
        };
        match slot.queue.try_send(notification) {
            Ok(()) => {}
            Err(TrySendError::Full(n)) => {
                tracing::debug!(
                    listener,
                    request = n.request_id,
                    "listener queue full, notification dropped"
                );
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!(listener, "delivery task gone, notification dropped");
            }
        }
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Stop every delivery and watchdog task.
    pub fn shutdown(&mut self) {
        for (_, slot) in self.listeners.drain() {
            slot.watchdog.abort();
            slot.delivery.abort();
        }
    }

    fn allocate_id(&mut self) -> ListenerId {
        loop {
            let id = self.next_id;
            self.next_id = self.next_id.wrapping_add(1).max(1);
            if !self.listeners.contains_key(&id) {
                return id;
            }
        }
    }
}

impl Drop for CallbackHub {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn deliver_loop(
    listener: ListenerId,
    sink: Arc<dyn RemoteListener>,
    mut rx: mpsc::Receiver<Notification>,
    live: Arc<DashSet<RequestId>>,
) {
    while let Some(notification) = rx.recv().await {
        if !live.contains(&notification.request_id) {
            tracing::debug!(
                listener,
                request = notification.request_id,
                "request removed, undispatched notification dropped"
            );
            continue;
        }
        if sink.notify(notification).await.is_err() {
            tracing::debug!(listener, "listener unreachable, delivery stopped");
            break;
        }
    }
}
