//! Broker: the single task that owns registry writes, matching and dispatch.
//!
//! Every mutation is a [`Command`] sent to the broker task, so writes are
//! applied one at a time in arrival order. Listener deaths arrive on a
//! second channel and are serialized with the commands.
//!
//! Reads that need no coordination go straight to the shared registry,
//! firewall and default-network watch without queueing.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use netbroker_core::config::BrokerConfig;
use netbroker_core::{
    BackgroundPolicy, BrokerError, BrokerResult, Capabilities, LinkInfo, ListenerId, NetType,
    NetworkEvent, Notification, PolicyBits, RequestId, RequestKind, RequestSpecifier, SupplierId,
    SupplierInfo, Uid,
};

use crate::configurator::NetworkConfigurator;
use crate::firewall::PolicyFirewall;
use crate::hub::{CallbackHub, RemoteListener};
use crate::matcher::{validate_specifier, ActiveRequest, DefaultChange, RequestMatcher, Scope};
use crate::registry::{SupplierEntry, SupplierRegistry};

type Reply<T> = oneshot::Sender<BrokerResult<T>>;

/// Point-in-time counters for status views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BrokerStatus {
    pub suppliers: usize,
    pub available: usize,
    pub requests: usize,
    pub bound: usize,
    pub listeners: usize,
    pub default_network: Option<SupplierId>,
    pub background_restricted: bool,
}

enum Command {
    RegisterSupplier {
        caller: Uid,
        net_type: NetType,
        identity: String,
        capabilities: Capabilities,
        reply: Reply<SupplierId>,
    },
    UnregisterSupplier {
        caller: Uid,
        supplier_id: SupplierId,
        reply: Reply<()>,
    },
    UpdateSupplierInfo {
        caller: Uid,
        supplier_id: SupplierId,
        info: SupplierInfo,
        reply: Reply<()>,
    },
    UpdateCapabilities {
        caller: Uid,
        supplier_id: SupplierId,
        capabilities: Capabilities,
        reply: Reply<()>,
    },
    UpdateLinkInfo {
        caller: Uid,
        supplier_id: SupplierId,
        link_info: LinkInfo,
        reply: Reply<()>,
    },
    RegisterListener {
        uid: Uid,
        sink: Arc<dyn RemoteListener>,
        reply: Reply<ListenerId>,
    },
    UnregisterListener {
        listener: ListenerId,
        reply: Reply<()>,
    },
    Activate {
        kind: RequestKind,
        specifier: RequestSpecifier,
        listener: ListenerId,
        reply: Reply<RequestId>,
    },
    Deactivate {
        caller: Uid,
        request_id: RequestId,
        reply: Reply<()>,
    },
    GetRequest {
        request_id: RequestId,
        reply: Reply<ActiveRequest>,
    },
    SetUidPolicy {
        caller: Uid,
        uid: Uid,
        policy: PolicyBits,
        reply: Reply<()>,
    },
    SetBackgroundPolicy {
        caller: Uid,
        restricted: bool,
        reply: Reply<()>,
    },
    SetUidBackground {
        caller: Uid,
        uid: Uid,
        background: bool,
        reply: Reply<()>,
    },
    Status {
        reply: Reply<BrokerStatus>,
    },
}

/// State owned by the broker task.
pub struct Broker {
    registry: SupplierRegistry,
    firewall: PolicyFirewall,
    matcher: RequestMatcher,
    hub: CallbackHub,
    configurator: Arc<dyn NetworkConfigurator>,
    default_tx: watch::Sender<Option<SupplierId>>,
    commands: mpsc::UnboundedReceiver<Command>,
    deaths: mpsc::UnboundedReceiver<ListenerId>,
    ready: Arc<AtomicBool>,
}

impl Broker {
    /// Build a broker and its handle. Nothing runs until [`Broker::run`]
    /// is polled; calls made before then fail with `Uninitialized`.
    pub fn new(
        config: &BrokerConfig,
        configurator: Arc<dyn NetworkConfigurator>,
    ) -> (Self, BrokerHandle) {
        let mut firewall = PolicyFirewall::new(
            config.policy.background_restricted,
            config.policy.system_uids.iter().copied(),
        );
        if config.policy.persist {
            firewall = firewall.with_persistence(config.policy.persist_path.clone());
        }
        let registry = SupplierRegistry::new(config.registry.duplicate_suppliers);

        let (command_tx, commands) = mpsc::unbounded_channel();
        let (death_tx, deaths) = mpsc::unbounded_channel();
        let (default_tx, default_rx) = watch::channel(None);
        let ready = Arc::new(AtomicBool::new(false));

        let handle = BrokerHandle {
            commands: command_tx,
            registry: registry.clone(),
            firewall: firewall.clone(),
            default_rx,
            ready: ready.clone(),
        };
        let broker = Self {
            registry,
            firewall,
            matcher: RequestMatcher::new(),
            hub: CallbackHub::new(death_tx, config.dispatch.listener_queue_depth),
            configurator,
            default_tx,
            commands,
            deaths,
            ready,
        };
        (broker, handle)
    }

    /// Build a broker and run it on the current runtime.
    pub fn spawn(
        config: &BrokerConfig,
        configurator: Arc<dyn NetworkConfigurator>,
    ) -> (BrokerHandle, JoinHandle<()>) {
        let (broker, handle) = Self::new(config, configurator);
        (handle, tokio::spawn(broker.run()))
    }

    /// Serve commands until every handle is dropped.
    pub async fn run(mut self) {
        let loaded = self.firewall.load_from_disk();
        self.ready.store(true, Ordering::SeqCst);
        tracing::info!(policies = loaded, "broker ready");

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => self.handle(command),
                    None => break,
                },
                Some(listener) = self.deaths.recv() => self.on_listener_death(listener),
            }
        }

        self.ready.store(false, Ordering::SeqCst);
        self.hub.shutdown();
        tracing::info!("broker stopped");
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::RegisterSupplier {
                caller,
                net_type,
                identity,
                capabilities,
                reply,
            } => {
                let _ = reply.send(self.register_supplier(caller, net_type, &identity, capabilities));
            }
            Command::UnregisterSupplier {
                caller,
                supplier_id,
                reply,
            } => {
                let _ = reply.send(self.unregister_supplier(caller, supplier_id));
            }
            Command::UpdateSupplierInfo {
                caller,
                supplier_id,
                info,
                reply,
            } => {
                let _ = reply.send(self.update_supplier_info(caller, supplier_id, info));
            }
            Command::UpdateCapabilities {
                caller,
                supplier_id,
                capabilities,
                reply,
            } => {
                let _ = reply.send(self.update_capabilities(caller, supplier_id, capabilities));
            }
            Command::UpdateLinkInfo {
                caller,
                supplier_id,
                link_info,
                reply,
            } => {
                let _ = reply.send(self.update_link_info(caller, supplier_id, link_info));
            }
            Command::RegisterListener { uid, sink, reply } => {
                let _ = reply.send(self.hub.register(uid, sink));
            }
            Command::UnregisterListener { listener, reply } => {
                let result = if self.hub.contains(listener) {
                    self.drop_listener(listener);
                    Ok(())
                } else {
                    Err(BrokerError::TransportFailure)
                };
                let _ = reply.send(result);
            }
            Command::Activate {
                kind,
                specifier,
                listener,
                reply,
            } => {
                let _ = reply.send(self.activate(kind, specifier, listener));
            }
            Command::Deactivate {
                caller,
                request_id,
                reply,
            } => {
                let _ = reply.send(self.deactivate(caller, request_id));
            }
            Command::GetRequest { request_id, reply } => {
                let result = self
                    .matcher
                    .get(request_id)
                    .cloned()
                    .ok_or(BrokerError::UnknownRequest(request_id));
                let _ = reply.send(result);
            }
            Command::SetUidPolicy {
                caller,
                uid,
                policy,
                reply,
            } => {
                let _ = reply.send(self.set_uid_policy(caller, uid, policy));
            }
            Command::SetBackgroundPolicy {
                caller,
                restricted,
                reply,
            } => {
                let _ = reply.send(self.set_background_policy(caller, restricted));
            }
            Command::SetUidBackground {
                caller,
                uid,
                background,
                reply,
            } => {
                let _ = reply.send(self.set_uid_background(caller, uid, background));
            }
            Command::Status { reply } => {
                let _ = reply.send(Ok(self.status()));
            }
        }
    }

    // ── Suppliers ─────────────────────────────────────────────────────────────

    fn authorize(&self, caller: Uid) -> BrokerResult<()> {
        if self.firewall.is_system_uid(caller) {
            Ok(())
        } else {
            Err(BrokerError::PermissionDenied(caller))
        }
    }

    fn register_supplier(
        &mut self,
        caller: Uid,
        net_type: NetType,
        identity: &str,
        capabilities: Capabilities,
    ) -> BrokerResult<SupplierId> {
        self.authorize(caller)?;
        let registration = self.registry.register(net_type, identity, capabilities)?;
        if registration.created {
            self.reevaluate(Scope::Supplier(registration.supplier_id, net_type));
        }
        Ok(registration.supplier_id)
    }

    fn unregister_supplier(&mut self, caller: Uid, supplier_id: SupplierId) -> BrokerResult<()> {
        self.authorize(caller)?;
        let entry = self.registry.unregister(supplier_id)?;
        if entry.link_info.is_some() {
            if let Err(e) = self.configurator.clear_link_info(supplier_id) {
                tracing::warn!(supplier = supplier_id, error = %e, "failed to clear link info");
            }
        }
        self.reevaluate(Scope::Supplier(supplier_id, entry.descriptor.net_type));
        Ok(())
    }

    fn update_supplier_info(
        &mut self,
        caller: Uid,
        supplier_id: SupplierId,
        info: SupplierInfo,
    ) -> BrokerResult<()> {
        self.authorize(caller)?;
        let net_type = self.net_type_of(supplier_id)?;
        let change = self.registry.update_info(supplier_id, info)?;
        if change.was_available != change.is_available {
            tracing::info!(
                supplier = supplier_id,
                available = change.is_available,
                "supplier availability changed"
            );
        }
        self.reevaluate(Scope::Supplier(supplier_id, net_type));
        Ok(())
    }

    fn update_capabilities(
        &mut self,
        caller: Uid,
        supplier_id: SupplierId,
        capabilities: Capabilities,
    ) -> BrokerResult<()> {
        self.authorize(caller)?;
        let net_type = self.net_type_of(supplier_id)?;
        let watching = self.matcher.announced_on(supplier_id);
        let previous = self.registry.update_capabilities(supplier_id, capabilities)?;
        self.reevaluate(Scope::Supplier(supplier_id, net_type));

        // Metering decides visibility even when no binding moved.
        if previous.is_metered() != capabilities.is_metered() {
            for request_id in self.matcher.bound_to(supplier_id) {
                self.sync_announcement(request_id);
            }
        }

        if previous != capabilities {
            for request_id in watching {
                self.notify_if_announced(
                    request_id,
                    supplier_id,
                    NetworkEvent::CapabilitiesChanged(capabilities),
                );
            }
        }
        Ok(())
    }

    fn update_link_info(
        &mut self,
        caller: Uid,
        supplier_id: SupplierId,
        link_info: LinkInfo,
    ) -> BrokerResult<()> {
        self.authorize(caller)?;
        let net_type = self.net_type_of(supplier_id)?;
        self.registry.update_link_info(supplier_id, link_info.clone())?;
        if let Err(e) = self.configurator.apply_link_info(supplier_id, &link_info) {
            tracing::warn!(supplier = supplier_id, error = %e, "failed to apply link info");
        }
        self.reevaluate(Scope::Supplier(supplier_id, net_type));

        for request_id in self.matcher.announced_on(supplier_id) {
            self.notify_if_announced(
                request_id,
                supplier_id,
                NetworkEvent::LinkPropertiesChanged(link_info.clone()),
            );
        }
        Ok(())
    }

    fn net_type_of(&self, supplier_id: SupplierId) -> BrokerResult<NetType> {
        self.registry
            .net_type(supplier_id)
            .ok_or(BrokerError::UnknownSupplier(supplier_id))
    }

    // ── Requests ──────────────────────────────────────────────────────────────

    fn activate(
        &mut self,
        kind: RequestKind,
        specifier: RequestSpecifier,
        listener: ListenerId,
    ) -> BrokerResult<RequestId> {
        validate_specifier(&specifier)?;
        if !self.hub.contains(listener) {
            return Err(BrokerError::TransportFailure);
        }
        let request_id = self.matcher.activate(kind, specifier, listener);
        self.hub.attach(listener, request_id)?;
        tracing::info!(request = request_id, listener, ?kind, "request activated");
        self.reevaluate(Scope::Request(request_id));
        Ok(request_id)
    }

    /// Only the owning uid or a system uid may remove a request.
    fn deactivate(&mut self, caller: Uid, request_id: RequestId) -> BrokerResult<()> {
        let listener = self
            .matcher
            .get(request_id)
            .map(|r| r.listener)
            .ok_or(BrokerError::UnknownRequest(request_id))?;
        if !self.firewall.is_system_uid(caller) && self.hub.uid_of(listener) != Some(caller) {
            tracing::warn!(caller, request = request_id, "deactivate denied: not the owner");
            return Err(BrokerError::PermissionDenied(caller));
        }
        let request = self.matcher.deactivate(request_id)?;
        self.hub.detach(request.listener, request_id);
        tracing::info!(request = request_id, "request deactivated");
        Ok(())
    }

    fn drop_listener(&mut self, listener: ListenerId) -> usize {
        let owned = self.hub.remove(listener);
        for request_id in &owned {
            let _ = self.matcher.deactivate(*request_id);
        }
        owned.len()
    }

    fn on_listener_death(&mut self, listener: ListenerId) {
        if !self.hub.contains(listener) {
            return;
        }
        let removed = self.drop_listener(listener);
        tracing::info!(listener, requests = removed, "listener died, requests removed");
    }

    // ── Policy ────────────────────────────────────────────────────────────────

    fn set_uid_policy(&mut self, caller: Uid, uid: Uid, policy: PolicyBits) -> BrokerResult<()> {
        self.authorize(caller)?;
        if self.firewall.set_uid_policy(uid, policy) {
            self.refresh_uid(uid);
        }
        Ok(())
    }

    fn set_background_policy(&mut self, caller: Uid, restricted: bool) -> BrokerResult<()> {
        self.authorize(caller)?;
        if self.firewall.set_background_policy(restricted) {
            for request_id in self.matcher.ids() {
                self.sync_announcement(request_id);
            }
            self.reelect_default();
        }
        Ok(())
    }

    fn set_uid_background(&mut self, caller: Uid, uid: Uid, background: bool) -> BrokerResult<()> {
        self.authorize(caller)?;
        if self.firewall.set_uid_background(uid, background) {
            self.refresh_uid(uid);
        }
        Ok(())
    }

    fn refresh_uid(&mut self, uid: Uid) {
        let listeners = self.hub.listeners_of(uid);
        for request_id in self.matcher.owned_by(&listeners) {
            self.sync_announcement(request_id);
        }
        self.reelect_default();
    }

    // ── Matching and notification ─────────────────────────────────────────────

    fn reevaluate(&mut self, scope: Scope) {
        let (transitions, default_change) = self.matcher.reevaluate(&self.registry, scope);
        if let Some(change) = default_change {
            self.publish_default(change);
        }
        for transition in transitions {
            tracing::debug!(
                request = transition.request_id,
                from = ?transition.from,
                to = ?transition.to,
                "request binding changed"
            );
            self.sync_announcement(transition.request_id);
        }
    }

    fn reelect_default(&mut self) {
        if let Some(change) = self.matcher.elect_default(&self.registry) {
            self.publish_default(change);
        }
    }

    fn publish_default(&self, change: DefaultChange) {
        tracing::info!(from = ?change.from, to = ?change.to, "default network changed");
        self.default_tx.send_replace(change.to);
    }

    /// Bring what a listener has been told in line with the request's
    /// binding and the listener's current access.
    fn sync_announcement(&mut self, request_id: RequestId) {
        let Some(request) = self.matcher.get(request_id) else {
            return;
        };
        let listener = request.listener;
        let kind = request.kind;
        let announced = request.announced;
        let visible = request
            .bound
            .filter(|supplier_id| self.visible_to(listener, *supplier_id));

        let mut events = Vec::new();
        let next = match (announced, visible) {
            (Some(old), Some(new)) if old == new => return,
            (Some(old), Some(new)) => {
                // Default tracking switches silently to the new default.
                if kind != RequestKind::TrackDefault {
                    events.push(NetworkEvent::Lost(old));
                }
                events.push(NetworkEvent::Available(new));
                Some(new)
            }
            (Some(old), None) => {
                events.push(NetworkEvent::Lost(old));
                None
            }
            (None, Some(new)) => {
                events.push(NetworkEvent::Available(new));
                Some(new)
            }
            (None, None) => {
                if request.bound.is_some() {
                    tracing::debug!(request = request_id, listener, "delivery skipped by policy");
                }
                return;
            }
        };

        if let Some(request) = self.matcher.get_mut(request_id) {
            request.announced = next;
        }
        for event in events {
            self.hub.send(listener, Notification::new(request_id, event));
        }
    }

    fn notify_if_announced(&self, request_id: RequestId, supplier_id: SupplierId, event: NetworkEvent) {
        let Some(request) = self.matcher.get(request_id) else {
            return;
        };
        if request.announced != Some(supplier_id) {
            return;
        }
        if !self.visible_to(request.listener, supplier_id) {
            tracing::debug!(request = request_id, "delivery skipped by policy");
            return;
        }
        self.hub
            .send(request.listener, Notification::new(request_id, event));
    }

    fn visible_to(&self, listener: ListenerId, supplier_id: SupplierId) -> bool {
        match self.registry.capabilities(supplier_id) {
            Some(caps) => self
                .hub
                .access_allowed(&self.firewall, listener, caps.is_metered()),
            None => false,
        }
    }

    fn status(&self) -> BrokerStatus {
        BrokerStatus {
            suppliers: self.registry.len(),
            available: self.registry.available_ids(None).len(),
            requests: self.matcher.len(),
            bound: self.matcher.bound_count(),
            listeners: self.hub.len(),
            default_network: self.matcher.default_network(),
            background_restricted: self.firewall.background_restricted(),
        }
    }
}

// ── Handle ────────────────────────────────────────────────────────────────────

/// Cloneable entry point to a running broker.
#[derive(Clone)]
pub struct BrokerHandle {
    commands: mpsc::UnboundedSender<Command>,
    registry: SupplierRegistry,
    firewall: PolicyFirewall,
    default_rx: watch::Receiver<Option<SupplierId>>,
    ready: Arc<AtomicBool>,
}

impl BrokerHandle {
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn ensure_ready(&self) -> BrokerResult<()> {
        if self.is_ready() {
            Ok(())
        } else {
            Err(BrokerError::Uninitialized)
        }
    }

    async fn call<T>(&self, build: impl FnOnce(Reply<T>) -> Command) -> BrokerResult<T> {
        self.ensure_ready()?;
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(build(tx))
            .map_err(|_| BrokerError::Uninitialized)?;
        rx.await.map_err(|_| BrokerError::Uninitialized)?
    }

    // ── Supplier mutations ────────────────────────────────────────────────────

    pub async fn register_supplier(
        &self,
        caller: Uid,
        net_type: NetType,
        identity: impl Into<String>,
        capabilities: Capabilities,
    ) -> BrokerResult<SupplierId> {
        let identity = identity.into();
        self.call(|reply| Command::RegisterSupplier {
            caller,
            net_type,
            identity,
            capabilities,
            reply,
        })
        .await
    }

    pub async fn unregister_supplier(&self, caller: Uid, supplier_id: SupplierId) -> BrokerResult<()> {
        self.call(|reply| Command::UnregisterSupplier {
            caller,
            supplier_id,
            reply,
        })
        .await
    }

    pub async fn update_supplier_info(
        &self,
        caller: Uid,
        supplier_id: SupplierId,
        info: SupplierInfo,
    ) -> BrokerResult<()> {
        self.call(|reply| Command::UpdateSupplierInfo {
            caller,
            supplier_id,
            info,
            reply,
        })
        .await
    }

    pub async fn update_capabilities(
        &self,
        caller: Uid,
        supplier_id: SupplierId,
        capabilities: Capabilities,
    ) -> BrokerResult<()> {
        self.call(|reply| Command::UpdateCapabilities {
            caller,
            supplier_id,
            capabilities,
            reply,
        })
        .await
    }

    pub async fn update_link_info(
        &self,
        caller: Uid,
        supplier_id: SupplierId,
        link_info: LinkInfo,
    ) -> BrokerResult<()> {
        self.call(|reply| Command::UpdateLinkInfo {
            caller,
            supplier_id,
            link_info,
            reply,
        })
        .await
    }

    // ── Listeners and requests ────────────────────────────────────────────────

    /// Register a listener owned by `uid`. Its sink closing removes every
    /// request it owns.
    pub async fn register_listener(
        &self,
        uid: Uid,
        sink: Arc<dyn RemoteListener>,
    ) -> BrokerResult<ListenerId> {
        self.call(|reply| Command::RegisterListener { uid, sink, reply })
            .await
    }

    pub async fn unregister_listener(&self, listener: ListenerId) -> BrokerResult<()> {
        self.call(|reply| Command::UnregisterListener { listener, reply })
            .await
    }

    async fn activate(
        &self,
        kind: RequestKind,
        specifier: RequestSpecifier,
        listener: ListenerId,
    ) -> BrokerResult<RequestId> {
        self.call(|reply| Command::Activate {
            kind,
            specifier,
            listener,
            reply,
        })
        .await
    }

    pub async fn activate_network(
        &self,
        specifier: RequestSpecifier,
        listener: ListenerId,
    ) -> BrokerResult<RequestId> {
        self.activate(RequestKind::Request, specifier, listener)
            .await
    }

    pub async fn register_callback(
        &self,
        specifier: RequestSpecifier,
        listener: ListenerId,
    ) -> BrokerResult<RequestId> {
        self.activate(RequestKind::Listen, specifier, listener).await
    }

    pub async fn register_default_callback(&self, listener: ListenerId) -> BrokerResult<RequestId> {
        self.activate(RequestKind::TrackDefault, RequestSpecifier::default(), listener)
            .await
    }

    pub async fn deactivate_network(&self, caller: Uid, request_id: RequestId) -> BrokerResult<()> {
        self.call(|reply| Command::Deactivate {
            caller,
            request_id,
            reply,
        })
        .await
    }

    pub async fn unregister_callback(&self, caller: Uid, request_id: RequestId) -> BrokerResult<()> {
        self.deactivate_network(caller, request_id).await
    }

    pub async fn request(&self, request_id: RequestId) -> BrokerResult<ActiveRequest> {
        self.call(|reply| Command::GetRequest { request_id, reply })
            .await
    }

    pub async fn status(&self) -> BrokerResult<BrokerStatus> {
        self.call(|reply| Command::Status { reply }).await
    }

    // ── Policy mutations ──────────────────────────────────────────────────────

    pub async fn set_uid_policy(&self, caller: Uid, uid: Uid, policy: PolicyBits) -> BrokerResult<()> {
        self.call(|reply| Command::SetUidPolicy {
            caller,
            uid,
            policy,
            reply,
        })
        .await
    }

    pub async fn set_background_policy(&self, caller: Uid, restricted: bool) -> BrokerResult<()> {
        self.call(|reply| Command::SetBackgroundPolicy {
            caller,
            restricted,
            reply,
        })
        .await
    }

    pub async fn set_uid_background(&self, caller: Uid, uid: Uid, background: bool) -> BrokerResult<()> {
        self.call(|reply| Command::SetUidBackground {
            caller,
            uid,
            background,
            reply,
        })
        .await
    }

    // ── Reads ─────────────────────────────────────────────────────────────────

    pub fn list_suppliers(&self) -> BrokerResult<Vec<SupplierEntry>> {
        self.ensure_ready()?;
        Ok(self.registry.list())
    }

    pub fn get_supplier(&self, supplier_id: SupplierId) -> BrokerResult<SupplierEntry> {
        self.ensure_ready()?;
        self.registry
            .get(supplier_id)
            .ok_or(BrokerError::UnknownSupplier(supplier_id))
    }

    /// Ids of every available supplier.
    pub fn get_all_networks(&self) -> BrokerResult<Vec<SupplierId>> {
        self.ensure_ready()?;
        Ok(self.registry.available_ids(None))
    }

    pub fn get_networks_by_type(&self, net_type: NetType) -> BrokerResult<Vec<SupplierId>> {
        self.ensure_ready()?;
        Ok(self.registry.available_ids(Some(net_type)))
    }

    pub fn get_link_info(&self, supplier_id: SupplierId) -> BrokerResult<Option<LinkInfo>> {
        Ok(self.get_supplier(supplier_id)?.link_info)
    }

    pub fn get_capabilities(&self, supplier_id: SupplierId) -> BrokerResult<Capabilities> {
        Ok(self.get_supplier(supplier_id)?.descriptor.capabilities)
    }

    pub fn get_default_network(&self) -> BrokerResult<Option<SupplierId>> {
        self.ensure_ready()?;
        Ok(*self.default_rx.borrow())
    }

    pub fn has_default_network(&self) -> BrokerResult<bool> {
        Ok(self.get_default_network()?.is_some())
    }

    /// Watch default-network changes.
    pub fn subscribe_default(&self) -> watch::Receiver<Option<SupplierId>> {
        self.default_rx.clone()
    }

    pub fn get_uid_policy(&self, uid: Uid) -> BrokerResult<PolicyBits> {
        self.ensure_ready()?;
        Ok(self.firewall.uid_policy(uid))
    }

    pub fn get_uids_by_policy(&self, policy: PolicyBits) -> BrokerResult<Vec<Uid>> {
        self.ensure_ready()?;
        Ok(self.firewall.uids_with_policy(policy))
    }

    pub fn is_uid_net_access_allowed(
        &self,
        uid: Uid,
        is_metered: bool,
        is_background: bool,
    ) -> BrokerResult<bool> {
        self.ensure_ready()?;
        Ok(self.firewall.is_access_allowed(uid, is_metered, is_background))
    }

    /// Global background policy. true = restricted.
    pub fn get_background_policy(&self) -> BrokerResult<bool> {
        self.ensure_ready()?;
        Ok(self.firewall.background_restricted())
    }

    pub fn get_background_policy_for_uid(&self, uid: Uid) -> BrokerResult<BackgroundPolicy> {
        self.ensure_ready()?;
        Ok(self.firewall.background_policy_for_uid(uid))
    }
}
