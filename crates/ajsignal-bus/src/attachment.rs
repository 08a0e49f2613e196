//! Local bus attachment
//!
//! A `LocalAttachment` is one connection to a `LocalBus`. It owns the
//! interfaces, listeners, signal handlers, session ports, and bus objects of
//! that connection and implements `BusAttachment` for clients.
//!
//! Callbacks run on the thread that performed the triggering operation,
//! after every lock has been released, so a callback may call back into the
//! bus. Each delivered callback is also published as an `EventRecord` on the
//! attachment's event tap.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;

use ajsignal_core::names;
use ajsignal_core::{
    dispatch_bus_event, dispatch_session_event, dispatch_signal, BusAttachment, BusError,
    BusListener, EventKind, EventRecord, HandlerId, InterfaceDescription, InterfaceError,
    ListenerId, Member, Message, MsgArg, ProxyBusObject, Result, SessionId, SessionListener,
    SessionPort, SessionPortListener, SignalHandler, TransportMask,
};

use crate::bus::{Advertisement, LocalBus, Router, Session, NULL_TRANSPORT_SPEC};

/// Registration of a signal handler
struct SignalRegistration {
    id: HandlerId,
    handler: Arc<dyn SignalHandler>,
    interface: String,
    member: String,
    source_path: String,
}

impl SignalRegistration {
    fn matches(&self, message: &Message) -> bool {
        self.interface == message.interface
            && self.member == message.member
            && (self.source_path.is_empty() || self.source_path == message.object_path)
    }
}

#[derive(Default)]
struct AttachmentState {
    unique_name: Option<String>,
    interfaces: HashMap<String, Arc<InterfaceDescription>>,
    bus_listeners: Vec<(ListenerId, Arc<dyn BusListener>)>,
    signal_handlers: Vec<SignalRegistration>,
    find_prefixes: Vec<String>,
    session_ports: HashMap<SessionPort, Arc<dyn SessionPortListener>>,
    session_listeners: HashMap<SessionId, Arc<dyn SessionListener>>,
    objects: HashMap<String, Vec<Arc<InterfaceDescription>>>,
}

/// Per-connection state shared between clones of an attachment
pub(crate) struct Shared {
    application_name: String,
    state: RwLock<AttachmentState>,
    tap: broadcast::Sender<EventRecord>,
}

fn same_object<T: ?Sized>(a: &Arc<T>, b: &Arc<T>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

impl Shared {
    fn publish(&self, record: &EventRecord) {
        // No receivers is the common case
        let _ = self.tap.send(record.clone());
    }

    fn unique_name(&self) -> Option<String> {
        self.state.read().unique_name.clone()
    }

    /// Deliver a bus event to every registered bus listener
    fn deliver_bus(&self, record: EventRecord) {
        let listeners: Vec<Arc<dyn BusListener>> = self
            .state
            .read()
            .bus_listeners
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        self.publish(&record);
        for listener in listeners {
            if let Err(e) = dispatch_bus_event(listener.as_ref(), &record) {
                tracing::warn!("Dropped {}: {}", record.kind, e);
            }
        }
    }

    /// Deliver a bus event to a single listener
    fn deliver_bus_to(&self, listener: &dyn BusListener, record: EventRecord) {
        self.publish(&record);
        if let Err(e) = dispatch_bus_event(listener, &record) {
            tracing::warn!("Dropped {}: {}", record.kind, e);
        }
    }

    /// Deliver a session event to the listener attached to `session_id`
    fn deliver_session(&self, session_id: SessionId, record: EventRecord) {
        let listener = self.state.read().session_listeners.get(&session_id).cloned();
        self.publish(&record);
        if let Some(listener) = listener {
            if let Err(e) = dispatch_session_event(listener.as_ref(), &record) {
                tracing::warn!("Dropped {}: {}", record.kind, e);
            }
        }
    }

    /// Deliver a signal to every matching handler, returning the handler count
    fn deliver_signal(&self, message: &Message) -> usize {
        let handlers: Vec<Arc<dyn SignalHandler>> = self
            .state
            .read()
            .signal_handlers
            .iter()
            .filter(|reg| reg.matches(message))
            .map(|reg| reg.handler.clone())
            .collect();
        if handlers.is_empty() {
            return 0;
        }

        let record =
            EventRecord::signal_received(&message.member, &message.object_path, message.clone());
        self.publish(&record);
        for handler in &handlers {
            if let Err(e) = dispatch_signal(handler.as_ref(), &record) {
                tracing::warn!("Dropped {}: {}", record.kind, e);
            }
        }
        handlers.len()
    }

    /// Discovery prefixes of this connection that match `name`
    fn matching_prefixes(&self, name: &str) -> Vec<String> {
        self.state
            .read()
            .find_prefixes
            .iter()
            .filter(|prefix| name.starts_with(prefix.as_str()))
            .cloned()
            .collect()
    }

    fn drop_session_listener(&self, session_id: SessionId) {
        self.state.write().session_listeners.remove(&session_id);
    }
}

/// Result of removing one member from a session
struct Departure {
    session_id: SessionId,
    remaining: Vec<Arc<Shared>>,
    lost: bool,
}

/// Remove `me` from every session it belongs to
fn depart_all(router: &mut Router, me: &str) -> Vec<Departure> {
    let ids: Vec<SessionId> = router
        .sessions
        .iter()
        .filter(|(_, s)| s.contains(me))
        .map(|(id, _)| *id)
        .collect();
    ids.into_iter()
        .filter_map(|id| depart(router, id, me))
        .collect()
}

/// Remove `me` from session `id`
fn depart(router: &mut Router, session_id: SessionId, me: &str) -> Option<Departure> {
    let session = router.sessions.get_mut(&session_id)?;
    if !session.contains(me) {
        return None;
    }
    session.members.retain(|m| m != me);
    let names = session.members.clone();
    let lost = names.len() <= 1;
    if lost {
        router.sessions.remove(&session_id);
    }
    let remaining = names
        .iter()
        .filter_map(|name| router.connection(name))
        .collect();
    Some(Departure {
        session_id,
        remaining,
        lost,
    })
}

fn notify_departure(departure: Departure, me: &str) {
    for member in departure.remaining {
        if departure.lost {
            member.deliver_session(
                departure.session_id,
                EventRecord::session_lost(departure.session_id),
            );
            member.drop_session_listener(departure.session_id);
        } else {
            member.deliver_session(
                departure.session_id,
                EventRecord::session_member_removed(departure.session_id, me),
            );
        }
    }
}

/// Router entries removed for a departing connection
struct Teardown {
    unique_name: String,
    released: Vec<String>,
    lost: Vec<(Arc<Shared>, EventRecord)>,
    departures: Vec<Departure>,
}

/// Remove `me` from the router: its connection, names, advertisements and sessions
fn tear_down(router: &mut Router, me: &str) -> Teardown {
    router.connections.remove(me);

    let released: Vec<String> = router
        .owners
        .iter()
        .filter(|(_, owner)| owner.as_str() == me)
        .map(|(name, _)| name.clone())
        .collect();
    for name in &released {
        router.owners.remove(name);
    }

    let (mine, others): (Vec<_>, Vec<_>) = std::mem::take(&mut router.advertisements)
        .into_iter()
        .partition(|ad| ad.owner == me);
    router.advertisements = others;
    let lost = mine
        .iter()
        .flat_map(|ad| discovery_targets(router, ad, false))
        .collect();

    let departures = depart_all(router, me);
    Teardown {
        unique_name: me.to_string(),
        released,
        lost,
        departures,
    }
}

fn notify_teardown(teardown: Teardown, peers: &[Arc<Shared>]) {
    let me = teardown.unique_name.as_str();
    for name in &teardown.released {
        for peer in peers {
            peer.deliver_bus(EventRecord::name_owner_changed(name, Some(me), None));
        }
    }
    fan_out(teardown.lost);
    for departure in teardown.departures {
        notify_departure(departure, me);
    }
}

/// Clear router state of attachments dropped while still connected
///
/// Peers hear the same name, advertisement and session events a
/// `disconnect` would have produced. Returns the number of connections
/// removed.
pub(crate) fn prune_dropped(bus: &LocalBus) -> usize {
    let (teardowns, peers) = {
        let mut router = bus.router.write();
        let dropped: Vec<String> = router
            .connections
            .iter()
            .filter(|(_, weak)| weak.strong_count() == 0)
            .map(|(name, _)| name.clone())
            .collect();
        if dropped.is_empty() {
            return 0;
        }
        let teardowns: Vec<Teardown> = dropped
            .iter()
            .map(|name| tear_down(&mut router, name))
            .collect();
        (teardowns, router.peers(None))
    };

    let count = teardowns.len();
    for teardown in teardowns {
        tracing::debug!("Pruned dropped connection {}", teardown.unique_name);
        notify_teardown(teardown, &peers);
    }
    count
}

/// Advertisement fanout targets: peers whose discovery prefixes match
fn discovery_targets(
    router: &Router,
    ad: &Advertisement,
    found: bool,
) -> Vec<(Arc<Shared>, EventRecord)> {
    let mut targets = Vec::new();
    for peer in router.peers(Some(ad.owner.as_str())) {
        for prefix in peer.matching_prefixes(&ad.name) {
            let record = if found {
                EventRecord::found_advertised_name(&ad.name, ad.transport, &prefix)
            } else {
                EventRecord::lost_advertised_name(&ad.name, ad.transport, &prefix)
            };
            targets.push((peer.clone(), record));
        }
    }
    targets
}

fn fan_out(targets: Vec<(Arc<Shared>, EventRecord)>) {
    for (target, record) in targets {
        target.deliver_bus(record);
    }
}

fn check_bus_name(name: &str) -> Result<()> {
    names::check_bus_name(name).map_err(|reason| {
        BusError::InvalidName {
            name: name.to_string(),
            reason: reason.to_string(),
        }
        .into()
    })
}

fn check_object_path(path: &str) -> Result<()> {
    names::check_object_path(path).map_err(|reason| {
        BusError::InvalidName {
            name: path.to_string(),
            reason: reason.to_string(),
        }
        .into()
    })
}

/// A connection to a `LocalBus`
#[derive(Clone)]
pub struct LocalAttachment {
    bus: LocalBus,
    shared: Arc<Shared>,
}

impl LocalAttachment {
    /// Create a disconnected attachment on `bus`
    pub fn new(bus: &LocalBus, application_name: impl Into<String>) -> Self {
        let (tap, _) = broadcast::channel(bus.config().event_capacity.max(1));
        Self {
            bus: bus.clone(),
            shared: Arc::new(Shared {
                application_name: application_name.into(),
                state: RwLock::new(AttachmentState::default()),
                tap,
            }),
        }
    }

    /// The bus this attachment belongs to
    pub fn bus(&self) -> &LocalBus {
        &self.bus
    }

    /// Application name given at creation
    pub fn application_name(&self) -> &str {
        &self.shared.application_name
    }

    /// Whether the attachment is connected
    pub fn is_connected(&self) -> bool {
        self.shared.state.read().unique_name.is_some()
    }

    /// Receiver for every event record delivered to this attachment
    pub fn events(&self) -> broadcast::Receiver<EventRecord> {
        self.shared.tap.subscribe()
    }

    fn require_unique(&self) -> Result<String> {
        self.shared
            .unique_name()
            .ok_or_else(|| BusError::NotConnected.into())
    }

    /// Connect to the bus
    ///
    /// Only the `null:` transport is available. Returns the assigned
    /// unique name.
    pub fn connect(&self, spec: &str) -> Result<String> {
        if spec != NULL_TRANSPORT_SPEC {
            return Err(BusError::UnsupportedTransport {
                spec: spec.to_string(),
            }
            .into());
        }
        if let Some(unique_name) = self.shared.unique_name() {
            return Err(BusError::AlreadyConnected { unique_name }.into());
        }

        let unique_name = self.bus.next_unique_name();
        self.bus
            .router
            .write()
            .connections
            .insert(unique_name.clone(), Arc::downgrade(&self.shared));
        self.shared.state.write().unique_name = Some(unique_name.clone());
        tracing::info!(
            "{} connected to {} as {}",
            self.shared.application_name,
            spec,
            unique_name
        );
        Ok(unique_name)
    }

    /// Disconnect from the bus
    ///
    /// Releases owned names, cancels advertisements, leaves every session,
    /// then tells this attachment's bus listeners it has been disconnected.
    pub fn disconnect(&self) -> Result<()> {
        let me = self
            .shared
            .state
            .write()
            .unique_name
            .take()
            .ok_or(BusError::NotConnected)?;

        let (teardown, peers) = {
            let mut router = self.bus.router.write();
            let teardown = tear_down(&mut router, &me);
            (teardown, router.peers(None))
        };

        {
            let mut state = self.shared.state.write();
            state.find_prefixes.clear();
            state.session_listeners.clear();
        }

        notify_teardown(teardown, &peers);

        tracing::info!("{} disconnected ({})", self.shared.application_name, me);
        self.shared
            .deliver_bus(EventRecord::bare(EventKind::BusDisconnected));
        Ok(())
    }

    /// Stop the attachment
    ///
    /// Bus listeners hear `bus_stopping`, then the attachment disconnects if
    /// it was connected.
    pub fn stop(&self) -> Result<()> {
        self.shared.deliver_bus(EventRecord::bare(EventKind::BusStopping));
        if self.is_connected() {
            self.disconnect()?;
        }
        Ok(())
    }

    /// Create a modifiable interface description not yet known here
    pub fn create_interface(&self, name: &str) -> Result<InterfaceDescription> {
        if self.shared.state.read().interfaces.contains_key(name) {
            return Err(InterfaceError::AlreadyExists {
                name: name.to_string(),
            }
            .into());
        }
        Ok(InterfaceDescription::new(name)?)
    }

    /// Activate and store an interface description
    pub fn add_interface(
        &self,
        mut desc: InterfaceDescription,
    ) -> Result<Arc<InterfaceDescription>> {
        let mut state = self.shared.state.write();
        if state.interfaces.contains_key(desc.name()) {
            return Err(InterfaceError::AlreadyExists {
                name: desc.name().to_string(),
            }
            .into());
        }
        desc.activate();
        let desc = Arc::new(desc);
        state
            .interfaces
            .insert(desc.name().to_string(), desc.clone());
        tracing::debug!("Interface {} added", desc.name());
        Ok(desc)
    }

    /// Take ownership of a well-known name
    pub fn request_name(&self, name: &str) -> Result<()> {
        check_bus_name(name)?;
        let me = self.require_unique()?;
        prune_dropped(&self.bus);

        let peers = {
            let mut router = self.bus.router.write();
            match router.owners.get(name) {
                Some(owner) if *owner == me => return Ok(()),
                Some(owner) => {
                    return Err(BusError::NameTaken {
                        name: name.to_string(),
                        owner: owner.clone(),
                    }
                    .into())
                }
                None => {}
            }
            router.owners.insert(name.to_string(), me.clone());
            router.peers(None)
        };

        tracing::debug!("{} now owns {}", me, name);
        for peer in peers {
            peer.deliver_bus(EventRecord::name_owner_changed(name, None, Some(me.as_str())));
        }
        Ok(())
    }

    /// Give up ownership of a well-known name
    pub fn release_name(&self, name: &str) -> Result<()> {
        let me = self.require_unique()?;

        let peers = {
            let mut router = self.bus.router.write();
            match router.owners.get(name) {
                Some(owner) if *owner == me => {}
                Some(owner) => {
                    return Err(BusError::NameTaken {
                        name: name.to_string(),
                        owner: owner.clone(),
                    }
                    .into())
                }
                None => {
                    return Err(BusError::Other {
                        message: format!("{} is not owned", name),
                    }
                    .into())
                }
            }
            router.owners.remove(name);
            router.peers(None)
        };

        for peer in peers {
            peer.deliver_bus(EventRecord::name_owner_changed(name, Some(me.as_str()), None));
        }
        Ok(())
    }

    /// Advertise a well-known name over `transport`
    ///
    /// Every other attachment with a matching discovery prefix hears
    /// `found_advertised_name` once per matching prefix.
    pub fn advertise_name(&self, name: &str, transport: TransportMask) -> Result<()> {
        check_bus_name(name)?;
        let me = self.require_unique()?;
        prune_dropped(&self.bus);

        let targets = {
            let mut router = self.bus.router.write();
            if router
                .advertisements
                .iter()
                .any(|ad| ad.owner == me && ad.name == name)
            {
                return Ok(());
            }
            let ad = Advertisement {
                name: name.to_string(),
                transport,
                owner: me,
            };
            let targets = discovery_targets(&router, &ad, true);
            router.advertisements.push(ad);
            targets
        };

        tracing::debug!("Advertising {} over transport {}", name, transport);
        fan_out(targets);
        Ok(())
    }

    /// Stop advertising a name
    pub fn cancel_advertise_name(&self, name: &str) -> Result<()> {
        let me = self.require_unique()?;

        let targets = {
            let mut router = self.bus.router.write();
            let Some(index) = router
                .advertisements
                .iter()
                .position(|ad| ad.owner == me && ad.name == name)
            else {
                return Err(BusError::Other {
                    message: format!("{} is not advertised", name),
                }
                .into());
            };
            let ad = router.advertisements.remove(index);
            discovery_targets(&router, &ad, false)
        };

        fan_out(targets);
        Ok(())
    }

    /// Register interest in names starting with `prefix`
    ///
    /// Names already advertised by other attachments are reported at once.
    pub fn find_advertised_name(&self, prefix: &str) -> Result<()> {
        let me = self.require_unique()?;
        prune_dropped(&self.bus);
        {
            let mut state = self.shared.state.write();
            if state.find_prefixes.iter().any(|p| p == prefix) {
                return Ok(());
            }
            state.find_prefixes.push(prefix.to_string());
        }

        let existing: Vec<EventRecord> = self
            .bus
            .router
            .read()
            .advertisements
            .iter()
            .filter(|ad| ad.owner != me && ad.name.starts_with(prefix))
            .map(|ad| EventRecord::found_advertised_name(&ad.name, ad.transport, prefix))
            .collect();

        tracing::debug!("Discovering names with prefix {}", prefix);
        for record in existing {
            self.shared.deliver_bus(record);
        }
        Ok(())
    }

    /// Drop a discovery prefix
    pub fn cancel_find_advertised_name(&self, prefix: &str) -> Result<()> {
        let mut state = self.shared.state.write();
        let before = state.find_prefixes.len();
        state.find_prefixes.retain(|p| p != prefix);
        if state.find_prefixes.len() == before {
            return Err(BusError::Other {
                message: format!("not discovering {}", prefix),
            }
            .into());
        }
        Ok(())
    }

    /// Accept sessions on `port`
    pub fn bind_session_port(
        &self,
        port: SessionPort,
        listener: Arc<dyn SessionPortListener>,
    ) -> Result<()> {
        let mut state = self.shared.state.write();
        if state.session_ports.contains_key(&port) {
            return Err(BusError::PortInUse { port }.into());
        }
        state.session_ports.insert(port, listener);
        tracing::debug!("Session port {} bound", port);
        Ok(())
    }

    /// Stop accepting sessions on `port`
    pub fn unbind_session_port(&self, port: SessionPort) -> Result<()> {
        self.shared
            .state
            .write()
            .session_ports
            .remove(&port)
            .map(|_| ())
            .ok_or_else(|| {
                BusError::Other {
                    message: format!("session port {} not bound", port),
                }
                .into()
            })
    }

    /// Attach a session listener to a session this attachment belongs to
    pub fn set_session_listener(
        &self,
        session_id: SessionId,
        listener: Arc<dyn SessionListener>,
    ) -> Result<()> {
        let me = self.require_unique()?;
        let member = self
            .bus
            .router
            .read()
            .sessions
            .get(&session_id)
            .is_some_and(|s| s.contains(&me));
        if !member {
            return Err(BusError::NoSuchSession { session_id }.into());
        }
        self.shared
            .state
            .write()
            .session_listeners
            .insert(session_id, listener);
        Ok(())
    }

    /// Leave a session
    pub fn leave_session(&self, session_id: SessionId) -> Result<()> {
        let me = self.require_unique()?;
        let departure = depart(&mut self.bus.router.write(), session_id, &me)
            .ok_or(BusError::NoSuchSession { session_id })?;
        self.shared.drop_session_listener(session_id);
        tracing::debug!("{} left session {}", me, session_id);
        notify_departure(departure, &me);
        Ok(())
    }

    /// Register a bus object implementing `interfaces` at `path`
    pub fn register_bus_object(
        &self,
        path: &str,
        interfaces: Vec<Arc<InterfaceDescription>>,
    ) -> Result<()> {
        check_object_path(path)?;
        let mut state = self.shared.state.write();
        if state.objects.contains_key(path) {
            return Err(BusError::ObjectExists {
                path: path.to_string(),
            }
            .into());
        }
        state.objects.insert(path.to_string(), interfaces);
        Ok(())
    }

    /// Emit a signal from the object at `path`
    ///
    /// With a session id the signal reaches that session's other members,
    /// otherwise every other connected attachment. Returns the number of
    /// handlers that received it.
    pub fn emit_signal(
        &self,
        member: &Member,
        path: &str,
        args: Vec<MsgArg>,
        session_id: Option<SessionId>,
    ) -> Result<usize> {
        let me = self.require_unique()?;
        if !member.is_signal() {
            return Err(InterfaceError::SignalNotFound {
                interface: member.interface.clone(),
                member: member.name.clone(),
            }
            .into());
        }
        check_object_path(path)?;
        member.check_args(&args)?;

        let mut message = Message::new(
            me.clone(),
            path,
            member.interface.clone(),
            member.name.clone(),
            args,
        );

        let targets = {
            let router = self.bus.router.read();
            match session_id {
                Some(id) => {
                    let session = router
                        .sessions
                        .get(&id)
                        .filter(|s| s.contains(&me))
                        .ok_or(BusError::NoSuchSession { session_id: id })?;
                    message = message.with_session(id);
                    session
                        .members
                        .iter()
                        .filter(|m| **m != me)
                        .filter_map(|m| router.connection(m))
                        .collect::<Vec<_>>()
                }
                None => router.peers(Some(me.as_str())),
            }
        };

        let delivered: usize = targets
            .iter()
            .map(|target| target.deliver_signal(&message))
            .sum();
        tracing::debug!(
            "{}.{} from {} reached {} handler(s)",
            member.interface,
            member.name,
            path,
            delivered
        );
        Ok(delivered)
    }
}

impl BusAttachment for LocalAttachment {
    fn unique_name(&self) -> Option<String> {
        self.shared.unique_name()
    }

    fn interface(&self, name: &str) -> Option<Arc<InterfaceDescription>> {
        self.shared.state.read().interfaces.get(name).cloned()
    }

    fn register_signal_handler(
        &self,
        handler: Arc<dyn SignalHandler>,
        member: &Member,
        source_path: &str,
    ) -> Result<HandlerId> {
        if !member.is_signal() {
            return Err(InterfaceError::SignalNotFound {
                interface: member.interface.clone(),
                member: member.name.clone(),
            }
            .into());
        }
        if !source_path.is_empty() {
            check_object_path(source_path)?;
        }

        let mut state = self.shared.state.write();
        let duplicate = state.signal_handlers.iter().any(|reg| {
            same_object(&reg.handler, &handler)
                && reg.interface == member.interface
                && reg.member == member.name
                && reg.source_path == source_path
        });
        if duplicate {
            return Err(BusError::AlreadyRegistered {
                what: format!("signal handler for {}.{}", member.interface, member.name),
            }
            .into());
        }

        let id = HandlerId::new();
        state.signal_handlers.push(SignalRegistration {
            id,
            handler,
            interface: member.interface.clone(),
            member: member.name.clone(),
            source_path: source_path.to_string(),
        });
        tracing::debug!(
            "{} registered for {}.{} (path filter '{}')",
            id,
            member.interface,
            member.name,
            source_path
        );
        Ok(id)
    }

    fn unregister_signal_handler(&self, id: HandlerId) -> Result<()> {
        let mut state = self.shared.state.write();
        let before = state.signal_handlers.len();
        state.signal_handlers.retain(|reg| reg.id != id);
        if state.signal_handlers.len() == before {
            return Err(BusError::HandlerNotFound { id: id.to_string() }.into());
        }
        tracing::debug!("{} unregistered", id);
        Ok(())
    }

    fn register_bus_listener(&self, listener: Arc<dyn BusListener>) -> Result<ListenerId> {
        let id = {
            let mut state = self.shared.state.write();
            if state
                .bus_listeners
                .iter()
                .any(|(_, existing)| same_object(existing, &listener))
            {
                return Err(BusError::AlreadyRegistered {
                    what: "bus listener".to_string(),
                }
                .into());
            }
            let id = ListenerId::new();
            state.bus_listeners.push((id, listener.clone()));
            id
        };
        tracing::debug!("{} registered", id);
        self.shared
            .deliver_bus_to(listener.as_ref(), EventRecord::bare(EventKind::ListenerRegistered));
        Ok(id)
    }

    fn unregister_bus_listener(&self, id: ListenerId) -> Result<()> {
        let listener = {
            let mut state = self.shared.state.write();
            let index = state
                .bus_listeners
                .iter()
                .position(|(existing, _)| *existing == id)
                .ok_or_else(|| BusError::ListenerNotFound { id: id.to_string() })?;
            state.bus_listeners.remove(index).1
        };
        tracing::debug!("{} unregistered", id);
        self.shared.deliver_bus_to(
            listener.as_ref(),
            EventRecord::bare(EventKind::ListenerUnregistered),
        );
        Ok(())
    }

    fn join_session(
        &self,
        host: &str,
        port: SessionPort,
        listener: Option<Arc<dyn SessionListener>>,
    ) -> Result<SessionId> {
        let me = self.require_unique()?;
        prune_dropped(&self.bus);

        let (host_unique, host_shared) = {
            let router = self.bus.router.read();
            let unique = router.resolve(host).ok_or_else(|| BusError::NoSuchHost {
                host: host.to_string(),
            })?;
            let shared = router.connection(&unique).ok_or_else(|| BusError::NoSuchHost {
                host: host.to_string(),
            })?;
            (unique, shared)
        };
        if host_unique == me {
            return Err(BusError::JoinRejected {
                host: host.to_string(),
                port,
            }
            .into());
        }

        let port_listener = host_shared
            .state
            .read()
            .session_ports
            .get(&port)
            .cloned()
            .ok_or_else(|| BusError::NoSuchPort {
                host: host.to_string(),
                port,
            })?;
        if !port_listener.accept_session_joiner(port, &me) {
            return Err(BusError::JoinRejected {
                host: host.to_string(),
                port,
            }
            .into());
        }

        let (session_id, existing) = {
            let mut router = self.bus.router.write();
            let session_id = match router.session_for(&host_unique, port) {
                Some(id) => id,
                None => {
                    let id = router.allocate_session_id();
                    router.sessions.insert(
                        id,
                        Session {
                            host: host_unique.clone(),
                            port,
                            members: vec![host_unique.clone()],
                        },
                    );
                    id
                }
            };
            let session = router
                .sessions
                .get_mut(&session_id)
                .ok_or(BusError::NoSuchSession { session_id })?;
            if session.contains(&me) {
                return Ok(session_id);
            }
            let existing = session.members.clone();
            session.members.push(me.clone());
            let existing: Vec<(String, Option<Arc<Shared>>)> = existing
                .into_iter()
                .map(|name| {
                    let shared = router.connection(&name);
                    (name, shared)
                })
                .collect();
            (session_id, existing)
        };

        if let Some(listener) = listener {
            self.shared
                .state
                .write()
                .session_listeners
                .insert(session_id, listener);
        }
        tracing::info!("{} joined session {} on {}:{}", me, session_id, host, port);

        port_listener.session_joined(port, session_id, &me);
        for (_, member) in &existing {
            if let Some(member) = member {
                member.deliver_session(
                    session_id,
                    EventRecord::session_member_added(session_id, &me),
                );
            }
        }
        for (name, _) in &existing {
            self.shared.deliver_session(
                session_id,
                EventRecord::session_member_added(session_id, name),
            );
        }
        Ok(session_id)
    }

    fn create_proxy(
        &self,
        service: &str,
        path: &str,
        session_id: SessionId,
    ) -> Result<ProxyBusObject> {
        let me = self.require_unique()?;

        let (unique_name, remote) = {
            let router = self.bus.router.read();
            let unique = router.resolve(service).ok_or_else(|| BusError::NoSuchHost {
                host: service.to_string(),
            })?;
            let in_session = router
                .sessions
                .get(&session_id)
                .is_some_and(|s| s.contains(&me) && s.contains(&unique));
            if !in_session {
                return Err(BusError::NoSuchSession { session_id }.into());
            }
            let remote = router.connection(&unique).ok_or_else(|| BusError::NoSuchHost {
                host: service.to_string(),
            })?;
            (unique, remote)
        };

        let interfaces = remote
            .state
            .read()
            .objects
            .get(path)
            .cloned()
            .ok_or_else(|| BusError::NoSuchObject {
                service: service.to_string(),
                path: path.to_string(),
            })?;

        tracing::debug!(
            "Proxy for {}{} over session {} ({} interface(s))",
            service,
            path,
            session_id,
            interfaces.len()
        );
        Ok(ProxyBusObject {
            service_name: service.to_string(),
            unique_name,
            path: path.to_string(),
            session_id,
            interfaces,
        })
    }
}

impl Drop for LocalAttachment {
    fn drop(&mut self) {
        // Another clone still uses the connection
        if Arc::strong_count(&self.shared) > 1 || !self.is_connected() {
            return;
        }
        if let Err(e) = self.disconnect() {
            tracing::debug!("Disconnect on drop failed: {}", e);
        }
    }
}

impl std::fmt::Debug for LocalAttachment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalAttachment")
            .field("application_name", &self.shared.application_name)
            .field("unique_name", &self.shared.unique_name())
            .finish()
    }
}
