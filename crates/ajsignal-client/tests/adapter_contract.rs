//! Contract tests for the signal consumer against a mock attachment

use ajsignal_client::{
    BufferedOutput, ClientActions, JoinSessionRequest, SignalConsumer, REGISTERED_LINE,
};
use ajsignal_core::{
    dispatch_bus_event, dispatch_session_event, dispatch_signal, BusAttachment, BusError,
    BusListener, ClientConfig, Error, EventKind, EventRecord, HandlerId, InterfaceDescription,
    InterfaceError, ListenerId, Member, Message, MsgArg, ProxyBusObject, Result, SessionId,
    SessionListener, SessionPort, SignalHandler, TransportMask,
};
use parking_lot::Mutex;
use proptest::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;

const NAME: &str = "org.alljoyn.Bus.signal_sample";

struct SignalRegistration {
    id: HandlerId,
    member: Member,
    source_path: String,
    handler: Arc<dyn SignalHandler>,
}

/// Attachment that records registrations and allows duplicates
#[derive(Default)]
struct MockBus {
    interfaces: HashMap<String, Arc<InterfaceDescription>>,
    signals: Mutex<Vec<SignalRegistration>>,
    listeners: Mutex<Vec<(ListenerId, Arc<dyn BusListener>)>>,
}

impl MockBus {
    fn with_interface(iface: InterfaceDescription) -> Self {
        let mut bus = Self::default();
        bus.interfaces
            .insert(iface.name().to_string(), Arc::new(iface));
        bus
    }

    fn sample() -> Self {
        let mut iface = InterfaceDescription::new(NAME).unwrap();
        iface.add_signal("nameChanged", "s", "newName").unwrap();
        iface.activate();
        Self::with_interface(iface)
    }

    fn handler(&self, index: usize) -> Arc<dyn SignalHandler> {
        self.signals.lock()[index].handler.clone()
    }

    fn listener(&self, index: usize) -> Arc<dyn BusListener> {
        self.listeners.lock()[index].1.clone()
    }
}

impl BusAttachment for MockBus {
    fn unique_name(&self) -> Option<String> {
        Some(":mock.1".to_string())
    }

    fn interface(&self, name: &str) -> Option<Arc<InterfaceDescription>> {
        self.interfaces.get(name).cloned()
    }

    fn register_signal_handler(
        &self,
        handler: Arc<dyn SignalHandler>,
        member: &Member,
        source_path: &str,
    ) -> Result<HandlerId> {
        let id = HandlerId::new();
        self.signals.lock().push(SignalRegistration {
            id,
            member: member.clone(),
            source_path: source_path.to_string(),
            handler,
        });
        Ok(id)
    }

    fn unregister_signal_handler(&self, id: HandlerId) -> Result<()> {
        let mut signals = self.signals.lock();
        let before = signals.len();
        signals.retain(|reg| reg.id != id);
        if signals.len() == before {
            return Err(BusError::HandlerNotFound { id: id.to_string() }.into());
        }
        Ok(())
    }

    fn register_bus_listener(&self, listener: Arc<dyn BusListener>) -> Result<ListenerId> {
        let id = ListenerId::new();
        self.listeners.lock().push((id, listener));
        Ok(id)
    }

    fn unregister_bus_listener(&self, id: ListenerId) -> Result<()> {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        if listeners.len() == before {
            return Err(BusError::ListenerNotFound { id: id.to_string() }.into());
        }
        Ok(())
    }

    fn join_session(
        &self,
        host: &str,
        port: SessionPort,
        _listener: Option<Arc<dyn SessionListener>>,
    ) -> Result<SessionId> {
        Err(BusError::NoSuchPort {
            host: host.to_string(),
            port,
        }
        .into())
    }

    fn create_proxy(
        &self,
        service: &str,
        path: &str,
        _session_id: SessionId,
    ) -> Result<ProxyBusObject> {
        Err(BusError::NoSuchObject {
            service: service.to_string(),
            path: path.to_string(),
        }
        .into())
    }
}

/// Actions that count triggers
#[derive(Default)]
struct Triggers {
    joins: Mutex<Vec<JoinSessionRequest>>,
    proxies: Mutex<Vec<(SessionId, String)>>,
}

impl Triggers {
    fn total(&self) -> usize {
        self.joins.lock().len() + self.proxies.lock().len()
    }
}

impl ClientActions for Triggers {
    fn join_session(&self, request: JoinSessionRequest) {
        self.joins.lock().push(request);
    }

    fn proxy_remote_connect(&self, session_id: SessionId, member: &str) {
        self.proxies.lock().push((session_id, member.to_string()));
    }
}

struct Fixture {
    bus: MockBus,
    triggers: Arc<Triggers>,
    output: Arc<BufferedOutput>,
    consumer: SignalConsumer,
}

fn fixture() -> Fixture {
    let bus = MockBus::sample();
    let triggers = Arc::new(Triggers::default());
    let output = Arc::new(BufferedOutput::new());
    let consumer = SignalConsumer::attach(
        &bus,
        &ClientConfig::default(),
        triggers.clone(),
        output.clone(),
    )
    .unwrap();
    // Only the registration line so far
    assert_eq!(output.drain(), vec![REGISTERED_LINE]);
    Fixture {
        bus,
        triggers,
        output,
        consumer,
    }
}

fn name_changed(new_name: MsgArg) -> EventRecord {
    let message = Message::new(":svc.1", "/", NAME, "nameChanged", vec![new_name]);
    EventRecord::signal_received("nameChanged", "/", message)
}

#[test]
fn test_attach_registers_one_signal_receiver() {
    let f = fixture();
    let signals = f.bus.signals.lock();
    assert_eq!(signals.len(), 1);
    assert_eq!(signals[0].member.interface, NAME);
    assert_eq!(signals[0].member.name, "nameChanged");
    assert_eq!(signals[0].source_path, "");
    assert_eq!(signals[0].id, f.consumer.handler_id());
    assert_eq!(f.bus.listeners.lock().len(), 1);
}

#[test]
fn test_signal_prints_new_name() {
    let f = fixture();
    dispatch_signal(f.bus.handler(0).as_ref(), &name_changed(MsgArg::from("Bob"))).unwrap();

    let lines = f.output.lines();
    let matching: Vec<&String> = lines
        .iter()
        .filter(|line| line.contains("new name 'Bob'"))
        .collect();
    assert_eq!(matching.len(), 1);
    assert_eq!(
        matching[0],
        "'Name Changed' signal received from path: org.alljoyn.Bus.signal_sample/ with new name 'Bob'."
    );
    assert_eq!(f.triggers.total(), 0);
}

#[test]
fn test_signal_without_string_argument() {
    let f = fixture();
    dispatch_signal(f.bus.handler(0).as_ref(), &name_changed(MsgArg::Bool(true))).unwrap();
    assert!(f.output.lines()[1].ends_with("with new name ''."));
}

#[test]
fn test_found_name_prints_and_joins_once() {
    let f = fixture();
    let record = EventRecord::found_advertised_name(NAME, TransportMask::TCP, "org.alljoyn.Bus");
    dispatch_bus_event(f.bus.listener(0).as_ref(), &record).unwrap();

    let lines = f.output.lines();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains(NAME));
    assert!(lines[0].contains("transport=4"));
    assert!(lines[0].contains("prefix=org.alljoyn.Bus"));

    let joins = f.triggers.joins.lock();
    assert_eq!(joins.len(), 1);
    assert_eq!(joins[0].name, NAME);
    assert_eq!(joins[0].transport, TransportMask::TCP);
    assert_eq!(joins[0].prefix, "org.alljoyn.Bus");
    assert_eq!(joins[0].session_port, 25);
    assert!(f.triggers.proxies.lock().is_empty());
}

#[test]
fn test_member_added_triggers_proxy_silently() {
    let f = fixture();

    // The listener handed to the join trigger is the consumer's own
    let record = EventRecord::found_advertised_name(NAME, TransportMask::TCP, NAME);
    dispatch_bus_event(f.bus.listener(0).as_ref(), &record).unwrap();
    let listener = f.triggers.joins.lock()[0].listener.clone();
    f.output.drain();

    let record = EventRecord::session_member_added(77, ":svc.1");
    dispatch_session_event(listener.as_ref(), &record).unwrap();

    assert_eq!(*f.triggers.proxies.lock(), vec![(77, ":svc.1".to_string())]);
    assert!(f.output.is_empty());
}

fn stub_events() -> Vec<EventRecord> {
    vec![
        EventRecord::bare(EventKind::BusDisconnected),
        EventRecord::bare(EventKind::BusStopping),
        EventRecord::bare(EventKind::ListenerRegistered),
        EventRecord::bare(EventKind::ListenerUnregistered),
        EventRecord::lost_advertised_name(NAME, TransportMask::TCP, NAME),
        EventRecord::name_owner_changed(NAME, None, Some(":svc.1")),
        EventRecord::session_lost(5),
        EventRecord::session_member_removed(5, ":svc.1"),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn stub_events_do_nothing(picks in prop::collection::vec(0usize..8, 0..40)) {
        let f = fixture();
        let events = stub_events();
        let bus_listener = f.bus.listener(0);
        let session_listener = f.consumer.session_listener();

        for pick in picks {
            let record = &events[pick];
            if record.kind.category() == ajsignal_core::EventCategory::Session {
                dispatch_session_event(session_listener.as_ref(), record).unwrap();
            } else {
                dispatch_bus_event(bus_listener.as_ref(), record).unwrap();
            }
        }

        prop_assert!(f.output.is_empty());
        prop_assert_eq!(f.triggers.total(), 0);
    }
}

#[test]
fn test_attach_twice_registers_twice() {
    let bus = MockBus::sample();
    let triggers = Arc::new(Triggers::default());
    let output = Arc::new(BufferedOutput::new());
    let config = ClientConfig::default();

    let first = SignalConsumer::attach(&bus, &config, triggers.clone(), output.clone()).unwrap();
    let second = SignalConsumer::attach(&bus, &config, triggers.clone(), output.clone()).unwrap();

    assert_eq!(bus.signals.lock().len(), 2);
    assert_eq!(bus.listeners.lock().len(), 2);
    assert_ne!(first.handler_id(), second.handler_id());
    assert_eq!(output.lines(), vec![REGISTERED_LINE, REGISTERED_LINE]);
}

#[test]
fn test_detach_removes_registrations() {
    let f = fixture();
    f.consumer.detach(&f.bus).unwrap();
    assert!(f.bus.signals.lock().is_empty());
    assert!(f.bus.listeners.lock().is_empty());
}

#[test]
fn test_missing_interface() {
    let bus = MockBus::default();
    let err = SignalConsumer::attach(
        &bus,
        &ClientConfig::default(),
        Arc::new(Triggers::default()),
        Arc::new(BufferedOutput::new()),
    )
    .unwrap_err();
    assert!(matches!(err, Error::Interface(InterfaceError::NotFound { .. })));
}

#[test]
fn test_interface_without_signal() {
    let output = Arc::new(BufferedOutput::new());

    let mut iface = InterfaceDescription::new(NAME).unwrap();
    iface.add_method("nameChanged", "s", "", "newName").unwrap();
    let bus = MockBus::with_interface(iface);

    let err = SignalConsumer::attach(
        &bus,
        &ClientConfig::default(),
        Arc::new(Triggers::default()),
        output.clone(),
    )
    .unwrap_err();
    assert!(matches!(
        err,
        Error::Interface(InterfaceError::SignalNotFound { .. })
    ));
    assert!(output.is_empty());
    assert!(bus.signals.lock().is_empty());
    assert!(bus.listeners.lock().is_empty());
}
