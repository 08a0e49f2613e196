//! Event records and dispatch
//!
//! Provides:
//! - `EventKind`, the named events a bus delivers, with their wire names
//! - `EventRecord`, an event plus its ordered positional arguments
//! - Dispatchers that decode a record and invoke the typed listener method

use std::sync::Arc;

use crate::core::listener::{BusListener, SessionListener, SignalHandler};
use crate::error::EventError;
use crate::types::{Message, SessionId, TransportMask};

/// Listener family an event is delivered to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventCategory {
    /// Bus listener events.
    Bus,
    /// Session listener events.
    Session,
    /// Signal receiver events.
    Signal,
}

impl std::fmt::Display for EventCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventCategory::Bus => write!(f, "Bus"),
            EventCategory::Session => write!(f, "Session"),
            EventCategory::Signal => write!(f, "Signal"),
        }
    }
}

/// Named bus, session, and signal events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Attachment lost its bus connection.
    BusDisconnected,
    /// Attachment is stopping.
    BusStopping,
    /// Listener was registered.
    ListenerRegistered,
    /// Listener was unregistered.
    ListenerUnregistered,
    /// Discovery found an advertised name.
    FoundAdvertisedName,
    /// An advertised name went away.
    LostAdvertisedName,
    /// Well-known name ownership changed.
    NameOwnerChanged,
    /// Session was lost.
    SessionLost,
    /// Session member joined.
    SessionMemberAdded,
    /// Session member left.
    SessionMemberRemoved,
    /// A registered signal arrived.
    SignalReceived,
}

impl EventKind {
    /// All event kinds
    pub const ALL: [EventKind; 11] = [
        EventKind::BusDisconnected,
        EventKind::BusStopping,
        EventKind::ListenerRegistered,
        EventKind::ListenerUnregistered,
        EventKind::FoundAdvertisedName,
        EventKind::LostAdvertisedName,
        EventKind::NameOwnerChanged,
        EventKind::SessionLost,
        EventKind::SessionMemberAdded,
        EventKind::SessionMemberRemoved,
        EventKind::SignalReceived,
    ];

    /// Wire name of the event
    pub fn wire_name(self) -> &'static str {
        match self {
            EventKind::BusDisconnected => "busdisconnected",
            EventKind::BusStopping => "busstopping",
            EventKind::ListenerRegistered => "listenerregistered",
            EventKind::ListenerUnregistered => "listenerunregistered",
            EventKind::FoundAdvertisedName => "foundadvertisedname",
            EventKind::LostAdvertisedName => "lostadvertisedname",
            EventKind::NameOwnerChanged => "nameownerchanged",
            EventKind::SessionLost => "sessionlost",
            EventKind::SessionMemberAdded => "sessionmemberadded",
            EventKind::SessionMemberRemoved => "sessionmemberremoved",
            EventKind::SignalReceived => "signalhandler",
        }
    }

    /// Parse a wire name
    pub fn from_wire_name(name: &str) -> Result<Self, EventError> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.wire_name() == name)
            .ok_or_else(|| EventError::UnknownEvent {
                name: name.to_string(),
            })
    }

    /// Listener family this event belongs to
    pub fn category(self) -> EventCategory {
        match self {
            EventKind::SessionLost
            | EventKind::SessionMemberAdded
            | EventKind::SessionMemberRemoved => EventCategory::Session,
            EventKind::SignalReceived => EventCategory::Signal,
            _ => EventCategory::Bus,
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.wire_name())
    }
}

/// A positional event argument
#[derive(Debug, Clone, PartialEq)]
pub enum EventArg {
    /// String argument
    Str(String),
    /// Integer argument
    Int(i64),
    /// Message object argument
    Message(Arc<Message>),
}

impl From<&str> for EventArg {
    fn from(value: &str) -> Self {
        EventArg::Str(value.to_string())
    }
}

impl From<String> for EventArg {
    fn from(value: String) -> Self {
        EventArg::Str(value)
    }
}

impl From<i64> for EventArg {
    fn from(value: i64) -> Self {
        EventArg::Int(value)
    }
}

impl From<Message> for EventArg {
    fn from(value: Message) -> Self {
        EventArg::Message(Arc::new(value))
    }
}

/// An event together with its ordered arguments
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    /// What happened.
    pub kind: EventKind,
    /// Positional arguments.
    pub args: Vec<EventArg>,
}

impl EventRecord {
    /// Create a record
    pub fn new(kind: EventKind, args: Vec<EventArg>) -> Self {
        Self { kind, args }
    }

    /// Record without arguments
    pub fn bare(kind: EventKind) -> Self {
        Self::new(kind, Vec::new())
    }

    /// `foundadvertisedname` record
    pub fn found_advertised_name(name: &str, transport: TransportMask, prefix: &str) -> Self {
        Self::new(
            EventKind::FoundAdvertisedName,
            vec![name.into(), i64::from(transport.bits()).into(), prefix.into()],
        )
    }

    /// `lostadvertisedname` record
    pub fn lost_advertised_name(name: &str, transport: TransportMask, prefix: &str) -> Self {
        Self::new(
            EventKind::LostAdvertisedName,
            vec![name.into(), i64::from(transport.bits()).into(), prefix.into()],
        )
    }

    /// `nameownerchanged` record; a missing owner is an empty string
    pub fn name_owner_changed(name: &str, previous: Option<&str>, new: Option<&str>) -> Self {
        Self::new(
            EventKind::NameOwnerChanged,
            vec![
                name.into(),
                previous.unwrap_or_default().into(),
                new.unwrap_or_default().into(),
            ],
        )
    }

    /// `sessionlost` record
    pub fn session_lost(session_id: SessionId) -> Self {
        Self::new(EventKind::SessionLost, vec![i64::from(session_id).into()])
    }

    /// `sessionmemberadded` record
    pub fn session_member_added(session_id: SessionId, unique_name: &str) -> Self {
        Self::new(
            EventKind::SessionMemberAdded,
            vec![i64::from(session_id).into(), unique_name.into()],
        )
    }

    /// `sessionmemberremoved` record
    pub fn session_member_removed(session_id: SessionId, unique_name: &str) -> Self {
        Self::new(
            EventKind::SessionMemberRemoved,
            vec![i64::from(session_id).into(), unique_name.into()],
        )
    }

    /// `signalhandler` record
    pub fn signal_received(member: &str, source_path: &str, message: Message) -> Self {
        Self::new(
            EventKind::SignalReceived,
            vec![member.into(), source_path.into(), message.into()],
        )
    }

    fn arg(&self, index: usize) -> Result<&EventArg, EventError> {
        self.args.get(index).ok_or_else(|| EventError::MissingArg {
            kind: self.kind.wire_name().to_string(),
            index,
        })
    }

    fn wrong_type(&self, index: usize, expected: &'static str) -> EventError {
        EventError::WrongType {
            kind: self.kind.wire_name().to_string(),
            index,
            expected,
        }
    }

    /// String argument at `index`
    pub fn str_arg(&self, index: usize) -> Result<&str, EventError> {
        match self.arg(index)? {
            EventArg::Str(s) => Ok(s),
            _ => Err(self.wrong_type(index, "a string")),
        }
    }

    /// Integer argument at `index`
    pub fn int_arg(&self, index: usize) -> Result<i64, EventError> {
        match self.arg(index)? {
            EventArg::Int(v) => Ok(*v),
            _ => Err(self.wrong_type(index, "an integer")),
        }
    }

    /// Message argument at `index`
    pub fn message_arg(&self, index: usize) -> Result<&Message, EventError> {
        match self.arg(index)? {
            EventArg::Message(m) => Ok(m),
            _ => Err(self.wrong_type(index, "a message")),
        }
    }

    fn transport_arg(&self, index: usize) -> Result<TransportMask, EventError> {
        let raw = self.int_arg(index)?;
        u16::try_from(raw)
            .map(TransportMask)
            .map_err(|_| self.wrong_type(index, "a transport mask"))
    }

    fn session_arg(&self, index: usize) -> Result<SessionId, EventError> {
        let raw = self.int_arg(index)?;
        SessionId::try_from(raw).map_err(|_| self.wrong_type(index, "a session id"))
    }

    fn wrong_listener(&self) -> EventError {
        EventError::WrongListener {
            kind: self.kind.wire_name().to_string(),
        }
    }
}

impl std::fmt::Display for EventRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}(", self.kind)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match arg {
                EventArg::Str(s) => write!(f, "{:?}", s)?,
                EventArg::Int(v) => write!(f, "{}", v)?,
                EventArg::Message(m) => {
                    write!(f, "<{}.{} from {}>", m.interface, m.member, m.sender)?
                }
            }
        }
        write!(f, ")")
    }
}

fn optional(name: &str) -> Option<&str> {
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

/// Decode a bus event record and invoke the matching listener method
pub fn dispatch_bus_event(
    listener: &dyn BusListener,
    record: &EventRecord,
) -> Result<(), EventError> {
    match record.kind {
        EventKind::BusDisconnected => listener.bus_disconnected(),
        EventKind::BusStopping => listener.bus_stopping(),
        EventKind::ListenerRegistered => listener.listener_registered(),
        EventKind::ListenerUnregistered => listener.listener_unregistered(),
        EventKind::FoundAdvertisedName => {
            let name = record.str_arg(0)?;
            let transport = record.transport_arg(1)?;
            let prefix = record.str_arg(2)?;
            listener.found_advertised_name(name, transport, prefix);
        }
        EventKind::LostAdvertisedName => {
            let name = record.str_arg(0)?;
            let transport = record.transport_arg(1)?;
            let prefix = record.str_arg(2)?;
            listener.lost_advertised_name(name, transport, prefix);
        }
        EventKind::NameOwnerChanged => {
            let name = record.str_arg(0)?;
            let previous = optional(record.str_arg(1)?);
            let new = optional(record.str_arg(2)?);
            listener.name_owner_changed(name, previous, new);
        }
        _ => return Err(record.wrong_listener()),
    }
    Ok(())
}

/// Decode a session event record and invoke the matching listener method
pub fn dispatch_session_event(
    listener: &dyn SessionListener,
    record: &EventRecord,
) -> Result<(), EventError> {
    match record.kind {
        EventKind::SessionLost => listener.session_lost(record.session_arg(0)?),
        EventKind::SessionMemberAdded => {
            let session_id = record.session_arg(0)?;
            listener.session_member_added(session_id, record.str_arg(1)?);
        }
        EventKind::SessionMemberRemoved => {
            let session_id = record.session_arg(0)?;
            listener.session_member_removed(session_id, record.str_arg(1)?);
        }
        _ => return Err(record.wrong_listener()),
    }
    Ok(())
}

/// Decode a signal record and invoke the handler
pub fn dispatch_signal(
    handler: &dyn SignalHandler,
    record: &EventRecord,
) -> Result<(), EventError> {
    if record.kind != EventKind::SignalReceived {
        return Err(record.wrong_listener());
    }
    let member = record.str_arg(0)?;
    let path = record.str_arg(1)?;
    let message = record.message_arg(2)?;
    handler.signal_received(member, path, message);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Calls(Mutex<Vec<String>>);

    impl Calls {
        fn push(&self, call: String) {
            self.0.lock().push(call);
        }

        fn take(&self) -> Vec<String> {
            std::mem::take(&mut *self.0.lock())
        }
    }

    impl BusListener for Calls {
        fn found_advertised_name(&self, name: &str, transport: TransportMask, prefix: &str) {
            self.push(format!("found {} {} {}", name, transport, prefix));
        }

        fn name_owner_changed(&self, name: &str, previous: Option<&str>, new: Option<&str>) {
            self.push(format!("owner {} {:?} {:?}", name, previous, new));
        }

        fn bus_stopping(&self) {
            self.push("stopping".to_string());
        }
    }

    impl SessionListener for Calls {
        fn session_member_added(&self, session_id: SessionId, unique_name: &str) {
            self.push(format!("added {} {}", session_id, unique_name));
        }
    }

    #[test]
    fn test_wire_names_round_trip() {
        for kind in EventKind::ALL {
            assert_eq!(EventKind::from_wire_name(kind.wire_name()), Ok(kind));
        }
        assert!(matches!(
            EventKind::from_wire_name("nosuchevent"),
            Err(EventError::UnknownEvent { .. })
        ));
    }

    #[test]
    fn test_categories() {
        assert_eq!(EventKind::BusStopping.category(), EventCategory::Bus);
        assert_eq!(EventKind::SessionLost.category(), EventCategory::Session);
        assert_eq!(EventKind::SignalReceived.category(), EventCategory::Signal);
    }

    #[test]
    fn test_dispatch_found_advertised_name() {
        let calls = Calls::default();
        let record = EventRecord::found_advertised_name(
            "org.alljoyn.Bus.signal_sample",
            TransportMask::TCP,
            "org.alljoyn.Bus",
        );
        dispatch_bus_event(&calls, &record).unwrap();
        assert_eq!(
            calls.take(),
            vec!["found org.alljoyn.Bus.signal_sample 4 org.alljoyn.Bus"]
        );
    }

    #[test]
    fn test_dispatch_name_owner_changed_maps_empty_to_none() {
        let calls = Calls::default();
        let record = EventRecord::name_owner_changed("org.example.Svc", None, Some(":a.1"));
        dispatch_bus_event(&calls, &record).unwrap();
        assert_eq!(
            calls.take(),
            vec!["owner org.example.Svc None Some(\":a.1\")"]
        );
    }

    #[test]
    fn test_dispatch_rejects_malformed_records() {
        let calls = Calls::default();

        let short = EventRecord::new(EventKind::FoundAdvertisedName, vec!["name".into()]);
        assert_eq!(
            dispatch_bus_event(&calls, &short),
            Err(EventError::MissingArg {
                kind: "foundadvertisedname".to_string(),
                index: 1
            })
        );

        let mistyped = EventRecord::new(
            EventKind::SessionMemberAdded,
            vec!["seven".into(), ":a.1".into()],
        );
        assert!(matches!(
            dispatch_session_event(&calls, &mistyped),
            Err(EventError::WrongType { index: 0, .. })
        ));

        let negative_port = EventRecord::new(
            EventKind::FoundAdvertisedName,
            vec!["n".into(), (-1i64).into(), "p".into()],
        );
        assert!(dispatch_bus_event(&calls, &negative_port).is_err());
        assert!(calls.take().is_empty());
    }

    #[test]
    fn test_dispatch_wrong_listener() {
        let calls = Calls::default();
        let record = EventRecord::session_lost(3);
        assert_eq!(
            dispatch_bus_event(&calls, &record),
            Err(EventError::WrongListener {
                kind: "sessionlost".to_string()
            })
        );
        assert!(
            dispatch_session_event(&calls, &EventRecord::bare(EventKind::BusStopping)).is_err()
        );
    }

    #[test]
    fn test_record_display() {
        let record = EventRecord::session_member_added(7, ":a.2");
        assert_eq!(record.to_string(), "sessionmemberadded(7, \":a.2\")");
    }
}
