//! Listener interfaces, event records, and the bus attachment contract.

pub mod attachment;
pub mod event;
pub mod listener;

pub use attachment::{BusAttachment, HandlerId, ListenerId, ProxyBusObject};
pub use event::{
    dispatch_bus_event, dispatch_session_event, dispatch_signal, EventArg, EventCategory,
    EventKind, EventRecord,
};
pub use listener::{BusListener, SessionListener, SessionPortListener, SignalHandler};
