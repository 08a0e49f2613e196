//! Bus attachment interface
//!
//! The operations a client needs from its connection to the bus. The adapter
//! and client worker are written against this trait; `ajsignal-bus` provides
//! the in-process implementation.

use std::sync::Arc;

use uuid::Uuid;

use crate::core::listener::{BusListener, SessionListener, SignalHandler};
use crate::error::Result;
use crate::interface::{InterfaceDescription, Member};
use crate::types::{SessionId, SessionPort};

/// Handle for a registered bus listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(Uuid);

impl ListenerId {
    /// Create a new unique listener id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ListenerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ListenerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Listener({})", &self.0.to_string()[..8])
    }
}

/// Handle for a registered signal handler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(Uuid);

impl HandlerId {
    /// Create a new unique handler id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for HandlerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for HandlerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Handler({})", &self.0.to_string()[..8])
    }
}

/// Local stand-in for a remote bus object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyBusObject {
    /// Name the service was reached by.
    pub service_name: String,
    /// Unique name of the connection hosting the object.
    pub unique_name: String,
    /// Object path on the remote side.
    pub path: String,
    /// Session the proxy talks over.
    pub session_id: SessionId,
    /// Interfaces the remote object implements.
    pub interfaces: Vec<Arc<InterfaceDescription>>,
}

impl ProxyBusObject {
    /// Whether the remote object implements `name`
    pub fn implements(&self, name: &str) -> bool {
        self.interfaces.iter().any(|iface| iface.name() == name)
    }

    /// Look up an implemented interface
    pub fn interface(&self, name: &str) -> Option<&Arc<InterfaceDescription>> {
        self.interfaces.iter().find(|iface| iface.name() == name)
    }
}

/// Operations a client performs on its bus connection
pub trait BusAttachment: Send + Sync {
    /// Unique name of the connection, if connected
    fn unique_name(&self) -> Option<String>;

    /// Look up an interface description known to this attachment
    fn interface(&self, name: &str) -> Option<Arc<InterfaceDescription>>;

    /// Register a handler for `member`
    ///
    /// An empty `source_path` matches signals from every object path.
    fn register_signal_handler(
        &self,
        handler: Arc<dyn SignalHandler>,
        member: &Member,
        source_path: &str,
    ) -> Result<HandlerId>;

    /// Remove a signal handler registration
    fn unregister_signal_handler(&self, id: HandlerId) -> Result<()>;

    /// Register a bus listener
    fn register_bus_listener(&self, listener: Arc<dyn BusListener>) -> Result<ListenerId>;

    /// Remove a bus listener registration
    fn unregister_bus_listener(&self, id: ListenerId) -> Result<()>;

    /// Join the session bound on `port` by `host`
    fn join_session(
        &self,
        host: &str,
        port: SessionPort,
        listener: Option<Arc<dyn SessionListener>>,
    ) -> Result<SessionId>;

    /// Build a proxy for the object at `path` on `service`
    fn create_proxy(
        &self,
        service: &str,
        path: &str,
        session_id: SessionId,
    ) -> Result<ProxyBusObject>;
}
