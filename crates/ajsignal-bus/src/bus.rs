//! In-process bus router.
//!
//! `LocalBus` owns the state shared by every attachment connected through
//! the `null:` transport: unique name assignment, well-known name owners,
//! advertisements, and sessions. Attachments hold a clone of the bus handle;
//! the router only keeps weak references back to them.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use uuid::Uuid;

use ajsignal_core::{SessionId, SessionPort, TransportMask};

use crate::attachment::Shared;

/// Connect spec accepted by the local bus
pub const NULL_TRANSPORT_SPEC: &str = "null:";

/// Configuration for the local bus
#[derive(Debug, Clone)]
pub struct LocalBusConfig {
    /// Capacity of each attachment's event tap.
    pub event_capacity: usize,
}

impl Default for LocalBusConfig {
    fn default() -> Self {
        Self {
            event_capacity: 256,
        }
    }
}

/// A name being advertised on the bus
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Advertisement {
    pub name: String,
    pub transport: TransportMask,
    pub owner: String,
}

/// A multipoint session
#[derive(Debug, Clone)]
pub(crate) struct Session {
    pub host: String,
    pub port: SessionPort,
    /// Unique names, host first.
    pub members: Vec<String>,
}

impl Session {
    pub fn contains(&self, unique_name: &str) -> bool {
        self.members.iter().any(|m| m == unique_name)
    }
}

/// Router state guarded by the bus lock
#[derive(Default)]
pub(crate) struct Router {
    pub next_serial: u32,
    pub connections: HashMap<String, Weak<Shared>>,
    pub owners: HashMap<String, String>,
    pub advertisements: Vec<Advertisement>,
    pub sessions: HashMap<SessionId, Session>,
}

impl Router {
    /// Resolve a well-known or unique name to a unique name
    pub fn resolve(&self, name: &str) -> Option<String> {
        if self.is_live(name) {
            return Some(name.to_string());
        }
        self.owners.get(name).filter(|owner| self.is_live(owner)).cloned()
    }

    /// Whether the attachment behind `unique_name` still exists
    pub fn is_live(&self, unique_name: &str) -> bool {
        self.connections
            .get(unique_name)
            .is_some_and(|weak| weak.strong_count() > 0)
    }

    /// Live connection for a unique name
    pub fn connection(&self, unique_name: &str) -> Option<Arc<Shared>> {
        self.connections.get(unique_name).and_then(Weak::upgrade)
    }

    /// Every live connection except `exclude`
    pub fn peers(&self, exclude: Option<&str>) -> Vec<Arc<Shared>> {
        self.connections
            .iter()
            .filter(|(name, _)| Some(name.as_str()) != exclude)
            .filter_map(|(_, weak)| weak.upgrade())
            .collect()
    }

    /// Session hosted by `host` on `port`
    pub fn session_for(&self, host: &str, port: SessionPort) -> Option<SessionId> {
        self.sessions
            .iter()
            .find(|(_, s)| s.host == host && s.port == port)
            .map(|(id, _)| *id)
    }

    /// Allocate an unused, non-zero session id
    pub fn allocate_session_id(&self) -> SessionId {
        loop {
            let id = Uuid::new_v4().as_u128() as u32;
            if id != 0 && !self.sessions.contains_key(&id) {
                return id;
            }
        }
    }
}

/// Handle to an in-process bus
#[derive(Clone)]
pub struct LocalBus {
    pub(crate) router: Arc<RwLock<Router>>,
    guid: String,
    config: LocalBusConfig,
}

impl LocalBus {
    /// Create a new bus with default configuration
    pub fn new() -> Self {
        Self::with_config(LocalBusConfig::default())
    }

    /// Create a new bus with custom configuration
    pub fn with_config(config: LocalBusConfig) -> Self {
        let guid = Uuid::new_v4().simple().to_string()[..8].to_string();
        Self {
            router: Arc::new(RwLock::new(Router::default())),
            guid,
            config,
        }
    }

    /// Short identifier of this bus, used as the unique name prefix
    pub fn guid(&self) -> &str {
        &self.guid
    }

    /// Get the current configuration
    pub fn config(&self) -> &LocalBusConfig {
        &self.config
    }

    /// Number of connected attachments
    pub fn connection_count(&self) -> usize {
        self.router
            .read()
            .connections
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    /// Unique name of the current owner of `name`
    pub fn name_owner(&self, name: &str) -> Option<String> {
        let router = self.router.read();
        router
            .owners
            .get(name)
            .filter(|owner| router.is_live(owner))
            .cloned()
    }

    /// Names currently advertised, with their transports
    pub fn advertised_names(&self) -> Vec<(String, TransportMask)> {
        let router = self.router.read();
        router
            .advertisements
            .iter()
            .filter(|ad| router.is_live(&ad.owner))
            .map(|ad| (ad.name.clone(), ad.transport))
            .collect()
    }

    /// Members of a session, host first
    pub fn session_members(&self, id: SessionId) -> Option<Vec<String>> {
        self.router.read().sessions.get(&id).map(|s| s.members.clone())
    }

    /// Remove what dropped attachments left behind and tell their peers
    ///
    /// Attachment operations that look up names or sessions do this on
    /// their own. Returns the number of connections removed.
    pub fn prune_dropped(&self) -> usize {
        crate::attachment::prune_dropped(self)
    }

    pub(crate) fn next_unique_name(&self) -> String {
        let mut router = self.router.write();
        router.next_serial += 1;
        format!(":{}.{}", self.guid, router.next_serial)
    }
}

impl Default for LocalBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for LocalBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalBus")
            .field("guid", &self.guid)
            .field("connections", &self.connection_count())
            .field("config", &self.config)
            .finish()
    }
}
