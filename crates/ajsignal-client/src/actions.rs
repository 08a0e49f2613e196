//! Triggers the consumer issues in response to bus events

use std::sync::Arc;

use ajsignal_core::{SessionId, SessionListener, SessionPort, TransportMask};

/// A request to join the session of a discovered service
#[derive(Clone)]
pub struct JoinSessionRequest {
    /// Discovered well-known name.
    pub name: String,
    /// Transport the name was found on.
    pub transport: TransportMask,
    /// Discovery prefix that matched.
    pub prefix: String,
    /// Session port to join.
    pub session_port: SessionPort,
    /// Listener to attach to the joined session.
    pub listener: Arc<dyn SessionListener>,
}

impl std::fmt::Debug for JoinSessionRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JoinSessionRequest")
            .field("name", &self.name)
            .field("transport", &self.transport)
            .field("prefix", &self.prefix)
            .field("session_port", &self.session_port)
            .finish_non_exhaustive()
    }
}

/// Application actions triggered from bus callbacks
///
/// Both calls must return promptly. They run on the thread delivering the
/// callback and must not call back into the bus attachment directly.
pub trait ClientActions: Send + Sync {
    /// Join the session offered by a discovered service
    fn join_session(&self, request: JoinSessionRequest);

    /// Connect a proxy to the remote object once `member` joined the session
    fn proxy_remote_connect(&self, session_id: SessionId, member: &str);
}
