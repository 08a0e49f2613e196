//! Bus, session, and signal listener interfaces
//!
//! Every method has an empty default body, so an implementation overrides
//! only the events it cares about.

use crate::types::{Message, SessionId, SessionPort, TransportMask};

/// Listener trait for bus-lifecycle events
///
/// Implement this trait and register it with a bus attachment to be told
/// about connection state and name discovery.
pub trait BusListener: Send + Sync {
    /// Called when the listener has been registered with an attachment
    fn listener_registered(&self) {}

    /// Called when the listener has been unregistered
    fn listener_unregistered(&self) {}

    /// Called when discovery finds a name matching a registered prefix
    fn found_advertised_name(&self, _name: &str, _transport: TransportMask, _name_prefix: &str) {}

    /// Called when a previously found name is no longer advertised
    fn lost_advertised_name(&self, _name: &str, _transport: TransportMask, _name_prefix: &str) {}

    /// Called when ownership of a well-known name changes
    fn name_owner_changed(
        &self,
        _bus_name: &str,
        _previous_owner: Option<&str>,
        _new_owner: Option<&str>,
    ) {
    }

    /// Called when the attachment is stopping
    fn bus_stopping(&self) {}

    /// Called when the attachment has been disconnected from the bus
    fn bus_disconnected(&self) {}
}

/// Listener trait for session events
pub trait SessionListener: Send + Sync {
    /// Called when a session has been torn down
    fn session_lost(&self, _session_id: SessionId) {}

    /// Called when a peer joins a multipoint session
    fn session_member_added(&self, _session_id: SessionId, _unique_name: &str) {}

    /// Called when a peer leaves a multipoint session
    fn session_member_removed(&self, _session_id: SessionId, _unique_name: &str) {}
}

/// Host-side listener for a bound session port
pub trait SessionPortListener: Send + Sync {
    /// Decide whether `joiner` may join on `port`
    fn accept_session_joiner(&self, _port: SessionPort, _joiner: &str) -> bool {
        true
    }

    /// Called once `joiner` has joined session `id`
    fn session_joined(&self, _port: SessionPort, _id: SessionId, _joiner: &str) {}
}

/// Receiver for a registered signal member
pub trait SignalHandler: Send + Sync {
    /// Called with the member name, the emitting object path, and the message
    fn signal_received(&self, member: &str, source_path: &str, message: &Message);
}
