//! Error handling for AJSignal
//!
//! Provides error types for every layer of the client:
//! - Bus errors (attachment lifecycle, names, sessions, objects)
//! - Interface errors (description lookup and construction)
//! - Event errors (decoding positional event records)
//! - Config errors (loading, saving and validating client configuration)
//!
//! All error types use `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Bus error type
///
/// Represents failures reported by a bus attachment: connection state,
/// listener registration, name ownership, and session management.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BusError {
    /// Attachment is not connected to a bus
    #[error("Bus attachment not connected")]
    NotConnected,

    /// Attachment is already connected
    #[error("Bus attachment already connected as {unique_name}")]
    AlreadyConnected {
        /// The unique name assigned by the earlier connect.
        unique_name: String,
    },

    /// Connect spec names a transport this bus cannot provide
    #[error("Unsupported transport in connect spec '{spec}'")]
    UnsupportedTransport {
        /// The rejected connect spec.
        spec: String,
    },

    /// The same listener or handler object is already registered
    #[error("Already registered: {what}")]
    AlreadyRegistered {
        /// Description of the duplicate registration.
        what: String,
    },

    /// No bus listener with this id is registered
    #[error("Bus listener {id} not registered")]
    ListenerNotFound {
        /// The listener id that was not found.
        id: String,
    },

    /// No signal handler with this id is registered
    #[error("Signal handler {id} not registered")]
    HandlerNotFound {
        /// The handler id that was not found.
        id: String,
    },

    /// A well-known name is owned by another connection
    #[error("Name {name} is owned by {owner}")]
    NameTaken {
        /// The requested name.
        name: String,
        /// Unique name of the current owner.
        owner: String,
    },

    /// A bus name or object path failed validation
    #[error("Invalid name '{name}': {reason}")]
    InvalidName {
        /// The offending name.
        name: String,
        /// Why the name was rejected.
        reason: String,
    },

    /// No connection owns the requested host name
    #[error("No such host: {host}")]
    NoSuchHost {
        /// The host name that could not be resolved.
        host: String,
    },

    /// Host exists but has not bound the session port
    #[error("Host {host} has no session port {port}")]
    NoSuchPort {
        /// The host name.
        host: String,
        /// The requested session port.
        port: u16,
    },

    /// Session port already bound on this attachment
    #[error("Session port {port} already bound")]
    PortInUse {
        /// The session port.
        port: u16,
    },

    /// Host refused the joiner
    #[error("Join to {host}:{port} rejected")]
    JoinRejected {
        /// The host name.
        host: String,
        /// The requested session port.
        port: u16,
    },

    /// Session does not exist or does not include the caller
    #[error("No such session: {session_id}")]
    NoSuchSession {
        /// The session id.
        session_id: u32,
    },

    /// Remote service has no bus object at the path
    #[error("No bus object at {path} on {service}")]
    NoSuchObject {
        /// The remote service name.
        service: String,
        /// The object path.
        path: String,
    },

    /// Bus object already registered at the path
    #[error("Bus object already registered at {path}")]
    ObjectExists {
        /// The object path.
        path: String,
    },

    /// Generic bus error
    #[error("Bus error: {message}")]
    Other {
        /// The error message.
        message: String,
    },
}

/// Interface error type
///
/// Represents errors related to interface descriptions and their members.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InterfaceError {
    /// Interface is not known to the attachment
    #[error("Interface {name} not found")]
    NotFound {
        /// The interface name.
        name: String,
    },

    /// Interface has no signal member with that name
    #[error("Signal {member} not found on interface {interface}")]
    SignalNotFound {
        /// The interface name.
        interface: String,
        /// The signal member name.
        member: String,
    },

    /// An interface with that name already exists on the attachment
    #[error("Interface {name} already exists")]
    AlreadyExists {
        /// The interface name.
        name: String,
    },

    /// Member name already used on the interface
    #[error("Member {member} already exists on interface {interface}")]
    DuplicateMember {
        /// The interface name.
        interface: String,
        /// The member name.
        member: String,
    },

    /// Interface was activated and can no longer be modified
    #[error("Interface {name} is activated")]
    Activated {
        /// The interface name.
        name: String,
    },

    /// Interface or member name failed validation
    #[error("Invalid interface name '{name}': {reason}")]
    InvalidName {
        /// The offending name.
        name: String,
        /// Why the name was rejected.
        reason: String,
    },

    /// Arguments do not match the member signature
    #[error("Signature mismatch for {member}: expected '{expected}', got '{actual}'")]
    SignatureMismatch {
        /// The member name.
        member: String,
        /// The declared signature.
        expected: String,
        /// The signature of the supplied arguments.
        actual: String,
    },
}

/// Event error type
///
/// Represents failures decoding the positional arguments of an event record.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EventError {
    /// Wire name does not correspond to a known event
    #[error("Unknown event: {name}")]
    UnknownEvent {
        /// The unrecognized wire name.
        name: String,
    },

    /// Event record is shorter than the event requires
    #[error("{kind} is missing argument {index}")]
    MissingArg {
        /// Wire name of the event.
        kind: String,
        /// Position of the missing argument.
        index: usize,
    },

    /// Argument has the wrong type
    #[error("{kind} argument {index} is not {expected}")]
    WrongType {
        /// Wire name of the event.
        kind: String,
        /// Position of the argument.
        index: usize,
        /// The expected argument type, with its article.
        expected: &'static str,
    },

    /// Event was handed to a dispatcher for another listener type
    #[error("{kind} cannot be dispatched to this listener")]
    WrongListener {
        /// Wire name of the event.
        kind: String,
    },
}

/// Config error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The configuration file format is not supported
    #[error("Unsupported config format: {0}")]
    UnsupportedFormat(String),

    /// A configuration value is invalid
    #[error("Invalid setting '{key}': {reason}")]
    Invalid {
        /// The configuration key.
        key: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// The configuration file could not be parsed
    #[error("Failed to parse config: {0}")]
    Parse(String),

    /// The configuration could not be serialized
    #[error("Failed to serialize config: {0}")]
    Serialize(String),
}

/// Main error type for AJSignal
///
/// A unified error type that can represent any error from all layers.
/// This is the primary error type used in public APIs.
#[derive(Error, Debug)]
pub enum Error {
    /// Bus error
    #[error(transparent)]
    Bus(#[from] BusError),

    /// Interface error
    #[error(transparent)]
    Interface(#[from] InterfaceError),

    /// Event decoding error
    #[error(transparent)]
    Event(#[from] EventError),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// Check if this is a bus error
    pub fn is_bus_error(&self) -> bool {
        matches!(self, Error::Bus(_))
    }

    /// Check if this is an interface error
    pub fn is_interface_error(&self) -> bool {
        matches!(self, Error::Interface(_))
    }

    /// Check if this is an event decoding error
    pub fn is_event_error(&self) -> bool {
        matches!(self, Error::Event(_))
    }

    /// Check if this is a configuration error
    pub fn is_config_error(&self) -> bool {
        matches!(self, Error::Config(_))
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_predicates() {
        let err: Error = BusError::NotConnected.into();
        assert!(err.is_bus_error());
        assert!(!err.is_interface_error());

        let err: Error = InterfaceError::NotFound {
            name: "org.example.Missing".to_string(),
        }
        .into();
        assert!(err.is_interface_error());
        assert_eq!(err.to_string(), "Interface org.example.Missing not found");
    }

    #[test]
    fn test_event_error_display() {
        let err = EventError::WrongType {
            kind: "foundadvertisedname".to_string(),
            index: 1,
            expected: "an integer",
        };
        assert_eq!(
            err.to_string(),
            "foundadvertisedname argument 1 is not an integer"
        );
    }
}
