//! Value types shared across the workspace.

pub mod msg_arg;
pub mod transport;

pub use msg_arg::{signature_of, Message, MsgArg};
pub use transport::{SessionId, SessionPort, TransportMask};
