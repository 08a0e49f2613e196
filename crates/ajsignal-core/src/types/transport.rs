//! Transport masks and session identifiers.

use serde::{Deserialize, Serialize};

/// Identifier of an established session
pub type SessionId = u32;

/// Port a host binds to accept sessions
pub type SessionPort = u16;

/// Bit mask of transports a name is advertised over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransportMask(pub u16);

impl TransportMask {
    /// No transport.
    pub const NONE: TransportMask = TransportMask(0x0000);
    /// In-process transport.
    pub const LOCAL: TransportMask = TransportMask(0x0001);
    /// TCP transport.
    pub const TCP: TransportMask = TransportMask(0x0004);
    /// UDP transport.
    pub const UDP: TransportMask = TransportMask(0x0100);
    /// Any IP transport.
    pub const IP: TransportMask = TransportMask(0x0004 | 0x0100);
    /// Any transport.
    pub const ANY: TransportMask = TransportMask(0xFFFF);

    /// Raw mask bits
    pub fn bits(self) -> u16 {
        self.0
    }

    /// Whether any bit of `other` is set in `self`
    pub fn intersects(self, other: TransportMask) -> bool {
        self.0 & other.0 != 0
    }
}

impl From<u16> for TransportMask {
    fn from(bits: u16) -> Self {
        TransportMask(bits)
    }
}

impl std::fmt::Display for TransportMask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
