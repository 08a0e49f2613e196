//! # AJSignal Bus
//!
//! In-process bus for the `null:` transport.
//! Attachments created on one `LocalBus` can own and advertise names,
//! discover each other, join multipoint sessions, exchange signals, and
//! build proxies for each other's bus objects.

pub mod attachment;
pub mod bus;

pub use attachment::LocalAttachment;
pub use bus::{LocalBus, LocalBusConfig, NULL_TRANSPORT_SPEC};
