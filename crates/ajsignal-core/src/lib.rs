//! # AJSignal Core
//!
//! Core types, traits, and utilities for AJSignal.
//! Provides the listener interfaces a bus delivers events through, the
//! positional event records behind them, interface descriptions, the bus
//! attachment contract, and client configuration.

pub mod config;
pub mod core;
pub mod error;
pub mod interface;
pub mod names;
pub mod types;

pub use crate::core::{
    attachment::{BusAttachment, HandlerId, ListenerId, ProxyBusObject},
    event::{
        dispatch_bus_event, dispatch_session_event, dispatch_signal, EventArg, EventCategory,
        EventKind, EventRecord,
    },
    listener::{BusListener, SessionListener, SessionPortListener, SignalHandler},
};

pub use config::ClientConfig;

pub use error::{BusError, ConfigError, Error, EventError, InterfaceError, Result};

pub use interface::{InterfaceDescription, Member, MemberType};

pub use types::{signature_of, Message, MsgArg, SessionId, SessionPort, TransportMask};
