//! # AJSignal
//!
//! A signal consumer client for an AllJoyn-style message bus:
//! - Discovers a service advertising a well-known name
//! - Joins the service's session and connects a proxy to its object
//! - Prints every `nameChanged` signal the service emits
//!
//! ## Architecture
//!
//! AJSignal is organized as a workspace with multiple crates:
//!
//! 1. **ajsignal-core** - Errors, listener traits, event records, interfaces, config
//! 2. **ajsignal-bus** - In-process bus implementing the `null:` transport
//! 3. **ajsignal-client** - Signal consumer adapter and session worker
//! 4. **ajsignal** - Demo service and the binary that wires everything together

pub mod demo;

pub use ajsignal_bus::{LocalAttachment, LocalBus, LocalBusConfig, NULL_TRANSPORT_SPEC};

pub use ajsignal_client::{
    BufferedOutput, ChannelActions, ClientActions, ClientWorker, JoinSessionRequest,
    OutputSink, SignalConsumer, TracingOutput, WorkerState,
};

pub use ajsignal_core::{
    BusAttachment, BusError, BusListener, ClientConfig, Error, EventKind, EventRecord,
    InterfaceDescription, Member, Message, MsgArg, Result, SessionId, SessionListener,
    SessionPort, SignalHandler, TransportMask,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Environment variable naming the client config file
pub const CONFIG_ENV: &str = "AJSIGNAL_CONFIG";

/// Initialize logging with the default configuration
///
/// Sets up structured logging with:
/// - Console output with pretty formatting
/// - RUST_LOG environment variable support, `info` when unset
pub fn init_logging() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_line_number(true)
        .pretty();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}
