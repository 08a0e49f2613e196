//! # AJSignal Client
//!
//! The signal consumer side of AJSignal.
//! `SignalConsumer` bridges bus callbacks to application actions: it prints
//! received `nameChanged` signals, asks for a session when the service name
//! is discovered, and asks for a proxy once the session has members.
//! `ClientWorker` carries those requests out against a bus attachment.

pub mod actions;
pub mod adapter;
pub mod output;
pub mod worker;

pub use actions::{ClientActions, JoinSessionRequest};
pub use adapter::{
    ConsumerBusListener, ConsumerSessionListener, NameChangedReceiver, SignalConsumer,
    NAME_CHANGED_SIGNAL, REGISTERED_LINE, SIGNAL_SEPARATOR,
};
pub use output::{BufferedOutput, OutputSink, TracingOutput, OUTPUT_TARGET};
pub use worker::{ChannelActions, ClientCommand, ClientWorker, WorkerState};
