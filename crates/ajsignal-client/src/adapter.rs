//! Bus event adapter for the signal consumer
//!
//! `SignalConsumer::attach` registers one signal receiver for `nameChanged`
//! and one bus listener, and builds the session listener that is handed to
//! every join request. All three only print output lines or fire triggers
//! on `ClientActions`; everything else is left to the bus.

use std::sync::Arc;

use ajsignal_core::{
    BusAttachment, BusListener, ClientConfig, HandlerId, InterfaceError, ListenerId, Message,
    Result, SessionId, SessionListener, SignalHandler, TransportMask,
};

use crate::actions::{ClientActions, JoinSessionRequest};
use crate::output::OutputSink;

/// Signal member the consumer listens for
pub const NAME_CHANGED_SIGNAL: &str = "nameChanged";

/// Line printed ahead of each received signal
pub const SIGNAL_SEPARATOR: &str =
    "//////////////////////////////////////////////////////////////////";

/// Line printed once the signal receiver is registered
pub const REGISTERED_LINE: &str = "Signal Handler and event have been registered.";

/// Prints every `nameChanged` signal
pub struct NameChangedReceiver {
    well_known_name: String,
    output: Arc<dyn OutputSink>,
}

impl NameChangedReceiver {
    pub fn new(well_known_name: impl Into<String>, output: Arc<dyn OutputSink>) -> Self {
        Self {
            well_known_name: well_known_name.into(),
            output,
        }
    }
}

impl SignalHandler for NameChangedReceiver {
    fn signal_received(&self, member: &str, source_path: &str, message: &Message) {
        let new_name = message.arg(0).and_then(|arg| arg.as_str()).unwrap_or("");
        tracing::debug!("{} from {} on {}", member, message.sender, source_path);

        self.output.output_line(SIGNAL_SEPARATOR);
        self.output.output_line(&format!(
            "'Name Changed' signal received from path: {}{} with new name '{}'.",
            self.well_known_name, source_path, new_name
        ));
    }
}

/// Session listener attached to the joined session
pub struct ConsumerSessionListener {
    actions: Arc<dyn ClientActions>,
}

impl ConsumerSessionListener {
    pub fn new(actions: Arc<dyn ClientActions>) -> Self {
        Self { actions }
    }
}

impl SessionListener for ConsumerSessionListener {
    fn session_member_added(&self, session_id: SessionId, unique_name: &str) {
        tracing::debug!("Member {} added to session {}", unique_name, session_id);
        self.actions.proxy_remote_connect(session_id, unique_name);
    }
}

/// Bus listener that joins the session of every discovered service
pub struct ConsumerBusListener {
    config: ClientConfig,
    actions: Arc<dyn ClientActions>,
    output: Arc<dyn OutputSink>,
    session_listener: Arc<ConsumerSessionListener>,
}

impl ConsumerBusListener {
    pub fn new(
        config: ClientConfig,
        actions: Arc<dyn ClientActions>,
        output: Arc<dyn OutputSink>,
        session_listener: Arc<ConsumerSessionListener>,
    ) -> Self {
        Self {
            config,
            actions,
            output,
            session_listener,
        }
    }
}

impl BusListener for ConsumerBusListener {
    fn found_advertised_name(&self, name: &str, transport: TransportMask, prefix: &str) {
        self.output.output_line(&format!(
            "Found Advertised well-known name (name={}\ttransport={}\tprefix={})",
            name, transport, prefix
        ));

        self.actions.join_session(JoinSessionRequest {
            name: name.to_string(),
            transport,
            prefix: prefix.to_string(),
            session_port: self.config.session_port,
            listener: self.session_listener.clone(),
        });
    }

    fn lost_advertised_name(&self, name: &str, _transport: TransportMask, _prefix: &str) {
        tracing::debug!("Lost advertised name {}", name);
    }

    fn bus_disconnected(&self) {
        tracing::debug!("Bus disconnected");
    }
}

/// The signal consumer's registrations on a bus attachment
pub struct SignalConsumer {
    bus_listener: Arc<ConsumerBusListener>,
    session_listener: Arc<ConsumerSessionListener>,
    receiver: Arc<NameChangedReceiver>,
    handler_id: HandlerId,
    listener_id: ListenerId,
}

impl SignalConsumer {
    /// Register the consumer's receiver and bus listener on `bus`
    ///
    /// The interface named by `config.interface_name` must already be known to
    /// the attachment and declare the `nameChanged` signal. Registrations
    /// stay in place until `detach` is called; dropping the consumer leaves
    /// them registered.
    pub fn attach(
        bus: &dyn BusAttachment,
        config: &ClientConfig,
        actions: Arc<dyn ClientActions>,
        output: Arc<dyn OutputSink>,
    ) -> Result<Self> {
        let iface = bus
            .interface(&config.interface_name)
            .ok_or_else(|| InterfaceError::NotFound {
                name: config.interface_name.clone(),
            })?;
        let member = iface
            .signal(NAME_CHANGED_SIGNAL)
            .ok_or_else(|| InterfaceError::SignalNotFound {
                interface: config.interface_name.clone(),
                member: NAME_CHANGED_SIGNAL.to_string(),
            })?;

        let receiver = Arc::new(NameChangedReceiver::new(
            config.well_known_name.clone(),
            output.clone(),
        ));
        let handler_id = bus.register_signal_handler(receiver.clone(), member, "")?;
        output.output_line(REGISTERED_LINE);

        let session_listener = Arc::new(ConsumerSessionListener::new(actions.clone()));
        let bus_listener = Arc::new(ConsumerBusListener::new(
            config.clone(),
            actions,
            output,
            session_listener.clone(),
        ));
        let listener_id = bus.register_bus_listener(bus_listener.clone())?;

        tracing::info!(
            "Signal consumer attached for {} ({}, {})",
            config.interface_name,
            handler_id,
            listener_id
        );
        Ok(Self {
            bus_listener,
            session_listener,
            receiver,
            handler_id,
            listener_id,
        })
    }

    /// Remove both registrations from `bus`
    pub fn detach(self, bus: &dyn BusAttachment) -> Result<()> {
        bus.unregister_signal_handler(self.handler_id)?;
        bus.unregister_bus_listener(self.listener_id)?;
        tracing::info!("Signal consumer detached");
        Ok(())
    }

    pub fn handler_id(&self) -> HandlerId {
        self.handler_id
    }

    pub fn listener_id(&self) -> ListenerId {
        self.listener_id
    }

    /// Session listener handed to join requests
    pub fn session_listener(&self) -> Arc<dyn SessionListener> {
        self.session_listener.clone()
    }

    pub fn bus_listener(&self) -> Arc<dyn BusListener> {
        self.bus_listener.clone()
    }

    pub fn receiver(&self) -> Arc<dyn SignalHandler> {
        self.receiver.clone()
    }
}

impl std::fmt::Debug for SignalConsumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalConsumer")
            .field("handler_id", &self.handler_id)
            .field("listener_id", &self.listener_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::BufferedOutput;
    use ajsignal_core::MsgArg;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Triggers {
        joins: Mutex<Vec<(String, u16)>>,
        proxies: Mutex<Vec<(SessionId, String)>>,
    }

    impl ClientActions for Triggers {
        fn join_session(&self, request: JoinSessionRequest) {
            self.joins.lock().push((request.name, request.session_port));
        }

        fn proxy_remote_connect(&self, session_id: SessionId, member: &str) {
            self.proxies.lock().push((session_id, member.to_string()));
        }
    }

    #[test]
    fn test_receiver_formats_new_name() {
        let out = Arc::new(BufferedOutput::new());
        let receiver = NameChangedReceiver::new("org.alljoyn.Bus.signal_sample", out.clone());
        let message = Message::new(
            ":svc.1",
            "/",
            "org.alljoyn.Bus.signal_sample",
            "nameChanged",
            vec![MsgArg::from("Bob")],
        );
        receiver.signal_received("nameChanged", "/", &message);

        assert_eq!(
            out.lines(),
            vec![
                SIGNAL_SEPARATOR.to_string(),
                "'Name Changed' signal received from path: org.alljoyn.Bus.signal_sample/ with new name 'Bob'.".to_string(),
            ]
        );
    }

    #[test]
    fn test_receiver_non_string_argument_prints_empty_name() {
        let out = Arc::new(BufferedOutput::new());
        let receiver = NameChangedReceiver::new("org.example.Svc", out.clone());
        let message = Message::new(
            ":svc.1",
            "/",
            "org.example.Svc",
            "nameChanged",
            vec![MsgArg::Int32(5)],
        );
        receiver.signal_received("nameChanged", "/", &message);

        assert_eq!(out.len(), 2);
        assert!(out.lines()[1].ends_with("with new name ''."));
    }

    #[test]
    fn test_bus_listener_carries_session_port() {
        let triggers = Arc::new(Triggers::default());
        let out = Arc::new(BufferedOutput::new());
        let config = ClientConfig {
            session_port: 42,
            ..Default::default()
        };
        let session = Arc::new(ConsumerSessionListener::new(triggers.clone()));
        let listener = ConsumerBusListener::new(config, triggers.clone(), out.clone(), session);

        listener.found_advertised_name("org.example.Svc", TransportMask::LOCAL, "org.example");
        assert_eq!(
            out.lines(),
            vec!["Found Advertised well-known name (name=org.example.Svc\ttransport=1\tprefix=org.example)"]
        );
        assert_eq!(*triggers.joins.lock(), vec![("org.example.Svc".to_string(), 42)]);
    }

    #[test]
    fn test_session_listener_triggers_proxy() {
        let triggers = Arc::new(Triggers::default());
        let session = ConsumerSessionListener::new(triggers.clone());
        session.session_member_added(9, ":svc.1");
        session.session_member_removed(9, ":svc.1");
        session.session_lost(9);
        assert_eq!(*triggers.proxies.lock(), vec![(9, ":svc.1".to_string())]);
    }
}
