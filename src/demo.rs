//! Sample signal service
//!
//! Plays the remote side of the consumer on the same `LocalBus`: it owns and
//! advertises the well-known name, accepts sessions on the configured port,
//! and emits `nameChanged` over each joined session.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use ajsignal_bus::{LocalAttachment, LocalBus};
use ajsignal_client::NAME_CHANGED_SIGNAL;
use ajsignal_core::{
    ClientConfig, Error, InterfaceDescription, Member, MsgArg, Result, SessionId, SessionPort,
    SessionPortListener, TransportMask,
};

/// Application name of the sample service
pub const SERVICE_APPLICATION_NAME: &str = "signalService";

/// Names the demo emits, in order
pub const DEMO_NAMES: &[&str] = &["Alice", "Bob", "Carol"];

/// Define the sample interface on `attachment`
///
/// The interface declares a single `nameChanged(s newName)` signal.
pub fn define_sample_interface(
    attachment: &LocalAttachment,
    config: &ClientConfig,
) -> Result<Arc<InterfaceDescription>> {
    let mut iface = attachment.create_interface(&config.interface_name)?;
    iface.add_signal(NAME_CHANGED_SIGNAL, "s", "newName")?;
    attachment.add_interface(iface)
}

/// A session joined on the service's port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinNotice {
    pub session_id: SessionId,
    pub joiner: String,
}

struct JoinForwarder {
    tx: mpsc::UnboundedSender<JoinNotice>,
}

impl SessionPortListener for JoinForwarder {
    fn accept_session_joiner(&self, port: SessionPort, joiner: &str) -> bool {
        tracing::debug!("Accepting {} on port {}", joiner, port);
        true
    }

    fn session_joined(&self, port: SessionPort, session_id: SessionId, joiner: &str) {
        tracing::info!("{} joined session {} on port {}", joiner, session_id, port);
        let _ = self.tx.send(JoinNotice {
            session_id,
            joiner: joiner.to_string(),
        });
    }
}

/// The service side of the demo
pub struct SignalService {
    attachment: LocalAttachment,
    member: Member,
    config: ClientConfig,
    joins: mpsc::UnboundedReceiver<JoinNotice>,
}

impl SignalService {
    /// Connect to `bus` and start advertising
    pub fn start(bus: &LocalBus, config: &ClientConfig) -> Result<Self> {
        let attachment = LocalAttachment::new(bus, SERVICE_APPLICATION_NAME);
        attachment.connect(&config.connect_spec)?;

        let iface = define_sample_interface(&attachment, config)?;
        let member = iface
            .signal(NAME_CHANGED_SIGNAL)
            .cloned()
            .ok_or_else(|| Error::other("sample interface lacks nameChanged"))?;
        attachment.register_bus_object(&config.object_path, vec![iface])?;

        let (tx, joins) = mpsc::unbounded_channel();
        attachment.bind_session_port(config.session_port, Arc::new(JoinForwarder { tx }))?;
        attachment.request_name(&config.well_known_name)?;
        attachment.advertise_name(&config.well_known_name, TransportMask::TCP)?;

        tracing::info!(
            "Service {} advertising on port {}",
            config.well_known_name,
            config.session_port
        );
        Ok(Self {
            attachment,
            member,
            config: config.clone(),
            joins,
        })
    }

    pub fn attachment(&self) -> &LocalAttachment {
        &self.attachment
    }

    /// Wait for the next session join
    pub async fn next_join(&mut self) -> Option<JoinNotice> {
        self.joins.recv().await
    }

    /// Emit one `nameChanged` signal over `session_id`
    pub fn emit_name(&self, session_id: SessionId, name: &str) -> Result<usize> {
        self.attachment.emit_signal(
            &self.member,
            &self.config.object_path,
            vec![MsgArg::from(name)],
            Some(session_id),
        )
    }

    /// Emit `names` over `session_id`, pausing `interval` between signals
    pub async fn emit_names(
        &self,
        session_id: SessionId,
        names: &[&str],
        interval: Duration,
    ) -> Result<usize> {
        let mut delivered = 0;
        for (i, name) in names.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(interval).await;
            }
            delivered += self.emit_name(session_id, name)?;
        }
        Ok(delivered)
    }

    /// Leave the bus
    pub fn stop(&self) -> Result<()> {
        self.attachment.stop()
    }
}
