//! Shared listener doubles for local bus tests

#![allow(dead_code)]

use ajsignal_bus::{LocalAttachment, LocalBus};
use ajsignal_core::{
    BusListener, Message, SessionId, SessionListener, SessionPort, SessionPortListener,
    SignalHandler, TransportMask,
};
use parking_lot::Mutex;
use std::sync::Arc;

/// Records every callback it receives as a short line
#[derive(Default)]
pub struct Recorder {
    lines: Mutex<Vec<String>>,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn push(&self, line: String) {
        self.lines.lock().push(line);
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.lines.lock())
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.lines
            .lock()
            .iter()
            .filter(|line| line.starts_with(prefix))
            .count()
    }
}

impl BusListener for Recorder {
    fn listener_registered(&self) {
        self.push("registered".to_string());
    }

    fn listener_unregistered(&self) {
        self.push("unregistered".to_string());
    }

    fn found_advertised_name(&self, name: &str, transport: TransportMask, prefix: &str) {
        self.push(format!("found {} {} {}", name, transport, prefix));
    }

    fn lost_advertised_name(&self, name: &str, transport: TransportMask, prefix: &str) {
        self.push(format!("lost {} {} {}", name, transport, prefix));
    }

    fn name_owner_changed(&self, name: &str, previous: Option<&str>, new: Option<&str>) {
        self.push(format!(
            "owner {} {} {}",
            name,
            previous.unwrap_or("-"),
            new.unwrap_or("-")
        ));
    }

    fn bus_stopping(&self) {
        self.push("stopping".to_string());
    }

    fn bus_disconnected(&self) {
        self.push("disconnected".to_string());
    }
}

impl SessionListener for Recorder {
    fn session_lost(&self, session_id: SessionId) {
        self.push(format!("session_lost {}", session_id));
    }

    fn session_member_added(&self, session_id: SessionId, unique_name: &str) {
        self.push(format!("member_added {} {}", session_id, unique_name));
    }

    fn session_member_removed(&self, session_id: SessionId, unique_name: &str) {
        self.push(format!("member_removed {} {}", session_id, unique_name));
    }
}

impl SignalHandler for Recorder {
    fn signal_received(&self, member: &str, source_path: &str, message: &Message) {
        let arg = message.arg(0).and_then(|a| a.as_str()).unwrap_or("");
        self.push(format!("signal {} {} {}", member, source_path, arg));
    }
}

/// Session port listener that accepts or rejects every joiner
pub struct PortGate {
    accept: bool,
    pub joined: Mutex<Vec<(SessionPort, SessionId, String)>>,
}

impl PortGate {
    pub fn accepting() -> Arc<Self> {
        Arc::new(Self {
            accept: true,
            joined: Mutex::new(Vec::new()),
        })
    }

    pub fn rejecting() -> Arc<Self> {
        Arc::new(Self {
            accept: false,
            joined: Mutex::new(Vec::new()),
        })
    }
}

impl SessionPortListener for PortGate {
    fn accept_session_joiner(&self, _port: SessionPort, _joiner: &str) -> bool {
        self.accept
    }

    fn session_joined(&self, port: SessionPort, session_id: SessionId, joiner: &str) {
        self.joined.lock().push((port, session_id, joiner.to_string()));
    }
}

/// Create and connect an attachment
pub fn connected(bus: &LocalBus, name: &str) -> LocalAttachment {
    let att = LocalAttachment::new(bus, name);
    att.connect("null:").unwrap();
    att
}
