//! Worker that carries out client triggers
//!
//! Bus callbacks must not call back into the attachment, so
//! `ChannelActions` only queues a `ClientCommand`. `ClientWorker` drains the
//! queue on a tokio task and performs the join and proxy calls.

use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Notify};

use ajsignal_core::{BusAttachment, BusError, ClientConfig, Error, ProxyBusObject, SessionId};

use crate::actions::{ClientActions, JoinSessionRequest};

/// Work queued for the client worker
#[derive(Debug)]
pub enum ClientCommand {
    /// Join the session of a discovered service
    JoinSession(JoinSessionRequest),
    /// Build the proxy for the remote object
    ProxyConnect {
        session_id: SessionId,
        member: String,
    },
}

/// `ClientActions` that forward to a `ClientWorker`
#[derive(Debug, Clone)]
pub struct ChannelActions {
    tx: mpsc::UnboundedSender<ClientCommand>,
}

impl ChannelActions {
    fn send(&self, command: ClientCommand) {
        if self.tx.send(command).is_err() {
            tracing::warn!("Client worker has stopped, trigger dropped");
        }
    }
}

impl ClientActions for ChannelActions {
    fn join_session(&self, request: JoinSessionRequest) {
        self.send(ClientCommand::JoinSession(request));
    }

    fn proxy_remote_connect(&self, session_id: SessionId, member: &str) {
        self.send(ClientCommand::ProxyConnect {
            session_id,
            member: member.to_string(),
        });
    }
}

/// State published by the worker
pub struct WorkerState {
    session: RwLock<Option<(String, SessionId)>>,
    proxy: RwLock<Option<ProxyBusObject>>,
    proxy_ready: Notify,
    shutdown: watch::Sender<bool>,
}

impl WorkerState {
    fn new() -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            session: RwLock::new(None),
            proxy: RwLock::new(None),
            proxy_ready: Notify::new(),
            shutdown,
        }
    }

    /// Id of the joined session
    pub fn session_id(&self) -> Option<SessionId> {
        self.session.read().as_ref().map(|(_, id)| *id)
    }

    /// Name the session was joined through
    pub fn session_host(&self) -> Option<String> {
        self.session.read().as_ref().map(|(host, _)| host.clone())
    }

    /// Proxy for the remote object, once connected
    pub fn proxy(&self) -> Option<ProxyBusObject> {
        self.proxy.read().clone()
    }

    /// Wait until the proxy is connected
    pub async fn wait_for_proxy(&self) -> ProxyBusObject {
        loop {
            let notified = self.proxy_ready.notified();
            if let Some(proxy) = self.proxy() {
                return proxy;
            }
            notified.await;
        }
    }

    /// Drop session `session_id` and its proxy, if held
    fn forget_session(&self, session_id: SessionId) {
        {
            let mut session = self.session.write();
            if session.as_ref().is_some_and(|(_, id)| *id == session_id) {
                *session = None;
            }
        }
        let mut proxy = self.proxy.write();
        if proxy.as_ref().is_some_and(|p| p.session_id == session_id) {
            *proxy = None;
        }
    }

    /// Drop a proxy that talks over a session other than `session_id`
    fn forget_proxy_unless(&self, session_id: SessionId) {
        let mut proxy = self.proxy.write();
        if proxy.as_ref().is_some_and(|p| p.session_id != session_id) {
            *proxy = None;
        }
    }

    /// Ask the worker to stop
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    pub fn is_shutdown(&self) -> bool {
        *self.shutdown.borrow()
    }
}

impl std::fmt::Debug for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerState")
            .field("session", &*self.session.read())
            .field("proxy", &self.proxy.read().as_ref().map(|p| p.path.clone()))
            .finish()
    }
}

/// Executes join and proxy triggers against a bus attachment
pub struct ClientWorker<A: BusAttachment + 'static> {
    attachment: Arc<A>,
    config: ClientConfig,
    commands: mpsc::UnboundedReceiver<ClientCommand>,
    state: Arc<WorkerState>,
}

impl<A: BusAttachment + 'static> ClientWorker<A> {
    /// Create a worker and the actions that feed it
    pub fn new(attachment: Arc<A>, config: ClientConfig) -> (Self, ChannelActions) {
        let (tx, commands) = mpsc::unbounded_channel();
        let worker = Self {
            attachment,
            config,
            commands,
            state: Arc::new(WorkerState::new()),
        };
        (worker, ChannelActions { tx })
    }

    /// Shared state, usable after the worker has been moved into a task
    pub fn state(&self) -> Arc<WorkerState> {
        self.state.clone()
    }

    /// Process commands until shutdown or until every sender is gone
    pub async fn run(mut self) {
        let mut shutdown = self.state.shutdown.subscribe();
        if *shutdown.borrow() {
            return;
        }
        tracing::info!("Client worker started");

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => self.handle(command),
                    None => break,
                },
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!("Client worker stopped");
    }

    fn handle(&self, command: ClientCommand) {
        match command {
            ClientCommand::JoinSession(request) => self.join_session(request),
            ClientCommand::ProxyConnect { session_id, member } => {
                self.proxy_connect(session_id, &member)
            }
        }
    }

    /// Join through the attachment, which hands back the session already
    /// held when this connection is a member
    fn join_session(&self, request: JoinSessionRequest) {
        let session_id = match self.attachment.join_session(
            &request.name,
            request.session_port,
            Some(request.listener),
        ) {
            Ok(session_id) => session_id,
            Err(e) => {
                tracing::warn!("Failed to join session with {}: {}", request.name, e);
                return;
            }
        };

        if self.state.session_id() == Some(session_id) {
            tracing::debug!("Already in session {} with {}", session_id, request.name);
            return;
        }
        tracing::info!(
            "Joined session {} with {} on port {}",
            session_id,
            request.name,
            request.session_port
        );
        *self.state.session.write() = Some((request.name, session_id));
        self.state.forget_proxy_unless(session_id);
    }

    fn proxy_connect(&self, session_id: SessionId, member: &str) {
        if self
            .state
            .proxy
            .read()
            .as_ref()
            .is_some_and(|p| p.session_id == session_id)
        {
            tracing::debug!("Proxy already connected, ignoring member {}", member);
            return;
        }

        match self.attachment.create_proxy(
            &self.config.well_known_name,
            &self.config.object_path,
            session_id,
        ) {
            Ok(proxy) => {
                tracing::info!(
                    "Proxy connected to {}{} over session {}",
                    proxy.service_name,
                    proxy.path,
                    session_id
                );
                *self.state.proxy.write() = Some(proxy);
                self.state.proxy_ready.notify_waiters();
            }
            Err(Error::Bus(BusError::NoSuchSession { .. })) => {
                tracing::warn!("Session {} is gone, dropping it", session_id);
                self.state.forget_session(session_id);
            }
            Err(e) => {
                tracing::warn!("Failed to connect proxy over session {}: {}", session_id, e);
            }
        }
    }
}
