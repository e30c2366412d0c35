//! Public service handle and builder
//!
//! [`PeerServiceBuilder`] collects configuration, identity, and handler
//! registrations; [`PeerService`] owns the channels into the connection task
//! and exposes the command surface (`start`, `stop`, sends) plus read-only
//! observation of connection state and roster.

use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::debug;

use truce_core::{
    AlertKind, ConnectionState, IdentityStore, Peer, PeerId, PeerIdentity, RelayConfig, RequestId,
    RequestKind, Vote,
};

use crate::connection::{Command, ConnectionTask};
use crate::error::ServiceError;
use crate::handlers::{AlertPayload, Handlers, RequestPayload, VotePayload};
use crate::session::{Session, SharedHandlers};

const COMMAND_CHANNEL_CAPACITY: usize = 64;

// ----------------------------------------------------------------------------
// Builder
// ----------------------------------------------------------------------------

/// Builder for [`PeerService`]: handlers are registered here, before the
/// session exists, so subscription is always explicit and race-free.
pub struct PeerServiceBuilder {
    config: RelayConfig,
    identity: Option<PeerIdentity>,
    handlers: Handlers,
}

impl PeerServiceBuilder {
    pub fn new(config: RelayConfig) -> Self {
        Self {
            config,
            identity: None,
            handlers: Handlers::default(),
        }
    }

    /// Use an explicit identity instead of the persistent per-user one
    pub fn identity(mut self, identity: PeerIdentity) -> Self {
        self.identity = Some(identity);
        self
    }

    pub fn on_surrender_request(
        mut self,
        handler: impl FnMut(RequestPayload, Peer) + Send + 'static,
    ) -> Self {
        self.handlers.on_surrender_request = Some(Box::new(handler));
        self
    }

    pub fn on_surrender_vote(
        mut self,
        handler: impl FnMut(VotePayload, Peer) + Send + 'static,
    ) -> Self {
        self.handlers.on_surrender_vote = Some(Box::new(handler));
        self
    }

    pub fn on_coffee_request(
        mut self,
        handler: impl FnMut(RequestPayload, Peer) + Send + 'static,
    ) -> Self {
        self.handlers.on_coffee_request = Some(Box::new(handler));
        self
    }

    pub fn on_coffee_vote(
        mut self,
        handler: impl FnMut(VotePayload, Peer) + Send + 'static,
    ) -> Self {
        self.handlers.on_coffee_vote = Some(Box::new(handler));
        self
    }

    pub fn on_fatigue_alert(
        mut self,
        handler: impl FnMut(AlertPayload, Peer) + Send + 'static,
    ) -> Self {
        self.handlers.on_fatigue_alert = Some(Box::new(handler));
        self
    }

    pub fn on_good_boy(
        mut self,
        handler: impl FnMut(AlertPayload, Peer) + Send + 'static,
    ) -> Self {
        self.handlers.on_good_boy = Some(Box::new(handler));
        self
    }

    /// Validate the configuration, resolve the identity, and build the
    /// service. The session does not connect until [`PeerService::start`].
    pub fn build(self) -> Result<PeerService, ServiceError> {
        self.config.validate()?;
        let identity = match self.identity {
            Some(identity) => identity,
            None => IdentityStore::default_location()?.load_or_create()?,
        };

        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let (peers_tx, peers_rx) = watch::channel(Vec::new());

        Ok(PeerService {
            config: self.config,
            identity,
            handlers: Arc::new(Mutex::new(self.handlers)),
            state_tx: Arc::new(state_tx),
            state_rx,
            peers_tx: Arc::new(peers_tx),
            peers_rx,
            running: Mutex::new(None),
        })
    }
}

// ----------------------------------------------------------------------------
// Service Handle
// ----------------------------------------------------------------------------

struct Running {
    commands: mpsc::Sender<Command>,
    task: JoinHandle<()>,
}

/// Handle to the relay session.
///
/// All sends are fire-and-forget and are silently dropped while the session
/// is not connected; request/alert sends return the generated correlation
/// token so the caller can match the eventual reply.
pub struct PeerService {
    config: RelayConfig,
    identity: PeerIdentity,
    handlers: SharedHandlers,
    state_tx: Arc<watch::Sender<ConnectionState>>,
    state_rx: watch::Receiver<ConnectionState>,
    peers_tx: Arc<watch::Sender<Vec<Peer>>>,
    peers_rx: watch::Receiver<Vec<Peer>>,
    running: Mutex<Option<Running>>,
}

impl PeerService {
    /// Builder entry point
    pub fn builder(config: RelayConfig) -> PeerServiceBuilder {
        PeerServiceBuilder::new(config)
    }

    /// Spawn the connection task. Must be called within a tokio runtime.
    /// Calling `start` while the session is already running is a no-op.
    pub fn start(&self) {
        let mut running = self.running.lock().expect("service mutex poisoned");
        if let Some(current) = running.as_ref() {
            if !current.task.is_finished() {
                debug!("start() ignored, session already running");
                return;
            }
        }

        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let session = Session::new(
            self.identity.peer_id.clone(),
            self.config.trust.clone(),
            Arc::clone(&self.peers_tx),
            Arc::clone(&self.handlers),
        );
        let task = ConnectionTask::new(
            self.config.clone(),
            self.identity.clone(),
            session,
            commands_rx,
            Arc::clone(&self.state_tx),
        );
        *running = Some(Running {
            commands: commands_tx,
            task: tokio::spawn(task.run()),
        });
    }

    /// Stop the session: cancels the heartbeat and any pending reconnect,
    /// closes the transport, and forces `Disconnected`. Idempotent.
    pub fn stop(&self) {
        let mut running = self.running.lock().expect("service mutex poisoned");
        if let Some(current) = running.take() {
            if current.commands.try_send(Command::Stop).is_err() {
                // Task already gone or its queue is full of stale sends;
                // closing the channel also signals shutdown.
                drop(current.commands);
            }
        }
    }

    /// Send a surrender/coffee request to a peer. Returns the correlation
    /// token the recipient's vote will carry.
    pub fn send_request(
        &self,
        kind: RequestKind,
        target: &Peer,
        duration: f64,
        title: Option<String>,
    ) -> RequestId {
        let request_id = RequestId::generate();
        self.send_command(Command::SendRequest {
            kind,
            target: target.peer_id.clone(),
            duration,
            title,
            request_id: request_id.clone(),
        });
        request_id
    }

    /// Answer a previously received request, echoing its correlation token
    pub fn send_vote(
        &self,
        kind: RequestKind,
        target: &Peer,
        vote: Vote,
        request_id: Option<RequestId>,
    ) {
        self.send_command(Command::SendVote {
            kind,
            target: target.peer_id.clone(),
            vote,
            request_id,
        });
    }

    /// Send a one-shot alert to a peer
    pub fn send_alert(&self, kind: AlertKind, target: &Peer) -> RequestId {
        let request_id = RequestId::generate();
        self.send_command(Command::SendAlert {
            kind,
            target: target.peer_id.clone(),
            request_id: request_id.clone(),
        });
        request_id
    }

    fn send_command(&self, command: Command) {
        let running = self.running.lock().expect("service mutex poisoned");
        match running.as_ref() {
            Some(current) => {
                if current.commands.try_send(command).is_err() {
                    debug!("dropping send, session task unavailable");
                }
            }
            None => debug!("dropping send, session not started"),
        }
    }

    // ------------------------------------------------------------------
    // Observation
    // ------------------------------------------------------------------

    /// The local installation's identity
    pub fn local_identity(&self) -> &PeerIdentity {
        &self.identity
    }

    /// The local peer id
    pub fn local_peer_id(&self) -> &PeerId {
        &self.identity.peer_id
    }

    /// Current connection state snapshot
    pub fn connection_state(&self) -> ConnectionState {
        self.state_rx.borrow().clone()
    }

    /// Whether the transport connection is currently up
    pub fn is_connected(&self) -> bool {
        self.state_rx.borrow().is_connected()
    }

    /// Snapshot of the live roster (never contains the local peer)
    pub fn connected_peers(&self) -> Vec<Peer> {
        self.peers_rx.borrow().clone()
    }

    /// Subscribe to connection state changes
    pub fn state_watch(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Subscribe to roster changes
    pub fn peers_watch(&self) -> watch::Receiver<Vec<Peer>> {
        self.peers_rx.clone()
    }
}

impl Drop for PeerService {
    fn drop(&mut self) {
        self.stop();
    }
}
