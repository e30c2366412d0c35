//! Relay connection task
//!
//! One tokio task owns the transport connection and every piece of mutable
//! session state. The task cycles through the connection state machine
//! (`Disconnected -> Connecting -> Connected -> Reconnecting -> ...`),
//! registering the local identity on connect, pumping the heartbeat, and
//! backing off exponentially after failures. Transport errors never escape
//! this module; every failure path schedules a reconnect until `stop()`.

use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval_at, timeout, Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use truce_core::{
    AlertKind, ClientMessage, ConnectionState, PeerId, PeerIdentity, RelayConfig, RequestId,
    RequestKind, ServerMessage, Vote,
};

use crate::session::Session;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, WsMessage>;

// ----------------------------------------------------------------------------
// Commands
// ----------------------------------------------------------------------------

/// Commands from the service handle to the connection task.
///
/// Sends are fire-and-forget: a send command arriving while the task is not
/// connected is dropped, never queued.
#[derive(Debug)]
pub(crate) enum Command {
    SendRequest {
        kind: RequestKind,
        target: PeerId,
        duration: f64,
        title: Option<String>,
        request_id: RequestId,
    },
    SendVote {
        kind: RequestKind,
        target: PeerId,
        vote: Vote,
        request_id: Option<RequestId>,
    },
    SendAlert {
        kind: AlertKind,
        target: PeerId,
        request_id: RequestId,
    },
    Stop,
}

impl Command {
    fn into_message(self) -> Option<ClientMessage> {
        match self {
            Command::SendRequest {
                kind,
                target,
                duration,
                title,
                request_id,
            } => Some(match kind {
                RequestKind::Surrender => ClientMessage::SurrenderRequest {
                    target_peer_id: target,
                    duration,
                    title,
                    request_id: Some(request_id),
                },
                RequestKind::Coffee => ClientMessage::CoffeeRequest {
                    target_peer_id: target,
                    duration,
                    title,
                    request_id: Some(request_id),
                },
            }),
            Command::SendVote {
                kind,
                target,
                vote,
                request_id,
            } => Some(match kind {
                RequestKind::Surrender => ClientMessage::SurrenderVote {
                    target_peer_id: target,
                    vote,
                    request_id,
                },
                RequestKind::Coffee => ClientMessage::CoffeeVote {
                    target_peer_id: target,
                    vote,
                    request_id,
                },
            }),
            Command::SendAlert {
                kind,
                target,
                request_id,
            } => Some(match kind {
                AlertKind::Fatigue => ClientMessage::FatigueAlert {
                    target_peer_id: target,
                    request_id: Some(request_id),
                },
                AlertKind::GoodBoy => ClientMessage::GoodBoy {
                    target_peer_id: target,
                    request_id: Some(request_id),
                },
            }),
            Command::Stop => None,
        }
    }
}

// ----------------------------------------------------------------------------
// Backoff
// ----------------------------------------------------------------------------

/// Reconnect delay after `attempt` consecutive failures: `min(2^attempt, max)`.
///
/// Attempts keep incrementing without bound; only the delay is capped.
pub(crate) fn reconnect_delay(attempt: u32, max: Duration) -> Duration {
    let capped = 2u64
        .checked_pow(attempt)
        .map(|secs| secs.min(max.as_secs()))
        .unwrap_or(max.as_secs());
    Duration::from_secs(capped)
}

// ----------------------------------------------------------------------------
// Connection Task
// ----------------------------------------------------------------------------

/// Outcome of one established connection
enum Driven {
    /// The transport dropped or errored; reconnect with backoff
    Lost,
    /// `stop()` was requested or the handle went away; shut down
    Stopped,
}

pub(crate) struct ConnectionTask {
    config: RelayConfig,
    identity: PeerIdentity,
    session: Session,
    commands: mpsc::Receiver<Command>,
    state_tx: Arc<watch::Sender<ConnectionState>>,
}

impl ConnectionTask {
    pub(crate) fn new(
        config: RelayConfig,
        identity: PeerIdentity,
        session: Session,
        commands: mpsc::Receiver<Command>,
        state_tx: Arc<watch::Sender<ConnectionState>>,
    ) -> Self {
        Self {
            config,
            identity,
            session,
            commands,
            state_tx,
        }
    }

    /// Run the connection state machine until stopped
    pub(crate) async fn run(mut self) {
        info!(url = %self.config.url, "starting relay session");
        let mut attempt: u32 = 0;

        'session: loop {
            self.set_state(ConnectionState::Connecting);
            let url = self.config.url.to_string();
            let connect = timeout(self.config.connect_timeout(), connect_async(url));
            tokio::pin!(connect);

            // Drain commands while the handshake is in flight: sends require
            // a live connection and are dropped, and stop() takes effect
            // without waiting out the connect timeout.
            let connected = loop {
                tokio::select! {
                    result = &mut connect => break result,
                    command = self.commands.recv() => match command {
                        Some(Command::Stop) | None => break 'session,
                        Some(command) => {
                            debug!(?command, "dropping send while connecting");
                        }
                    },
                }
            };

            match connected {
                Ok(Ok((stream, _response))) => {
                    info!(url = %self.config.url, "connected to relay");
                    attempt = 0;
                    match self.drive(stream).await {
                        Driven::Stopped => break,
                        Driven::Lost => self.session.reset(),
                    }
                }
                Ok(Err(e)) => warn!(url = %self.config.url, error = %e, "relay connection failed"),
                Err(_) => warn!(
                    url = %self.config.url,
                    timeout_secs = self.config.connect_timeout_secs,
                    "relay connection attempt timed out"
                ),
            }

            attempt += 1;
            let delay = reconnect_delay(attempt, self.config.max_reconnect_delay());
            self.set_state(ConnectionState::Reconnecting {
                attempt,
                next_delay: delay,
            });
            info!(attempt, delay_secs = delay.as_secs(), "scheduling reconnect");
            if !self.backoff(delay).await {
                break;
            }
        }

        self.session.reset();
        self.set_state(ConnectionState::Disconnected);
        info!("relay session stopped");
    }

    /// Wait out the reconnect delay. Returns `false` if `stop()` arrived
    /// before the timer fired, cancelling the reconnect.
    async fn backoff(&mut self, delay: Duration) -> bool {
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                _ = &mut sleep => return true,
                command = self.commands.recv() => match command {
                    Some(Command::Stop) | None => return false,
                    Some(command) => {
                        debug!(?command, "dropping send while reconnecting");
                    }
                },
            }
        }
    }

    /// Pump one established connection until it drops or stop is requested
    async fn drive(&mut self, stream: WsStream) -> Driven {
        let (mut sink, mut source) = stream.split();
        self.set_state(ConnectionState::Connected { registered: false });

        // Register immediately; the relay will answer with `registered`
        // followed by the current roster.
        let register = ClientMessage::Register {
            peer_id: self.identity.peer_id.clone(),
            peer_name: self.identity.display_name.clone(),
        };
        if write_message(&mut sink, &register).await.is_err() {
            return Driven::Lost;
        }

        let period = self.config.ping_interval();
        let mut heartbeat = interval_at(Instant::now() + period, period);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                frame = source.next() => match self.handle_frame(frame, &mut sink).await {
                    Ok(()) => {}
                    Err(driven) => return driven,
                },

                _ = heartbeat.tick() => {
                    debug!("sending keep-alive ping");
                    if write_message(&mut sink, &ClientMessage::Ping).await.is_err() {
                        return Driven::Lost;
                    }
                }

                command = self.commands.recv() => match command {
                    Some(Command::Stop) | None => {
                        let _ = sink.send(WsMessage::Close(None)).await;
                        return Driven::Stopped;
                    }
                    Some(command) => {
                        // into_message is None only for Stop, handled above
                        if let Some(message) = command.into_message() {
                            if write_message(&mut sink, &message).await.is_err() {
                                return Driven::Lost;
                            }
                        }
                    }
                },
            }
        }
    }

    /// Process one transport frame; `Err` carries the loop outcome
    async fn handle_frame(
        &mut self,
        frame: Option<Result<WsMessage, tokio_tungstenite::tungstenite::Error>>,
        sink: &mut WsSink,
    ) -> Result<(), Driven> {
        match frame {
            Some(Ok(WsMessage::Text(text))) => {
                self.handle_text(&text);
                Ok(())
            }
            Some(Ok(WsMessage::Ping(payload))) => {
                let _ = sink.send(WsMessage::Pong(payload)).await;
                Ok(())
            }
            Some(Ok(WsMessage::Close(_))) | None => {
                warn!("relay closed the connection");
                Err(Driven::Lost)
            }
            Some(Ok(_)) => Ok(()), // binary/pong frames are not part of the protocol
            Some(Err(e)) => {
                warn!(error = %e, "transport error");
                Err(Driven::Lost)
            }
        }
    }

    fn handle_text(&mut self, text: &str) {
        let message = match ServerMessage::from_json(text) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "dropping undecodable relay message");
                return;
            }
        };

        let was_registered = self.session.is_registered();
        self.session.handle_message(message);
        if !was_registered && self.session.is_registered() {
            self.set_state(ConnectionState::Connected { registered: true });
        }
    }

    fn set_state(&self, state: ConnectionState) {
        debug!(state = state.state_name(), "connection state changed");
        let _ = self.state_tx.send(state);
    }
}

/// Encode and write one message. Encoding failures are logged and dropped
/// (never raised); only transport write failures are returned.
async fn write_message(sink: &mut WsSink, message: &ClientMessage) -> Result<(), ()> {
    let text = match message.to_json() {
        Ok(text) => text,
        Err(e) => {
            warn!(error = %e, "dropping unencodable message");
            return Ok(());
        }
    };
    sink.send(WsMessage::Text(text)).await.map_err(|e| {
        warn!(error = %e, "transport write failed");
    })
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reconnect_delay_sequence() {
        let max = Duration::from_secs(30);
        let delays: Vec<u64> = (1..=8)
            .map(|attempt| reconnect_delay(attempt, max).as_secs())
            .collect();
        assert_eq!(delays, vec![2, 4, 8, 16, 30, 30, 30, 30]);
    }

    #[test]
    fn test_reconnect_delay_never_overflows() {
        let max = Duration::from_secs(30);
        assert_eq!(reconnect_delay(63, max), max);
        assert_eq!(reconnect_delay(64, max), max);
        assert_eq!(reconnect_delay(u32::MAX, max), max);
    }

    #[test]
    fn test_commands_map_to_wire_messages() {
        let command = Command::SendRequest {
            kind: RequestKind::Surrender,
            target: PeerId::new("b"),
            duration: 12.0,
            title: None,
            request_id: RequestId::new("r1"),
        };
        match command.into_message() {
            Some(ClientMessage::SurrenderRequest {
                target_peer_id,
                duration,
                request_id,
                ..
            }) => {
                assert_eq!(target_peer_id, PeerId::new("b"));
                assert_eq!(duration, 12.0);
                assert_eq!(request_id, Some(RequestId::new("r1")));
            }
            other => panic!("unexpected message: {other:?}"),
        }

        let command = Command::SendVote {
            kind: RequestKind::Coffee,
            target: PeerId::new("a"),
            vote: Vote::Yes,
            request_id: Some(RequestId::new("r2")),
        };
        assert!(matches!(
            command.into_message(),
            Some(ClientMessage::CoffeeVote { .. })
        ));

        let command = Command::SendAlert {
            kind: AlertKind::GoodBoy,
            target: PeerId::new("a"),
            request_id: RequestId::new("r3"),
        };
        assert!(matches!(
            command.into_message(),
            Some(ClientMessage::GoodBoy { .. })
        ));

        assert!(Command::Stop.into_message().is_none());
    }
}
