//! Session and roster tracking
//!
//! Consumes decoded relay messages, maintains the live roster, and dispatches
//! application events to the registered handler slots. Only the connection
//! task ever calls into this module, so all mutations are serialized.

use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use truce_core::{
    AlertKind, Peer, PeerId, RequestKind, ServerMessage, TrustList,
};

use crate::handlers::{AlertPayload, Handlers, RequestPayload, VotePayload};

/// Handler slots shared between the service handle (registration) and the
/// session task (dispatch). Locked only by the session task after startup.
pub(crate) type SharedHandlers = Arc<Mutex<Handlers>>;

// ----------------------------------------------------------------------------
// Session
// ----------------------------------------------------------------------------

/// Registered/roster state for one relay session
pub(crate) struct Session {
    local_peer_id: PeerId,
    trust: TrustList,
    registered: bool,
    roster: Vec<Peer>,
    peers_tx: Arc<watch::Sender<Vec<Peer>>>,
    handlers: SharedHandlers,
}

impl Session {
    pub(crate) fn new(
        local_peer_id: PeerId,
        trust: TrustList,
        peers_tx: Arc<watch::Sender<Vec<Peer>>>,
        handlers: SharedHandlers,
    ) -> Self {
        Self {
            local_peer_id,
            trust,
            registered: false,
            roster: Vec::new(),
            peers_tx,
            handlers,
        }
    }

    pub(crate) fn is_registered(&self) -> bool {
        self.registered
    }

    /// Reset per-connection state; called when the transport drops
    pub(crate) fn reset(&mut self) {
        self.registered = false;
        self.clear_roster();
    }

    fn clear_roster(&mut self) {
        if !self.roster.is_empty() {
            self.roster.clear();
            let _ = self.peers_tx.send(Vec::new());
        }
    }

    /// Replace the roster wholesale with the relay's authoritative list,
    /// defensively dropping our own entry if the relay included it
    fn set_roster(&mut self, peers: Vec<Peer>) {
        let roster: Vec<Peer> = peers
            .into_iter()
            .filter(|peer| peer.peer_id != self.local_peer_id)
            .collect();
        info!(count = roster.len(), "peer roster updated");
        self.roster = roster.clone();
        let _ = self.peers_tx.send(roster);
    }

    /// Process one decoded relay message
    pub(crate) fn handle_message(&mut self, message: ServerMessage) {
        match message {
            ServerMessage::Registered { peer_name, .. } => {
                self.registered = true;
                info!(%peer_name, "registered with relay");
            }
            ServerMessage::PeersList { peers } => self.set_roster(peers),
            ServerMessage::SurrenderRequestReceived {
                from_peer_id,
                from_peer_name,
                duration,
                title,
                request_id,
            } => {
                let from = Peer::new(from_peer_id, from_peer_name.clone());
                self.dispatch_request(
                    RequestKind::Surrender,
                    RequestPayload {
                        request_id,
                        from_name: from_peer_name,
                        duration,
                        title,
                    },
                    from,
                );
            }
            ServerMessage::CoffeeRequestReceived {
                from_peer_id,
                from_peer_name,
                duration,
                title,
                request_id,
            } => {
                let from = Peer::new(from_peer_id, from_peer_name.clone());
                self.dispatch_request(
                    RequestKind::Coffee,
                    RequestPayload {
                        request_id,
                        from_name: from_peer_name,
                        duration,
                        title,
                    },
                    from,
                );
            }
            ServerMessage::SurrenderVoteReceived {
                from_peer_id,
                from_peer_name,
                vote,
                request_id,
            } => {
                let from = Peer::new(from_peer_id, from_peer_name.clone());
                self.dispatch_vote(
                    RequestKind::Surrender,
                    VotePayload {
                        request_id,
                        from_name: from_peer_name,
                        vote,
                    },
                    from,
                );
            }
            ServerMessage::CoffeeVoteReceived {
                from_peer_id,
                from_peer_name,
                vote,
                request_id,
            } => {
                let from = Peer::new(from_peer_id, from_peer_name.clone());
                self.dispatch_vote(
                    RequestKind::Coffee,
                    VotePayload {
                        request_id,
                        from_name: from_peer_name,
                        vote,
                    },
                    from,
                );
            }
            ServerMessage::FatigueAlertReceived {
                from_peer_id,
                from_peer_name,
                request_id,
            } => {
                let from = Peer::new(from_peer_id, from_peer_name.clone());
                self.dispatch_alert(
                    AlertKind::Fatigue,
                    AlertPayload {
                        request_id,
                        from_name: from_peer_name,
                    },
                    from,
                );
            }
            ServerMessage::GoodBoyReceived {
                from_peer_id,
                from_peer_name,
                request_id,
            } => {
                let from = Peer::new(from_peer_id, from_peer_name.clone());
                self.dispatch_alert(
                    AlertKind::GoodBoy,
                    AlertPayload {
                        request_id,
                        from_name: from_peer_name,
                    },
                    from,
                );
            }
            // Heartbeat ack carries no payload and needs no side effect
            ServerMessage::Pong => {}
            ServerMessage::Error { message } => {
                warn!(%message, "relay reported an error");
            }
        }
    }

    fn allows(&self, from: &Peer) -> bool {
        if self.trust.allows(&from.peer_id) {
            true
        } else {
            warn!(peer = %from, "dropping event from untrusted peer");
            false
        }
    }

    fn dispatch_request(&mut self, kind: RequestKind, payload: RequestPayload, from: Peer) {
        if !self.allows(&from) {
            return;
        }
        info!(%kind, peer = %from, request_id = %payload.request_id, "request received");
        let mut handlers = self.handlers.lock().expect("handlers mutex poisoned");
        let slot = match kind {
            RequestKind::Surrender => &mut handlers.on_surrender_request,
            RequestKind::Coffee => &mut handlers.on_coffee_request,
        };
        match slot {
            Some(handler) => handler(payload, from),
            None => debug!(%kind, "no request handler registered, dropping event"),
        }
    }

    fn dispatch_vote(&mut self, kind: RequestKind, payload: VotePayload, from: Peer) {
        if !self.allows(&from) {
            return;
        }
        info!(%kind, peer = %from, vote = %payload.vote, "vote received");
        let mut handlers = self.handlers.lock().expect("handlers mutex poisoned");
        let slot = match kind {
            RequestKind::Surrender => &mut handlers.on_surrender_vote,
            RequestKind::Coffee => &mut handlers.on_coffee_vote,
        };
        match slot {
            Some(handler) => handler(payload, from),
            None => debug!(%kind, "no vote handler registered, dropping event"),
        }
    }

    fn dispatch_alert(&mut self, kind: AlertKind, payload: AlertPayload, from: Peer) {
        if !self.allows(&from) {
            return;
        }
        info!(%kind, peer = %from, "alert received");
        let mut handlers = self.handlers.lock().expect("handlers mutex poisoned");
        let slot = match kind {
            AlertKind::Fatigue => &mut handlers.on_fatigue_alert,
            AlertKind::GoodBoy => &mut handlers.on_good_boy,
        };
        match slot {
            Some(handler) => handler(payload, from),
            None => debug!(%kind, "no alert handler registered, dropping event"),
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use truce_core::{RequestId, Vote};

    fn make_session(local: &str, trust: TrustList) -> (Session, watch::Receiver<Vec<Peer>>) {
        let (peers_tx, peers_rx) = watch::channel(Vec::new());
        let session = Session::new(
            PeerId::new(local),
            trust,
            Arc::new(peers_tx),
            Arc::new(Mutex::new(Handlers::default())),
        );
        (session, peers_rx)
    }

    fn roster_msg(ids: &[(&str, &str)]) -> ServerMessage {
        ServerMessage::PeersList {
            peers: ids.iter().map(|(id, name)| Peer::new(*id, *name)).collect(),
        }
    }

    #[test]
    fn test_roster_is_replaced_wholesale() {
        let (mut session, peers_rx) = make_session("me", TrustList::new());

        session.handle_message(roster_msg(&[("a", "A"), ("b", "B")]));
        let ids: Vec<String> = peers_rx
            .borrow()
            .iter()
            .map(|p| p.peer_id.to_string())
            .collect();
        assert_eq!(ids, vec!["a", "b"]);

        // A later update fully replaces the previous roster, no merge
        session.handle_message(roster_msg(&[("c", "C")]));
        let ids: Vec<String> = peers_rx
            .borrow()
            .iter()
            .map(|p| p.peer_id.to_string())
            .collect();
        assert_eq!(ids, vec!["c"]);
    }

    #[test]
    fn test_roster_excludes_local_peer() {
        let (mut session, peers_rx) = make_session("me", TrustList::new());

        session.handle_message(roster_msg(&[("a", "A"), ("me", "Me"), ("b", "B")]));
        assert!(peers_rx
            .borrow()
            .iter()
            .all(|p| p.peer_id != PeerId::new("me")));
        assert_eq!(peers_rx.borrow().len(), 2);
    }

    #[test]
    fn test_registered_flag() {
        let (mut session, _rx) = make_session("me", TrustList::new());
        assert!(!session.is_registered());

        session.handle_message(ServerMessage::Registered {
            client_id: "c1".into(),
            peer_id: PeerId::new("me"),
            peer_name: "Me".into(),
        });
        assert!(session.is_registered());

        session.reset();
        assert!(!session.is_registered());
    }

    #[test]
    fn test_request_dispatch_builds_peer_from_message_fields() {
        let (mut session, _rx) = make_session("me", TrustList::new());
        let (tx, rx) = mpsc::channel();
        session
            .handlers
            .lock()
            .unwrap()
            .on_surrender_request = Some(Box::new(move |payload, from| {
            tx.send((payload, from)).unwrap();
        }));

        session.handle_message(ServerMessage::SurrenderRequestReceived {
            from_peer_id: PeerId::new("a"),
            from_peer_name: "Alice".into(),
            duration: 12.0,
            title: None,
            request_id: RequestId::new("req-1"),
        });

        let (payload, from) = rx.try_recv().unwrap();
        assert_eq!(payload.request_id, RequestId::new("req-1"));
        assert_eq!(payload.duration, 12.0);
        assert_eq!(from.peer_id, PeerId::new("a"));
        assert_eq!(from.peer_name, "Alice");
    }

    #[test]
    fn test_vote_request_id_threaded_verbatim() {
        let (mut session, _rx) = make_session("me", TrustList::new());
        let (tx, rx) = mpsc::channel();
        session.handlers.lock().unwrap().on_coffee_vote =
            Some(Box::new(move |payload, _from| {
                tx.send(payload).unwrap();
            }));

        session.handle_message(ServerMessage::CoffeeVoteReceived {
            from_peer_id: PeerId::new("b"),
            from_peer_name: "Bob".into(),
            vote: Vote::No,
            request_id: Some(RequestId::new("req-42")),
        });

        let payload = rx.try_recv().unwrap();
        assert_eq!(payload.vote, Vote::No);
        assert_eq!(payload.request_id, Some(RequestId::new("req-42")));
    }

    #[test]
    fn test_unregistered_slot_drops_event() {
        let (mut session, _rx) = make_session("me", TrustList::new());

        // No handler registered; must not panic or error
        session.handle_message(ServerMessage::FatigueAlertReceived {
            from_peer_id: PeerId::new("a"),
            from_peer_name: "Alice".into(),
            request_id: RequestId::new("req-1"),
        });
    }

    #[test]
    fn test_trust_list_filters_application_events() {
        let trust: TrustList = [PeerId::new("friend")].into_iter().collect();
        let (mut session, peers_rx) = make_session("me", trust);
        let (tx, rx) = mpsc::channel();
        session.handlers.lock().unwrap().on_good_boy =
            Some(Box::new(move |payload, _from| {
                tx.send(payload).unwrap();
            }));

        session.handle_message(ServerMessage::GoodBoyReceived {
            from_peer_id: PeerId::new("stranger"),
            from_peer_name: "Stranger".into(),
            request_id: RequestId::new("r1"),
        });
        assert!(rx.try_recv().is_err());

        session.handle_message(ServerMessage::GoodBoyReceived {
            from_peer_id: PeerId::new("friend"),
            from_peer_name: "Friend".into(),
            request_id: RequestId::new("r2"),
        });
        assert_eq!(rx.try_recv().unwrap().request_id, RequestId::new("r2"));

        // Roster updates are control messages; the trust list must not
        // filter them
        session.handle_message(roster_msg(&[("stranger", "Stranger")]));
        assert_eq!(peers_rx.borrow().len(), 1);
    }
}
