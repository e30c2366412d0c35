//! Subcommand implementations

use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::info;

use truce_client::{
    AlertKind, AlertPayload, Peer, PeerId, PeerIdentity, PeerService, RelayConfig, RequestId,
    RequestKind, RequestPayload, Vote, VotePayload,
};

/// How long one-shot commands wait for registration and peer discovery
const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(15);

/// Grace period for queued outbound frames to reach the wire before stop()
const FLUSH_GRACE: Duration = Duration::from_millis(300);

/// Inbound session activity, forwarded out of the handler callbacks so the
/// command loop can react to it
enum SessionEvent {
    Request(RequestKind, RequestPayload, Peer),
    Vote(RequestKind, VotePayload, Peer),
    Alert(AlertKind, AlertPayload, Peer),
}

// ----------------------------------------------------------------------------
// Listen
// ----------------------------------------------------------------------------

pub async fn listen(
    config: RelayConfig,
    identity: PeerIdentity,
    auto_vote: Option<Vote>,
) -> Result<()> {
    let (tx, mut events) = mpsc::unbounded_channel::<SessionEvent>();

    let service = {
        let (t1, t2, t3, t4, t5, t6) = (
            tx.clone(),
            tx.clone(),
            tx.clone(),
            tx.clone(),
            tx.clone(),
            tx,
        );
        PeerService::builder(config)
            .identity(identity)
            .on_surrender_request(move |p, from| {
                let _ = t1.send(SessionEvent::Request(RequestKind::Surrender, p, from));
            })
            .on_coffee_request(move |p, from| {
                let _ = t2.send(SessionEvent::Request(RequestKind::Coffee, p, from));
            })
            .on_surrender_vote(move |p, from| {
                let _ = t3.send(SessionEvent::Vote(RequestKind::Surrender, p, from));
            })
            .on_coffee_vote(move |p, from| {
                let _ = t4.send(SessionEvent::Vote(RequestKind::Coffee, p, from));
            })
            .on_fatigue_alert(move |p, from| {
                let _ = t5.send(SessionEvent::Alert(AlertKind::Fatigue, p, from));
            })
            .on_good_boy(move |p, from| {
                let _ = t6.send(SessionEvent::Alert(AlertKind::GoodBoy, p, from));
            })
            .build()?
    };

    service.start();
    wait_registered(&service).await?;
    info!(
        peer_id = %service.local_peer_id(),
        name = %service.local_identity().display_name,
        "listening; press Ctrl-C to stop"
    );

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => {
                let Some(event) = event else { break };
                handle_event(&service, event, auto_vote);
            }
        }
    }

    service.stop();
    Ok(())
}

fn handle_event(service: &PeerService, event: SessionEvent, auto_vote: Option<Vote>) {
    match event {
        SessionEvent::Request(kind, payload, from) => {
            println!(
                "[{kind}] request from {} (duration {:.0}s{}) id={}",
                from.peer_name,
                payload.duration,
                payload
                    .title
                    .as_deref()
                    .map(|t| format!(", title {t:?}"))
                    .unwrap_or_default(),
                payload.request_id,
            );
            if let Some(vote) = auto_vote {
                info!(%vote, peer = %from.peer_name, "auto-voting");
                service.send_vote(kind, &from, vote, Some(payload.request_id));
            }
        }
        SessionEvent::Vote(kind, payload, from) => {
            println!(
                "[{kind}] {} voted {}{}",
                from.peer_name,
                payload.vote,
                payload
                    .request_id
                    .map(|id| format!(" (id={id})"))
                    .unwrap_or_default(),
            );
        }
        SessionEvent::Alert(kind, payload, from) => {
            println!("[{kind}] alert from {} id={}", from.peer_name, payload.request_id);
        }
    }
}

// ----------------------------------------------------------------------------
// Request
// ----------------------------------------------------------------------------

pub async fn request(
    config: RelayConfig,
    identity: PeerIdentity,
    peer_query: String,
    kind: RequestKind,
    duration: f64,
    title: Option<String>,
    timeout_secs: u64,
) -> Result<()> {
    let (tx, mut votes) = mpsc::unbounded_channel::<(VotePayload, Peer)>();

    let builder = PeerService::builder(config).identity(identity);
    let service = match kind {
        RequestKind::Surrender => builder.on_surrender_vote(move |p, from| {
            let _ = tx.send((p, from));
        }),
        RequestKind::Coffee => builder.on_coffee_vote(move |p, from| {
            let _ = tx.send((p, from));
        }),
    }
    .build()?;

    service.start();
    wait_registered(&service).await?;
    let target = resolve_peer(&service, &peer_query).await?;

    let request_id = service.send_request(kind, &target, duration, title);
    println!("sent {kind} request to {} (id={request_id})", target.peer_name);

    let outcome = tokio::time::timeout(
        Duration::from_secs(timeout_secs),
        wait_for_vote(&mut votes, &request_id, &target),
    )
    .await;

    service.stop();
    match outcome {
        Ok(Some(vote)) => {
            println!("{} voted {vote}", target.peer_name);
            Ok(())
        }
        Ok(None) => anyhow::bail!("session ended before a vote arrived"),
        Err(_) => anyhow::bail!("no vote from {} within {timeout_secs}s", target.peer_name),
    }
}

/// Wait for the vote that answers our request. Votes carrying a different
/// correlation id are ignored; a vote without one is accepted only when it
/// comes from the peer we asked.
async fn wait_for_vote(
    votes: &mut mpsc::UnboundedReceiver<(VotePayload, Peer)>,
    request_id: &RequestId,
    target: &Peer,
) -> Option<Vote> {
    while let Some((payload, from)) = votes.recv().await {
        let matches = match &payload.request_id {
            Some(id) => id == request_id,
            None => from.peer_id == target.peer_id,
        };
        if matches {
            return Some(payload.vote);
        }
        info!(peer = %from.peer_name, "ignoring uncorrelated vote");
    }
    None
}

// ----------------------------------------------------------------------------
// Alert
// ----------------------------------------------------------------------------

pub async fn alert(
    config: RelayConfig,
    identity: PeerIdentity,
    peer_query: String,
    kind: AlertKind,
) -> Result<()> {
    let service = PeerService::builder(config).identity(identity).build()?;

    service.start();
    wait_registered(&service).await?;
    let target = resolve_peer(&service, &peer_query).await?;

    let request_id = service.send_alert(kind, &target);
    println!("sent {kind} alert to {} (id={request_id})", target.peer_name);

    tokio::time::sleep(FLUSH_GRACE).await;
    service.stop();
    Ok(())
}

// ----------------------------------------------------------------------------
// Peers
// ----------------------------------------------------------------------------

pub async fn peers(config: RelayConfig, identity: PeerIdentity) -> Result<()> {
    let service = PeerService::builder(config).identity(identity).build()?;

    service.start();
    wait_registered(&service).await?;

    // The roster broadcast follows registration; give it a moment to land
    let mut roster = service.peers_watch();
    let _ = tokio::time::timeout(Duration::from_secs(2), roster.changed()).await;

    let peers = service.connected_peers();
    if peers.is_empty() {
        println!("no other peers connected");
    } else {
        for peer in &peers {
            println!("{}  {}", peer.peer_id, peer.peer_name);
        }
    }

    service.stop();
    Ok(())
}

// ----------------------------------------------------------------------------
// Helpers
// ----------------------------------------------------------------------------

async fn wait_registered(service: &PeerService) -> Result<()> {
    let mut state = service.state_watch();
    tokio::time::timeout(DISCOVERY_TIMEOUT, async {
        loop {
            if state.borrow().is_registered() {
                return Ok::<_, anyhow::Error>(());
            }
            state
                .changed()
                .await
                .context("session ended before registration")?;
        }
    })
    .await
    .context("timed out waiting for registration with the relay")?
}

/// Find a connected peer by exact id or display name, waiting for roster
/// updates until the discovery timeout elapses
async fn resolve_peer(service: &PeerService, query: &str) -> Result<Peer> {
    let mut roster = service.peers_watch();
    tokio::time::timeout(DISCOVERY_TIMEOUT, async {
        loop {
            if let Some(peer) = find_peer(&roster.borrow(), query) {
                return Ok::<_, anyhow::Error>(peer);
            }
            roster
                .changed()
                .await
                .context("session ended during peer discovery")?;
        }
    })
    .await
    .with_context(|| format!("peer {query:?} is not connected"))?
}

fn find_peer(peers: &[Peer], query: &str) -> Option<Peer> {
    peers
        .iter()
        .find(|p| p.peer_id == PeerId::new(query) || p.peer_name == query)
        .cloned()
}
