//! Application event payloads and handler slots
//!
//! The session exposes one registerable callback slot per inbound application
//! event kind. Handlers are invoked synchronously from the session task, in
//! transport arrival order, with the originating peer built from the
//! message's own `fromPeerId`/`fromPeerName` fields (the roster may no longer
//! contain a sender that disconnected right after sending).

use truce_core::{Peer, RequestId, Vote};

// ----------------------------------------------------------------------------
// Event Payloads
// ----------------------------------------------------------------------------

/// An inbound surrender/coffee request
#[derive(Debug, Clone, PartialEq)]
pub struct RequestPayload {
    pub request_id: RequestId,
    pub from_name: String,
    pub duration: f64,
    pub title: Option<String>,
}

/// An inbound vote answering one of our requests
#[derive(Debug, Clone, PartialEq)]
pub struct VotePayload {
    /// Correlation token echoed from the original request, if the voter
    /// supplied one
    pub request_id: Option<RequestId>,
    pub from_name: String,
    pub vote: Vote,
}

/// An inbound fatigue/good-boy alert
#[derive(Debug, Clone, PartialEq)]
pub struct AlertPayload {
    pub request_id: RequestId,
    pub from_name: String,
}

// ----------------------------------------------------------------------------
// Handler Slots
// ----------------------------------------------------------------------------

pub type RequestHandler = Box<dyn FnMut(RequestPayload, Peer) + Send>;
pub type VoteHandler = Box<dyn FnMut(VotePayload, Peer) + Send>;
pub type AlertHandler = Box<dyn FnMut(AlertPayload, Peer) + Send>;

/// The six registerable callback slots, one per application event kind.
///
/// An event arriving for an unregistered slot is silently dropped; that is
/// the callers' way of opting out of event kinds they don't care about.
#[derive(Default)]
pub struct Handlers {
    pub(crate) on_surrender_request: Option<RequestHandler>,
    pub(crate) on_surrender_vote: Option<VoteHandler>,
    pub(crate) on_coffee_request: Option<RequestHandler>,
    pub(crate) on_coffee_vote: Option<VoteHandler>,
    pub(crate) on_fatigue_alert: Option<AlertHandler>,
    pub(crate) on_good_boy: Option<AlertHandler>,
}

impl std::fmt::Debug for Handlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handlers")
            .field("on_surrender_request", &self.on_surrender_request.is_some())
            .field("on_surrender_vote", &self.on_surrender_vote.is_some())
            .field("on_coffee_request", &self.on_coffee_request.is_some())
            .field("on_coffee_vote", &self.on_coffee_vote.is_some())
            .field("on_fatigue_alert", &self.on_fatigue_alert.is_some())
            .field("on_good_boy", &self.on_good_boy.is_some())
            .finish()
    }
}
