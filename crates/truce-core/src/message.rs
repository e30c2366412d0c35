//! Wire message taxonomy and codec for the relay protocol
//!
//! Every transport frame is one UTF-8 JSON object carrying a `type`
//! discriminant. Decoding dispatches on that discriminant and fails closed:
//! an unknown `type`, or a payload missing the required fields for its
//! declared `type`, yields a [`CodecError`] and the message is dropped by the
//! caller. Optional fields decode to an explicit `None`, never a sentinel.

use serde::{Deserialize, Serialize};

use crate::errors::CodecError;
use crate::types::{Peer, PeerId, RequestId, Vote};

// ----------------------------------------------------------------------------
// Client -> Relay Messages
// ----------------------------------------------------------------------------

/// Messages sent from a peer to the relay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    #[serde(rename_all = "camelCase")]
    Register { peer_id: PeerId, peer_name: String },
    Ping,
    #[serde(rename_all = "camelCase")]
    SurrenderRequest {
        target_peer_id: PeerId,
        duration: f64,
        #[serde(skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        request_id: Option<RequestId>,
    },
    #[serde(rename_all = "camelCase")]
    SurrenderVote {
        target_peer_id: PeerId,
        vote: Vote,
        #[serde(skip_serializing_if = "Option::is_none")]
        request_id: Option<RequestId>,
    },
    #[serde(rename_all = "camelCase")]
    CoffeeRequest {
        target_peer_id: PeerId,
        duration: f64,
        #[serde(skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        request_id: Option<RequestId>,
    },
    #[serde(rename_all = "camelCase")]
    CoffeeVote {
        target_peer_id: PeerId,
        vote: Vote,
        #[serde(skip_serializing_if = "Option::is_none")]
        request_id: Option<RequestId>,
    },
    #[serde(rename_all = "camelCase")]
    FatigueAlert {
        target_peer_id: PeerId,
        #[serde(skip_serializing_if = "Option::is_none")]
        request_id: Option<RequestId>,
    },
    #[serde(rename_all = "camelCase")]
    GoodBoy {
        target_peer_id: PeerId,
        #[serde(skip_serializing_if = "Option::is_none")]
        request_id: Option<RequestId>,
    },
}

impl ClientMessage {
    /// Encode to the single-frame JSON wire form
    pub fn to_json(&self) -> Result<String, CodecError> {
        serde_json::to_string(self).map_err(|e| CodecError::Encode(e.to_string()))
    }

    /// Decode from the wire form, failing closed on unknown or malformed input
    pub fn from_json(text: &str) -> Result<Self, CodecError> {
        serde_json::from_str(text).map_err(|e| CodecError::Decode(e.to_string()))
    }
}

// ----------------------------------------------------------------------------
// Relay -> Client Messages
// ----------------------------------------------------------------------------

/// Messages sent from the relay to a peer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    #[serde(rename_all = "camelCase")]
    Registered {
        client_id: String,
        peer_id: PeerId,
        peer_name: String,
    },
    PeersList { peers: Vec<Peer> },
    #[serde(rename_all = "camelCase")]
    SurrenderRequestReceived {
        from_peer_id: PeerId,
        from_peer_name: String,
        duration: f64,
        #[serde(skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        request_id: RequestId,
    },
    #[serde(rename_all = "camelCase")]
    SurrenderVoteReceived {
        from_peer_id: PeerId,
        from_peer_name: String,
        vote: Vote,
        #[serde(skip_serializing_if = "Option::is_none")]
        request_id: Option<RequestId>,
    },
    #[serde(rename_all = "camelCase")]
    CoffeeRequestReceived {
        from_peer_id: PeerId,
        from_peer_name: String,
        duration: f64,
        #[serde(skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        request_id: RequestId,
    },
    #[serde(rename_all = "camelCase")]
    CoffeeVoteReceived {
        from_peer_id: PeerId,
        from_peer_name: String,
        vote: Vote,
        #[serde(skip_serializing_if = "Option::is_none")]
        request_id: Option<RequestId>,
    },
    #[serde(rename_all = "camelCase")]
    FatigueAlertReceived {
        from_peer_id: PeerId,
        from_peer_name: String,
        request_id: RequestId,
    },
    #[serde(rename_all = "camelCase")]
    GoodBoyReceived {
        from_peer_id: PeerId,
        from_peer_name: String,
        request_id: RequestId,
    },
    Pong,
    #[serde(rename_all = "camelCase")]
    Error { message: String },
}

impl ServerMessage {
    /// Encode to the single-frame JSON wire form
    pub fn to_json(&self) -> Result<String, CodecError> {
        serde_json::to_string(self).map_err(|e| CodecError::Encode(e.to_string()))
    }

    /// Decode from the wire form, failing closed on unknown or malformed input
    pub fn from_json(text: &str) -> Result<Self, CodecError> {
        serde_json::from_str(text).map_err(|e| CodecError::Decode(e.to_string()))
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_wire_form() {
        let msg = ClientMessage::Register {
            peer_id: PeerId::new("abc-123"),
            peer_name: "Studio Mac".to_string(),
        };
        let json = msg.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["type"], "register");
        assert_eq!(value["peerId"], "abc-123");
        assert_eq!(value["peerName"], "Studio Mac");
    }

    #[test]
    fn test_ping_is_bare_envelope() {
        let json = ClientMessage::Ping.to_json().unwrap();
        assert_eq!(json, r#"{"type":"ping"}"#);
    }

    #[test]
    fn test_absent_optionals_are_omitted() {
        let msg = ClientMessage::SurrenderRequest {
            target_peer_id: PeerId::new("b"),
            duration: 12.0,
            title: None,
            request_id: None,
        };
        let json = msg.to_json().unwrap();
        assert!(!json.contains("title"));
        assert!(!json.contains("requestId"));

        let decoded = ClientMessage::from_json(&json).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn test_client_round_trip_all_variants() {
        let target = PeerId::new("target");
        let id = RequestId::new("req-1");
        let variants = vec![
            ClientMessage::Register {
                peer_id: PeerId::new("me"),
                peer_name: "Me".into(),
            },
            ClientMessage::Ping,
            ClientMessage::SurrenderRequest {
                target_peer_id: target.clone(),
                duration: 45.5,
                title: Some("lunch?".into()),
                request_id: Some(id.clone()),
            },
            ClientMessage::SurrenderVote {
                target_peer_id: target.clone(),
                vote: Vote::Yes,
                request_id: Some(id.clone()),
            },
            ClientMessage::CoffeeRequest {
                target_peer_id: target.clone(),
                duration: 10.0,
                title: None,
                request_id: None,
            },
            ClientMessage::CoffeeVote {
                target_peer_id: target.clone(),
                vote: Vote::No,
                request_id: None,
            },
            ClientMessage::FatigueAlert {
                target_peer_id: target.clone(),
                request_id: Some(id.clone()),
            },
            ClientMessage::GoodBoy {
                target_peer_id: target,
                request_id: None,
            },
        ];

        for msg in variants {
            let json = msg.to_json().unwrap();
            assert_eq!(ClientMessage::from_json(&json).unwrap(), msg, "{json}");
        }
    }

    #[test]
    fn test_server_round_trip_all_variants() {
        let from = PeerId::new("peer-a");
        let id = RequestId::new("req-9");
        let variants = vec![
            ServerMessage::Registered {
                client_id: "client-7".into(),
                peer_id: from.clone(),
                peer_name: "Peer A".into(),
            },
            ServerMessage::PeersList {
                peers: vec![Peer::new("x", "X"), Peer::new("y", "Y")],
            },
            ServerMessage::SurrenderRequestReceived {
                from_peer_id: from.clone(),
                from_peer_name: "Peer A".into(),
                duration: 12.0,
                title: None,
                request_id: id.clone(),
            },
            ServerMessage::SurrenderVoteReceived {
                from_peer_id: from.clone(),
                from_peer_name: "Peer A".into(),
                vote: Vote::Yes,
                request_id: Some(id.clone()),
            },
            ServerMessage::CoffeeRequestReceived {
                from_peer_id: from.clone(),
                from_peer_name: "Peer A".into(),
                duration: 7.5,
                title: Some("break".into()),
                request_id: id.clone(),
            },
            ServerMessage::CoffeeVoteReceived {
                from_peer_id: from.clone(),
                from_peer_name: "Peer A".into(),
                vote: Vote::No,
                request_id: None,
            },
            ServerMessage::FatigueAlertReceived {
                from_peer_id: from.clone(),
                from_peer_name: "Peer A".into(),
                request_id: id.clone(),
            },
            ServerMessage::GoodBoyReceived {
                from_peer_id: from.clone(),
                from_peer_name: "Peer A".into(),
                request_id: id,
            },
            ServerMessage::Pong,
            ServerMessage::Error {
                message: "target peer not found".into(),
            },
        ];

        for msg in variants {
            let json = msg.to_json().unwrap();
            assert_eq!(ServerMessage::from_json(&json).unwrap(), msg, "{json}");
        }
    }

    #[test]
    fn test_unknown_type_fails_closed() {
        let err = ServerMessage::from_json(r#"{"type":"teleport","x":1}"#).unwrap_err();
        assert!(matches!(err, CodecError::Decode(_)));
    }

    #[test]
    fn test_missing_required_field_fails_closed() {
        // surrender_request_received requires fromPeerId
        let payload = r#"{"type":"surrender_request_received","fromPeerName":"A","duration":5,"requestId":"r"}"#;
        assert!(ServerMessage::from_json(payload).is_err());

        // registered requires clientId
        let payload = r#"{"type":"registered","peerId":"p","peerName":"P"}"#;
        assert!(ServerMessage::from_json(payload).is_err());
    }

    #[test]
    fn test_extra_fields_are_tolerated() {
        let payload = r#"{"type":"pong","sentAt":123456}"#;
        assert_eq!(ServerMessage::from_json(payload).unwrap(), ServerMessage::Pong);
    }

    #[test]
    fn test_vote_received_without_request_id() {
        let payload =
            r#"{"type":"surrender_vote_received","fromPeerId":"a","fromPeerName":"A","vote":"yes"}"#;
        match ServerMessage::from_json(payload).unwrap() {
            ServerMessage::SurrenderVoteReceived { vote, request_id, .. } => {
                assert_eq!(vote, Vote::Yes);
                assert_eq!(request_id, None);
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }
}
