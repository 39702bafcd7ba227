//! Wire protocol. Every frame is a JSON text object tagged by `type`.
//!
//! Signal payloads are kept as raw JSON maps and forwarded untouched; the
//! relay only reads the `to` field.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use talkpair_common::ConnectionId;

/// Commands a client sends to the relay.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientCommand {
    Register {
        name: String,
    },

    FindPartner,

    /// Opaque negotiation data. Without `to` it goes to the current partner.
    Signal {
        #[serde(default)]
        to: Option<String>,
        #[serde(flatten)]
        payload: Map<String, Value>,
    },

    /// Hang up. Older clients omit `partnerId`.
    EndCall {
        #[serde(default, rename = "partnerId")]
        partner_id: Option<String>,
    },
}

/// Notifications the relay pushes to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerNotice {
    /// First frame on every socket: the id peers use to address this client.
    Hello { id: ConnectionId },

    Status { message: String },

    Waiting { message: String },

    PartnerFound {
        #[serde(rename = "partnerId")]
        partner_id: ConnectionId,
        #[serde(rename = "partnerName")]
        partner_name: String,
        initiator: bool,
    },

    Signal {
        from: ConnectionId,
        #[serde(flatten)]
        payload: Map<String, Value>,
    },

    CallEnded,

    PartnerLeft,

    PresenceCount { count: usize },
}

impl ServerNotice {
    pub fn status(message: impl Into<String>) -> Self {
        Self::Status {
            message: message.into(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Notices that may be skipped under backpressure. A lost presence count
    /// is superseded by the next broadcast; everything else carries state.
    pub fn is_droppable(&self) -> bool {
        matches!(self, Self::PresenceCount { .. })
    }
}
