//! The pairing coordinator: registry, waiting slot and pairing table behind
//! one `&mut self` boundary.
//!
//! The coordinator is a plain synchronous state machine. Each call applies
//! one event completely and returns the notifications it produced; the hub
//! owns the only instance and delivers those notifications afterwards.

mod pairing;
mod registry;
mod waiting;


pub use pairing::{first_party_initiates, PairingTable};
pub use registry::{normalize_name, Connection, NotRegistered, Phase, Registry};
pub use waiting::{Offer, WaitingSlot};

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::{Map, Value};
use talkpair_common::ConnectionId;
use tracing::{debug, info, warn};

use crate::protocol::{ClientCommand, ServerNotice};

const WAITING_MESSAGE: &str = "Waiting for a partner...";

// ---------------------------------------------------------------------------
// Outputs
// ---------------------------------------------------------------------------

/// Who a notification goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    One(ConnectionId),
    /// Every live connection, registered or not.
    All,
}

/// A notification produced by a state transition.
#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub to: Recipient,
    pub notice: ServerNotice,
}

impl Outbound {
    fn one(id: ConnectionId, notice: ServerNotice) -> Self {
        Self {
            to: Recipient::One(id),
            notice,
        }
    }

    fn all(notice: ServerNotice) -> Self {
        Self {
            to: Recipient::All,
            notice,
        }
    }
}

/// Why a client command was refused. Rendered as `status` text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("Please enter a name")]
    EmptyName,

    #[error("Name must be at most {max} characters")]
    NameTooLong { max: usize },

    #[error("Register a name before looking for a partner")]
    NotRegistered,

    #[error("You are already in a call")]
    AlreadyPaired,

    #[error("You are not in a call")]
    NotInCall,
}

/// Snapshot of coordinator occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CoordinatorStats {
    pub connections: usize,
    pub registered: usize,
    pub waiting: bool,
    pub pairs: usize,
}

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

pub struct Coordinator {
    registry: Registry,
    waiting: WaitingSlot,
    pairs: PairingTable,
    rng: StdRng,
    max_name_len: usize,
}

impl Coordinator {
    pub fn new(max_name_len: usize) -> Self {
        Self::with_rng(max_name_len, StdRng::from_entropy())
    }

    /// Deterministic initiator selection, for tests.
    pub fn with_seed(max_name_len: usize, seed: u64) -> Self {
        Self::with_rng(max_name_len, StdRng::seed_from_u64(seed))
    }

    fn with_rng(max_name_len: usize, rng: StdRng) -> Self {
        Self {
            registry: Registry::default(),
            waiting: WaitingSlot::default(),
            pairs: PairingTable::default(),
            rng,
            max_name_len,
        }
    }

    // -- Queries ------------------------------------------------------------

    pub fn phase(&self, id: ConnectionId) -> Option<Phase> {
        self.registry.get(id).map(|c| c.phase)
    }

    pub fn display_name(&self, id: ConnectionId) -> Option<&str> {
        self.registry.get(id)?.display_name.as_deref()
    }

    pub fn partner_of(&self, id: ConnectionId) -> Option<ConnectionId> {
        self.pairs.partner_of(id)
    }

    pub fn waiting(&self) -> Option<ConnectionId> {
        self.waiting.occupant()
    }

    pub fn connection_ids(&self) -> Vec<ConnectionId> {
        self.registry.ids().collect()
    }

    pub fn stats(&self) -> CoordinatorStats {
        CoordinatorStats {
            connections: self.registry.len(),
            registered: self.registry.registered_count(),
            waiting: self.waiting.occupant().is_some(),
            pairs: self.pairs.pair_count(),
        }
    }

    // -- Events -------------------------------------------------------------

    /// A transport connection opened.
    pub fn connect(&mut self, id: ConnectionId) -> Vec<Outbound> {
        self.registry.connect(id);
        info!(conn = %id, live = self.registry.len(), "Connection opened");
        vec![
            Outbound::one(id, ServerNotice::Hello { id }),
            self.presence(),
        ]
    }

    /// Apply one client command.
    pub fn handle(&mut self, id: ConnectionId, command: ClientCommand) -> Vec<Outbound> {
        if self.registry.get(id).is_none() {
            debug!(conn = %id, "Command from unknown connection dropped");
            return Vec::new();
        }

        match command {
            ClientCommand::Register { name } => self.register(id, &name),
            ClientCommand::FindPartner => self.find_partner(id),
            ClientCommand::Signal { to, payload } => self.relay(id, to.as_deref(), payload),
            ClientCommand::EndCall { partner_id } => self.end_call(id, partner_id.as_deref()),
        }
    }

    /// The transport connection closed. Safe to call for unknown ids.
    pub fn disconnect(&mut self, id: ConnectionId) -> Vec<Outbound> {
        let Some(conn) = self.registry.get(id) else {
            return Vec::new();
        };
        let phase = conn.phase;
        let mut out = Vec::new();

        // Both are attempted; at most one applies.
        let withdrew = self.waiting.withdraw(id);
        if let Some(partner) = self.pairs.unlink(id) {
            self.registry.set_phase(partner, Phase::Idle);
            out.push(Outbound::one(partner, ServerNotice::PartnerLeft));
            info!(conn = %id, partner = %partner, "Paired connection left");
        }

        self.registry.remove(id);
        out.push(self.presence());

        info!(
            conn = %id,
            phase = ?phase,
            withdrew,
            live = self.registry.len(),
            "Connection closed"
        );
        out
    }

    // -- Commands -----------------------------------------------------------

    fn register(&mut self, id: ConnectionId, raw_name: &str) -> Vec<Outbound> {
        let name = match normalize_name(raw_name, self.max_name_len) {
            Ok(name) => name,
            Err(rejection) => return vec![reject(id, rejection)],
        };

        let message = format!("Registered as {name}");
        info!(conn = %id, name = %name, "Registered");
        self.registry.register(id, name);

        vec![
            Outbound::one(id, ServerNotice::status(message)),
            self.presence(),
        ]
    }

    fn find_partner(&mut self, id: ConnectionId) -> Vec<Outbound> {
        let phase = match self.registry.lookup(id) {
            Ok(conn) => conn.phase,
            Err(_) => return vec![reject(id, Rejection::NotRegistered)],
        };

        match phase {
            Phase::Idle => {}
            Phase::Waiting => {
                debug!(conn = %id, "Duplicate find-partner ignored");
                return Vec::new();
            }
            Phase::Paired => return vec![reject(id, Rejection::AlreadyPaired)],
            Phase::Unregistered => return vec![reject(id, Rejection::NotRegistered)],
        }

        match self.waiting.offer(id) {
            Offer::Queued => {
                self.registry.set_phase(id, Phase::Waiting);
                info!(conn = %id, "Waiting for partner");
                vec![Outbound::one(
                    id,
                    ServerNotice::Waiting {
                        message: WAITING_MESSAGE.into(),
                    },
                )]
            }
            Offer::Duplicate => Vec::new(),
            Offer::Matched(waiting) => self.create_match(waiting, id),
        }
    }

    /// Pair `waiting` (taken out of the slot) with `requester`.
    fn create_match(&mut self, waiting: ConnectionId, requester: ConnectionId) -> Vec<Outbound> {
        let names = (
            self.registry.lookup(waiting).map(|c| c.display_name.clone()),
            self.registry.lookup(requester).map(|c| c.display_name.clone()),
        );
        let (Ok(waiting_name), Ok(requester_name)) = names else {
            // The slot only ever holds registered connections; requeue the
            // requester rather than pair with a ghost.
            warn!(waiting = %waiting, requester = %requester, "Stale waiting slot, requeueing");
            return self.find_partner(requester);
        };

        if !self.pairs.link(waiting, requester) {
            // `offer` already emptied the slot. The waiting party keeps its
            // place unless it is somehow paired already.
            warn!(waiting = %waiting, requester = %requester, "Refusing invalid pairing");
            if self.pairs.partner_of(waiting).is_none() {
                self.waiting.offer(waiting);
            } else {
                self.registry.set_phase(waiting, Phase::Paired);
            }
            return Vec::new();
        }
        self.registry.set_phase(waiting, Phase::Paired);
        self.registry.set_phase(requester, Phase::Paired);

        let waiting_initiates = first_party_initiates(&mut self.rng);
        let initiator = if waiting_initiates { waiting } else { requester };
        info!(a = %waiting, b = %requester, initiator = %initiator, "Partners matched");

        vec![
            Outbound::one(
                waiting,
                ServerNotice::PartnerFound {
                    partner_id: requester,
                    partner_name: requester_name.unwrap_or_default(),
                    initiator: waiting_initiates,
                },
            ),
            Outbound::one(
                requester,
                ServerNotice::PartnerFound {
                    partner_id: waiting,
                    partner_name: waiting_name.unwrap_or_default(),
                    initiator: !waiting_initiates,
                },
            ),
        ]
    }

    /// Forward an opaque signal. Anything undeliverable is dropped silently.
    fn relay(
        &mut self,
        from: ConnectionId,
        to: Option<&str>,
        mut payload: Map<String, Value>,
    ) -> Vec<Outbound> {
        if self.registry.lookup(from).is_err() {
            debug!(conn = %from, "Signal from unregistered connection dropped");
            return Vec::new();
        }

        let target = match to {
            Some(raw) => match raw.parse::<ConnectionId>() {
                Ok(target) => target,
                Err(_) => {
                    debug!(conn = %from, to = raw, "Signal to malformed id dropped");
                    return Vec::new();
                }
            },
            None => match self.pairs.partner_of(from) {
                Some(partner) => partner,
                None => {
                    debug!(conn = %from, "Untargeted signal without partner dropped");
                    return Vec::new();
                }
            },
        };

        if self.registry.lookup(target).is_err() {
            debug!(conn = %from, to = %target, "Signal to unknown target dropped");
            return Vec::new();
        }

        payload.shift_remove("from");
        vec![Outbound::one(target, ServerNotice::Signal { from, payload })]
    }

    fn end_call(&mut self, id: ConnectionId, named: Option<&str>) -> Vec<Outbound> {
        if self.registry.lookup(id).is_err() {
            return vec![reject(id, Rejection::NotInCall)];
        }

        let Some(partner) = self.pairs.partner_of(id) else {
            if named.is_some() {
                debug!(conn = %id, "Stale end-call ignored");
                return Vec::new();
            }
            return vec![reject(id, Rejection::NotInCall)];
        };

        if let Some(raw) = named {
            if raw.parse::<ConnectionId>().ok() != Some(partner) {
                debug!(conn = %id, named = raw, partner = %partner, "End-call for other partner ignored");
                return Vec::new();
            }
        }

        self.pairs.unlink(id);
        self.registry.set_phase(id, Phase::Idle);
        self.registry.set_phase(partner, Phase::Idle);
        info!(conn = %id, partner = %partner, "Call ended");

        vec![Outbound::one(partner, ServerNotice::CallEnded)]
    }

    fn presence(&self) -> Outbound {
        Outbound::all(ServerNotice::PresenceCount {
            count: self.registry.len(),
        })
    }
}

fn reject(id: ConnectionId, rejection: Rejection) -> Outbound {
    debug!(conn = %id, reason = %rejection, "Command rejected");
    Outbound::one(id, ServerNotice::status(rejection.to_string()))
}
