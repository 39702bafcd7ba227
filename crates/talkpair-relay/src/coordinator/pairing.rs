//! Pairing table: symmetric connection ↔ partner map, plus the initiator
//! coin flip used when a pair is created.

use std::collections::HashMap;

use rand::Rng;
use talkpair_common::ConnectionId;

#[derive(Debug, Default)]
pub struct PairingTable {
    partners: HashMap<ConnectionId, ConnectionId>,
}

impl PairingTable {
    /// Record `a` and `b` as partners in both directions.
    ///
    /// Returns false and records nothing if `a == b` or either side is
    /// already paired.
    pub fn link(&mut self, a: ConnectionId, b: ConnectionId) -> bool {
        if a == b || self.partners.contains_key(&a) || self.partners.contains_key(&b) {
            return false;
        }
        self.partners.insert(a, b);
        self.partners.insert(b, a);
        true
    }

    pub fn partner_of(&self, id: ConnectionId) -> Option<ConnectionId> {
        self.partners.get(&id).copied()
    }

    /// Remove the pair containing `id`, both directions. Returns the partner.
    pub fn unlink(&mut self, id: ConnectionId) -> Option<ConnectionId> {
        let partner = self.partners.remove(&id)?;
        self.partners.remove(&partner);
        Some(partner)
    }

    /// Number of active pairs.
    pub fn pair_count(&self) -> usize {
        self.partners.len() / 2
    }
}

/// Unbiased coin flip: true means the first party of a new pair initiates.
///
/// Kept apart from match creation so tests can drive it with a seeded rng.
pub fn first_party_initiates<R: Rng + ?Sized>(rng: &mut R) -> bool {
    rng.gen_bool(0.5)
}
