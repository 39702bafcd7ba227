//! The waiting slot: at most one connection looking for a partner.

use talkpair_common::ConnectionId;

/// Result of offering a connection to the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Offer {
    /// Slot was empty; the caller now occupies it.
    Queued,
    /// The caller already occupies the slot.
    Duplicate,
    /// Someone else was waiting. They are returned and the slot is empty.
    Matched(ConnectionId),
}

#[derive(Debug, Default)]
pub struct WaitingSlot {
    occupant: Option<ConnectionId>,
}

impl WaitingSlot {
    pub fn offer(&mut self, id: ConnectionId) -> Offer {
        match self.occupant {
            None => {
                self.occupant = Some(id);
                Offer::Queued
            }
            Some(waiting) if waiting == id => Offer::Duplicate,
            Some(waiting) => {
                self.occupant = None;
                Offer::Matched(waiting)
            }
        }
    }

    /// Clear the slot if `id` holds it.
    pub fn withdraw(&mut self, id: ConnectionId) -> bool {
        if self.occupant == Some(id) {
            self.occupant = None;
            true
        } else {
            false
        }
    }

    pub fn occupant(&self) -> Option<ConnectionId> {
        self.occupant
    }
}
