//! Connection registry: every live socket, its display name and phase.

use std::collections::HashMap;

use talkpair_common::ConnectionId;

use super::Rejection;

/// Position of a connection in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Connected but no name yet.
    Unregistered,
    Idle,
    /// Occupying the waiting slot.
    Waiting,
    /// Present in the pairing table.
    Paired,
}

/// One live connection.
#[derive(Debug, Clone)]
pub struct Connection {
    pub id: ConnectionId,
    pub display_name: Option<String>,
    pub phase: Phase,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("connection {0} is not registered")]
pub struct NotRegistered(pub ConnectionId);

#[derive(Debug, Default)]
pub struct Registry {
    connections: HashMap<ConnectionId, Connection>,
}

impl Registry {
    /// Track a freshly opened socket. No-op if already known.
    pub fn connect(&mut self, id: ConnectionId) {
        self.connections.entry(id).or_insert(Connection {
            id,
            display_name: None,
            phase: Phase::Unregistered,
        });
    }

    /// Store `name` for `id`, creating the entry if absent.
    ///
    /// An unregistered connection becomes Idle. A connection that is already
    /// waiting or paired only gets its name replaced.
    pub fn register(&mut self, id: ConnectionId, name: String) -> &Connection {
        let entry = self.connections.entry(id).or_insert(Connection {
            id,
            display_name: None,
            phase: Phase::Unregistered,
        });
        entry.display_name = Some(name);
        if entry.phase == Phase::Unregistered {
            entry.phase = Phase::Idle;
        }
        entry
    }

    /// The entry for `id`, provided it has registered a name.
    pub fn lookup(&self, id: ConnectionId) -> Result<&Connection, NotRegistered> {
        match self.connections.get(&id) {
            Some(conn) if conn.phase != Phase::Unregistered => Ok(conn),
            _ => Err(NotRegistered(id)),
        }
    }

    pub fn get(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.get(&id)
    }

    pub fn set_phase(&mut self, id: ConnectionId, phase: Phase) {
        if let Some(conn) = self.connections.get_mut(&id) {
            conn.phase = phase;
        }
    }

    /// Forget `id`. Does not touch the waiting slot or pairing table.
    pub fn remove(&mut self, id: ConnectionId) -> Option<Connection> {
        self.connections.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn registered_count(&self) -> usize {
        self.connections
            .values()
            .filter(|c| c.phase != Phase::Unregistered)
            .count()
    }

    pub fn ids(&self) -> impl Iterator<Item = ConnectionId> + '_ {
        self.connections.keys().copied()
    }
}

/// Trim `raw` and check it against the length limit (in characters).
pub fn normalize_name(raw: &str, max_len: usize) -> Result<String, Rejection> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(Rejection::EmptyName);
    }
    if name.chars().count() > max_len {
        return Err(Rejection::NameTooLong { max: max_len });
    }
    Ok(name.to_string())
}
