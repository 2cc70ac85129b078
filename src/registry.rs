use std::collections::HashMap;

use crate::conn::ConnId;
use crate::error::ProtocolError;
use crate::session::Session;

/// Live sessions, keyed by connection, plus a nickname index kept in step
/// with every rename and removal.
#[derive(Debug, Default)]
pub struct Registry {
    sessions: HashMap<ConnId, Session>,
    nicknames: HashMap<String, ConnId>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: ConnId) {
        self.sessions.insert(id, Session::new());
    }

    /// Drops the session and frees its nickname.
    pub fn remove(&mut self, id: ConnId) -> Option<Session> {
        let session = self.sessions.remove(&id)?;

        if let Some(nick) = &session.nickname {
            self.nicknames.remove(nick);
        }

        Some(session)
    }

    pub fn get(&self, id: ConnId) -> Option<&Session> {
        self.sessions.get(&id)
    }

    pub fn get_mut(&mut self, id: ConnId) -> Option<&mut Session> {
        self.sessions.get_mut(&id)
    }

    pub fn lookup(&self, nick: &str) -> Option<ConnId> {
        self.nicknames.get(nick).copied()
    }

    /// Claims `nick` for `id`, releasing its previous nickname. Returns the
    /// previous nickname. First holder wins; matching is case-sensitive.
    pub fn rename(&mut self, id: ConnId, nick: &str) -> Result<Option<String>, ProtocolError> {
        if self.lookup(nick).is_some_and(|holder| holder != id) {
            return Err(ProtocolError::NicknameTaken(nick.to_string()));
        }

        let Some(session) = self.sessions.get_mut(&id) else {
            return Ok(None);
        };

        let old = session.nickname.replace(nick.to_string());

        if let Some(old) = &old {
            self.nicknames.remove(old);
        }
        self.nicknames.insert(nick.to_string(), id);

        Ok(old)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn ids(&self) -> Vec<ConnId> {
        self.sessions.keys().copied().collect()
    }
}
