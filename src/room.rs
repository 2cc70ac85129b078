use std::collections::{HashMap, HashSet};

use crate::conn::ConnId;

#[derive(Debug, Default)]
pub struct Room {
    members: HashSet<ConnId>,
}

impl Room {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: ConnId) {
        self.members.insert(id);
    }

    pub fn remove(&mut self, id: ConnId) {
        self.members.remove(&id);
    }

    pub fn contains(&self, id: ConnId) -> bool {
        self.members.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Room name to member set. Rooms appear on first join and are kept after
/// they empty out; an empty room is indistinguishable from a missing one.
#[derive(Debug, Default)]
pub struct RoomDirectory {
    rooms: HashMap<String, Room>,
}

impl RoomDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `id` to `name`, creating the room if needed. Returns the members
    /// that were already there.
    pub fn join(&mut self, name: &str, id: ConnId) -> Vec<ConnId> {
        let room = self.rooms.entry(name.to_string()).or_insert_with(Room::new);

        let existing = room.members.iter().copied().filter(|m| *m != id).collect();
        room.insert(id);

        existing
    }

    /// Removes `id` from `name` and returns the members left behind.
    pub fn leave(&mut self, name: &str, id: ConnId) -> Vec<ConnId> {
        match self.rooms.get_mut(name) {
            Some(room) => {
                room.remove(id);
                room.members.iter().copied().collect()
            }
            None => Vec::new(),
        }
    }

    /// Broadcast targets: every member of `name` except `except`.
    pub fn members(&self, name: &str, except: Option<ConnId>) -> Vec<ConnId> {
        self.rooms
            .get(name)
            .map(|room| {
                room.members
                    .iter()
                    .copied()
                    .filter(|m| Some(*m) != except)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn get_room(&self, name: &str) -> Option<&Room> {
        self.rooms.get(name)
    }

    pub fn list_rooms(&self) -> Vec<(String, usize)> {
        self.rooms
            .iter()
            .map(|(name, room)| (name.clone(), room.len()))
            .collect()
    }
}
