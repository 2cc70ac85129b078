use tracing::debug;

use crate::conn::ConnId;
use crate::error::ProtocolError;
use crate::protocol::{Command, Reply, parse_command};
use crate::registry::Registry;
use crate::room::RoomDirectory;
use crate::session::SessionState;

/// Lines to deliver and connections to close, in the order they were produced.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Outbox {
    pub deliveries: Vec<(ConnId, Reply)>,
    pub closing: Vec<ConnId>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn send(&mut self, to: ConnId, reply: Reply) {
        self.deliveries.push((to, reply));
    }

    pub fn broadcast(&mut self, targets: Vec<ConnId>, reply: Reply) {
        for to in targets {
            self.deliveries.push((to, reply.clone()));
        }
    }

    pub fn close(&mut self, id: ConnId) {
        self.closing.push(id);
    }

    pub fn is_empty(&self) -> bool {
        self.deliveries.is_empty() && self.closing.is_empty()
    }
}

/// All protocol state of the server. Owned by the event loop and never shared.
#[derive(Debug, Default)]
pub struct ServerState {
    registry: Registry,
    rooms: RoomDirectory,
}

impl ServerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn rooms(&self) -> &RoomDirectory {
        &self.rooms
    }

    pub fn connect(&mut self, id: ConnId) {
        self.registry.insert(id);
    }

    /// Runs freshly read bytes through the connection's framer and dispatches
    /// every completed line. Lines after a `/bye` are dropped.
    pub fn feed(&mut self, id: ConnId, bytes: &[u8]) -> Outbox {
        let mut out = Outbox::new();

        let Some(session) = self.registry.get_mut(id) else {
            return out;
        };

        for line in session.framer.feed(bytes) {
            if self.registry.get(id).is_none() {
                break;
            }

            self.handle_line(id, &line, &mut out);
        }

        out
    }

    pub fn handle_line(&mut self, id: ConnId, line: &str, out: &mut Outbox) {
        let result = parse_command(line).and_then(|cmd| self.apply(id, cmd, out));

        if let Err(err) = result {
            debug!(conn = %id, %err, "command rejected");
            out.send(id, Reply::Error);
        }
    }

    /// Tears down a session that went away without `/bye`.
    pub fn disconnect(&mut self, id: ConnId) -> Outbox {
        let mut out = Outbox::new();

        let leaving = self.registry.get(id).and_then(|session| {
            Some((session.nickname.clone()?, session.current_room()?.to_string()))
        });

        if let Some((nick, room)) = leaving {
            self.leave_room(id, &room, &nick, &mut out);
        }

        self.registry.remove(id);

        out
    }

    fn apply(&mut self, id: ConnId, cmd: Command, out: &mut Outbox) -> Result<(), ProtocolError> {
        let Some(session) = self.registry.get(id) else {
            return Ok(());
        };

        let nickname = session.nickname.clone();
        let state = session.state.clone();

        match cmd {
            Command::Nick(name) => {
                let old = self.registry.rename(id, &name)?;

                match (&state, old) {
                    (SessionState::InRoom(room), Some(old)) if old != name => {
                        let targets = self.rooms.members(room, Some(id));
                        out.broadcast(targets, Reply::NewNick { old, new: name });
                    }
                    (SessionState::Unnamed, _) => self.set_state(id, SessionState::Named),
                    _ => {}
                }

                out.send(id, Reply::Ok);
            }

            Command::Join(room) => {
                let nick = nickname.ok_or(ProtocolError::NicknameRequired)?;

                if let SessionState::InRoom(old) = &state {
                    self.leave_room(id, old, &nick, out);
                }

                let existing = self.rooms.join(&room, id);
                out.broadcast(existing, Reply::Joined(nick));

                self.set_state(id, SessionState::InRoom(room));
                out.send(id, Reply::Ok);
            }

            Command::Leave => {
                let SessionState::InRoom(room) = &state else {
                    return Err(ProtocolError::NotInRoom);
                };
                let nick = nickname.ok_or(ProtocolError::NicknameRequired)?;

                self.leave_room(id, room, &nick, out);

                self.set_state(id, SessionState::Named);
                out.send(id, Reply::Ok);
            }

            Command::Bye => {
                if let (SessionState::InRoom(room), Some(nick)) = (&state, &nickname) {
                    self.leave_room(id, room, nick, out);
                }

                self.registry.remove(id);

                out.send(id, Reply::Bye);
                out.close(id);
            }

            Command::Private { recipient, text } => {
                let nick = nickname.ok_or(ProtocolError::NicknameRequired)?;
                let to = self
                    .registry
                    .lookup(&recipient)
                    .ok_or(ProtocolError::UnknownRecipient(recipient))?;

                out.send(to, Reply::Private { nick, text });
                out.send(id, Reply::Ok);
            }

            Command::Message(text) => {
                let SessionState::InRoom(room) = &state else {
                    return Err(ProtocolError::NotInRoom);
                };
                let nick = nickname.ok_or(ProtocolError::NicknameRequired)?;

                let targets = self.rooms.members(room, Some(id));
                out.broadcast(targets, Reply::Message { nick, text });
            }
        }

        Ok(())
    }

    /// Removes `id` from `room` and tells whoever is left. Never replies to
    /// the leaver and does not touch its session state.
    fn leave_room(&mut self, id: ConnId, room: &str, nick: &str, out: &mut Outbox) {
        let remaining = self.rooms.leave(room, id);
        out.broadcast(remaining, Reply::Left(nick.to_string()));
    }

    fn set_state(&mut self, id: ConnId, state: SessionState) {
        if let Some(session) = self.registry.get_mut(id) {
            session.state = state;
        }
    }
}
