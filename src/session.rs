use crate::framer::LineFramer;

/// Where a session stands in the protocol. `InRoom` carries the room name, so
/// a session has a current room exactly when it is in one.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Unnamed,
    Named,
    InRoom(String),
}

/// Per-connection protocol state.
#[derive(Debug, Default)]
pub struct Session {
    pub nickname: Option<String>,
    pub state: SessionState,
    pub framer: LineFramer,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_room(&self) -> Option<&str> {
        match &self.state {
            SessionState::InRoom(room) => Some(room),
            _ => None,
        }
    }
}
