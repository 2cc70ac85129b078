//! Error types for the chat protocol.

use thiserror::Error;

/// A command that cannot be applied. Every variant is answered with a single
/// `ERROR` line and leaves the session untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("usage: {0}")]
    MissingArgument(&'static str),

    #[error("{0} takes no arguments")]
    UnexpectedArgument(&'static str),

    #[error("nickname '{0}' is already in use")]
    NicknameTaken(String),

    #[error("set a nickname first: /nick <name>")]
    NicknameRequired,

    #[error("join a room first: /join <room>")]
    NotInRoom,

    #[error("no such user: {0}")]
    UnknownRecipient(String),

    #[error("malformed server line: {0}")]
    MalformedReply(String),
}
