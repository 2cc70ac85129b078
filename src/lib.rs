//! Line-oriented chat server: nicknames, named rooms, room broadcast and
//! private messages over plain TCP.

pub mod conn;
pub mod error;
pub mod framer;
pub mod logger;
pub mod protocol;
pub mod registry;
pub mod room;
pub mod server;
pub mod session;
pub mod state;

pub use error::ProtocolError;
pub use protocol::{Command, Reply};
pub use server::Server;
