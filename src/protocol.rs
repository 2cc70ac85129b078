use std::fmt;
use std::str::FromStr;

use crate::error::ProtocolError;

/// A client line, parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Nick(String),
    Join(String),
    Leave,
    Bye,
    Private { recipient: String, text: String },
    Message(String),
}

pub fn parse_command(line: &str) -> Result<Command, ProtocolError> {
    let Some(body) = line.strip_prefix('/') else {
        return Ok(Command::Message(line.to_string()));
    };

    // "//text" escapes a message that starts with a slash
    if body.starts_with('/') {
        return Ok(Command::Message(body.to_string()));
    }

    let (name, rest) = match body.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (body, ""),
    };

    let mut args = rest.split_whitespace();

    match name {
        "nick" => {
            let nick = args.next().ok_or(ProtocolError::MissingArgument("/nick <name>"))?;

            Ok(Command::Nick(nick.to_string()))
        }
        "join" => {
            let room = args.next().ok_or(ProtocolError::MissingArgument("/join <room>"))?;

            Ok(Command::Join(room.to_string()))
        }
        "leave" => no_args(rest, "/leave", Command::Leave),
        "bye" => no_args(rest, "/bye", Command::Bye),
        "priv" => {
            let usage = ProtocolError::MissingArgument("/priv <recipient> <text>");

            let (recipient, text) = match rest.split_once(char::is_whitespace) {
                Some((recipient, text)) => (recipient, text.trim()),
                None => (rest, ""),
            };

            if recipient.is_empty() || text.is_empty() {
                return Err(usage);
            }

            Ok(Command::Private {
                recipient: recipient.to_string(),
                text: text.to_string(),
            })
        }
        other => Err(ProtocolError::UnknownCommand(format!("/{other}"))),
    }
}

fn no_args(rest: &str, name: &'static str, cmd: Command) -> Result<Command, ProtocolError> {
    if rest.is_empty() {
        Ok(cmd)
    } else {
        Err(ProtocolError::UnexpectedArgument(name))
    }
}

/// A line sent from the server to a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Ok,
    Error,
    NewNick { old: String, new: String },
    Joined(String),
    Left(String),
    Bye,
    Message { nick: String, text: String },
    Private { nick: String, text: String },
}

impl Reply {
    /// Wire form, newline included.
    pub fn to_line(&self) -> String {
        format!("{self}\n")
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Ok => f.write_str("OK"),
            Reply::Error => f.write_str("ERROR"),
            Reply::NewNick { old, new } => write!(f, "NEWNICK {old} {new}"),
            Reply::Joined(nick) => write!(f, "JOINED {nick}"),
            Reply::Left(nick) => write!(f, "LEFT {nick}"),
            Reply::Bye => f.write_str("BYE"),
            Reply::Message { nick, text } => write!(f, "MESSAGE {nick} {text}"),
            Reply::Private { nick, text } => write!(f, "PRIVATE {nick} {text}"),
        }
    }
}

impl FromStr for Reply {
    type Err = ProtocolError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim_end_matches(['\r', '\n']);
        let malformed = || ProtocolError::MalformedReply(line.to_string());

        let (tag, rest) = line.split_once(' ').unwrap_or((line, ""));

        let one = |rest: &str| {
            if rest.is_empty() || rest.contains(' ') {
                Err(malformed())
            } else {
                Ok(rest.to_string())
            }
        };

        let nick_and_text = |rest: &str| {
            rest.split_once(' ')
                .filter(|(nick, _)| !nick.is_empty())
                .map(|(nick, text)| (nick.to_string(), text.to_string()))
                .ok_or_else(malformed)
        };

        match tag {
            "OK" if rest.is_empty() => Ok(Reply::Ok),
            "ERROR" if rest.is_empty() => Ok(Reply::Error),
            "BYE" if rest.is_empty() => Ok(Reply::Bye),
            "JOINED" => one(rest).map(Reply::Joined),
            "LEFT" => one(rest).map(Reply::Left),
            "NEWNICK" => {
                let (old, new) = rest.split_once(' ').ok_or_else(malformed)?;

                Ok(Reply::NewNick {
                    old: one(old)?,
                    new: one(new)?,
                })
            }
            "MESSAGE" => nick_and_text(rest).map(|(nick, text)| Reply::Message { nick, text }),
            "PRIVATE" => nick_and_text(rest).map(|(nick, text)| Reply::Private { nick, text }),
            _ => Err(malformed()),
        }
    }
}
