pub mod del;
pub mod executable;
pub mod get;
pub mod set;

use std::str::FromStr;
use std::vec;
use thiserror::Error as ThisError;
use tracing::{debug, warn};

use crate::codec::{self, Verb};
use crate::commands::executable::Executable;
use crate::frame::Frame;
use crate::store::{Engine, StoreError};

use del::Del;
use get::Get;
use set::Set;

#[derive(Debug, PartialEq)]
pub enum Command {
    Del(Del),
    Get(Get),
    Set(Set),
    /// A verb the dispatcher does not know about. The codec already rejects these, so reaching
    /// this variant answers with an empty success payload.
    Noop,
}

impl Executable for Command {
    fn exec(self, engine: &dyn Engine) -> Result<Frame, CommandError> {
        match self {
            Command::Del(cmd) => cmd.exec(engine),
            Command::Get(cmd) => cmd.exec(engine),
            Command::Set(cmd) => cmd.exec(engine),
            Command::Noop => Ok(Frame::Ok(String::new())),
        }
    }
}

impl TryFrom<&codec::Command> for Command {
    type Error = CommandError;

    fn try_from(request: &codec::Command) -> Result<Self, Self::Error> {
        let parser = &mut CommandParser {
            verb: request.verb.clone(),
            parts: request.args.clone().into_iter(),
        };

        match Verb::from_str(&request.verb) {
            Ok(Verb::Del) => Del::try_from(parser).map(Command::Del),
            Ok(Verb::Get) => Get::try_from(parser).map(Command::Get),
            Ok(Verb::Set) => Set::try_from(parser).map(Command::Set),
            Err(_) => Ok(Command::Noop),
        }
    }
}

/// Maps a parsed request onto the engine and renders the result.
pub fn dispatch(request: &codec::Command, engine: &dyn Engine) -> Result<Frame, CommandError> {
    debug!(verb = %request.verb, args = ?request.args, "dispatching command");

    let result = Command::try_from(request).and_then(|cmd| cmd.exec(engine));
    if let Err(ref err) = result {
        warn!(verb = %request.verb, error = %err, "command failed");
    }

    result
}

pub struct CommandParser {
    verb: String,
    parts: vec::IntoIter<String>,
}

impl CommandParser {
    fn next_string(&mut self) -> Result<String, CommandError> {
        self.parts.next().ok_or(CommandError::EndOfStream)
    }

    /// Fails when arguments remain after the command consumed the ones it needs.
    fn finish(&mut self) -> Result<(), CommandError> {
        match self.parts.next() {
            None => Ok(()),
            Some(argument) => Err(CommandError::InvalidCommandArgument {
                command: self.verb.clone(),
                argument,
            }),
        }
    }
}

#[derive(Debug, ThisError, PartialEq)]
pub enum CommandError {
    #[error("key {key} not found")]
    NotFound { key: String },
    #[error("protocol error; invalid command argument {command} {argument}")]
    InvalidCommandArgument { command: String, argument: String },
    #[error("protocol error; attempting to extract a value failed due to the arguments being fully consumed")]
    EndOfStream,
}

impl From<StoreError> for CommandError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(key) => CommandError::NotFound { key },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;

    #[test]
    fn set_then_get() {
        let store = Store::new();

        let set = codec::parse("SET foo bar").unwrap();
        assert_eq!(dispatch(&set, &store), Ok(Frame::ok()));

        let get = codec::parse("GET foo").unwrap();
        assert_eq!(dispatch(&get, &store), Ok(Frame::Ok(String::from("bar"))));
    }

    #[test]
    fn delete_then_get() {
        let store = Store::new();

        dispatch(&codec::parse("SET foo bar").unwrap(), &store).unwrap();
        assert_eq!(
            dispatch(&codec::parse("DEL foo").unwrap(), &store),
            Ok(Frame::ok())
        );
        assert_eq!(
            dispatch(&codec::parse("GET foo").unwrap(), &store),
            Err(CommandError::NotFound {
                key: String::from("foo")
            })
        );
    }

    #[test]
    fn unknown_verb_is_a_noop() {
        let store = Store::new();
        let request = codec::Command::new("FLUSHALL", vec![]);

        assert_eq!(dispatch(&request, &store), Ok(Frame::Ok(String::new())));
        assert_eq!(store.size(), 0);
    }

    #[test]
    fn extra_argument() {
        let store = Store::new();
        let request = codec::Command::new("GET", vec!["a".to_string(), "b".to_string()]);

        assert_eq!(
            dispatch(&request, &store),
            Err(CommandError::InvalidCommandArgument {
                command: String::from("GET"),
                argument: String::from("b")
            })
        );
    }

    #[test]
    fn not_found_does_not_leak_store_error() {
        let err = CommandError::from(StoreError::NotFound(String::from("foo")));

        assert_eq!(
            err,
            CommandError::NotFound {
                key: String::from("foo")
            }
        );
        assert_eq!(err.to_string(), "key foo not found");
    }
}
