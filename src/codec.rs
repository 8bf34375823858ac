use std::str::FromStr;
use strum_macros::{Display, EnumString};
use thiserror::Error as ThisError;

/// The verbs understood by the line protocol. Matching is case-sensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Verb {
    Set,
    Get,
    Del,
}

impl Verb {
    /// Number of arguments that must follow the verb.
    pub fn arity(self) -> usize {
        match self {
            Verb::Set => 2,
            Verb::Get | Verb::Del => 1,
        }
    }
}

/// A single request line split into its verb and ordered arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub verb: String,
    pub args: Vec<String>,
}

impl Command {
    pub fn new(verb: impl Into<String>, args: Vec<String>) -> Command {
        Command {
            verb: verb.into(),
            args,
        }
    }
}

#[derive(Debug, ThisError, PartialEq)]
pub enum ParseError {
    #[error("protocol error; empty input")]
    EmptyInput,
    #[error("protocol error; {verb} requires {expected} argument(s), got {actual}")]
    Arity {
        verb: Verb,
        expected: usize,
        actual: usize,
    },
    #[error("protocol error; unknown command {verb}")]
    UnknownCommand { verb: String },
}

/// Tokenizes one line of input on whitespace runs and validates the arity of the verb.
pub fn parse(line: &str) -> Result<Command, ParseError> {
    let mut fields = line.split_whitespace();

    let name = fields.next().ok_or(ParseError::EmptyInput)?;
    let verb = Verb::from_str(name).map_err(|_| ParseError::UnknownCommand {
        verb: name.to_string(),
    })?;

    let args: Vec<String> = fields.map(str::to_string).collect();
    if args.len() != verb.arity() {
        return Err(ParseError::Arity {
            verb,
            expected: verb.arity(),
            actual: args.len(),
        });
    }

    Ok(Command::new(name, args))
}
