pub mod executable;
pub mod ping;
pub mod zadd;
pub mod zcard;
pub mod zrange;
pub mod zrank;
pub mod zrem;
pub mod zscore;

use std::str::FromStr;
use std::vec;
use strum_macros::{Display, EnumString, IntoStaticStr};
use thiserror::Error as ThisError;

use crate::command::Command;
use crate::commands::executable::Executable;
use crate::frame::Frame;
use crate::store::Store;

use ping::Ping;
use zadd::ZAdd;
use zcard::ZCard;
use zrange::ZRange;
use zrank::ZRank;
use zrem::ZRem;
use zscore::ZScore;

/// The command table. Names are matched exactly, so callers upper-case them first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "UPPERCASE")]
pub enum CommandName {
    Ping,
    Zadd,
    Zcard,
    Zrange,
    Zrank,
    Zrem,
    Zrevrank,
    Zscore,
}

#[derive(Debug, PartialEq)]
pub enum Request {
    Ping(Ping),
    ZAdd(ZAdd),
    ZCard(ZCard),
    ZRange(ZRange),
    ZRank(ZRank),
    ZRem(ZRem),
    ZScore(ZScore),
}

impl Executable for Request {
    fn exec(self, store: &mut Store) -> Result<Frame, CommandError> {
        match self {
            Request::Ping(cmd) => cmd.exec(store),
            Request::ZAdd(cmd) => cmd.exec(store),
            Request::ZCard(cmd) => cmd.exec(store),
            Request::ZRange(cmd) => cmd.exec(store),
            Request::ZRank(cmd) => cmd.exec(store),
            Request::ZRem(cmd) => cmd.exec(store),
            Request::ZScore(cmd) => cmd.exec(store),
        }
    }
}

impl TryFrom<Command> for Request {
    type Error = CommandError;

    fn try_from(cmd: Command) -> Result<Self, Self::Error> {
        let name = CommandName::from_str(&cmd.name).map_err(|_| CommandError::UnknownCommand {
            command: cmd.name.clone(),
        })?;

        let parser = &mut CommandParser::new(name, cmd.args);

        let request = match name {
            CommandName::Ping => Ping::try_from(&mut *parser).map(Request::Ping),
            CommandName::Zadd => ZAdd::try_from(&mut *parser).map(Request::ZAdd),
            CommandName::Zcard => ZCard::try_from(&mut *parser).map(Request::ZCard),
            CommandName::Zrange => ZRange::try_from(&mut *parser).map(Request::ZRange),
            CommandName::Zrank => ZRank::parse(parser, false).map(Request::ZRank),
            CommandName::Zrevrank => ZRank::parse(parser, true).map(Request::ZRank),
            CommandName::Zrem => ZRem::try_from(&mut *parser).map(Request::ZRem),
            CommandName::Zscore => ZScore::try_from(&mut *parser).map(Request::ZScore),
        }?;

        parser.finish()?;

        Ok(request)
    }
}

/// Routes `cmd` to its handler and runs it against `store`.
///
/// Validation failures come back as error frames. Unknown command names yield `None`, leaving it
/// to the caller to decide how to answer them.
pub fn dispatch(cmd: Command, store: &mut Store) -> Option<Frame> {
    let res = match Request::try_from(cmd) {
        Ok(request) => request.exec(store),
        Err(CommandError::UnknownCommand { .. }) => return None,
        Err(err) => Err(err),
    };

    Some(res.unwrap_or_else(|err| Frame::Error(err.to_string())))
}

pub(crate) struct CommandParser {
    command: &'static str,
    args: vec::IntoIter<String>,
}

impl CommandParser {
    fn new(name: CommandName, args: Vec<String>) -> CommandParser {
        CommandParser {
            command: name.into(),
            args: args.into_iter(),
        }
    }

    fn next_string(&mut self) -> Result<String, CommandError> {
        self.args.next().ok_or_else(|| self.wrong_arity())
    }

    fn next_integer(&mut self) -> Result<i64, CommandError> {
        self.next_string()?
            .parse::<i64>()
            .map_err(|_| CommandError::NotAnInteger {
                command: self.command.to_lowercase(),
            })
    }

    fn peek(&self) -> Option<&str> {
        self.args.as_slice().first().map(String::as_str)
    }

    /// Takes every argument left.
    fn rest(&mut self) -> Vec<String> {
        self.args.by_ref().collect()
    }

    fn is_empty(&self) -> bool {
        self.args.len() == 0
    }

    /// Fails if arguments are left over.
    fn finish(&self) -> Result<(), CommandError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self.wrong_arity())
        }
    }

    fn wrong_arity(&self) -> CommandError {
        CommandError::WrongArity {
            command: self.command.to_lowercase(),
        }
    }

    fn syntax_error(&self) -> CommandError {
        CommandError::Syntax {
            command: self.command.to_lowercase(),
        }
    }
}

#[derive(Debug, ThisError, PartialEq)]
pub enum CommandError {
    #[error("ERR unknown command '{command}'")]
    UnknownCommand { command: String },
    #[error("ERR wrong number of arguments for '{command}' command")]
    WrongArity { command: String },
    #[error("ERR value is not a valid float for '{command}' command")]
    NotAFloat { command: String },
    #[error("ERR value is not an integer or out of range for '{command}' command")]
    NotAnInteger { command: String },
    #[error("ERR XX and NX options at the same time are not compatible for '{command}' command")]
    IncompatibleFlags { command: String },
    #[error("ERR syntax error for '{command}' command")]
    Syntax { command: String },
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use bytes::Bytes;

    /// Builds a command the way it arrives off the wire.
    pub(crate) fn command(parts: &[&str]) -> Command {
        let frame = Frame::Array(
            parts
                .iter()
                .map(|part| Frame::Bulk(Bytes::copy_from_slice(part.as_bytes())))
                .collect(),
        );
        Command::try_from(frame).unwrap()
    }

    pub(crate) fn run(store: &mut Store, parts: &[&str]) -> Frame {
        dispatch(command(parts), store).unwrap()
    }

    #[test]
    fn names_are_matched_exactly() {
        assert_eq!(CommandName::from_str("ZADD"), Ok(CommandName::Zadd));
        assert_eq!(CommandName::from_str("ZREVRANK"), Ok(CommandName::Zrevrank));
        assert!(CommandName::from_str("zadd").is_err());
        assert_eq!(CommandName::Zscore.to_string(), "ZSCORE");
    }

    #[test]
    fn unknown_command_dispatches_to_nothing() {
        let mut store = Store::new();

        assert_eq!(dispatch(command(&["FLUSHALL"]), &mut store), None);

        let cmd = Command {
            name: "zadd".to_string(),
            args: vec![],
        };
        assert_eq!(dispatch(cmd, &mut store), None);
    }

    #[test]
    fn lowercase_input_is_normalised_before_dispatch() {
        let mut store = Store::new();

        assert_eq!(run(&mut store, &["ping"]), Frame::simple("PONG"));
    }

    #[test]
    fn leaderboard_scenario() {
        let mut store = Store::new();

        assert_eq!(
            run(
                &mut store,
                &["ZADD", "leaderboard", "100", "alice", "80", "bob", "95", "carol"]
            ),
            Frame::Integer(3)
        );
        assert_eq!(
            run(&mut store, &["ZSCORE", "leaderboard", "alice"]),
            Frame::bulk("100")
        );
        assert_eq!(
            run(&mut store, &["ZRANK", "leaderboard", "bob"]),
            Frame::Integer(0)
        );
        assert_eq!(run(&mut store, &["ZCARD", "leaderboard"]), Frame::Integer(3));
        assert_eq!(
            run(&mut store, &["ZREM", "leaderboard", "bob"]),
            Frame::Integer(1)
        );
        assert_eq!(run(&mut store, &["ZCARD", "leaderboard"]), Frame::Integer(2));
    }

    #[test]
    fn extra_arguments_are_rejected() {
        let mut store = Store::new();

        assert_eq!(
            run(&mut store, &["ZCARD", "a", "b"]),
            Frame::error("ERR wrong number of arguments for 'zcard' command")
        );
    }
}
