use crate::commands::executable::Executable;
use crate::commands::{CommandError, CommandParser};
use crate::frame::Frame;
use crate::store::Store;

/// Returns the number of members in the sorted set stored at key, or 0 if the key does not exist.
///
/// Ref: <https://redis.io/docs/latest/commands/zcard/>
#[derive(Debug, PartialEq)]
pub struct ZCard {
    pub key: String,
}

impl Executable for ZCard {
    fn exec(self, store: &mut Store) -> Result<Frame, CommandError> {
        let len = store.zset(&self.key).map_or(0, |zset| zset.len());

        Ok(Frame::Integer(len as i64))
    }
}

impl TryFrom<&mut CommandParser> for ZCard {
    type Error = CommandError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_string()?;
        Ok(Self { key })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::tests::{command, run};
    use crate::commands::Request;

    #[test]
    fn existing_key() {
        let cmd = Request::try_from(command(&["ZCARD", "key1"])).unwrap();

        assert_eq!(
            cmd,
            Request::ZCard(ZCard {
                key: String::from("key1")
            })
        );

        let mut store = Store::new();
        run(&mut store, &["ZADD", "key1", "1", "a", "2", "b"]);

        assert_eq!(cmd.exec(&mut store).unwrap(), Frame::Integer(2));
    }

    #[test]
    fn missing_key() {
        let mut store = Store::new();

        assert_eq!(run(&mut store, &["ZCARD", "key1"]), Frame::Integer(0));
    }

    #[test]
    fn missing_argument() {
        let err = Request::try_from(command(&["ZCARD"])).unwrap_err();

        assert_eq!(
            err,
            CommandError::WrongArity {
                command: "zcard".to_string()
            }
        );
    }
}
