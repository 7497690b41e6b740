use crate::commands::executable::Executable;
use crate::commands::{CommandError, CommandParser};
use crate::frame::Frame;
use crate::store::Store;

/// Returns the score of member in the sorted set at key. If member does not exist in the sorted
/// set, or key does not exist, nil is returned.
///
/// Ref: <https://redis.io/docs/latest/commands/zscore/>
#[derive(Debug, PartialEq)]
pub struct ZScore {
    pub key: String,
    pub member: String,
}

impl Executable for ZScore {
    fn exec(self, store: &mut Store) -> Result<Frame, CommandError> {
        let score = store
            .zset(&self.key)
            .and_then(|zset| zset.score(&self.member));

        match score {
            Some(score) => Ok(Frame::bulk(score.to_string())),
            None => Ok(Frame::Null),
        }
    }
}

impl TryFrom<&mut CommandParser> for ZScore {
    type Error = CommandError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_string()?;
        let member = parser.next_string()?;

        Ok(Self { key, member })
    }
}
