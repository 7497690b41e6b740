use crate::commands::executable::Executable;
use crate::commands::{CommandError, CommandParser};
use crate::frame::Frame;
use crate::store::Store;

/// Returns the rank of member in the sorted set stored at key. ZRANK orders members from the
/// lowest to the highest score, ZREVRANK from the highest to the lowest. Ties are ordered by
/// member. Replies with nil if the key or the member does not exist.
///
/// Ref: <https://redis.io/docs/latest/commands/zrank/>
#[derive(Debug, PartialEq)]
pub struct ZRank {
    pub key: String,
    pub member: String,
    pub reverse: bool,
}

impl ZRank {
    pub(crate) fn parse(parser: &mut CommandParser, reverse: bool) -> Result<Self, CommandError> {
        let key = parser.next_string()?;
        let member = parser.next_string()?;

        Ok(Self {
            key,
            member,
            reverse,
        })
    }
}

impl Executable for ZRank {
    fn exec(self, store: &mut Store) -> Result<Frame, CommandError> {
        let rank = store
            .zset(&self.key)
            .and_then(|zset| zset.rank(&self.member, self.reverse));

        match rank {
            Some(rank) => Ok(Frame::Integer(rank as i64)),
            None => Ok(Frame::Null),
        }
    }
}
