use crate::commands::executable::Executable;
use crate::commands::{CommandError, CommandParser};
use crate::frame::Frame;
use crate::store::Store;

/// Removes the specified members from the sorted set stored at key. Non existing members are
/// ignored. The key is deleted once its last member is gone.
///
/// Ref: <https://redis.io/docs/latest/commands/zrem/>
#[derive(Debug, PartialEq)]
pub struct ZRem {
    pub key: String,
    pub members: Vec<String>,
}

impl Executable for ZRem {
    fn exec(self, store: &mut Store) -> Result<Frame, CommandError> {
        let Some(zset) = store.zset_mut(&self.key) else {
            return Ok(Frame::Integer(0));
        };

        let mut count = 0;
        for member in &self.members {
            if zset.remove(member) {
                count += 1;
            }
            if zset.is_empty() {
                break;
            }
        }

        store.remove_if_empty(&self.key);

        Ok(Frame::Integer(count))
    }
}

impl TryFrom<&mut CommandParser> for ZRem {
    type Error = CommandError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_string()?;
        let members = parser.rest();

        if members.is_empty() {
            return Err(parser.wrong_arity());
        }

        Ok(Self { key, members })
    }
}
