use crate::commands::executable::Executable;
use crate::commands::{CommandError, CommandParser};
use crate::frame::Frame;
use crate::store::Store;

/// Returns the members of the sorted set at key whose ascending rank lies between start and stop,
/// both inclusive. Negative indices count from the end, -1 being the last member. With
/// WITHSCORES every member is followed by its score.
///
/// Ref: <https://redis.io/docs/latest/commands/zrange/>
#[derive(Debug, PartialEq)]
pub struct ZRange {
    pub key: String,
    pub start: i64,
    pub stop: i64,
    pub with_scores: bool,
}

impl Executable for ZRange {
    fn exec(self, store: &mut Store) -> Result<Frame, CommandError> {
        let Some(zset) = store.zset(&self.key) else {
            return Ok(Frame::Array(vec![]));
        };

        let mut frames = vec![];
        for (member, score) in zset.range(self.start, self.stop) {
            frames.push(Frame::bulk(member.to_string()));
            if self.with_scores {
                frames.push(Frame::bulk(score.to_string()));
            }
        }

        Ok(Frame::Array(frames))
    }
}

impl TryFrom<&mut CommandParser> for ZRange {
    type Error = CommandError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_string()?;
        let start = parser.next_integer()?;
        let stop = parser.next_integer()?;

        let with_scores = match parser.peek() {
            None => false,
            Some(arg) if arg.eq_ignore_ascii_case("withscores") => {
                parser.next_string()?;
                true
            }
            Some(_) => return Err(parser.syntax_error()),
        };

        Ok(Self {
            key,
            start,
            stop,
            with_scores,
        })
    }
}
