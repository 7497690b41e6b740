use crate::commands::executable::Executable;
use crate::commands::{CommandError, CommandParser};
use crate::frame::Frame;
use crate::store::Store;
use crate::zset::ZAddFlags;

/// Adds all the specified members with the specified scores to the sorted set stored at key,
/// updating the score of members that already exist. Replies with the number of members added or
/// updated.
///
/// Scores are validated pair by pair while they are applied: a bad score in the third pair leaves
/// the first two pairs in place.
///
/// Ref: <https://redis.io/docs/latest/commands/zadd/>
#[derive(Debug, PartialEq)]
pub struct ZAdd {
    pub key: String,
    pub flags: ZAddFlags,
    /// Raw `(score, member)` pairs, in argument order.
    pub pairs: Vec<(String, String)>,
}

impl Executable for ZAdd {
    fn exec(self, store: &mut Store) -> Result<Frame, CommandError> {
        let zset = store.zset_or_default(&self.key);
        let mut changed = 0;
        let mut res = Ok(());

        for (score, member) in &self.pairs {
            let score = match parse_score(score) {
                Some(score) => score,
                None => {
                    res = Err(CommandError::NotAFloat {
                        command: "zadd".to_string(),
                    });
                    break;
                }
            };

            if zset.add(score, member, self.flags).changed() {
                changed += 1;
            }
        }

        // XX on a new key, or a bad first score, must not leave an empty set behind.
        store.remove_if_empty(&self.key);

        res.map(|()| Frame::Integer(changed))
    }
}

impl TryFrom<&mut CommandParser> for ZAdd {
    type Error = CommandError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_string()?;

        let mut flags = ZAddFlags::default();
        while let Some(arg) = parser.peek() {
            match arg.to_lowercase().as_str() {
                "nx" => flags.nx = true,
                "xx" => flags.xx = true,
                _ => break,
            }
            parser.next_string()?;
        }

        if flags.nx && flags.xx {
            return Err(CommandError::IncompatibleFlags {
                command: "zadd".to_string(),
            });
        }

        let rest = parser.rest();
        if rest.len() < 2 {
            return Err(parser.wrong_arity());
        }
        if rest.len() % 2 == 1 {
            return Err(parser.syntax_error());
        }

        let mut rest = rest.into_iter();
        let mut pairs = Vec::with_capacity(rest.len() / 2);
        while let (Some(score), Some(member)) = (rest.next(), rest.next()) {
            pairs.push((score, member));
        }

        Ok(Self { key, flags, pairs })
    }
}

/// Parses a score. NaN is rejected and negative zero folds into zero, so every accepted score
/// has a single position in the set's order.
fn parse_score(s: &str) -> Option<f64> {
    match s.parse::<f64>() {
        Ok(score) if !score.is_nan() => Some(score + 0.0),
        _ => None,
    }
}
