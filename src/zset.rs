//! Sorted set: a member→score dictionary kept in lockstep with a [`Skiplist`] ordered by
//! `(score, member)`.

use std::collections::HashMap;
use std::sync::Arc;

use crate::skiplist::Skiplist;

/// Conditional-write modifiers accepted by ZADD.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ZAddFlags {
    /// Only add new members, never update existing ones.
    pub nx: bool,
    /// Only update existing members, never add new ones.
    pub xx: bool,
}

/// What a single [`SortedSet::add`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    Updated,
    /// Nothing changed: blocked by a flag, same score, or an empty member.
    Nop,
}

impl AddOutcome {
    pub fn changed(self) -> bool {
        self != AddOutcome::Nop
    }
}

#[derive(Debug, Default)]
pub struct SortedSet {
    dict: HashMap<Arc<str>, f64>,
    skiplist: Skiplist,
}

impl SortedSet {
    pub fn new() -> SortedSet {
        SortedSet::default()
    }

    pub fn add(&mut self, score: f64, member: &str, flags: ZAddFlags) -> AddOutcome {
        if member.is_empty() {
            return AddOutcome::Nop;
        }

        if let Some(current) = self.dict.get_mut(member) {
            if flags.nx || *current == score {
                return AddOutcome::Nop;
            }

            // The dictionary entry exists, so the node does too.
            if let Some(node) = self.skiplist.update_score(*current, member, score) {
                *current = self.skiplist.score(node);
            }
            return AddOutcome::Updated;
        }

        if flags.xx {
            return AddOutcome::Nop;
        }

        let member: Arc<str> = Arc::from(member);
        let node = self.skiplist.insert(score, member.clone());
        self.dict.insert(member, self.skiplist.score(node));
        AddOutcome::Added
    }

    /// Removes `member`, returning whether it was present.
    pub fn remove(&mut self, member: &str) -> bool {
        match self.dict.remove(member) {
            Some(score) => self.skiplist.delete(score, member),
            None => false,
        }
    }

    pub fn score(&self, member: &str) -> Option<f64> {
        self.dict.get(member).copied()
    }

    /// 0-based rank of `member`, ascending by default or descending when `reverse` is set.
    pub fn rank(&self, member: &str, reverse: bool) -> Option<usize> {
        let score = self.score(member)?;
        let rank = self.skiplist.rank(score, member)?;

        if reverse {
            Some(self.skiplist.len() - rank)
        } else {
            Some(rank - 1)
        }
    }

    /// Members whose 0-based ascending rank lies in `start..=stop`. Negative indices count from the
    /// end of the set.
    pub fn range(&self, start: i64, stop: i64) -> Vec<(Arc<str>, f64)> {
        let len = self.len() as i64;
        let start = if start < 0 { (len + start).max(0) } else { start };
        let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };

        if start > stop || start >= len {
            return Vec::new();
        }

        let first = self.skiplist.get_by_rank(start as usize + 1);
        self.skiplist
            .iter_from(first)
            .take((stop - start + 1) as usize)
            .map(|(member, score)| (Arc::from(member), score))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.dict.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dict.is_empty()
    }
}
