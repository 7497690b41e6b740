//! Rank-indexed skiplist ordered by `(score, member)`.
//!
//! Nodes live in an arena and link to each other by [`NodeId`]. Slot `0` is the head sentinel,
//! which carries [`MAX_LEVEL`] levels and is never counted as a member.
//!
//! Every forward link stores a `span`: the number of level-0 nodes it skips to reach its target.
//! When a link has no target, the span counts the nodes remaining until the end of the list.
//! Summing the spans walked on the way to a node yields its 1-based rank.
//!
//! ```text
//! level 1: head span=2 ------------------------> C span=0 --> nil
//! level 0: head span=1 --> A span=1 --> B span=1 --> C span=0 --> nil
//!                 nil <--- A <--------- B <--------- C (backward)
//! ```

use rand::Rng;
use std::cmp::Ordering;
use std::sync::Arc;

pub const MAX_LEVEL: usize = 32;

const HEAD: NodeId = NodeId(0);

/// Handle to a node in the skiplist arena. Handles are invalidated when the node is deleted; the
/// slot may be reused by a later insertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Clone, Default)]
struct Level {
    forward: Option<NodeId>,
    span: usize,
}

#[derive(Debug)]
struct Node {
    member: Arc<str>,
    score: f64,
    // Level-0 predecessor. `None` for the first node, never points at the head.
    backward: Option<NodeId>,
    levels: Vec<Level>,
}

#[derive(Debug)]
pub struct Skiplist {
    nodes: Vec<Node>,
    free: Vec<NodeId>,
    tail: Option<NodeId>,
    length: usize,
    level: usize,
}

impl Skiplist {
    pub fn new() -> Skiplist {
        let head = Node {
            member: Arc::from(""),
            score: 0.0,
            backward: None,
            levels: vec![Level::default(); MAX_LEVEL],
        };

        Skiplist {
            nodes: vec![head],
            free: Vec::new(),
            tail: None,
            length: 0,
            level: 1,
        }
    }

    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Highest level currently populated.
    pub fn level(&self) -> usize {
        self.level
    }

    pub fn first(&self) -> Option<NodeId> {
        self.forward(HEAD, 0)
    }

    pub fn last(&self) -> Option<NodeId> {
        self.tail
    }

    pub fn score(&self, id: NodeId) -> f64 {
        self.nodes[id.0].score
    }

    pub fn member(&self, id: NodeId) -> &Arc<str> {
        &self.nodes[id.0].member
    }

    /// Iterates `(member, score)` pairs in ascending order.
    pub fn iter(&self) -> Iter<'_> {
        self.iter_from(self.first())
    }

    /// Iterates from `start` (inclusive) to the end of the list.
    pub fn iter_from(&self, start: Option<NodeId>) -> Iter<'_> {
        Iter {
            list: self,
            next: start,
        }
    }

    /// Inserts a new node. The caller guarantees that `(score, member)` is not already present.
    pub fn insert(&mut self, score: f64, member: Arc<str>) -> NodeId {
        let level = random_level();
        self.insert_at_level(score, member, level)
    }

    fn insert_at_level(&mut self, score: f64, member: Arc<str>, level: usize) -> NodeId {
        // `update[i]` is the last node at level `i` ordered before the new node, `rank[i]` is its
        // distance from the head.
        let mut update = [HEAD; MAX_LEVEL];
        let mut rank = [0usize; MAX_LEVEL];
        let mut x = HEAD;

        for i in (0..self.level).rev() {
            rank[i] = if i == self.level - 1 { 0 } else { rank[i + 1] };

            while let Some(next) = self.forward(x, i) {
                if self.compare(next, score, &member) != Ordering::Less {
                    break;
                }
                rank[i] += self.nodes[x.0].levels[i].span;
                x = next;
            }

            update[i] = x;
        }

        if level > self.level {
            for i in self.level..level {
                rank[i] = 0;
                update[i] = HEAD;
                self.nodes[HEAD.0].levels[i].span = self.length;
            }
            self.level = level;
        }

        let id = self.alloc(Node {
            member,
            score,
            backward: None,
            levels: vec![Level::default(); level],
        });

        for i in 0..level {
            let prev = update[i];
            let distance = rank[0] - rank[i];
            let Level { forward, span } = self.nodes[prev.0].levels[i].clone();

            self.nodes[id.0].levels[i] = Level {
                forward,
                span: span - distance,
            };
            self.nodes[prev.0].levels[i] = Level {
                forward: Some(id),
                span: distance + 1,
            };
        }

        // The new node now sits inside the range skipped by the untouched upper levels.
        for i in level..self.level {
            self.nodes[update[i].0].levels[i].span += 1;
        }

        self.nodes[id.0].backward = if update[0] == HEAD {
            None
        } else {
            Some(update[0])
        };

        match self.nodes[id.0].levels[0].forward {
            Some(next) => self.nodes[next.0].backward = Some(id),
            None => self.tail = Some(id),
        }

        self.length += 1;
        id
    }

    /// Moves the node `(current, member)` to `new_score`. When the node's level-0 neighbours still
    /// bracket the new score the node is updated in place, otherwise it is unlinked and inserted
    /// again. Returns `None` if the node does not exist.
    pub fn update_score(&mut self, current: f64, member: &str, new_score: f64) -> Option<NodeId> {
        let update = self.predecessors(current, member);
        let x = self
            .forward(update[0], 0)
            .filter(|&x| self.compare(x, current, member) == Ordering::Equal)?;

        let node = &self.nodes[x.0];
        let after_prev = node
            .backward
            .map_or(true, |prev| self.nodes[prev.0].score < new_score);
        let before_next = node.levels[0]
            .forward
            .map_or(true, |next| self.nodes[next.0].score > new_score);

        if after_prev && before_next {
            self.nodes[x.0].score = new_score;
            return Some(x);
        }

        let member = self.nodes[x.0].member.clone();
        self.unlink(x, &update);
        Some(self.insert(new_score, member))
    }

    /// Removes the node `(score, member)`. Returns whether a node was removed.
    pub fn delete(&mut self, score: f64, member: &str) -> bool {
        let update = self.predecessors(score, member);

        match self.forward(update[0], 0) {
            Some(x) if self.compare(x, score, member) == Ordering::Equal => {
                self.unlink(x, &update);
                true
            }
            _ => false,
        }
    }

    /// Returns the 1-based rank of `(score, member)`, or `None` if it is not in the list.
    pub fn rank(&self, score: f64, member: &str) -> Option<usize> {
        let mut x = HEAD;
        let mut rank = 0;

        for i in (0..self.level).rev() {
            while let Some(next) = self.forward(x, i) {
                if self.compare(next, score, member) == Ordering::Greater {
                    break;
                }
                rank += self.nodes[x.0].levels[i].span;
                x = next;
            }

            if x != HEAD && self.compare(x, score, member) == Ordering::Equal {
                return Some(rank);
            }
        }

        None
    }

    /// Returns the node at the 1-based `rank`.
    pub fn get_by_rank(&self, rank: usize) -> Option<NodeId> {
        if rank == 0 || rank > self.length {
            return None;
        }

        let mut x = HEAD;
        let mut traversed = 0;

        for i in (0..self.level).rev() {
            while let Some(next) = self.forward(x, i) {
                let span = self.nodes[x.0].levels[i].span;
                if traversed + span > rank {
                    break;
                }
                traversed += span;
                x = next;
            }

            if traversed == rank {
                return Some(x);
            }
        }

        None
    }

    fn forward(&self, id: NodeId, level: usize) -> Option<NodeId> {
        self.nodes[id.0].levels[level].forward
    }

    fn compare(&self, id: NodeId, score: f64, member: &str) -> Ordering {
        let node = &self.nodes[id.0];
        node.score
            .total_cmp(&score)
            .then_with(|| (*node.member).cmp(member))
    }

    // Last node at each level ordered strictly before `(score, member)`.
    fn predecessors(&self, score: f64, member: &str) -> [NodeId; MAX_LEVEL] {
        let mut update = [HEAD; MAX_LEVEL];
        let mut x = HEAD;

        for i in (0..self.level).rev() {
            while let Some(next) = self.forward(x, i) {
                if self.compare(next, score, member) != Ordering::Less {
                    break;
                }
                x = next;
            }
            update[i] = x;
        }

        update
    }

    fn unlink(&mut self, x: NodeId, update: &[NodeId; MAX_LEVEL]) {
        for i in 0..self.level {
            let prev = update[i];
            if self.nodes[prev.0].levels[i].forward == Some(x) {
                let Level { forward, span } = self.nodes[x.0].levels[i].clone();
                let level = &mut self.nodes[prev.0].levels[i];
                level.span = level.span + span - 1;
                level.forward = forward;
            } else {
                self.nodes[prev.0].levels[i].span -= 1;
            }
        }

        let backward = self.nodes[x.0].backward;
        match self.nodes[x.0].levels[0].forward {
            Some(next) => self.nodes[next.0].backward = backward,
            None => self.tail = backward,
        }

        while self.level > 1 && self.nodes[HEAD.0].levels[self.level - 1].forward.is_none() {
            self.level -= 1;
        }

        self.length -= 1;
        self.release(x);
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        match self.free.pop() {
            Some(id) => {
                self.nodes[id.0] = node;
                id
            }
            None => {
                self.nodes.push(node);
                NodeId(self.nodes.len() - 1)
            }
        }
    }

    fn release(&mut self, id: NodeId) {
        let node = &mut self.nodes[id.0];
        node.member = Arc::from("");
        node.backward = None;
        node.levels = Vec::new();
        self.free.push(id);
    }
}

impl Default for Skiplist {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Iter<'a> {
    list: &'a Skiplist,
    next: Option<NodeId>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (&'a str, f64);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.next?;
        let node = &self.list.nodes[id.0];
        self.next = node.levels[0].forward;
        Some((&*node.member, node.score))
    }
}

fn random_level() -> usize {
    let mut rng = rand::thread_rng();
    let mut level = 1;
    while level < MAX_LEVEL && rng.gen_bool(0.5) {
        level += 1;
    }
    level
}
