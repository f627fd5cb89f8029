//! Bounded most-recent-first stacks of bar indices and their text encoding.
//!
//! Index 0 of every stack is the *active* entry. Pushing beyond
//! [`STACK_CAPACITY`] drops the oldest entry, so the bound holds by
//! construction rather than by periodic slicing.
//!
//! Persisted form: `v1:` followed by comma-separated integers, most recent
//! first, e.g. `"v1:19,7,3"`. The parser rejects anything else.

use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;
use thiserror::Error;

/// Maximum number of entries any stack retains.
pub const STACK_CAPACITY: usize = 100;

const CODEC_PREFIX: &str = "v1:";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StackParseError {
    #[error("missing or unknown version prefix in {0:?}")]
    Version(String),

    #[error("empty item at position {position} in {input:?}")]
    EmptyItem { input: String, position: usize },

    #[error("invalid integer {item:?} at position {position}")]
    InvalidItem { item: String, position: usize },

    #[error("{len} entries exceeds capacity {STACK_CAPACITY}")]
    TooLong { len: usize },

    #[error("extremum stack must hold at least one entry")]
    Empty,

    #[error("anchor lists have mismatched lengths: pos={pos}, first={first}, counter={counter}")]
    Mismatched {
        pos: usize,
        first: usize,
        counter: usize,
    },

    #[error("anchor counter {0} out of range (expected 0 or 1)")]
    Counter(u8),
}

/// Encode a list in the versioned delimited form.
pub fn encode_list<T: Display>(items: &[T]) -> String {
    let body: Vec<String> = items.iter().map(|v| v.to_string()).collect();
    format!("{CODEC_PREFIX}{}", body.join(","))
}

/// Parse a list produced by [`encode_list`].
pub fn parse_list<T: FromStr>(input: &str) -> Result<Vec<T>, StackParseError> {
    let body = input
        .strip_prefix(CODEC_PREFIX)
        .ok_or_else(|| StackParseError::Version(input.to_string()))?;
    if body.is_empty() {
        return Ok(Vec::new());
    }
    let items = body
        .split(',')
        .enumerate()
        .map(|(position, item)| {
            let trimmed = item.trim();
            if trimmed.is_empty() {
                return Err(StackParseError::EmptyItem {
                    input: input.to_string(),
                    position,
                });
            }
            trimmed.parse::<T>().map_err(|_| StackParseError::InvalidItem {
                item: trimmed.to_string(),
                position,
            })
        })
        .collect::<Result<Vec<T>, _>>()?;
    if items.len() > STACK_CAPACITY {
        return Err(StackParseError::TooLong { len: items.len() });
    }
    Ok(items)
}

/// Stack of global bar indices, never empty.
///
/// A fresh stack holds the single seed `0`. It is "at sentinel" while that
/// seed is the only entry; the seed is never mutated in place, so any push
/// leaves the stack with at least two entries until capacity trimming.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IndexStack {
    items: Vec<u64>,
}

impl Default for IndexStack {
    fn default() -> Self {
        Self::seeded()
    }
}

impl IndexStack {
    /// Cold-start stack `[0]`.
    pub fn seeded() -> Self {
        Self { items: vec![0] }
    }

    /// Build from most-recent-first entries.
    pub fn from_vec(items: Vec<u64>) -> Result<Self, StackParseError> {
        if items.is_empty() {
            return Err(StackParseError::Empty);
        }
        if items.len() > STACK_CAPACITY {
            return Err(StackParseError::TooLong { len: items.len() });
        }
        Ok(Self { items })
    }

    pub fn is_sentinel(&self) -> bool {
        self.items.len() == 1
    }

    /// Active entry.
    pub fn top(&self) -> u64 {
        self.items[0]
    }

    /// Entry `depth` places below the top, or the oldest entry when the
    /// stack is shallower.
    pub fn nth_or_last(&self, depth: usize) -> u64 {
        let idx = depth.min(self.items.len() - 1);
        self.items[idx]
    }

    pub fn push(&mut self, n: u64) {
        self.items.insert(0, n);
        self.items.truncate(STACK_CAPACITY);
    }

    /// Move the active entry. No-op while at sentinel.
    pub fn replace_top(&mut self, n: u64) {
        if !self.is_sentinel() {
            self.items[0] = n;
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn as_slice(&self) -> &[u64] {
        &self.items
    }

    pub fn encode(&self) -> String {
        encode_list(&self.items)
    }
}

impl FromStr for IndexStack {
    type Err = StackParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_vec(parse_list(s)?)
    }
}

impl TryFrom<String> for IndexStack {
    type Error = StackParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<IndexStack> for String {
    fn from(stack: IndexStack) -> Self {
        stack.encode()
    }
}

/// Provisional extremum candidate awaiting its second breakout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Anchor {
    pub pos: u64,
    /// Bar of the first breakout, once counted.
    pub first_break: Option<u64>,
    pub counter: u8,
}

impl Anchor {
    pub fn fresh(pos: u64) -> Self {
        Self {
            pos,
            first_break: None,
            counter: 0,
        }
    }
}

/// Anchor records, most-recent-first. May be empty.
///
/// Persisted as three parallel lists: positions, first-break bars (`-1` when
/// not yet broken) and counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "AnchorLists", into = "AnchorLists")]
pub struct AnchorStack {
    items: Vec<Anchor>,
}

/// Wire form of an [`AnchorStack`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorLists {
    pub anchor_array: String,
    pub anchor_1st_array: String,
    pub anchor_cntr_array: String,
}

impl AnchorStack {
    pub fn push(&mut self, anchor: Anchor) {
        self.items.insert(0, anchor);
        self.items.truncate(STACK_CAPACITY);
    }

    /// Replace every anchor with a single fresh one.
    pub fn reset_to(&mut self, pos: u64) {
        self.items.clear();
        self.items.push(Anchor::fresh(pos));
    }

    /// Forget anchors that fell behind `floor`.
    pub fn drop_before(&mut self, floor: u64) {
        self.items.retain(|a| a.pos >= floor);
    }

    pub fn contains_pos(&self, pos: u64) -> bool {
        self.items.iter().any(|a| a.pos == pos)
    }

    pub fn min_pos(&self) -> Option<u64> {
        self.items.iter().map(|a| a.pos).min()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Anchor> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Anchor> {
        self.items.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl From<AnchorStack> for AnchorLists {
    fn from(stack: AnchorStack) -> Self {
        let pos: Vec<u64> = stack.items.iter().map(|a| a.pos).collect();
        let first: Vec<i64> = stack
            .items
            .iter()
            .map(|a| a.first_break.map_or(-1, |b| b as i64))
            .collect();
        let counter: Vec<u8> = stack.items.iter().map(|a| a.counter).collect();
        Self {
            anchor_array: encode_list(&pos),
            anchor_1st_array: encode_list(&first),
            anchor_cntr_array: encode_list(&counter),
        }
    }
}

impl TryFrom<AnchorLists> for AnchorStack {
    type Error = StackParseError;

    fn try_from(lists: AnchorLists) -> Result<Self, Self::Error> {
        let pos: Vec<u64> = parse_list(&lists.anchor_array)?;
        let first: Vec<i64> = parse_list(&lists.anchor_1st_array)?;
        let counter: Vec<u8> = parse_list(&lists.anchor_cntr_array)?;
        if pos.len() != first.len() || pos.len() != counter.len() {
            return Err(StackParseError::Mismatched {
                pos: pos.len(),
                first: first.len(),
                counter: counter.len(),
            });
        }
        let items = pos
            .into_iter()
            .zip(first)
            .zip(counter)
            .map(|((pos, first), counter)| {
                if counter > 1 {
                    return Err(StackParseError::Counter(counter));
                }
                Ok(Anchor {
                    pos,
                    first_break: u64::try_from(first).ok(),
                    counter,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { items })
    }
}
