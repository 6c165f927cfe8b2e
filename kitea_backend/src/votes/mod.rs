//! Ballots cast on posts (red/green flags) and comments (up/down votes).
//!
//! A target carries two counters, one per ballot kind, and a ledger recording
//! which voter currently holds which kind. The engine in [`engine`] is the
//! only code that moves counters and ledger together.

pub mod engine;
pub mod scoring;
pub mod service;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::marker::PhantomData;

pub use engine::{decide, LedgerWrite, VoteDecision, VoteOutcome};
pub use service::{CastVote, VoteService};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetType {
    Post,
    Comment,
}

impl TargetType {
    pub fn as_str(self) -> &'static str {
        match self {
            TargetType::Post => "post",
            TargetType::Comment => "comment",
        }
    }
}

/// Where a target type keeps its counters.
#[derive(Debug, Clone, Copy)]
pub struct TargetSchema {
    pub table: &'static str,
    pub owner_column: &'static str,
    /// Counter columns, indexed by [`BallotKind::slot`].
    pub counter_columns: [&'static str; 2],
    /// Whether ballots also count towards the owner's received up/down totals.
    pub credits_owner: bool,
}

/// The closed set of ballots legal on one target type. Parsing a raw string
/// into an implementor is the allowed-kinds check.
pub trait BallotKind:
    Copy + Eq + Hash + Debug + Send + Sync + Serialize + 'static
{
    const TARGET: TargetType;
    const SCHEMA: TargetSchema;
    const ALL: [Self; 2];

    fn as_str(self) -> &'static str;

    fn slot(self) -> usize;

    fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == raw)
    }

    /// Human readable list of legal values, e.g. `"redFlag" or "greenFlag"`.
    fn expected() -> String {
        let [a, b] = Self::ALL;
        format!("\"{}\" or \"{}\"", a.as_str(), b.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FlagKind {
    RedFlag,
    GreenFlag,
}

impl FlagKind {
    pub fn label(self) -> &'static str {
        match self {
            FlagKind::RedFlag => "Red flag",
            FlagKind::GreenFlag => "Green flag",
        }
    }
}

impl BallotKind for FlagKind {
    const TARGET: TargetType = TargetType::Post;
    const SCHEMA: TargetSchema = TargetSchema {
        table: "posts",
        owner_column: "uploaded_by",
        counter_columns: ["red_flags", "green_flags"],
        credits_owner: false,
    };
    const ALL: [Self; 2] = [FlagKind::RedFlag, FlagKind::GreenFlag];

    fn as_str(self) -> &'static str {
        match self {
            FlagKind::RedFlag => "redFlag",
            FlagKind::GreenFlag => "greenFlag",
        }
    }

    fn slot(self) -> usize {
        match self {
            FlagKind::RedFlag => 0,
            FlagKind::GreenFlag => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommentVoteKind {
    Upvote,
    Downvote,
}

impl BallotKind for CommentVoteKind {
    const TARGET: TargetType = TargetType::Comment;
    const SCHEMA: TargetSchema = TargetSchema {
        table: "comments",
        owner_column: "commenter_id",
        counter_columns: ["upvotes", "downvotes"],
        credits_owner: true,
    };
    const ALL: [Self; 2] = [CommentVoteKind::Upvote, CommentVoteKind::Downvote];

    fn as_str(self) -> &'static str {
        match self {
            CommentVoteKind::Upvote => "upvote",
            CommentVoteKind::Downvote => "downvote",
        }
    }

    fn slot(self) -> usize {
        match self {
            CommentVoteKind::Upvote => 0,
            CommentVoteKind::Downvote => 1,
        }
    }
}

/// Per-kind counters of one target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tally<K> {
    counts: [i64; 2],
    _kind: PhantomData<K>,
}

impl<K: BallotKind> Tally<K> {
    pub fn new(counts: [i64; 2]) -> Self {
        Self {
            counts,
            _kind: PhantomData,
        }
    }

    pub fn get(&self, kind: K) -> i64 {
        self.counts[kind.slot()]
    }

    pub fn total(&self) -> i64 {
        self.counts[0] + self.counts[1]
    }

    pub fn counts(&self) -> [i64; 2] {
        self.counts
    }

    pub(crate) fn bump(&mut self, kind: K, delta: i64) {
        self.counts[kind.slot()] += delta;
    }
}

impl<K: BallotKind> Default for Tally<K> {
    fn default() -> Self {
        Self::new([0, 0])
    }
}

/// Who voted on a target, in first-vote order, and what each voter holds now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteLedger<K> {
    voters: Vec<String>,
    kinds: HashMap<String, K>,
}

impl<K: BallotKind> VoteLedger<K> {
    pub fn new() -> Self {
        Self {
            voters: Vec::new(),
            kinds: HashMap::new(),
        }
    }

    /// Builds a ledger from stored `(voter, kind)` rows in cast order. A voter
    /// listed twice keeps its first position and its last kind.
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (String, K)>,
    {
        let mut ledger = Self::new();
        for (voter, kind) in entries {
            if ledger.kinds.insert(voter.clone(), kind).is_none() {
                ledger.voters.push(voter);
            }
        }
        ledger
    }

    pub fn kind_of(&self, voter_id: &str) -> Option<K> {
        self.kinds.get(voter_id).copied()
    }

    pub fn voters(&self) -> &[String] {
        &self.voters
    }

    pub fn len(&self) -> usize {
        self.voters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voters.is_empty()
    }

    /// Number of voters currently holding `kind`.
    pub fn count_of(&self, kind: K) -> usize {
        self.kinds.values().filter(|held| **held == kind).count()
    }

    pub(crate) fn append(&mut self, voter_id: &str, kind: K) {
        if self.kinds.insert(voter_id.to_string(), kind).is_none() {
            self.voters.push(voter_id.to_string());
        }
    }

    pub(crate) fn reassign(&mut self, voter_id: &str, kind: K) {
        if let Some(held) = self.kinds.get_mut(voter_id) {
            *held = kind;
        }
    }
}

impl<K: BallotKind> Default for VoteLedger<K> {
    fn default() -> Self {
        Self::new()
    }
}

/// A post or comment as the engine sees it: counters, ledger and the version
/// the snapshot was loaded at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteTarget<K> {
    pub id: String,
    pub owner_id: String,
    pub version: i64,
    pub tally: Tally<K>,
    pub ledger: VoteLedger<K>,
}

impl<K: BallotKind> VoteTarget<K> {
    /// A target that has never been voted on.
    pub fn fresh(id: impl Into<String>, owner_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            owner_id: owner_id.into(),
            version: 0,
            tally: Tally::default(),
            ledger: VoteLedger::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_only_kinds_of_the_target_type() {
        assert_eq!(FlagKind::parse("redFlag"), Some(FlagKind::RedFlag));
        assert_eq!(FlagKind::parse("greenFlag"), Some(FlagKind::GreenFlag));
        assert_eq!(FlagKind::parse("upvote"), None);
        assert_eq!(CommentVoteKind::parse("downvote"), Some(CommentVoteKind::Downvote));
        assert_eq!(CommentVoteKind::parse("redFlag"), None);
        assert_eq!(CommentVoteKind::parse("Upvote"), None);
    }

    #[test]
    fn expected_lists_both_kinds() {
        assert_eq!(FlagKind::expected(), "\"redFlag\" or \"greenFlag\"");
        assert_eq!(CommentVoteKind::expected(), "\"upvote\" or \"downvote\"");
    }

    #[test]
    fn ledger_from_entries_keeps_first_position_and_last_kind() {
        let ledger = VoteLedger::from_entries(vec![
            ("a".to_string(), FlagKind::RedFlag),
            ("b".to_string(), FlagKind::GreenFlag),
            ("a".to_string(), FlagKind::GreenFlag),
        ]);
        assert_eq!(ledger.voters(), ["a".to_string(), "b".to_string()]);
        assert_eq!(ledger.kind_of("a"), Some(FlagKind::GreenFlag));
        assert_eq!(ledger.count_of(FlagKind::GreenFlag), 2);
        assert_eq!(ledger.count_of(FlagKind::RedFlag), 0);
    }

    #[test]
    fn serde_names_match_wire_values() {
        assert_eq!(
            serde_json::to_string(&FlagKind::GreenFlag).unwrap(),
            "\"greenFlag\""
        );
        assert_eq!(
            serde_json::to_string(&CommentVoteKind::Upvote).unwrap(),
            "\"upvote\""
        );
    }
}
