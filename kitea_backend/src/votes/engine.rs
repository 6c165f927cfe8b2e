use super::{BallotKind, VoteTarget};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteOutcome<K> {
    /// First ballot from this voter on the target.
    Added,
    /// The voter switched from `previous` to the requested kind.
    Changed { previous: K },
    /// The voter already holds the requested kind; nothing changes.
    Duplicate,
}

impl<K> VoteOutcome<K> {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, VoteOutcome::Duplicate)
    }

    pub fn is_change(&self) -> bool {
        matches!(self, VoteOutcome::Changed { .. })
    }
}

/// The single ledger row a committed decision writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerWrite<K> {
    pub voter_id: String,
    pub kind: K,
    pub previous: Option<K>,
}

impl<K: BallotKind> LedgerWrite<K> {
    /// Counter deltas this write applies, indexed by [`BallotKind::slot`].
    pub fn deltas(&self) -> [i64; 2] {
        let mut deltas = [0, 0];
        deltas[self.kind.slot()] += 1;
        if let Some(previous) = self.previous {
            deltas[previous.slot()] -= 1;
        }
        deltas
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteDecision<K> {
    pub outcome: VoteOutcome<K>,
    /// State after the decision. Equal to the input on `Duplicate`.
    pub next: VoteTarget<K>,
    /// `None` exactly when the outcome is `Duplicate`.
    pub write: Option<LedgerWrite<K>>,
}

/// Decides what one ballot does to a loaded target.
///
/// The input snapshot is never touched; the caller persists `write` against
/// `target.version` and only then treats `next` as current.
pub fn decide<K: BallotKind>(target: &VoteTarget<K>, voter_id: &str, kind: K) -> VoteDecision<K> {
    let mut next = target.clone();
    let outcome = match target.ledger.kind_of(voter_id) {
        None => {
            next.ledger.append(voter_id, kind);
            next.tally.bump(kind, 1);
            VoteOutcome::Added
        }
        Some(held) if held == kind => VoteOutcome::Duplicate,
        Some(previous) => {
            next.tally.bump(previous, -1);
            next.tally.bump(kind, 1);
            next.ledger.reassign(voter_id, kind);
            VoteOutcome::Changed { previous }
        }
    };

    let write = match outcome {
        VoteOutcome::Duplicate => None,
        VoteOutcome::Added => Some(LedgerWrite {
            voter_id: voter_id.to_string(),
            kind,
            previous: None,
        }),
        VoteOutcome::Changed { previous } => Some(LedgerWrite {
            voter_id: voter_id.to_string(),
            kind,
            previous: Some(previous),
        }),
    };

    VoteDecision {
        outcome,
        next,
        write,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::votes::{CommentVoteKind, FlagKind, Tally};

    fn post() -> VoteTarget<FlagKind> {
        VoteTarget::fresh("post-1", "owner")
    }

    fn apply<K: BallotKind>(target: &VoteTarget<K>, voter: &str, kind: K) -> VoteTarget<K> {
        decide(target, voter, kind).next
    }

    fn assert_consistent<K: BallotKind>(target: &VoteTarget<K>) {
        assert_eq!(target.tally.total(), target.ledger.len() as i64);
        for kind in K::ALL {
            assert_eq!(target.tally.get(kind), target.ledger.count_of(kind) as i64);
        }
    }

    #[test]
    fn first_ballot_is_added() {
        let target = post();
        let decision = decide(&target, "u2", FlagKind::RedFlag);
        assert_eq!(decision.outcome, VoteOutcome::Added);
        assert_eq!(decision.next.tally, Tally::new([1, 0]));
        assert_eq!(decision.next.ledger.kind_of("u2"), Some(FlagKind::RedFlag));
        assert_eq!(
            decision.write,
            Some(LedgerWrite {
                voter_id: "u2".into(),
                kind: FlagKind::RedFlag,
                previous: None,
            })
        );
        // input snapshot untouched
        assert!(target.ledger.is_empty());
        assert_eq!(target.tally.total(), 0);
    }

    #[test]
    fn changing_kind_moves_one_ballot_between_counters() {
        let target = apply(&post(), "u2", FlagKind::RedFlag);
        let target = apply(&target, "u3", FlagKind::RedFlag);
        let decision = decide(&target, "u2", FlagKind::GreenFlag);

        assert_eq!(
            decision.outcome,
            VoteOutcome::Changed {
                previous: FlagKind::RedFlag
            }
        );
        assert_eq!(decision.next.tally.total(), target.tally.total());
        assert_eq!(
            decision.next.tally.get(FlagKind::RedFlag),
            target.tally.get(FlagKind::RedFlag) - 1
        );
        assert_eq!(
            decision.next.tally.get(FlagKind::GreenFlag),
            target.tally.get(FlagKind::GreenFlag) + 1
        );
        assert_eq!(decision.next.ledger.voters(), target.ledger.voters());
        assert_eq!(decision.write.as_ref().map(|w| w.deltas()), Some([-1, 1]));
        assert_consistent(&decision.next);
    }

    #[test]
    fn repeating_kind_is_rejected_without_changes() {
        let target = apply(&post(), "u2", FlagKind::RedFlag);
        let decision = decide(&target, "u2", FlagKind::RedFlag);
        assert!(decision.outcome.is_duplicate());
        assert!(decision.write.is_none());
        assert_eq!(decision.next, target);
    }

    #[test]
    fn any_ballot_sequence_keeps_one_entry_per_voter() {
        let voters = ["a", "b", "c"];
        let kinds = [CommentVoteKind::Upvote, CommentVoteKind::Downvote];
        let mut target: VoteTarget<CommentVoteKind> = VoteTarget::fresh("c1", "owner");

        // deterministic walk over voter/kind pairs, including repeats
        for step in 0..60usize {
            let voter = voters[(step * 7 + step / 5) % voters.len()];
            let kind = kinds[(step / 2 + step % 3) % kinds.len()];
            let before = target.clone();
            let decision = decide(&target, voter, kind);
            match decision.outcome {
                VoteOutcome::Duplicate => assert_eq!(decision.next, before),
                VoteOutcome::Added => {
                    assert_eq!(decision.next.tally.total(), before.tally.total() + 1)
                }
                VoteOutcome::Changed { .. } => {
                    assert_eq!(decision.next.tally.total(), before.tally.total())
                }
            }
            target = decision.next;
            assert_eq!(target.ledger.kind_of(voter), Some(kind));
            assert_consistent(&target);
        }
        assert!(target.ledger.len() <= voters.len());
    }

    #[test]
    fn deltas_for_new_ballot() {
        let write = LedgerWrite {
            voter_id: "u".into(),
            kind: CommentVoteKind::Downvote,
            previous: None,
        };
        assert_eq!(write.deltas(), [0, 1]);
    }
}
