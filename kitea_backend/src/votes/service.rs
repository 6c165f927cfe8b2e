use super::{decide, BallotKind, Tally, VoteOutcome};
use crate::database::repositories::{UserRepository, VoteRepository};
use crate::database::Database;
use crate::error::{is_version_conflict, DomainError};

/// Attempts per ballot: the first try plus one retry after a version conflict.
const MAX_ATTEMPTS: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CastVote<K> {
    pub target_id: String,
    pub kind: K,
    pub outcome: VoteOutcome<K>,
    /// Counters as persisted after this ballot (unchanged on duplicates).
    pub tally: Tally<K>,
}

#[derive(Clone)]
pub struct VoteService {
    database: Database,
}

impl VoteService {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    /// Loads the target, decides, and saves against the loaded version. A
    /// version conflict reloads and decides again once before giving up.
    pub fn cast<K: BallotKind>(
        &self,
        target_id: &str,
        voter_id: &str,
        kind: K,
    ) -> Result<CastVote<K>, DomainError> {
        let target_name = K::TARGET.as_str();
        for attempt in 1..=MAX_ATTEMPTS {
            let (target, voter_exists) = self.database.with_repositories(|repos| {
                let target = repos.votes().load_target::<K>(target_id)?;
                let voter_exists = repos.users().get(voter_id)?.is_some();
                Ok((target, voter_exists))
            })?;
            let Some(target) = target else {
                return Err(DomainError::not_found(format!(
                    "{} not found",
                    capitalize(target_name)
                )));
            };
            if !voter_exists {
                return Err(DomainError::not_found("User not found"));
            }

            let decision = decide(&target, voter_id, kind);
            let Some(write) = decision.write else {
                tracing::debug!(
                    target_type = target_name,
                    target_id,
                    voter_id,
                    kind = kind.as_str(),
                    "duplicate ballot rejected"
                );
                return Ok(CastVote {
                    target_id: target.id,
                    kind,
                    outcome: decision.outcome,
                    tally: target.tally,
                });
            };

            match self
                .database
                .with_repositories(|repos| repos.votes().save_target(&decision.next, &write))
            {
                Ok(()) => {
                    if let VoteOutcome::Changed { previous } = decision.outcome {
                        tracing::info!(
                            target_type = target_name,
                            target_id,
                            voter_id,
                            from = previous.as_str(),
                            to = kind.as_str(),
                            "ballot changed"
                        );
                    } else {
                        tracing::info!(
                            target_type = target_name,
                            target_id,
                            voter_id,
                            kind = kind.as_str(),
                            "ballot added"
                        );
                    }
                    return Ok(CastVote {
                        target_id: decision.next.id,
                        kind,
                        outcome: decision.outcome,
                        tally: decision.next.tally,
                    });
                }
                Err(err) if is_version_conflict(&err) => {
                    tracing::warn!(
                        target_type = target_name,
                        target_id,
                        attempt,
                        "concurrent ballot on target, reloading"
                    );
                }
                Err(err) => return Err(DomainError::Storage(err)),
            }
        }

        Err(DomainError::Conflict {
            target: target_name,
            id: target_id.to_string(),
        })
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::repositories::fixtures::{comment, post, user};
    use crate::database::repositories::PostRepository;
    use crate::votes::scoring::{comment_engagement, comment_score, safety_rating, safety_score, SafetyRating};
    use crate::votes::{CommentVoteKind, FlagKind};

    fn setup() -> (Database, VoteService) {
        let db = crate::database::in_memory();
        db.with_repositories(|repos| {
            for id in ["u1", "u2", "u3"] {
                user(&repos, id);
            }
            post(&repos, "p1", "u1", "2024-01-01T00:00:00Z");
            comment(&repos, "c1", "p1", "u3", "2024-01-01T00:00:01Z");
            Ok(())
        })
        .expect("seed");
        (db.clone(), VoteService::new(db))
    }

    #[test]
    fn switching_flag_moves_the_post_from_warning_to_safe() {
        let (_, service) = setup();
        let red = service.cast("p1", "u2", FlagKind::RedFlag).unwrap();
        assert_eq!(red.outcome, VoteOutcome::Added);
        let [r, g] = red.tally.counts();
        assert_eq!((r, g), (1, 0));
        assert_eq!(safety_score(r, g), -1);
        assert_eq!(safety_rating(r, g), SafetyRating::Warning);

        let green = service.cast("p1", "u2", FlagKind::GreenFlag).unwrap();
        assert!(green.outcome.is_change());
        let [r, g] = green.tally.counts();
        assert_eq!((r, g), (0, 1));
        assert_eq!(safety_score(r, g), 1);
        assert_eq!(safety_rating(r, g), SafetyRating::Safe);
    }

    #[test]
    fn duplicate_flag_leaves_storage_untouched() {
        let (db, service) = setup();
        service.cast("p1", "u2", FlagKind::RedFlag).unwrap();
        let before = db
            .with_repositories(|repos| repos.posts().get("p1"))
            .unwrap()
            .unwrap();

        let again = service.cast("p1", "u2", FlagKind::RedFlag).unwrap();
        assert!(again.outcome.is_duplicate());
        assert_eq!(again.tally.counts(), [1, 0]);

        let after = db
            .with_repositories(|repos| repos.posts().get("p1"))
            .unwrap()
            .unwrap();
        assert_eq!(after.version, before.version);
        assert_eq!(after.updated_at, before.updated_at);
        assert_eq!((after.red_flags, after.green_flags), (1, 0));
    }

    #[test]
    fn opposite_comment_votes_cancel_out() {
        let (_, service) = setup();
        service.cast("c1", "u1", CommentVoteKind::Upvote).unwrap();
        let down = service.cast("c1", "u2", CommentVoteKind::Downvote).unwrap();
        let [up, down] = down.tally.counts();
        assert_eq!(comment_score(up, down), 0);
        assert_eq!(comment_engagement(up, down), 2);
    }

    #[test]
    fn missing_target_or_voter_is_not_found() {
        let (_, service) = setup();
        let err = service.cast("nope", "u2", FlagKind::RedFlag).unwrap_err();
        assert!(matches!(err, DomainError::NotFound(ref msg) if msg == "Post not found"));
        let err = service.cast("c1", "ghost", CommentVoteKind::Upvote).unwrap_err();
        assert!(matches!(err, DomainError::NotFound(ref msg) if msg == "User not found"));
    }

    #[test]
    fn post_ids_are_not_comment_targets() {
        let (_, service) = setup();
        let err = service.cast("p1", "u2", CommentVoteKind::Upvote).unwrap_err();
        assert!(matches!(err, DomainError::NotFound(ref msg) if msg == "Comment not found"));
    }

    #[test]
    fn concurrent_voters_on_one_post_lose_no_update() {
        let (db, service) = setup();
        let extra: Vec<String> = (0..8).map(|i| format!("v{i}")).collect();
        db.with_repositories(|repos| {
            for id in &extra {
                user(&repos, id);
            }
            Ok(())
        })
        .unwrap();

        let handles: Vec<_> = extra
            .iter()
            .enumerate()
            .map(|(i, voter)| {
                let service = service.clone();
                let voter = voter.clone();
                std::thread::spawn(move || {
                    let kind = if i % 2 == 0 { FlagKind::RedFlag } else { FlagKind::GreenFlag };
                    // a lost race surfaces as Conflict; retry until it lands
                    loop {
                        match service.cast("p1", &voter, kind) {
                            Ok(cast) => break cast,
                            Err(DomainError::Conflict { .. }) => continue,
                            Err(err) => panic!("unexpected error: {err}"),
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("voter thread");
        }

        let stored = db
            .with_repositories(|repos| repos.votes().load_target::<FlagKind>("p1"))
            .unwrap()
            .unwrap();
        assert_eq!(stored.ledger.len(), 8);
        assert_eq!(stored.tally.counts(), [4, 4]);
    }
}
