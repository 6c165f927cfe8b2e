use super::{atomically, users::SqliteUserRepository, UserRepository};
use crate::error::VersionConflict;
use crate::utils::now_utc_iso;
use crate::votes::{BallotKind, LedgerWrite, Tally, TargetType, VoteLedger, VoteTarget};
use anyhow::{bail, Result};
use rusqlite::{params, Connection, OptionalExtension};

pub(super) struct SqliteVoteRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

impl<'conn> SqliteVoteRepository<'conn> {
    fn load_ledger<K: BallotKind>(&self, target_id: &str) -> Result<VoteLedger<K>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT voter_id, vote_kind
            FROM votes
            WHERE target_type = ?1 AND target_id = ?2
            ORDER BY rowid ASC
            "#,
        )?;
        let rows = stmt.query_map(params![K::TARGET.as_str(), target_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut entries = Vec::new();
        for row in rows {
            let (voter_id, raw_kind) = row?;
            let Some(kind) = K::parse(&raw_kind) else {
                bail!(
                    "unknown vote kind {raw_kind:?} stored for {} {target_id}",
                    K::TARGET.as_str()
                );
            };
            entries.push((voter_id, kind));
        }
        Ok(VoteLedger::from_entries(entries))
    }
}

impl<'conn> super::VoteRepository for SqliteVoteRepository<'conn> {
    fn load_target<K: BallotKind>(&self, target_id: &str) -> Result<Option<VoteTarget<K>>> {
        let schema = K::SCHEMA;
        let [first, second] = schema.counter_columns;
        let row = self
            .conn
            .query_row(
                &format!(
                    "SELECT {owner}, {first}, {second}, version FROM {table} \
                     WHERE id = ?1 AND is_active = 1",
                    owner = schema.owner_column,
                    table = schema.table,
                ),
                params![target_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, i64>(3)?,
                    ))
                },
            )
            .optional()?;
        let Some((owner_id, first_count, second_count, version)) = row else {
            return Ok(None);
        };
        let ledger = self.load_ledger::<K>(target_id)?;
        Ok(Some(VoteTarget {
            id: target_id.to_string(),
            owner_id,
            version,
            tally: Tally::new([first_count, second_count]),
            ledger,
        }))
    }

    fn save_target<K: BallotKind>(
        &self,
        target: &VoteTarget<K>,
        write: &LedgerWrite<K>,
    ) -> Result<()> {
        let schema = K::SCHEMA;
        let [first, second] = schema.counter_columns;
        let [first_count, second_count] = target.tally.counts();
        let now = now_utc_iso();

        atomically(self.conn, |conn| {
            let updated = conn.execute(
                &format!(
                    "UPDATE {table} SET {first} = ?1, {second} = ?2, \
                     version = version + 1, updated_at = ?3 \
                     WHERE id = ?4 AND version = ?5",
                    table = schema.table,
                ),
                params![first_count, second_count, now, target.id, target.version],
            )?;
            if updated == 0 {
                return Err(VersionConflict {
                    table: schema.table,
                    id: target.id.clone(),
                    expected: target.version,
                }
                .into());
            }

            conn.execute(
                r#"
                INSERT INTO votes (target_type, target_id, voter_id, vote_kind, cast_at)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT(target_type, target_id, voter_id) DO UPDATE SET
                    vote_kind = excluded.vote_kind,
                    cast_at = excluded.cast_at
                "#,
                params![
                    K::TARGET.as_str(),
                    target.id,
                    write.voter_id,
                    write.kind.as_str(),
                    now,
                ],
            )?;

            if schema.credits_owner {
                let [up, down] = write.deltas();
                SqliteUserRepository { conn }.adjust_received_votes(&target.owner_id, up, down)?;
            }
            Ok(())
        })
    }

    fn clear_target(&self, target_type: TargetType, target_id: &str) -> Result<usize> {
        let removed = self.conn.execute(
            "DELETE FROM votes WHERE target_type = ?1 AND target_id = ?2",
            params![target_type.as_str(), target_id],
        )?;
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::{comment, post, user};
    use super::super::{SqliteRepositories, UserRepository, VoteRepository};
    use crate::database::MIGRATIONS;
    use crate::error::is_version_conflict;
    use crate::votes::{decide, CommentVoteKind, FlagKind, TargetType, VoteTarget};
    use rusqlite::Connection;

    fn setup_conn() -> Connection {
        let conn = Connection::open_in_memory().expect("in-memory db");
        conn.execute_batch(MIGRATIONS).expect("base migrations");
        conn
    }

    #[test]
    fn fresh_post_loads_with_empty_ledger() {
        let conn = setup_conn();
        let repos = SqliteRepositories::new(&conn);
        user(&repos, "u1");
        post(&repos, "p1", "u1", "2024-01-01T00:00:00Z");

        let target: VoteTarget<FlagKind> = repos.votes().load_target("p1").unwrap().unwrap();
        assert_eq!(target, VoteTarget::fresh("p1", "u1"));
        assert!(repos
            .votes()
            .load_target::<FlagKind>("missing")
            .unwrap()
            .is_none());
    }

    #[test]
    fn saved_decision_round_trips_through_storage() {
        let conn = setup_conn();
        let repos = SqliteRepositories::new(&conn);
        user(&repos, "u1");
        user(&repos, "u2");
        user(&repos, "u3");
        post(&repos, "p1", "u1", "2024-01-01T00:00:00Z");

        for (voter, kind) in [("u2", FlagKind::RedFlag), ("u3", FlagKind::GreenFlag), ("u2", FlagKind::GreenFlag)] {
            let loaded = repos.votes().load_target::<FlagKind>("p1").unwrap().unwrap();
            let decision = decide(&loaded, voter, kind);
            let write = decision.write.expect("not a duplicate");
            repos.votes().save_target(&decision.next, &write).unwrap();
        }

        let stored = repos.votes().load_target::<FlagKind>("p1").unwrap().unwrap();
        assert_eq!(stored.version, 3);
        assert_eq!(stored.tally.counts(), [0, 2]);
        assert_eq!(stored.ledger.voters(), ["u2".to_string(), "u3".to_string()]);
        assert_eq!(stored.ledger.kind_of("u2"), Some(FlagKind::GreenFlag));
    }

    #[test]
    fn stale_version_is_a_conflict_and_writes_nothing() {
        let conn = setup_conn();
        let repos = SqliteRepositories::new(&conn);
        user(&repos, "u1");
        user(&repos, "u2");
        user(&repos, "u3");
        post(&repos, "p1", "u1", "2024-01-01T00:00:00Z");

        let snapshot = repos.votes().load_target::<FlagKind>("p1").unwrap().unwrap();
        let first = decide(&snapshot, "u2", FlagKind::RedFlag);
        let second = decide(&snapshot, "u3", FlagKind::GreenFlag);
        repos
            .votes()
            .save_target(&first.next, first.write.as_ref().unwrap())
            .unwrap();

        let err = repos
            .votes()
            .save_target(&second.next, second.write.as_ref().unwrap())
            .unwrap_err();
        assert!(is_version_conflict(&err));

        let stored = repos.votes().load_target::<FlagKind>("p1").unwrap().unwrap();
        assert_eq!(stored.tally.counts(), [1, 0]);
        assert_eq!(stored.ledger.kind_of("u3"), None);
    }

    #[test]
    fn comment_ballots_credit_the_author() {
        let conn = setup_conn();
        let repos = SqliteRepositories::new(&conn);
        user(&repos, "author");
        user(&repos, "voter");
        post(&repos, "p1", "author", "2024-01-01T00:00:00Z");
        comment(&repos, "c1", "p1", "author", "2024-01-01T00:00:01Z");

        let loaded = repos.votes().load_target::<CommentVoteKind>("c1").unwrap().unwrap();
        let up = decide(&loaded, "voter", CommentVoteKind::Upvote);
        repos.votes().save_target(&up.next, up.write.as_ref().unwrap()).unwrap();

        let loaded = repos.votes().load_target::<CommentVoteKind>("c1").unwrap().unwrap();
        let down = decide(&loaded, "voter", CommentVoteKind::Downvote);
        repos
            .votes()
            .save_target(&down.next, down.write.as_ref().unwrap())
            .unwrap();

        let author = repos.users().get("author").unwrap().unwrap();
        assert_eq!((author.total_upvotes, author.total_downvotes), (0, 1));

        assert_eq!(repos.votes().clear_target(TargetType::Comment, "c1").unwrap(), 1);
    }
}
