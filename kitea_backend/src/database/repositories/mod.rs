mod comments;
mod posts;
mod users;
mod votes;

use super::models::{
    CommentRecord, CommentWithAuthor, NewUser, PostPage, PostRecord, PostWithAuthor, UserRecord,
    UserSummary,
};
use crate::votes::{BallotKind, LedgerWrite, TargetType, VoteTarget};
use anyhow::Result;
use rusqlite::{Connection, Row};

pub trait UserRepository {
    /// Inserts the user with the next sequential `user_count`.
    fn create(&self, user: &NewUser) -> Result<UserRecord>;
    fn get(&self, id: &str) -> Result<Option<UserRecord>>;
    fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>>;
    fn increment_comments_posted(&self, id: &str, delta: i64) -> Result<()>;
    fn adjust_received_votes(&self, id: &str, upvotes: i64, downvotes: i64) -> Result<()>;
}

pub trait PostRepository {
    fn create(&self, record: &PostRecord) -> Result<()>;
    fn get(&self, id: &str) -> Result<Option<PostRecord>>;
    fn get_with_author(&self, id: &str) -> Result<Option<PostWithAuthor>>;
    /// Active posts, newest first.
    fn list_recent(&self, limit: usize) -> Result<Vec<PostWithAuthor>>;
    /// One page (1-based) of a user's active posts plus their total count.
    fn list_for_user(&self, user_id: &str, page: usize, page_size: usize) -> Result<PostPage>;
    /// Active posts by green flags desc, red flags asc, newest first.
    fn list_safest(&self, limit: usize) -> Result<Vec<PostWithAuthor>>;
    /// Soft-deletes the post's comments, then removes the post and its
    /// ledger rows in one transaction.
    fn delete_cascade(&self, id: &str) -> Result<bool>;
}

pub trait CommentRepository {
    fn create(&self, record: &CommentRecord) -> Result<()>;
    fn get(&self, id: &str) -> Result<Option<CommentRecord>>;
    fn get_with_author(&self, id: &str) -> Result<Option<CommentWithAuthor>>;
    /// Active comments of a post, newest first.
    fn list_for_post(&self, post_id: &str, limit: usize) -> Result<Vec<CommentWithAuthor>>;
    fn set_active_for_post(&self, post_id: &str, active: bool) -> Result<usize>;
    /// Hard delete, ledger rows included. The author's received up/down
    /// totals drop by the comment's counters.
    fn delete(&self, id: &str) -> Result<bool>;
}

pub trait VoteRepository {
    /// Loads an active target with its counters, ledger and version.
    fn load_target<K: BallotKind>(&self, target_id: &str) -> Result<Option<VoteTarget<K>>>;
    /// Persists `target`'s counters and the ledger row in one transaction.
    /// Fails with [`crate::error::VersionConflict`] when the stored version is
    /// no longer `target.version`.
    fn save_target<K: BallotKind>(&self, target: &VoteTarget<K>, write: &LedgerWrite<K>)
        -> Result<()>;
    fn clear_target(&self, target_type: TargetType, target_id: &str) -> Result<usize>;
}

pub struct SqliteRepositories<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteRepositories<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    pub fn users(&self) -> impl UserRepository + '_ {
        users::SqliteUserRepository { conn: self.conn }
    }

    pub fn posts(&self) -> impl PostRepository + '_ {
        posts::SqlitePostRepository { conn: self.conn }
    }

    pub fn comments(&self) -> impl CommentRepository + '_ {
        comments::SqliteCommentRepository { conn: self.conn }
    }

    pub fn votes(&self) -> impl VoteRepository + '_ {
        votes::SqliteVoteRepository { conn: self.conn }
    }

    /// Runs `f` inside one transaction. Repository methods that need their
    /// own transaction join this one instead of nesting.
    pub fn transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Self) -> Result<T>,
    {
        atomically(self.conn, |_| f(self))
    }

    pub fn conn(&self) -> &'conn Connection {
        self.conn
    }
}

/// Commits `f` atomically, reusing an already open transaction if there is
/// one on this connection.
pub(super) fn atomically<T, F>(conn: &Connection, f: F) -> Result<T>
where
    F: FnOnce(&Connection) -> Result<T>,
{
    if !conn.is_autocommit() {
        return f(conn);
    }
    let tx = conn.unchecked_transaction()?;
    let value = f(&tx)?;
    tx.commit()?;
    Ok(value)
}

/// Reads the `(id, user_count, username)` triple a LEFT JOIN on users yields
/// starting at column `start`.
pub(super) fn author_from_row(row: &Row<'_>, start: usize) -> rusqlite::Result<Option<UserSummary>> {
    let id: Option<String> = row.get(start)?;
    match id {
        Some(id) => Ok(Some(UserSummary {
            id,
            user_count: row.get(start + 1)?,
            username: row.get(start + 2)?,
        })),
        None => Ok(None),
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::database::models::PhotoRecord;

    pub fn user(repos: &SqliteRepositories<'_>, id: &str) -> UserRecord {
        repos
            .users()
            .create(&NewUser {
                id: id.into(),
                username: format!("user_{id}"),
                password: format!("pw_{id}"),
                created_at: "2024-01-01T00:00:00Z".into(),
            })
            .expect("create user")
    }

    pub fn post(repos: &SqliteRepositories<'_>, id: &str, owner: &str, created_at: &str) -> PostRecord {
        let record = PostRecord {
            id: id.into(),
            photo: PhotoRecord {
                url: format!("http://localhost/photos/{id}.png"),
                public_id: format!("{id}.png"),
                mime: "image/png".into(),
                size_bytes: 68,
                checksum: format!("blake3:{id}"),
            },
            person_name: format!("Person {id}"),
            caption: "caption".into(),
            uploaded_by: owner.into(),
            red_flags: 0,
            green_flags: 0,
            is_active: true,
            version: 0,
            created_at: created_at.into(),
            updated_at: created_at.into(),
        };
        repos.posts().create(&record).expect("create post");
        record
    }

    pub fn comment(
        repos: &SqliteRepositories<'_>,
        id: &str,
        post_id: &str,
        author: &str,
        created_at: &str,
    ) -> CommentRecord {
        let record = CommentRecord {
            id: id.into(),
            post_id: post_id.into(),
            commenter_id: author.into(),
            content: format!("comment {id}"),
            upvotes: 0,
            downvotes: 0,
            is_active: true,
            version: 0,
            created_at: created_at.into(),
            updated_at: created_at.into(),
        };
        repos.comments().create(&record).expect("create comment");
        record
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use crate::database::MIGRATIONS;
    use crate::votes::{decide, FlagKind};

    fn setup_conn() -> Connection {
        let conn = Connection::open_in_memory().expect("in-memory db");
        conn.execute_batch(MIGRATIONS).expect("base migrations");
        conn
    }

    #[test]
    fn user_counts_are_sequential() {
        let conn = setup_conn();
        let repos = SqliteRepositories::new(&conn);
        let first = user(&repos, "u1");
        let second = user(&repos, "u2");
        let third = user(&repos, "u3");
        assert_eq!(
            [first.user_count, second.user_count, third.user_count],
            [1, 2, 3]
        );
        let found = repos.users().find_by_username("user_u2").unwrap().unwrap();
        assert_eq!(found.id, "u2");
        assert_eq!(found.password, "pw_u2");
    }

    #[test]
    fn failed_user_insert_does_not_consume_a_count() {
        let conn = setup_conn();
        let repos = SqliteRepositories::new(&conn);
        user(&repos, "u1");
        let duplicate = repos.users().create(&NewUser {
            id: "u2".into(),
            username: "user_u1".into(),
            password: "other".into(),
            created_at: "2024-01-01T00:00:00Z".into(),
        });
        assert!(duplicate.is_err());
        assert_eq!(user(&repos, "u3").user_count, 2);
    }

    #[test]
    fn user_posts_are_paged_newest_first() {
        let conn = setup_conn();
        let repos = SqliteRepositories::new(&conn);
        user(&repos, "u1");
        user(&repos, "u2");
        for day in 1..=5 {
            post(&repos, &format!("p{day}"), "u1", &format!("2024-01-0{day}T00:00:00Z"));
        }
        post(&repos, "other", "u2", "2024-01-09T00:00:00Z");

        let page = repos.posts().list_for_user("u1", 1, 2).unwrap();
        assert_eq!(page.total, 5);
        let ids: Vec<_> = page.posts.iter().map(|p| p.post.id.as_str()).collect();
        assert_eq!(ids, vec!["p5", "p4"]);

        let last = repos.posts().list_for_user("u1", 3, 2).unwrap();
        assert_eq!(last.posts.len(), 1);
        assert_eq!(last.posts[0].post.id, "p1");
        assert_eq!(
            last.posts[0].author.as_ref().map(|a| a.username.as_str()),
            Some("user_u1")
        );
    }

    #[test]
    fn safest_orders_green_desc_then_red_asc_then_newest() {
        let conn = setup_conn();
        let repos = SqliteRepositories::new(&conn);
        user(&repos, "u1");
        let rows = [
            ("more_red", 1, 5, "2024-01-01T00:00:00Z"),
            ("older", 0, 5, "2024-01-02T00:00:00Z"),
            ("newer", 0, 5, "2024-01-03T00:00:00Z"),
            ("greenest", 0, 9, "2024-01-01T00:00:00Z"),
            ("unflagged", 0, 0, "2024-01-05T00:00:00Z"),
            ("hidden", 0, 50, "2024-01-06T00:00:00Z"),
        ];
        for (id, red, green, created_at) in rows {
            post(&repos, id, "u1", created_at);
            conn.execute(
                "UPDATE posts SET red_flags = ?1, green_flags = ?2 WHERE id = ?3",
                rusqlite::params![red, green, id],
            )
            .unwrap();
        }
        conn.execute("UPDATE posts SET is_active = 0 WHERE id = 'hidden'", [])
            .unwrap();

        let ranked = repos.posts().list_safest(20).unwrap();
        let ids: Vec<_> = ranked.iter().map(|p| p.post.id.as_str()).collect();
        assert_eq!(ids, vec!["greenest", "newer", "older", "more_red", "unflagged"]);

        let top = repos.posts().list_safest(2).unwrap();
        let ids: Vec<_> = top.iter().map(|p| p.post.id.as_str()).collect();
        assert_eq!(ids, vec!["greenest", "newer"]);
    }

    #[test]
    fn paging_past_the_addressable_range_is_empty() {
        let conn = setup_conn();
        let repos = SqliteRepositories::new(&conn);
        user(&repos, "u1");
        post(&repos, "p1", "u1", "2024-01-01T00:00:00Z");
        let page = repos.posts().list_for_user("u1", usize::MAX, 2).unwrap();
        assert!(page.posts.is_empty());
        assert_eq!(page.total, 1);
        assert!(repos.posts().list_safest(usize::MAX).is_err());
    }

    #[test]
    fn comments_list_newest_first_and_skip_inactive() {
        let conn = setup_conn();
        let repos = SqliteRepositories::new(&conn);
        user(&repos, "u1");
        post(&repos, "p1", "u1", "2024-01-01T00:00:00Z");
        comment(&repos, "c1", "p1", "u1", "2024-01-01T00:00:01Z");
        comment(&repos, "c2", "p1", "u1", "2024-01-01T00:00:02Z");
        comment(&repos, "c3", "p2", "u1", "2024-01-01T00:00:03Z");

        let listed = repos.comments().list_for_post("p1", 50).unwrap();
        let ids: Vec<_> = listed.iter().map(|c| c.comment.id.as_str()).collect();
        assert_eq!(ids, vec!["c2", "c1"]);

        assert_eq!(repos.comments().set_active_for_post("p1", false).unwrap(), 2);
        assert!(repos.comments().list_for_post("p1", 50).unwrap().is_empty());
        let kept = repos.comments().get("c1").unwrap().expect("soft deleted row kept");
        assert!(!kept.is_active);
    }

    #[test]
    fn post_delete_cascades_to_comments_and_ledger() {
        let conn = setup_conn();
        let repos = SqliteRepositories::new(&conn);
        user(&repos, "u1");
        user(&repos, "u2");
        post(&repos, "p1", "u1", "2024-01-01T00:00:00Z");
        comment(&repos, "c1", "p1", "u2", "2024-01-01T00:00:01Z");
        let target = repos.votes().load_target::<FlagKind>("p1").unwrap().unwrap();
        let decision = decide(&target, "u2", FlagKind::RedFlag);
        repos
            .votes()
            .save_target(&decision.next, decision.write.as_ref().unwrap())
            .unwrap();

        assert!(repos.posts().delete_cascade("p1").unwrap());
        assert!(repos.posts().get("p1").unwrap().is_none());
        assert!(!repos.comments().get("c1").unwrap().unwrap().is_active);
        let ledger_rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM votes WHERE target_id = 'p1'", [], |row| row.get(0))
            .unwrap();
        assert_eq!(ledger_rows, 0);
        assert!(!repos.posts().delete_cascade("p1").unwrap());
    }

    #[test]
    fn transaction_rolls_back_every_statement() {
        let conn = setup_conn();
        let repos = SqliteRepositories::new(&conn);
        user(&repos, "u1");
        let result: Result<()> = repos.transaction(|repos| {
            repos.users().increment_comments_posted("u1", 1)?;
            // nested self-transacting call joins the outer transaction
            repos.users().create(&NewUser {
                id: "u2".into(),
                username: "user_u2".into(),
                password: "pw".into(),
                created_at: "2024-01-01T00:00:00Z".into(),
            })?;
            anyhow::bail!("abort");
        });
        assert!(result.is_err());
        let u1 = repos.users().get("u1").unwrap().unwrap();
        assert_eq!(u1.comments_posted, 0);
        assert!(repos.users().get("u2").unwrap().is_none());
    }
}
