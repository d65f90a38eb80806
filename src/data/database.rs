//! SQLite database operations
//!
//! All database access goes through this module.
//! Relationship state lives in edge tables (`follows`, `friend_requests`,
//! `blocks`); every mutation touching more than one edge runs inside a
//! single `BEGIN IMMEDIATE` transaction together with its precondition
//! checks.

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::time::Duration;

use super::models::*;
use crate::error::AppError;

/// Database connection pool wrapper
#[derive(Debug, Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
}

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Mutual follow edges as `(f.follower_id, f.followee_id)` pairs.
///
/// The SQL side of `PairState::is_friend`; every friendship query joins
/// through this fragment.
const FRIEND_EDGES: &str =
    "follows f JOIN follows r ON r.follower_id = f.followee_id AND r.followee_id = f.follower_id";

/// Commit on success, roll back on failure.
///
/// A failed COMMIT leaves the transaction open, so it is rolled back too.
async fn finish_transaction<T>(
    conn: &mut SqliteConnection,
    result: Result<T, AppError>,
) -> Result<T, AppError> {
    match result {
        Ok(value) => match sqlx::query("COMMIT").execute(&mut *conn).await {
            Ok(_) => Ok(value),
            Err(error) => {
                let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
                Err(error.into())
            }
        },
        Err(error) => {
            let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
            Err(error)
        }
    }
}

async fn run_immediate<T, F>(pool: Pool<Sqlite>, work: F) -> Result<T, AppError>
where
    F: for<'c> FnOnce(&'c mut SqliteConnection) -> BoxFuture<'c, Result<T, AppError>>,
{
    let mut conn = pool.acquire().await?;
    sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;
    let result = work(&mut *conn).await;
    finish_transaction(&mut conn, result).await
}

async fn ensure_user_exists(conn: &mut SqliteConnection, user_id: &str) -> Result<(), AppError> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_one(&mut *conn)
        .await?;

    if count == 0 {
        return Err(AppError::NotFound("User".to_string()));
    }

    Ok(())
}

/// Read every edge between `subject` and `other` in one round trip.
async fn load_pair_state(
    conn: &mut SqliteConnection,
    subject: &str,
    other: &str,
) -> Result<PairState, AppError> {
    let edges = sqlx::query_as::<_, (String, String)>(
        r#"
        SELECT 'follow', follower_id FROM follows
         WHERE (follower_id = ? AND followee_id = ?) OR (follower_id = ? AND followee_id = ?)
        UNION ALL
        SELECT 'request', sender_id FROM friend_requests
         WHERE (sender_id = ? AND receiver_id = ?) OR (sender_id = ? AND receiver_id = ?)
        UNION ALL
        SELECT 'block', blocker_id FROM blocks
         WHERE (blocker_id = ? AND blocked_id = ?) OR (blocker_id = ? AND blocked_id = ?)
        "#,
    )
    .bind(subject)
    .bind(other)
    .bind(other)
    .bind(subject)
    .bind(subject)
    .bind(other)
    .bind(other)
    .bind(subject)
    .bind(subject)
    .bind(other)
    .bind(other)
    .bind(subject)
    .fetch_all(&mut *conn)
    .await?;

    let mut state = PairState::default();
    for (kind, source) in edges {
        let outgoing = source == subject;
        match (kind.as_str(), outgoing) {
            ("follow", true) => state.following = true,
            ("follow", false) => state.followed_by = true,
            ("request", true) => state.requested = true,
            ("request", false) => state.requested_by = true,
            ("block", true) => state.blocking = true,
            ("block", false) => state.blocked_by = true,
            _ => {}
        }
    }

    Ok(state)
}

async fn load_counts(
    conn: &mut SqliteConnection,
    user_id: &str,
) -> Result<RelationshipCounts, AppError> {
    let query = format!(
        r#"
        SELECT
            (SELECT COUNT(*) FROM follows WHERE followee_id = ?),
            (SELECT COUNT(*) FROM follows WHERE follower_id = ?),
            (SELECT COUNT(*) FROM {FRIEND_EDGES} WHERE f.follower_id = ?),
            (SELECT COUNT(*) FROM friend_requests WHERE receiver_id = ?)
        "#
    );
    let (followers, following, friends, pending_requests) =
        sqlx::query_as::<_, (i64, i64, i64, i64)>(&query)
            .bind(user_id)
            .bind(user_id)
            .bind(user_id)
            .bind(user_id)
            .fetch_one(&mut *conn)
            .await?;

    Ok(RelationshipCounts {
        followers,
        following,
        friends,
        pending_requests,
    })
}

async fn load_snapshot(
    conn: &mut SqliteConnection,
    subject: &str,
    other: &str,
) -> Result<RelationshipSnapshot, AppError> {
    let pair = load_pair_state(conn, subject, other).await?;
    let counts = load_counts(conn, subject).await?;
    Ok(RelationshipSnapshot {
        user_id: other.to_string(),
        pair,
        counts,
    })
}

async fn delete_requests_between(
    conn: &mut SqliteConnection,
    a: &str,
    b: &str,
) -> Result<u64, AppError> {
    let result = sqlx::query(
        "DELETE FROM friend_requests WHERE (sender_id = ? AND receiver_id = ?) OR (sender_id = ? AND receiver_id = ?)",
    )
    .bind(a)
    .bind(b)
    .bind(b)
    .bind(a)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected())
}

async fn insert_follow_edge(
    conn: &mut SqliteConnection,
    follower_id: &str,
    followee_id: &str,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    sqlx::query(
        "INSERT OR IGNORE INTO follows (follower_id, followee_id, created_at) VALUES (?, ?, ?)",
    )
    .bind(follower_id)
    .bind(followee_id)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

fn parse_reaction_type(raw: &str) -> Result<ReactionType, AppError> {
    raw.parse::<ReactionType>()
        .map_err(|e| AppError::Internal(anyhow::anyhow!("corrupt reaction row: {e}")))
}

async fn load_reaction_entries(
    conn: &mut SqliteConnection,
    post_id: &str,
) -> Result<Vec<ReactionEntry>, AppError> {
    let rows = sqlx::query_as::<_, (String, String)>(
        "SELECT user_id, reaction_type FROM reactions WHERE post_id = ? ORDER BY rowid ASC",
    )
    .bind(post_id)
    .fetch_all(&mut *conn)
    .await?;

    rows.into_iter()
        .map(|(user_id, raw)| {
            Ok(ReactionEntry {
                user_id,
                reaction_type: parse_reaction_type(&raw)?,
            })
        })
        .collect()
}

impl Database {
    // =========================================================================
    // Connection
    // =========================================================================

    /// Connect to SQLite database
    ///
    /// Creates the database file if it doesn't exist.
    /// Runs pending migrations automatically.
    ///
    /// # Errors
    /// Returns error if connection or migration fails
    pub async fn connect(path: &Path) -> Result<Self, AppError> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| AppError::Database(sqlx::Error::Io(e)))?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(BUSY_TIMEOUT);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| {
                tracing::error!("Migration failed: {}", e);
                AppError::Internal(anyhow::anyhow!("Migration failed: {}", e))
            })?;

        tracing::info!(path = %path.display(), "Database connected and migrated successfully");

        Ok(Self { pool })
    }

    /// Run `work` inside one `BEGIN IMMEDIATE` transaction on its own task
    ///
    /// The caller may be dropped mid-request (client disconnect); the
    /// spawned task still reaches COMMIT or ROLLBACK, so a pooled
    /// connection never goes back with the write lock held.
    async fn write_transaction<T, F>(&self, work: F) -> Result<T, AppError>
    where
        T: Send + 'static,
        F: for<'c> FnOnce(&'c mut SqliteConnection) -> BoxFuture<'c, Result<T, AppError>>
            + Send
            + 'static,
    {
        tokio::spawn(run_immediate(self.pool.clone(), work))
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("transaction task failed: {e}")))?
    }

    // =========================================================================
    // Users
    // =========================================================================

    /// Insert a user or refresh its display fields
    ///
    /// Called with the identity resolved from the session token so that
    /// every authenticated actor has a row to hang edges on.
    pub async fn upsert_user_profile(
        &self,
        id: &str,
        username: &str,
        name: &str,
    ) -> Result<(), AppError> {
        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO users (id, username, name, profile_picture, bio, created_at, updated_at)
            VALUES (?, ?, ?, NULL, NULL, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                username = excluded.username,
                name = excluded.name,
                updated_at = excluded.updated_at
            WHERE users.username <> excluded.username OR users.name <> excluded.name
            "#,
        )
        .bind(id)
        .bind(username)
        .bind(name)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_user(&self, id: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    // =========================================================================
    // Relationships (reads)
    // =========================================================================

    /// Assemble the six adjacency sets of a user from the edge tables
    pub async fn get_user_relations(&self, user_id: &str) -> Result<UserRelations, AppError> {
        let edges = sqlx::query_as::<_, (String, String)>(
            r#"
            SELECT 'following', followee_id FROM follows WHERE follower_id = ?
            UNION ALL SELECT 'followers', follower_id FROM follows WHERE followee_id = ?
            UNION ALL SELECT 'friend_requests', sender_id FROM friend_requests WHERE receiver_id = ?
            UNION ALL SELECT 'sent_friend_requests', receiver_id FROM friend_requests WHERE sender_id = ?
            UNION ALL SELECT 'blocked_users', blocked_id FROM blocks WHERE blocker_id = ?
            UNION ALL SELECT 'blocked_by', blocker_id FROM blocks WHERE blocked_id = ?
            "#,
        )
        .bind(user_id)
        .bind(user_id)
        .bind(user_id)
        .bind(user_id)
        .bind(user_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let mut relations = UserRelations {
            user_id: user_id.to_string(),
            ..UserRelations::default()
        };
        for (set, other) in edges {
            let target = match set.as_str() {
                "following" => &mut relations.following,
                "followers" => &mut relations.followers,
                "friend_requests" => &mut relations.friend_requests,
                "sent_friend_requests" => &mut relations.sent_friend_requests,
                "blocked_users" => &mut relations.blocked_users,
                "blocked_by" => &mut relations.blocked_by,
                _ => continue,
            };
            target.insert(other);
        }

        Ok(relations)
    }

    /// Current pair state and `subject`'s counts
    pub async fn get_relationship(
        &self,
        subject: &str,
        other: &str,
    ) -> Result<RelationshipSnapshot, AppError> {
        let mut conn = self.pool.acquire().await?;
        load_snapshot(&mut conn, subject, other).await
    }

    pub async fn get_pair_state(&self, subject: &str, other: &str) -> Result<PairState, AppError> {
        let mut conn = self.pool.acquire().await?;
        load_pair_state(&mut conn, subject, other).await
    }

    /// Pending incoming friend requests, newest first
    pub async fn get_incoming_friend_requests(
        &self,
        receiver_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<UserSummary>, AppError> {
        let requests = sqlx::query_as::<_, UserSummary>(
            r#"
            SELECT u.id, u.username, u.name, u.profile_picture, fr.created_at AS since
              FROM friend_requests fr
              JOIN users u ON u.id = fr.sender_id
             WHERE fr.receiver_id = ?
             ORDER BY fr.created_at DESC, fr.sender_id DESC
             LIMIT ? OFFSET ?
            "#,
        )
        .bind(receiver_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(requests)
    }

    pub async fn count_incoming_friend_requests(&self, receiver_id: &str) -> Result<i64, AppError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM friend_requests WHERE receiver_id = ?")
                .bind(receiver_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }

    /// Users mutually following `user_id`
    pub async fn get_friends(&self, user_id: &str) -> Result<Vec<UserSummary>, AppError> {
        let query = format!(
            r#"
            SELECT u.id, u.username, u.name, u.profile_picture, f.created_at AS since
              FROM {FRIEND_EDGES}
              JOIN users u ON u.id = f.followee_id
             WHERE f.follower_id = ?
             ORDER BY u.username ASC
            "#
        );
        let friends = sqlx::query_as::<_, UserSummary>(&query)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(friends)
    }

    pub async fn get_blocked_users(&self, blocker_id: &str) -> Result<Vec<UserSummary>, AppError> {
        let blocked = sqlx::query_as::<_, UserSummary>(
            r#"
            SELECT u.id, u.username, u.name, u.profile_picture, b.created_at AS since
              FROM blocks b
              JOIN users u ON u.id = b.blocked_id
             WHERE b.blocker_id = ?
             ORDER BY b.created_at DESC
            "#,
        )
        .bind(blocker_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(blocked)
    }

    // =========================================================================
    // Relationships (mutations)
    // =========================================================================

    /// Record a pending friend request from `sender_id` to `receiver_id`
    ///
    /// Rejects the request when the pair is already friends, a request
    /// exists in either direction, or either side has blocked the other.
    pub async fn send_friend_request(
        &self,
        sender_id: &str,
        receiver_id: &str,
    ) -> Result<RelationshipSnapshot, AppError> {
        let sender_id = sender_id.to_string();
        let receiver_id = receiver_id.to_string();

        self.write_transaction(move |conn| {
            Box::pin(async move {
                ensure_user_exists(conn, &sender_id).await?;
                ensure_user_exists(conn, &receiver_id).await?;

                let pair = load_pair_state(conn, &sender_id, &receiver_id).await?;
                if pair.has_block() {
                    return Err(AppError::Conflict(
                        "Cannot send a friend request while a block is in place".to_string(),
                    ));
                }
                if pair.is_friend() {
                    return Err(AppError::Conflict("You are already friends".to_string()));
                }
                if pair.requested {
                    return Err(AppError::Conflict("Friend request already sent".to_string()));
                }
                if pair.requested_by {
                    return Err(AppError::Conflict(
                        "Friend request already received".to_string(),
                    ));
                }

                sqlx::query(
                    "INSERT INTO friend_requests (sender_id, receiver_id, created_at) VALUES (?, ?, ?)",
                )
                .bind(&sender_id)
                .bind(&receiver_id)
                .bind(Utc::now())
                .execute(&mut *conn)
                .await?;

                load_snapshot(conn, &sender_id, &receiver_id).await
            })
        })
        .await
    }

    /// Turn the request `sender_id -> receiver_id` into mutual follows
    pub async fn accept_friend_request(
        &self,
        receiver_id: &str,
        sender_id: &str,
    ) -> Result<RelationshipSnapshot, AppError> {
        let receiver_id = receiver_id.to_string();
        let sender_id = sender_id.to_string();

        self.write_transaction(move |conn| {
            Box::pin(async move {
                let pair = load_pair_state(conn, &receiver_id, &sender_id).await?;
                if !pair.requested_by {
                    return Err(AppError::NotFound("Friend request".to_string()));
                }

                delete_requests_between(conn, &receiver_id, &sender_id).await?;

                let now = Utc::now();
                insert_follow_edge(conn, &receiver_id, &sender_id, now).await?;
                insert_follow_edge(conn, &sender_id, &receiver_id, now).await?;

                load_snapshot(conn, &receiver_id, &sender_id).await
            })
        })
        .await
    }

    /// Drop the pending request `sender_id -> receiver_id`
    ///
    /// Used both for rejecting (by the receiver) and cancelling (by the
    /// sender); `perspective` picks whose counts come back.
    pub async fn delete_friend_request(
        &self,
        sender_id: &str,
        receiver_id: &str,
        perspective: &str,
    ) -> Result<RelationshipSnapshot, AppError> {
        let sender_id = sender_id.to_string();
        let receiver_id = receiver_id.to_string();
        let (perspective, other) = if perspective == sender_id {
            (sender_id.clone(), receiver_id.clone())
        } else {
            (receiver_id.clone(), sender_id.clone())
        };

        self.write_transaction(move |conn| {
            Box::pin(async move {
                let deleted = sqlx::query(
                    "DELETE FROM friend_requests WHERE sender_id = ? AND receiver_id = ?",
                )
                .bind(&sender_id)
                .bind(&receiver_id)
                .execute(&mut *conn)
                .await?;
                if deleted.rows_affected() == 0 {
                    return Err(AppError::NotFound("Friend request".to_string()));
                }

                load_snapshot(conn, &perspective, &other).await
            })
        })
        .await
    }

    /// Flip the follow edge `actor_id -> target_id`
    ///
    /// Returns whether the actor follows the target afterwards. Following
    /// across a block is refused. A follow that completes a mutual pair
    /// clears any request still pending between the two.
    pub async fn toggle_follow(
        &self,
        actor_id: &str,
        target_id: &str,
    ) -> Result<(bool, RelationshipSnapshot), AppError> {
        let actor_id = actor_id.to_string();
        let target_id = target_id.to_string();

        self.write_transaction(move |conn| {
            Box::pin(async move {
                ensure_user_exists(conn, &actor_id).await?;
                ensure_user_exists(conn, &target_id).await?;

                let pair = load_pair_state(conn, &actor_id, &target_id).await?;
                let now_following = if pair.following {
                    sqlx::query("DELETE FROM follows WHERE follower_id = ? AND followee_id = ?")
                        .bind(&actor_id)
                        .bind(&target_id)
                        .execute(&mut *conn)
                        .await?;
                    false
                } else {
                    if pair.has_block() {
                        return Err(AppError::Conflict(
                            "Cannot follow a user while a block is in place".to_string(),
                        ));
                    }
                    insert_follow_edge(conn, &actor_id, &target_id, Utc::now()).await?;
                    if pair.followed_by && pair.has_pending_request() {
                        delete_requests_between(conn, &actor_id, &target_id).await?;
                    }
                    true
                };

                let snapshot = load_snapshot(conn, &actor_id, &target_id).await?;
                Ok::<_, AppError>((now_following, snapshot))
            })
        })
        .await
    }

    /// Block `blocked_id` and purge every follow and request edge between the pair
    pub async fn block_user(
        &self,
        blocker_id: &str,
        blocked_id: &str,
    ) -> Result<RelationshipSnapshot, AppError> {
        let blocker_id = blocker_id.to_string();
        let blocked_id = blocked_id.to_string();

        self.write_transaction(move |conn| {
            Box::pin(async move {
                ensure_user_exists(conn, &blocker_id).await?;
                ensure_user_exists(conn, &blocked_id).await?;

                let pair = load_pair_state(conn, &blocker_id, &blocked_id).await?;
                if pair.blocking {
                    return Err(AppError::Conflict("User is already blocked".to_string()));
                }

                sqlx::query(
                    "INSERT INTO blocks (blocker_id, blocked_id, created_at) VALUES (?, ?, ?)",
                )
                .bind(&blocker_id)
                .bind(&blocked_id)
                .bind(Utc::now())
                .execute(&mut *conn)
                .await?;

                sqlx::query(
                    "DELETE FROM follows WHERE (follower_id = ? AND followee_id = ?) OR (follower_id = ? AND followee_id = ?)",
                )
                .bind(&blocker_id)
                .bind(&blocked_id)
                .bind(&blocked_id)
                .bind(&blocker_id)
                .execute(&mut *conn)
                .await?;

                delete_requests_between(conn, &blocker_id, &blocked_id).await?;

                load_snapshot(conn, &blocker_id, &blocked_id).await
            })
        })
        .await
    }

    /// Remove the block edge only; purged history stays purged
    pub async fn unblock_user(
        &self,
        blocker_id: &str,
        blocked_id: &str,
    ) -> Result<RelationshipSnapshot, AppError> {
        let blocker_id = blocker_id.to_string();
        let blocked_id = blocked_id.to_string();

        self.write_transaction(move |conn| {
            Box::pin(async move {
                ensure_user_exists(conn, &blocked_id).await?;

                let deleted =
                    sqlx::query("DELETE FROM blocks WHERE blocker_id = ? AND blocked_id = ?")
                        .bind(&blocker_id)
                        .bind(&blocked_id)
                        .execute(&mut *conn)
                        .await?;
                if deleted.rows_affected() == 0 {
                    return Err(AppError::Conflict("User is not blocked".to_string()));
                }

                load_snapshot(conn, &blocker_id, &blocked_id).await
            })
        })
        .await
    }

    // =========================================================================
    // Content authorship
    // =========================================================================

    pub async fn insert_post(&self, post: &Post) -> Result<(), AppError> {
        sqlx::query("INSERT INTO posts (id, author_id, created_at) VALUES (?, ?, ?)")
            .bind(&post.id)
            .bind(&post.author_id)
            .bind(post.created_at)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn get_post(&self, id: &str) -> Result<Option<Post>, AppError> {
        let post = sqlx::query_as::<_, Post>("SELECT * FROM posts WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(post)
    }

    pub async fn insert_story(&self, story: &Story) -> Result<(), AppError> {
        sqlx::query("INSERT INTO stories (id, author_id, created_at) VALUES (?, ?, ?)")
            .bind(&story.id)
            .bind(&story.author_id)
            .bind(story.created_at)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn get_story(&self, id: &str) -> Result<Option<Story>, AppError> {
        let story = sqlx::query_as::<_, Story>("SELECT * FROM stories WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(story)
    }

    // =========================================================================
    // Reactions
    // =========================================================================

    /// Apply a reaction change as one read-modify-write
    ///
    /// * `None` removes the actor's entry if any.
    /// * The actor's current type removes the entry (toggle off).
    /// * Any other type replaces the entry; the row is re-inserted so
    ///   insertion order tracks the current type.
    pub async fn set_reaction(
        &self,
        post_id: &str,
        user_id: &str,
        desired: Option<ReactionType>,
    ) -> Result<ReactionOutcome, AppError> {
        let post_id = post_id.to_string();
        let user_id = user_id.to_string();

        self.write_transaction(move |conn| {
            Box::pin(async move {
                let post = sqlx::query_as::<_, Post>("SELECT * FROM posts WHERE id = ?")
                    .bind(&post_id)
                    .fetch_optional(&mut *conn)
                    .await?
                    .ok_or_else(|| AppError::NotFound("Post".to_string()))?;

                let previous = sqlx::query_scalar::<_, String>(
                    "SELECT reaction_type FROM reactions WHERE post_id = ? AND user_id = ?",
                )
                .bind(&post_id)
                .bind(&user_id)
                .fetch_optional(&mut *conn)
                .await?
                .map(|raw| parse_reaction_type(&raw))
                .transpose()?;

                let current = match (previous, desired) {
                    (_, None) => None,
                    (Some(existing), Some(wanted)) if existing == wanted => None,
                    (_, Some(wanted)) => Some(wanted),
                };

                if previous.is_some() && previous != current {
                    sqlx::query("DELETE FROM reactions WHERE post_id = ? AND user_id = ?")
                        .bind(&post_id)
                        .bind(&user_id)
                        .execute(&mut *conn)
                        .await?;
                }
                if let Some(kind) = current {
                    if previous != current {
                        sqlx::query(
                            "INSERT INTO reactions (post_id, user_id, reaction_type, created_at) VALUES (?, ?, ?, ?)",
                        )
                        .bind(&post_id)
                        .bind(&user_id)
                        .bind(kind.as_str())
                        .bind(Utc::now())
                        .execute(&mut *conn)
                        .await?;
                    }
                }

                let entries = load_reaction_entries(conn, &post_id).await?;

                Ok::<_, AppError>(ReactionOutcome {
                    post,
                    previous,
                    current,
                    entries,
                })
            })
        })
        .await
    }

    /// Reaction entries of a post, oldest first
    pub async fn get_reaction_entries(&self, post_id: &str) -> Result<Vec<ReactionEntry>, AppError> {
        let mut conn = self.pool.acquire().await?;
        load_reaction_entries(&mut conn, post_id).await
    }

    pub async fn get_reactors(
        &self,
        post_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Reactor>, AppError> {
        let reactors = sqlx::query_as::<_, Reactor>(
            r#"
            SELECT u.id, u.username, u.name, u.profile_picture, r.reaction_type, r.created_at AS since
              FROM reactions r
              JOIN users u ON u.id = r.user_id
             WHERE r.post_id = ?
             ORDER BY r.rowid DESC
             LIMIT ? OFFSET ?
            "#,
        )
        .bind(post_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(reactors)
    }

    pub async fn count_reactions(&self, post_id: &str) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM reactions WHERE post_id = ?")
            .bind(post_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    // =========================================================================
    // Comments / Shares / Story likes
    // =========================================================================

    pub async fn insert_comment(&self, comment: &Comment) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO comments (id, post_id, author_id, content, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&comment.id)
        .bind(&comment.post_id)
        .bind(&comment.author_id)
        .bind(&comment.content)
        .bind(comment.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn count_comments(&self, post_id: &str) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM comments WHERE post_id = ?")
            .bind(post_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// Record a share and return the post's new share count
    pub async fn insert_share(&self, post_id: &str, user_id: &str) -> Result<i64, AppError> {
        let post_id = post_id.to_string();
        let user_id = user_id.to_string();

        self.write_transaction(move |conn| {
            Box::pin(async move {
                sqlx::query(
                    "INSERT INTO post_shares (id, post_id, user_id, created_at) VALUES (?, ?, ?, ?)",
                )
                .bind(EntityId::new().0)
                .bind(&post_id)
                .bind(&user_id)
                .bind(Utc::now())
                .execute(&mut *conn)
                .await?;

                let count: i64 =
                    sqlx::query_scalar("SELECT COUNT(*) FROM post_shares WHERE post_id = ?")
                        .bind(&post_id)
                        .fetch_one(&mut *conn)
                        .await?;
                Ok::<_, AppError>(count)
            })
        })
        .await
    }

    pub async fn count_shares(&self, post_id: &str) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM post_shares WHERE post_id = ?")
            .bind(post_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    pub async fn has_story_like(&self, story_id: &str, user_id: &str) -> Result<bool, AppError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM story_likes WHERE story_id = ? AND user_id = ?",
        )
        .bind(story_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count > 0)
    }

    /// Flip the actor's like on a story
    ///
    /// Returns whether the story is liked afterwards and its like count.
    pub async fn toggle_story_like(
        &self,
        story_id: &str,
        user_id: &str,
    ) -> Result<(bool, i64), AppError> {
        let story_id = story_id.to_string();
        let user_id = user_id.to_string();

        self.write_transaction(move |conn| {
            Box::pin(async move {
                let removed =
                    sqlx::query("DELETE FROM story_likes WHERE story_id = ? AND user_id = ?")
                        .bind(&story_id)
                        .bind(&user_id)
                        .execute(&mut *conn)
                        .await?;

                let liked = if removed.rows_affected() == 0 {
                    sqlx::query(
                        "INSERT INTO story_likes (story_id, user_id, created_at) VALUES (?, ?, ?)",
                    )
                    .bind(&story_id)
                    .bind(&user_id)
                    .bind(Utc::now())
                    .execute(&mut *conn)
                    .await?;
                    true
                } else {
                    false
                };

                let count: i64 =
                    sqlx::query_scalar("SELECT COUNT(*) FROM story_likes WHERE story_id = ?")
                        .bind(&story_id)
                        .fetch_one(&mut *conn)
                        .await?;

                Ok::<_, AppError>((liked, count))
            })
        })
        .await
    }

    // =========================================================================
    // Notifications
    // =========================================================================

    /// Insert notification
    pub async fn insert_notification(&self, notification: &Notification) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO notifications (
                id, recipient_id, sender_id, notification_type,
                post_id, story_id, comment_id, message, is_read, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&notification.id)
        .bind(&notification.recipient_id)
        .bind(&notification.sender_id)
        .bind(&notification.notification_type)
        .bind(&notification.post_id)
        .bind(&notification.story_id)
        .bind(&notification.comment_id)
        .bind(&notification.message)
        .bind(notification.is_read)
        .bind(notification.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get a recipient's notifications, newest first
    pub async fn get_notifications(
        &self,
        recipient_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<NotificationWithSender>, AppError> {
        let notifications = sqlx::query_as::<_, NotificationWithSender>(
            r#"
            SELECT n.*,
                   u.username AS sender_username,
                   u.name AS sender_name,
                   u.profile_picture AS sender_profile_picture
              FROM notifications n
              LEFT JOIN users u ON u.id = n.sender_id
             WHERE n.recipient_id = ?
             ORDER BY n.created_at DESC, n.id DESC
             LIMIT ? OFFSET ?
            "#,
        )
        .bind(recipient_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(notifications)
    }

    pub async fn count_notifications(&self, recipient_id: &str) -> Result<i64, AppError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE recipient_id = ?")
                .bind(recipient_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }

    pub async fn count_unread_notifications(&self, recipient_id: &str) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE recipient_id = ? AND is_read = 0",
        )
        .bind(recipient_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    /// Mark one of `recipient_id`'s notifications as read
    ///
    /// Returns `None` when no such notification belongs to the recipient.
    pub async fn mark_notification_read(
        &self,
        id: &str,
        recipient_id: &str,
    ) -> Result<Option<Notification>, AppError> {
        let notification = sqlx::query_as::<_, Notification>(
            "UPDATE notifications SET is_read = 1 WHERE id = ? AND recipient_id = ? RETURNING *",
        )
        .bind(id)
        .bind(recipient_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(notification)
    }

    /// Mark all of a recipient's unread notifications as read
    pub async fn mark_all_notifications_read(&self, recipient_id: &str) -> Result<u64, AppError> {
        let result = sqlx::query(
            "UPDATE notifications SET is_read = 1 WHERE recipient_id = ? AND is_read = 0",
        )
        .bind(recipient_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Delete notifications created before `cutoff`
    pub async fn delete_notifications_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM notifications WHERE created_at < ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    // =========================================================================
    // Test helpers
    // =========================================================================

    #[cfg(test)]
    pub(crate) async fn pragma_for_test(&self, name: &str) -> Result<String, AppError> {
        use sqlx::Row;
        let row = sqlx::query(&format!("PRAGMA {name}"))
            .fetch_one(&self.pool)
            .await?;
        let value: String = row.try_get_unchecked(0)?;

        Ok(value)
    }

    #[cfg(test)]
    pub(crate) async fn backdate_notification_for_test(
        &self,
        id: &str,
        created_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        sqlx::query("UPDATE notifications SET created_at = ? WHERE id = ?")
            .bind(created_at)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
