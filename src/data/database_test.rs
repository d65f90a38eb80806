//! Database tests

use super::*;
use crate::error::AppError;
use chrono::{Duration, Utc};
use futures::FutureExt;
use tempfile::TempDir;

/// Helper to create a test database
async fn create_test_db() -> (Database, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");
    let db = Database::connect(&db_path).await.unwrap();
    (db, temp_dir)
}

async fn seed_user(db: &Database, id: &str) {
    db.upsert_user_profile(id, id, &format!("User {id}"))
        .await
        .unwrap();
}

async fn seed_post(db: &Database, id: &str, author: &str) {
    db.insert_post(&Post {
        id: id.to_string(),
        author_id: author.to_string(),
        created_at: Utc::now(),
    })
    .await
    .unwrap();
}

/// The request pair must always be seen from both sides or neither.
async fn assert_request_symmetry(db: &Database, users: &[&str]) {
    for a in users {
        let a_rel = db.get_user_relations(a).await.unwrap();
        for b in users {
            let b_rel = db.get_user_relations(b).await.unwrap();
            assert_eq!(
                a_rel.sent_friend_requests.contains(*b),
                b_rel.friend_requests.contains(*a),
                "request symmetry broken between {a} and {b}"
            );
        }
    }
}

#[tokio::test]
async fn test_database_connection() {
    let (_db, _temp_dir) = create_test_db().await;
}

#[tokio::test]
async fn test_connection_uses_wal_and_foreign_keys() {
    let (db, _temp_dir) = create_test_db().await;

    assert_eq!(db.pragma_for_test("journal_mode").await.unwrap(), "wal");
    assert_eq!(db.pragma_for_test("foreign_keys").await.unwrap(), "1");
}

#[tokio::test]
async fn test_user_upsert_refreshes_display_fields() {
    let (db, _temp_dir) = create_test_db().await;

    db.upsert_user_profile("u1", "ada", "Ada").await.unwrap();
    db.upsert_user_profile("u1", "ada", "Ada Lovelace")
        .await
        .unwrap();

    let user = db.get_user("u1").await.unwrap().unwrap();
    assert_eq!(user.username, "ada");
    assert_eq!(user.name, "Ada Lovelace");
    assert!(db.get_user("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn test_friend_request_lifecycle() {
    let (db, _temp_dir) = create_test_db().await;
    seed_user(&db, "a").await;
    seed_user(&db, "b").await;

    let snapshot = db.send_friend_request("a", "b").await.unwrap();
    assert!(snapshot.pair.requested);
    assert!(!snapshot.pair.requested_by);

    let a = db.get_user_relations("a").await.unwrap();
    let b = db.get_user_relations("b").await.unwrap();
    assert!(a.sent_friend_requests.contains("b"));
    assert!(b.friend_requests.contains("a"));

    let snapshot = db.accept_friend_request("b", "a").await.unwrap();
    assert!(snapshot.pair.is_friend());
    assert!(!snapshot.pair.has_pending_request());
    assert_eq!(snapshot.counts.friends, 1);

    let a = db.get_user_relations("a").await.unwrap();
    let b = db.get_user_relations("b").await.unwrap();
    assert!(is_friend(&a, &b));
    assert!(a.sent_friend_requests.is_empty());
    assert!(b.friend_requests.is_empty());
    assert!(a.followers.contains("b") && b.followers.contains("a"));
}

#[tokio::test]
async fn test_duplicate_and_reverse_requests_conflict() {
    let (db, _temp_dir) = create_test_db().await;
    seed_user(&db, "a").await;
    seed_user(&db, "b").await;

    db.send_friend_request("a", "b").await.unwrap();

    let duplicate = db.send_friend_request("a", "b").await.unwrap_err();
    assert!(matches!(duplicate, AppError::Conflict(_)));

    let reverse = db.send_friend_request("b", "a").await.unwrap_err();
    assert!(matches!(reverse, AppError::Conflict(_)));

    assert_request_symmetry(&db, &["a", "b"]).await;
}

#[tokio::test]
async fn test_request_to_unknown_user_is_not_found() {
    let (db, _temp_dir) = create_test_db().await;
    seed_user(&db, "a").await;

    let error = db.send_friend_request("a", "ghost").await.unwrap_err();
    assert!(matches!(error, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_second_accept_is_not_found_and_state_is_unchanged() {
    let (db, _temp_dir) = create_test_db().await;
    seed_user(&db, "a").await;
    seed_user(&db, "b").await;

    db.send_friend_request("a", "b").await.unwrap();
    db.accept_friend_request("b", "a").await.unwrap();
    let before = (
        db.get_user_relations("a").await.unwrap(),
        db.get_user_relations("b").await.unwrap(),
    );

    let error = db.accept_friend_request("b", "a").await.unwrap_err();
    assert!(matches!(error, AppError::NotFound(_)));

    let after = (
        db.get_user_relations("a").await.unwrap(),
        db.get_user_relations("b").await.unwrap(),
    );
    assert_eq!(before, after);
}

#[tokio::test]
async fn test_reject_and_cancel_remove_only_the_request() {
    let (db, _temp_dir) = create_test_db().await;
    seed_user(&db, "a").await;
    seed_user(&db, "b").await;
    seed_user(&db, "c").await;

    db.send_friend_request("a", "b").await.unwrap();
    let snapshot = db.delete_friend_request("a", "b", "b").await.unwrap();
    assert!(!snapshot.pair.has_pending_request());
    assert!(!snapshot.pair.following && !snapshot.pair.followed_by);

    db.send_friend_request("a", "c").await.unwrap();
    db.delete_friend_request("a", "c", "a").await.unwrap();

    let error = db.delete_friend_request("a", "c", "a").await.unwrap_err();
    assert!(matches!(error, AppError::NotFound(_)));

    assert_request_symmetry(&db, &["a", "b", "c"]).await;
}

#[tokio::test]
async fn test_follow_toggle_is_directed() {
    let (db, _temp_dir) = create_test_db().await;
    seed_user(&db, "a").await;
    seed_user(&db, "b").await;

    let (following, snapshot) = db.toggle_follow("a", "b").await.unwrap();
    assert!(following);
    assert!(snapshot.pair.following);
    assert!(!snapshot.pair.is_friend());

    let b = db.get_user_relations("b").await.unwrap();
    assert!(b.followers.contains("a"));
    assert!(!b.following.contains("a"));

    let (following, _) = db.toggle_follow("a", "b").await.unwrap();
    assert!(!following);
    assert!(db.get_user_relations("b").await.unwrap().followers.is_empty());
}

#[tokio::test]
async fn test_mutual_follow_clears_pending_request() {
    let (db, _temp_dir) = create_test_db().await;
    seed_user(&db, "a").await;
    seed_user(&db, "b").await;

    db.send_friend_request("a", "b").await.unwrap();
    db.toggle_follow("b", "a").await.unwrap();
    let (_, snapshot) = db.toggle_follow("a", "b").await.unwrap();

    assert!(snapshot.pair.is_friend());
    assert!(!snapshot.pair.has_pending_request());
}

#[tokio::test]
async fn test_block_purges_every_edge() {
    let (db, _temp_dir) = create_test_db().await;
    seed_user(&db, "a").await;
    seed_user(&db, "b").await;

    db.send_friend_request("a", "b").await.unwrap();
    db.accept_friend_request("b", "a").await.unwrap();

    let snapshot = db.block_user("a", "b").await.unwrap();
    assert!(snapshot.pair.blocking);
    assert!(!snapshot.pair.is_friend());
    assert!(!snapshot.pair.following && !snapshot.pair.followed_by);
    assert!(!snapshot.pair.has_pending_request());

    let a = db.get_user_relations("a").await.unwrap();
    let b = db.get_user_relations("b").await.unwrap();
    assert!(a.blocked_users.contains("b"));
    assert!(b.blocked_by.contains("a"));
    assert!(a.following.is_empty() && a.followers.is_empty());
    assert!(b.following.is_empty() && b.followers.is_empty());

    let again = db.block_user("a", "b").await.unwrap_err();
    assert!(matches!(again, AppError::Conflict(_)));
}

#[tokio::test]
async fn test_block_blocks_new_edges() {
    let (db, _temp_dir) = create_test_db().await;
    seed_user(&db, "a").await;
    seed_user(&db, "b").await;

    db.block_user("a", "b").await.unwrap();

    let request = db.send_friend_request("b", "a").await.unwrap_err();
    assert!(matches!(request, AppError::Conflict(_)));
    let follow = db.toggle_follow("b", "a").await.unwrap_err();
    assert!(matches!(follow, AppError::Conflict(_)));
}

#[tokio::test]
async fn test_unblock_does_not_restore_history() {
    let (db, _temp_dir) = create_test_db().await;
    seed_user(&db, "a").await;
    seed_user(&db, "b").await;

    db.send_friend_request("a", "b").await.unwrap();
    db.accept_friend_request("b", "a").await.unwrap();
    db.block_user("b", "a").await.unwrap();

    let snapshot = db.unblock_user("b", "a").await.unwrap();
    assert_eq!(snapshot.pair, PairState::default());

    let error = db.unblock_user("b", "a").await.unwrap_err();
    assert!(matches!(error, AppError::Conflict(_)));
}

#[tokio::test]
async fn test_dropped_mutation_does_not_hold_the_write_lock() {
    let (db, _temp_dir) = create_test_db().await;
    for id in ["a", "b", "c", "d"] {
        seed_user(&db, id).await;
    }

    // Poll once, then drop, the way axum drops a handler on disconnect
    let _ = db.block_user("c", "d").now_or_never();

    let follow_up = tokio::time::timeout(
        std::time::Duration::from_secs(3),
        db.send_friend_request("a", "b"),
    )
    .await
    .expect("write lock still held after a dropped mutation");
    assert!(follow_up.unwrap().pair.requested);

    // The dropped block still ran to completion
    let mut blocked = false;
    for _ in 0..50 {
        if db.get_pair_state("c", "d").await.unwrap().blocking {
            blocked = true;
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    assert!(blocked);
    db.toggle_follow("a", "c").await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_reactions_and_crossed_requests() {
    let (db, _temp_dir) = create_test_db().await;
    seed_user(&db, "owner").await;
    seed_post(&db, "p1", "owner").await;

    let actors: Vec<String> = (0..16).map(|i| format!("actor{i}")).collect();
    for actor in &actors {
        seed_user(&db, actor).await;
    }

    let kinds = [
        ReactionType::Like,
        ReactionType::Love,
        ReactionType::Wow,
        ReactionType::Haha,
    ];
    let mut tasks = Vec::new();
    for (i, actor) in actors.iter().enumerate() {
        for round in 0..3 {
            let db = db.clone();
            let actor = actor.clone();
            let kind = kinds[(i + round) % kinds.len()];
            tasks.push(tokio::spawn(async move {
                db.set_reaction("p1", &actor, Some(kind)).await
            }));
        }
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let entries = db.get_reaction_entries("p1").await.unwrap();
    let mut users: Vec<_> = entries.iter().map(|e| e.user_id.clone()).collect();
    users.sort();
    users.dedup();
    assert_eq!(users.len(), entries.len());
    assert_eq!(entries.len(), actors.len());

    // Crossed sends between the same pair: exactly one wins
    let pairs: Vec<(String, String)> = actors
        .chunks(2)
        .map(|pair| (pair[0].clone(), pair[1].clone()))
        .collect();
    let mut crossed = Vec::new();
    for (a, b) in &pairs {
        let (db_ab, db_ba) = (db.clone(), db.clone());
        let (a1, b1, a2, b2) = (a.clone(), b.clone(), a.clone(), b.clone());
        crossed.push((
            tokio::spawn(async move { db_ab.send_friend_request(&a1, &b1).await }),
            tokio::spawn(async move { db_ba.send_friend_request(&b2, &a2).await }),
        ));
    }
    for (forward, backward) in crossed {
        let results = [forward.await.unwrap(), backward.await.unwrap()];
        let sent = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(sent, 1);
        assert!(
            results
                .iter()
                .any(|r| matches!(r, Err(AppError::Conflict(_))))
        );
    }

    let ids: Vec<&str> = actors.iter().map(String::as_str).collect();
    assert_request_symmetry(&db, &ids).await;
    for (a, b) in &pairs {
        let pair = db.get_pair_state(a, b).await.unwrap();
        assert!(pair.requested ^ pair.requested_by);
    }
}

#[tokio::test]
async fn test_friend_queries_agree_with_is_friend() {
    let (db, _temp_dir) = create_test_db().await;
    let users = ["a", "b", "c", "d", "e"];
    for id in users {
        seed_user(&db, id).await;
    }

    // a-b via request, a-d via mutual follows, a->c one way, e->a one way
    db.send_friend_request("a", "b").await.unwrap();
    db.accept_friend_request("b", "a").await.unwrap();
    db.toggle_follow("a", "d").await.unwrap();
    db.toggle_follow("d", "a").await.unwrap();
    db.toggle_follow("a", "c").await.unwrap();
    db.toggle_follow("e", "a").await.unwrap();

    for subject in users {
        let relations = db.get_user_relations(subject).await.unwrap();
        let mut expected = Vec::new();
        for other in users {
            let other_relations = db.get_user_relations(other).await.unwrap();
            if other != subject && is_friend(&relations, &other_relations) {
                expected.push(other.to_string());
            }
            let pair = db.get_pair_state(subject, other).await.unwrap();
            assert_eq!(pair.is_friend(), is_friend(&relations, &other_relations));
        }

        let mut listed: Vec<String> = db
            .get_friends(subject)
            .await
            .unwrap()
            .into_iter()
            .map(|user| user.id)
            .collect();
        listed.sort();
        assert_eq!(listed, expected, "friends of {subject}");

        let snapshot = db.get_relationship(subject, "e").await.unwrap();
        assert_eq!(snapshot.counts.friends, expected.len() as i64);
    }
}

#[tokio::test]
async fn test_incoming_request_listing_and_counts() {
    let (db, _temp_dir) = create_test_db().await;
    for id in ["r", "s1", "s2", "s3"] {
        seed_user(&db, id).await;
    }
    for sender in ["s1", "s2", "s3"] {
        db.send_friend_request(sender, "r").await.unwrap();
    }

    assert_eq!(db.count_incoming_friend_requests("r").await.unwrap(), 3);
    let page = db.get_incoming_friend_requests("r", 2, 0).await.unwrap();
    assert_eq!(page.len(), 2);
    let rest = db.get_incoming_friend_requests("r", 2, 2).await.unwrap();
    assert_eq!(rest.len(), 1);

    let snapshot = db.get_relationship("r", "s1").await.unwrap();
    assert!(snapshot.pair.requested_by);
    assert_eq!(snapshot.counts.pending_requests, 3);
}

#[tokio::test]
async fn test_reaction_toggle_and_replace() {
    let (db, _temp_dir) = create_test_db().await;
    seed_user(&db, "owner").await;
    seed_user(&db, "a").await;
    seed_post(&db, "p1", "owner").await;

    let outcome = db
        .set_reaction("p1", "a", Some(ReactionType::Love))
        .await
        .unwrap();
    assert_eq!(outcome.transition(), ReactionTransition::Added);
    assert_eq!(outcome.entries.len(), 1);

    let outcome = db
        .set_reaction("p1", "a", Some(ReactionType::Sad))
        .await
        .unwrap();
    assert_eq!(outcome.transition(), ReactionTransition::Changed);
    assert_eq!(outcome.entries.len(), 1);
    assert_eq!(outcome.entries[0].reaction_type, ReactionType::Sad);

    let outcome = db
        .set_reaction("p1", "a", Some(ReactionType::Sad))
        .await
        .unwrap();
    assert_eq!(outcome.transition(), ReactionTransition::Removed);
    assert!(outcome.entries.is_empty());

    let outcome = db.set_reaction("p1", "a", None).await.unwrap();
    assert_eq!(outcome.transition(), ReactionTransition::Unchanged);
}

#[tokio::test]
async fn test_reaction_ledger_keeps_one_entry_per_actor() {
    let (db, _temp_dir) = create_test_db().await;
    seed_user(&db, "owner").await;
    seed_post(&db, "p1", "owner").await;
    let actors = ["a", "b", "c"];
    for actor in actors {
        seed_user(&db, actor).await;
    }

    let sequence = [
        ("a", Some(ReactionType::Like)),
        ("b", Some(ReactionType::Like)),
        ("a", Some(ReactionType::Wow)),
        ("c", Some(ReactionType::Angry)),
        ("b", None),
        ("c", Some(ReactionType::Care)),
        ("b", Some(ReactionType::Haha)),
        ("a", Some(ReactionType::Wow)),
        ("a", Some(ReactionType::Like)),
    ];
    for (actor, kind) in sequence {
        db.set_reaction("p1", actor, kind).await.unwrap();
    }

    let entries = db.get_reaction_entries("p1").await.unwrap();
    assert!(entries.len() <= actors.len());
    let mut users: Vec<_> = entries.iter().map(|e| e.user_id.clone()).collect();
    users.sort();
    users.dedup();
    assert_eq!(users.len(), entries.len());
}

#[tokio::test]
async fn test_reaction_on_missing_post_is_not_found() {
    let (db, _temp_dir) = create_test_db().await;
    seed_user(&db, "a").await;

    let error = db
        .set_reaction("nope", "a", Some(ReactionType::Like))
        .await
        .unwrap_err();
    assert!(matches!(error, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_story_like_toggle() {
    let (db, _temp_dir) = create_test_db().await;
    seed_user(&db, "owner").await;
    seed_user(&db, "a").await;
    db.insert_story(&Story {
        id: "s1".to_string(),
        author_id: "owner".to_string(),
        created_at: Utc::now(),
    })
    .await
    .unwrap();

    assert_eq!(db.toggle_story_like("s1", "a").await.unwrap(), (true, 1));
    assert_eq!(db.toggle_story_like("s1", "a").await.unwrap(), (false, 0));
}

#[tokio::test]
async fn test_notification_operations() {
    let (db, _temp_dir) = create_test_db().await;
    seed_user(&db, "sender").await;

    let notification = Notification {
        id: EntityId::new().0,
        recipient_id: "r".to_string(),
        sender_id: "sender".to_string(),
        notification_type: NotificationType::Share.as_str().to_string(),
        post_id: Some("p1".to_string()),
        story_id: None,
        comment_id: None,
        message: "User sender shared your post".to_string(),
        is_read: false,
        created_at: Utc::now(),
    };
    db.insert_notification(&notification).await.unwrap();

    let page = db.get_notifications("r", 10, 0).await.unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].sender_username.as_deref(), Some("sender"));
    assert_eq!(db.count_unread_notifications("r").await.unwrap(), 1);

    // Another recipient cannot mark it
    assert!(
        db.mark_notification_read(&notification.id, "someone-else")
            .await
            .unwrap()
            .is_none()
    );

    let marked = db
        .mark_notification_read(&notification.id, "r")
        .await
        .unwrap()
        .unwrap();
    assert!(marked.is_read);
    assert_eq!(db.count_unread_notifications("r").await.unwrap(), 0);
    assert_eq!(db.mark_all_notifications_read("r").await.unwrap(), 0);
}

#[tokio::test]
async fn test_delete_notifications_before_cutoff() {
    let (db, _temp_dir) = create_test_db().await;

    for _ in 0..2 {
        db.insert_notification(&Notification {
            id: EntityId::new().0,
            recipient_id: "r".to_string(),
            sender_id: "s".to_string(),
            notification_type: "like".to_string(),
            post_id: None,
            story_id: None,
            comment_id: None,
            message: "s liked your post".to_string(),
            is_read: false,
            created_at: Utc::now(),
        })
        .await
        .unwrap();
    }
    let old = db.get_notifications("r", 1, 0).await.unwrap();
    db.backdate_notification_for_test(&old[0].notification.id, Utc::now() - Duration::days(30))
        .await
        .unwrap();

    let removed = db
        .delete_notifications_before(Utc::now() - Duration::days(7))
        .await
        .unwrap();
    assert_eq!(removed, 1);
    assert_eq!(db.count_notifications("r").await.unwrap(), 1);
}
