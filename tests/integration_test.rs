use rusqlite::params;
use tempfile::TempDir;

use vamos::db;
use vamos::visibility::{self, Visibility};

fn test_pool() -> (TempDir, vamos::state::DbPool) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");
    let pool = db::create_pool(&db_path).expect("Failed to create test database");
    db::run_migrations(&pool).expect("Failed to run migrations");
    (temp_dir, pool)
}

fn insert_profile(pool: &vamos::state::DbPool, id: &str, username: &str) {
    let conn = pool.get().unwrap();
    conn.execute(
        "INSERT INTO profiles (id, username, email, display_name, password_hash)
         VALUES (?1, ?2, ?2 || '@example.com', ?2, 'hash')",
        params![id, username],
    )
    .unwrap();
}

fn insert_event(
    pool: &vamos::state::DbPool,
    id: &str,
    host_id: &str,
    start_time: &str,
    tier: &str,
    circle_ids: &[&str],
) {
    let conn = pool.get().unwrap();
    conn.execute(
        "INSERT INTO events (id, host_id, title, location_name, start_time, vibe, visibility)
         VALUES (?1, ?2, 'Hang at ' || ?1, 'Somewhere', ?3, 'chill', ?4)",
        params![id, host_id, start_time, tier],
    )
    .unwrap();
    for (i, circle_id) in circle_ids.iter().enumerate() {
        conn.execute(
            "INSERT INTO event_circle_visibility (id, event_id, circle_id) VALUES (?1, ?2, ?3)",
            params![format!("{id}-edge-{i}"), id, circle_id],
        )
        .unwrap();
    }
}

/// Full relationship setup, then every tier exercised through the same
/// snapshot-plus-filter path the feed uses.
#[test]
fn feed_filtering_respects_every_visibility_tier() {
    let (_tmp, pool) = test_pool();
    let conn = pool.get().unwrap();

    // ana is the viewer. bo is an accepted friend, cy has only a pending
    // request to ana, di is a stranger who runs a book club circle.
    for (id, name) in [("ana", "ana"), ("bo", "bo"), ("cy", "cy"), ("di", "di")] {
        conn.execute(
            "INSERT INTO profiles (id, username, email, display_name, password_hash)
             VALUES (?1, ?2, ?2 || '@example.com', ?2, 'hash')",
            params![id, name],
        )
        .unwrap();
    }
    conn.execute(
        "INSERT INTO friendships (id, user_id, friend_id, status)
         VALUES ('f1', 'bo', 'ana', 'accepted'), ('f2', 'cy', 'ana', 'pending')",
        [],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO circles (id, owner_id, name, color)
         VALUES ('books', 'di', 'Book Club', '#E8A817'), ('climb', 'di', 'Climbing', '#F5C842')",
        [],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO circle_members (id, circle_id, user_id) VALUES ('m1', 'books', 'ana')",
        [],
    )
    .unwrap();
    drop(conn);

    // Newest first once sorted by start time
    insert_event(&pool, "e-public", "di", "2026-09-05T19:00:00Z", "public", &[]);
    insert_event(&pool, "e-friend", "bo", "2026-09-04T19:00:00Z", "friends", &[]);
    insert_event(&pool, "e-pending", "cy", "2026-09-03T19:00:00Z", "friends", &[]);
    insert_event(&pool, "e-books", "di", "2026-09-02T19:00:00Z", "circles", &["books"]);
    insert_event(&pool, "e-climb", "di", "2026-09-01T19:00:00Z", "circles", &["climb"]);
    insert_event(&pool, "e-own", "ana", "2026-08-31T19:00:00Z", "circles", &[]);

    let candidates = visibility::candidate_events(&pool, 50).unwrap();
    let snapshot = visibility::snapshot_for(&pool, "ana").unwrap();
    let visible = visibility::visible_events("ana", candidates, &snapshot);

    let ids: Vec<&str> = visible.iter().map(|e| e.id.as_str()).collect();
    // Pending friendship grants nothing; the unshared circle stays hidden;
    // ana's own circles-with-no-circles event is still hers to see.
    assert_eq!(ids, vec!["e-public", "e-friend", "e-books", "e-own"]);
}

#[test]
fn accepting_a_request_unlocks_friends_events() {
    let (_tmp, pool) = test_pool();
    insert_profile(&pool, "ana", "ana");
    insert_profile(&pool, "bo", "bo");
    insert_event(&pool, "e1", "bo", "2026-09-01T19:00:00Z", "friends", &[]);

    let conn = pool.get().unwrap();
    conn.execute(
        "INSERT INTO friendships (id, user_id, friend_id, status)
         VALUES ('f1', 'bo', 'ana', 'pending')",
        [],
    )
    .unwrap();
    drop(conn);

    let event = visibility::load_event(&pool, "e1").unwrap().unwrap();
    let before = visibility::snapshot_for(&pool, "ana").unwrap();
    assert!(!visibility::can_view("ana", &event, &before));

    let conn = pool.get().unwrap();
    conn.execute(
        "UPDATE friendships SET status = 'accepted' WHERE id = 'f1'",
        [],
    )
    .unwrap();
    drop(conn);

    let after = visibility::snapshot_for(&pool, "ana").unwrap();
    assert!(visibility::can_view("ana", &event, &after));
}

#[test]
fn leaving_a_circle_revokes_circle_events() {
    let (_tmp, pool) = test_pool();
    insert_profile(&pool, "ana", "ana");
    insert_profile(&pool, "di", "di");

    let conn = pool.get().unwrap();
    conn.execute(
        "INSERT INTO circles (id, owner_id, name, color) VALUES ('g', 'di', 'Gym', '#D94F5E')",
        [],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO circle_members (id, circle_id, user_id) VALUES ('m1', 'g', 'ana')",
        [],
    )
    .unwrap();
    drop(conn);
    insert_event(&pool, "e1", "di", "2026-09-01T19:00:00Z", "circles", &["g"]);

    let event = visibility::load_event(&pool, "e1").unwrap().unwrap();
    let member = visibility::snapshot_for(&pool, "ana").unwrap();
    assert!(visibility::can_view("ana", &event, &member));

    let conn = pool.get().unwrap();
    conn.execute("DELETE FROM circle_members WHERE id = 'm1'", []).unwrap();
    drop(conn);

    let gone = visibility::snapshot_for(&pool, "ana").unwrap();
    assert!(!visibility::can_view("ana", &event, &gone));
}

#[test]
fn deleting_an_event_cascades_its_circle_edges() {
    let (_tmp, pool) = test_pool();
    insert_profile(&pool, "di", "di");

    let conn = pool.get().unwrap();
    conn.execute(
        "INSERT INTO circles (id, owner_id, name, color) VALUES ('g', 'di', 'Gym', '#7D7269')",
        [],
    )
    .unwrap();
    drop(conn);
    insert_event(&pool, "e1", "di", "2026-09-01T19:00:00Z", "circles", &["g"]);

    let conn = pool.get().unwrap();
    conn.execute("DELETE FROM events WHERE id = 'e1'", []).unwrap();
    let edges: i64 = conn
        .query_row("SELECT COUNT(*) FROM event_circle_visibility", [], |r| r.get(0))
        .unwrap();
    assert_eq!(edges, 0);
    drop(conn);

    assert!(visibility::load_event(&pool, "e1").unwrap().is_none());
}

#[test]
fn session_round_trip_against_real_file_db() {
    let (_tmp, pool) = test_pool();
    insert_profile(&pool, "ana", "ana");

    let token = vamos::auth::session::create_session(&pool, "ana", 24).unwrap();
    assert_eq!(token.len(), 64);

    let conn = pool.get().unwrap();
    let profile_id: String = conn
        .query_row(
            "SELECT profile_id FROM sessions WHERE token = ?1 AND expires_at > datetime('now')",
            params![token],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(profile_id, "ana");
    drop(conn);

    vamos::auth::session::delete_session(&pool, &token).unwrap();
    let conn = pool.get().unwrap();
    let remaining: i64 = conn
        .query_row("SELECT COUNT(*) FROM sessions", [], |r| r.get(0))
        .unwrap();
    assert_eq!(remaining, 0);
}

#[test]
fn loaded_event_serializes_with_inline_visibility_tag() {
    let (_tmp, pool) = test_pool();
    insert_profile(&pool, "di", "di");

    let conn = pool.get().unwrap();
    conn.execute(
        "INSERT INTO circles (id, owner_id, name, color) VALUES ('g', 'di', 'Gym', '#E86B8B')",
        [],
    )
    .unwrap();
    drop(conn);
    insert_event(&pool, "e1", "di", "2026-09-01T19:00:00Z", "circles", &["g"]);

    let event = visibility::load_event(&pool, "e1").unwrap().unwrap();
    assert_eq!(
        event.visibility,
        Visibility::Circles {
            circle_ids: vec!["g".to_string()]
        }
    );

    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["visibility"], "circles");
    assert_eq!(json["circle_ids"][0], "g");
    assert_eq!(json["host"]["username"], "di");
}
