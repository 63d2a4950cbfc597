use axum::extract::{Path, Query, State};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use rusqlite::params;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::db::models::{profile_from_row, Profile};
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/friends", get(list))
        .route("/api/friends/search", get(search))
        .route("/api/friends/requests", post(send_request))
        .route("/api/friends/requests/{id}/accept", post(accept_request))
        .route("/api/friends/{id}", delete(remove))
}

/// A profile paired with the friendship row that links it to the viewer.
#[derive(Debug, Serialize)]
struct FriendEntry {
    friendship_id: String,
    profile: Profile,
}

#[derive(Debug, Serialize)]
struct FriendsResponse {
    friends: Vec<FriendEntry>,
    pending_received: Vec<FriendEntry>,
    pending_sent: Vec<FriendEntry>,
}

async fn list(State(state): State<AppState>, user: CurrentUser) -> AppResult<Json<FriendsResponse>> {
    let conn = state.db.get()?;

    let mut stmt = conn.prepare(
        "SELECT f.id, f.user_id, f.friend_id, f.status,
                p.id, p.username, p.email, p.display_name, p.created_at
         FROM friendships f
         JOIN profiles p ON p.id = CASE WHEN f.user_id = ?1 THEN f.friend_id ELSE f.user_id END
         WHERE f.user_id = ?1 OR f.friend_id = ?1
         ORDER BY f.created_at DESC",
    )?;
    let rows = stmt.query_map(params![user.id], |row| {
        let friendship_id: String = row.get(0)?;
        let requester_id: String = row.get(1)?;
        let status: String = row.get(3)?;
        let profile = Profile {
            id: row.get(4)?,
            username: row.get(5)?,
            email: row.get(6)?,
            display_name: row.get(7)?,
            created_at: row.get(8)?,
        };
        Ok((friendship_id, requester_id, status, profile))
    })?;

    let mut response = FriendsResponse {
        friends: Vec::new(),
        pending_received: Vec::new(),
        pending_sent: Vec::new(),
    };
    for row in rows {
        let (friendship_id, requester_id, status, profile) = row?;
        let entry = FriendEntry {
            friendship_id,
            profile,
        };
        if status == "accepted" {
            response.friends.push(entry);
        } else if requester_id == user.id {
            response.pending_sent.push(entry);
        } else {
            response.pending_received.push(entry);
        }
    }

    Ok(Json(response))
}

#[derive(Deserialize)]
struct SearchQuery {
    q: String,
}

/// Look up a profile by exact username or email (lowercased).
async fn search(
    State(state): State<AppState>,
    _user: CurrentUser,
    Query(query): Query<SearchQuery>,
) -> AppResult<Json<serde_json::Value>> {
    let q = query.q.trim().to_lowercase();
    if q.is_empty() {
        return Err(AppError::BadRequest("Search query is required".into()));
    }
    let column = if q.contains('@') { "email" } else { "username" };

    let conn = state.db.get()?;
    let profile = match conn.query_row(
        &format!(
            "SELECT id, username, email, display_name, created_at FROM profiles WHERE {column} = ?1"
        ),
        params![q],
        profile_from_row,
    ) {
        Ok(p) => Some(p),
        Err(rusqlite::Error::QueryReturnedNoRows) => None,
        Err(e) => return Err(e.into()),
    };

    Ok(Json(json!({ "profile": profile })))
}

#[derive(Deserialize)]
struct FriendRequestBody {
    friend_id: String,
}

async fn send_request(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(body): Json<FriendRequestBody>,
) -> AppResult<Json<serde_json::Value>> {
    if body.friend_id == user.id {
        return Err(AppError::BadRequest("You cannot friend yourself".into()));
    }

    let conn = state.db.get()?;
    let target_exists: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM profiles WHERE id = ?1",
        params![body.friend_id],
        |row| row.get(0),
    )?;
    if !target_exists {
        return Err(AppError::NotFound);
    }

    // One friendship row per unordered pair: check both directions
    let already: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM friendships
         WHERE (user_id = ?1 AND friend_id = ?2) OR (user_id = ?2 AND friend_id = ?1)",
        params![user.id, body.friend_id],
        |row| row.get(0),
    )?;
    if already {
        return Err(AppError::Conflict("Friendship already exists".into()));
    }

    let id = uuid::Uuid::now_v7().to_string();
    conn.execute(
        "INSERT INTO friendships (id, user_id, friend_id, status) VALUES (?1, ?2, ?3, 'pending')",
        params![id, user.id, body.friend_id],
    )?;
    tracing::info!("Friend request {} -> {}", user.id, body.friend_id);

    Ok(Json(json!({ "friendship_id": id, "status": "pending" })))
}

/// Only the recipient of a pending request may accept it.
async fn accept_request(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let conn = state.db.get()?;
    let recipient: String = match conn.query_row(
        "SELECT friend_id FROM friendships WHERE id = ?1 AND status = 'pending'",
        params![id],
        |row| row.get(0),
    ) {
        Ok(r) => r,
        Err(rusqlite::Error::QueryReturnedNoRows) => return Err(AppError::NotFound),
        Err(e) => return Err(e.into()),
    };
    if recipient != user.id {
        return Err(AppError::Forbidden);
    }

    conn.execute(
        "UPDATE friendships SET status = 'accepted' WHERE id = ?1",
        params![id],
    )?;

    Ok(Json(json!({ "friendship_id": id, "status": "accepted" })))
}

/// Either party may delete, at any status: cancels a pending request or
/// removes an accepted friendship.
async fn remove(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let conn = state.db.get()?;
    let affected = conn.execute(
        "DELETE FROM friendships WHERE id = ?1 AND (user_id = ?2 OR friend_id = ?2)",
        params![id, user.id],
    )?;
    if affected == 0 {
        return Err(AppError::NotFound);
    }

    Ok(Json(json!({ "ok": true })))
}
