use axum::extract::{Path, State};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use rusqlite::params;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::db::models::{profile_from_row, Circle, Profile};
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/circles", get(list).post(create))
        .route("/api/circles/{id}", delete(remove))
        .route("/api/circles/{id}/members", post(add_member))
        .route(
            "/api/circles/{id}/members/{user_id}",
            delete(remove_member),
        )
}

#[derive(Debug, Serialize)]
struct CircleWithMembers {
    #[serde(flatten)]
    circle: Circle,
    members: Vec<Profile>,
}

/// Circles are private organizational structure: listing only ever returns
/// the viewer's own.
async fn list(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<serde_json::Value>> {
    let conn = state.db.get()?;

    let mut stmt = conn.prepare(
        "SELECT id, owner_id, name, color, created_at FROM circles
         WHERE owner_id = ?1 ORDER BY created_at",
    )?;
    let circles = stmt
        .query_map(params![user.id], |row| {
            Ok(Circle {
                id: row.get(0)?,
                owner_id: row.get(1)?,
                name: row.get(2)?,
                color: row.get(3)?,
                created_at: row.get(4)?,
                member_count: None,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    drop(stmt);

    let mut out = Vec::with_capacity(circles.len());
    for mut circle in circles {
        let mut stmt = conn.prepare(
            "SELECT p.id, p.username, p.email, p.display_name, p.created_at
             FROM circle_members m JOIN profiles p ON p.id = m.user_id
             WHERE m.circle_id = ?1 ORDER BY m.added_at",
        )?;
        let members = stmt
            .query_map(params![circle.id], profile_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        circle.member_count = Some(members.len() as i64);
        out.push(CircleWithMembers { circle, members });
    }

    Ok(Json(json!({ "circles": out })))
}

#[derive(Deserialize)]
struct CreateCircleBody {
    name: String,
    color: String,
}

async fn create(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(body): Json<CreateCircleBody>,
) -> AppResult<Json<serde_json::Value>> {
    let name = body.name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::BadRequest("Circle name is required".into()));
    }
    let color = body.color.trim().to_string();
    if color.is_empty() {
        return Err(AppError::BadRequest("Circle color is required".into()));
    }

    let id = uuid::Uuid::now_v7().to_string();
    let conn = state.db.get()?;
    conn.execute(
        "INSERT INTO circles (id, owner_id, name, color) VALUES (?1, ?2, ?3, ?4)",
        params![id, user.id, name, color],
    )?;

    Ok(Json(json!({ "circle_id": id })))
}

async fn remove(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let conn = state.db.get()?;
    let affected = conn.execute(
        "DELETE FROM circles WHERE id = ?1 AND owner_id = ?2",
        params![id, user.id],
    )?;
    if affected == 0 {
        return Err(AppError::NotFound);
    }

    Ok(Json(json!({ "ok": true })))
}

#[derive(Deserialize)]
struct AddMemberBody {
    user_id: String,
}

fn require_owner(
    conn: &rusqlite::Connection,
    circle_id: &str,
    owner_id: &str,
) -> AppResult<()> {
    let owns: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM circles WHERE id = ?1 AND owner_id = ?2",
        params![circle_id, owner_id],
        |row| row.get(0),
    )?;
    if owns {
        Ok(())
    } else {
        // Not distinguishing "missing" from "not yours" avoids leaking ids
        Err(AppError::NotFound)
    }
}

async fn add_member(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(body): Json<AddMemberBody>,
) -> AppResult<Json<serde_json::Value>> {
    let conn = state.db.get()?;
    require_owner(&conn, &id, &user.id)?;

    let member_exists: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM profiles WHERE id = ?1",
        params![body.user_id],
        |row| row.get(0),
    )?;
    if !member_exists {
        return Err(AppError::NotFound);
    }

    let membership_id = uuid::Uuid::now_v7().to_string();
    // Membership is a set; re-adding is a no-op
    conn.execute(
        "INSERT OR IGNORE INTO circle_members (id, circle_id, user_id) VALUES (?1, ?2, ?3)",
        params![membership_id, id, body.user_id],
    )?;

    Ok(Json(json!({ "ok": true })))
}

async fn remove_member(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((id, member_id)): Path<(String, String)>,
) -> AppResult<Json<serde_json::Value>> {
    let conn = state.db.get()?;
    require_owner(&conn, &id, &user.id)?;

    conn.execute(
        "DELETE FROM circle_members WHERE circle_id = ?1 AND user_id = ?2",
        params![id, member_id],
    )?;

    Ok(Json(json!({ "ok": true })))
}
