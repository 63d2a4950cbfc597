use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use rusqlite::params;
use serde::Deserialize;

use crate::db::models::Profile;
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::state::AppState;
use crate::visibility;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/me", get(me).patch(update))
}

async fn me(State(state): State<AppState>, user: CurrentUser) -> AppResult<Json<Profile>> {
    let profile = visibility::load_profile(&state.db, &user.id)?
        .ok_or_else(|| AppError::Internal("session without profile".into()))?;
    Ok(Json(profile))
}

#[derive(Deserialize)]
struct UpdateProfileBody {
    display_name: Option<String>,
    username: Option<String>,
}

/// Display name and username are the only mutable profile fields, and only
/// the owner gets here (the session is the owner).
async fn update(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(body): Json<UpdateProfileBody>,
) -> AppResult<Json<Profile>> {
    let conn = state.db.get()?;

    if let Some(display_name) = body.display_name.as_deref().map(str::trim) {
        if display_name.is_empty() {
            return Err(AppError::BadRequest("Display name cannot be empty".into()));
        }
        conn.execute(
            "UPDATE profiles SET display_name = ?1 WHERE id = ?2",
            params![display_name, user.id],
        )?;
    }

    if let Some(username) = body.username.as_deref() {
        let username = username.trim().to_lowercase();
        if username.is_empty()
            || !username.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(AppError::BadRequest(
                "Username must be letters, digits, or underscores".into(),
            ));
        }
        let taken: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM profiles WHERE username = ?1 AND id <> ?2",
            params![username, user.id],
            |row| row.get(0),
        )?;
        if taken {
            return Err(AppError::Conflict("Username already in use".into()));
        }
        conn.execute(
            "UPDATE profiles SET username = ?1 WHERE id = ?2",
            params![username, user.id],
        )?;
    }
    drop(conn);

    let profile = visibility::load_profile(&state.db, &user.id)?
        .ok_or_else(|| AppError::Internal("session without profile".into()))?;
    Ok(Json(profile))
}
