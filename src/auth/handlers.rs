use axum::extract::State;
use axum::http::header;
use axum::response::{AppendHeaders, IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use rusqlite::params;
use serde::Deserialize;
use serde_json::json;

use crate::auth::session;
use crate::db::models::{profile_from_row, Profile};
use crate::error::{AppError, AppResult};
use crate::extractors::{session_token, CurrentUser};
use crate::state::AppState;

const BCRYPT_COST: u32 = 10;

#[derive(Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub username: String,
    pub display_name: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/auth/signup", post(signup))
        .route("/api/auth/login", post(login))
        .route("/api/auth/logout", post(logout))
}

fn session_cookie(name: &str, token: &str, max_age_hours: u64) -> String {
    format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
        name,
        token,
        max_age_hours * 3600
    )
}

fn clear_session_cookie(name: &str) -> String {
    format!("{}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0", name)
}

async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> AppResult<Response> {
    let email = req.email.trim().to_lowercase();
    let username = req.username.trim().to_lowercase();
    let display_name = req.display_name.trim().to_string();

    if email.is_empty() || !email.contains('@') {
        return Err(AppError::BadRequest("A valid email is required".into()));
    }
    if username.is_empty() || !username.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(AppError::BadRequest(
            "Username must be letters, digits, or underscores".into(),
        ));
    }
    if display_name.is_empty() {
        return Err(AppError::BadRequest("Display name is required".into()));
    }
    if req.password.len() < 8 {
        return Err(AppError::BadRequest(
            "Password must be at least 8 characters".into(),
        ));
    }

    let hash = bcrypt::hash(&req.password, BCRYPT_COST)
        .map_err(|e| AppError::Internal(format!("password hash failed: {e}")))?;
    let id = uuid::Uuid::now_v7().to_string();

    let conn = state.db.get()?;
    let taken: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM profiles WHERE username = ?1 OR email = ?2",
        params![username, email],
        |row| row.get(0),
    )?;
    if taken {
        return Err(AppError::Conflict("Username or email already in use".into()));
    }

    conn.execute(
        "INSERT INTO profiles (id, username, email, display_name, password_hash)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![id, username, email, display_name, hash],
    )?;
    let profile = conn.query_row(
        "SELECT id, username, email, display_name, created_at FROM profiles WHERE id = ?1",
        params![id],
        profile_from_row,
    )?;
    drop(conn);

    let token = session::create_session(&state.db, &id, state.config.auth.session_hours)?;
    tracing::info!("New profile: @{}", profile.username);

    Ok((
        AppendHeaders([(
            header::SET_COOKIE,
            session_cookie(
                &state.config.auth.cookie_name,
                &token,
                state.config.auth.session_hours,
            ),
        )]),
        Json(json!({ "profile": profile })),
    )
        .into_response())
}

async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> AppResult<Response> {
    let email = req.email.trim().to_lowercase();

    let conn = state.db.get()?;
    let row: Option<(Profile, String)> = match conn.query_row(
        "SELECT id, username, email, display_name, created_at, password_hash
         FROM profiles WHERE email = ?1",
        params![email],
        |row| {
            Ok((
                Profile {
                    id: row.get(0)?,
                    username: row.get(1)?,
                    email: row.get(2)?,
                    display_name: row.get(3)?,
                    created_at: row.get(4)?,
                },
                row.get::<_, String>(5)?,
            ))
        },
    ) {
        Ok(r) => Some(r),
        Err(rusqlite::Error::QueryReturnedNoRows) => None,
        Err(e) => return Err(e.into()),
    };
    drop(conn);

    let (profile, hash) = row.ok_or(AppError::Unauthorized)?;
    let ok = bcrypt::verify(&req.password, &hash)
        .map_err(|e| AppError::Internal(format!("password verify failed: {e}")))?;
    if !ok {
        return Err(AppError::Unauthorized);
    }

    let token = session::create_session(&state.db, &profile.id, state.config.auth.session_hours)?;

    Ok((
        AppendHeaders([(
            header::SET_COOKIE,
            session_cookie(
                &state.config.auth.cookie_name,
                &token,
                state.config.auth.session_hours,
            ),
        )]),
        Json(json!({ "profile": profile })),
    )
        .into_response())
}

async fn logout(
    State(state): State<AppState>,
    _user: CurrentUser,
    headers: axum::http::HeaderMap,
) -> AppResult<Response> {
    if let Some(token) = session_token(&headers, &state.config.auth.cookie_name) {
        session::delete_session(&state.db, token)?;
    }

    Ok((
        AppendHeaders([(
            header::SET_COOKIE,
            clear_session_cookie(&state.config.auth.cookie_name),
        )]),
        Json(json!({ "ok": true })),
    )
        .into_response())
}
