use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use rusqlite::params;
use serde::Deserialize;
use serde_json::json;

use crate::db::models::{Event, Vibe};
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::geocode;
use crate::state::AppState;
use crate::visibility::{self, Visibility};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/events", post(create))
        .route("/api/events/{id}", get(detail).delete(remove))
        .route("/api/geocode", get(geocode_lookup))
}

#[derive(Deserialize)]
struct CreateEventBody {
    title: String,
    #[serde(default)]
    description: String,
    location_name: String,
    latitude: Option<f64>,
    longitude: Option<f64>,
    start_time: String,
    end_time: Option<String>,
    vibe: Vibe,
    #[serde(flatten)]
    visibility: Visibility,
}

async fn create(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(body): Json<CreateEventBody>,
) -> AppResult<Json<serde_json::Value>> {
    let title = body.title.trim().to_string();
    if title.is_empty() {
        return Err(AppError::BadRequest("Title is required".into()));
    }
    let location_name = body.location_name.trim().to_string();
    if location_name.is_empty() {
        return Err(AppError::BadRequest("Location is required".into()));
    }
    if body.start_time.trim().is_empty() {
        return Err(AppError::BadRequest("Start time is required".into()));
    }

    let mut conn = state.db.get()?;

    // Circle-scoped events may only reference circles the host owns
    if let Visibility::Circles { circle_ids } = &body.visibility {
        for circle_id in circle_ids {
            let owns: bool = conn.query_row(
                "SELECT COUNT(*) > 0 FROM circles WHERE id = ?1 AND owner_id = ?2",
                params![circle_id, user.id],
                |row| row.get(0),
            )?;
            if !owns {
                return Err(AppError::BadRequest(
                    "Events can only be shared with your own circles".into(),
                ));
            }
        }
        if circle_ids.is_empty() {
            // Allowed, but the event will be visible to nobody but the host
            tracing::warn!("Circles-tier event with no circles attached");
        }
    }

    let id = uuid::Uuid::now_v7().to_string();
    let tx = conn.transaction()?;
    tx.execute(
        "INSERT INTO events (id, host_id, title, description, location_name,
                             latitude, longitude, start_time, end_time, vibe, visibility)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            id,
            user.id,
            title,
            body.description.trim(),
            location_name,
            body.latitude,
            body.longitude,
            body.start_time,
            body.end_time,
            body.vibe.as_str(),
            body.visibility.tier(),
        ],
    )?;
    if let Visibility::Circles { circle_ids } = &body.visibility {
        for circle_id in circle_ids {
            tx.execute(
                "INSERT INTO event_circle_visibility (id, event_id, circle_id)
                 VALUES (?1, ?2, ?3)",
                params![uuid::Uuid::now_v7().to_string(), id, circle_id],
            )?;
        }
    }
    tx.commit()?;

    tracing::info!("Event {} created by @{}", id, user.username);
    Ok(Json(json!({ "event_id": id })))
}

/// Event detail, visibility-checked. An event the viewer may not see is
/// indistinguishable from one that does not exist.
async fn detail(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<Event>> {
    let event = visibility::load_event(&state.db, &id)?.ok_or(AppError::NotFound)?;
    let snapshot = visibility::snapshot_for(&state.db, &user.id)?;
    if !visibility::can_view(&user.id, &event, &snapshot) {
        return Err(AppError::NotFound);
    }
    Ok(Json(event))
}

async fn remove(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let conn = state.db.get()?;
    let host_id: String = match conn.query_row(
        "SELECT host_id FROM events WHERE id = ?1",
        params![id],
        |row| row.get(0),
    ) {
        Ok(h) => h,
        Err(rusqlite::Error::QueryReturnedNoRows) => return Err(AppError::NotFound),
        Err(e) => return Err(e.into()),
    };
    if host_id != user.id {
        return Err(AppError::Forbidden);
    }

    conn.execute("DELETE FROM events WHERE id = ?1", params![id])?;
    Ok(Json(json!({ "ok": true })))
}

#[derive(Deserialize)]
struct GeocodeQuery {
    q: String,
}

async fn geocode_lookup(
    State(state): State<AppState>,
    _user: CurrentUser,
    Query(query): Query<GeocodeQuery>,
) -> AppResult<Json<serde_json::Value>> {
    let result = geocode::lookup(&state.http, &state.config.geocode.base_url, &query.q).await?;
    Ok(Json(json!({ "result": result })))
}
