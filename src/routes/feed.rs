use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use rusqlite::params;
use serde_json::json;

use crate::db::models::Circle;
use crate::error::AppResult;
use crate::extractors::CurrentUser;
use crate::map::Pin;
use crate::state::AppState;
use crate::visibility;

/// Newest-first candidate window handed to the visibility filter.
const FEED_LIMIT: i64 = 50;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/feed", get(feed))
        .route("/api/feed/pins", get(pins))
}

/// The home feed: events the viewer may see, newest start time first, plus
/// the viewer's circles for the sidebar.
async fn feed(State(state): State<AppState>, user: CurrentUser) -> AppResult<Json<serde_json::Value>> {
    let candidates = visibility::candidate_events(&state.db, FEED_LIMIT)?;
    let snapshot = visibility::snapshot_for(&state.db, &user.id)?;
    let events = visibility::visible_events(&user.id, candidates, &snapshot);

    let conn = state.db.get()?;
    let mut stmt = conn.prepare(
        "SELECT c.id, c.owner_id, c.name, c.color, c.created_at,
                (SELECT COUNT(*) FROM circle_members m WHERE m.circle_id = c.id)
         FROM circles c WHERE c.owner_id = ?1 ORDER BY c.created_at",
    )?;
    let circles = stmt
        .query_map(params![user.id], |row| {
            Ok(Circle {
                id: row.get(0)?,
                owner_id: row.get(1)?,
                name: row.get(2)?,
                color: row.get(3)?,
                created_at: row.get(4)?,
                member_count: Some(row.get(5)?),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(json!({ "events": events, "circles": circles })))
}

/// Map view of the same feed: visible events with coordinates, as pins.
async fn pins(State(state): State<AppState>, user: CurrentUser) -> AppResult<Json<serde_json::Value>> {
    let candidates = visibility::candidate_events(&state.db, FEED_LIMIT)?;
    let snapshot = visibility::snapshot_for(&state.db, &user.id)?;
    let events = visibility::visible_events(&user.id, candidates, &snapshot);

    let pins: Vec<Pin> = events
        .into_iter()
        .filter_map(|event| {
            let (lat, lng) = (event.latitude?, event.longitude?);
            Some(Pin {
                id: event.id,
                lat,
                lng,
                title: event.title,
                vibe: event.vibe,
                subtitle: Some(event.location_name),
                active: false,
            })
        })
        .collect();

    Ok(Json(json!({ "pins": pins })))
}
