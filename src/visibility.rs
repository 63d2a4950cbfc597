//! Event visibility: who may see which event.
//!
//! The same rule used to live twice in the original deployment (once in the
//! hosted store's row-level policy, once in page code). Here it exists once,
//! as `can_view`, and every read path that returns events goes through it.

use rusqlite::params;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::db::models::{profile_from_row, Event, Profile};
use crate::error::AppResult;
use crate::state::DbPool;

/// An event's visibility tier. Circles-tier events carry the circle ids that
/// authorize viewing, so the predicate is exhaustive over the type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "visibility", rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Friends,
    Circles { circle_ids: Vec<String> },
}

impl Visibility {
    /// The tier string stored in the events table.
    pub fn tier(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Friends => "friends",
            Visibility::Circles { .. } => "circles",
        }
    }
}

/// A consistent read-only view of the viewer's relationships, loaded once per
/// filtering pass.
#[derive(Debug, Clone, Default)]
pub struct RelationshipSnapshot {
    /// Profile ids with an accepted friendship with the viewer, either
    /// direction. Pending requests are absent on purpose.
    pub friend_ids: HashSet<String>,
    /// Circle ids the viewer is a member of (not circles the viewer owns).
    pub circle_ids: HashSet<String>,
}

/// The visibility rule, evaluated per event.
///
/// A circles-tier event with no attached circles is visible to nobody but its
/// host. That is a policy default, not an error: the row is well-formed, it
/// just authorizes no circle.
pub fn can_view(viewer_id: &str, event: &Event, snapshot: &RelationshipSnapshot) -> bool {
    if event.host_id == viewer_id {
        return true;
    }
    match &event.visibility {
        Visibility::Public => true,
        Visibility::Friends => snapshot.friend_ids.contains(&event.host_id),
        Visibility::Circles { circle_ids } => circle_ids
            .iter()
            .any(|id| snapshot.circle_ids.contains(id)),
    }
}

/// Filter `candidates` down to what `viewer_id` may see. Order-preserving;
/// callers pre-sort (the feed sorts by start time descending).
pub fn visible_events(
    viewer_id: &str,
    candidates: Vec<Event>,
    snapshot: &RelationshipSnapshot,
) -> Vec<Event> {
    candidates
        .into_iter()
        .filter(|e| can_view(viewer_id, e, snapshot))
        .collect()
}

/// Load the viewer's accepted-friend set and circle memberships in one pass.
pub fn snapshot_for(pool: &DbPool, viewer_id: &str) -> AppResult<RelationshipSnapshot> {
    let conn = pool.get()?;

    let mut friend_ids = HashSet::new();
    {
        let mut stmt = conn.prepare(
            "SELECT user_id, friend_id FROM friendships
             WHERE status = 'accepted' AND (user_id = ?1 OR friend_id = ?1)",
        )?;
        let rows = stmt.query_map(params![viewer_id], |row| {
            let user_id: String = row.get(0)?;
            let friend_id: String = row.get(1)?;
            Ok(if user_id == viewer_id {
                friend_id
            } else {
                user_id
            })
        })?;
        for id in rows {
            friend_ids.insert(id?);
        }
    }

    let mut circle_ids = HashSet::new();
    {
        let mut stmt =
            conn.prepare("SELECT circle_id FROM circle_members WHERE user_id = ?1")?;
        let rows = stmt.query_map(params![viewer_id], |row| row.get::<_, String>(0))?;
        for id in rows {
            circle_ids.insert(id?);
        }
    }

    Ok(RelationshipSnapshot {
        friend_ids,
        circle_ids,
    })
}

/// Load the newest candidate events (host profile joined) with their circle
/// edges folded into the visibility value. Not yet filtered for a viewer.
pub fn candidate_events(pool: &DbPool, limit: i64) -> AppResult<Vec<Event>> {
    let conn = pool.get()?;

    let mut stmt = conn.prepare(
        "SELECT e.id, e.host_id, e.title, e.description, e.location_name,
                e.latitude, e.longitude, e.start_time, e.end_time, e.vibe,
                e.visibility, e.created_at,
                p.id, p.username, p.email, p.display_name, p.created_at
         FROM events e
         JOIN profiles p ON p.id = e.host_id
         ORDER BY e.start_time DESC
         LIMIT ?1",
    )?;
    let mut events = stmt
        .query_map(params![limit], event_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    drop(stmt);

    for event in &mut events {
        if let Visibility::Circles { circle_ids } = &mut event.visibility {
            *circle_ids = circle_edges(&conn, &event.id)?;
        }
    }

    Ok(events)
}

/// Load one event by id, or None. Visibility is not checked here.
pub fn load_event(pool: &DbPool, event_id: &str) -> AppResult<Option<Event>> {
    let conn = pool.get()?;

    let mut stmt = conn.prepare(
        "SELECT e.id, e.host_id, e.title, e.description, e.location_name,
                e.latitude, e.longitude, e.start_time, e.end_time, e.vibe,
                e.visibility, e.created_at,
                p.id, p.username, p.email, p.display_name, p.created_at
         FROM events e
         JOIN profiles p ON p.id = e.host_id
         WHERE e.id = ?1",
    )?;
    let mut event = match stmt.query_row(params![event_id], event_from_row) {
        Ok(e) => e,
        Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    drop(stmt);

    if let Visibility::Circles { circle_ids } = &mut event.visibility {
        *circle_ids = circle_edges(&conn, &event.id)?;
    }

    Ok(Some(event))
}

fn circle_edges(
    conn: &rusqlite::Connection,
    event_id: &str,
) -> Result<Vec<String>, rusqlite::Error> {
    let mut stmt =
        conn.prepare("SELECT circle_id FROM event_circle_visibility WHERE event_id = ?1")?;
    let ids = stmt
        .query_map(params![event_id], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(ids)
}

fn event_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Event> {
    let vibe: String = row.get(9)?;
    let tier: String = row.get(10)?;
    let visibility = match tier.as_str() {
        "public" => Visibility::Public,
        "friends" => Visibility::Friends,
        // Edges are attached by the caller
        _ => Visibility::Circles { circle_ids: vec![] },
    };
    let host = Profile {
        id: row.get(12)?,
        username: row.get(13)?,
        email: row.get(14)?,
        display_name: row.get(15)?,
        created_at: row.get(16)?,
    };
    Ok(Event {
        id: row.get(0)?,
        host_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        location_name: row.get(4)?,
        latitude: row.get(5)?,
        longitude: row.get(6)?,
        start_time: row.get(7)?,
        end_time: row.get(8)?,
        vibe: vibe.parse().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(9, rusqlite::types::Type::Text, Box::new(e))
        })?,
        visibility,
        created_at: row.get(11)?,
        host: Some(host),
    })
}

/// Look up a profile by id.
pub fn load_profile(pool: &DbPool, profile_id: &str) -> AppResult<Option<Profile>> {
    let conn = pool.get()?;
    match conn.query_row(
        "SELECT id, username, email, display_name, created_at FROM profiles WHERE id = ?1",
        params![profile_id],
        profile_from_row,
    ) {
        Ok(p) => Ok(Some(p)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}
