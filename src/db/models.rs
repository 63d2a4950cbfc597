use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::visibility::Visibility;

/// The fixed set of vibes an event (or AI suggestion) can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vibe {
    Cozy,
    Curious,
    Fun,
    Chill,
    Spontaneous,
}

pub const VIBES: [Vibe; 5] = [
    Vibe::Cozy,
    Vibe::Curious,
    Vibe::Fun,
    Vibe::Chill,
    Vibe::Spontaneous,
];

impl Vibe {
    pub fn as_str(&self) -> &'static str {
        match self {
            Vibe::Cozy => "cozy",
            Vibe::Curious => "curious",
            Vibe::Fun => "fun",
            Vibe::Chill => "chill",
            Vibe::Spontaneous => "spontaneous",
        }
    }
}

impl fmt::Display for Vibe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown vibe: {0}")]
pub struct ParseVibeError(String);

impl FromStr for Vibe {
    type Err = ParseVibeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cozy" => Ok(Vibe::Cozy),
            "curious" => Ok(Vibe::Curious),
            "fun" => Ok(Vibe::Fun),
            "chill" => Ok(Vibe::Chill),
            "spontaneous" => Ok(Vibe::Spontaneous),
            other => Err(ParseVibeError(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FriendshipStatus {
    Pending,
    Accepted,
}

impl FriendshipStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FriendshipStatus::Pending => "pending",
            FriendshipStatus::Accepted => "accepted",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub username: String,
    pub email: String,
    pub display_name: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Friendship {
    pub id: String,
    pub user_id: String,
    pub friend_id: String,
    pub status: FriendshipStatus,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Circle {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub color: String,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub member_count: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircleMember {
    pub id: String,
    pub circle_id: String,
    pub user_id: String,
    pub added_at: String,
}

/// An event row with its visibility fully resolved: for circles-tier events
/// the authorizing circle ids are folded into the `Visibility` value.
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub id: String,
    pub host_id: String,
    pub title: String,
    pub description: String,
    pub location_name: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub start_time: String,
    pub end_time: Option<String>,
    pub vibe: Vibe,
    #[serde(flatten)]
    pub visibility: Visibility,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<Profile>,
}

pub fn profile_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Profile> {
    Ok(Profile {
        id: row.get("id")?,
        username: row.get("username")?,
        email: row.get("email")?,
        display_name: row.get("display_name")?,
        created_at: row.get("created_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vibe_round_trips_through_str() {
        for vibe in VIBES {
            assert_eq!(vibe.as_str().parse::<Vibe>().unwrap(), vibe);
        }
    }

    #[test]
    fn unknown_vibe_is_rejected() {
        assert!("rowdy".parse::<Vibe>().is_err());
    }

    #[test]
    fn vibe_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&Vibe::Spontaneous).unwrap(),
            "\"spontaneous\""
        );
    }

    #[test]
    fn event_serializes_visibility_inline() {
        let event = Event {
            id: "e1".into(),
            host_id: "u1".into(),
            title: "Coffee".into(),
            description: String::new(),
            location_name: "Cafe Luna".into(),
            latitude: None,
            longitude: None,
            start_time: "2026-09-01T19:00:00Z".into(),
            end_time: None,
            vibe: Vibe::Cozy,
            visibility: Visibility::Circles {
                circle_ids: vec!["c1".into()],
            },
            created_at: "2026-08-28T00:00:00Z".into(),
            host: None,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["visibility"], "circles");
        assert_eq!(json["circle_ids"][0], "c1");
    }
}
