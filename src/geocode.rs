//! Forward geocoding through OpenStreetMap Nominatim. Free, no API key;
//! rate limited to roughly one request per second, so lookups happen only on
//! explicit user action. Any failure degrades to "no result".

use serde::{Deserialize, Serialize};

use crate::error::AppResult;

const USER_AGENT: &str = "vamos-app/0.1";

#[derive(Debug, Clone, Serialize)]
pub struct GeoResult {
    pub lat: f64,
    pub lng: f64,
    pub display_name: String,
}

#[derive(Debug, Deserialize)]
struct NominatimRow {
    lat: String,
    lon: String,
    display_name: String,
}

/// Resolve a free-text location to coordinates. Queries shorter than three
/// characters are not worth a network round trip.
pub async fn lookup(
    http: &reqwest::Client,
    base_url: &str,
    query: &str,
) -> AppResult<Option<GeoResult>> {
    let query = query.trim();
    if query.len() < 3 {
        return Ok(None);
    }

    let mut url = url::Url::parse(&format!("{}/search", base_url.trim_end_matches('/')))
        .map_err(|e| crate::error::AppError::Internal(format!("bad geocode base url: {e}")))?;
    url.query_pairs_mut()
        .append_pair("format", "json")
        .append_pair("q", query)
        .append_pair("limit", "1");

    let response = match http
        .get(url)
        .header(reqwest::header::USER_AGENT, USER_AGENT)
        .send()
        .await
    {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!("Geocode request failed: {}", e);
            return Ok(None);
        }
    };
    if !response.status().is_success() {
        return Ok(None);
    }

    let rows: Vec<NominatimRow> = match response.json().await {
        Ok(rows) => rows,
        Err(_) => return Ok(None),
    };

    Ok(rows.into_iter().next().and_then(|row| {
        let lat = row.lat.parse().ok()?;
        let lng = row.lon.parse().ok()?;
        Some(GeoResult {
            lat,
            lng,
            display_name: row.display_name,
        })
    }))
}
