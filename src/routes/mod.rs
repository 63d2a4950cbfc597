pub mod ai;
pub mod circles;
pub mod events;
pub mod feed;
pub mod friends;
pub mod profile;

use axum::Router;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(feed::router())
        .merge(events::router())
        .merge(friends::router())
        .merge(circles::router())
        .merge(profile::router())
        .merge(ai::router())
}
