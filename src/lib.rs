// Library exports for Vamos
// This allows integration tests and external code to use Vamos modules

pub mod ai;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod geocode;
pub mod map;
pub mod routes;
pub mod state;
pub mod visibility;
