pub mod handlers;
pub mod session;
