use crate::state::AppState;
use axum::Router;

pub mod dto;
pub mod error;
pub(crate) mod extractors;
pub mod handlers;
pub mod jwt;
pub mod password;
pub mod quick;
pub mod transport;

pub fn router() -> Router<AppState> {
    handlers::auth_routes()
}
