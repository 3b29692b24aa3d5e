use crate::state::AppState;
use axum::Router;

pub mod component;
pub mod dto;
pub mod handlers;
pub mod layout;
pub mod projection;
pub mod repo;
pub mod repo_types;
pub mod services;
pub mod wizard;

pub fn router() -> Router<AppState> {
    handlers::admin_routes()
}
