use crate::state::AppState;
use axum::Router;

mod dto;
pub mod handlers;
pub mod sender;
pub mod services;
pub mod twilio;

pub fn router() -> Router<AppState> {
    handlers::sms_routes()
}
