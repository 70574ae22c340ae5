use axum::{extract::State, routing::post, Json, Router};
use tracing::{info, instrument, warn};

use super::{
    dto::{SendSmsRequest, SendSmsResponse},
    services::{format_meal_message, normalize_phone},
};
use crate::{auth::jwt::AuthUser, error::AppError, extract::AppJson, state::AppState};

pub fn sms_routes() -> Router<AppState> {
    Router::new().route("/sms/send", post(send_meal))
}

#[instrument(skip(state, payload))]
pub async fn send_meal(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppJson(payload): AppJson<SendSmsRequest>,
) -> Result<Json<SendSmsResponse>, AppError> {
    let (Some(phone), Some(meal)) = (
        payload.phone_number.filter(|p| !p.trim().is_empty()),
        payload.meal,
    ) else {
        return Err(AppError::Validation(
            "Phone number and meal data are required".into(),
        ));
    };

    let sender = state.sms_sender()?;
    let to = normalize_phone(&phone).map_err(|e| {
        warn!("rejected phone number");
        e
    })?;
    let body = format_meal_message(&meal);

    let sent = sender.send(&to, &body).await?;
    info!(%user_id, sid = %sent.sid, status = %sent.status, "meal sent by sms");
    Ok(Json(SendSmsResponse {
        success: true,
        message_sid: sent.sid,
        status: sent.status,
        message: "Meal sent successfully!",
    }))
}
