use axum::{
    extract::State,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use tracing::{info, instrument, warn};

use super::dto::{
    format_date, parse_date, AllLogsResponse, DayLogResponse, LogMealRequest, LogMealResponse,
    LogQuery, RemoveMealResponse, RemoveQuery,
};
use super::store::{LogOutcome, RemoveOutcome};
use crate::{
    auth::jwt::AuthUser,
    db,
    error::AppError,
    extract::{AppJson, AppQuery},
    state::AppState,
};

pub fn meal_log_routes() -> Router<AppState> {
    Router::new().route("/meal-log", get(get_logs).post(log_meal).delete(remove_meal))
}

fn require_meal_id(meal_id: Option<String>) -> Result<String, AppError> {
    meal_id
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
        .ok_or_else(|| AppError::Validation("Meal ID is required".into()))
}

/// Log rows reference `users`, so a foreign key failure means the token outlived its account.
fn log_write_error(err: anyhow::Error) -> AppError {
    match err.downcast_ref::<sqlx::Error>() {
        Some(e) if db::is_foreign_key_violation(e) => {
            warn!("meal log write for unknown user");
            AppError::Unauthorized("User not found".into())
        }
        _ => AppError::from(err),
    }
}

#[instrument(skip(state))]
pub async fn get_logs(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppQuery(q): AppQuery<LogQuery>,
) -> Result<Response, AppError> {
    let requested = q.date.as_deref().map(str::trim).filter(|d| !d.is_empty());
    if let Some(raw) = requested {
        let date = parse_date(Some(raw))?;
        let meal_ids = state.meal_log.day(user_id, date).await?;
        let body = DayLogResponse {
            date: format_date(date),
            count: meal_ids.len(),
            meal_ids,
        };
        return Ok(Json(body).into_response());
    }

    let logs = state.meal_log.all(user_id).await?;
    let body = AllLogsResponse {
        total_days: logs.len(),
        logs: logs.into_iter().map(|(d, ids)| (format_date(d), ids)).collect(),
    };
    Ok(Json(body).into_response())
}

#[instrument(skip(state, payload))]
pub async fn log_meal(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppJson(payload): AppJson<LogMealRequest>,
) -> Result<Json<LogMealResponse>, AppError> {
    let meal_id = require_meal_id(payload.meal_id)?;
    let date = parse_date(payload.date.as_deref())?;

    let outcome = state
        .meal_log
        .log(user_id, date, &meal_id)
        .await
        .map_err(log_write_error)?;
    let date = format_date(date);
    Ok(Json(match outcome {
        LogOutcome::AlreadyLogged => LogMealResponse {
            message: "Meal already logged for this date",
            date,
            meal_id,
            total_for_day: None,
        },
        LogOutcome::Logged { total_for_day } => {
            info!(%user_id, %date, %meal_id, total_for_day, "meal logged");
            LogMealResponse {
                message: "Meal logged successfully",
                date,
                meal_id,
                total_for_day: Some(total_for_day),
            }
        }
    }))
}

#[instrument(skip(state))]
pub async fn remove_meal(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppQuery(q): AppQuery<RemoveQuery>,
) -> Result<Json<RemoveMealResponse>, AppError> {
    let meal_id = require_meal_id(q.meal_id)?;
    let date = parse_date(q.date.as_deref())?;

    match state.meal_log.remove(user_id, date, &meal_id).await? {
        RemoveOutcome::NoLogsForDate => {
            Err(AppError::NotFound("No logs found for this date".into()))
        }
        RemoveOutcome::NotInLog => Err(AppError::NotFound(
            "Meal not found in log for this date".into(),
        )),
        RemoveOutcome::Removed { remaining_for_day } => Ok(Json(RemoveMealResponse {
            message: "Meal removed from log",
            date: format_date(date),
            meal_id,
            remaining_for_day,
        })),
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;
    use uuid::Uuid;

    use sqlx::error::ErrorKind;

    use super::log_write_error;
    use crate::{
        state::AppState,
        test_support::{bearer, call, db_error},
    };

    #[test]
    fn write_for_deleted_user_is_unauthorized() {
        let err = log_write_error(anyhow::Error::from(db_error(ErrorKind::ForeignKeyViolation)));
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.to_string(), "User not found");

        let err = log_write_error(anyhow::Error::from(db_error(ErrorKind::CheckViolation)));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let err = log_write_error(anyhow::anyhow!("disk full"));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn empty_date_query_lists_every_day() {
        let state = AppState::fake();
        let auth = bearer(&state, Uuid::new_v4());
        for date in ["2024-05-01", "2024-05-02"] {
            call(
                &state,
                "POST",
                "/api/meal-log",
                Some(&auth),
                Some(json!({ "mealId": "m1", "date": date })),
            )
            .await;
        }

        for uri in ["/api/meal-log?date=", "/api/meal-log?date=%20"] {
            let (status, body) = call(&state, "GET", uri, Some(&auth), None).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["totalDays"], 2);
            assert!(body.get("count").is_none());
        }
    }

    #[tokio::test]
    async fn requires_authentication() {
        let state = AppState::fake();
        let (status, body) = call(&state, "GET", "/api/meal-log", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn second_log_reports_already_logged() {
        let state = AppState::fake();
        let auth = bearer(&state, Uuid::new_v4());
        let body = json!({ "mealId": "m1", "date": "2024-05-01" });

        let (status, first) =
            call(&state, "POST", "/api/meal-log", Some(&auth), Some(body.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(first["message"], "Meal logged successfully");
        assert_eq!(first["totalForDay"], 1);

        let (status, second) = call(&state, "POST", "/api/meal-log", Some(&auth), Some(body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(second["message"], "Meal already logged for this date");

        let (_, day) =
            call(&state, "GET", "/api/meal-log?date=2024-05-01", Some(&auth), None).await;
        assert_eq!(day["mealIds"], json!(["m1"]));
        assert_eq!(day["count"], 1);
    }

    #[tokio::test]
    async fn deleting_unlogged_meal_is_not_found_and_leaves_log() {
        let state = AppState::fake();
        let auth = bearer(&state, Uuid::new_v4());

        let (status, body) = call(
            &state,
            "DELETE",
            "/api/meal-log?mealId=m1&date=2024-05-01",
            Some(&auth),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "No logs found for this date");

        call(
            &state,
            "POST",
            "/api/meal-log",
            Some(&auth),
            Some(json!({ "mealId": "m1", "date": "2024-05-01" })),
        )
        .await;
        let (status, body) = call(
            &state,
            "DELETE",
            "/api/meal-log?mealId=m2&date=2024-05-01",
            Some(&auth),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Meal not found in log for this date");

        let (_, all) = call(&state, "GET", "/api/meal-log", Some(&auth), None).await;
        assert_eq!(all["totalDays"], 1);
        assert_eq!(all["logs"]["2024-05-01"], json!(["m1"]));
    }

    #[tokio::test]
    async fn missing_meal_id_and_bad_date_are_rejected() {
        let state = AppState::fake();
        let auth = bearer(&state, Uuid::new_v4());

        let (status, body) =
            call(&state, "POST", "/api/meal-log", Some(&auth), Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Meal ID is required");

        let (status, _) = call(
            &state,
            "POST",
            "/api/meal-log",
            Some(&auth),
            Some(json!({ "mealId": "m1", "date": "05/01/2024" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
