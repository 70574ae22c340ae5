use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use time::OffsetDateTime;
use tracing::{info, instrument};

use crate::{auth::repo::User, error::AppError, meals::store::StoreInfo, state::AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/health/store", get(store_health))
        .route("/health/db", get(db_health))
}

#[derive(Debug, Serialize)]
pub struct StoreHealth {
    pub success: bool,
    pub message: &'static str,
    pub database: StoreInfo,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

#[derive(Debug, Serialize)]
pub struct DbHealth {
    pub status: &'static str,
    pub message: &'static str,
    pub users: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

#[instrument(skip(state))]
pub async fn store_health(State(state): State<AppState>) -> Result<Json<StoreHealth>, AppError> {
    let info = state.meal_store()?.describe().await?;
    info!(database = %info.id, properties = info.properties.len(), "meal store reachable");
    Ok(Json(StoreHealth {
        success: true,
        message: "Meal store connection successful",
        database: info,
        timestamp: OffsetDateTime::now_utc(),
    }))
}

#[instrument(skip(state))]
pub async fn db_health(State(state): State<AppState>) -> Result<Json<DbHealth>, AppError> {
    let users = User::count(&state.db).await?;
    Ok(Json(DbHealth {
        status: "success",
        message: "Database connection working",
        users,
        timestamp: OffsetDateTime::now_utc(),
    }))
}
