use async_trait::async_trait;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::AppError;

/// A meal as the rest of the application sees it, whatever the backing store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meal {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub protein: Vec<String>,
    #[serde(default)]
    pub veg_fruit: Vec<String>,
    #[serde(default)]
    pub carb: Vec<String>,
    #[serde(default)]
    pub other_ingredients: Vec<String>,
    #[serde(default)]
    pub image: Option<String>,
}

/// Validated input for a new record. Empty lists are skipped on write.
#[derive(Debug, Clone, Default)]
pub struct NewMeal {
    pub name: String,
    pub protein: Vec<String>,
    pub veg_fruit: Vec<String>,
    pub carb: Vec<String>,
    pub other_ingredients: Vec<String>,
    pub image: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ImageChange {
    #[default]
    Keep,
    Clear,
    Set(String),
}

/// Partial update: `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default)]
pub struct MealPatch {
    pub name: Option<String>,
    pub protein: Option<Vec<String>>,
    pub veg_fruit: Option<Vec<String>>,
    pub carb: Option<Vec<String>>,
    pub other_ingredients: Option<Vec<String>>,
    pub image: ImageChange,
}

/// What a connectivity probe learned about the store.
#[derive(Debug, Clone, Serialize)]
pub struct StoreInfo {
    pub id: String,
    pub title: String,
    pub properties: Vec<String>,
}

/// Failure causes, tagged where the outbound call is made.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Timeout(String),
    #[error("{0}")]
    Unavailable(String),
    #[error("upstream rejected request ({status}): {message}")]
    Upstream { status: u16, message: String },
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unauthorized(details) => AppError::Upstream {
                status: StatusCode::UNAUTHORIZED,
                message: "Meal store authentication failed. Please check your credentials."
                    .into(),
                details: Some(details),
            },
            StoreError::NotFound(details) => AppError::Upstream {
                status: StatusCode::NOT_FOUND,
                message: "Meal or meal database not found.".into(),
                details: Some(details),
            },
            StoreError::Timeout(details) => AppError::Timeout {
                message: "Connection to the meal store timed out. Please try again.".into(),
                details: Some(details),
            },
            StoreError::Unavailable(details) => AppError::Unavailable {
                message: "Meal store is unreachable. Please try again later.".into(),
                details: Some(details),
            },
            StoreError::Upstream { status, message } => AppError::Upstream {
                status: if (400..500).contains(&status) {
                    StatusCode::BAD_REQUEST
                } else {
                    StatusCode::BAD_GATEWAY
                },
                message: "Meal store rejected the request".into(),
                details: Some(message),
            },
            StoreError::Internal(e) => AppError::Internal(e),
        }
    }
}

#[async_trait]
pub trait MealStore: Send + Sync {
    /// All live meals with a non-empty name.
    async fn list(&self) -> Result<Vec<Meal>, StoreError>;
    /// Returns the id assigned by the store.
    async fn create(&self, meal: NewMeal) -> Result<String, StoreError>;
    /// Applies the patch and returns the record as stored afterwards.
    async fn update(&self, id: &str, patch: MealPatch) -> Result<Meal, StoreError>;
    /// Soft delete.
    async fn archive(&self, id: &str) -> Result<(), StoreError>;
    async fn describe(&self) -> Result<StoreInfo, StoreError>;
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_map_to_distinct_statuses() {
        let cases = [
            (StoreError::Unauthorized("x".into()), StatusCode::UNAUTHORIZED),
            (StoreError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (StoreError::Timeout("x".into()), StatusCode::GATEWAY_TIMEOUT),
            (StoreError::Unavailable("x".into()), StatusCode::SERVICE_UNAVAILABLE),
            (
                StoreError::Upstream { status: 400, message: "bad".into() },
                StatusCode::BAD_REQUEST,
            ),
            (
                StoreError::Upstream { status: 502, message: "bad".into() },
                StatusCode::BAD_GATEWAY,
            ),
            (
                StoreError::Internal(anyhow::anyhow!("x")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            let app: AppError = err.into();
            assert_eq!(app.status(), expected);
        }
    }

    #[test]
    fn meal_serializes_camel_case() {
        let meal = Meal {
            id: "1".into(),
            name: "Tacos".into(),
            protein: vec!["Beef".into()],
            veg_fruit: vec![],
            carb: vec![],
            other_ingredients: vec!["Salsa".into()],
            image: None,
        };
        let json = serde_json::to_value(&meal).unwrap();
        assert_eq!(json["vegFruit"], serde_json::json!([]));
        assert_eq!(json["otherIngredients"], serde_json::json!(["Salsa"]));
        assert!(json["image"].is_null());
    }
}
