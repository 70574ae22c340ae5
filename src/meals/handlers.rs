use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use time::OffsetDateTime;
use tracing::{info, instrument, warn};

use super::dto::{
    CreateMealRequest, CreatedMealResponse, DeletedMealResponse, FacetsResponse,
    ImageUploadResponse, ListParams, MealListResponse, RandomMealResponse, UpdateMealRequest,
    UpdatedMealResponse,
};
use super::services::{
    filter_meals, ingredient_facets, pick_random, plan_image_change, update_message, MealQuery,
    IMAGE_FIELD_LIMIT,
};
use super::store::{ImageChange, MealPatch, NewMeal};
use crate::{
    error::AppError,
    extract::{AppJson, AppQuery},
    images::{
        compress::Compressed,
        handlers::{compress_in_background, read_file_field, UPLOAD_BODY_LIMIT},
    },
    state::AppState,
};

// --- public routers ---

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/meals", get(list_meals))
        .route("/meals/random", get(random_meal))
        .route("/meals/ingredients", get(ingredients))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/meals", post(create_meal))
        .route("/meals/:id", put(update_meal).delete(delete_meal))
        .route(
            "/meals/:id/image",
            post(upload_image).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
}

// --- handlers ---

#[instrument(skip(state))]
pub async fn list_meals(
    State(state): State<AppState>,
    AppQuery(p): AppQuery<ListParams>,
) -> Result<Json<MealListResponse>, AppError> {
    let store = state.meal_store()?;
    let query = MealQuery::new(p.q.as_deref(), p.filter.as_deref());
    let meals = filter_meals(store.list().await?, &query);
    info!(count = meals.len(), filtered = !query.is_empty(), "meals listed");
    Ok(Json(MealListResponse {
        count: meals.len(),
        meals,
        timestamp: OffsetDateTime::now_utc(),
    }))
}

#[instrument(skip(state))]
pub async fn random_meal(
    State(state): State<AppState>,
) -> Result<Json<RandomMealResponse>, AppError> {
    let meals = state.meal_store()?.list().await?;
    let meal = pick_random(&meals)
        .cloned()
        .ok_or_else(|| AppError::NotFound("No meals available".into()))?;
    Ok(Json(RandomMealResponse { meal }))
}

#[instrument(skip(state))]
pub async fn ingredients(State(state): State<AppState>) -> Result<Json<FacetsResponse>, AppError> {
    let meals = state.meal_store()?.list().await?;
    Ok(Json(FacetsResponse {
        facets: ingredient_facets(&meals),
        meal_count: meals.len(),
    }))
}

#[instrument(skip(state, payload))]
pub async fn create_meal(
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateMealRequest>,
) -> Result<(StatusCode, Json<CreatedMealResponse>), AppError> {
    let name = payload
        .name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .ok_or_else(|| AppError::Validation("Meal name is required".into()))?;
    let store = state.meal_store()?;

    let mut image_skipped = false;
    let image = payload.image.filter(|i| !i.is_empty()).and_then(|i| {
        if i.len() > IMAGE_FIELD_LIMIT {
            warn!(length = i.len(), "image too large for meal store; dropped");
            image_skipped = true;
            None
        } else {
            Some(i)
        }
    });

    let id = store
        .create(NewMeal {
            name,
            protein: payload.protein.unwrap_or_default(),
            veg_fruit: payload.veg_fruit.unwrap_or_default(),
            carb: payload.carb.unwrap_or_default(),
            other_ingredients: payload.other_ingredients.unwrap_or_default(),
            image,
        })
        .await?;

    info!(meal_id = %id, "meal created");
    let message = if image_skipped {
        "Meal created successfully! Note: Image was too large and was not saved."
    } else {
        "Meal created successfully"
    };
    Ok((
        StatusCode::CREATED,
        Json(CreatedMealResponse {
            message: message.into(),
            meal_id: id,
            timestamp: OffsetDateTime::now_utc(),
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn update_meal(
    State(state): State<AppState>,
    Path(id): Path<String>,
    AppJson(payload): AppJson<UpdateMealRequest>,
) -> Result<Json<UpdatedMealResponse>, AppError> {
    let store = state.meal_store()?;
    let image = plan_image_change(payload.image);
    if image.skipped {
        warn!(meal_id = %id, "image too large for meal store; skipped");
    }

    let patch = MealPatch {
        name: payload
            .name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty()),
        protein: payload.protein,
        veg_fruit: payload.veg_fruit,
        carb: payload.carb,
        other_ingredients: payload.other_ingredients,
        image: image.change,
    };
    let meal = store.update(&id, patch).await?;

    info!(meal_id = %id, "meal updated");
    Ok(Json(UpdatedMealResponse {
        message: update_message(image.skipped).into(),
        meal,
        timestamp: OffsetDateTime::now_utc(),
    }))
}

#[instrument(skip(state))]
pub async fn delete_meal(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeletedMealResponse>, AppError> {
    state.meal_store()?.archive(&id).await?;
    info!(meal_id = %id, "meal archived");
    Ok(Json(DeletedMealResponse {
        message: "Meal deleted successfully".into(),
        meal_id: id,
        timestamp: OffsetDateTime::now_utc(),
    }))
}

/// Compresses an uploaded photo and stores it as the meal image when it fits.
#[instrument(skip(state, mp))]
pub async fn upload_image(
    State(state): State<AppState>,
    Path(id): Path<String>,
    mut mp: Multipart,
) -> Result<Json<ImageUploadResponse>, AppError> {
    let store = state.meal_store()?;
    let upload = read_file_field(&mut mp).await?;

    match compress_in_background(upload).await? {
        Compressed::Fits { data_url, attempts } => {
            let length = data_url.len();
            let patch = MealPatch {
                image: ImageChange::Set(data_url),
                ..Default::default()
            };
            let meal = store.update(&id, patch).await?;
            info!(meal_id = %id, length, attempts, "meal image saved");
            Ok(Json(ImageUploadResponse {
                message: "Meal image updated successfully",
                image_saved: true,
                length,
                attempts,
                meal: Some(meal),
            }))
        }
        Compressed::TooLarge { length, attempts } => {
            warn!(meal_id = %id, length, attempts, "compressed image still too large; not saved");
            Ok(Json(ImageUploadResponse {
                message: "Image was too large and was not saved.",
                image_saved: false,
                length,
                attempts,
                meal: None,
            }))
        }
    }
}
