use serde::{Deserialize, Deserializer, Serialize};
use time::OffsetDateTime;

use super::services::IngredientFacets;
use super::store::Meal;

#[derive(Debug, Serialize)]
pub struct MealListResponse {
    pub meals: Vec<Meal>,
    pub count: usize,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub q: Option<String>,
    /// Comma-separated ingredient tokens.
    pub filter: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RandomMealResponse {
    pub meal: Meal,
}

#[derive(Debug, Serialize)]
pub struct FacetsResponse {
    #[serde(flatten)]
    pub facets: IngredientFacets,
    #[serde(rename = "mealCount")]
    pub meal_count: usize,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMealRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub protein: Option<Vec<String>>,
    #[serde(default)]
    pub veg_fruit: Option<Vec<String>>,
    #[serde(default)]
    pub carb: Option<Vec<String>>,
    #[serde(default)]
    pub other_ingredients: Option<Vec<String>>,
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMealRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub protein: Option<Vec<String>>,
    #[serde(default)]
    pub veg_fruit: Option<Vec<String>>,
    #[serde(default)]
    pub carb: Option<Vec<String>>,
    #[serde(default)]
    pub other_ingredients: Option<Vec<String>>,
    /// Absent keeps the image, `null` or `""` clears it.
    #[serde(default, deserialize_with = "present")]
    pub image: Option<Option<String>>,
}

/// Distinguishes an explicit `null` from a missing field.
fn present<'de, D, T>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedMealResponse {
    pub message: String,
    pub meal_id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

#[derive(Debug, Serialize)]
pub struct UpdatedMealResponse {
    pub message: String,
    pub meal: Meal,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedMealResponse {
    pub message: String,
    pub meal_id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

/// Outcome of attaching an uploaded image to a meal.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageUploadResponse {
    pub message: &'static str,
    pub image_saved: bool,
    pub length: usize,
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meal: Option<Meal>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_image_distinguishes_absent_null_and_value() {
        let absent: UpdateMealRequest = serde_json::from_str(r#"{"name":"x"}"#).unwrap();
        assert_eq!(absent.image, None);

        let null: UpdateMealRequest = serde_json::from_str(r#"{"image":null}"#).unwrap();
        assert_eq!(null.image, Some(None));

        let set: UpdateMealRequest =
            serde_json::from_str(r#"{"image":"https://x/y.jpg","vegFruit":[]}"#).unwrap();
        assert_eq!(set.image, Some(Some("https://x/y.jpg".into())));
        assert_eq!(set.veg_fruit, Some(vec![]));
        assert_eq!(set.protein, None);
    }
}
