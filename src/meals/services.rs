use std::collections::HashMap;

use rand::seq::SliceRandom;
use serde::Serialize;

use super::store::{ImageChange, Meal};

/// Longest image value the meal store accepts in its URL field.
pub const IMAGE_FIELD_LIMIT: usize = 2000;

/// Ingredient chips shown per category.
const FACET_LIMIT: usize = 8;

/// Free-text query plus ingredient tokens that must all be present.
#[derive(Debug, Clone, Default)]
pub struct MealQuery {
    pub search: Option<String>,
    pub filters: Vec<String>,
}

impl MealQuery {
    pub fn new(search: Option<&str>, filter: Option<&str>) -> Self {
        let search = search.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string);
        let filters = filter
            .map(|f| {
                f.split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        Self { search, filters }
    }

    pub fn is_empty(&self) -> bool {
        self.search.is_none() && self.filters.is_empty()
    }
}

fn matches_search(meal: &Meal, needle: &str) -> bool {
    let contains = |s: &String| s.to_lowercase().contains(needle);
    contains(&meal.name)
        || meal.protein.iter().any(contains)
        || meal.veg_fruit.iter().any(contains)
        || meal.carb.iter().any(contains)
}

fn matches_filters(meal: &Meal, filters: &[String]) -> bool {
    filters.iter().all(|token| {
        meal.protein.contains(token) || meal.veg_fruit.contains(token) || meal.carb.contains(token)
    })
}

/// Keeps meals matching both the search text and every filter token, in input order.
pub fn filter_meals(meals: Vec<Meal>, query: &MealQuery) -> Vec<Meal> {
    if query.is_empty() {
        return meals;
    }
    let needle = query.search.as_deref().map(str::to_lowercase);
    meals
        .into_iter()
        .filter(|m| needle.as_deref().map_or(true, |n| matches_search(m, n)))
        .filter(|m| matches_filters(m, &query.filters))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngredientCount {
    pub name: String,
    pub count: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngredientFacets {
    pub protein: Vec<IngredientCount>,
    pub veg_fruit: Vec<IngredientCount>,
    pub carb: Vec<IngredientCount>,
}

fn top_counts<'a>(items: impl Iterator<Item = &'a String>) -> Vec<IngredientCount> {
    let mut order: Vec<&String> = Vec::new();
    let mut counts: HashMap<&String, usize> = HashMap::new();
    for item in items {
        let n = counts.entry(item).or_insert(0);
        if *n == 0 {
            order.push(item);
        }
        *n += 1;
    }
    let mut out: Vec<IngredientCount> = order
        .into_iter()
        .map(|name| IngredientCount {
            name: name.clone(),
            count: counts[name],
        })
        .collect();
    // stable: ties keep first-seen order
    out.sort_by(|a, b| b.count.cmp(&a.count));
    out.truncate(FACET_LIMIT);
    out
}

/// Most frequent ingredients per category, for building filter chips.
pub fn ingredient_facets(meals: &[Meal]) -> IngredientFacets {
    IngredientFacets {
        protein: top_counts(meals.iter().flat_map(|m| m.protein.iter())),
        veg_fruit: top_counts(meals.iter().flat_map(|m| m.veg_fruit.iter())),
        carb: top_counts(meals.iter().flat_map(|m| m.carb.iter())),
    }
}

pub fn pick_random(meals: &[Meal]) -> Option<&Meal> {
    meals.choose(&mut rand::thread_rng())
}

/// Decision for the image field of an update request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePlan {
    pub change: ImageChange,
    /// The supplied image exceeded the field limit and was dropped.
    pub skipped: bool,
}

/// `None` = field absent, `Some(None)` = explicit null.
pub fn plan_image_change(image: Option<Option<String>>) -> ImagePlan {
    match image {
        None => ImagePlan { change: ImageChange::Keep, skipped: false },
        Some(None) => ImagePlan { change: ImageChange::Clear, skipped: false },
        Some(Some(s)) if s.is_empty() => ImagePlan { change: ImageChange::Clear, skipped: false },
        Some(Some(s)) if s.len() > IMAGE_FIELD_LIMIT => {
            ImagePlan { change: ImageChange::Keep, skipped: true }
        }
        Some(Some(s)) => ImagePlan { change: ImageChange::Set(s), skipped: false },
    }
}

pub fn update_message(image_skipped: bool) -> &'static str {
    if image_skipped {
        "Meal updated successfully! Note: Image was too large and was not saved."
    } else {
        "Meal updated successfully"
    }
}
