use super::{dto::SmsMeal, sender::SmsError};

const DEFAULT_NAME: &str = "Meal Recipe";
const SIGNATURE: &str = "From Whiskin 🍴";

/// Renders a meal as a plain-text message: name, ingredients, signature.
pub fn format_meal_message(meal: &SmsMeal) -> String {
    let name = meal
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or(DEFAULT_NAME);
    let mut message = format!("{name}\n\n");

    let ingredients: Vec<&str> = [
        &meal.protein,
        &meal.veg_fruit,
        &meal.carb,
        &meal.other_ingredients,
    ]
    .into_iter()
    .flatten()
    .map(String::as_str)
    .collect();
    if !ingredients.is_empty() {
        message.push_str(&format!("Ingredients: {}\n\n", ingredients.join(", ")));
    }

    message.push_str(SIGNATURE);
    message
}

/// Normalizes a US number to `+1XXXXXXXXXX`.
pub fn normalize_phone(raw: &str) -> Result<String, SmsError> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    let national = match digits.len() {
        11 if digits.starts_with('1') => &digits[1..],
        10 => digits.as_str(),
        _ => return Err(SmsError::InvalidPhone),
    };
    Ok(format!("+1{national}"))
}
