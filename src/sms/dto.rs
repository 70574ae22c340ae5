use serde::{Deserialize, Deserializer, Serialize};

/// Meal fields the message is rendered from. Ingredient lists may be absent.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmsMeal {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub protein: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub veg_fruit: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub carb: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub other_ingredients: Vec<String>,
}

fn null_as_empty<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
    Option::<Vec<String>>::deserialize(d).map(Option::unwrap_or_default)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendSmsRequest {
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub meal: Option<SmsMeal>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendSmsResponse {
    pub success: bool,
    pub message_sid: String,
    pub status: String,
    pub message: &'static str,
}
