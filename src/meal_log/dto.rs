use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::{macros::format_description, Date, OffsetDateTime};

use crate::error::AppError;

/// `YYYY-MM-DD`, defaulting to today (UTC).
pub fn parse_date(raw: Option<&str>) -> Result<Date, AppError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(OffsetDateTime::now_utc().date()),
        Some(s) => Date::parse(s, format_description!("[year]-[month]-[day]"))
            .map_err(|_| AppError::Validation(format!("Invalid date `{s}`, expected YYYY-MM-DD"))),
    }
}

pub fn format_date(date: Date) -> String {
    date.format(format_description!("[year]-[month]-[day]"))
        .unwrap_or_else(|_| date.to_string())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogQuery {
    pub date: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveQuery {
    pub meal_id: Option<String>,
    pub date: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogMealRequest {
    #[serde(default)]
    pub meal_id: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayLogResponse {
    pub date: String,
    pub meal_ids: Vec<String>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AllLogsResponse {
    pub logs: BTreeMap<String, Vec<String>>,
    pub total_days: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogMealResponse {
    pub message: &'static str,
    pub date: String,
    pub meal_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_for_day: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveMealResponse {
    pub message: &'static str,
    pub date: String,
    pub meal_id: String,
    pub remaining_for_day: usize,
}
