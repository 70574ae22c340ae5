use anyhow::Context;
use serde::Deserialize;
use tracing::warn;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DbConfig {
    pub url: String,
    pub max_connections: u32,
    pub connect_timeout_secs: u64,
}

/// Which backend holds the meal records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MealStoreKind {
    Notion,
    Postgres,
}

/// Notion credentials. Either half may be missing; the meal endpoints
/// report which one when they are called.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotionConfig {
    pub token: Option<String>,
    pub database_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: String,
    pub from_number: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub db: DbConfig,
    pub jwt: JwtConfig,
    pub meal_store: MealStoreKind,
    pub notion: NotionConfig,
    pub twilio: Option<TwilioConfig>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let db = DbConfig {
            url: std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            max_connections: parse_or("DB_MAX_CONNECTIONS", 10),
            connect_timeout_secs: parse_or("DB_CONNECT_TIMEOUT_SECS", 2),
        };
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "whiskin".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "whiskin-users".into()),
            ttl_minutes: parse_or("JWT_TTL_MINUTES", 60),
            refresh_ttl_minutes: parse_or("JWT_REFRESH_TTL_MINUTES", 60 * 24 * 14),
        };
        let meal_store = match std::env::var("MEAL_STORE").as_deref() {
            Ok("postgres") => MealStoreKind::Postgres,
            Ok("notion") | Err(_) => MealStoreKind::Notion,
            Ok(other) => anyhow::bail!("MEAL_STORE must be `notion` or `postgres`, got `{other}`"),
        };
        let notion = NotionConfig {
            token: non_empty("NOTION_TOKEN"),
            database_id: non_empty("NOTION_DATABASE_ID"),
        };
        let twilio = match (
            non_empty("TWILIO_ACCOUNT_SID"),
            non_empty("TWILIO_AUTH_TOKEN"),
            non_empty("TWILIO_PHONE_NUMBER"),
        ) {
            (Some(account_sid), Some(auth_token), Some(from_number)) => Some(TwilioConfig {
                account_sid,
                auth_token,
                from_number,
            }),
            _ => {
                warn!("twilio credentials incomplete; SMS sending disabled");
                None
            }
        };

        Ok(Self {
            db,
            jwt,
            meal_store,
            notion,
            twilio,
        })
    }
}

fn non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}
