use std::env;

use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub app_name: String,
    pub environment: String,
    pub api_prefix: String,
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
    pub database_url: Option<String>,
    pub db_pool_max_connections: u32,
    pub db_pool_min_connections: u32,
    pub db_pool_acquire_timeout_seconds: u64,
    pub db_pool_idle_timeout_seconds: u64,
    pub trial_days: i64,
    pub standard_plan_name: String,
    pub standard_plan_days: i64,
    pub business_timezone: Tz,
    pub auth_jwt_secret: Option<String>,
    pub dev_auth_overrides_enabled: bool,
    pub payment_webhook_secret: Option<String>,
    pub resend_api_key: Option<String>,
    pub email_from_address: String,
    pub receipt_delivery_enabled: bool,
    pub rate_limit_per_second: u64,
    pub rate_limit_burst_size: u32,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            app_name: env_or("APP_NAME", "PG Ledger API"),
            environment: env_or("ENVIRONMENT", "development"),
            api_prefix: normalize_prefix(&env_or("API_PREFIX", "/v1")),
            host: env_or("HOST", "0.0.0.0"),
            port: env_parse_or("PORT", 8000),
            cors_origins: parse_csv(&env_or("CORS_ORIGINS", "http://localhost:3000")),
            database_url: env_opt("DATABASE_URL"),
            db_pool_max_connections: env_parse_or("DB_POOL_MAX_CONNECTIONS", 5),
            db_pool_min_connections: env_parse_or("DB_POOL_MIN_CONNECTIONS", 1),
            db_pool_acquire_timeout_seconds: env_parse_or("DB_POOL_ACQUIRE_TIMEOUT_SECONDS", 5),
            db_pool_idle_timeout_seconds: env_parse_or("DB_POOL_IDLE_TIMEOUT_SECONDS", 600),
            trial_days: env_parse_or("TRIAL_DAYS", 10),
            standard_plan_name: env_or("STANDARD_PLAN_NAME", "STANDARD"),
            standard_plan_days: env_parse_or("STANDARD_PLAN_DAYS", 365),
            business_timezone: parse_timezone(&env_or("BUSINESS_TIMEZONE", "Asia/Kolkata")),
            auth_jwt_secret: env_opt("AUTH_JWT_SECRET"),
            dev_auth_overrides_enabled: env_parse_bool_or("DEV_AUTH_OVERRIDES_ENABLED", false),
            payment_webhook_secret: env_opt("PAYMENT_WEBHOOK_SECRET"),
            resend_api_key: env_opt("RESEND_API_KEY"),
            email_from_address: env_or("EMAIL_FROM_ADDRESS", "no-reply@nivora.work"),
            receipt_delivery_enabled: env_parse_bool_or("RECEIPT_DELIVERY_ENABLED", true),
            rate_limit_per_second: env_parse_or("RATE_LIMIT_PER_SECOND", 10),
            rate_limit_burst_size: env_parse_or("RATE_LIMIT_BURST_SIZE", 100),
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment.trim().eq_ignore_ascii_case("production")
    }

    pub fn auth_dev_overrides_enabled(&self) -> bool {
        if self.is_production() {
            return false;
        }
        self.dev_auth_overrides_enabled
    }

    /// Calendar date in the business timezone. Trial and billing periods are
    /// all counted in local days.
    pub fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.business_timezone).date_naive()
    }
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_or(key: &str, default: &str) -> String {
    env_opt(key).unwrap_or_else(|| default.to_string())
}

fn env_parse_or<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    env_opt(key)
        .and_then(|raw| raw.parse::<T>().ok())
        .unwrap_or(default)
}

fn env_parse_bool_or(key: &str, default: bool) -> bool {
    parse_bool(env_opt(key).as_deref(), default)
}

fn parse_bool(raw: Option<&str>, default: bool) -> bool {
    match raw.map(str::to_ascii_lowercase) {
        Some(value) if value == "1" || value == "true" || value == "yes" || value == "on" => true,
        Some(value) if value == "0" || value == "false" || value == "no" || value == "off" => false,
        Some(_) => default,
        None => default,
    }
}

fn parse_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

fn parse_timezone(raw: &str) -> Tz {
    raw.parse::<Tz>().unwrap_or_else(|_| {
        tracing::warn!(timezone = raw, "Unknown BUSINESS_TIMEZONE, falling back to UTC");
        Tz::UTC
    })
}

fn normalize_prefix(raw: &str) -> String {
    let mut prefix = raw.trim().to_string();
    if prefix.is_empty() {
        return "/v1".to_string();
    }
    if !prefix.starts_with('/') {
        prefix.insert(0, '/');
    }
    while prefix.ends_with('/') && prefix.len() > 1 {
        prefix.pop();
    }
    prefix
}

#[cfg(test)]
impl AppConfig {
    pub fn for_tests() -> Self {
        Self {
            app_name: "PG Ledger API".to_string(),
            environment: "test".to_string(),
            api_prefix: "/v1".to_string(),
            host: "127.0.0.1".to_string(),
            port: 0,
            cors_origins: vec!["*".to_string()],
            database_url: None,
            db_pool_max_connections: 1,
            db_pool_min_connections: 1,
            db_pool_acquire_timeout_seconds: 1,
            db_pool_idle_timeout_seconds: 1,
            trial_days: 10,
            standard_plan_name: "STANDARD".to_string(),
            standard_plan_days: 365,
            business_timezone: Tz::UTC,
            auth_jwt_secret: Some("test-secret".to_string()),
            dev_auth_overrides_enabled: true,
            payment_webhook_secret: Some("whsec".to_string()),
            resend_api_key: None,
            email_from_address: "no-reply@example.com".to_string(),
            receipt_delivery_enabled: false,
            rate_limit_per_second: 10,
            rate_limit_burst_size: 100,
        }
    }
}
