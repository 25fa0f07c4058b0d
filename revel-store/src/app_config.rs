use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub auth: AuthConfig,
    pub payment: PaymentConfig,
    pub booking_rules: BookingRules,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_expiration_seconds: u64,
    /// Exposes the token-minting endpoint. Off unless a config layer turns
    /// it on, so a bare production config cannot ship it by accident.
    #[serde(default)]
    pub dev_tokens: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PaymentConfig {
    /// "mock" wires in the in-process gateway; anything else is rejected at
    /// startup until a real provider adapter lands.
    pub provider: String,
    pub verify_timeout_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BookingRules {
    pub currency: String,
    #[serde(default = "default_reminder_lead_hours")]
    pub reminder_lead_hours: i64,
    #[serde(default = "default_reference_max_attempts")]
    pub reference_max_attempts: u32,
}

fn default_reminder_lead_hours() -> i64 {
    24
}

fn default_reference_max_attempts() -> u32 {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct RateLimitConfig {
    pub requests: i64,
    pub window_seconds: i64,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            // Start off by merging in the "default" configuration file
            .add_source(config::File::with_name("config/default"))
            // Add in the current environment file
            // Default to 'development' env
            // Note that this file is _optional_
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Add in a local configuration file
            // This file shouldn't be checked in to git
            .add_source(config::File::with_name("config/local").required(false))
            // Add in settings from the environment (with a prefix of REVEL)
            // Eg. `REVEL_SERVER__PORT=8081` would set `server.port`
            .add_source(config::Environment::with_prefix("REVEL").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
