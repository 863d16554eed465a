use std::path::Path;
use std::time::Duration;

use tracing::{info, warn};

use crate::error::AppError;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/restaurants.db?mode=rwc";
pub const DEFAULT_OVERPASS_URL: &str = "https://overpass-api.de/api/interpreter";

pub fn load_environment() -> Result<(), Box<dyn std::error::Error>> {
    let is_production =
        dotenvy::var("ROCKET_PROFILE").unwrap_or("development".to_string()) == "production";

    let env_files = if is_production {
        vec!["config/common.env", "config/prod.env", ".secrets.env"]
    } else {
        vec!["config/common.env", "config/dev.env", ".secrets.env"]
    };

    for env_file in env_files {
        load_env_file(env_file)?;
    }

    Ok(())
}

fn load_env_file(path: &str) -> Result<(), Box<dyn std::error::Error>> {
    if !Path::new(path).exists() {
        warn!("Warning: Environment file {} not found, skipping", path);
        return Ok(());
    }

    dotenvy::from_filename_override(path)?;
    info!("Loaded environment from: {}", path);
    Ok(())
}

/// Tunables for the Overpass enrichment job.
#[derive(Debug, Clone, PartialEq)]
pub struct OverpassSettings {
    pub url: String,
    pub initial_radius_m: u32,
    pub max_radius_m: u32,
    pub batch_size: i64,
    pub request_delay: Duration,
    pub retry_delay: Duration,
    pub max_retries: u32,
    pub similarity_threshold: f64,
    pub timeout: Duration,
}

impl Default for OverpassSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_OVERPASS_URL.to_string(),
            initial_radius_m: 20,
            max_radius_m: 80,
            batch_size: 200,
            request_delay: Duration::from_millis(1500),
            retry_delay: Duration::from_secs(10),
            max_retries: 3,
            similarity_threshold: 0.6,
            timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub database_url: String,
    pub session_ttl_hours: i64,
    pub overpass: OverpassSettings,
}

impl Settings {
    pub fn from_env() -> Result<Self, AppError> {
        let defaults = OverpassSettings::default();

        let overpass = OverpassSettings {
            url: dotenvy::var("OVERPASS_URL").unwrap_or(defaults.url),
            initial_radius_m: parse_var("OVERPASS_INITIAL_RADIUS_M", defaults.initial_radius_m)?,
            max_radius_m: parse_var("OVERPASS_MAX_RADIUS_M", defaults.max_radius_m)?,
            batch_size: parse_var("OVERPASS_BATCH_SIZE", defaults.batch_size)?,
            request_delay: Duration::from_millis(parse_var(
                "OVERPASS_REQUEST_DELAY_MS",
                defaults.request_delay.as_millis() as u64,
            )?),
            retry_delay: Duration::from_millis(parse_var(
                "OVERPASS_RETRY_DELAY_MS",
                defaults.retry_delay.as_millis() as u64,
            )?),
            max_retries: parse_var("OVERPASS_MAX_RETRIES", defaults.max_retries)?,
            similarity_threshold: parse_var(
                "OVERPASS_SIMILARITY_THRESHOLD",
                defaults.similarity_threshold,
            )?,
            timeout: Duration::from_secs(parse_var(
                "OVERPASS_TIMEOUT_SECS",
                defaults.timeout.as_secs(),
            )?),
        };

        if overpass.initial_radius_m == 0 || overpass.max_radius_m < overpass.initial_radius_m {
            return Err(AppError::Validation(format!(
                "Invalid Overpass radius range {}..={}",
                overpass.initial_radius_m, overpass.max_radius_m
            )));
        }

        if overpass.batch_size <= 0 {
            return Err(AppError::Validation(format!(
                "OVERPASS_BATCH_SIZE must be positive, got {}",
                overpass.batch_size
            )));
        }

        if !(0.0..=1.0).contains(&overpass.similarity_threshold) {
            return Err(AppError::Validation(format!(
                "OVERPASS_SIMILARITY_THRESHOLD must be within 0..=1, got {}",
                overpass.similarity_threshold
            )));
        }

        Ok(Self {
            database_url: dotenvy::var("DATABASE_URL")
                .unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
            session_ttl_hours: parse_var("SESSION_TTL_HOURS", 24)?,
            overpass,
        })
    }
}

fn parse_var<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match dotenvy::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map_err(|e| AppError::Validation(format!("{} has invalid value '{}': {}", key, raw, e))),
        _ => Ok(default),
    }
}
