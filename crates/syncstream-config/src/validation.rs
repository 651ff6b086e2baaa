//! Configuration validation

use crate::schema::RawConfig;
use std::collections::HashSet;
use thiserror::Error;

/// Validation error
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("Strategy '{strategy_id}': {message}")]
    StrategyError { strategy_id: String, message: String },

    #[error("Duplicate strategy ID: {0}")]
    DuplicateStrategyId(String),

    #[error("Invalid URL for {field} '{value}': must start with http:// or https://")]
    InvalidUrl { field: &'static str, value: String },

    #[error("Default active strategy '{0}' is not declared in the catalog")]
    UnknownDefaultActive(String),

    #[error("Global config error: {0}")]
    GlobalError(String),
}

/// Validate a raw configuration
pub fn validate_config(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if config.engine.poll_interval_secs == Some(0) {
        errors.push(ValidationError::GlobalError(
            "engine.poll_interval_secs must be greater than 0".into(),
        ));
    }

    let provider = &config.provider;
    for (field, value) in [
        ("provider.api_base_url", &provider.api_base_url),
        ("provider.token_url", &provider.token_url),
    ] {
        if let Some(url) = value
            && !is_http_url(url)
        {
            errors.push(ValidationError::InvalidUrl {
                field,
                value: url.clone(),
            });
        }
    }

    if provider.request_timeout_secs == Some(0) {
        errors.push(ValidationError::GlobalError(
            "provider.request_timeout_secs must be greater than 0".into(),
        ));
    }

    if let Some(multiplier) = provider.retry.backoff_multiplier
        && !(multiplier >= 1.0 && multiplier.is_finite())
    {
        errors.push(ValidationError::GlobalError(format!(
            "provider.retry.backoff_multiplier must be >= 1.0, got {}",
            multiplier
        )));
    }

    // Check for duplicate strategy IDs
    let mut seen_ids = HashSet::new();
    for strategy in &config.catalog.strategies {
        if strategy.id.trim().is_empty() {
            errors.push(ValidationError::StrategyError {
                strategy_id: strategy.id.clone(),
                message: "id cannot be empty".into(),
            });
        }
        if strategy.name.trim().is_empty() {
            errors.push(ValidationError::StrategyError {
                strategy_id: strategy.id.clone(),
                message: "name cannot be empty".into(),
            });
        }
        if !seen_ids.insert(&strategy.id) {
            errors.push(ValidationError::DuplicateStrategyId(strategy.id.clone()));
        }
    }

    // With no declared strategies the built-in seeds apply, which the
    // default pointer cannot be checked against here.
    if let Some(default_active) = &config.catalog.default_active
        && !config.catalog.strategies.is_empty()
        && !seen_ids.contains(default_active)
    {
        errors.push(ValidationError::UnknownDefaultActive(default_active.clone()));
    }

    errors
}

fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}
