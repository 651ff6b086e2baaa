//! Config validation CLI tool
//!
//! Validates a syncstreamd configuration file and reports any errors.

use std::path::PathBuf;
use std::process::ExitCode;
use syncstream_config::{ConfigError, CURRENT_CONFIG_VERSION, ProviderMode};
use syncstream_util::default_config_path;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    let config_path = match args.get(1) {
        Some(path) => PathBuf::from(path),
        None => {
            let default_path = default_config_path();
            eprintln!("Usage: validate-config [config-file]");
            eprintln!();
            eprintln!("Validates a syncstreamd configuration file.");
            eprintln!();
            eprintln!("If no path is provided, uses: {}", default_path.display());
            eprintln!();
            eprintln!("Example:");
            eprintln!("  validate-config {}", default_path.display());
            eprintln!("  validate-config config.example.toml");
            return ExitCode::from(2);
        }
    };

    if !config_path.exists() {
        eprintln!("Error: Configuration file not found: {}", config_path.display());
        return ExitCode::from(1);
    }

    match syncstream_config::load_config(&config_path) {
        Ok(settings) => {
            println!("✓ Configuration is valid");
            println!();
            println!("Summary:");
            println!("  Config version: {}", CURRENT_CONFIG_VERSION);
            println!("  Poll interval: {}s", settings.engine.poll_interval.as_secs());
            let mode = match settings.provider.mode {
                ProviderMode::Spotify => format!("spotify ({})", settings.provider.api_base_url),
                ProviderMode::Mock => "mock".to_string(),
            };
            println!("  Provider: {}", mode);
            if let Some(active) = &settings.catalog.default_active {
                println!("  Default active strategy: {}", active);
            }

            if settings.provider.mode == ProviderMode::Spotify
                && let Err(e) = settings.provider.resolve_credentials(|k| std::env::var(k).ok())
            {
                println!("  Warning: {}", e);
            }

            println!();
            println!("Strategies:");
            for strategy in &settings.catalog.strategies {
                let flag = if strategy.is_active { "" } else { " (disabled)" };
                println!("  - {}: {}{}", strategy.id, strategy.name, flag);
            }

            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("✗ Configuration validation failed");
            eprintln!();
            match &e {
                ConfigError::ReadError(io_err) => {
                    eprintln!("Failed to read file: {}", io_err);
                }
                ConfigError::ParseError(parse_err) => {
                    eprintln!("TOML parse error:");
                    eprintln!("  {}", parse_err);
                }
                ConfigError::ValidationFailed { errors } => {
                    eprintln!("Validation errors ({}):", errors.len());
                    for err in errors {
                        eprintln!("  - {}", err);
                    }
                }
                ConfigError::UnsupportedVersion(ver) => {
                    eprintln!(
                        "Unsupported config version: {} (expected {})",
                        ver, CURRENT_CONFIG_VERSION
                    );
                }
                ConfigError::MissingCredentials(_) => {
                    eprintln!("{}", e);
                }
            }
            ExitCode::from(1)
        }
    }
}
