use crate::config::types::{ApiConfig, Config, HarvesterConfig, OutputConfig, SeedEntry};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_api_config(&config.api)?;
    validate_harvester_config(&config.harvester)?;
    validate_output_config(&config.output)?;
    validate_seeds(&config.seeds)?;
    Ok(())
}

/// Validates the endpoint configuration
fn validate_api_config(config: &ApiConfig) -> Result<(), ConfigError> {
    Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base_url '{}': {}", config.base_url, e)))?;

    if config.result_limit < 1 {
        return Err(ConfigError::Validation(format!(
            "result_limit must be >= 1, got {}",
            config.result_limit
        )));
    }

    if config.request_limit < 1 {
        return Err(ConfigError::Validation(format!(
            "request_limit must be >= 1, got {}",
            config.request_limit
        )));
    }

    // Packing more identifiers into one call than the server will return
    // per page only forces extra continuation round-trips.
    if config.request_limit > config.result_limit {
        return Err(ConfigError::Validation(format!(
            "request_limit ({}) must not exceed result_limit ({})",
            config.request_limit, config.result_limit
        )));
    }

    Ok(())
}

/// Validates harvester configuration
fn validate_harvester_config(config: &HarvesterConfig) -> Result<(), ConfigError> {
    if config.max_connections < 1 || config.max_connections > 100 {
        return Err(ConfigError::Validation(format!(
            "max_connections must be between 1 and 100, got {}",
            config.max_connections
        )));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.target_dir.is_empty() {
        return Err(ConfigError::Validation(
            "target_dir cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates seed entries
fn validate_seeds(seeds: &[SeedEntry]) -> Result<(), ConfigError> {
    if seeds.is_empty() {
        return Err(ConfigError::Validation(
            "at least one [[seed]] entry is required".to_string(),
        ));
    }

    for seed in seeds {
        if seed.title.trim().is_empty() {
            return Err(ConfigError::Validation(
                "seed title cannot be empty".to_string(),
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        Config {
            api: ApiConfig {
                base_url: "https://en.wikipedia.org/w/api.php".to_string(),
                result_limit: 500,
                request_limit: 20,
            },
            harvester: HarvesterConfig { max_connections: 5 },
            output: OutputConfig {
                target_dir: "./harvest".to_string(),
            },
            seeds: vec![SeedEntry {
                title: "Main Page".to_string(),
                revision: None,
            }],
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(validate(&valid_config()).is_ok());
    }

    #[test]
    fn test_invalid_base_url_fails() {
        let mut config = valid_config();
        config.api.base_url = "not a url".to_string();
        assert!(matches!(
            validate(&config),
            Err(ConfigError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_request_limit_above_result_limit_fails() {
        let mut config = valid_config();
        config.api.request_limit = 501;
        assert!(matches!(
            validate(&config),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_zero_connections_fails() {
        let mut config = valid_config();
        config.harvester.max_connections = 0;
        assert!(matches!(
            validate(&config),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_empty_seed_list_fails() {
        let mut config = valid_config();
        config.seeds.clear();
        assert!(matches!(
            validate(&config),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_blank_seed_title_fails() {
        let mut config = valid_config();
        config.seeds.push(SeedEntry {
            title: "   ".to_string(),
            revision: None,
        });
        assert!(matches!(
            validate(&config),
            Err(ConfigError::Validation(_))
        ));
    }
}
