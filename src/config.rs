use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;
use validator::Validate;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    #[error("Parse error for {field}: {value} - {source}")]
    Parse {
        field: String,
        value: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Front-end configuration with validation.
///
/// Everything here is an operational guard or a default, never a semantic
/// switch: queries mean the same thing under any valid configuration.
#[derive(Clone, Debug, Validate, Serialize, Deserialize)]
pub struct FrontendConfig {
    /// Graph used when the caller passes an empty graph name
    #[validate(length(min = 1, message = "Default graph name cannot be empty"))]
    pub default_graph: String,

    /// Depth guard applied by the traversal engine when a variable-length
    /// upper bound is unbounded (`*` or `*n..`)
    #[validate(range(
        min = 1,
        max = 1000,
        message = "Max traversal depth must be between 1 and 1000"
    ))]
    pub max_traversal_depth: u32,

    /// Whether compile() rejects `$param` references that are missing from
    /// the supplied parameter map (otherwise the host binds them later)
    pub validate_parameters: bool,
}

impl Default for FrontendConfig {
    fn default() -> Self {
        Self {
            default_graph: "default".to_string(),
            max_traversal_depth: 100,
            validate_parameters: true,
        }
    }
}

impl FrontendConfig {
    /// Create configuration from environment variables with validation.
    ///
    /// A `.env` file in the working directory is honored when present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = Self {
            default_graph: env::var("GRAPHREL_DEFAULT_GRAPH")
                .unwrap_or_else(|_| "default".to_string()),
            max_traversal_depth: parse_env_var("GRAPHREL_MAX_TRAVERSAL_DEPTH", "100")?,
            validate_parameters: parse_env_var("GRAPHREL_VALIDATE_PARAMETERS", "true")?,
        };

        config.validate()?;
        Ok(config)
    }
}

/// Parse an environment variable with a default value
fn parse_env_var<T: std::str::FromStr>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let value = env::var(key).unwrap_or_else(|_| default.to_string());
    value.parse().map_err(|e| ConfigError::Parse {
        field: key.to_string(),
        value,
        source: Box::new(e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = FrontendConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_traversal_depth, 100);
        assert!(config.validate_parameters);
    }

    #[test]
    fn test_invalid_depth_range() {
        let config = FrontendConfig {
            max_traversal_depth: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_default_graph() {
        let config = FrontendConfig {
            default_graph: "".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
