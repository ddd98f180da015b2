//! Serializable strategy selection.

use serde::{Deserialize, Serialize};

use super::append_strategy::{AppendStrategy, AppendStrategyConfig};
use super::context_strategy::ContextStrategy;
use super::message_count_strategy::{MessageCountStrategy, MessageCountStrategyConfig};
use super::rolling_strategy::{RollingStrategy, RollingStrategyConfig};
use super::token_estimator::{CharacterEstimator, TokenEstimator};
use crate::error::{ConfigError, Result};

/// Which strategy to run, with its parameters.
///
/// Serialized with a `strategy` tag next to the strategy's own fields:
///
/// ```toml
/// strategy = "rolling"
/// max_tokens = 100000
/// max_grace_tokens = 20000
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum StrategyConfig {
    Append(AppendStrategyConfig),
    Rolling(RollingStrategyConfig),
    MessageCount(MessageCountStrategyConfig),
}

impl Default for StrategyConfig {
    fn default() -> Self {
        StrategyConfig::Rolling(RollingStrategyConfig::default())
    }
}

impl StrategyConfig {
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        match self {
            StrategyConfig::Append(config) => config.validate(),
            StrategyConfig::Rolling(config) => config.validate(),
            StrategyConfig::MessageCount(config) => config.validate(),
        }
    }

    /// Build the configured strategy with the default estimator
    pub fn build(&self) -> std::result::Result<Box<dyn ContextStrategy>, ConfigError> {
        self.build_with_estimator(CharacterEstimator::new())
    }

    /// Build the configured strategy around a custom estimator
    pub fn build_with_estimator<E>(
        &self,
        estimator: E,
    ) -> std::result::Result<Box<dyn ContextStrategy>, ConfigError>
    where
        E: TokenEstimator + 'static,
    {
        Ok(match self {
            StrategyConfig::Append(config) => {
                Box::new(AppendStrategy::with_estimator(config.clone(), estimator)?)
            }
            StrategyConfig::Rolling(config) => {
                Box::new(RollingStrategy::with_estimator(config.clone(), estimator)?)
            }
            StrategyConfig::MessageCount(config) => {
                Box::new(MessageCountStrategy::with_estimator(config.clone(), estimator)?)
            }
        })
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    #[cfg(feature = "config-support")]
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a settings file, overridden by `CACHEWINDOW_*` environment
    /// variables (e.g. `CACHEWINDOW_MAX_TOKENS=50000`).
    #[cfg(feature = "config-support")]
    pub fn load<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(config::Environment::with_prefix("CACHEWINDOW").try_parsing(true))
            .build()?;
        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_rolling() {
        let strategy = StrategyConfig::default().build().unwrap();
        assert_eq!(strategy.name(), "rolling");
    }

    #[test]
    fn test_from_json_tagged() {
        let config = StrategyConfig::from_json(r#"{"strategy":"append","tokens_before_caching":5000}"#).unwrap();
        assert_eq!(
            config,
            StrategyConfig::Append(AppendStrategyConfig {
                tokens_before_caching: 5000
            })
        );
        assert_eq!(config.build().unwrap().name(), "append");
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let config = StrategyConfig::from_json(r#"{"strategy":"message_count"}"#).unwrap();
        assert_eq!(config, StrategyConfig::MessageCount(MessageCountStrategyConfig::default()));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = StrategyConfig::from_json(r#"{"strategy":"rolling","max_tokens":0}"#).unwrap_err();
        assert!(matches!(
            err,
            crate::error::CacheWindowError::Config(ConfigError::ZeroValue { key: "max_tokens" })
        ));
        assert!(StrategyConfig::from_json(r#"{"strategy":"importance"}"#).is_err());
    }

    #[test]
    fn test_json_round_trip() {
        let config = StrategyConfig::Rolling(RollingStrategyConfig {
            max_tokens: 1000,
            max_grace_tokens: 200,
        });
        let json = config.to_json().unwrap();
        assert!(json.contains(r#""strategy":"rolling""#));
        assert_eq!(StrategyConfig::from_json(&json).unwrap(), config);
    }
}
