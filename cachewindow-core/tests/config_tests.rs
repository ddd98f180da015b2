//! Strategy configuration tests

use cachewindow_core::model_context::{
    AppendStrategyConfig, MessageCountStrategyConfig, RollingStrategyConfig, StrategyConfig,
};
use cachewindow_core::{CacheWindowError, ConfigError};

#[test]
fn test_defaults() {
    assert_eq!(
        StrategyConfig::from_json(r#"{"strategy":"append"}"#).unwrap(),
        StrategyConfig::Append(AppendStrategyConfig {
            tokens_before_caching: 10_000
        })
    );
    assert_eq!(
        StrategyConfig::from_json(r#"{"strategy":"rolling"}"#).unwrap(),
        StrategyConfig::Rolling(RollingStrategyConfig {
            max_tokens: 100_000,
            max_grace_tokens: 20_000
        })
    );
    assert_eq!(
        StrategyConfig::from_json(r#"{"strategy":"message_count"}"#).unwrap(),
        StrategyConfig::MessageCount(MessageCountStrategyConfig { buffer_size: 50 })
    );
}

#[test]
fn test_zero_values_rejected() {
    for (json, key) in [
        (r#"{"strategy":"append","tokens_before_caching":0}"#, "tokens_before_caching"),
        (r#"{"strategy":"rolling","max_tokens":0}"#, "max_tokens"),
        (r#"{"strategy":"message_count","buffer_size":0}"#, "buffer_size"),
    ] {
        match StrategyConfig::from_json(json) {
            Err(CacheWindowError::Config(ConfigError::ZeroValue { key: found })) => assert_eq!(found, key),
            other => panic!("expected zero-value error for {}, got {:?}", json, other),
        }
    }
}

#[test]
fn test_zero_grace_is_allowed() {
    let config = StrategyConfig::from_json(r#"{"strategy":"rolling","max_tokens":500,"max_grace_tokens":0}"#).unwrap();
    assert_eq!(config.build().unwrap().name(), "rolling");
}

#[test]
fn test_malformed_json_is_a_json_error() {
    let err = StrategyConfig::from_json("{strategy").unwrap_err();
    assert!(matches!(err, CacheWindowError::Json(_)));
    assert!(!err.is_recoverable());
}

#[test]
fn test_build_checks_values() {
    let config = StrategyConfig::MessageCount(MessageCountStrategyConfig { buffer_size: 0 });
    assert!(config.build().is_err());
}

#[cfg(feature = "config-support")]
mod file_config {
    use super::*;
    use std::fs;

    #[test]
    fn test_from_toml_str() {
        let config = StrategyConfig::from_toml_str(
            r#"
            strategy = "rolling"
            max_tokens = 50000
            max_grace_tokens = 5000
            "#,
        )
        .unwrap();
        assert_eq!(
            config,
            StrategyConfig::Rolling(RollingStrategyConfig {
                max_tokens: 50_000,
                max_grace_tokens: 5_000
            })
        );
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("cachewindow-{}.toml", uuid::Uuid::new_v4()));
        fs::write(&path, "strategy = \"append\"\ntokens_before_caching = 4096\n").unwrap();

        let config = StrategyConfig::load(&path);
        fs::remove_file(&path).unwrap();

        assert_eq!(
            config.unwrap(),
            StrategyConfig::Append(AppendStrategyConfig {
                tokens_before_caching: 4096
            })
        );
    }

    #[test]
    fn test_load_missing_file() {
        let path = std::env::temp_dir().join(format!("cachewindow-missing-{}.toml", uuid::Uuid::new_v4()));
        let err = StrategyConfig::load(&path).unwrap_err();
        assert!(matches!(err, CacheWindowError::Settings(_)));
    }
}
