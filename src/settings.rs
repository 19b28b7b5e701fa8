//! Runtime configuration, read from the process environment.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `MONGODB_URI` | required |
//! | `DATABASE` | `SplitSmart` |
//! | `BIND` | `0.0.0.0` |
//! | `PORT` | `8080` |
//! | `LOG_LEVEL` | `info` |
//! | `COUNT_UNCONFIRMED_SETTLEMENTS` | `true` |
use config::{Config, ConfigError, Environment};
use serde::Deserialize;

use crate::balance::SettlementPolicy;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub mongodb_uri: String,
    pub database: String,
    pub bind: String,
    pub port: u16,
    pub log_level: String,
    pub count_unconfirmed_settlements: bool,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Self::from_environment(Environment::default())
    }

    fn from_environment(environment: Environment) -> Result<Self, ConfigError> {
        Config::builder()
            .set_default("database", "SplitSmart")?
            .set_default("bind", "0.0.0.0")?
            .set_default("port", 8080_i64)?
            .set_default("log_level", "info")?
            .set_default("count_unconfirmed_settlements", true)?
            .add_source(environment.try_parsing(true))
            .build()?
            .try_deserialize()
    }

    pub fn settlement_policy(&self) -> SettlementPolicy {
        if self.count_unconfirmed_settlements {
            SettlementPolicy::IncludeUnconfirmed
        } else {
            SettlementPolicy::ConfirmedOnly
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn environment(vars: &[(&str, &str)]) -> Environment {
        let source: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Environment::default().source(Some(source))
    }

    #[test]
    fn defaults_apply_when_only_the_uri_is_set() {
        let settings =
            Settings::from_environment(environment(&[("MONGODB_URI", "mongodb://db:27017")]))
                .unwrap();
        assert_eq!(settings.mongodb_uri, "mongodb://db:27017");
        assert_eq!(settings.database, "SplitSmart");
        assert_eq!(settings.port, 8080);
        assert_eq!(settings.settlement_policy(), SettlementPolicy::IncludeUnconfirmed);
    }

    #[test]
    fn environment_overrides_defaults() {
        let settings = Settings::from_environment(environment(&[
            ("MONGODB_URI", "mongodb://db:27017"),
            ("PORT", "9000"),
            ("COUNT_UNCONFIRMED_SETTLEMENTS", "false"),
        ]))
        .unwrap();
        assert_eq!(settings.port, 9000);
        assert_eq!(settings.settlement_policy(), SettlementPolicy::ConfirmedOnly);
    }

    #[test]
    fn missing_uri_is_an_error() {
        assert!(Settings::from_environment(environment(&[])).is_err());
    }
}
