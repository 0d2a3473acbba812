use std::env;
use std::time::Duration;

use dotenvy::dotenv;
use thiserror::Error;

use crate::import::normalize::is_standard_bank;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub storage_timeout: Duration,
    pub default_bank: String,
    pub log_filter: String,
}

const DEFAULT_TIMEOUT_MS: u64 = 5000;

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();

        let timeout_ms: u64 = get_env_parse("QUIZBANKD_STORAGE_TIMEOUT_MS", DEFAULT_TIMEOUT_MS)?;
        if timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                name: "QUIZBANKD_STORAGE_TIMEOUT_MS",
                reason: "must be greater than zero".into(),
            });
        }

        let default_bank = get_env_or("QUIZBANKD_DEFAULT_BANK", "mcq");
        if !is_standard_bank(&default_bank) {
            return Err(ConfigError::Invalid {
                name: "QUIZBANKD_DEFAULT_BANK",
                reason: format!("unknown bank {}", default_bank),
            });
        }

        Ok(Self {
            storage_timeout: Duration::from_millis(timeout_ms),
            default_bank,
            log_filter: get_env_or("QUIZBANKD_LOG", "quizbankd=info"),
        })
    }
}

fn get_env_or(name: &str, default: &str) -> String {
    match env::var(name) {
        Ok(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => default.to_string(),
    }
}

fn get_env_parse<T>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw.trim().parse().map_err(|e: T::Err| {
            ConfigError::Invalid {
                name,
                reason: e.to_string(),
            }
        }),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_falls_back_to_default_when_unset() {
        let v: u64 = get_env_parse("QUIZBANKD_TEST_UNSET_VARIABLE", 42).expect("default");
        assert_eq!(v, 42);
    }

    #[test]
    fn parse_reports_the_variable_name() {
        env::set_var("QUIZBANKD_TEST_BAD_NUMBER", "soon");
        let e = get_env_parse::<u64>("QUIZBANKD_TEST_BAD_NUMBER", 1).unwrap_err();
        assert!(e.to_string().contains("QUIZBANKD_TEST_BAD_NUMBER"));
    }
}
