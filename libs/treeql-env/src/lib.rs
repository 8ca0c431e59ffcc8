// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Read-only view of the process environment.
//!
//! Configuration code never calls `std::env::var` directly. It goes through [`Environment`] so
//! that tests can supply a [`MapEnvironment`] instead of mutating the real process environment.

mod map;

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub use map::MapEnvironment;

pub trait Environment: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn enabled(&self, key: &str, default_value: bool) -> Result<bool, EnvError> {
        match self.get(key) {
            Some(value) => match value.to_lowercase().as_str() {
                "true" | "1" | "yes" | "on" | "enabled" | "enable" => Ok(true),
                "false" | "0" | "no" | "off" | "disabled" | "disable" => Ok(false),
                _ => Err(EnvError::InvalidBoolean {
                    key: key.to_string(),
                    value,
                }),
            },
            None => Ok(default_value),
        }
    }

    fn get_or_else(&self, key: &str, default_value: &str) -> String {
        self.get(key).unwrap_or(default_value.to_string())
    }

    fn get_path(&self, key: &str) -> Option<PathBuf> {
        self.get(key)
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from)
    }
}

impl dyn Environment + '_ {
    /// Parse the value of `key` with `FromStr`. An unset or blank variable is `None`.
    pub fn get_parsed<T>(&self, key: &str) -> Result<Option<T>, EnvError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(key) {
            Some(value) if !value.trim().is_empty() => value
                .trim()
                .parse::<T>()
                .map(Some)
                .map_err(|e| EnvError::InvalidValue {
                    key: key.to_string(),
                    message: e.to_string(),
                    value,
                }),
            _ => Ok(None),
        }
    }

    /// A whole number of seconds, e.g. `TREEQL_RESOLVER_TIMEOUT_SECS=30`
    pub fn get_duration_secs(&self, key: &str) -> Result<Option<Duration>, EnvError> {
        Ok(self.get_parsed::<u64>(key)?.map(Duration::from_secs))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EnvError {
    #[error(
        "Invalid value for {key}: {value}. Expected true, 1, yes, on, enabled, enable OR false, 0, no, off, disabled, disable"
    )]
    InvalidBoolean { key: String, value: String },

    #[error("Invalid value for {key}: {value} ({message})")]
    InvalidValue {
        key: String,
        value: String,
        message: String,
    },

    #[error("Invalid env value {env_value} for {env_key}: {message}")]
    InvalidEnum {
        env_key: &'static str,
        env_value: String,
        message: String,
    },
}

pub struct SystemEnvironment;

impl Environment for SystemEnvironment {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boolean_vocabulary() {
        let env = MapEnvironment::from([("A", "yes"), ("B", "Off"), ("C", "maybe")]);

        assert!(env.enabled("A", false).unwrap());
        assert!(!env.enabled("B", true).unwrap());
        assert!(env.enabled("MISSING", true).unwrap());
        assert!(matches!(
            env.enabled("C", false),
            Err(EnvError::InvalidBoolean { .. })
        ));
    }

    #[test]
    fn parsed_values() {
        let env = MapEnvironment::from([("PORT", " 9000 "), ("BAD", "ninety"), ("BLANK", "")]);
        let env: &dyn Environment = &env;

        assert_eq!(env.get_parsed::<u16>("PORT").unwrap(), Some(9000));
        assert_eq!(env.get_parsed::<u16>("BLANK").unwrap(), None);
        assert_eq!(env.get_parsed::<u16>("MISSING").unwrap(), None);
        assert!(matches!(
            env.get_parsed::<u16>("BAD"),
            Err(EnvError::InvalidValue { .. })
        ));
        assert_eq!(
            env.get_duration_secs("PORT").unwrap(),
            Some(Duration::from_secs(9000))
        );
    }
}
