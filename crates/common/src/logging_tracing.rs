// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! # Tracing configuration setup.
//!
//! The server code is instrumented with Rust's `tracing` framework.
//!
//! Calling the `init` function will initialize a global tracing subscriber based on the values of
//! the `TREEQL_LOG` environment variable which follows the same conventions as `RUST_LOG`.
//!
//! `TREEQL_LOG_FORMAT` selects the console format: `compact` (the default) or `json`. The json
//! format emits one object per event, which suits log shippers in front of a long-running server.

use treeql_env::{EnvError, Environment};
use tracing_subscriber::{EnvFilter, Layer, filter::LevelFilter, prelude::*};

use crate::env_const::{TREEQL_LOG, TREEQL_LOG_FORMAT};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

impl LogFormat {
    pub fn from_env(env: &dyn Environment) -> Result<Self, EnvError> {
        match env.get(TREEQL_LOG_FORMAT).as_deref().map(str::trim) {
            None | Some("") | Some("compact") => Ok(LogFormat::Compact),
            Some("json") => Ok(LogFormat::Json),
            Some(other) => Err(EnvError::InvalidEnum {
                env_key: TREEQL_LOG_FORMAT,
                env_value: other.to_string(),
                message: "Must be one of 'compact' or 'json'".to_string(),
            }),
        }
    }
}

/// Initialize the tracing subscriber.
///
/// Creates a `tracing_subscriber::fmt` layer in the format selected by `TREEQL_LOG_FORMAT`,
/// filtered by `TREEQL_LOG` (defaulting to `info`).
pub fn init(env: &dyn Environment) -> Result<(), EnvError> {
    let format = LogFormat::from_env(env)?;

    let filter = match env.get(TREEQL_LOG) {
        Some(directives) => EnvFilter::builder()
            .with_default_directive(LevelFilter::INFO.into())
            .parse_lossy(directives),
        None => EnvFilter::builder()
            .with_default_directive(LevelFilter::INFO.into())
            .parse_lossy(""),
    };

    let fmt_layer = match format {
        LogFormat::Compact => tracing_subscriber::fmt::layer()
            .compact()
            .with_filter(filter)
            .boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_filter(filter)
            .boxed(),
    };

    tracing_subscriber::registry().with(fmt_layer).init();

    Ok(())
}

#[cfg(test)]
mod tests {
    use treeql_env::MapEnvironment;

    use super::*;

    #[test]
    fn log_format_selection() {
        let env = MapEnvironment::new();
        assert_eq!(LogFormat::from_env(&env).unwrap(), LogFormat::Compact);

        let env = MapEnvironment::from([(TREEQL_LOG_FORMAT, "json")]);
        assert_eq!(LogFormat::from_env(&env).unwrap(), LogFormat::Json);

        let env = MapEnvironment::from([(TREEQL_LOG_FORMAT, "pretty")]);
        assert!(matches!(
            LogFormat::from_env(&env),
            Err(EnvError::InvalidEnum { env_key, .. }) if env_key == TREEQL_LOG_FORMAT
        ));
    }
}
