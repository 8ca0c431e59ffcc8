// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::{path::PathBuf, time::Duration};

use thiserror::Error;

/// A resolver field whose declared type cannot be produced from process output
#[derive(Error, Debug, PartialEq)]
pub enum CompileError {
    #[error("{object}.{field}: resolvers cannot produce values of type {type_name}")]
    UnsupportedOutput {
        object: String,
        field: String,
        type_name: String,
    },

    #[error("{object}.{field}: {type_name} is not an output type")]
    InvalidOutput {
        object: String,
        field: String,
        type_name: String,
    },
}

impl CompileError {
    /// The object owning the rejected field
    pub fn object(&self) -> &str {
        match self {
            Self::UnsupportedOutput { object, .. } | Self::InvalidOutput { object, .. } => object,
        }
    }
}

#[derive(Error, Debug)]
pub enum ResolverError {
    #[error("Could not start resolver {path}: {source}")]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Displays the resolver's standard error, which is what the caller sees as the field error
    #[error("{stderr}")]
    Exited { status: i32, stderr: String },

    #[error("Resolver {path} did not finish within {timeout:?}")]
    Timeout { path: PathBuf, timeout: Duration },

    #[error("Invalid resolver output: {0}")]
    Decode(String),

    #[error("Invalid header block in resolver output: {0}")]
    MalformedHeaders(String),

    #[error("Argument '{0}' is a list; list arguments are not supported")]
    UnsupportedArgument(String),

    #[error("Could not create the request context: {0}")]
    Context(String),

    #[error("{0}")]
    Io(#[from] std::io::Error),
}
