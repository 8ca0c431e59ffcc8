// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use cgi_resolver::CompileError;
use schema_builder::error::BuildError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RouterError {
    #[error(transparent)]
    Build(#[from] BuildError),

    /// Unusable resolver fields that would take the query type out of the schema
    #[error("{}", .0.iter().map(ToString::to_string).collect::<Vec<_>>().join("; "))]
    Compile(Vec<CompileError>),

    /// Rejected by the query engine while assembling the executable schema
    #[error("Invalid schema: {0}")]
    Schema(String),

    #[error("No schema has been published yet")]
    NoSchema,
}

#[derive(Error, Debug)]
pub enum GraphHostError {
    #[error("Failed to build the schema for {graph}: {source}")]
    InitialBuild {
        graph: String,
        #[source]
        source: RouterError,
    },

    #[error("Failed to watch {graph}: {source}")]
    Watch {
        graph: String,
        #[source]
        source: notify_debouncer_full::notify::Error,
    },
}
