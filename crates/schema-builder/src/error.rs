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

/// Failures while walking the document root and extracting declarations
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Walk(#[from] walkdir::Error),

    #[error("Field discovery failed for '{path}': {message}")]
    Extraction { path: PathBuf, message: String },

    #[error("Could not parse declarations from '{path}': {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Field discovery for '{path}' did not finish within {}s", .timeout.as_secs())]
    DiscoveryTimeout { path: PathBuf, timeout: Duration },
}

impl ScanError {
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            ScanError::Io { path, .. }
            | ScanError::Extraction { path, .. }
            | ScanError::Parse { path, .. }
            | ScanError::DiscoveryTimeout { path, .. } => Some(path),
            ScanError::Walk(_) => None,
        }
    }
}

/// Failures while linking declarations into a type graph
#[derive(Error, Debug, PartialEq, Eq)]
pub enum GraphError {
    #[error("'{key}' is declared in both '{}' and '{}'", .first.display(), .second.display())]
    DuplicateDefinition {
        key: String,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("{owner}.{field} refers to undeclared type '{type_name}'")]
    DanglingReference {
        owner: String,
        field: String,
        type_name: String,
    },

    #[error("{owner}.{field} uses '{type_name}', which is not {expected}")]
    InvalidTypePosition {
        owner: String,
        field: String,
        type_name: String,
        expected: &'static str,
    },

    #[error("No Query or Mutation fields found")]
    NoRoots,
}

#[derive(Error, Debug)]
pub enum BuildError {
    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error("{}", join_errors(.0))]
    Graph(Vec<GraphError>),
}

impl From<GraphError> for BuildError {
    fn from(error: GraphError) -> Self {
        BuildError::Graph(vec![error])
    }
}

fn join_errors(errors: &[GraphError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
