// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::{path::Path, process::Stdio};

use async_graphql_parser::types::{TypeKind, TypeSystemDefinition};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::{
    declaration::{FieldDecl, TypeDecl},
    error::ScanError,
};

use super::ScanOptions;

/// The flag a resolver executable answers with its field signatures
pub const DISCOVERY_FLAG: &str = "--graphqld-fields";

/// Run `path --graphqld-fields` and parse the JSON array of field signatures it prints.
///
/// Only stdout is parsed. Anything written to stderr is logged at debug level and never mixed
/// into the signatures, so a resolver may print diagnostics during discovery.
pub async fn discover_fields(
    path: &Path,
    options: &ScanOptions,
) -> Result<Vec<FieldDecl>, ScanError> {
    let mut command = Command::new(path);
    command
        .arg(DISCOVERY_FLAG)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    if let Some(dir) = path.parent() {
        command.current_dir(dir);
    }
    if let Some(run_as) = &options.run_as {
        command.uid(run_as.uid).gid(run_as.gid);
    }

    let output = tokio::time::timeout(options.discovery_timeout, command.output())
        .await
        .map_err(|_| ScanError::DiscoveryTimeout {
            path: path.to_path_buf(),
            timeout: options.discovery_timeout,
        })?
        .map_err(|e| ScanError::Extraction {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    if !output.status.success() {
        return Err(ScanError::Extraction {
            path: path.to_path_buf(),
            message: format!(
                "{}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        });
    }

    if !output.stderr.is_empty() {
        debug!(
            path = %path.display(),
            stderr = %String::from_utf8_lossy(&output.stderr).trim(),
            "Discovery wrote to stderr"
        );
    }

    let signatures: Vec<String> =
        serde_json::from_slice(&output.stdout).map_err(|e| ScanError::Parse {
            path: path.to_path_buf(),
            message: format!("expected a JSON array of field signatures: {e}"),
        })?;

    parse_signatures(path, &signatures)
}

/// Parse field signatures such as `greet(name: String!): String` by wrapping them in a
/// synthetic object declaration.
pub fn parse_signatures(path: &Path, signatures: &[String]) -> Result<Vec<FieldDecl>, ScanError> {
    let parse_error = |message: String| ScanError::Parse {
        path: path.to_path_buf(),
        message,
    };

    if signatures.is_empty() {
        return Err(parse_error("no field signatures declared".to_string()));
    }

    let source = format!("type Query {{\n\t{}\n}}", signatures.join("\n\t"));
    let document =
        async_graphql_parser::parse_schema(&source).map_err(|e| parse_error(e.to_string()))?;

    match document.definitions.as_slice() {
        [TypeSystemDefinition::Type(definition)] => match &definition.node.kind {
            TypeKind::Object(object) => Ok(object
                .fields
                .iter()
                .map(|field| FieldDecl::from(&field.node))
                .collect()),
            _ => Err(parse_error("no object definition found".to_string())),
        },
        definitions => Err(parse_error(format!(
            "expected 1 definition, found {}",
            definitions.len()
        ))),
    }
}

/// Collect the enum, input, object and interface declarations of a declaration file.
pub fn parse_declarations(path: &Path) -> Result<Vec<TypeDecl>, ScanError> {
    let source = std::fs::read_to_string(path).map_err(|source| ScanError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    parse_declaration_source(path, &source)
}

/// Declarations of an in-memory document; `path` is only used for error reporting
pub fn parse_declaration_source(path: &Path, source: &str) -> Result<Vec<TypeDecl>, ScanError> {
    if is_blank_document(source) {
        return Ok(vec![]);
    }

    let document = async_graphql_parser::parse_schema(source).map_err(|e| ScanError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let mut declarations = vec![];
    for definition in &document.definitions {
        match definition {
            TypeSystemDefinition::Type(definition) => {
                match TypeDecl::from_definition(&definition.node) {
                    Some(declaration) => declarations.push(declaration),
                    None => warn!(
                        path = %path.display(),
                        name = %definition.node.name.node,
                        "Skipping unsupported type definition"
                    ),
                }
            }
            TypeSystemDefinition::Schema(_) | TypeSystemDefinition::Directive(_) => {
                warn!(path = %path.display(), "Skipping schema or directive definition");
            }
        }
    }

    Ok(declarations)
}

// The parser rejects a document without definitions
fn is_blank_document(source: &str) -> bool {
    source
        .lines()
        .map(str::trim)
        .all(|line| line.is_empty() || line.starts_with('#'))
}
