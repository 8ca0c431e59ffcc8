// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Rendering of field arguments as `--<name> <value>` command-line pairs.

use async_graphql_value::{ConstValue, Name};
use core_model::{
    primitive_type::PrimitiveType,
    types::{Argument, NamedType},
};
use indexmap::IndexMap;

use crate::error::ResolverError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rendering {
    /// Strings, IDs and timestamps are passed as-is
    Verbatim,
    /// Numbers and booleans in their usual textual form
    Canonical,
    EnumName,
    /// Input objects as compact JSON
    Json,
    List,
}

#[derive(Debug, Clone)]
struct ArgumentSpec {
    name: String,
    rendering: Rendering,
}

/// The argument layout of one resolver field, fixed when the schema is built
#[derive(Debug, Clone, Default)]
pub struct ArgumentEncoder {
    arguments: Vec<ArgumentSpec>,
}

impl ArgumentEncoder {
    pub fn compile(arguments: &[Argument]) -> Self {
        let arguments = arguments
            .iter()
            .map(|argument| {
                let rendering = if argument.typ.is_list() {
                    Rendering::List
                } else {
                    match argument.typ.innermost() {
                        NamedType::Primitive(
                            PrimitiveType::String | PrimitiveType::Id | PrimitiveType::DateTime,
                        ) => Rendering::Verbatim,
                        NamedType::Primitive(
                            PrimitiveType::Int | PrimitiveType::Float | PrimitiveType::Boolean,
                        ) => Rendering::Canonical,
                        NamedType::Enum(_) => Rendering::EnumName,
                        _ => Rendering::Json,
                    }
                };

                ArgumentSpec {
                    name: argument.name.clone(),
                    rendering,
                }
            })
            .collect();

        Self { arguments }
    }

    /// Command-line tokens for the supplied argument values, in declaration order. Arguments
    /// that are absent or null are left out.
    pub fn encode(
        &self,
        values: &IndexMap<Name, ConstValue>,
    ) -> Result<Vec<String>, ResolverError> {
        let mut tokens = vec![];

        for spec in &self.arguments {
            let value = match values.get(spec.name.as_str()) {
                None | Some(ConstValue::Null) => continue,
                Some(value) => value,
            };

            tokens.push(format!("--{}", spec.name));
            tokens.push(render(spec, value)?);
        }

        Ok(tokens)
    }
}

fn render(spec: &ArgumentSpec, value: &ConstValue) -> Result<String, ResolverError> {
    let rendered = match (spec.rendering, value) {
        (Rendering::List, _) => {
            return Err(ResolverError::UnsupportedArgument(spec.name.clone()));
        }
        (Rendering::Json, value) => {
            serde_json::to_string(value).map_err(std::io::Error::from)?
        }
        (_, ConstValue::String(s)) => s.clone(),
        (_, ConstValue::Number(n)) => n.to_string(),
        (_, ConstValue::Boolean(b)) => b.to_string(),
        (_, ConstValue::Enum(name)) => name.to_string(),
        (_, other) => other.to_string(),
    };

    Ok(rendered)
}
