// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Executables as field resolvers.
//!
//! A resolver is invoked as `<executable> [--<arg> <value>]...` with CGI-style request variables
//! in its environment, the parent object as JSON on stdin and, optionally, the request context on
//! descriptor 3. Its stdout may start with a header block (terminated by a blank line) that is
//! merged into the HTTP response; the rest is decoded according to the field's type. A non-zero
//! exit turns stderr into the field's error.

mod arguments;
mod context;
mod environment;
mod error;
mod invocation;
mod output;
mod process;

use std::{collections::HashMap, sync::Arc};

use core_model::schema::LinkedSchema;

pub use arguments::ArgumentEncoder;
pub use context::{ContextFile, ContextGenerator};
pub use environment::CgiEnvironment;
pub use error::{CompileError, ResolverError};
pub use invocation::{FieldResolver, Invocation, ResolverSettings, ResponseHeaders};
pub use output::{OutputDecoder, split_output};
pub use process::CONTEXT_FD;

/// The compiled resolvers of a schema, keyed by `(object, field)`
#[derive(Debug, Default)]
pub struct ResolverTable {
    resolvers: HashMap<(String, String), Arc<FieldResolver>>,
}

impl ResolverTable {
    /// Compile every resolver-backed field. Fields that cannot be compiled are left out of the
    /// table and reported together.
    pub fn compile(
        schema: &LinkedSchema,
        settings: ResolverSettings,
    ) -> (Self, Vec<CompileError>) {
        let settings = Arc::new(settings);
        let mut resolvers = HashMap::new();
        let mut errors = vec![];

        for (_, object) in schema.objects.iter() {
            for field in &object.fields {
                match FieldResolver::compile(schema, object, field, settings.clone()) {
                    Ok(Some(resolver)) => {
                        resolvers.insert(
                            (object.name.clone(), field.name.clone()),
                            Arc::new(resolver),
                        );
                    }
                    Ok(None) => {}
                    Err(error) => errors.push(error),
                }
            }
        }

        (Self { resolvers }, errors)
    }

    pub fn get(&self, object: &str, field: &str) -> Option<Arc<FieldResolver>> {
        self.resolvers
            .get(&(object.to_string(), field.to_string()))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }
}
