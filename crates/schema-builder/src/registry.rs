// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::{
    fmt::{Display, Formatter},
    path::{Path, PathBuf},
};

use indexmap::IndexMap;

use crate::{
    declaration::{FieldDecl, TypeDecl},
    error::GraphError,
};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DefinitionKey {
    Enum(String),
    Input(String),
    Object(String),
    Interface(String),
    /// A resolver-backed field
    Field { object: String, field: String },
}

impl DefinitionKey {
    fn for_type(decl: &TypeDecl) -> Self {
        let name = decl.name().to_string();
        match decl {
            TypeDecl::Enum(_) => DefinitionKey::Enum(name),
            TypeDecl::Input(_) => DefinitionKey::Input(name),
            TypeDecl::Object(_) => DefinitionKey::Object(name),
            TypeDecl::Interface(_) => DefinitionKey::Interface(name),
        }
    }

    /// Keys of every kind of type named `name`
    fn type_keys(name: &str) -> [DefinitionKey; 4] {
        [
            DefinitionKey::Enum(name.to_string()),
            DefinitionKey::Input(name.to_string()),
            DefinitionKey::Object(name.to_string()),
            DefinitionKey::Interface(name.to_string()),
        ]
    }
}

impl Display for DefinitionKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            DefinitionKey::Enum(name) => write!(f, "enum::{name}"),
            DefinitionKey::Input(name) => write!(f, "input::{name}"),
            DefinitionKey::Object(name) => write!(f, "object::{name}"),
            DefinitionKey::Interface(name) => write!(f, "interface::{name}"),
            DefinitionKey::Field { object, field } => write!(f, "field::{object}:{field}"),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Declaration {
    Type {
        decl: TypeDecl,
        source: PathBuf,
    },
    Field {
        object: String,
        decl: FieldDecl,
        source: PathBuf,
    },
}

impl Declaration {
    pub fn source(&self) -> &Path {
        match self {
            Declaration::Type { source, .. } | Declaration::Field { source, .. } => source,
        }
    }
}

/// Everything found by one scan of the document root, in discovery order.
#[derive(Debug, Default)]
pub struct DefinitionRegistry {
    declarations: IndexMap<DefinitionKey, Declaration>,
    resolvers: IndexMap<(String, String), PathBuf>,
}

impl DefinitionRegistry {
    pub fn add_type(&mut self, decl: TypeDecl, source: &Path) -> Result<(), GraphError> {
        for key in DefinitionKey::type_keys(decl.name()) {
            if let Some(existing) = self.declarations.get(&key) {
                return Err(GraphError::DuplicateDefinition {
                    key: DefinitionKey::for_type(&decl).to_string(),
                    first: existing.source().to_path_buf(),
                    second: source.to_path_buf(),
                });
            }
        }

        self.declarations.insert(
            DefinitionKey::for_type(&decl),
            Declaration::Type {
                decl,
                source: source.to_path_buf(),
            },
        );
        Ok(())
    }

    /// Register a field served by the executable at `source`
    pub fn add_resolver_field(
        &mut self,
        object: &str,
        decl: FieldDecl,
        source: &Path,
    ) -> Result<(), GraphError> {
        let key = DefinitionKey::Field {
            object: object.to_string(),
            field: decl.name.clone(),
        };

        if let Some(existing) = self.declarations.get(&key) {
            return Err(GraphError::DuplicateDefinition {
                key: key.to_string(),
                first: existing.source().to_path_buf(),
                second: source.to_path_buf(),
            });
        }

        self.resolvers.insert(
            (object.to_string(), decl.name.clone()),
            source.to_path_buf(),
        );
        self.declarations.insert(
            key,
            Declaration::Field {
                object: object.to_string(),
                decl,
                source: source.to_path_buf(),
            },
        );
        Ok(())
    }

    pub fn resolver(&self, object: &str, field: &str) -> Option<&Path> {
        self.resolvers
            .get(&(object.to_string(), field.to_string()))
            .map(PathBuf::as_path)
    }

    pub fn get(&self, key: &DefinitionKey) -> Option<&Declaration> {
        self.declarations.get(key)
    }

    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &DefinitionKey> {
        self.declarations.keys()
    }

    pub(crate) fn into_parts(
        self,
    ) -> (
        IndexMap<DefinitionKey, Declaration>,
        IndexMap<(String, String), PathBuf>,
    ) {
        (self.declarations, self.resolvers)
    }
}

#[cfg(test)]
mod tests {
    use crate::scan::extractor::parse_signatures;

    use super::*;

    fn field(signature: &str) -> FieldDecl {
        parse_signatures(Path::new("test"), &[signature.to_string()])
            .unwrap()
            .remove(0)
    }

    #[test]
    fn keys_and_bindings() {
        let mut registry = DefinitionRegistry::default();
        registry
            .add_resolver_field("Query", field("greet(name: String!): String"), Path::new("/srv/greet"))
            .unwrap();

        let key = DefinitionKey::Field {
            object: "Query".to_string(),
            field: "greet".to_string(),
        };
        assert_eq!(key.to_string(), "field::Query:greet");
        assert!(registry.get(&key).is_some());
        assert_eq!(
            registry.resolver("Query", "greet"),
            Some(Path::new("/srv/greet"))
        );
        assert_eq!(registry.resolver("Query", "missing"), None);
    }

    #[test]
    fn duplicates_are_rejected() {
        let mut registry = DefinitionRegistry::default();
        registry
            .add_resolver_field("Query", field("greet: String"), Path::new("/srv/a"))
            .unwrap();

        assert_eq!(
            registry.add_resolver_field("Query", field("greet: Int"), Path::new("/srv/b")),
            Err(GraphError::DuplicateDefinition {
                key: "field::Query:greet".to_string(),
                first: PathBuf::from("/srv/a"),
                second: PathBuf::from("/srv/b"),
            })
        );

        // Same field name on a different object is fine
        registry
            .add_resolver_field("User", field("greet: String"), Path::new("/srv/c"))
            .unwrap();
        assert_eq!(registry.len(), 2);
    }
}
