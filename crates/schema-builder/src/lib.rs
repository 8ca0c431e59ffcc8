// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Builds a [`LinkedSchema`] from a document root.
//!
//! Subdirectories name object types, `.graphql` files declare types, and executables declare
//! (and later resolve) fields. See [`scan`] for the scan pass and [`graph`] for linking.

pub mod declaration;
pub mod error;
pub mod graph;
pub mod registry;
pub mod scan;

use core_model::schema::LinkedSchema;
use tracing::{debug, instrument};

use error::BuildError;
pub use scan::ScanOptions;

/// Scan the document root and link everything found into a schema
#[instrument(skip_all, fields(root = %options.document_root.display()))]
pub async fn build_schema(options: &ScanOptions) -> Result<LinkedSchema, BuildError> {
    let registry = scan::scan_document_root(options).await?;
    debug!(declarations = registry.len(), "Scanned document root");

    graph::build_graph(registry).map_err(BuildError::Graph)
}

#[cfg(test)]
mod tests {
    use common::test_support::TestTree;
    use core_model::{primitive_type::PrimitiveType, types::NamedType};

    use super::*;

    fn sample_tree() -> TestTree {
        let tree = TestTree::new();
        tree.resolver("greet", &["greet(name: String!): String"], "echo \"Hello $2\"");
        tree.resolver("user", &["user(id: ID!): User"], "echo '{\"id\": \"1\"}'");
        tree.resolver("User/friends", &["friends: [User!]!"], "echo '[]'");
        tree.file("types.graphql", "type User { id: ID!, name: String }");
        tree
    }

    #[test_log::test(tokio::test)]
    async fn greet_scenario() {
        let tree = sample_tree();
        let schema = build_schema(&ScanOptions::new(tree.root().to_path_buf()))
            .await
            .unwrap();

        let greet = schema.query_type().field("greet").unwrap();
        assert_eq!(greet.arguments.len(), 1);
        assert_eq!(greet.arguments[0].name, "name");
        assert_eq!(schema.type_display(&greet.arguments[0].typ), "String!");
        assert_eq!(
            greet.typ.innermost(),
            &NamedType::Primitive(PrimitiveType::String)
        );
        assert_eq!(greet.resolver.as_deref(), Some(tree.root().join("greet").as_path()));
    }

    #[tokio::test]
    async fn rebuilding_an_unchanged_tree_is_idempotent() {
        let tree = sample_tree();
        let options = ScanOptions::new(tree.root().to_path_buf());

        let first = build_schema(&options).await.unwrap();
        let second = build_schema(&options).await.unwrap();

        assert_eq!(first.to_sdl(), second.to_sdl());
        assert_eq!(first.resolver_paths(), second.resolver_paths());
        assert_eq!(first.resolver_paths().len(), 3);
    }

    #[tokio::test]
    async fn discovery_round_trip() {
        let tree = TestTree::new();
        tree.resolver("x", &["x: Int!"], "echo 1");

        let schema = build_schema(&ScanOptions::new(tree.root().to_path_buf()))
            .await
            .unwrap();

        let query = schema.query_type();
        assert_eq!(query.fields.len(), 1);
        let x = &query.fields[0];
        assert_eq!(x.name, "x");
        assert!(x.arguments.is_empty());
        assert_eq!(schema.type_display(&x.typ), "Int!");
    }
}
