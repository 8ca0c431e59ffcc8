// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::path::PathBuf;

use async_graphql::dynamic::Schema;
use cgi_resolver::{ResolverSettings, ResolverTable};
use common::config::GraphConfig;
use core_model::schema::LinkedSchema;
use schema_builder::{ScanOptions, build_schema};
use tracing::{debug, instrument, warn};

use crate::{error::RouterError, executable_schema::build_executable_schema};

pub struct SystemLoader;

impl SystemLoader {
    /// Scan, link and compile the graph's document root. `known_resolvers` are the executables
    /// that served as resolvers in the previous schema; they must still answer discovery.
    #[instrument(
        name = "SystemLoader::load",
        skip_all,
        fields(root = %config.document_root.display())
    )]
    pub async fn load(
        config: &GraphConfig,
        known_resolvers: Vec<PathBuf>,
    ) -> Result<(LinkedSchema, Schema), RouterError> {
        let options = ScanOptions::from_config(config).with_known_resolvers(known_resolvers);
        let mut linked = build_schema(&options).await?;
        debug!(sdl = %linked.sdl(), "Linked schema");

        let (resolvers, errors) =
            ResolverTable::compile(&linked, ResolverSettings::from_config(config));
        if !errors.is_empty() {
            for error in &errors {
                warn!(object = error.object(), "Leaving out of the schema: {error}");
            }
            let rejected: Vec<String> = errors.iter().map(|e| e.object().to_string()).collect();
            let removed = linked
                .remove_objects(rejected.iter().map(String::as_str))
                .ok_or(RouterError::Compile(errors))?;
            warn!(types = ?removed, "Removed types with unusable resolvers");
        }

        let executable = build_executable_schema(&linked, &resolvers)?;

        Ok((linked, executable))
    }
}

#[cfg(test)]
mod tests {
    use common::test_support::TestTree;

    use super::*;

    #[test_log::test(tokio::test)]
    async fn unusable_resolvers_take_out_only_their_object() {
        let tree = TestTree::new();
        tree.file("types.graphql", "type User { id: ID }");
        tree.resolver("greet", &["greet: String"], "echo hi");
        tree.resolver("user", &["user: User"], r#"echo '{"id": "1"}'"#);
        tree.resolver("User/tags", &["tags: [String]"], "echo '[]'");

        let config = GraphConfig::new(tree.root().to_path_buf());
        let (linked, executable) = SystemLoader::load(&config, vec![]).await.unwrap();

        let query_fields: Vec<&str> = linked
            .query_type()
            .fields
            .iter()
            .map(|field| field.name.as_str())
            .collect();
        assert_eq!(query_fields, vec!["greet"]);
        assert!(!linked.objects.contains_key("User"));

        let sdl = executable.sdl();
        assert!(sdl.contains("greet: String"));
        assert!(!sdl.contains("User"));
    }

    #[test_log::test(tokio::test)]
    async fn unusable_query_resolvers_fail_the_build() {
        let tree = TestTree::new();
        tree.resolver("greet", &["greet: String"], "echo hi");
        tree.resolver("tags", &["tags: [String]"], "echo '[]'");

        let config = GraphConfig::new(tree.root().to_path_buf());
        let err = SystemLoader::load(&config, vec![]).await.err().unwrap();

        assert!(matches!(&err, RouterError::Compile(errors) if errors.len() == 1));
        assert!(err.to_string().contains("Query.tags"));
    }
}
