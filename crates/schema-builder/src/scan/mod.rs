// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! The scan pass: walk the document root, classify every entry, and extract declarations into a
//! [`DefinitionRegistry`].

pub mod classifier;
pub mod extractor;

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
    time::Duration,
};

use common::config::{DEFAULT_DISCOVERY_TIMEOUT, GraphConfig, RunAs};
use futures::{StreamExt, stream};
use tracing::{debug, instrument, warn};
use walkdir::{DirEntry, WalkDir};

use crate::{
    declaration::{FieldDecl, TypeDecl},
    error::{BuildError, ScanError},
    registry::DefinitionRegistry,
};

use classifier::{SchemaFile, classify};
use extractor::{discover_fields, parse_declarations};

/// Discovery calls in flight at once during a scan
const DISCOVERY_CONCURRENCY: usize = 8;

#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub document_root: PathBuf,
    pub discovery_timeout: Duration,
    pub run_as: Option<RunAs>,
    /// Executables that must answer discovery. A failure on one of these fails the scan instead
    /// of skipping the file.
    pub known_resolvers: HashSet<PathBuf>,
}

impl ScanOptions {
    pub fn new(document_root: PathBuf) -> Self {
        Self {
            document_root,
            discovery_timeout: DEFAULT_DISCOVERY_TIMEOUT,
            run_as: None,
            known_resolvers: HashSet::new(),
        }
    }

    pub fn from_config(config: &GraphConfig) -> Self {
        Self {
            document_root: config.document_root.clone(),
            discovery_timeout: config.discovery_timeout,
            run_as: config.run_as,
            known_resolvers: HashSet::new(),
        }
    }

    pub fn with_known_resolvers(mut self, paths: impl IntoIterator<Item = PathBuf>) -> Self {
        self.known_resolvers = paths.into_iter().collect();
        self
    }

    fn is_known_resolver(&self, path: &Path) -> bool {
        self.known_resolvers.contains(path)
    }
}

enum Extracted {
    Resolver {
        path: PathBuf,
        object: String,
        fields: Vec<FieldDecl>,
    },
    Declarations {
        path: PathBuf,
        declarations: Vec<TypeDecl>,
    },
    NotAResolver,
}

#[instrument(skip_all, fields(root = %options.document_root.display()))]
pub async fn scan_document_root(options: &ScanOptions) -> Result<DefinitionRegistry, BuildError> {
    let files = collect_schema_files(&options.document_root)?;

    let extracted: Vec<Result<Extracted, ScanError>> = stream::iter(files)
        .map(|file| extract(file, options))
        .buffered(DISCOVERY_CONCURRENCY)
        .collect()
        .await;

    let mut registry = DefinitionRegistry::default();
    for result in extracted {
        match result? {
            Extracted::Resolver {
                path,
                object,
                fields,
            } => {
                for field in fields {
                    registry.add_resolver_field(&object, field, &path)?;
                }
            }
            Extracted::Declarations { path, declarations } => {
                for declaration in declarations {
                    registry.add_type(declaration, &path)?;
                }
            }
            Extracted::NotAResolver => {}
        }
    }

    Ok(registry)
}

/// Every schema file under `root`, in a stable (file name) order. Hidden entries are skipped.
fn collect_schema_files(root: &Path) -> Result<Vec<SchemaFile>, ScanError> {
    let walker = WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry));

    let mut files = vec![];
    for entry in walker {
        let entry = entry?;
        let metadata = entry.metadata()?;
        if let Some(file) = classify(root, entry.path(), &metadata) {
            files.push(file);
        }
    }
    Ok(files)
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .is_some_and(|name| name.starts_with('.'))
}

async fn extract(file: SchemaFile, options: &ScanOptions) -> Result<Extracted, ScanError> {
    match file {
        SchemaFile::Declaration { path } => {
            let declarations = parse_declarations(&path)?;
            Ok(Extracted::Declarations { path, declarations })
        }
        SchemaFile::Executable { path, object } => match discover_fields(&path, options).await {
            Ok(fields) => Ok(Extracted::Resolver {
                path,
                object,
                fields,
            }),
            Err(e) if options.is_known_resolver(&path) => Err(e),
            Err(e @ ScanError::Extraction { .. }) => {
                debug!(path = %path.display(), error = %e, "Not a resolver");
                Ok(Extracted::NotAResolver)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping executable");
                Ok(Extracted::NotAResolver)
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use common::test_support::TestTree;

    use crate::{error::GraphError, registry::DefinitionKey};

    use super::*;

    fn field_key(object: &str, field: &str) -> DefinitionKey {
        DefinitionKey::Field {
            object: object.to_string(),
            field: field.to_string(),
        }
    }

    #[test_log::test(tokio::test)]
    async fn scan_collects_all_kinds() {
        let tree = TestTree::new();
        tree.resolver("greet", &["greet(name: String!): String"], "echo hi");
        tree.resolver("User/posts", &["posts: [Post!]!"], "echo '[]'");
        tree.resolver("Mutation/addUser", &["addUser(name: String!): User"], "echo '{}'");
        tree.script("helper.sh", "exit 1");
        tree.file("types.graphql", "type User { name: String }\ntype Post { title: String }");
        tree.resolver(".git/hooks/pre-commit", &["hidden: String"], "exit 0");

        let registry = scan_document_root(&ScanOptions::new(tree.root().to_path_buf()))
            .await
            .unwrap();

        assert!(registry.get(&field_key("Query", "greet")).is_some());
        assert!(registry.get(&field_key("User", "posts")).is_some());
        assert!(registry.get(&field_key("Mutation", "addUser")).is_some());
        assert!(registry.get(&DefinitionKey::Object("User".to_string())).is_some());
        assert!(registry.get(&DefinitionKey::Object("Post".to_string())).is_some());
        assert!(registry.get(&field_key("hooks", "hidden")).is_none());
        assert_eq!(registry.len(), 5);

        assert_eq!(
            registry.resolver("User", "posts"),
            Some(tree.root().join("User/posts").as_path())
        );
    }

    #[tokio::test]
    async fn known_resolvers_are_scanned_strictly() {
        let tree = TestTree::new();
        let broken = tree.script("greet", "exit 1");

        let lenient = ScanOptions::new(tree.root().to_path_buf());
        let registry = scan_document_root(&lenient).await.unwrap();
        assert!(registry.is_empty());

        let strict = lenient.with_known_resolvers([broken]);
        assert!(matches!(
            scan_document_root(&strict).await,
            Err(BuildError::Scan(ScanError::Extraction { .. }))
        ));
    }

    #[test_log::test(tokio::test)]
    async fn unparseable_discovery_output_is_skipped_unless_known() {
        let tree = TestTree::new();
        tree.resolver("greet", &["greet: String"], "echo hi");
        let chatty = tree.script("chatty", "echo hello");

        let lenient = ScanOptions::new(tree.root().to_path_buf());
        let registry = scan_document_root(&lenient).await.unwrap();
        assert_eq!(registry.len(), 1);
        assert!(registry.get(&field_key("Query", "greet")).is_some());
        assert_eq!(registry.resolver("Query", "chatty"), None);

        let strict = lenient.with_known_resolvers([chatty]);
        assert!(matches!(
            scan_document_root(&strict).await,
            Err(BuildError::Scan(ScanError::Parse { .. }))
        ));
    }

    #[tokio::test]
    async fn malformed_declaration_file_fails_the_scan() {
        let tree = TestTree::new();
        tree.file("types.graphql", "type User {");

        assert!(matches!(
            scan_document_root(&ScanOptions::new(tree.root().to_path_buf())).await,
            Err(BuildError::Scan(ScanError::Parse { .. }))
        ));
    }

    #[tokio::test]
    async fn duplicate_declarations_fail_the_scan() {
        let tree = TestTree::new();
        tree.file("a.graphql", "enum Status { OK }");
        tree.file("b.graphql", "type Status { ok: Boolean }");

        match scan_document_root(&ScanOptions::new(tree.root().to_path_buf())).await {
            Err(BuildError::Graph(errors)) => assert!(matches!(
                errors.as_slice(),
                [GraphError::DuplicateDefinition { key, .. }] if key == "object::Status"
            )),
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_root_is_a_scan_error() {
        let options = ScanOptions::new(PathBuf::from("/nonexistent/treeql/root"));
        assert!(matches!(
            scan_document_root(&options).await,
            Err(BuildError::Scan(ScanError::Walk(_)))
        ));
    }
}
