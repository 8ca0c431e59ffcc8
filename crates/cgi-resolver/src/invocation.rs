// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use async_graphql_value::{ConstValue, Name};
use common::{
    config::{GraphConfig, RunAs},
    http::Headers,
};
use core_model::{
    schema::LinkedSchema,
    types::{ObjectField, ObjectType},
};
use indexmap::IndexMap;
use tokio::process::Command;
use tracing::{debug, instrument, warn};

use crate::{
    arguments::ArgumentEncoder,
    context::ContextFile,
    environment::CgiEnvironment,
    error::{CompileError, ResolverError},
    output::{OutputDecoder, split_output},
    process::{pass_as_context_fd, run, stderr_text},
};

/// How resolver processes of one graph are started
#[derive(Debug, Clone)]
pub struct ResolverSettings {
    pub document_root: PathBuf,
    /// Working directory of every resolver process
    pub resolver_dir: PathBuf,
    pub timeout: Duration,
    pub run_as: Option<RunAs>,
}

impl ResolverSettings {
    pub fn from_config(graph: &GraphConfig) -> Self {
        Self {
            document_root: graph.document_root.clone(),
            resolver_dir: graph.resolver_dir.clone(),
            timeout: graph.resolver_timeout,
            run_as: graph.run_as,
        }
    }
}

/// Headers collected from resolver output, merged into the HTTP response
pub type ResponseHeaders = Mutex<Headers>;

/// Everything one call of a field resolver needs from the request
pub struct Invocation<'a> {
    pub arguments: &'a IndexMap<Name, ConstValue>,
    /// The value of the object the field belongs to; `None` for root fields
    pub parent: Option<&'a ConstValue>,
    pub environment: &'a CgiEnvironment,
    pub context: Option<&'a ContextFile>,
    pub response_headers: &'a ResponseHeaders,
}

/// A resolver-backed field, ready to be invoked
#[derive(Debug)]
pub struct FieldResolver {
    object: String,
    field: String,
    path: PathBuf,
    script_name: String,
    arguments: ArgumentEncoder,
    decoder: OutputDecoder,
    settings: Arc<ResolverSettings>,
}

impl FieldResolver {
    /// `None` for fields without an executable
    pub fn compile(
        schema: &LinkedSchema,
        object: &ObjectType,
        field: &ObjectField,
        settings: Arc<ResolverSettings>,
    ) -> Result<Option<Self>, CompileError> {
        let Some(path) = &field.resolver else {
            return Ok(None);
        };

        let decoder = OutputDecoder::compile(schema, &object.name, &field.name, &field.typ)?;
        let script_name = script_name(&settings.document_root, path);

        Ok(Some(Self {
            object: object.name.clone(),
            field: field.name.clone(),
            path: path.clone(),
            script_name,
            arguments: ArgumentEncoder::compile(&field.arguments),
            decoder,
            settings,
        }))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run the executable and decode its output. Failures are logged here; the caller only
    /// needs to report them as the field's error.
    #[instrument(
        name = "FieldResolver::resolve",
        skip_all,
        fields(object = %self.object, field = %self.field)
    )]
    pub async fn resolve(&self, invocation: Invocation<'_>) -> Result<ConstValue, ResolverError> {
        let result = self.invoke(invocation).await;

        if let Err(error) = &result {
            warn!(
                object = %self.object,
                field = %self.field,
                resolver = %self.path.display(),
                resolver_dir = %self.settings.resolver_dir.display(),
                %error,
                "Resolver failed"
            );
        }

        result
    }

    async fn invoke(&self, invocation: Invocation<'_>) -> Result<ConstValue, ResolverError> {
        let mut command = Command::new(&self.path);
        command
            .args(self.arguments.encode(invocation.arguments)?)
            .env_clear()
            .envs(
                invocation
                    .environment
                    .for_script(&self.script_name, &self.path.to_string_lossy()),
            )
            .current_dir(&self.settings.resolver_dir);
        if let Some(run_as) = &self.settings.run_as {
            command.uid(run_as.uid).gid(run_as.gid);
        }

        // Held open until the child has been spawned
        let context_file = invocation
            .context
            .map(|context| context.reopen())
            .transpose()?;
        if let Some(file) = &context_file {
            pass_as_context_fd(&mut command, file);
        }

        let input = invocation
            .parent
            .map(serde_json::to_vec)
            .transpose()
            .map_err(std::io::Error::from)?;

        let output = run(command, input, &self.path, self.settings.timeout).await?;
        drop(context_file);

        if !output.status.success() {
            return Err(ResolverError::Exited {
                status: output.status.code().unwrap_or(-1),
                stderr: stderr_text(&output),
            });
        }

        let (headers, payload) = split_output(&output.stdout)?;
        if !headers.is_empty() {
            debug!(?headers, "Resolver returned response headers");
            invocation
                .response_headers
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .extend(headers);
        }

        self.decoder.decode(payload)
    }
}

/// The resolver's path relative to the document root, or its file name if it lies outside
fn script_name(document_root: &Path, path: &Path) -> String {
    path.strip_prefix(document_root)
        .ok()
        .or_else(|| path.file_name().map(Path::new))
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use common::test_support::{TestRequestHead, TestTree};
    use core_model::{
        mapped_arena::MappedArena,
        primitive_type::PrimitiveType,
        types::{Argument, NamedType, TypeReference},
    };
    use treeql_env::MapEnvironment;

    use super::*;

    struct Fixture {
        tree: TestTree,
        schema: LinkedSchema,
        settings: Arc<ResolverSettings>,
        environment: CgiEnvironment,
        headers: ResponseHeaders,
    }

    impl Fixture {
        fn new() -> Self {
            let tree = TestTree::new();
            let mut objects = MappedArena::default();
            let query = objects.add(
                "Query",
                ObjectType {
                    name: "Query".to_string(),
                    description: None,
                    fields: vec![],
                    implements: vec![],
                },
            );
            let schema = LinkedSchema {
                enums: MappedArena::default(),
                inputs: MappedArena::default(),
                objects,
                interfaces: MappedArena::default(),
                query,
                mutation: None,
            };
            let settings = Arc::new(ResolverSettings {
                document_root: tree.root().to_path_buf(),
                resolver_dir: tree.root().to_path_buf(),
                timeout: Duration::from_secs(5),
                run_as: None,
            });
            let environment = CgiEnvironment::from_request(
                &TestRequestHead::default(),
                &MapEnvironment::from([("PATH", "/usr/bin:/bin")]),
            );

            Self {
                tree,
                schema,
                settings,
                environment,
                headers: Mutex::new(Headers::new()),
            }
        }

        fn resolver(&self, relative: &str, body: &str, field: ObjectField) -> FieldResolver {
            let path = self.tree.script(relative, body);
            let field = ObjectField {
                resolver: Some(path),
                ..field
            };
            FieldResolver::compile(
                &self.schema,
                self.schema.query_type(),
                &field,
                self.settings.clone(),
            )
            .unwrap()
            .unwrap()
        }

        async fn resolve(
            &self,
            resolver: &FieldResolver,
            arguments: &IndexMap<Name, ConstValue>,
            parent: Option<&ConstValue>,
        ) -> Result<ConstValue, ResolverError> {
            resolver
                .resolve(Invocation {
                    arguments,
                    parent,
                    environment: &self.environment,
                    context: None,
                    response_headers: &self.headers,
                })
                .await
        }
    }

    fn field(name: &str, typ: TypeReference) -> ObjectField {
        ObjectField {
            name: name.to_string(),
            description: None,
            arguments: vec![],
            typ,
            resolver: None,
        }
    }

    fn string() -> TypeReference {
        TypeReference::Named(NamedType::Primitive(PrimitiveType::String))
    }

    #[tokio::test]
    async fn greet_passes_arguments_and_returns_stdout() {
        let fixture = Fixture::new();
        let greet = fixture.resolver(
            "greet",
            r#"printf 'Hello, %s (%s %s)' "$2" "$1" "$SCRIPT_NAME""#,
            ObjectField {
                arguments: vec![Argument {
                    name: "name".to_string(),
                    description: None,
                    typ: TypeReference::NonNull(Box::new(string())),
                    default_value: None,
                }],
                ..field("greet", string())
            },
        );

        let arguments = [(Name::new("name"), ConstValue::String("Ada".to_string()))]
            .into_iter()
            .collect();
        let value = fixture.resolve(&greet, &arguments, None).await.unwrap();

        assert_eq!(value, ConstValue::String("Hello, Ada (--name greet)".to_string()));
    }

    #[tokio::test]
    async fn stderr_becomes_the_error() {
        let fixture = Fixture::new();
        let broken = fixture.resolver("broken", "echo boom >&2\nexit 1", field("broken", string()));

        let err = fixture
            .resolve(&broken, &IndexMap::new(), None)
            .await
            .unwrap_err();

        assert!(matches!(err, ResolverError::Exited { status: 1, .. }));
        assert_eq!(err.to_string(), "boom");
    }

    #[tokio::test]
    async fn headers_are_merged_into_the_response() {
        let fixture = Fixture::new();
        let object = TypeReference::Named(NamedType::Object(fixture.schema.query));
        let cached = fixture.resolver(
            "cached",
            r#"printf 'X-Cache: HIT\n\n{"a":1}'"#,
            field("cached", object),
        );

        let value = fixture
            .resolve(&cached, &IndexMap::new(), None)
            .await
            .unwrap();

        assert_eq!(value.into_json().unwrap(), serde_json::json!({"a": 1}));
        assert_eq!(
            fixture.headers.lock().unwrap().get("x-cache").as_deref(),
            Some("HIT")
        );
    }

    #[tokio::test]
    async fn parent_value_arrives_on_stdin() {
        let fixture = Fixture::new();
        let echo = fixture.resolver("users/echo", "cat", field("echo", string()));

        let parent = ConstValue::from_json(serde_json::json!({"id": 7})).unwrap();
        let value = fixture
            .resolve(&echo, &IndexMap::new(), Some(&parent))
            .await
            .unwrap();
        assert_eq!(value, ConstValue::String(r#"{"id":7}"#.to_string()));

        // Root fields get no input at all
        let value = fixture.resolve(&echo, &IndexMap::new(), None).await.unwrap();
        assert_eq!(value, ConstValue::Null);
    }

    #[tokio::test]
    async fn context_is_readable_from_descriptor_3() {
        let fixture = Fixture::new();
        let reader = fixture.resolver("ctx", "cat <&3", field("ctx", string()));

        let context = crate::context::ContextGenerator::new(
            &common::config::ContextConfig {
                source: common::config::ContextSource::Value(serde_json::json!({"user": "ada"})),
                tmp_dir: None,
            },
            fixture.tree.root().to_path_buf(),
            Duration::from_secs(5),
            None,
        )
        .generate(&fixture.environment)
        .await
        .unwrap();

        for _ in 0..2 {
            let value = reader
                .resolve(Invocation {
                    arguments: &IndexMap::new(),
                    parent: None,
                    environment: &fixture.environment,
                    context: Some(&context),
                    response_headers: &fixture.headers,
                })
                .await
                .unwrap();
            assert_eq!(value, ConstValue::String(r#"{"user":"ada"}"#.to_string()));
        }
    }

    #[tokio::test]
    async fn slow_resolvers_time_out() {
        let mut fixture = Fixture::new();
        fixture.settings = Arc::new(ResolverSettings {
            timeout: Duration::from_millis(200),
            ..(*fixture.settings).clone()
        });
        let slow = fixture.resolver("slow", "sleep 10", field("slow", string()));

        let err = fixture
            .resolve(&slow, &IndexMap::new(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ResolverError::Timeout { .. }));
    }

    #[tokio::test]
    async fn missing_executable() {
        let fixture = Fixture::new();
        let resolver = FieldResolver::compile(
            &fixture.schema,
            fixture.schema.query_type(),
            &ObjectField {
                resolver: Some(fixture.tree.root().join("gone")),
                ..field("gone", string())
            },
            fixture.settings.clone(),
        )
        .unwrap()
        .unwrap();

        let err = fixture
            .resolve(&resolver, &IndexMap::new(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ResolverError::Spawn { .. }));
    }

    #[test]
    fn script_names() {
        assert_eq!(
            script_name(Path::new("/srv/root"), Path::new("/srv/root/users/list")),
            "users/list"
        );
        assert_eq!(
            script_name(Path::new("/srv/root"), Path::new("/elsewhere/tool")),
            "tool"
        );
    }
}
