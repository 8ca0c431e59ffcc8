// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Translation of a [`LinkedSchema`] into an executable `async_graphql` dynamic schema.
//!
//! Fields bound to an executable resolve through their [`FieldResolver`]; every other field
//! reads the value under its name from the parent object.

use std::sync::Arc;

use async_graphql::{
    Error, Name, Value,
    dynamic::{
        Enum, EnumItem, Field, FieldFuture, FieldValue, InputObject, InputValue, Interface,
        InterfaceField, Object, ResolverContext, Scalar, Schema, TypeRef,
    },
};
use cgi_resolver::{FieldResolver, Invocation, ResolverTable};
use core_model::{
    primitive_type::PrimitiveType,
    schema::LinkedSchema,
    types::{
        Argument, EnumType, InputType, InterfaceType, NamedType, ObjectField, ObjectType,
        TypeReference,
    },
};
use indexmap::IndexMap;

use crate::{error::RouterError, request_data::RequestData};

/// The key an interface-typed value names its concrete type under
pub const TYPENAME_KEY: &str = "__typename";

pub fn build_executable_schema(
    linked: &LinkedSchema,
    resolvers: &ResolverTable,
) -> Result<Schema, RouterError> {
    let mut builder = Schema::build(
        &linked.query_type().name,
        linked.mutation_type().map(|mutation| mutation.name.as_str()),
        None,
    );

    for primitive in PrimitiveType::ALL {
        if primitive.is_custom_scalar() {
            builder = builder.register(
                Scalar::new(primitive.name()).description("An RFC 3339 timestamp"),
            );
        }
    }

    for (_, typ) in linked.enums.iter() {
        builder = builder.register(enum_type(typ));
    }
    for (_, typ) in linked.inputs.iter() {
        builder = builder.register(input_type(linked, typ));
    }
    for (_, typ) in linked.interfaces.iter() {
        builder = builder.register(interface_type(linked, typ));
    }
    for (_, typ) in linked.objects.iter() {
        builder = builder.register(object_type(linked, typ, resolvers));
    }

    builder
        .finish()
        .map_err(|e| RouterError::Schema(e.to_string()))
}

fn type_ref(linked: &LinkedSchema, typ: &TypeReference) -> TypeRef {
    match typ {
        TypeReference::Named(named) => TypeRef::named(linked.named_type_name(named)),
        TypeReference::NonNull(underlying) => {
            TypeRef::NonNull(Box::new(type_ref(linked, underlying)))
        }
        TypeReference::List(underlying) => TypeRef::List(Box::new(type_ref(linked, underlying))),
    }
}

fn enum_type(typ: &EnumType) -> Enum {
    let mut out = Enum::new(&typ.name);
    if let Some(description) = &typ.description {
        out = out.description(description);
    }
    for value in &typ.values {
        let mut item = EnumItem::new(&value.name);
        if let Some(description) = &value.description {
            item = item.description(description);
        }
        out = out.item(item);
    }
    out
}

fn input_type(linked: &LinkedSchema, typ: &InputType) -> InputObject {
    let mut out = InputObject::new(&typ.name);
    if let Some(description) = &typ.description {
        out = out.description(description);
    }
    for field in &typ.fields {
        let mut input_value = InputValue::new(&field.name, type_ref(linked, &field.typ));
        if let Some(description) = &field.description {
            input_value = input_value.description(description);
        }
        if let Some(default_value) = &field.default_value {
            input_value = input_value.default_value(default_value.clone());
        }
        out = out.field(input_value);
    }
    out
}

fn argument(linked: &LinkedSchema, argument: &Argument) -> InputValue {
    let mut out = InputValue::new(&argument.name, type_ref(linked, &argument.typ));
    if let Some(description) = &argument.description {
        out = out.description(description);
    }
    if let Some(default_value) = &argument.default_value {
        out = out.default_value(default_value.clone());
    }
    out
}

fn interface_type(linked: &LinkedSchema, typ: &InterfaceType) -> Interface {
    let mut out = Interface::new(&typ.name);
    if let Some(description) = &typ.description {
        out = out.description(description);
    }
    for field in &typ.fields {
        let mut interface_field = InterfaceField::new(&field.name, type_ref(linked, &field.typ));
        if let Some(description) = &field.description {
            interface_field = interface_field.description(description);
        }
        for arg in &field.arguments {
            interface_field = interface_field.argument(argument(linked, arg));
        }
        out = out.field(interface_field);
    }
    out
}

fn object_type(linked: &LinkedSchema, typ: &ObjectType, resolvers: &ResolverTable) -> Object {
    let mut out = Object::new(&typ.name);
    if let Some(description) = &typ.description {
        out = out.description(description);
    }
    for interface in &typ.implements {
        out = out.implement(&linked.interfaces[*interface].name);
    }
    for field in &typ.fields {
        out = out.field(object_field(
            linked,
            field,
            resolvers.get(&typ.name, &field.name),
        ));
    }
    out
}

/// What a resolved value needs before the engine can walk it
#[derive(Debug, Clone, PartialEq)]
enum OutputShape {
    Plain,
    /// Enum values inside JSON payloads arrive as strings
    Enum,
    /// The concrete type comes from the value's `__typename`
    Interface,
    List(Box<OutputShape>),
}

impl OutputShape {
    fn of(typ: &TypeReference) -> Self {
        match typ {
            TypeReference::NonNull(underlying) => Self::of(underlying),
            TypeReference::List(underlying) => Self::List(Box::new(Self::of(underlying))),
            TypeReference::Named(NamedType::Enum(_)) => Self::Enum,
            TypeReference::Named(NamedType::Interface(_)) => Self::Interface,
            TypeReference::Named(_) => Self::Plain,
        }
    }

    fn field_value<'a>(&self, value: Value) -> Result<Option<FieldValue<'a>>, Error> {
        let field_value = match (self, value) {
            (_, Value::Null) => return Ok(None),
            (Self::List(item_shape), Value::List(items)) => FieldValue::list(
                items
                    .into_iter()
                    .map(|item| {
                        item_shape
                            .field_value(item)
                            .map(|value| value.unwrap_or(FieldValue::NULL))
                    })
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            (Self::Enum, Value::String(name)) => FieldValue::value(Value::Enum(Name::new(name))),
            (Self::Interface, Value::Object(object)) => {
                let type_name = match object.get(TYPENAME_KEY) {
                    Some(Value::String(type_name)) => type_name.clone(),
                    _ => {
                        return Err(Error::new(format!(
                            "A value of an interface type must name its type in '{TYPENAME_KEY}'"
                        )));
                    }
                };
                FieldValue::value(Value::Object(object)).with_type(type_name)
            }
            (_, value) => FieldValue::value(value),
        };

        Ok(Some(field_value))
    }
}

struct FieldBinding {
    name: String,
    shape: OutputShape,
    resolver: Option<Arc<FieldResolver>>,
}

fn object_field(
    linked: &LinkedSchema,
    field: &ObjectField,
    resolver: Option<Arc<FieldResolver>>,
) -> Field {
    let binding = Arc::new(FieldBinding {
        name: field.name.clone(),
        shape: OutputShape::of(&field.typ),
        resolver,
    });

    let mut out = Field::new(&field.name, type_ref(linked, &field.typ), move |ctx| {
        let binding = binding.clone();
        FieldFuture::new(async move {
            let value = match &binding.resolver {
                Some(resolver) => invoke(&ctx, resolver).await?,
                None => value_from_parent(&ctx, &binding.name),
            };
            binding.shape.field_value(value)
        })
    });

    if let Some(description) = &field.description {
        out = out.description(description);
    }
    for arg in &field.arguments {
        out = out.argument(argument(linked, arg));
    }
    out
}

async fn invoke(ctx: &ResolverContext<'_>, resolver: &FieldResolver) -> Result<Value, Error> {
    let data = ctx.data::<Arc<RequestData>>()?;
    let arguments: IndexMap<Name, Value> = ctx
        .args
        .iter()
        .map(|(name, value)| (name.clone(), value.as_value().clone()))
        .collect();
    let parent = ctx
        .parent_value
        .as_value()
        .filter(|value| !matches!(value, Value::Null));

    resolver
        .resolve(Invocation {
            arguments: &arguments,
            parent,
            environment: &data.environment,
            context: data.context.as_ref(),
            response_headers: &data.response_headers,
        })
        .await
        .map_err(|e| Error::new(e.to_string()))
}

fn value_from_parent(ctx: &ResolverContext<'_>, name: &str) -> Value {
    match ctx.parent_value.as_value() {
        Some(Value::Object(object)) => object.get(name).cloned().unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_graphql::Request;
    use cgi_resolver::{CgiEnvironment, ResolverSettings};
    use common::test_support::{TestRequestHead, TestTree};
    use schema_builder::{ScanOptions, build_schema};
    use treeql_env::MapEnvironment;

    use super::*;

    struct Served {
        schema: Schema,
        linked: LinkedSchema,
    }

    async fn serve(tree: &TestTree) -> Served {
        let linked = build_schema(&ScanOptions::new(tree.root().to_path_buf()))
            .await
            .unwrap();
        let (resolvers, errors) = ResolverTable::compile(
            &linked,
            ResolverSettings {
                document_root: tree.root().to_path_buf(),
                resolver_dir: tree.root().to_path_buf(),
                timeout: Duration::from_secs(5),
                run_as: None,
            },
        );
        assert_eq!(errors, vec![]);
        let schema = build_executable_schema(&linked, &resolvers).unwrap();
        Served { schema, linked }
    }

    fn request_data() -> Arc<RequestData> {
        Arc::new(RequestData::new(
            CgiEnvironment::from_request(
                &TestRequestHead::default(),
                &MapEnvironment::from([("PATH", "/usr/bin:/bin")]),
            ),
            None,
        ))
    }

    async fn execute(
        served: &Served,
        query: &str,
    ) -> (async_graphql::Response, Arc<RequestData>) {
        let data = request_data();
        let response = served
            .schema
            .execute(Request::new(query).data(data.clone()))
            .await;
        (response, data)
    }

    #[test_log::test(tokio::test)]
    async fn greet() {
        let tree = TestTree::new();
        tree.resolver(
            "greet",
            &["greet(name: String!): String"],
            r#"printf 'Hello, %s' "$2""#,
        );
        let served = serve(&tree).await;

        let (response, _) = execute(&served, r#"{ greet(name: "Ada") }"#).await;
        assert!(response.errors.is_empty(), "{:?}", response.errors);
        assert_eq!(
            response.data.into_json().unwrap(),
            serde_json::json!({"greet": "Hello, Ada"})
        );
    }

    #[test_log::test(tokio::test)]
    async fn failing_field_does_not_abort_siblings() {
        let tree = TestTree::new();
        tree.resolver("broken", &["broken: String"], "echo boom >&2\nexit 1");
        tree.resolver("fine", &["fine: Int"], "echo 7");
        let served = serve(&tree).await;

        let (response, _) = execute(&served, "{ broken fine }").await;

        assert_eq!(response.errors.len(), 1);
        assert_eq!(response.errors[0].message, "boom");
        assert_eq!(
            response.data.into_json().unwrap(),
            serde_json::json!({"broken": null, "fine": 7})
        );
    }

    #[test_log::test(tokio::test)]
    async fn nested_fields_receive_their_parent() {
        let tree = TestTree::new();
        tree.file(
            "types.graphql",
            "enum Role { ADMIN MEMBER }\ntype User { id: ID!, name: String, role: Role }",
        );
        tree.resolver(
            "user",
            &["user(id: ID!): User"],
            r#"printf 'X-Cache: HIT\n\n{"id": "%s", "name": "Ada", "role": "ADMIN"}' "$2""#,
        );
        tree.resolver("User/me", &["me: User"], "cat");
        tree.resolver(
            "User/friends",
            &["friends: [User!]!"],
            r#"echo '[{"id": "2", "name": "Bob"}, {"id": "3", "name": "Eve"}]'"#,
        );
        let served = serve(&tree).await;

        let (response, data) = execute(
            &served,
            r#"{ user(id: "1") { id role me { name } friends { name } } }"#,
        )
        .await;
        assert!(response.errors.is_empty(), "{:?}", response.errors);
        assert_eq!(
            response.data.into_json().unwrap(),
            serde_json::json!({
                "user": {
                    "id": "1",
                    "role": "ADMIN",
                    "me": {"name": "Ada"},
                    "friends": [{"name": "Bob"}, {"name": "Eve"}]
                }
            })
        );
        assert_eq!(
            data.take_response_headers().get("x-cache").as_deref(),
            Some("HIT")
        );
    }

    #[test_log::test(tokio::test)]
    async fn interface_values_pick_their_type() {
        let tree = TestTree::new();
        tree.file(
            "types.graphql",
            "interface Node { id: ID! }\ntype Book implements Node { id: ID!, title: String }",
        );
        tree.resolver(
            "node",
            &["node: Node"],
            r#"echo '{"__typename": "Book", "id": "b1", "title": "Dune"}'"#,
        );
        let served = serve(&tree).await;

        let (response, _) = execute(
            &served,
            "{ node { __typename id ... on Book { title } } }",
        )
        .await;
        assert!(response.errors.is_empty(), "{:?}", response.errors);
        assert_eq!(
            response.data.into_json().unwrap(),
            serde_json::json!({"node": {"__typename": "Book", "id": "b1", "title": "Dune"}})
        );
        assert!(served.linked.interfaces.contains_key("Node"));
    }

    #[test]
    fn output_shapes() {
        let shape = OutputShape::List(Box::new(OutputShape::Enum));
        let value = shape
            .field_value(Value::List(vec![
                Value::String("ADMIN".to_string()),
                Value::Null,
            ]))
            .unwrap();
        assert!(value.is_some());

        let err = OutputShape::Interface
            .field_value(Value::from_json(serde_json::json!({"id": "1"})).unwrap())
            .err()
            .unwrap();
        assert!(err.message.contains(TYPENAME_KEY));

        assert!(OutputShape::Plain.field_value(Value::Null).unwrap().is_none());
    }
}
