// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Links a [`DefinitionRegistry`] into a [`LinkedSchema`].
//!
//! Types are instantiated in waves (enums, inputs, objects, interfaces). Every reference to a
//! non-primitive type is first written as [`NamedType::Unknown`] and recorded as a
//! [`Placeholder`] naming the slot that holds it. Once all waves are done, each placeholder is
//! looked up by name and the slot is overwritten with the real type, wrapped in the same
//! list/non-null shape. Since lookups happen only after every type exists, the declaration order
//! and any cycles between objects do not matter.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use async_graphql_parser::types::{BaseType, Type};
use async_graphql_value::Name;
use core_model::{
    mapped_arena::MappedArena,
    primitive_type::PrimitiveType,
    schema::{LinkedSchema, MUTATION_TYPE, QUERY_TYPE},
    types::{
        Argument, EnumType, EnumValue, InputField, InputId, InputType, InterfaceField,
        InterfaceId, InterfaceType, NamedType, ObjectField, ObjectId, ObjectType, TypeReference,
        WrapperShape,
    },
};
use indexmap::IndexMap;
use tracing::debug;

use crate::{
    declaration::{
        EnumDecl, FieldDecl, InputDecl, InputValueDecl, InterfaceDecl, ObjectDecl, TypeDecl,
    },
    error::GraphError,
    registry::{Declaration, DefinitionKey, DefinitionRegistry},
};

/// Query field added when only mutations exist (a schema must have a query type)
pub const EMPTY_QUERY_FIELD: &str = "_empty";

/// Where a placeholder lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeSlot {
    InputField {
        input: InputId,
        field: usize,
    },
    ObjectField {
        object: ObjectId,
        field: usize,
    },
    Argument {
        object: ObjectId,
        field: usize,
        argument: usize,
    },
    InterfaceField {
        interface: InterfaceId,
        field: usize,
    },
    InterfaceArgument {
        interface: InterfaceId,
        field: usize,
        argument: usize,
    },
}

impl TypeSlot {
    /// Input fields and arguments accept only input types
    fn is_input_position(&self) -> bool {
        matches!(
            self,
            TypeSlot::InputField { .. }
                | TypeSlot::Argument { .. }
                | TypeSlot::InterfaceArgument { .. }
        )
    }
}

/// A reference to `name`, made before the named type was instantiated
#[derive(Debug, Clone)]
pub struct Placeholder {
    pub slot: TypeSlot,
    pub name: String,
    pub shape: WrapperShape,
}

/// An object's fields gathered from declaration files and resolver executables
struct ObjectAssembly {
    name: String,
    description: Option<String>,
    implements: Vec<String>,
    fields: Vec<(FieldDecl, Option<PathBuf>)>,
    source: PathBuf,
}

impl ObjectAssembly {
    fn new(name: &str, source: &Path) -> Self {
        Self {
            name: name.to_string(),
            description: None,
            implements: vec![],
            fields: vec![],
            source: source.to_path_buf(),
        }
    }

    /// A resolver-backed field replaces a declared field of the same name; a declared field
    /// never replaces anything.
    fn merge_field(&mut self, decl: FieldDecl, resolver: Option<PathBuf>) {
        match self.fields.iter().position(|(f, _)| f.name == decl.name) {
            Some(index) if resolver.is_some() => self.fields[index] = (decl, resolver),
            Some(_) => debug!(
                object = %self.name,
                field = %decl.name,
                "Keeping the resolver-backed field over the declared one"
            ),
            None => self.fields.push((decl, resolver)),
        }
    }

    fn merge_declaration(&mut self, decl: ObjectDecl) {
        self.description = decl.description;
        self.implements = decl.implements;
        for field in decl.fields {
            self.merge_field(field, None);
        }
    }
}

#[derive(Default)]
struct GraphBuilder {
    enums: MappedArena<EnumType>,
    inputs: MappedArena<InputType>,
    objects: MappedArena<ObjectType>,
    interfaces: MappedArena<InterfaceType>,
    placeholders: Vec<Placeholder>,
    errors: Vec<GraphError>,
}

/// Build the linked schema, reporting every problem found rather than only the first.
pub fn build_graph(registry: DefinitionRegistry) -> Result<LinkedSchema, Vec<GraphError>> {
    let (declarations, resolvers) = registry.into_parts();

    let mut enums: Vec<EnumDecl> = vec![];
    let mut inputs: Vec<InputDecl> = vec![];
    let mut interfaces: Vec<InterfaceDecl> = vec![];
    let mut assemblies: IndexMap<String, ObjectAssembly> = IndexMap::new();
    // Sources of non-object type names, to detect implicit objects clashing with them
    let mut other_types: HashMap<String, (DefinitionKey, PathBuf)> = HashMap::new();

    for (key, declaration) in declarations {
        match declaration {
            Declaration::Type { decl, source } => match decl {
                TypeDecl::Enum(decl) => {
                    other_types.insert(decl.name.clone(), (key, source));
                    enums.push(decl);
                }
                TypeDecl::Input(decl) => {
                    other_types.insert(decl.name.clone(), (key, source));
                    inputs.push(decl);
                }
                TypeDecl::Interface(decl) => {
                    other_types.insert(decl.name.clone(), (key, source));
                    interfaces.push(decl);
                }
                TypeDecl::Object(decl) => assemblies
                    .entry(decl.name.clone())
                    .or_insert_with(|| ObjectAssembly::new(&decl.name, &source))
                    .merge_declaration(decl),
            },
            Declaration::Field {
                object,
                decl,
                source,
            } => {
                let resolver = resolvers
                    .get(&(object.clone(), decl.name.clone()))
                    .cloned();
                assemblies
                    .entry(object.clone())
                    .or_insert_with(|| ObjectAssembly::new(&object, &source))
                    .merge_field(decl, resolver);
            }
        }
    }

    let mut errors = vec![];
    for assembly in assemblies.values() {
        if let Some((key, source)) = other_types.get(&assembly.name) {
            errors.push(GraphError::DuplicateDefinition {
                key: key.to_string(),
                first: source.clone(),
                second: assembly.source.clone(),
            });
        }
    }
    if !errors.is_empty() {
        return Err(errors);
    }

    settle_roots(&mut assemblies)?;

    let mut builder = GraphBuilder::default();
    builder.instantiate_enums(enums);
    builder.instantiate_inputs(inputs);
    let implements = builder.instantiate_objects(assemblies.into_values());
    builder.instantiate_interfaces(interfaces);
    builder.link_interfaces(implements);
    builder.resolve_placeholders();

    builder.finish()
}

/// Drop a field-less Mutation and make sure Query exists.
fn settle_roots(assemblies: &mut IndexMap<String, ObjectAssembly>) -> Result<(), Vec<GraphError>> {
    let has_fields = |assemblies: &IndexMap<String, ObjectAssembly>, name: &str| {
        assemblies
            .get(name)
            .is_some_and(|assembly| !assembly.fields.is_empty())
    };

    let has_query = has_fields(assemblies, QUERY_TYPE);
    let has_mutation = has_fields(assemblies, MUTATION_TYPE);

    if !has_query && !has_mutation {
        return Err(vec![GraphError::NoRoots]);
    }

    if !has_mutation {
        assemblies.shift_remove(MUTATION_TYPE);
    }

    if !has_query {
        let query = assemblies
            .entry(QUERY_TYPE.to_string())
            .or_insert_with(|| ObjectAssembly::new(QUERY_TYPE, Path::new("")));
        query.merge_field(
            FieldDecl {
                name: EMPTY_QUERY_FIELD.to_string(),
                description: None,
                arguments: vec![],
                typ: Type {
                    base: BaseType::Named(Name::new(PrimitiveType::Boolean.name())),
                    nullable: true,
                },
            },
            None,
        );
    }

    Ok(())
}

/// The declared type with every non-primitive name left as [`NamedType::Unknown`]
pub fn type_reference(typ: &Type) -> TypeReference {
    let base = match &typ.base {
        BaseType::Named(name) => TypeReference::Named(match PrimitiveType::from_name(name) {
            Some(primitive) => NamedType::Primitive(primitive),
            None => NamedType::Unknown(name.to_string()),
        }),
        BaseType::List(underlying) => TypeReference::List(Box::new(type_reference(underlying))),
    };

    if typ.nullable {
        base
    } else {
        TypeReference::NonNull(Box::new(base))
    }
}

impl GraphBuilder {
    fn reference(&mut self, typ: &Type, slot: TypeSlot) -> TypeReference {
        let reference = type_reference(typ);
        if let NamedType::Unknown(name) = reference.innermost() {
            self.placeholders.push(Placeholder {
                slot,
                name: name.clone(),
                shape: reference.shape(),
            });
        }
        reference
    }

    fn instantiate_enums(&mut self, enums: Vec<EnumDecl>) {
        for decl in enums {
            let values = decl
                .values
                .into_iter()
                .enumerate()
                .map(|(ordinal, value)| EnumValue {
                    name: value.name,
                    description: value.description,
                    ordinal,
                })
                .collect();

            self.enums.add(
                &decl.name,
                EnumType {
                    name: decl.name.clone(),
                    description: decl.description,
                    values,
                },
            );
        }
    }

    fn instantiate_inputs(&mut self, inputs: Vec<InputDecl>) {
        for decl in inputs {
            let id = self.inputs.add(
                &decl.name,
                InputType {
                    name: decl.name.clone(),
                    description: decl.description,
                    fields: vec![],
                },
            );

            let fields = decl
                .fields
                .into_iter()
                .enumerate()
                .map(|(index, field)| InputField {
                    typ: self.reference(&field.typ, TypeSlot::InputField { input: id, field: index }),
                    name: field.name,
                    description: field.description,
                    default_value: field.default_value,
                })
                .collect();

            self.inputs[id].fields = fields;
        }
    }

    fn arguments(
        &mut self,
        arguments: Vec<InputValueDecl>,
        slot: impl Fn(usize) -> TypeSlot,
    ) -> Vec<Argument> {
        arguments
            .into_iter()
            .enumerate()
            .map(|(index, argument)| Argument {
                typ: self.reference(&argument.typ, slot(index)),
                name: argument.name,
                description: argument.description,
                default_value: argument.default_value,
            })
            .collect()
    }

    /// Returns the interface names each object declared it implements
    fn instantiate_objects(
        &mut self,
        assemblies: impl Iterator<Item = ObjectAssembly>,
    ) -> Vec<(ObjectId, Vec<String>)> {
        let mut implements = vec![];

        for assembly in assemblies {
            let object = self.objects.add(
                &assembly.name,
                ObjectType {
                    name: assembly.name.clone(),
                    description: assembly.description,
                    fields: vec![],
                    implements: vec![],
                },
            );

            let mut fields = vec![];
            for (field, (decl, resolver)) in assembly.fields.into_iter().enumerate() {
                let arguments = self.arguments(decl.arguments, |argument| TypeSlot::Argument {
                    object,
                    field,
                    argument,
                });
                fields.push(ObjectField {
                    typ: self.reference(&decl.typ, TypeSlot::ObjectField { object, field }),
                    name: decl.name,
                    description: decl.description,
                    arguments,
                    resolver,
                });
            }

            self.objects[object].fields = fields;
            implements.push((object, assembly.implements));
        }

        implements
    }

    fn instantiate_interfaces(&mut self, interfaces: Vec<InterfaceDecl>) {
        for decl in interfaces {
            let interface = self.interfaces.add(
                &decl.name,
                InterfaceType {
                    name: decl.name.clone(),
                    description: decl.description,
                    fields: vec![],
                },
            );

            let mut fields = vec![];
            for (field, decl) in decl.fields.into_iter().enumerate() {
                let arguments =
                    self.arguments(decl.arguments, |argument| TypeSlot::InterfaceArgument {
                        interface,
                        field,
                        argument,
                    });
                fields.push(InterfaceField {
                    typ: self.reference(&decl.typ, TypeSlot::InterfaceField { interface, field }),
                    name: decl.name,
                    description: decl.description,
                    arguments,
                });
            }

            self.interfaces[interface].fields = fields;
        }
    }

    fn link_interfaces(&mut self, implements: Vec<(ObjectId, Vec<String>)>) {
        for (object, names) in implements {
            for name in names {
                match self.interfaces.get_id(&name) {
                    Some(interface) => self.objects[object].implements.push(interface),
                    None => {
                        let owner = self.objects[object].name.clone();
                        let error = match self.lookup(&name) {
                            Some(_) => GraphError::InvalidTypePosition {
                                owner,
                                field: "implements".to_string(),
                                type_name: name,
                                expected: "an interface",
                            },
                            None => GraphError::DanglingReference {
                                owner,
                                field: "implements".to_string(),
                                type_name: name,
                            },
                        };
                        self.errors.push(error);
                    }
                }
            }
        }
    }

    fn lookup(&self, name: &str) -> Option<NamedType> {
        if let Some(id) = self.enums.get_id(name) {
            return Some(NamedType::Enum(id));
        }
        if let Some(id) = self.inputs.get_id(name) {
            return Some(NamedType::Input(id));
        }
        if let Some(id) = self.objects.get_id(name) {
            return Some(NamedType::Object(id));
        }
        self.interfaces.get_id(name).map(NamedType::Interface)
    }

    fn resolve_placeholders(&mut self) {
        for placeholder in std::mem::take(&mut self.placeholders) {
            let Some(named) = self.lookup(&placeholder.name) else {
                let (owner, field) = self.describe(placeholder.slot);
                self.errors.push(GraphError::DanglingReference {
                    owner,
                    field,
                    type_name: placeholder.name,
                });
                continue;
            };

            let input_position = placeholder.slot.is_input_position();
            let allowed = if input_position {
                named.is_input()
            } else {
                named.is_output()
            };

            if !allowed {
                let (owner, field) = self.describe(placeholder.slot);
                self.errors.push(GraphError::InvalidTypePosition {
                    owner,
                    field,
                    type_name: placeholder.name,
                    expected: if input_position {
                        "an input type"
                    } else {
                        "an output type"
                    },
                });
                continue;
            }

            *self.slot_mut(placeholder.slot) = placeholder.shape.wrap(named);
        }
    }

    fn slot_mut(&mut self, slot: TypeSlot) -> &mut TypeReference {
        match slot {
            TypeSlot::InputField { input, field } => &mut self.inputs[input].fields[field].typ,
            TypeSlot::ObjectField { object, field } => &mut self.objects[object].fields[field].typ,
            TypeSlot::Argument {
                object,
                field,
                argument,
            } => &mut self.objects[object].fields[field].arguments[argument].typ,
            TypeSlot::InterfaceField { interface, field } => {
                &mut self.interfaces[interface].fields[field].typ
            }
            TypeSlot::InterfaceArgument {
                interface,
                field,
                argument,
            } => &mut self.interfaces[interface].fields[field].arguments[argument].typ,
        }
    }

    /// `(owner, field)` for error messages; arguments read as `field(argument)`
    fn describe(&self, slot: TypeSlot) -> (String, String) {
        match slot {
            TypeSlot::InputField { input, field } => {
                let input = &self.inputs[input];
                (input.name.clone(), input.fields[field].name.clone())
            }
            TypeSlot::ObjectField { object, field } => {
                let object = &self.objects[object];
                (object.name.clone(), object.fields[field].name.clone())
            }
            TypeSlot::Argument {
                object,
                field,
                argument,
            } => {
                let object = &self.objects[object];
                let field = &object.fields[field];
                (
                    object.name.clone(),
                    format!("{}({})", field.name, field.arguments[argument].name),
                )
            }
            TypeSlot::InterfaceField { interface, field } => {
                let interface = &self.interfaces[interface];
                (interface.name.clone(), interface.fields[field].name.clone())
            }
            TypeSlot::InterfaceArgument {
                interface,
                field,
                argument,
            } => {
                let interface = &self.interfaces[interface];
                let field = &interface.fields[field];
                (
                    interface.name.clone(),
                    format!("{}({})", field.name, field.arguments[argument].name),
                )
            }
        }
    }

    fn finish(self) -> Result<LinkedSchema, Vec<GraphError>> {
        if !self.errors.is_empty() {
            return Err(self.errors);
        }

        let query = self
            .objects
            .get_id(QUERY_TYPE)
            .ok_or_else(|| vec![GraphError::NoRoots])?;
        let mutation = self.objects.get_id(MUTATION_TYPE);

        Ok(LinkedSchema {
            enums: self.enums,
            inputs: self.inputs,
            objects: self.objects,
            interfaces: self.interfaces,
            query,
            mutation,
        })
    }
}
