// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

use crate::{
    mapped_arena::MappedArena,
    types::{
        EnumType, InputType, InterfaceId, InterfaceType, NamedType, ObjectId, ObjectType,
        TypeReference,
    },
};

pub const QUERY_TYPE: &str = "Query";
pub const MUTATION_TYPE: &str = "Mutation";

/// A fully linked schema: every field type points at an instantiated type.
#[derive(Debug, Clone)]
pub struct LinkedSchema {
    pub enums: MappedArena<EnumType>,
    pub inputs: MappedArena<InputType>,
    pub objects: MappedArena<ObjectType>,
    pub interfaces: MappedArena<InterfaceType>,
    pub query: ObjectId,
    pub mutation: Option<ObjectId>,
}

/// `(object, field) -> executable` for one resolver-backed field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverBinding<'a> {
    pub object: &'a str,
    pub field: &'a str,
    pub path: &'a Path,
}

impl LinkedSchema {
    pub fn query_type(&self) -> &ObjectType {
        &self.objects[self.query]
    }

    pub fn mutation_type(&self) -> Option<&ObjectType> {
        self.mutation.map(|id| &self.objects[id])
    }

    pub fn named_type_name<'a>(&'a self, named: &'a NamedType) -> &'a str {
        match named {
            NamedType::Primitive(pt) => pt.name(),
            NamedType::Enum(id) => &self.enums[*id].name,
            NamedType::Input(id) => &self.inputs[*id].name,
            NamedType::Object(id) => &self.objects[*id].name,
            NamedType::Interface(id) => &self.interfaces[*id].name,
            NamedType::Unknown(name) => name,
        }
    }

    /// The type as written in SDL, e.g. `[User!]!`
    pub fn type_display(&self, typ: &TypeReference) -> String {
        match typ {
            TypeReference::Named(named) => self.named_type_name(named).to_string(),
            TypeReference::NonNull(underlying) => format!("{}!", self.type_display(underlying)),
            TypeReference::List(underlying) => format!("[{}]", self.type_display(underlying)),
        }
    }

    /// Every resolver-backed field, in object then field declaration order
    pub fn resolver_bindings(&self) -> Vec<ResolverBinding<'_>> {
        self.objects
            .iter()
            .flat_map(|(_, object)| {
                object.fields.iter().filter_map(|field| {
                    field.resolver.as_deref().map(|path| ResolverBinding {
                        object: &object.name,
                        field: &field.name,
                        path,
                    })
                })
            })
            .collect()
    }

    /// Executables that served as resolvers in this schema
    pub fn resolver_paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self
            .resolver_bindings()
            .into_iter()
            .map(|binding| binding.path.to_path_buf())
            .collect();
        paths.sort();
        paths.dedup();
        paths
    }

    /// Take the named objects out of the schema.
    ///
    /// Fields typed as a removed object go with them, and an object or interface left without
    /// fields is removed in turn. Returns the names of every removed object and interface, or
    /// `None` (leaving the schema untouched) if the query type would have to go.
    pub fn remove_objects<'a>(
        &mut self,
        names: impl IntoIterator<Item = &'a str>,
    ) -> Option<Vec<String>> {
        let mut objects: HashSet<ObjectId> = names
            .into_iter()
            .filter_map(|name| self.objects.get_id(name))
            .collect();
        let mut interfaces: HashSet<InterfaceId> = HashSet::new();

        loop {
            let emptied_objects: Vec<ObjectId> = self
                .objects
                .iter()
                .filter(|(id, object)| {
                    !objects.contains(id)
                        && object
                            .fields
                            .iter()
                            .all(|field| references_removed(&field.typ, &objects, &interfaces))
                })
                .map(|(id, _)| id)
                .collect();
            let emptied_interfaces: Vec<InterfaceId> = self
                .interfaces
                .iter()
                .filter(|(id, interface)| {
                    !interfaces.contains(id)
                        && interface
                            .fields
                            .iter()
                            .all(|field| references_removed(&field.typ, &objects, &interfaces))
                })
                .map(|(id, _)| id)
                .collect();

            if emptied_objects.is_empty() && emptied_interfaces.is_empty() {
                break;
            }
            objects.extend(emptied_objects);
            interfaces.extend(emptied_interfaces);
        }

        if objects.contains(&self.query) {
            return None;
        }

        for (_, object) in self.objects.iter_mut() {
            object
                .fields
                .retain(|field| !references_removed(&field.typ, &objects, &interfaces));
            object.implements.retain(|id| !interfaces.contains(id));
        }
        for (_, interface) in self.interfaces.iter_mut() {
            interface
                .fields
                .retain(|field| !references_removed(&field.typ, &objects, &interfaces));
        }
        if self.mutation.is_some_and(|id| objects.contains(&id)) {
            self.mutation = None;
        }

        let object_names: Vec<String> = objects
            .iter()
            .map(|id| self.objects[*id].name.clone())
            .collect();
        let interface_names: Vec<String> = interfaces
            .iter()
            .map(|id| self.interfaces[*id].name.clone())
            .collect();
        for name in object_names.iter() {
            self.objects.remove(name);
        }
        for name in interface_names.iter() {
            self.interfaces.remove(name);
        }

        let mut removed = [object_names, interface_names].concat();
        removed.sort();
        Some(removed)
    }
}

fn references_removed(
    typ: &TypeReference,
    objects: &HashSet<ObjectId>,
    interfaces: &HashSet<InterfaceId>,
) -> bool {
    match typ.innermost() {
        NamedType::Object(id) => objects.contains(id),
        NamedType::Interface(id) => interfaces.contains(id),
        _ => false,
    }
}
