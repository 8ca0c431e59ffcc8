// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Deterministic SDL rendering of a [`LinkedSchema`].
//!
//! Types are printed by kind (enums, inputs, interfaces, objects), each kind sorted by name;
//! fields keep their declaration order. Resolver-backed fields carry a trailing
//! `# resolver: <path>` comment so that two renderings compare equal only if the bindings match
//! too.

use std::fmt::{self, Display, Formatter};

use crate::{
    mapped_arena::MappedArena,
    schema::LinkedSchema,
    types::{Argument, TypeReference},
};

pub struct Sdl<'a>(&'a LinkedSchema);

impl LinkedSchema {
    pub fn sdl(&self) -> Sdl<'_> {
        Sdl(self)
    }

    pub fn to_sdl(&self) -> String {
        self.sdl().to_string()
    }
}

fn sorted_by_name<T>(arena: &MappedArena<T>, name: fn(&T) -> &str) -> Vec<&T> {
    let mut values: Vec<_> = arena.iter().map(|(_, value)| value).collect();
    values.sort_by(|a, b| name(a).cmp(name(b)));
    values
}

impl Sdl<'_> {
    fn write_arguments(&self, f: &mut Formatter<'_>, arguments: &[Argument]) -> fmt::Result {
        if arguments.is_empty() {
            return Ok(());
        }
        f.write_str("(")?;
        for (i, argument) in arguments.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}: {}", argument.name, self.typ(&argument.typ))?;
            if let Some(default_value) = &argument.default_value {
                write!(f, " = {default_value}")?;
            }
        }
        f.write_str(")")
    }

    fn typ(&self, typ: &TypeReference) -> String {
        self.0.type_display(typ)
    }
}

impl Display for Sdl<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let schema = self.0;

        for enum_type in sorted_by_name(&schema.enums, |t| t.name.as_str()) {
            writeln!(f, "enum {} {{", enum_type.name)?;
            for value in &enum_type.values {
                writeln!(f, "  {}", value.name)?;
            }
            writeln!(f, "}}\n")?;
        }

        for input in sorted_by_name(&schema.inputs, |t| t.name.as_str()) {
            writeln!(f, "input {} {{", input.name)?;
            for field in &input.fields {
                write!(f, "  {}: {}", field.name, self.typ(&field.typ))?;
                if let Some(default_value) = &field.default_value {
                    write!(f, " = {default_value}")?;
                }
                writeln!(f)?;
            }
            writeln!(f, "}}\n")?;
        }

        for interface in sorted_by_name(&schema.interfaces, |t| t.name.as_str()) {
            writeln!(f, "interface {} {{", interface.name)?;
            for field in &interface.fields {
                write!(f, "  {}", field.name)?;
                self.write_arguments(f, &field.arguments)?;
                writeln!(f, ": {}", self.typ(&field.typ))?;
            }
            writeln!(f, "}}\n")?;
        }

        for object in sorted_by_name(&schema.objects, |t| t.name.as_str()) {
            write!(f, "type {}", object.name)?;
            if !object.implements.is_empty() {
                let names: Vec<_> = object
                    .implements
                    .iter()
                    .map(|id| schema.interfaces[*id].name.as_str())
                    .collect();
                write!(f, " implements {}", names.join(" & "))?;
            }
            writeln!(f, " {{")?;
            for field in &object.fields {
                write!(f, "  {}", field.name)?;
                self.write_arguments(f, &field.arguments)?;
                write!(f, ": {}", self.typ(&field.typ))?;
                if let Some(resolver) = &field.resolver {
                    write!(f, " # resolver: {}", resolver.display())?;
                }
                writeln!(f)?;
            }
            writeln!(f, "}}\n")?;
        }

        writeln!(f, "schema {{")?;
        writeln!(f, "  query: {}", schema.query_type().name)?;
        if let Some(mutation) = schema.mutation_type() {
            writeln!(f, "  mutation: {}", mutation.name)?;
        }
        writeln!(f, "}}")
    }
}
