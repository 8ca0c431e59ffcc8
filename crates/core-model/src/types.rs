// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::path::PathBuf;

use async_graphql_value::ConstValue;

use crate::{mapped_arena::SlabIndex, primitive_type::PrimitiveType};

pub type EnumId = SlabIndex<EnumType>;
pub type InputId = SlabIndex<InputType>;
pub type ObjectId = SlabIndex<ObjectType>;
pub type InterfaceId = SlabIndex<InterfaceType>;

/// The innermost type of a field, argument or input field
#[derive(Debug, Clone, PartialEq)]
pub enum NamedType {
    Primitive(PrimitiveType),
    Enum(EnumId),
    Input(InputId),
    Object(ObjectId),
    Interface(InterfaceId),
    /// A reference recorded before its target was instantiated. Never present in a built schema.
    Unknown(String),
}

impl NamedType {
    /// May appear as an argument or input field type
    pub fn is_input(&self) -> bool {
        matches!(
            self,
            NamedType::Primitive(_) | NamedType::Enum(_) | NamedType::Input(_)
        )
    }

    /// May appear as the type of an object or interface field
    pub fn is_output(&self) -> bool {
        !matches!(self, NamedType::Input(_) | NamedType::Unknown(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeReference {
    Named(NamedType),
    NonNull(Box<TypeReference>),
    List(Box<TypeReference>),
}

impl TypeReference {
    pub fn innermost(&self) -> &NamedType {
        match self {
            TypeReference::Named(named) => named,
            TypeReference::NonNull(underlying) | TypeReference::List(underlying) => {
                underlying.innermost()
            }
        }
    }

    pub fn is_non_null(&self) -> bool {
        matches!(self, TypeReference::NonNull(_))
    }

    /// The type without its outermost non-null marker
    pub fn nullable(&self) -> &TypeReference {
        match self {
            TypeReference::NonNull(underlying) => underlying,
            other => other,
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self.nullable(), TypeReference::List(_))
    }

    /// No placeholder remains anywhere in the type
    pub fn is_complete(&self) -> bool {
        !matches!(self.innermost(), NamedType::Unknown(_))
    }

    pub fn shape(&self) -> WrapperShape {
        let mut modifiers = vec![];
        let mut current = self;
        loop {
            match current {
                TypeReference::Named(_) => break,
                TypeReference::NonNull(underlying) => {
                    modifiers.push(TypeModifier::NonNull);
                    current = underlying;
                }
                TypeReference::List(underlying) => {
                    modifiers.push(TypeModifier::List);
                    current = underlying;
                }
            }
        }
        WrapperShape { modifiers }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeModifier {
    List,
    NonNull,
}

/// The list/non-null composition around a named type, outermost modifier first.
///
/// `[User!]!` is `[NonNull, List, NonNull]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WrapperShape {
    pub modifiers: Vec<TypeModifier>,
}

impl WrapperShape {
    pub fn wrap(&self, named: NamedType) -> TypeReference {
        self.modifiers
            .iter()
            .rev()
            .fold(TypeReference::Named(named), |acc, modifier| match modifier {
                TypeModifier::List => TypeReference::List(Box::new(acc)),
                TypeModifier::NonNull => TypeReference::NonNull(Box::new(acc)),
            })
    }
}

#[derive(Debug, Clone)]
pub struct EnumType {
    pub name: String,
    pub description: Option<String>,
    pub values: Vec<EnumValue>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumValue {
    pub name: String,
    pub description: Option<String>,
    /// Position in the declaration
    pub ordinal: usize,
}

impl EnumType {
    pub fn value_by_name(&self, name: &str) -> Option<&EnumValue> {
        self.values.iter().find(|value| value.name == name)
    }

    pub fn value_by_ordinal(&self, ordinal: usize) -> Option<&EnumValue> {
        self.values.get(ordinal)
    }
}

#[derive(Debug, Clone)]
pub struct InputType {
    pub name: String,
    pub description: Option<String>,
    pub fields: Vec<InputField>,
}

#[derive(Debug, Clone)]
pub struct InputField {
    pub name: String,
    pub description: Option<String>,
    pub typ: TypeReference,
    pub default_value: Option<ConstValue>,
}

#[derive(Debug, Clone)]
pub struct Argument {
    pub name: String,
    pub description: Option<String>,
    pub typ: TypeReference,
    pub default_value: Option<ConstValue>,
}

#[derive(Debug, Clone)]
pub struct ObjectField {
    pub name: String,
    pub description: Option<String>,
    pub arguments: Vec<Argument>,
    pub typ: TypeReference,
    /// The executable producing this field's value. Fields without one read their value from
    /// the parent object.
    pub resolver: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ObjectType {
    pub name: String,
    pub description: Option<String>,
    pub fields: Vec<ObjectField>,
    pub implements: Vec<InterfaceId>,
}

impl ObjectType {
    pub fn field(&self, name: &str) -> Option<&ObjectField> {
        self.fields.iter().find(|field| field.name == name)
    }
}

#[derive(Debug, Clone)]
pub struct InterfaceField {
    pub name: String,
    pub description: Option<String>,
    pub arguments: Vec<Argument>,
    pub typ: TypeReference,
}

#[derive(Debug, Clone)]
pub struct InterfaceType {
    pub name: String,
    pub description: Option<String>,
    pub fields: Vec<InterfaceField>,
}
