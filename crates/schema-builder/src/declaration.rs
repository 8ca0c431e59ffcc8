// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Declarations extracted from the document root, detached from the parser's positioned AST.

use async_graphql_parser::types::{
    EnumType, FieldDefinition, InputObjectType, InputValueDefinition, InterfaceType, ObjectType,
    Type, TypeDefinition, TypeKind,
};
use async_graphql_value::ConstValue;

#[derive(Debug, Clone)]
pub struct EnumDecl {
    pub name: String,
    pub description: Option<String>,
    pub values: Vec<EnumValueDecl>,
}

#[derive(Debug, Clone)]
pub struct EnumValueDecl {
    pub name: String,
    pub description: Option<String>,
}

/// An input field or a field argument
#[derive(Debug, Clone)]
pub struct InputValueDecl {
    pub name: String,
    pub description: Option<String>,
    pub typ: Type,
    pub default_value: Option<ConstValue>,
}

#[derive(Debug, Clone)]
pub struct InputDecl {
    pub name: String,
    pub description: Option<String>,
    pub fields: Vec<InputValueDecl>,
}

#[derive(Debug, Clone)]
pub struct FieldDecl {
    pub name: String,
    pub description: Option<String>,
    pub arguments: Vec<InputValueDecl>,
    pub typ: Type,
}

#[derive(Debug, Clone)]
pub struct ObjectDecl {
    pub name: String,
    pub description: Option<String>,
    pub implements: Vec<String>,
    pub fields: Vec<FieldDecl>,
}

#[derive(Debug, Clone)]
pub struct InterfaceDecl {
    pub name: String,
    pub description: Option<String>,
    pub fields: Vec<FieldDecl>,
}

/// A top-level declaration from a declaration file
#[derive(Debug, Clone)]
pub enum TypeDecl {
    Enum(EnumDecl),
    Input(InputDecl),
    Object(ObjectDecl),
    Interface(InterfaceDecl),
}

impl TypeDecl {
    pub fn name(&self) -> &str {
        match self {
            TypeDecl::Enum(decl) => &decl.name,
            TypeDecl::Input(decl) => &decl.name,
            TypeDecl::Object(decl) => &decl.name,
            TypeDecl::Interface(decl) => &decl.name,
        }
    }

    /// Convert a parsed type definition. Kinds without a counterpart here (scalars, unions) and
    /// type extensions yield `None`.
    pub fn from_definition(definition: &TypeDefinition) -> Option<TypeDecl> {
        if definition.extend {
            return None;
        }

        let name = definition.name.node.to_string();
        let description = definition.description.as_ref().map(|d| d.node.clone());

        match &definition.kind {
            TypeKind::Enum(EnumType { values, .. }) => Some(TypeDecl::Enum(EnumDecl {
                name,
                description,
                values: values
                    .iter()
                    .map(|value| EnumValueDecl {
                        name: value.node.value.node.to_string(),
                        description: value.node.description.as_ref().map(|d| d.node.clone()),
                    })
                    .collect(),
            })),
            TypeKind::InputObject(InputObjectType { fields, .. }) => Some(TypeDecl::Input(InputDecl {
                name,
                description,
                fields: fields
                    .iter()
                    .map(|field| InputValueDecl::from(&field.node))
                    .collect(),
            })),
            TypeKind::Object(ObjectType {
                implements, fields, ..
            }) => {
                Some(TypeDecl::Object(ObjectDecl {
                    name,
                    description,
                    implements: implements.iter().map(|i| i.node.to_string()).collect(),
                    fields: fields
                        .iter()
                        .map(|field| FieldDecl::from(&field.node))
                        .collect(),
                }))
            }
            TypeKind::Interface(InterfaceType { fields, .. }) => {
                Some(TypeDecl::Interface(InterfaceDecl {
                    name,
                    description,
                    fields: fields
                        .iter()
                        .map(|field| FieldDecl::from(&field.node))
                        .collect(),
                }))
            }
            TypeKind::Scalar | TypeKind::Union(_) => None,
        }
    }
}

impl From<&InputValueDefinition> for InputValueDecl {
    fn from(definition: &InputValueDefinition) -> Self {
        InputValueDecl {
            name: definition.name.node.to_string(),
            description: definition.description.as_ref().map(|d| d.node.clone()),
            typ: definition.ty.node.clone(),
            default_value: definition.default_value.as_ref().map(|v| v.node.clone()),
        }
    }
}

impl From<&FieldDefinition> for FieldDecl {
    fn from(definition: &FieldDefinition) -> Self {
        FieldDecl {
            name: definition.name.node.to_string(),
            description: definition.description.as_ref().map(|d| d.node.clone()),
            arguments: definition
                .arguments
                .iter()
                .map(|argument| InputValueDecl::from(&argument.node))
                .collect(),
            typ: definition.ty.node.clone(),
        }
    }
}
