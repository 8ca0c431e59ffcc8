// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    String,
    Int,
    Float,
    Boolean,
    Id,
    /// RFC 3339 timestamp, carried as a custom scalar
    DateTime,
}

impl PrimitiveType {
    pub const ALL: [PrimitiveType; 6] = [
        PrimitiveType::String,
        PrimitiveType::Int,
        PrimitiveType::Float,
        PrimitiveType::Boolean,
        PrimitiveType::Id,
        PrimitiveType::DateTime,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            PrimitiveType::String => "String",
            PrimitiveType::Int => "Int",
            PrimitiveType::Float => "Float",
            PrimitiveType::Boolean => "Boolean",
            PrimitiveType::Id => "ID",
            PrimitiveType::DateTime => "DateTime",
        }
    }

    pub fn from_name(name: &str) -> Option<PrimitiveType> {
        Self::ALL.into_iter().find(|pt| pt.name() == name)
    }

    /// Scalars that the query engine does not define itself
    pub fn is_custom_scalar(&self) -> bool {
        matches!(self, PrimitiveType::DateTime)
    }
}

impl Display for PrimitiveType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
