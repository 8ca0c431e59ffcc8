// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! The linked type graph produced from a document root.
//!
//! Types live in one [`MappedArena`](mapped_arena::MappedArena) per kind and refer to each other
//! by arena index, so cyclic references (`User.comments: [Comment]`, `Comment.author: User`) need
//! no special treatment once every type has been allocated.

pub mod mapped_arena;
pub mod primitive_type;
pub mod schema;
pub mod sdl;
pub mod types;
