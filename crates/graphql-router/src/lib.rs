// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Serves GraphQL over a directory tree without depending on any specific web framework.
//!
//! Each configured graph is a [`GraphHost`]: it builds a schema from its document root, publishes
//! it, and (with hot reload) rebuilds whenever the tree changes. [`GraphQLRouter`] picks the graph
//! for a request and executes the operation against the schema active at that moment.

mod error;
mod executable_schema;
mod graph_host;
mod graphql_router;
mod publisher;
mod request_data;
mod system_loader;

pub use error::{GraphHostError, RouterError};
pub use executable_schema::build_executable_schema;
pub use graph_host::{GraphHost, SchemaWatcher};
pub use graphql_router::GraphQLRouter;
pub use publisher::{PublishedSchema, SchemaSlot};
pub use request_data::RequestData;
