// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use async_graphql::dynamic::Schema;
use core_model::schema::LinkedSchema;
use tokio::sync::RwLock;

/// A complete schema, ready to serve requests
pub struct PublishedSchema {
    /// Increases with every publication, starting at 1
    pub generation: u64,
    pub linked: LinkedSchema,
    pub executable: Schema,
}

/// The single slot holding the active schema.
///
/// Requests take a shared lock only long enough to clone the `Arc`, so an operation keeps
/// executing against the schema it started with even if a new one is published meanwhile.
#[derive(Default)]
pub struct SchemaSlot {
    current: RwLock<Option<Arc<PublishedSchema>>>,
    generation: AtomicU64,
}

impl SchemaSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn current(&self) -> Option<Arc<PublishedSchema>> {
        self.current.read().await.clone()
    }

    /// Replace the active schema
    pub async fn publish(&self, linked: LinkedSchema, executable: Schema) -> Arc<PublishedSchema> {
        let published = Arc::new(PublishedSchema {
            generation: self.generation.fetch_add(1, Ordering::SeqCst) + 1,
            linked,
            executable,
        });

        *self.current.write().await = Some(published.clone());
        published
    }
}

#[cfg(test)]
mod tests {
    use async_graphql::{
        Value,
        dynamic::{Field, FieldFuture, Object, TypeRef},
    };
    use core_model::{mapped_arena::MappedArena, types::ObjectType};

    use super::*;

    fn linked() -> LinkedSchema {
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
        LinkedSchema {
            enums: MappedArena::default(),
            inputs: MappedArena::default(),
            objects,
            interfaces: MappedArena::default(),
            query,
            mutation: None,
        }
    }

    fn executable(version: i32) -> Schema {
        Schema::build("Query", None, None)
            .register(Object::new("Query").field(Field::new(
                "version",
                TypeRef::named_nn(TypeRef::INT),
                move |_| {
                    FieldFuture::new(async move {
                        Ok(Some(async_graphql::dynamic::FieldValue::value(version)))
                    })
                },
            )))
            .finish()
            .unwrap()
    }

    async fn version(slot: &SchemaSlot) -> Value {
        slot.current()
            .await
            .unwrap()
            .executable
            .execute("{ version }")
            .await
            .data
    }

    #[tokio::test]
    async fn publishing_swaps_the_active_schema() {
        let slot = SchemaSlot::new();
        assert!(slot.current().await.is_none());

        let first = slot.publish(linked(), executable(1)).await;
        assert_eq!(first.generation, 1);
        assert_eq!(
            version(&slot).await.into_json().unwrap(),
            serde_json::json!({"version": 1})
        );

        // A request holding the previous schema keeps using it
        let in_flight = slot.current().await.unwrap();

        let second = slot.publish(linked(), executable(2)).await;
        assert_eq!(second.generation, 2);
        assert_eq!(
            version(&slot).await.into_json().unwrap(),
            serde_json::json!({"version": 2})
        );
        assert_eq!(
            in_flight
                .executable
                .execute("{ version }")
                .await
                .data
                .into_json()
                .unwrap(),
            serde_json::json!({"version": 1})
        );
    }
}
