// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::{sync::Arc, time::Duration};

use cgi_resolver::ContextGenerator;
use common::config::GraphConfig;
use notify_debouncer_full::{
    DebounceEventResult, Debouncer, RecommendedCache, new_debouncer,
    notify::{EventKind, RecommendedWatcher, RecursiveMode},
};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, error, info, warn};
use treeql_env::Environment;

use crate::{
    error::{GraphHostError, RouterError},
    publisher::{PublishedSchema, SchemaSlot},
    system_loader::SystemLoader,
};

const DEBOUNCE_TIMEOUT: Duration = Duration::from_millis(500);

/// One served directory tree: its configuration, the active schema and the means to rebuild it
pub struct GraphHost {
    config: GraphConfig,
    slot: SchemaSlot,
    context: Option<ContextGenerator>,
    env: Arc<dyn Environment>,
}

impl GraphHost {
    pub fn new(config: GraphConfig, env: Arc<dyn Environment>) -> Self {
        Self {
            context: ContextGenerator::from_graph(&config),
            config,
            slot: SchemaSlot::new(),
            env,
        }
    }

    /// Build the first schema. A failure is fatal unless hot reload is on, in which case the graph
    /// answers 503 until a rebuild succeeds.
    pub async fn start(
        config: GraphConfig,
        env: Arc<dyn Environment>,
    ) -> Result<Arc<Self>, GraphHostError> {
        let host = Arc::new(Self::new(config, env));

        if let Err(e) = host.rebuild().await {
            if !host.config.hot_reload {
                return Err(GraphHostError::InitialBuild {
                    graph: host.config.label(),
                    source: e,
                });
            }
            error!(
                graph = %host.config.label(),
                "Initial build failed, serving no schema until the tree is fixed: {e}"
            );
        }

        Ok(host)
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    pub fn context_generator(&self) -> Option<&ContextGenerator> {
        self.context.as_ref()
    }

    pub fn env(&self) -> &dyn Environment {
        self.env.as_ref()
    }

    pub async fn current(&self) -> Option<Arc<PublishedSchema>> {
        self.slot.current().await
    }

    /// Build a new schema from the tree and publish it. On failure the active schema stays in
    /// service.
    pub async fn rebuild(&self) -> Result<Arc<PublishedSchema>, RouterError> {
        let known_resolvers = match self.slot.current().await {
            Some(current) => current.linked.resolver_paths(),
            None => vec![],
        };

        let result = SystemLoader::load(&self.config, known_resolvers).await;

        match result {
            Ok((linked, executable)) => {
                let published = self.slot.publish(linked, executable).await;
                let linked = &published.linked;
                info!(
                    graph = %self.config.label(),
                    generation = published.generation,
                    query_fields = linked.query_type().fields.len(),
                    mutation_fields = linked.mutation_type().map(|m| m.fields.len()).unwrap_or(0),
                    resolvers = linked.resolver_bindings().len(),
                    "Published schema"
                );
                Ok(published)
            }
            Err(e) => {
                error!(graph = %self.config.label(), "Schema build failed: {e}");
                Err(e)
            }
        }
    }

    /// Rebuild whenever something changes under the document root. Watching stops when the
    /// returned watcher is dropped.
    pub fn watch(self: &Arc<Self>) -> Result<SchemaWatcher, GraphHostError> {
        let watch_error = |source| GraphHostError::Watch {
            graph: self.config.label(),
            source,
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let mut debouncer = new_debouncer(
            DEBOUNCE_TIMEOUT,
            None,
            move |result: DebounceEventResult| {
                // The receiver is gone only once the watcher is being dropped
                let _ = tx.send(result);
            },
        )
        .map_err(watch_error)?;
        debouncer
            .watch(&self.config.document_root, RecursiveMode::Recursive)
            .map_err(watch_error)?;

        info!(
            graph = %self.config.label(),
            root = %self.config.document_root.display(),
            "Watching for changes"
        );

        let task = tokio::spawn(rebuild_on_change(self.clone(), rx));

        Ok(SchemaWatcher {
            _debouncer: debouncer,
            task,
        })
    }
}

async fn rebuild_on_change(
    host: Arc<GraphHost>,
    mut rx: mpsc::UnboundedReceiver<DebounceEventResult>,
) {
    while let Some(result) = rx.recv().await {
        let mut relevant = is_relevant(&host, result);
        // Coalesce whatever else arrived while the previous rebuild ran
        while let Ok(result) = rx.try_recv() {
            relevant |= is_relevant(&host, result);
        }

        if relevant {
            // Failures are logged by `rebuild`; the previous schema stays active
            let _ = host.rebuild().await;
        }
    }
}

fn is_relevant(host: &GraphHost, result: DebounceEventResult) -> bool {
    match result {
        Ok(events) => {
            let relevant = events
                .iter()
                .any(|event| !matches!(event.kind, EventKind::Access(_)));
            if relevant {
                debug!(
                    graph = %host.config.label(),
                    paths = ?events.iter().flat_map(|event| event.paths.iter()).collect::<Vec<_>>(),
                    "Change detected"
                );
            }
            relevant
        }
        Err(errors) => {
            for e in errors {
                warn!(graph = %host.config.label(), "Watch error: {e}");
            }
            false
        }
    }
}

pub struct SchemaWatcher {
    _debouncer: Debouncer<RecommendedWatcher, RecommendedCache>,
    task: JoinHandle<()>,
}

impl Drop for SchemaWatcher {
    fn drop(&mut self) {
        self.task.abort();
    }
}
