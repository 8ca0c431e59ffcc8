// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! The per-request context file.
//!
//! When a graph configures a context source, its output is written once per request to a
//! temporary file. Every resolver the request invokes can read it from descriptor 3.

use std::{
    fs::File,
    io::Write,
    path::{Path, PathBuf},
    time::Duration,
};

use common::config::{ContextConfig, ContextSource, GraphConfig, RunAs};
use tempfile::NamedTempFile;
use tokio::process::Command;
use tracing::debug;

use crate::{
    environment::CgiEnvironment,
    error::ResolverError,
    process::{run, stderr_text},
};

/// A request's context, removed from disk when dropped
#[derive(Debug)]
pub struct ContextFile {
    file: NamedTempFile,
}

impl ContextFile {
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// A fresh handle with its own read offset
    pub fn reopen(&self) -> std::io::Result<File> {
        self.file.reopen()
    }
}

#[derive(Debug, Clone)]
pub struct ContextGenerator {
    source: ContextSource,
    tmp_dir: Option<PathBuf>,
    working_dir: PathBuf,
    timeout: Duration,
    run_as: Option<RunAs>,
}

impl ContextGenerator {
    pub fn new(
        config: &ContextConfig,
        working_dir: PathBuf,
        timeout: Duration,
        run_as: Option<RunAs>,
    ) -> Self {
        Self {
            source: config.source.clone(),
            tmp_dir: config.tmp_dir.clone(),
            working_dir,
            timeout,
            run_as,
        }
    }

    pub fn from_graph(graph: &GraphConfig) -> Option<Self> {
        graph.context.as_ref().map(|context| {
            Self::new(
                context,
                graph.resolver_dir.clone(),
                graph.resolver_timeout,
                graph.run_as,
            )
        })
    }

    pub async fn generate(&self, environment: &CgiEnvironment) -> Result<ContextFile, ResolverError> {
        let contents = match &self.source {
            ContextSource::Value(value) => serde_json::to_vec(value)
                .map_err(|e| ResolverError::Context(e.to_string()))?,
            ContextSource::Exec(path) => self.execute(path, environment).await?,
        };

        let mut builder = tempfile::Builder::new();
        builder.prefix("treeql-ctx-");
        let mut file = match &self.tmp_dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
        .map_err(|e| ResolverError::Context(format!("could not create the context file: {e}")))?;

        file.write_all(&contents)?;
        file.flush()?;

        debug!(path = %file.path().display(), bytes = contents.len(), "Wrote request context");

        Ok(ContextFile { file })
    }

    async fn execute(
        &self,
        path: &Path,
        environment: &CgiEnvironment,
    ) -> Result<Vec<u8>, ResolverError> {
        let script_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut command = Command::new(path);
        command
            .env_clear()
            .envs(environment.for_script(&script_name, &path.to_string_lossy()))
            .current_dir(&self.working_dir);
        if let Some(run_as) = &self.run_as {
            command.uid(run_as.uid).gid(run_as.gid);
        }

        let output = run(command, None, path, self.timeout)
            .await
            .map_err(|e| ResolverError::Context(e.to_string()))?;

        if !output.status.success() {
            return Err(ResolverError::Context(format!(
                "{} exited with {}: {}",
                path.display(),
                output.status,
                stderr_text(&output)
            )));
        }

        Ok(output.stdout)
    }
}
