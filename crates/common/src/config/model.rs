use std::{path::PathBuf, time::Duration};

use thiserror::Error;
use treeql_env::EnvError;

use crate::http::host_without_port;

pub const DEFAULT_MAX_BODY_SIZE: usize = 1024 * 1024;
pub const DEFAULT_RESOLVER_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub graphql_http_path: String,
    pub graphiql_http_path: String,
    pub graphs: Vec<GraphConfig>,
}

impl ServerConfig {
    /// The graph serving `host` (a `Host` header value, port allowed).
    ///
    /// A lone graph without a server name serves every host.
    pub fn graph_for_host(&self, host: Option<&str>) -> Option<&GraphConfig> {
        self.graph_index_for_host(host)
            .map(|index| &self.graphs[index])
    }

    /// Position in `graphs` of the graph serving `host`
    pub fn graph_index_for_host(&self, host: Option<&str>) -> Option<usize> {
        match self.graphs.as_slice() {
            [only] if only.server_name.is_none() => Some(0),
            graphs => {
                let host = host_without_port(host?);
                graphs.iter().position(|graph| graph.matches_host(host))
            }
        }
    }
}

/// Everything needed to serve one directory tree
#[derive(Debug, Clone, PartialEq)]
pub struct GraphConfig {
    pub server_name: Option<String>,
    pub document_root: PathBuf,
    /// Working directory of resolver processes
    pub resolver_dir: PathBuf,
    pub hot_reload: bool,
    pub graphiql: bool,
    pub max_body_size: usize,
    pub resolver_timeout: Duration,
    pub discovery_timeout: Duration,
    pub basic_auth: Option<BasicAuth>,
    pub context: Option<ContextConfig>,
    pub run_as: Option<RunAs>,
}

impl GraphConfig {
    pub fn new(document_root: PathBuf) -> Self {
        Self {
            server_name: None,
            resolver_dir: document_root.clone(),
            document_root,
            hot_reload: false,
            graphiql: false,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            resolver_timeout: DEFAULT_RESOLVER_TIMEOUT,
            discovery_timeout: DEFAULT_DISCOVERY_TIMEOUT,
            basic_auth: None,
            context: None,
            run_as: None,
        }
    }

    pub fn matches_host(&self, host: &str) -> bool {
        match &self.server_name {
            Some(server_name) => server_name.eq_ignore_ascii_case(host_without_port(host)),
            None => true,
        }
    }

    /// A short label for log lines
    pub fn label(&self) -> String {
        match &self.server_name {
            Some(server_name) => server_name.clone(),
            None => self.document_root.display().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicAuth {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContextConfig {
    pub source: ContextSource,
    /// Directory for the per-request context files (the system temp dir if unset)
    pub tmp_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ContextSource {
    /// An executable run once per request; its stdout is the context
    Exec(PathBuf),
    /// A fixed JSON document
    Value(serde_json::Value),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunAs {
    pub uid: u32,
    pub gid: u32,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error(transparent)]
    Env(#[from] EnvError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(server_name: Option<&str>) -> GraphConfig {
        GraphConfig {
            server_name: server_name.map(str::to_string),
            ..GraphConfig::new(PathBuf::from("/srv"))
        }
    }

    fn server(graphs: Vec<GraphConfig>) -> ServerConfig {
        ServerConfig {
            host: "0.0.0.0".to_string(),
            port: 8080,
            graphql_http_path: "/".to_string(),
            graphiql_http_path: "/graphiql".to_string(),
            graphs,
        }
    }

    #[test]
    fn single_anonymous_graph_serves_every_host() {
        let config = server(vec![graph(None)]);
        assert!(config.graph_for_host(Some("anything:1234")).is_some());
        assert!(config.graph_for_host(None).is_some());
    }

    #[test]
    fn named_graphs_are_selected_by_host() {
        let config = server(vec![
            graph(Some("one.localhost")),
            graph(Some("two.localhost")),
        ]);

        let selected = config.graph_for_host(Some("TWO.localhost:8080")).unwrap();
        assert_eq!(selected.server_name.as_deref(), Some("two.localhost"));
        assert!(config.graph_for_host(Some("three.localhost")).is_none());
        assert!(config.graph_for_host(None).is_none());
    }
}
