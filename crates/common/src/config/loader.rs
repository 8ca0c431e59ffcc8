use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;
use tracing::{debug, info};
use treeql_env::Environment;

use crate::env_const::*;

use super::model::{
    BasicAuth, ConfigError, ContextConfig, ContextSource, DEFAULT_DISCOVERY_TIMEOUT,
    DEFAULT_MAX_BODY_SIZE, DEFAULT_RESOLVER_TIMEOUT, GraphConfig, RunAs, ServerConfig,
};

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigSer {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub hot: Option<bool>,
    pub graphiql: Option<bool>,
    #[serde(default)]
    pub graphs: Vec<GraphSer>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct GraphSer {
    pub server_name: Option<String>,
    pub root: PathBuf,
    pub resolver_dir: Option<PathBuf>,
    pub hot: Option<bool>,
    pub graphiql: Option<bool>,
    pub max_body_size: Option<usize>,
    pub resolver_timeout_secs: Option<u64>,
    pub discovery_timeout_secs: Option<u64>,
    pub basic_auth: Option<BasicAuthSer>,
    pub context: Option<ContextSer>,
    pub run_as: Option<RunAsSer>,
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
pub struct BasicAuthSer {
    pub username: String,
    pub password: String,
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct ContextSer {
    pub exec: Option<PathBuf>,
    pub value: Option<toml::Value>,
    pub tmp_dir: Option<PathBuf>,
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
pub struct RunAsSer {
    pub uid: u32,
    pub gid: u32,
}

/// Server-wide settings applied to each graph that does not override them
struct GraphDefaults {
    hot: bool,
    graphiql: bool,
}

impl GraphSer {
    fn into_config(self, defaults: &GraphDefaults) -> Result<GraphConfig, ConfigError> {
        let document_root = absolute(&self.root)?;
        let resolver_dir = match self.resolver_dir {
            Some(dir) => absolute(&dir)?,
            None => document_root.clone(),
        };

        Ok(GraphConfig {
            server_name: self.server_name,
            document_root,
            resolver_dir,
            hot_reload: self.hot.unwrap_or(defaults.hot),
            graphiql: self.graphiql.unwrap_or(defaults.graphiql),
            max_body_size: self.max_body_size.unwrap_or(DEFAULT_MAX_BODY_SIZE),
            resolver_timeout: self
                .resolver_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_RESOLVER_TIMEOUT),
            discovery_timeout: self
                .discovery_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_DISCOVERY_TIMEOUT),
            basic_auth: self.basic_auth.map(BasicAuth::from),
            context: self.context.map(ContextConfig::try_from).transpose()?,
            run_as: self.run_as.map(RunAs::from),
        })
    }
}

impl From<BasicAuthSer> for BasicAuth {
    fn from(auth: BasicAuthSer) -> Self {
        BasicAuth {
            username: auth.username,
            password: auth.password,
        }
    }
}

impl From<RunAsSer> for RunAs {
    fn from(run_as: RunAsSer) -> Self {
        RunAs {
            uid: run_as.uid,
            gid: run_as.gid,
        }
    }
}

impl TryFrom<ContextSer> for ContextConfig {
    type Error = ConfigError;

    fn try_from(context: ContextSer) -> Result<Self, Self::Error> {
        let source = match (context.exec, context.value) {
            (Some(exec), None) => ContextSource::Exec(absolute(&exec)?),
            (None, Some(value)) => ContextSource::Value(
                serde_json::to_value(value).map_err(|e| ConfigError::Invalid(e.to_string()))?,
            ),
            _ => {
                return Err(ConfigError::Invalid(
                    "context must set exactly one of 'exec' or 'value'".to_string(),
                ));
            }
        };

        Ok(ContextConfig {
            source,
            tmp_dir: context.tmp_dir.as_deref().map(absolute).transpose()?,
        })
    }
}

/// Load the server configuration.
///
/// If `TREEQL_CONFIG` is set, the named TOML file is read (server host and port may still be
/// overridden from the environment). Otherwise a single graph is described by `TREEQL_*`
/// variables.
pub fn load_config(env: &dyn Environment) -> Result<ServerConfig, ConfigError> {
    let config = match env.get_path(TREEQL_CONFIG) {
        Some(path) => {
            info!(path = %path.display(), "Loading configuration file");
            load_config_from_file(&path, env)?
        }
        None => {
            debug!("{TREEQL_CONFIG} is not set, describing a single graph from the environment");
            load_config_from_env(env)?
        }
    };

    for graph in &config.graphs {
        debug!(
            graph = %graph.label(),
            root = %graph.document_root.display(),
            hot_reload = graph.hot_reload,
            "Configured graph"
        );
    }

    Ok(config)
}

pub fn load_config_from_file(path: &Path, env: &dyn Environment) -> Result<ServerConfig, ConfigError> {
    let toml_str = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    load_config_from_str(&toml_str, env).map_err(|e| match e {
        ConfigError::Toml { source, .. } => ConfigError::Toml {
            path: path.to_path_buf(),
            source,
        },
        e => e,
    })
}

pub fn load_config_from_str(toml_str: &str, env: &dyn Environment) -> Result<ServerConfig, ConfigError> {
    let config: ConfigSer = toml::from_str(toml_str).map_err(|source| ConfigError::Toml {
        path: PathBuf::new(),
        source,
    })?;

    if config.graphs.is_empty() {
        return Err(ConfigError::Invalid(
            "at least one [[graphs]] entry is required".to_string(),
        ));
    }

    let defaults = GraphDefaults {
        hot: config.hot.unwrap_or(false),
        graphiql: config.graphiql.unwrap_or(false),
    };

    let graphs = config
        .graphs
        .into_iter()
        .map(|graph| graph.into_config(&defaults))
        .collect::<Result<Vec<_>, _>>()?;

    let host = match env.get(TREEQL_SERVER_HOST) {
        Some(host) => host,
        None => config.host.unwrap_or(DEFAULT_SERVER_HOST.to_string()),
    };
    let port = match env.get_parsed::<u16>(TREEQL_SERVER_PORT)? {
        Some(port) => port,
        None => config.port.unwrap_or(DEFAULT_SERVER_PORT),
    };

    validated(ServerConfig {
        host,
        port,
        graphql_http_path: get_graphql_http_path(env),
        graphiql_http_path: get_graphiql_http_path(env),
        graphs,
    })
}

fn load_config_from_env(env: &dyn Environment) -> Result<ServerConfig, ConfigError> {
    let document_root = absolute(&env.get_path(TREEQL_ROOT).unwrap_or_else(|| {
        debug!("{TREEQL_ROOT} is not set, using {DEFAULT_ROOT}");
        PathBuf::from(DEFAULT_ROOT)
    }))?;
    let resolver_dir = match env.get_path(TREEQL_RESOLVER_DIR) {
        Some(dir) => absolute(&dir)?,
        None => document_root.clone(),
    };

    let basic_auth = match (
        env.get(TREEQL_BASIC_AUTH_USERNAME),
        env.get(TREEQL_BASIC_AUTH_PASSWORD),
    ) {
        (Some(username), Some(password)) => Some(BasicAuth { username, password }),
        (None, None) => None,
        _ => {
            return Err(ConfigError::Invalid(format!(
                "{TREEQL_BASIC_AUTH_USERNAME} and {TREEQL_BASIC_AUTH_PASSWORD} must be set together"
            )));
        }
    };

    let context = match env.get_path(TREEQL_CTX_EXEC_PATH) {
        Some(exec) => Some(ContextConfig {
            source: ContextSource::Exec(absolute(&exec)?),
            tmp_dir: env
                .get_path(TREEQL_CTX_FILES_DIR)
                .as_deref()
                .map(absolute)
                .transpose()?,
        }),
        None => None,
    };

    let graph = GraphConfig {
        server_name: env.get(TREEQL_SERVER_NAME).filter(|name| !name.is_empty()),
        document_root,
        resolver_dir,
        hot_reload: env.enabled(TREEQL_HOT, false)?,
        graphiql: env.enabled(TREEQL_GRAPHIQL, false)?,
        max_body_size: env
            .get_parsed::<usize>(TREEQL_MAX_BODY_SIZE)?
            .unwrap_or(DEFAULT_MAX_BODY_SIZE),
        resolver_timeout: env
            .get_duration_secs(TREEQL_RESOLVER_TIMEOUT_SECS)?
            .unwrap_or(DEFAULT_RESOLVER_TIMEOUT),
        discovery_timeout: env
            .get_duration_secs(TREEQL_DISCOVERY_TIMEOUT_SECS)?
            .unwrap_or(DEFAULT_DISCOVERY_TIMEOUT),
        basic_auth,
        context,
        run_as: None,
    };

    validated(ServerConfig {
        host: env.get_or_else(TREEQL_SERVER_HOST, DEFAULT_SERVER_HOST),
        port: env
            .get_parsed::<u16>(TREEQL_SERVER_PORT)?
            .unwrap_or(DEFAULT_SERVER_PORT),
        graphql_http_path: get_graphql_http_path(env),
        graphiql_http_path: get_graphiql_http_path(env),
        graphs: vec![graph],
    })
}

fn validated(config: ServerConfig) -> Result<ServerConfig, ConfigError> {
    if config.graphs.len() > 1 {
        if let Some(unnamed) = config.graphs.iter().find(|g| g.server_name.is_none()) {
            return Err(ConfigError::Invalid(format!(
                "graph rooted at '{}' needs a server-name when more than one graph is served",
                unnamed.document_root.display()
            )));
        }
    }

    for graph in &config.graphs {
        if graph.resolver_timeout.is_zero() || graph.discovery_timeout.is_zero() {
            return Err(ConfigError::Invalid(format!(
                "timeouts for '{}' must be at least one second",
                graph.label()
            )));
        }
    }

    if config.graphql_http_path == config.graphiql_http_path {
        return Err(ConfigError::Invalid(format!(
            "GraphQL and GraphiQL cannot share the path '{}'",
            config.graphql_http_path
        )));
    }

    Ok(config)
}

fn absolute(path: &Path) -> Result<PathBuf, ConfigError> {
    std::path::absolute(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}
