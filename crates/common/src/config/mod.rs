mod loader;
mod model;

pub use loader::{load_config, load_config_from_file, load_config_from_str};
pub use model::{
    BasicAuth, ConfigError, ContextConfig, ContextSource, DEFAULT_DISCOVERY_TIMEOUT,
    DEFAULT_MAX_BODY_SIZE, DEFAULT_RESOLVER_TIMEOUT, GraphConfig, RunAs, ServerConfig,
};
