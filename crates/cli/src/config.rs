//! Optional TOML configuration.
//!
//! ```toml
//! [answers]
//! prefix = "Q"
//! min_index = 1
//! max_index = 95
//!
//! [server]
//! rate_limit = 60
//! rate_limit_window_secs = 60
//! ```
//!
//! Every key is optional. The server additionally honours `TALLY_RATE_LIMIT`
//! and `TALLY_API_KEY` from the environment.

use std::path::Path;

use serde::Deserialize;
use tally_core::AnswerDomain;

/// Default rate limit: 60 requests per window per IP.
const DEFAULT_RATE_LIMIT: u64 = 60;

/// Default rate limit window in seconds.
const DEFAULT_RATE_LIMIT_WINDOW_SECS: u64 = 60;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct Config {
    pub(crate) answers: AnswerDomain,
    pub(crate) server: ServerConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct ServerConfig {
    pub(crate) rate_limit: u64,
    pub(crate) rate_limit_window_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            rate_limit: DEFAULT_RATE_LIMIT,
            rate_limit_window_secs: DEFAULT_RATE_LIMIT_WINDOW_SECS,
        }
    }
}

impl ServerConfig {
    /// Apply `TALLY_RATE_LIMIT` if it is set to a valid number.
    pub(crate) fn with_env_overrides(mut self) -> Self {
        if let Some(limit) = std::env::var("TALLY_RATE_LIMIT")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
        {
            self.rate_limit = limit;
        }
        self
    }
}

/// Read the config file at `path`, or the defaults when no path is given.
///
/// Returns a human-readable error string on failure.
pub(crate) fn load(path: Option<&Path>) -> Result<Config, String> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("could not read '{}': {}", path.display(), e))?;
    parse(&content).map_err(|e| format!("could not parse '{}': {}", path.display(), e))
}

fn parse(content: &str) -> Result<Config, String> {
    let config: Config = toml::from_str(content).map_err(|e| e.to_string())?;
    let domain = &config.answers;
    if domain.prefix.is_empty() {
        return Err("answers.prefix must not be empty".to_string());
    }
    if domain.min_index > domain.max_index {
        return Err(format!(
            "answers.min_index ({}) is greater than answers.max_index ({})",
            domain.min_index, domain.max_index
        ));
    }
    if config.server.rate_limit_window_secs == 0 {
        return Err("server.rate_limit_window_secs must be positive".to_string());
    }
    Ok(config)
}
