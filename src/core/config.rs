//! # Configuration
//!
//! Centralizes all settings with a clear override hierarchy:
//! defaults → config file → env vars → CLI flags.
//!
//! Config lives at `~/.cortex-chat/config.toml`. If missing on first run, a
//! commented-out default is generated so users can discover all options.
//!
//! Credentials are the only required values. Without a PAT and an account
//! URL the app cannot talk to anything, so [`resolve`] fails before any
//! client is built.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

// ============================================================================
// Config Structs (all fields Option<T> for sparse TOML)
// ============================================================================

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct CortexConfig {
    #[serde(default)]
    pub account: AccountConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub network: NetworkConfig,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct AccountConfig {
    pub pat: Option<String>,
    pub account_url: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct AgentConfig {
    pub database: Option<String>,
    pub schema: Option<String>,
    pub name: Option<String>,
    pub application: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct NetworkConfig {
    pub request_timeout_secs: Option<u64>,
    pub stream_idle_timeout_secs: Option<u64>,
}

// ============================================================================
// Defaults
// ============================================================================

pub const DEFAULT_DATABASE: &str = "SNOWFLAKE_INTELLIGENCE";
pub const DEFAULT_SCHEMA: &str = "AGENTS";
pub const DEFAULT_AGENT: &str = "DATA_FOR_GOOD";
pub const DEFAULT_APPLICATION: &str = "threads_demo";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_STREAM_IDLE_TIMEOUT_SECS: u64 = 120;

const THREADS_PATH: &str = "/api/v2/cortex/threads";

// ============================================================================
// CLI Overrides
// ============================================================================

/// Values given on the command line. `None` = not specified.
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    pub database: Option<String>,
    pub schema: Option<String>,
    pub agent: Option<String>,
    pub application: Option<String>,
}

// ============================================================================
// Resolved Config (concrete values, no Options)
// ============================================================================

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub pat: String,
    pub account_url: String,
    pub database: String,
    pub schema: String,
    pub agent_name: String,
    pub application: String,
    pub request_timeout: Duration,
    pub stream_idle_timeout: Duration,
}

/// The opaque bundle the service clients consume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub auth_header: String,
    pub agent_endpoint: String,
    pub threads_endpoint: String,
}

impl ResolvedConfig {
    pub fn endpoints(&self) -> Endpoints {
        let base = self.account_url.trim_end_matches('/');
        Endpoints {
            auth_header: format!("Bearer {}", self.pat),
            agent_endpoint: format!(
                "{}/api/v2/databases/{}/schemas/{}/agents/{}:run",
                base, self.database, self.schema, self.agent_name
            ),
            threads_endpoint: format!("{base}{THREADS_PATH}"),
        }
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    /// Required settings that are absent or empty, by config key.
    Missing(Vec<&'static str>),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "config I/O error: {e}"),
            ConfigError::Parse(e) => write!(f, "config parse error: {e}"),
            ConfigError::Missing(keys) => {
                writeln!(f, "missing required settings:")?;
                for key in keys {
                    writeln!(f, "  - no value for {key}")?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Loading
// ============================================================================

/// Returns the path to `~/.cortex-chat/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".cortex-chat").join("config.toml"))
}

/// Load config from `path`, or from `~/.cortex-chat/config.toml` when `None`.
///
/// If the default file doesn't exist, generates a commented-out default and
/// returns `CortexConfig::default()`. An explicit path that doesn't exist is
/// an I/O error. A malformed file is `ConfigError::Parse`.
pub fn load_config(path: Option<&Path>) -> Result<CortexConfig, ConfigError> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => match config_path() {
            Some(p) => {
                if !p.exists() {
                    info!("No config file found, generating default at {}", p.display());
                    generate_default_config(&p);
                    return Ok(CortexConfig::default());
                }
                p
            }
            None => {
                warn!("Could not determine home directory, using default config");
                return Ok(CortexConfig::default());
            }
        },
    };

    let contents = fs::read_to_string(&path).map_err(ConfigError::Io)?;
    let config: CortexConfig = toml::from_str(&contents).map_err(ConfigError::Parse)?;
    info!("Loaded config from {}", path.display());
    // The PAT is a secret; only say whether it's there.
    debug!(
        "Config: agent={:?}, network={:?}, pat set={}",
        config.agent,
        config.network,
        config.account.pat.is_some()
    );
    Ok(config)
}

/// Generates a commented-out default config file at the given path.
fn generate_default_config(path: &Path) {
    let default_content = r#"# cortex-chat configuration
# Override hierarchy: defaults → this file → env vars → CLI flags.

# [account]
# pat = "..."                               # Or set CORTEX_PAT
# account_url = "https://<account>.snowflakecomputing.com"   # Or CORTEX_ACCOUNT_URL

# [agent]
# database = "SNOWFLAKE_INTELLIGENCE"       # CORTEX_AGENT_DATABASE / --database
# schema = "AGENTS"                         # CORTEX_AGENT_SCHEMA / --schema
# name = "DATA_FOR_GOOD"                    # CORTEX_AGENT_NAME / --agent
# application = "threads_demo"              # CORTEX_APPLICATION / --application

# [network]
# request_timeout_secs = 30
# stream_idle_timeout_secs = 120
"#;

    if let Some(parent) = path.parent()
        && let Err(e) = fs::create_dir_all(parent)
    {
        warn!("Failed to create config directory: {}", e);
        return;
    }
    if let Err(e) = fs::write(path, default_content) {
        warn!("Failed to write default config: {}", e);
    }
}

// ============================================================================
// Resolution
// ============================================================================

/// Resolve the final config from the process environment.
pub fn resolve(config: &CortexConfig, cli: &CliOverrides) -> Result<ResolvedConfig, ConfigError> {
    resolve_with(config, cli, |key| std::env::var(key).ok())
}

/// Resolve by collapsing: defaults → config file → `env` → CLI.
///
/// Empty strings count as unset. Every missing required key is reported at
/// once rather than one per run.
pub fn resolve_with<F>(
    config: &CortexConfig,
    cli: &CliOverrides,
    env: F,
) -> Result<ResolvedConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());

    let pat = non_empty(env("CORTEX_PAT")).or_else(|| non_empty(config.account.pat.clone()));
    let account_url = non_empty(env("CORTEX_ACCOUNT_URL"))
        .or_else(|| non_empty(config.account.account_url.clone()));

    let (pat, account_url) = match (pat, account_url) {
        (Some(pat), Some(url)) => (pat, url),
        (pat, url) => {
            let mut missing = Vec::new();
            if pat.is_none() {
                missing.push("account.pat (CORTEX_PAT)");
            }
            if url.is_none() {
                missing.push("account.account_url (CORTEX_ACCOUNT_URL)");
            }
            return Err(ConfigError::Missing(missing));
        }
    };

    // Agent coordinates: CLI → env → config → default
    let pick = |cli: &Option<String>, var: &str, file: &Option<String>, default: &str| {
        non_empty(cli.clone())
            .or_else(|| non_empty(env(var)))
            .or_else(|| non_empty(file.clone()))
            .unwrap_or_else(|| default.to_string())
    };

    let database = pick(&cli.database, "CORTEX_AGENT_DATABASE", &config.agent.database, DEFAULT_DATABASE);
    let schema = pick(&cli.schema, "CORTEX_AGENT_SCHEMA", &config.agent.schema, DEFAULT_SCHEMA);
    let agent_name = pick(&cli.agent, "CORTEX_AGENT_NAME", &config.agent.name, DEFAULT_AGENT);
    let application = pick(
        &cli.application,
        "CORTEX_APPLICATION",
        &config.agent.application,
        DEFAULT_APPLICATION,
    );

    Ok(ResolvedConfig {
        pat,
        account_url,
        database,
        schema,
        agent_name,
        application,
        request_timeout: Duration::from_secs(
            config
                .network
                .request_timeout_secs
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
        ),
        stream_idle_timeout: Duration::from_secs(
            config
                .network
                .stream_idle_timeout_secs
                .unwrap_or(DEFAULT_STREAM_IDLE_TIMEOUT_SECS),
        ),
    })
}
