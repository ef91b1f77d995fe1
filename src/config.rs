//! Node configuration: a small key/value settings store.
//!
//! Values are layered, lowest precedence first:
//!   1. built-in defaults for every key in [`SCHEMA`]
//!   2. the `[node]` table of an optional TOML file
//!   3. process environment variables with the same names
//!   4. runtime overrides applied through [`Config::set`]
//!
//! The bootstrap sequence applies its overrides before the logger or the
//! application read anything; after that the config is treated as read-only.

use std::{
    collections::{BTreeMap, HashMap},
    env, fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::error::AppError;
use crate::logger;

/// How a setting's value is validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Str,
    Level,
    Path,
    Bool,
    Int,
    Uint,
}

/// `(env name, default, kind, whitelisted for audit logging)`.
const SCHEMA: &[(&str, &str, Kind, bool)] = &[
    ("ROOT", "~/.oracle-node", Kind::Path, true),
    ("LOG_LEVEL", "info", Kind::Level, true),
    ("LOG_TO_DISK", "true", Kind::Bool, true),
    ("REPLAY_FROM_BLOCK", "-1", Kind::Int, true),
    ("ETH_CHAIN_ID", "1", Kind::Uint, true),
    ("ETH_URL", "ws://localhost:8546", Kind::Str, true),
    ("CHAINLINK_PORT", "6688", Kind::Uint, true),
    ("MINIMUM_CONTRACT_PAYMENT", "1000000000000000000", Kind::Uint, true),
    ("MIN_OUTGOING_CONFIRMATIONS", "12", Kind::Uint, true),
    ("DATABASE_TIMEOUT", "500", Kind::Uint, false),
];

/// Environment variable that names the log level.
pub const LOG_LEVEL: &str = "LOG_LEVEL";

/// Fully-resolved node configuration.
#[derive(Debug, Clone)]
pub struct Config {
    values: BTreeMap<String, String>,
}

impl Config {
    /// Set a value by its env name. Unknown keys and values that do not
    /// parse as the key's kind are rejected.
    pub fn set(&mut self, key: &str, value: impl ToString) -> Result<(), AppError> {
        let value = value.to_string();
        let kind = kind_of(key).ok_or_else(|| AppError::Config(format!("unknown key: {key}")))?;
        validate(key, kind, &value)?;
        self.values.insert(key.to_string(), value);
        Ok(())
    }

    /// Raw string value for `key`, if it is a known setting.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Node root directory (already expanded, no `~`).
    pub fn root_dir(&self) -> PathBuf {
        expand_home(self.str_or_default("ROOT"))
    }

    /// Directory holding key files waiting to be synced into the store.
    pub fn keys_dir(&self) -> PathBuf {
        self.root_dir().join("tempkeys")
    }

    pub fn log_level(&self) -> &str {
        self.str_or_default(LOG_LEVEL)
    }

    pub fn log_to_disk(&self) -> bool {
        self.str_or_default("LOG_TO_DISK") == "true"
    }

    /// File the logger appends to when [`Config::log_to_disk`] is set.
    pub fn log_file(&self) -> PathBuf {
        self.root_dir().join("node.log")
    }

    /// Block height to replay logs from; `None` when unset or negative.
    pub fn replay_from_block(&self) -> Option<u64> {
        self.str_or_default("REPLAY_FROM_BLOCK")
            .parse::<i64>()
            .ok()
            .and_then(|n| u64::try_from(n).ok())
    }

    pub fn eth_chain_id(&self) -> u64 {
        self.str_or_default("ETH_CHAIN_ID").parse().unwrap_or(1)
    }

    pub fn port(&self) -> u16 {
        self.str_or_default("CHAINLINK_PORT").parse().unwrap_or(6688)
    }

    /// Settings that are safe to print for audit purposes, in schema order.
    pub fn whitelist(&self) -> Vec<(&'static str, String)> {
        SCHEMA
            .iter()
            .filter(|(_, _, _, audited)| *audited)
            .map(|(key, _, _, _)| (*key, self.str_or_default(key).to_string()))
            .collect()
    }

    fn str_or_default(&self, key: &str) -> &str {
        self.values
            .get(key)
            .map(String::as_str)
            .or_else(|| default_of(key))
            .unwrap_or_default()
    }
}

/// Derive the env name of a config field: `ReplayFromBlock` → `REPLAY_FROM_BLOCK`.
pub fn env_var_name(field: &str) -> String {
    let mut out = String::with_capacity(field.len() + 4);
    let mut prev_lower = false;
    for c in field.chars() {
        if c.is_ascii_uppercase() && prev_lower {
            out.push('_');
        }
        prev_lower = c.is_ascii_lowercase() || c.is_ascii_digit();
        out.push(c.to_ascii_uppercase());
    }
    out
}

/// Raw TOML shape: `serde` target before resolution.
#[derive(Deserialize, Default)]
struct RawConfig {
    #[serde(default)]
    node: BTreeMap<String, toml::Value>,
}

/// Load config from an optional TOML file, then apply env-var overrides.
pub fn load(path: Option<&Path>) -> Result<Config, AppError> {
    let env: HashMap<String, String> = SCHEMA
        .iter()
        .filter_map(|(key, _, _, _)| env::var(key).ok().map(|v| (key.to_string(), v)))
        .collect();
    load_from(path, &env)
}

/// Internal loader: accepts an explicit path and environment.
/// Tests pass the environment directly instead of mutating env vars.
pub fn load_from(path: Option<&Path>, env: &HashMap<String, String>) -> Result<Config, AppError> {
    let mut config = Config { values: BTreeMap::new() };

    if let Some(path) = path {
        let raw = fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("cannot read {}: {e}", path.display())))?;
        let parsed: RawConfig = toml::from_str(&raw)
            .map_err(|e| AppError::Config(format!("parse error in {}: {e}", path.display())))?;

        for (key, value) in parsed.node {
            let value = match value {
                toml::Value::String(s) => s,
                other => other.to_string(),
            };
            config
                .set(&key, value)
                .map_err(|e| AppError::Config(format!("{} in {}", e, path.display())))?;
        }
    }

    for (key, value) in env {
        if kind_of(key).is_some() {
            config.set(key, value)?;
        }
    }

    Ok(config)
}

fn kind_of(key: &str) -> Option<Kind> {
    SCHEMA.iter().find(|(k, _, _, _)| *k == key).map(|(_, _, kind, _)| *kind)
}

fn default_of(key: &str) -> Option<&'static str> {
    SCHEMA.iter().find(|(k, _, _, _)| *k == key).map(|(_, d, _, _)| *d)
}

fn validate(key: &str, kind: Kind, value: &str) -> Result<(), AppError> {
    let ok = match kind {
        Kind::Str => true,
        Kind::Level => logger::parse_level(value).is_ok(),
        Kind::Path => !value.is_empty(),
        Kind::Bool => matches!(value, "true" | "false"),
        Kind::Int => value.parse::<i64>().is_ok(),
        Kind::Uint => value.parse::<u64>().is_ok(),
    };
    if ok {
        Ok(())
    } else {
        Err(AppError::Config(format!("invalid value for {key}: '{value}'")))
    }
}

/// Expand a leading `~` to the user's home directory.
/// Absolute or relative paths without `~` are returned unchanged.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}

// ── test helpers ──────────────────────────────────────────────────────────────

impl Config {
    /// Config rooted at `root` with disk logging off. Used by tests.
    pub fn test_default(root: &Path) -> Self {
        let mut values = BTreeMap::new();
        values.insert("ROOT".to_string(), root.display().to_string());
        values.insert("LOG_TO_DISK".to_string(), "false".to_string());
        Self { values }
    }
}
