//! Configuration loading and resolution.
//!
//! Three sources, first complete one wins (no merging):
//! 1. `TOPUP_<KEY>` environment variables
//! 2. one file per key in the secrets directory (`TOPUP_SECRETS_DIR`, default `/run/secrets`),
//!    named `topup_<key>`
//! 3. a flat JSON file (`TOPUP_CONFIG_FILE`, default `config.json`)
//!
//! A source counts as complete when it provides both `identifier` and `secret`.

use crate::action::TopUpPolicy;
use crate::scheduler::SleepMode;
use crate::session::{LoginCredentials, PortalUrls};
use crate::types::ConfigError;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

const ENV_PREFIX: &str = "TOPUP_";
const SECRET_PREFIX: &str = "topup_";
const DEFAULT_SECRETS_DIR: &str = "/run/secrets";
const DEFAULT_CONFIG_FILE: &str = "config.json";
const CONTAINER_DATA_DIR: &str = "/app/data";

/// User agent presented to the portal.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
                                      AppleWebKit/537.36 (KHTML, like Gecko) \
                                      Chrome/131.0.0.0 Safari/537.36";

/// Every recognized key.
pub const KEYS: &[&str] = &[
    "identifier",
    "secret",
    "notify_enabled",
    "notify_bot_token",
    "notify_chat_id",
    "auto_update_enabled",
    "update_url",
    "sleep_mode",
    "sleep_interval",
    "browser_engine",
    "data_dir",
    "login_url",
    "dashboard_url",
    "topup_threshold",
    "topup_label",
    "user_agent",
];

/// Where the configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    Env,
    Secrets(PathBuf),
    File(PathBuf),
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::Env => write!(f, "environment variables"),
            ConfigSource::Secrets(dir) => write!(f, "secrets in {}", dir.display()),
            ConfigSource::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Browser family requested by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BrowserEngine {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl BrowserEngine {
    /// Parse the configured engine, falling back to Chromium with a warning.
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return Self::default();
        };
        match raw.trim().to_ascii_lowercase().as_str() {
            "chromium" | "" => Self::Chromium,
            "firefox" => Self::Firefox,
            "webkit" => Self::Webkit,
            other => {
                tracing::warn!("invalid browser '{other}' in config, falling back to chromium");
                Self::Chromium
            }
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Chromium => "chromium",
            Self::Firefox => "firefox",
            Self::Webkit => "webkit",
        }
    }
}

/// Telegram delivery settings.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct NotifySettings {
    pub enabled: bool,
    pub bot_token: String,
    pub chat_id: String,
}

impl fmt::Debug for NotifySettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotifySettings")
            .field("enabled", &self.enabled)
            .field("bot_token", &if self.bot_token.is_empty() { "" } else { "***" })
            .field("chat_id", &self.chat_id)
            .finish()
    }
}

/// Fully resolved configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub source: ConfigSource,
    pub credentials: LoginCredentials,
    pub notify: NotifySettings,
    pub auto_update: bool,
    pub update_url: Option<String>,
    pub sleep_mode: SleepMode,
    pub browser: BrowserEngine,
    pub data_dir: PathBuf,
    pub urls: PortalUrls,
    pub top_up: TopUpPolicy,
    pub user_agent: String,
}

/// Raw key/value pairs from one source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct RawConfig(BTreeMap<String, String>);

impl RawConfig {
    fn get(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    fn is_complete(&self) -> bool {
        self.get("identifier").is_some() && self.get("secret").is_some()
    }
}

/// Load from the process environment.
pub fn load() -> Result<Config, ConfigError> {
    load_with(|key| std::env::var(key).ok())
}

/// Load using `env` to look up environment variables.
pub fn load_with<F>(env: F) -> Result<Config, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let secrets_dir = env("TOPUP_SECRETS_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SECRETS_DIR));
    let config_file = env("TOPUP_CONFIG_FILE")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

    let (source, raw) = select_source(&env, &secrets_dir, &config_file)?;
    tracing::info!("using configuration from {source}");

    let data_dir_override = env("TOPUP_DATA_DIR").filter(|v| !v.trim().is_empty());
    Config::from_raw(source, &raw, data_dir_override.as_deref())
}

/// Which source would be used, without resolving it.
pub fn probe_source_with<F>(env: F) -> Result<ConfigSource, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let secrets_dir = env("TOPUP_SECRETS_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SECRETS_DIR));
    let config_file = env("TOPUP_CONFIG_FILE")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    select_source(&env, &secrets_dir, &config_file).map(|(source, _)| source)
}

fn select_source<F>(
    env: &F,
    secrets_dir: &Path,
    config_file: &Path,
) -> Result<(ConfigSource, RawConfig), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let from_env = read_env(env);
    if from_env.is_complete() {
        return Ok((ConfigSource::Env, from_env));
    }

    let from_secrets = read_secrets(secrets_dir);
    if from_secrets.is_complete() {
        return Ok((ConfigSource::Secrets(secrets_dir.to_path_buf()), from_secrets));
    }

    if config_file.exists() {
        let from_file = read_file(config_file)?;
        if !from_file.is_complete() {
            return Err(ConfigError::Invalid {
                key: "identifier".to_string(),
                reason: format!("{} must set identifier and secret", config_file.display()),
            });
        }
        return Ok((ConfigSource::File(config_file.to_path_buf()), from_file));
    }

    Err(ConfigError::Missing {
        secrets_dir: secrets_dir.display().to_string(),
        config_file: config_file.display().to_string(),
    })
}

fn read_env<F>(env: &F) -> RawConfig
where
    F: Fn(&str) -> Option<String>,
{
    let values = KEYS
        .iter()
        .filter_map(|key| {
            let var = format!("{ENV_PREFIX}{}", key.to_ascii_uppercase());
            env(&var).map(|v| (key.to_string(), v))
        })
        .collect();
    RawConfig(values)
}

fn read_secrets(dir: &Path) -> RawConfig {
    if !dir.is_dir() {
        return RawConfig::default();
    }
    let mut values = BTreeMap::new();
    for key in KEYS {
        let path = dir.join(format!("{SECRET_PREFIX}{key}"));
        if !path.exists() {
            continue;
        }
        match std::fs::read_to_string(&path) {
            Ok(v) => {
                values.insert(key.to_string(), v.trim().to_string());
            }
            Err(e) => tracing::warn!("cannot read secret {}: {e}", path.display()),
        }
    }
    RawConfig(values)
}

fn read_file(path: &Path) -> Result<RawConfig, ConfigError> {
    let unreadable = |reason: String| ConfigError::Unreadable {
        path: path.display().to_string(),
        reason,
    };
    let raw = std::fs::read_to_string(path).map_err(|e| unreadable(e.to_string()))?;
    let json: serde_json::Map<String, serde_json::Value> =
        serde_json::from_str(&raw).map_err(|e| unreadable(e.to_string()))?;

    let values = json
        .into_iter()
        .filter_map(|(key, value)| {
            let value = match value {
                serde_json::Value::String(s) => s,
                serde_json::Value::Bool(b) => b.to_string(),
                serde_json::Value::Number(n) => n.to_string(),
                serde_json::Value::Null => return None,
                other => other.to_string(),
            };
            Some((key.to_ascii_lowercase(), value))
        })
        .collect();
    Ok(RawConfig(values))
}

/// `1/true/yes/on` are true; anything else is false.
pub fn parse_bool(raw: Option<&str>) -> bool {
    matches!(
        raw.map(|v| v.trim().to_ascii_lowercase()).as_deref(),
        Some("1" | "true" | "yes" | "on")
    )
}

/// `/app/data` in containers, the platform data dir otherwise.
pub fn default_data_dir() -> PathBuf {
    let container = PathBuf::from(CONTAINER_DATA_DIR);
    if container.is_dir() {
        return container;
    }
    dirs::data_local_dir()
        .map(|d| d.join("topup-agent"))
        .unwrap_or_else(|| PathBuf::from("."))
}

impl Config {
    fn from_raw(
        source: ConfigSource,
        raw: &RawConfig,
        data_dir_override: Option<&str>,
    ) -> Result<Self, ConfigError> {
        let required = |key: &str| {
            raw.get(key).map(str::to_string).ok_or_else(|| ConfigError::Invalid {
                key: key.to_string(),
                reason: "missing".to_string(),
            })
        };
        let credentials = LoginCredentials {
            identifier: required("identifier")?,
            secret: required("secret")?,
        };

        let mut notify = NotifySettings {
            enabled: parse_bool(raw.get("notify_enabled")),
            bot_token: raw.get("notify_bot_token").unwrap_or_default().to_string(),
            chat_id: raw.get("notify_chat_id").unwrap_or_default().to_string(),
        };
        if notify.enabled && (notify.bot_token.is_empty() || notify.chat_id.is_empty()) {
            tracing::warn!("notifications enabled but bot token or chat id missing, disabling");
            notify.enabled = false;
        }

        let defaults = PortalUrls::default();
        let urls = PortalUrls {
            login: raw.get("login_url").map(str::to_string).unwrap_or(defaults.login),
            dashboard: raw
                .get("dashboard_url")
                .map(str::to_string)
                .unwrap_or(defaults.dashboard),
        };

        let mut top_up = TopUpPolicy::default();
        if let Some(threshold) = raw.get("topup_threshold") {
            match threshold.replace(',', ".").parse::<f64>() {
                Ok(v) if v.is_finite() && v >= 0.0 => top_up.threshold_gb = v,
                _ => tracing::warn!(
                    "invalid topup_threshold '{threshold}', using {}",
                    top_up.threshold_gb
                ),
            }
        }
        if let Some(label) = raw.get("topup_label") {
            top_up.label = label.to_string();
        }

        let data_dir = data_dir_override
            .or_else(|| raw.get("data_dir"))
            .map(PathBuf::from)
            .unwrap_or_else(default_data_dir);

        Ok(Self {
            source,
            credentials,
            notify,
            auto_update: raw.get("auto_update_enabled").map_or(true, |v| parse_bool(Some(v))),
            update_url: raw.get("update_url").map(str::to_string),
            sleep_mode: SleepMode::parse(raw.get("sleep_mode"), raw.get("sleep_interval")),
            browser: BrowserEngine::parse(raw.get("browser_engine")),
            data_dir,
            urls,
            top_up,
            user_agent: raw
                .get("user_agent")
                .unwrap_or(DEFAULT_USER_AGENT)
                .to_string(),
        })
    }
}
