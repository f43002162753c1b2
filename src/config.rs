use dirs_next::config_dir;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::error::ConfigError;
use crate::links::PriorityTable;
use crate::types::Translation;

pub const ENV_PREFIX: &str = "CURD";

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:109.0) Gecko/20100101 Firefox/121.0";

/// Everything the resolver, provider client and player need, loaded once at startup
/// and handed down explicitly.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub player: PlayerConfig,
    pub playback: PlaybackConfig,
    pub allanime: AllAnimeConfig,
    pub links: LinkConfig,
    pub filler: FillerConfig,
    pub http: HttpConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlayerConfig {
    /// Shell-style command line, e.g. `mpv --fs`.
    pub command: String,
    pub args: Vec<String>,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            command: String::from("mpv"),
            args: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlaybackConfig {
    pub translation: Translation,
    /// Auto-advance past episodes the filler list marks as filler.
    pub skip_filler: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AllAnimeConfig {
    pub api_url: String,
    pub base_url: String,
    pub referer: String,
    pub user_agent: String,
}

impl Default for AllAnimeConfig {
    fn default() -> Self {
        Self {
            api_url: String::from("https://api.allanime.day/api"),
            base_url: String::from("https://allanime.day"),
            referer: String::from("https://allmanga.to"),
            user_agent: String::from(DEFAULT_USER_AGENT),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LinkConfig {
    /// Domain substrings, most preferred first.
    pub priority: Vec<String>,
    pub repackager_host: String,
    pub manifest_hosts: Vec<String>,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            priority: [
                "sharepoint.com",
                "wixmp.com",
                "wixstatic.com",
                "dropbox.com",
                "wetransfer.com",
                "gogoanime.com",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            repackager_host: String::from("repackager.wixmp.com"),
            manifest_hosts: vec![String::from("vipanicdn"), String::from("anifastcdn")],
        }
    }
}

impl LinkConfig {
    pub fn priority_table(&self) -> PriorityTable {
        PriorityTable::new(self.priority.iter().cloned())
    }
}

/// Jikan episode list used to look up filler episodes by MAL id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FillerConfig {
    pub api_url: String,
    /// Delay between page requests; Jikan allows about three per second.
    pub request_interval_ms: u64,
    /// Wait after an HTTP 429 before asking for the same page again.
    pub retry_wait_ms: u64,
    pub max_retries: u32,
}

impl Default for FillerConfig {
    fn default() -> Self {
        Self {
            api_url: String::from("https://api.jikan.moe/v4"),
            request_interval_ms: 334,
            retry_wait_ms: 2000,
            max_retries: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { timeout_secs: 30 }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LogConfig {
    /// Append log records here instead of stderr.
    pub file: Option<PathBuf>,
}

pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    let base = config_dir().ok_or(ConfigError::NoConfigDir)?;
    Ok(base.join("curd").join("config.toml"))
}

/// Layers defaults, the optional TOML file and `CURD_*` environment variables.
pub fn load(path: &Path) -> Result<Config, ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::from(path.to_path_buf()).required(false))
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("links.priority")
                .with_list_parse_key("links.manifest_hosts")
                .with_list_parse_key("player.args"),
        )
        .build()?;
    Ok(settings.try_deserialize()?)
}

/// Writes the default configuration, refusing to replace an existing file.
pub fn write_default(path: &Path) -> Result<(), ConfigError> {
    if path.exists() {
        return Err(ConfigError::AlreadyExists {
            path: path.to_path_buf(),
        });
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let data = toml::to_string_pretty(&Config::default())?;
    fs::write(path, data).map_err(|source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    })
}
