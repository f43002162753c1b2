//! Error types for episode link resolution and configuration loading.

use std::path::PathBuf;
use thiserror::Error;

/// Failures that end resolution of one episode.
///
/// Secondary manifest fetches never surface here; a provider that cannot be
/// resolved simply contributes no links.
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("AllAnime API error: {0}")]
    Api(String),

    #[error("no decodable sources for show {show_id} episode {episode}")]
    NoSources { show_id: String, episode: String },

    /// No provider response contained a stream URL.
    #[error("no stream links found for episode {episode}")]
    NoLinks { episode: String },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("could not determine config directory")]
    NoConfigDir,

    #[error("failed to write config file {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config file {} already exists; remove it first to regenerate", path.display())]
    AlreadyExists { path: PathBuf },

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

pub type Result<T> = std::result::Result<T, ResolveError>;
