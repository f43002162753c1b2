use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Translation {
    #[default]
    Sub,
    Dub,
}

impl Translation {
    pub fn as_str(self) -> &'static str {
        match self {
            Translation::Sub => "sub",
            Translation::Dub => "dub",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Translation::Sub => "Sub",
            Translation::Dub => "Dub",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ShowInfo {
    pub id: String,
    pub title: String,
    pub available_eps: EpisodeCounts,
    /// MyAnimeList id, when the provider knows it. Needed for filler lookups.
    pub mal_id: Option<u32>,
}

#[derive(Debug, Clone, Default)]
pub struct EpisodeCounts {
    pub sub: usize,
    pub dub: usize,
}

impl EpisodeCounts {
    pub fn for_translation(&self, translation: Translation) -> usize {
        match translation {
            Translation::Sub => self.sub,
            Translation::Dub => self.dub,
        }
    }
}

/// A stream URL scraped from a provider response, before any CDN rewriting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateLink {
    pub raw_url: String,
    pub quality: Option<String>,
    pub provider: String,
}

/// A URL the player can open as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedLink {
    pub url: String,
    pub quality: String,
}

impl NormalizedLink {
    pub fn new(url: impl Into<String>, quality: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            quality: quality.into(),
        }
    }

    /// Numeric height for labels like `1080p`; `auto` and unknown labels rank lowest.
    pub fn quality_rank(&self) -> u32 {
        self.quality
            .trim_end_matches('p')
            .parse::<u32>()
            .unwrap_or(0)
    }
}

impl fmt::Display for NormalizedLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} >{}", self.quality, self.url)
    }
}
