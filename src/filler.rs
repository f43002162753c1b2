//! Filler episode lookup through the Jikan (MyAnimeList) episode list.

use anyhow::{Context, Result, bail};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::{collections::BTreeSet, time::Duration};

use crate::config::{Config, FillerConfig};

/// Episode numbers flagged as filler for one show.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FillerList {
    episodes: BTreeSet<u32>,
}

impl FillerList {
    pub fn new(episodes: impl IntoIterator<Item = u32>) -> Self {
        Self {
            episodes: episodes.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.episodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.episodes.is_empty()
    }

    /// Only whole-number labels can be filler; `6.5` specials never are.
    pub fn is_filler(&self, label: &str) -> bool {
        label
            .trim()
            .parse::<u32>()
            .is_ok_and(|number| self.episodes.contains(&number))
    }
}

pub struct JikanClient {
    client: Client,
    config: FillerConfig,
}

impl JikanClient {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.allanime.user_agent)
            .timeout(Duration::from_secs(config.http.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            config: config.filler.clone(),
        })
    }

    /// Walks every page of the episode list and collects the filler flags.
    pub async fn fetch_filler_episodes(&self, mal_id: u32) -> Result<FillerList> {
        let url = format!(
            "{}/anime/{mal_id}/episodes",
            self.config.api_url.trim_end_matches('/')
        );
        let interval = Duration::from_millis(self.config.request_interval_ms);
        let mut filler = BTreeSet::new();
        let mut page: u32 = 1;
        let mut retries = 0;
        let mut first_request = true;

        loop {
            if !first_request {
                tokio::time::sleep(interval).await;
            }
            first_request = false;

            let response = self
                .client
                .get(&url)
                .query(&[("page", page)])
                .send()
                .await
                .with_context(|| format!("request failed for {url}"))?;

            if response.status() == StatusCode::TOO_MANY_REQUESTS {
                retries += 1;
                if retries > self.config.max_retries {
                    bail!("Jikan kept rate limiting after {} retries", self.config.max_retries);
                }
                log::debug!("Jikan rate limited on page {page}, retry {retries}");
                tokio::time::sleep(Duration::from_millis(self.config.retry_wait_ms)).await;
                continue;
            }
            retries = 0;

            let status = response.status();
            if !status.is_success() {
                bail!("Jikan API error: {status}");
            }

            let body: EpisodesPage = response
                .json()
                .await
                .context("unexpected Jikan response shape")?;
            filler.extend(
                body.data
                    .iter()
                    .filter(|episode| episode.filler)
                    .map(|episode| episode.mal_id),
            );

            if !body.pagination.has_next_page {
                break;
            }
            page += 1;
        }

        log::debug!("MAL {mal_id}: {} filler episode(s)", filler.len());
        Ok(FillerList { episodes: filler })
    }
}

#[derive(Debug, Deserialize)]
struct EpisodesPage {
    #[serde(default)]
    data: Vec<JikanEpisode>,
    #[serde(default)]
    pagination: Pagination,
}

#[derive(Debug, Deserialize)]
struct JikanEpisode {
    mal_id: u32,
    #[serde(default)]
    filler: bool,
}

#[derive(Debug, Deserialize, Default)]
struct Pagination {
    #[serde(default)]
    has_next_page: bool,
}
