use anyhow::Result;
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

use super::AnimeProvider;
use crate::config::{AllAnimeConfig, Config, LinkConfig};
use crate::error::ResolveError;
use crate::links::{
    Normalizer, ProviderResponse, decode_provider_path, normalize_escapes, resolve_links,
    strip_obfuscation_prefix,
};
use crate::types::{EpisodeCounts, NormalizedLink, ShowInfo, Translation};

pub struct AllAnimeClient {
    client: Client,
    api: AllAnimeConfig,
    links: LinkConfig,
}

impl AllAnimeClient {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.allanime.user_agent)
            .timeout(Duration::from_secs(config.http.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            api: config.allanime.clone(),
            links: config.links.clone(),
        })
    }

    async fn graphql<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: serde_json::Value,
    ) -> Result<T, ResolveError> {
        let body = serde_json::json!({
            "query": query,
            "variables": variables,
        });
        let response = self
            .client
            .post(&self.api.api_url)
            .header("Referer", &self.api.referer)
            .header("Origin", &self.api.base_url)
            .header("Accept", "application/json")
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(ResolveError::Api(format!("HTTP {status}: {text}")));
        }
        let envelope: GraphQlEnvelope<T> = serde_json::from_str(&text)
            .map_err(|err| ResolveError::Api(format!("unexpected response shape: {err}")))?;
        extract_data(envelope)
    }

    async fn fetch_episode_sources(
        &self,
        show_id: &str,
        translation: Translation,
        episode: &str,
    ) -> Result<Vec<SourceDescriptor>, ResolveError> {
        let payload: EpisodePayload = self
            .graphql(
                EPISODE_SOURCES_QUERY,
                serde_json::json!({
                    "showId": show_id,
                    "translationType": translation.as_str(),
                    "episodeString": episode
                }),
            )
            .await?;
        Ok(payload.episode.source_urls)
    }

    async fn fetch_clock_body(&self, path: &str) -> Result<String, ResolveError> {
        let url = if path.starts_with("http") {
            path.to_string()
        } else {
            format!("{}{path}", self.api.base_url.trim_end_matches('/'))
        };
        let text = self
            .client
            .get(&url)
            .header("Referer", &self.api.referer)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(normalize_escapes(&text))
    }
}

impl AnimeProvider for AllAnimeClient {
    async fn search_shows(&self, query: &str, translation: Translation) -> Result<Vec<ShowInfo>> {
        let payload: SearchPayload = self
            .graphql(
                SEARCH_SHOWS_QUERY,
                serde_json::json!({
                    "search": {
                        "allowAdult": false,
                        "allowUnknown": false,
                        "query": query,
                    },
                    "limit": 40,
                    "page": 1,
                    "translationType": translation.as_str(),
                    "countryOrigin": "ALL"
                }),
            )
            .await?;
        Ok(payload
            .shows
            .edges
            .into_iter()
            .map(|edge| ShowInfo {
                id: edge.id,
                title: edge.name,
                available_eps: EpisodeCounts {
                    sub: edge.available_episodes.sub,
                    dub: edge.available_episodes.dub,
                },
                mal_id: parse_mal_id(edge.mal_id.as_ref()),
            })
            .collect())
    }

    async fn fetch_episodes(&self, show_id: &str, translation: Translation) -> Result<Vec<String>> {
        let payload: ShowDetailPayload = self
            .graphql(SHOW_DETAIL_QUERY, serde_json::json!({ "showId": show_id }))
            .await?;
        let detail = payload.show.available_episodes_detail;
        Ok(match translation {
            Translation::Sub => detail.sub,
            Translation::Dub => detail.dub,
        })
    }

    async fn fetch_links(
        &self,
        show_id: &str,
        translation: Translation,
        episode: &str,
    ) -> Result<Vec<NormalizedLink>> {
        let sources = self
            .fetch_episode_sources(show_id, translation, episode)
            .await?;

        let mut decoded_any = false;
        let mut responses = Vec::new();
        for source in &sources {
            let Some(encoded) = strip_obfuscation_prefix(&source.source_url) else {
                log::trace!("skipping plain source {}", source.source_name);
                continue;
            };
            decoded_any = true;
            let path = decode_provider_path(encoded);
            log::debug!("{}: provider path {path}", source.source_name);

            match self.fetch_clock_body(&path).await {
                Ok(body) => responses.push(ProviderResponse {
                    provider: source.source_name.clone(),
                    body,
                }),
                Err(err) => log::warn!("{} unavailable: {err}", source.source_name),
            }
        }

        if !decoded_any {
            return Err(ResolveError::NoSources {
                show_id: show_id.to_string(),
                episode: episode.to_string(),
            }
            .into());
        }

        let normalizer = Normalizer::new(&self.client, &self.links, &self.api.referer);
        Ok(resolve_links(&normalizer, episode, &responses).await?)
    }
}

fn extract_data<T>(envelope: GraphQlEnvelope<T>) -> Result<T, ResolveError> {
    if let Some(errors) = envelope.errors {
        let joined = errors
            .into_iter()
            .map(|e| e.message)
            .collect::<Vec<_>>()
            .join("; ");
        return Err(ResolveError::Api(joined));
    }
    envelope
        .data
        .ok_or_else(|| ResolveError::Api(String::from("empty response")))
}

/// AllAnime reports `malId` as a string, a number or null depending on the show.
fn parse_mal_id(value: Option<&serde_json::Value>) -> Option<u32> {
    match value? {
        serde_json::Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

// --- GraphQL Structs ---

#[derive(Debug, Deserialize)]
struct GraphQlEnvelope<T> {
    data: Option<T>,
    errors: Option<Vec<GraphQlError>>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct SearchPayload {
    shows: SearchShows,
}

#[derive(Debug, Deserialize)]
struct SearchShows {
    edges: Vec<SearchEdge>,
}

#[derive(Debug, Deserialize)]
struct SearchEdge {
    #[serde(rename = "_id")]
    id: String,
    name: String,
    #[serde(rename = "availableEpisodes")]
    #[serde(default)]
    available_episodes: AvailabilitySnapshot,
    #[serde(rename = "malId")]
    #[serde(default)]
    mal_id: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize, Default)]
struct AvailabilitySnapshot {
    #[serde(default)]
    sub: usize,
    #[serde(default)]
    dub: usize,
}

#[derive(Debug, Deserialize)]
struct ShowDetailPayload {
    show: ShowDetail,
}

#[derive(Debug, Deserialize)]
struct ShowDetail {
    #[serde(rename = "availableEpisodesDetail")]
    #[serde(default)]
    available_episodes_detail: EpisodeDetail,
}

#[derive(Debug, Deserialize, Default)]
struct EpisodeDetail {
    #[serde(default)]
    sub: Vec<String>,
    #[serde(default)]
    dub: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct EpisodePayload {
    episode: EpisodeSources,
}

#[derive(Debug, Deserialize)]
struct EpisodeSources {
    #[serde(rename = "sourceUrls")]
    source_urls: Vec<SourceDescriptor>,
}

#[derive(Debug, Deserialize)]
struct SourceDescriptor {
    #[serde(rename = "sourceUrl")]
    source_url: String,
    #[serde(rename = "sourceName")]
    #[serde(default)]
    source_name: String,
}

// --- Queries ---

const SEARCH_SHOWS_QUERY: &str = r#"query($search: SearchInput, $limit: Int, $page: Int, $translationType: VaildTranslationTypeEnumType, $countryOrigin: VaildCountryOriginEnumType) {
  shows(search: $search, limit: $limit, page: $page, translationType: $translationType, countryOrigin: $countryOrigin) {
    edges {
      _id
      name
      malId
      availableEpisodes
    }
  }
}"#;

const SHOW_DETAIL_QUERY: &str = r#"query($showId: String!) {
  show(_id: $showId) {
    _id
    availableEpisodesDetail
  }
}"#;

const EPISODE_SOURCES_QUERY: &str = r#"query($showId: String!, $translationType: VaildTranslationTypeEnumType!, $episodeString: String!) {
  episode(showId: $showId, translationType: $translationType, episodeString: $episodeString) {
    episodeString
    sourceUrls
  }
}"#;
