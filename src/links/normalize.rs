use anyhow::{Context, Result, anyhow};
use m3u8_rs::Playlist;
use regex::{NoExpand, Regex};
use reqwest::{Client, header::REFERER};
use std::sync::LazyLock;
use url::Url;

use crate::config::LinkConfig;
use crate::types::{CandidateLink, NormalizedLink};

static QUALITY_LIST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/,([^/]*),/mp4").expect("quality list regex"));

static QUALITY_PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",[^/]*").expect("quality placeholder regex"));

const AUTO_QUALITY: &str = "auto";

/// Rewrites candidate links into URLs the player can open directly.
///
/// Adaptive manifests on the configured CDNs are fetched to enumerate their
/// variants. A manifest that cannot be fetched or parsed contributes nothing;
/// the rest of the batch is still normalized.
pub struct Normalizer<'a> {
    http: &'a Client,
    config: &'a LinkConfig,
    referer: &'a str,
}

impl<'a> Normalizer<'a> {
    pub fn new(http: &'a Client, config: &'a LinkConfig, referer: &'a str) -> Self {
        Self {
            http,
            config,
            referer,
        }
    }

    pub async fn normalize(&self, candidates: &[CandidateLink]) -> Vec<NormalizedLink> {
        let mut links = Vec::new();
        for candidate in candidates {
            links.extend(self.normalize_one(candidate).await);
        }
        links
    }

    async fn normalize_one(&self, candidate: &CandidateLink) -> Vec<NormalizedLink> {
        let raw = candidate.raw_url.trim();
        if raw.is_empty() {
            return Vec::new();
        }

        let repackager = self.config.repackager_host.as_str();
        if !repackager.is_empty() && raw.contains(repackager) {
            let links = expand_repackaged(raw, repackager);
            if links.is_empty() {
                log::warn!("repackaged link from {} has no quality list: {raw}", candidate.provider);
            }
            return links;
        }

        if self.is_adaptive_manifest(raw) {
            if raw.contains("original.m3u") {
                return vec![passthrough(raw, candidate)];
            }
            return match self.fetch_variants(raw).await {
                Ok(links) => {
                    log::debug!("manifest {raw} listed {} variant(s)", links.len());
                    links
                }
                Err(err) => {
                    log::warn!("skipping {} manifest: {err:#}", candidate.provider);
                    Vec::new()
                }
            };
        }

        vec![passthrough(raw, candidate)]
    }

    fn is_adaptive_manifest(&self, raw: &str) -> bool {
        self.config
            .manifest_hosts
            .iter()
            .filter(|host| !host.is_empty())
            .any(|host| raw.contains(host.as_str()))
    }

    async fn fetch_variants(&self, manifest_url: &str) -> Result<Vec<NormalizedLink>> {
        let base = Url::parse(manifest_url)
            .with_context(|| format!("invalid manifest URL {manifest_url}"))?;
        let bytes = self
            .http
            .get(manifest_url)
            .header(REFERER, self.referer)
            .send()
            .await
            .with_context(|| format!("request failed for {manifest_url}"))?
            .error_for_status()?
            .bytes()
            .await?;

        match m3u8_rs::parse_playlist_res(&bytes) {
            Ok(Playlist::MasterPlaylist(master)) => {
                let mut links = Vec::with_capacity(master.variants.len());
                for variant in master.variants.iter().filter(|v| !v.is_i_frame) {
                    let url = base
                        .join(&variant.uri)
                        .with_context(|| format!("bad variant URI {}", variant.uri))?;
                    let quality = variant
                        .resolution
                        .map(|res| format!("{}p", res.height))
                        .unwrap_or_else(|| String::from(AUTO_QUALITY));
                    links.push(NormalizedLink::new(url.to_string(), quality));
                }
                sort_best_first(&mut links);
                Ok(links)
            }
            Ok(Playlist::MediaPlaylist(_)) => {
                Ok(vec![NormalizedLink::new(manifest_url, AUTO_QUALITY)])
            }
            Err(err) => Err(anyhow!("failed to parse manifest {manifest_url}: {err:?}")),
        }
    }
}

/// Expands a repackager URL of the form
/// `https://<host>/<cdn path>/,360p,720p,/mp4/file.mp4.urlset/master.m3u8`
/// into one direct MP4 link per listed quality, best first.
pub fn expand_repackaged(raw: &str, host: &str) -> Vec<NormalizedLink> {
    let stripped = raw.replace(&format!("{host}/"), "");
    let stripped = match stripped.find(".urlset") {
        Some(idx) => &stripped[..idx],
        None => stripped.as_str(),
    };

    let Some(list) = QUALITY_LIST.captures(raw).and_then(|caps| caps.get(1)) else {
        return Vec::new();
    };

    let mut links: Vec<NormalizedLink> = list
        .as_str()
        .split(',')
        .filter(|quality| !quality.is_empty())
        .map(|quality| {
            let url = QUALITY_PLACEHOLDER.replace_all(stripped, NoExpand(quality));
            NormalizedLink::new(url.into_owned(), quality)
        })
        .collect();
    sort_best_first(&mut links);
    links
}

fn passthrough(raw: &str, candidate: &CandidateLink) -> NormalizedLink {
    let quality = candidate
        .quality
        .clone()
        .filter(|q| !q.is_empty())
        .unwrap_or_else(|| String::from(AUTO_QUALITY));
    NormalizedLink::new(raw, quality)
}

fn sort_best_first(links: &mut [NormalizedLink]) {
    links.sort_by(|a, b| b.quality_rank().cmp(&a.quality_rank()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const REPACKAGED: &str = "https://repackager.wixmp.com/video.wixstatic.com/video/abc_123/,360p,480p,720p,/mp4/file.mp4.urlset/master.m3u8";

    const TEST_USER_AGENT: &str = "curd-test/1.0";

    const MASTER_PLAYLIST: &str = "#EXTM3U\n\
#EXT-X-STREAM-INF:BANDWIDTH=800000,RESOLUTION=640x360\n\
360/index.m3u8\n\
#EXT-X-STREAM-INF:BANDWIDTH=5000000,RESOLUTION=1920x1080\n\
1080/index.m3u8\n\
#EXT-X-I-FRAME-STREAM-INF:BANDWIDTH=100000,RESOLUTION=1920x1080,URI=\"iframe.m3u8\"\n";

    fn candidate(url: &str, quality: Option<&str>) -> CandidateLink {
        CandidateLink {
            raw_url: url.to_string(),
            quality: quality.map(String::from),
            provider: "Default".to_string(),
        }
    }

    fn config_with_manifest_host(host: &str) -> LinkConfig {
        LinkConfig {
            manifest_hosts: vec![host.to_string()],
            ..LinkConfig::default()
        }
    }

    #[test]
    fn repackaged_link_expands_to_one_link_per_quality() {
        let links = expand_repackaged(REPACKAGED, "repackager.wixmp.com");
        assert_eq!(links.len(), 3);
        for link in &links {
            assert!(link.url.contains(&link.quality), "{link}");
            assert!(!link.url.contains(','));
            assert!(!link.url.contains(".urlset"));
        }
        assert_eq!(
            links[0].url,
            "https://video.wixstatic.com/video/abc_123/720p/mp4/file.mp4"
        );
        let qualities: Vec<&str> = links.iter().map(|l| l.quality.as_str()).collect();
        assert_eq!(qualities, vec!["720p", "480p", "360p"]);
    }

    #[test]
    fn repackaged_link_without_quality_list_yields_nothing() {
        let raw = "https://repackager.wixmp.com/video.wixstatic.com/video/x/file.mp4.urlset/master.m3u8";
        assert!(expand_repackaged(raw, "repackager.wixmp.com").is_empty());
    }

    #[tokio::test]
    async fn plain_links_pass_through_and_empty_links_drop() {
        let http = Client::new();
        let config = LinkConfig::default();
        let normalizer = Normalizer::new(&http, &config, "https://allmanga.to");

        let links = normalizer
            .normalize(&[
                candidate("https://www.dropbox.com/ep.mp4", Some("1080p")),
                candidate("  ", Some("720p")),
                candidate("https://other.example/hls.m3u8", None),
            ])
            .await;

        assert_eq!(
            links,
            vec![
                NormalizedLink::new("https://www.dropbox.com/ep.mp4", "1080p"),
                NormalizedLink::new("https://other.example/hls.m3u8", "auto"),
            ]
        );
    }

    #[tokio::test]
    async fn original_manifest_is_not_fetched() {
        let http = Client::new();
        let config = config_with_manifest_host("vipanicdn");
        let normalizer = Normalizer::new(&http, &config, "https://allmanga.to");
        let raw = "https://www1.vipanicdn.net/stream/ep1.original.m3u8";

        let links = normalizer.normalize(&[candidate(raw, Some("Mp4"))]).await;
        assert_eq!(links, vec![NormalizedLink::new(raw, "Mp4")]);
    }

    #[tokio::test]
    async fn manifest_variants_resolve_against_manifest_directory() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/stream/ep1/master.m3u8"))
            .and(header("referer", "https://allmanga.to"))
            .and(header("user-agent", TEST_USER_AGENT))
            .respond_with(ResponseTemplate::new(200).set_body_string(MASTER_PLAYLIST))
            .mount(&server)
            .await;

        let http = Client::builder()
            .user_agent(TEST_USER_AGENT)
            .build()
            .unwrap();
        let config = config_with_manifest_host("127.0.0.1");
        let normalizer = Normalizer::new(&http, &config, "https://allmanga.to");
        let manifest = format!("{}/stream/ep1/master.m3u8", server.uri());

        let links = normalizer.normalize(&[candidate(&manifest, None)]).await;

        assert_eq!(
            links,
            vec![
                NormalizedLink::new(
                    format!("{}/stream/ep1/1080/index.m3u8", server.uri()),
                    "1080p"
                ),
                NormalizedLink::new(
                    format!("{}/stream/ep1/360/index.m3u8", server.uri()),
                    "360p"
                ),
            ]
        );
    }

    #[tokio::test]
    async fn failing_manifest_does_not_abort_the_batch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/broken/master.m3u8"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/ok/master.m3u8"))
            .respond_with(ResponseTemplate::new(200).set_body_string(MASTER_PLAYLIST))
            .mount(&server)
            .await;

        let http = Client::new();
        let config = config_with_manifest_host("127.0.0.1");
        let normalizer = Normalizer::new(&http, &config, "https://allmanga.to");

        let links = normalizer
            .normalize(&[
                candidate(&format!("{}/broken/master.m3u8", server.uri()), None),
                candidate("https://www.dropbox.com/ep.mp4", Some("1080p")),
                candidate(&format!("{}/ok/master.m3u8", server.uri()), None),
            ])
            .await;

        assert_eq!(links.len(), 3);
        assert_eq!(links[0].url, "https://www.dropbox.com/ep.mp4");
        assert!(links[1].url.ends_with("/ok/1080/index.m3u8"));
        assert!(links[2].url.ends_with("/ok/360/index.m3u8"));
    }

    #[tokio::test]
    async fn non_playlist_body_contributes_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/html/master.m3u8"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>blocked</html>"))
            .mount(&server)
            .await;

        let http = Client::new();
        let config = config_with_manifest_host("127.0.0.1");
        let normalizer = Normalizer::new(&http, &config, "https://allmanga.to");

        let links = normalizer
            .normalize(&[candidate(&format!("{}/html/master.m3u8", server.uri()), None)])
            .await;
        assert!(links.is_empty());
    }
}
