use regex::Regex;
use std::sync::LazyLock;

use crate::types::CandidateLink;

static LINK_WITH_RESOLUTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"link":"([^"]*)".*"resolutionStr":"([^"]*)""#).expect("link regex")
});

static ENGLISH_HARDSUB_MANIFEST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"hls","url":"([^"]*)".*"hardsub_lang":"en-US""#).expect("hls regex")
});

/// Undoes the JSON escaping the clock endpoint applies to URLs.
pub fn normalize_escapes(body: &str) -> String {
    body.replace("\\u002F", "/").replace('\\', "")
}

/// Pulls stream URLs out of a provider response body.
///
/// The body is treated as text and cut at object boundaries. Every
/// `link`/`resolutionStr` match comes first, followed by English hard-subbed
/// HLS manifests, each group in body order. Duplicates are kept.
pub fn extract_candidates(body: &str, provider: &str) -> Vec<CandidateLink> {
    let chunks: Vec<&str> = body.split("},{").collect();

    let mut candidates: Vec<CandidateLink> = chunks
        .iter()
        .filter_map(|chunk| LINK_WITH_RESOLUTION.captures(chunk))
        .map(|caps| CandidateLink {
            raw_url: caps[1].to_string(),
            quality: Some(caps[2].to_string()),
            provider: provider.to_string(),
        })
        .collect();

    candidates.extend(
        chunks
            .iter()
            .filter_map(|chunk| ENGLISH_HARDSUB_MANIFEST.captures(chunk))
            .map(|caps| CandidateLink {
                raw_url: caps[1].to_string(),
                quality: None,
                provider: provider.to_string(),
            }),
    );

    log::trace!(
        "extracted {} candidate link(s) from {provider}",
        candidates.len()
    );
    candidates
}
