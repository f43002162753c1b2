//! Turns provider responses into a ranked, playable stream link.
//!
//! raw body → [`extract_candidates`] → [`Normalizer`] → [`select_link`]

pub mod cipher;
pub mod extract;
pub mod normalize;
pub mod priority;

pub use cipher::{decode_provider_path, strip_obfuscation_prefix};
pub use extract::{extract_candidates, normalize_escapes};
pub use normalize::Normalizer;
pub use priority::{PriorityTable, select_link};

use crate::error::{ResolveError, Result};
use crate::types::{CandidateLink, NormalizedLink};

/// Body of one provider's clock endpoint, escapes already normalized.
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    pub provider: String,
    pub body: String,
}

/// Extracts and normalizes links from every provider response of one episode.
///
/// Fails only when no response contained a single candidate. The returned list
/// may still be empty when every candidate needed a manifest that could not be
/// fetched.
pub async fn resolve_links(
    normalizer: &Normalizer<'_>,
    episode: &str,
    responses: &[ProviderResponse],
) -> Result<Vec<NormalizedLink>> {
    let candidates: Vec<CandidateLink> = responses
        .iter()
        .flat_map(|response| extract_candidates(&response.body, &response.provider))
        .collect();

    if candidates.is_empty() {
        return Err(ResolveError::NoLinks {
            episode: episode.to_string(),
        });
    }

    let links = normalizer.normalize(&candidates).await;
    log::debug!(
        "episode {episode}: {} candidate(s) normalized into {} link(s)",
        candidates.len(),
        links.len()
    );
    Ok(links)
}
