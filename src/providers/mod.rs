use crate::types::{NormalizedLink, ShowInfo, Translation};
use anyhow::Result;

pub mod allanime;

pub trait AnimeProvider {
    async fn search_shows(&self, query: &str, translation: Translation) -> Result<Vec<ShowInfo>>;
    async fn fetch_episodes(&self, show_id: &str, translation: Translation) -> Result<Vec<String>>;
    /// Every playable link for one episode, in provider order.
    async fn fetch_links(
        &self,
        show_id: &str,
        translation: Translation,
        episode: &str,
    ) -> Result<Vec<NormalizedLink>>;
}
