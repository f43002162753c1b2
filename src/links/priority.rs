use crate::types::NormalizedLink;

/// Domain substrings in preference order, most preferred first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriorityTable {
    domains: Vec<String>,
}

impl PriorityTable {
    pub fn new<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let domains = domains
            .into_iter()
            .map(Into::into)
            .filter(|domain: &String| !domain.trim().is_empty())
            .collect();
        Self { domains }
    }

    pub fn domains(&self) -> &[String] {
        &self.domains
    }
}

/// Picks the link served from the best-ranked domain.
///
/// Within one domain the earliest link wins. Without any domain match the first
/// link is returned; `None` only for an empty input.
pub fn select_link<'a>(
    links: &'a [NormalizedLink],
    table: &PriorityTable,
) -> Option<&'a NormalizedLink> {
    let first = links.first()?;
    table
        .domains
        .iter()
        .find_map(|domain| links.iter().find(|link| link.url.contains(domain.as_str())))
        .or(Some(first))
}
