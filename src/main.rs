use std::{cmp::Ordering, path::PathBuf};

use anyhow::{Context, Result, bail};
use clap::Parser;
use dialoguer::{FuzzySelect, Select, theme::ColorfulTheme};

mod config;
mod error;
mod filler;
mod links;
mod logger;
mod player;
mod providers;
mod types;

use crate::config::Config;
use error::ResolveError;
use filler::{FillerList, JikanClient};
use links::select_link;
use player::{Playback, launch_player};
use providers::{AnimeProvider, allanime::AllAnimeClient};
use types::{NormalizedLink, ShowInfo, Translation};

#[derive(Debug, Parser)]
#[command(name = "curd", about = "Watch anime from AllAnime in mpv.", version)]
struct Cli {
    /// Prefer dubbed episodes over the configured translation.
    #[arg(long, conflicts_with = "sub")]
    dub: bool,

    /// Prefer subbed episodes over the configured translation.
    #[arg(long)]
    sub: bool,

    /// Skip filler episodes when advancing to the next episode.
    #[arg(long)]
    skip_filler: bool,

    #[arg(short = 'e', long, value_name = "EPISODE")]
    episode: Option<String>,

    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Print the selected link instead of starting the player.
    #[arg(long)]
    print: bool,

    /// Pick the stream by hand instead of by domain priority.
    #[arg(long)]
    select_link: bool,

    #[arg(long)]
    debug: bool,

    /// Write the default configuration file and exit.
    #[arg(long)]
    write_config: bool,

    #[arg(value_name = "QUERY")]
    query: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let result = run().await;
    if let Err(err) = &result {
        eprintln!("error: {err:?}");
    }
    result
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => config::default_config_path()?,
    };

    if cli.write_config {
        config::write_default(&config_path)?;
        println!("Wrote default configuration to {}", config_path.display());
        return Ok(());
    }

    let config = config::load(&config_path)?;
    logger::init(cli.debug, &config.log)?;
    log::debug!("configuration loaded from {}", config_path.display());

    let translation = if cli.dub {
        Translation::Dub
    } else if cli.sub {
        Translation::Sub
    } else {
        config.playback.translation
    };

    if cli.query.is_empty() {
        println!("No query provided. Use `curd <name>`.");
        return Ok(());
    }

    let client = AllAnimeClient::new(&config)?;
    let query = cli.query.join(" ");
    let shows = client.search_shows(&query, translation).await?;
    if shows.is_empty() {
        bail!("No results for \"{}\" ({})", query, translation.label());
    }

    let options: Vec<String> = shows
        .iter()
        .map(|s| {
            format!(
                "{} [{} episodes]",
                s.title,
                s.available_eps.for_translation(translation)
            )
        })
        .collect();
    let selection = FuzzySelect::with_theme(&theme())
        .with_prompt("Select a show (Esc to cancel)")
        .items(&options)
        .default(0)
        .interact_opt()?;
    let Some(idx) = selection else {
        println!("Cancelled.");
        return Ok(());
    };

    play_show(&client, &config, &cli, translation, &shows[idx]).await
}

async fn play_show(
    client: &impl AnimeProvider,
    config: &Config,
    cli: &Cli,
    translation: Translation,
    show: &ShowInfo,
) -> Result<()> {
    let episodes = sorted_episode_labels(&client.fetch_episodes(&show.id, translation).await?);
    if episodes.is_empty() {
        bail!(
            "No {} episodes available for {}",
            translation.label(),
            show.title
        );
    }

    let latest_available = episodes
        .last()
        .cloned()
        .unwrap_or_else(|| String::from("1"));
    println!(
        "Found {} {} episodes. Latest available: {}.",
        episodes.len(),
        translation.label(),
        latest_available
    );

    let (mut current_episode, mut skip_selection) = match &cli.episode {
        Some(ep) if episodes.contains(ep) => (ep.clone(), true),
        Some(ep) => {
            println!(
                "Episode '{}' does not exist for '{}'. Showing episode list.",
                ep, show.title
            );
            (latest_available.clone(), false)
        }
        None => (latest_available.clone(), false),
    };
    let priority = config.links.priority_table();
    log::debug!("link priority: {}", priority.domains().join(", "));

    let fillers = if cli.skip_filler || config.playback.skip_filler {
        load_filler_list(config, show).await
    } else {
        None
    };

    loop {
        let default_idx = episodes
            .iter()
            .position(|ep| ep == &current_episode)
            .unwrap_or(episodes.len() - 1);

        let idx = if skip_selection {
            skip_selection = false;
            default_idx
        } else {
            let selection = Select::with_theme(&theme())
                .with_prompt("Episode to play (Enter to select, Esc to cancel)")
                .items(&episodes)
                .default(default_idx)
                .interact_opt()?;
            let Some(i) = selection else {
                println!("Exiting playback loop.");
                return Ok(());
            };
            i
        };
        let chosen = episodes[idx].clone();

        println!("Fetching links for episode {}...", chosen);
        let links = match client.fetch_links(&show.id, translation, &chosen).await {
            Ok(links) => links,
            Err(err) => {
                match err.downcast_ref::<ResolveError>() {
                    Some(ResolveError::NoLinks { .. } | ResolveError::NoSources { .. }) => println!(
                        "Episode {chosen} is not released yet for {} translation.",
                        translation.label()
                    ),
                    _ => println!("Error fetching links: {err:#}"),
                }
                current_episode = chosen;
                continue;
            }
        };

        let selected = if cli.select_link {
            choose_link(&links)?
        } else {
            select_link(&links, &priority).cloned()
        };
        let Some(link) = selected else {
            println!("No playable link for episode {chosen}. Pick another episode.");
            current_episode = chosen;
            continue;
        };
        log::info!("selected {link}");

        if cli.print {
            println!("{}", link.url);
            return Ok(());
        }

        let playback = Playback::new(&show.title, &chosen, &config.allanime);
        launch_player(&config.player, &link, &playback)
            .await
            .with_context(|| format!("playback of episode {chosen} failed"))?;

        match next_episode_label(&chosen, &episodes, fillers.as_ref()) {
            Some(next) => current_episode = next,
            None => {
                println!("No further episodes found. Exiting.");
                return Ok(());
            }
        }
    }
}

/// Filler lookups are best effort; any failure just disables skipping.
async fn load_filler_list(config: &Config, show: &ShowInfo) -> Option<FillerList> {
    let Some(mal_id) = show.mal_id else {
        println!("No MyAnimeList id for {}; filler episodes will not be skipped.", show.title);
        return None;
    };
    let result = match JikanClient::new(config) {
        Ok(client) => client.fetch_filler_episodes(mal_id).await,
        Err(err) => Err(err),
    };
    match result {
        Ok(list) if list.is_empty() => {
            log::debug!("no filler episodes listed for MAL {mal_id}");
            None
        }
        Ok(list) => {
            println!("{} filler episode(s) will be skipped.", list.len());
            Some(list)
        }
        Err(err) => {
            log::warn!("filler lookup failed, assuming no filler: {err:#}");
            None
        }
    }
}

fn choose_link(links: &[NormalizedLink]) -> Result<Option<NormalizedLink>> {
    if links.is_empty() {
        return Ok(None);
    }
    let labels: Vec<String> = links.iter().map(NormalizedLink::to_string).collect();
    let selection = Select::with_theme(&theme())
        .with_prompt("Select a stream")
        .items(&labels)
        .default(0)
        .interact_opt()?;
    Ok(selection.map(|idx| links[idx].clone()))
}

fn compare_episode_labels(left: &str, right: &str) -> Ordering {
    let l = parse_episode_key(left);
    let r = parse_episode_key(right);
    l.partial_cmp(&r).unwrap_or(Ordering::Equal)
}

fn parse_episode_key(label: &str) -> f32 {
    label.parse::<f32>().unwrap_or(0.0)
}

fn sorted_episode_labels(episodes: &[String]) -> Vec<String> {
    let mut sorted = episodes.to_vec();
    sorted.sort_by(|a, b| compare_episode_labels(a, b));
    sorted.dedup();
    sorted
}

fn next_episode_label(
    current: &str,
    episodes: &[String],
    fillers: Option<&FillerList>,
) -> Option<String> {
    let sorted = sorted_episode_labels(episodes);
    let pos = sorted.iter().position(|ep| ep == current)?;
    sorted.into_iter().skip(pos + 1).find(|label| match fillers {
        Some(list) if list.is_filler(label) => {
            println!("Filler episode, skipping: {label}");
            false
        }
        _ => true,
    })
}

fn theme() -> ColorfulTheme {
    ColorfulTheme::default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn episodes_sort_numerically() {
        let sorted = sorted_episode_labels(&labels(&["10", "2", "1", "2", "6.5"]));
        assert_eq!(sorted, labels(&["1", "2", "6.5", "10"]));
    }

    #[test]
    fn next_episode_follows_numeric_order() {
        let episodes = labels(&["3", "1", "2"]);
        assert_eq!(next_episode_label("1", &episodes, None), Some(String::from("2")));
        assert_eq!(next_episode_label("3", &episodes, None), None);
        assert_eq!(next_episode_label("9", &episodes, None), None);
    }

    #[test]
    fn next_episode_skips_listed_fillers() {
        let episodes = labels(&["1", "2", "3", "4", "5", "5.5"]);
        let fillers = FillerList::new([2, 3]);
        assert_eq!(
            next_episode_label("1", &episodes, Some(&fillers)),
            Some(String::from("4"))
        );
        assert_eq!(
            next_episode_label("2", &episodes, Some(&fillers)),
            Some(String::from("4"))
        );
        let trailing = FillerList::new([5]);
        assert_eq!(
            next_episode_label("4", &episodes, Some(&trailing)),
            Some(String::from("5.5"))
        );
        let everything = FillerList::new([4, 5]);
        assert_eq!(
            next_episode_label("3", &labels(&["3", "4", "5"]), Some(&everything)),
            None
        );
    }

    #[tokio::test]
    async fn filler_list_from_jikan_drives_auto_advance() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/anime/21/episodes"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"pagination":{"has_next_page":false},"data":[{"mal_id":1,"filler":false},{"mal_id":2,"filler":true},{"mal_id":3,"filler":false}]}"#,
            ))
            .mount(&server)
            .await;

        let mut config = Config::default();
        config.filler.api_url = server.uri();
        config.filler.request_interval_ms = 0;
        let show = ShowInfo {
            id: String::from("ReooPAxPMsHM4KPMY"),
            title: String::from("One Piece"),
            available_eps: Default::default(),
            mal_id: Some(21),
        };

        let fillers = load_filler_list(&config, &show).await;
        let episodes = labels(&["1", "2", "3"]);
        assert_eq!(
            next_episode_label("1", &episodes, fillers.as_ref()),
            Some(String::from("3"))
        );
    }

    #[tokio::test]
    async fn show_without_mal_id_skips_nothing() {
        let show = ShowInfo {
            id: String::from("x"),
            title: String::from("Unknown"),
            available_eps: Default::default(),
            mal_id: None,
        };
        assert!(load_filler_list(&Config::default(), &show).await.is_none());
    }

    #[test]
    fn sub_and_dub_flags_conflict() {
        assert!(Cli::try_parse_from(["curd", "--sub", "--dub", "x"]).is_err());
        let cli = Cli::try_parse_from(["curd", "--sub", "--skip-filler", "x"]).unwrap();
        assert!(cli.sub);
        assert!(cli.skip_filler);
    }

    #[test]
    fn cli_parses_flags_and_query() {
        let cli = Cli::try_parse_from(["curd", "--dub", "-e", "4", "--print", "one", "piece"])
            .unwrap();
        assert!(cli.dub);
        assert!(cli.print);
        assert_eq!(cli.episode.as_deref(), Some("4"));
        assert_eq!(cli.query.join(" "), "one piece");
    }
}
