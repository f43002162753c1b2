use anyhow::{Context, Result, anyhow, bail};
use tokio::process::Command;

use crate::config::{AllAnimeConfig, PlayerConfig};
use crate::types::NormalizedLink;

pub const PLAYER_ENV_KEY: &str = "CURD_PLAYER__COMMAND";

/// What the player needs besides the URL itself.
pub struct Playback<'a> {
    pub title: &'a str,
    pub episode: &'a str,
    pub referer: &'a str,
    pub user_agent: &'a str,
}

impl<'a> Playback<'a> {
    pub fn new(title: &'a str, episode: &'a str, source: &'a AllAnimeConfig) -> Self {
        Self {
            title,
            episode,
            referer: &source.referer,
            user_agent: &source.user_agent,
        }
    }
}

/// Splits the configured command line and appends the playback arguments.
pub fn player_command_line(
    config: &PlayerConfig,
    link: &NormalizedLink,
    playback: &Playback<'_>,
) -> Result<Vec<String>> {
    let mut argv = shlex::split(&config.command)
        .filter(|parts| !parts.is_empty())
        .ok_or_else(|| anyhow!("invalid player command {:?}", config.command))?;

    argv.push(String::from("--quiet"));
    argv.push(format!(
        "--force-media-title={} - Episode {}",
        playback.title, playback.episode
    ));
    argv.push(format!("--user-agent={}", playback.user_agent));
    argv.push(format!("--referrer={}", playback.referer));
    argv.push(format!("--http-header-fields=Referer: {}", playback.referer));
    argv.extend(config.args.iter().cloned());
    argv.push(link.url.clone());
    Ok(argv)
}

pub async fn launch_player(
    config: &PlayerConfig,
    link: &NormalizedLink,
    playback: &Playback<'_>,
) -> Result<()> {
    let argv = player_command_line(config, link, playback)?;
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| anyhow!("empty player command"))?;

    log::info!("launching {program} on {} ({})", link.url, link.quality);
    let status = match Command::new(program).args(args).status().await {
        Ok(status) => status,
        Err(err) => {
            if err.kind() == std::io::ErrorKind::NotFound {
                return Err(anyhow!(
                    "Player '{}' not found. Install mpv or set {} / player.command to a valid command.",
                    program,
                    PLAYER_ENV_KEY
                ));
            }
            return Err(err).context(format!("failed to launch player '{program}'"));
        }
    };

    if !status.success() {
        bail!("player exited with status {status}");
    }
    Ok(())
}
