use anyhow::{Context, Result};
use chrono::Local;
use env_logger::{Builder, Target};
use log::LevelFilter;
use std::fs::OpenOptions;
use std::io::Write;

use crate::config::LogConfig;

/// Installs the global logger. Only records from this crate are printed.
pub fn init(debug: bool, config: &LogConfig) -> Result<()> {
    let mut builder = formatted_local_time_builder("%H:%M:%S.%3f");
    builder
        .filter_level(if debug {
            LevelFilter::Trace
        } else {
            LevelFilter::Info
        })
        .parse_default_env();

    if let Some(path) = &config.file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open log file {}", path.display()))?;
        builder.target(Target::Pipe(Box::new(file)));
        builder.write_style(env_logger::WriteStyle::Never);
    }

    builder.try_init().context("logger already initialised")
}

fn formatted_local_time_builder(fmt: &'static str) -> Builder {
    let mut builder = Builder::new();

    builder.format(move |f, record| {
        let target = record.target();
        let crate_target = clap::crate_name!();

        if !(target == crate_target || target.starts_with(&format!("{crate_target}::"))) {
            return Ok(());
        }

        let style = f.default_level_style(record.level());
        let time = Local::now().format(fmt);

        writeln!(
            f,
            "{} {style}{:<5}{style:#} > {}",
            time,
            record.level(),
            record.args()
        )
    });

    builder
}
