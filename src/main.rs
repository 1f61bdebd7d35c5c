mod app;
mod cli;
mod ffmpeg;
mod inspect;
mod metadata;
mod task;
mod util;

use anyhow::Result;
use log::LevelFilter;

fn main() -> Result<()> {
    let args = cli::Args::parse_env();

    let level = if args.debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp(None)
        .target(env_logger::Target::Stderr)
        .init();

    app::run(args)
}
