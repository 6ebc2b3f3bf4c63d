use anyhow::Result;
use clap::Parser;
use env_logger::Env;
use imfind::cli::SubCommandExtend;
use imfind::config::{Opts, SubCommand};

fn main() -> Result<()> {
    env_logger::init_from_env(Env::default().default_filter_or("info"));

    let opts = Opts::parse();
    match &opts.subcmd {
        SubCommand::Scrape(cmd) => cmd.run(&opts),
        SubCommand::Histogram(cmd) => cmd.run(&opts),
        SubCommand::Embedding(cmd) => cmd.run(&opts),
    }
}
