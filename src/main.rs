use anyhow::Result;
use clap::Parser;
use env_logger::Builder;
use log::LevelFilter;

mod cli;
mod clock;
mod cursor;
mod diag;
mod engine;
mod frame;
mod node;
mod port;
mod radio;
mod role;
mod sim;
mod stats;

fn main() -> Result<()> {
    Builder::new()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();

    let args = cli::Cli::parse();
    match args.cmd {
        cli::Cmd::Serial(opts) => node::run(opts),
        cli::Cmd::Sim(opts) => sim::run(opts),
    }
}
