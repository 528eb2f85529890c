use anyhow::Result;
use clap::Parser;
use embedscape::Opts;
use embedscape::cli::SubCommandExtend;
use embedscape::config::SubCommand;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let opts = Opts::parse();

    match &opts.subcmd {
        SubCommand::Plot(config) => config.run(&opts),
        SubCommand::Reduce(config) => config.run(&opts),
        SubCommand::Check(config) => config.run(&opts),
    }
}
