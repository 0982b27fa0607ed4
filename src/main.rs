use clap::Parser;
use env_logger::Env;
use log::error;

use imgdups::Opts;
use imgdups::cli::SubCommandExtend;
use imgdups::config::SubCommand;

fn main() {
    let opts = Opts::parse();

    let level = if opts.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(level))
        .format_target(false)
        .init();

    let result = match &opts.subcmd {
        SubCommand::Find(cmd) => cmd.run(&opts),
        SubCommand::Match(cmd) => cmd.run(&opts),
        SubCommand::Clean(cmd) => cmd.run(&opts),
    };

    if let Err(e) = result {
        error!("{:#}", e);
        std::process::exit(1);
    }
}
