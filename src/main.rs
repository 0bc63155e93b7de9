use anyhow::Result;
use clap::Parser;
use log::debug;

use clipsearch::cli::SubCommandExtend;
use clipsearch::config::{Opts, SubCommand};

#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let opts = Opts::parse();
    debug!("配置目录: {}", opts.conf_dir.path().display());

    match &opts.subcmd {
        SubCommand::Index(cmd) => cmd.run(&opts).await,
        SubCommand::Search(cmd) => cmd.run(&opts).await,
        SubCommand::Count(cmd) => cmd.run(&opts).await,
        SubCommand::Embed(cmd) => cmd.run(&opts).await,
    }
}
