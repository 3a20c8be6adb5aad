use clap::Parser;
use tracing::Level;

use everything_search::cli::{run_cli, CliArgs};

fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    // 日志写到 stderr，stdout 只留给结果
    tracing_subscriber::fmt()
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::WARN })
        .with_ansi(false)
        .with_writer(std::io::stderr)
        .init();

    run_cli(args)
}
