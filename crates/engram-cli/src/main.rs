use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

mod commands;
mod output;

#[derive(Parser)]
#[command(
    name = "engram",
    version,
    about = "Lazy, git-native dependency manager for engram context modules"
)]
struct Cli {
    /// Increase verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Output format
    #[arg(long, global = true, default_value = "text")]
    format: output::OutputFormat,

    #[command(subcommand)]
    command: commands::Commands,
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        commands::Commands::Init(args) => commands::init::run(args, cli.format),
        commands::Commands::Add(args) => commands::add::run(args, cli.format),
        commands::Commands::LazyInit(args) => commands::lazy_init::run(args, cli.format),
        commands::Commands::ShowIndex(args) => commands::show_index::run(args, cli.format),
        commands::Commands::List(args) => commands::list::run(args, cli.format),
        commands::Commands::Tree(args) => commands::tree::run(args),
        commands::Commands::Fetch(args) => commands::fetch::run(args),
        commands::Commands::Push(args) => commands::push::run(args),
    }
}
