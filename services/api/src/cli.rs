use crate::demo::{run_demo, run_import, DemoArgs, ImportArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use deal_pipeline::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Deal Pipeline",
    about = "Run the deal flow pipeline service or drive it from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Submit a CSV discovery feed and print the resulting flows
    Import(ImportArgs),
    /// Run sample properties through the pipeline and print stats
    Demo(DemoArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Override the delay before auto-advancement checks, in seconds
    #[arg(long)]
    pub(crate) auto_advance_secs: Option<u64>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Import(args) => run_import(args).await,
        Command::Demo(args) => run_demo(args).await,
    }
}
