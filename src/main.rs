use std::{sync::Arc, time::Duration};

use clap::{
    CommandFactory, Parser, Subcommand,
    builder::{
        Styles,
        styling::{AnsiColor, Effects},
    },
};
use clap_complete::{Shell, generate};
use tokio::sync::Mutex;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use nowplaying::{cli, config, types::PendingLogin, warning};

fn styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::White.on_default() | Effects::BOLD)
        .usage(AnsiColor::White.on_default() | Effects::BOLD)
        .literal(AnsiColor::BrightGreen.on_default())
        .placeholder(AnsiColor::BrightBlue.on_default())
}

#[derive(Parser, Debug, Clone)]
#[clap(
  version = env!("CARGO_PKG_VERSION"),
  name=env!("CARGO_PKG_NAME"),
  bin_name=env!("CARGO_PKG_NAME"),
  about=env!("CARGO_PKG_DESCRIPTION"),
  styles=styles(),
)]
struct Cli {
    /// Print debug diagnostics (overrides RUST_LOG)
    #[clap(long, short, global = true)]
    verbose: bool,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Log in with Spotify and print a refresh token
    Auth(AuthOptions),

    /// Run the now-playing web server
    Serve,

    /// Show what is playing right now
    Now,

    /// Keep polling and print every change
    Watch(WatchOptions),

    /// Get shell completions
    Completions(CompletionsOption),
}

#[derive(Parser, Debug, Clone)]
pub struct AuthOptions {
    /// Also request access to recently played tracks
    #[clap(long)]
    pub recent: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct WatchOptions {
    /// Seconds between polls
    #[clap(long, default_value_t = 30)]
    pub interval: u64,
}

#[derive(Parser, Debug, Clone)]
pub struct CompletionsOption {
    shell: Shell,
}

fn init_logging(verbose: bool, serving: bool) {
    let filter = if verbose {
        EnvFilter::new("nowplaying=debug")
    } else {
        let default = if serving { "nowplaying=info" } else { "nowplaying=warn" };
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, matches!(cli.command, Command::Serve));

    if let Err(e) = config::load_env().await {
        warning!("No .env file loaded ({}), using the process environment", e);
    }

    match cli.command {
        Command::Auth(opt) => {
            let pending: Arc<Mutex<Option<PendingLogin>>> = Arc::new(Mutex::new(None));
            cli::auth(Arc::clone(&pending), opt.recent).await;
        }
        Command::Serve => cli::serve().await,
        Command::Now => cli::now().await,
        Command::Watch(opt) => cli::watch(Duration::from_secs(opt.interval.max(1))).await,
        Command::Completions(opt) => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(opt.shell, &mut cmd, name, &mut std::io::stdout())
        }
    }
}
