use arcturus_core::ProcessStatus;
use clap::{Args, Parser, Subcommand};
use reqwest::Client;
use serde_json::Value;
use std::path::PathBuf;
use std::process;
use std::time::Duration;

mod api;
mod watch;

use api::Lifecycle;
use watch::WatchOptions;

#[derive(Parser)]
#[command(name = "arcturus")]
#[command(about = "Arcturus tileserver control client", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Control API URL
    #[arg(long, default_value = "http://localhost:8000")]
    server: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Check control API health and tileserver status
    Health,

    /// Show tileserver process status
    Status,

    /// Start the tileserver
    Start,

    /// Stop the tileserver
    Stop,

    /// Stop then start the tileserver
    Restart,

    /// Send SIGHUP so the tileserver reloads its config
    Reload,

    /// List configured maps
    Maps,

    /// List configured sources
    Sources,

    /// Grow the config one source block at a time, reloading after each step
    Watch(WatchArgs),
}

#[derive(Args)]
struct WatchArgs {
    /// Tileserver config to stage
    #[arg(short, long, default_value = "tileserver.config.toml")]
    config: PathBuf,

    /// Tileserver base URL to poll
    #[arg(long, default_value = "http://localhost:8081")]
    tileserver_url: String,

    /// Seconds between polls
    #[arg(long, default_value = "5")]
    interval: u64,

    /// Seconds between config stages
    #[arg(long, default_value = "60")]
    reload_interval: u64,

    /// Per-request timeout in seconds
    #[arg(long, default_value = "3")]
    timeout: u64,
}

impl From<WatchArgs> for WatchOptions {
    fn from(args: WatchArgs) -> Self {
        WatchOptions {
            config_path: args.config,
            tileserver_url: args.tileserver_url,
            interval: Duration::from_secs(args.interval.max(1)),
            reload_interval: Duration::from_secs(args.reload_interval),
            timeout: Duration::from_secs(args.timeout.max(1)),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let client = Client::new();

    if let Err(e) = dispatch(&client, &cli.server, cli.command).await {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }

    Ok(())
}

async fn dispatch(client: &Client, server: &str, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Health => {
            let health = api::health(client, server).await?;
            println!("Control API: {}", health.status);
            print_status(&health.tileserver);
        }
        Commands::Status => {
            print_status(&api::process_status(client, server).await?);
        }
        Commands::Start => {
            print_status(&api::lifecycle(client, server, Lifecycle::Start).await?);
        }
        Commands::Stop => {
            print_status(&api::lifecycle(client, server, Lifecycle::Stop).await?);
        }
        Commands::Restart => {
            print_status(&api::lifecycle(client, server, Lifecycle::Restart).await?);
        }
        Commands::Reload => {
            print_status(&api::lifecycle(client, server, Lifecycle::Sighup).await?);
        }
        Commands::Maps => {
            let maps = api::maps(client, server).await?;
            if maps.is_empty() {
                println!("No maps configured");
            }
            for map in &maps {
                println!("{}  {}", field(map, "id"), field(map, "path"));
            }
        }
        Commands::Sources => {
            let sources = api::sources(client, server).await?;
            if sources.is_empty() {
                println!("No sources configured");
            }
            for source in &sources {
                println!("{}  {}", field(source, "id"), field(source, "path"));
            }
        }
        Commands::Watch(args) => {
            watch::run(client, server, &args.into()).await?;
        }
    }

    Ok(())
}

fn print_status(status: &ProcessStatus) {
    match status.pid {
        Some(pid) if status.running => println!("Tileserver: RUNNING (pid {})", pid),
        _ => println!("Tileserver: STOPPED"),
    }
}

fn field<'a>(entry: &'a Value, key: &str) -> &'a str {
    entry.get(key).and_then(Value::as_str).unwrap_or("-")
}
