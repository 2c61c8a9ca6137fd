use clap::{Parser, Subcommand};
use std::io::Read;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

use brandmatch::config::{AppConfig, ConfigError};
use brandmatch::handler::ApiRequest;
use brandmatch::registry::RegistryError;
use brandmatch::{routes, server, telemetry};

#[derive(Parser)]
#[command(name = "brandmatch")]
#[command(about = "Brand and influencer marketplace API")]
#[command(version)]
struct Cli {
    /// JSON configuration file; defaults apply when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve every route over HTTP with in-memory stores
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        host: IpAddr,

        #[arg(short, long, default_value_t = 3000)]
        port: u16,
    },
    /// Run one request event and print the response envelope
    Invoke {
        /// Event file, or `-` for stdin
        #[arg(short, long)]
        event: PathBuf,
    },
    /// List registered route keys
    Routes,
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to build routes: {0}")]
    Registry(#[from] RegistryError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid event: {0}")]
    Event(#[from] serde_json::Error),
}

fn load_config(path: Option<&PathBuf>) -> Result<AppConfig, ConfigError> {
    match path {
        Some(path) => AppConfig::from_file(path),
        None => Ok(AppConfig::default()),
    }
}

fn read_event(path: &PathBuf) -> Result<ApiRequest, CliError> {
    let raw = if path.as_os_str() == "-" {
        let mut raw = String::new();
        std::io::stdin().read_to_string(&mut raw)?;
        raw
    } else {
        std::fs::read_to_string(path)?
    };
    Ok(serde_json::from_str(&raw)?)
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config = load_config(cli.config.as_ref())?;
    telemetry::init(&config.log);

    let (handler, _stores) = routes::in_memory_handler(&config)?;

    match cli.command {
        Command::Serve { host, port } => {
            let addr = SocketAddr::new(host, port);
            println!("Serving {} routes on http://{}", handler.registry().len(), addr);
            server::serve(addr, Arc::new(handler)).await?;
        }
        Command::Invoke { event } => {
            let request = read_event(&event)?;
            let envelope = handler.handle(request);
            println!("{}", serde_json::to_string_pretty(&envelope)?);
        }
        Command::Routes => {
            for key in handler.registry().route_keys() {
                println!("{}", key);
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("✗ {}", e);
        std::process::exit(1);
    }
}
