mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use ingestor::config::Config;
use ingestor::{api, store};

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[tokio::main]
async fn main() -> Result<(), AnyError> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Serve => run_serve().await,
        Commands::Migrate => run_migrate(),
        Commands::Doctor => run_doctor(),
    };

    if let Err(err) = result {
        eprintln!("ingestor: {err}");
        std::process::exit(1);
    }

    Ok(())
}

async fn run_serve() -> Result<(), AnyError> {
    let config = Config::load().map_err(|e| format!("failed to load configuration: {e}"))?;
    api::run(config).await
}

fn run_migrate() -> Result<(), AnyError> {
    let config = Config::load().map_err(|e| format!("failed to load configuration: {e}"))?;
    let store = store::Store::open(&config.server.store_path)?;
    store.persist()?;
    println!("store at {} is up to date, no migration needed", config.server.store_path);
    Ok(())
}

fn run_doctor() -> Result<(), AnyError> {
    let config = Config::load().map_err(|e| format!("failed to load configuration: {e}"))?;
    println!("configuration loaded and validated");
    println!("  bind_addr: {}", config.server.bind_addr);
    println!("  store_path: {}", config.server.store_path);

    let store = store::Store::open(&config.server.store_path)?;
    let pending = store.pending_job_count()?;
    let (_, total_requests) = store.list_requests(0, 0)?;
    println!("store opened successfully");
    println!("  pending jobs: {pending}");
    println!("  total requests: {total_requests}");
    Ok(())
}
