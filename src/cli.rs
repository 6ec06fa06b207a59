use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "ingestor")]
#[command(about = "Content ingestion platform: admission, fetch/analyze pipeline, SEO surfaces")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP API, worker pool, and background sweepers in one process.
    Serve,

    /// Apply any pending store layout migrations and exit.
    Migrate,

    /// Inspect store health and configuration without booting the server.
    Doctor,
}
