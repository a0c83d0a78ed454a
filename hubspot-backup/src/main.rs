//! HubSpot Backup - Main entry point

use anyhow::{bail, Result};
use clap::Parser;
use hubspot_backup::account::verify_account;
use hubspot_backup::crawler::{Crawler, EndpointOutcome};
use hubspot_backup::endpoints::default_endpoints;
use hubspot_backup::pagination::PagingOptions;
use hubspot_backup::progress::LogReporter;
use hubspot_backup::transport::{http::HttpTransport, Credentials};
use hubspot_backup::writer::ItemWriter;
use hubspot_backup::{config::Config, utils};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// HubSpot API key (sent as the `hapikey` query parameter)
    #[arg(long, env = "HAPIKEY", hide_env_values = true)]
    hapikey: Option<String>,

    /// HubSpot private app access token (sent as a bearer token)
    #[arg(long, env = "HAPI_ACCESS_KEY", hide_env_values = true)]
    accesskey: Option<String>,

    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Backup root directory (overrides config)
    #[arg(short, long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Print the effective configuration and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let args = Args::parse();

    // Load configuration
    let mut config = Config::load(args.config.as_deref())?;
    if let Some(output_dir) = args.output_dir {
        config.backup.output_dir = output_dir;
    }
    if let Some(level) = args.log_level {
        config.log.level = level;
    }

    if args.print_config {
        print!("{}", config.to_toml_string()?);
        return Ok(());
    }

    utils::logger::init(&config.log.level)?;
    tracing::info!("Starting hubspot-backup v{}", env!("CARGO_PKG_VERSION"));

    let credentials = match Credentials::resolve(args.hapikey, args.accesskey) {
        Some(credentials) => credentials,
        None => prompt_for_key()?,
    };

    let transport = Arc::new(HttpTransport::new(credentials, &config.api)?);

    if config.backup.verify_account {
        verify_account(transport.as_ref(), &config.api.base_url).await;
    }

    let crawler = Crawler::new(
        transport,
        ItemWriter::for_today(&config.backup.output_dir),
        Arc::new(LogReporter),
        PagingOptions::from(&config.backup),
    );

    let report = crawler.run(default_endpoints(&config.api.base_url)).await;

    for endpoint in &report.endpoints {
        match &endpoint.outcome {
            EndpointOutcome::Completed => tracing::info!(
                "{:>16}: {} items in {} pages",
                endpoint.name,
                endpoint.items_written,
                endpoint.pages
            ),
            EndpointOutcome::Failed(error) => tracing::warn!(
                "{:>16}: {} items, stopped early: {}",
                endpoint.name,
                endpoint.items_written,
                error
            ),
            EndpointOutcome::Running => tracing::warn!(
                "{:>16}: {} items, still in flight",
                endpoint.name,
                endpoint.items_written
            ),
        }
        if endpoint.write_failures > 0 {
            tracing::warn!("{:>16}: {} items could not be written", endpoint.name, endpoint.write_failures);
        }
    }

    let root = if report.root.is_absolute() {
        report.root.clone()
    } else {
        std::env::current_dir()?.join(&report.root)
    };
    println!("Backup saved in {}", root.display());
    println!("HUBSPOT BACKUP COMPLETE");

    Ok(())
}

/// Ask for a legacy API key on stdin
fn prompt_for_key() -> Result<Credentials> {
    println!("Thank you for using HubSpot Data & Content Backup!");
    println!("This app needs a HubSpot API key (--hapikey / HAPIKEY) or a private app access token (--accesskey / HAPI_ACCESS_KEY).");
    print!("Please enter HubSpot API key: ");
    std::io::stdout().flush()?;

    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer)?;

    match Credentials::resolve(Some(answer), None) {
        Some(credentials) => Ok(credentials),
        None => bail!("No HubSpot API key provided"),
    }
}
