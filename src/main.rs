use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use eventlog_sync::commands::{run_create_dirs, run_query, DownloadPlan, EventLogSync};
use eventlog_sync::config::{self, ApiConfig, AuthConfig, LayoutConfig};
use eventlog_sync::layout::expand_home;
use eventlog_sync::security::{PasswordGrantClient, TokenCache};
use eventlog_sync::transport::event_log::EventLogDownloader;
use eventlog_sync::transport::query::QueryClient;
use eventlog_sync::utils;

#[derive(Parser)]
#[command(
    name = "eventlog-sync",
    version,
    about = "Query a Salesforce org and pull EventLogFile downloads into a sprint directory tree"
)]
struct AppCli {
    /// Env file to load instead of ./.env
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a SOQL query and print the JSON response
    Query {
        /// Path to a .soql file, or the query text itself
        input: String,
    },
    /// Create <base>/<year>/<quarter>/<sprint>/<dir> for every mapped event type
    CreateDirs {
        financial_year: String,
        quarter: String,
        sprint_name: String,
    },
    /// Download log files for every pair in EVENT_QUERY_PAIRS, or for one pair
    Download {
        /// Event type to process instead of EVENT_QUERY_PAIRS
        #[arg(long, requires = "query")]
        event_type: Option<String>,
        /// Query file or SOQL for --event-type
        #[arg(long, requires = "event_type")]
        query: Option<String>,
    },
}

fn query_client(
    http_client: reqwest::Client,
    api: &ApiConfig,
) -> Result<QueryClient<PasswordGrantClient>> {
    let auth = AuthConfig::from_env().context("loading org credentials")?;
    let lifetime = auth.token_lifetime();
    let authenticator = PasswordGrantClient::new(auth, http_client.clone());
    let tokens = Arc::new(TokenCache::new(authenticator, lifetime));
    Ok(QueryClient::new(http_client, api.api_version.clone(), tokens))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = AppCli::parse();
    let dotenv = config::load_dotenv(args.env_file.as_deref());
    utils::logging::init(args.verbose);
    dotenv?;

    match args.command {
        Commands::Query { input } => {
            let api = ApiConfig::from_env()?;
            let client = query_client(api.http_client()?, &api)?;
            let body = run_query(&client, &input).await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        Commands::CreateDirs {
            financial_year,
            quarter,
            sprint_name,
        } => {
            let layout = LayoutConfig::from_env()?;
            let dirs = run_create_dirs(&layout, &financial_year, &quarter, &sprint_name)?;
            info!(count = dirs.len(), "sprint directories ready");
        }
        Commands::Download { event_type, query } => {
            let api = ApiConfig::from_env()?;
            let layout = LayoutConfig::from_env()?;
            let client = query_client(api.http_client()?, &api)?;
            let downloader = EventLogDownloader::new(
                api.download_client()?,
                api.api_version.clone(),
                api.domain_name.clone(),
            );
            let plan = DownloadPlan {
                download_root: expand_home(layout.require_current_sprint_dir()?),
                event_types: layout.event_types,
            };

            let pairs = match (event_type, query) {
                (Some(event_type), Some(query)) => [(event_type, query)].into_iter().collect(),
                _ => config::event_query_pairs_from_env()?,
            };

            let sync = EventLogSync::new(&client, &downloader, &plan);
            let summary = sync.run_all(&pairs).await?;
            if summary.failed > 0 {
                warn!(
                    downloaded = summary.downloaded,
                    failed = summary.failed,
                    "some log files could not be downloaded"
                );
            } else {
                info!(
                    downloaded = summary.downloaded,
                    bytes = summary.bytes,
                    "all log files downloaded"
                );
            }
        }
    }

    Ok(())
}
