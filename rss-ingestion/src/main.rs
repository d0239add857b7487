use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use rss_ingestion::graph::{migrate, GraphClient, GraphConfig, GraphStore};
use rss_ingestion::{FeedSource, FetchConfig, Fetcher, IngestContext, RssIngester};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rss-ingestion", about = "Incremental RSS/Atom ingestion into a Neo4j graph")]
struct Cli {
    #[command(flatten)]
    graph: GraphArgs,

    #[command(flatten)]
    fetch: FetchArgs,

    /// Emit logs as JSON lines
    #[arg(long, env = "LOG_JSON", default_value_t = false)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct GraphArgs {
    #[arg(long, env = "NEO4J_URI", default_value = "neo4j://localhost:7687")]
    neo4j_uri: String,

    #[arg(long, env = "NEO4J_USER", default_value = "neo4j")]
    neo4j_user: String,

    #[arg(long, env = "NEO4J_PASSWORD", default_value = "", hide_env_values = true)]
    neo4j_password: String,

    #[arg(long, env = "NEO4J_DATABASE", default_value = "neo4j")]
    neo4j_database: String,
}

#[derive(Args)]
struct FetchArgs {
    #[arg(long, env = "FEED_USER_AGENT")]
    user_agent: Option<String>,

    #[arg(long, env = "FEED_TIMEOUT_SECONDS")]
    timeout_seconds: Option<u64>,

    #[arg(long, env = "FEED_MAX_RETRIES")]
    max_retries: Option<u32>,
}

#[derive(Subcommand)]
enum Command {
    /// Register a feed source (existing names are left untouched)
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        url: String,
        #[arg(long, default_value = "")]
        schedule: String,
        #[arg(long, default_value = "")]
        etag: String,
        #[arg(long, default_value = "")]
        last_updated: String,
    },
    /// List registered feed sources
    List,
    /// Ingest one feed source by name
    Ingest { name: String },
    /// Ingest every registered feed source
    IngestAll,
    /// Install uniqueness constraints
    Migrate,
}

impl From<GraphArgs> for GraphConfig {
    fn from(args: GraphArgs) -> Self {
        Self {
            uri: args.neo4j_uri,
            user: args.neo4j_user,
            password: args.neo4j_password,
            database: args.neo4j_database,
        }
    }
}

impl From<FetchArgs> for FetchConfig {
    fn from(args: FetchArgs) -> Self {
        let defaults = FetchConfig::default();
        Self {
            user_agent: args.user_agent.unwrap_or(defaults.user_agent),
            timeout_seconds: args.timeout_seconds.unwrap_or(defaults.timeout_seconds),
            max_retries: args.max_retries.unwrap_or(defaults.max_retries),
            ..defaults
        }
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let graph_config = GraphConfig::from(cli.graph);
    info!("Connecting to Neo4j at {}", graph_config.uri);
    let client = GraphClient::connect(&graph_config)
        .await
        .with_context(|| format!("Failed to connect to Neo4j at {}", graph_config.uri))?;
    let store: Arc<dyn GraphStore> = Arc::new(client);

    if let Command::Migrate = cli.command {
        let applied = migrate(store.as_ref()).await?;
        info!("Applied {} schema statements", applied);
        return Ok(());
    }

    let fetcher = Fetcher::new(FetchConfig::from(cli.fetch)).context("Failed to build HTTP client")?;
    let ingester = RssIngester::new(IngestContext::from_graph(store, Arc::new(fetcher)));

    match cli.command {
        Command::Register {
            name,
            url,
            schedule,
            etag,
            last_updated,
        } => {
            let stored = ingester
                .register(FeedSource {
                    name,
                    url,
                    schedule,
                    etag,
                    last_updated,
                    ..Default::default()
                })
                .await?;
            print_json(&stored)?;
        }
        Command::List => {
            print_json(&ingester.list_sources().await?)?;
        }
        Command::Ingest { name } => {
            let summary = ingester.ingest_source(&name).await;
            print_json(&summary)?;
            if summary.has_error() {
                error!("Ingestion of {} failed: {}", name, summary.error);
                std::process::exit(1);
            }
        }
        Command::IngestAll => {
            let summaries = ingester.ingest_all().await?;
            print_json(&summaries)?;
        }
        Command::Migrate => {}
    }

    Ok(())
}
