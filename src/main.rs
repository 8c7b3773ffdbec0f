// Product detail scraper CLI
//
// Subcommands cover the whole pipeline: `enqueue` feeds URLs into the local
// job queue, `worker` drains it, `export`/`count` read results back out, and
// `batch`/`scrape` run without a queue.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use kodegen_tools_pdpscrape::batch::run_batch_file;
use kodegen_tools_pdpscrape::export::{count_rows, parse_fields, write_records};
use kodegen_tools_pdpscrape::ingest::enqueue_file;
use kodegen_tools_pdpscrape::worker::{shutdown_channel, spawn_signal_listener};
use kodegen_tools_pdpscrape::{
    JobConsumer, ProxySettings, ScrapeConfig, ScraperFactory, SqliteJobStore, WorkerConfig,
};

#[derive(Parser, Debug)]
#[command(
    name = "kodegen-pdpscrape",
    version,
    about = "Session-authenticated product detail scraper"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Drain the job queue until idle or interrupted
    Worker {
        #[command(flatten)]
        scrape: ScrapeArgs,
        #[command(flatten)]
        worker: WorkerArgs,
    },
    /// Scrape every URL of a CSV into an output CSV
    Batch {
        /// Input CSV with a URL column
        #[arg(long)]
        input: PathBuf,
        /// Output CSV
        #[arg(long)]
        output: PathBuf,
        /// Parallel workers, each with its own browser session
        #[arg(long, default_value_t = 5)]
        workers: usize,
        #[command(flatten)]
        scrape: ScrapeArgs,
    },
    /// Scrape a single URL and print the result as JSON
    Scrape {
        url: String,
        #[command(flatten)]
        scrape: ScrapeArgs,
    },
    /// Send the URL column of a CSV to the job queue
    Enqueue {
        #[arg(long)]
        input: PathBuf,
        #[arg(long, env = "PDPSCRAPE_DB", default_value = "pdpscrape.sqlite")]
        database: PathBuf,
    },
    /// Write stored product records to CSV
    Export {
        #[arg(long)]
        output: PathBuf,
        /// Comma-separated subset of columns
        #[arg(long)]
        fields: Option<String>,
        #[arg(long, env = "PDPSCRAPE_DB", default_value = "pdpscrape.sqlite")]
        database: PathBuf,
    },
    /// Count OK and failed rows of a batch output CSV
    Count {
        #[arg(long)]
        input: PathBuf,
        #[arg(long, default_value = "ERROR")]
        error_field: String,
    },
}

#[derive(Args, Debug, Clone)]
struct ScrapeArgs {
    /// Route browser and API traffic through PROXY_SERVER
    #[arg(long, env = "USE_PROXY")]
    use_proxy: bool,
    /// Show the browser window while minting cookies
    #[arg(long)]
    headful: bool,
    /// Per-attempt deadline in seconds
    #[arg(long)]
    timeout: Option<u64>,
    /// Session refreshes allowed per URL
    #[arg(long)]
    retries: Option<u32>,
}

impl ScrapeArgs {
    fn build(&self) -> Result<ScrapeConfig> {
        let proxy = if self.use_proxy {
            Some(ProxySettings::from_env()?)
        } else {
            None
        };

        let mut builder = ScrapeConfig::builder()
            .use_proxy(self.use_proxy)
            .proxy(proxy)
            .headless(!self.headful);
        if let Some(secs) = self.timeout {
            builder = builder.request_timeout(Duration::from_secs(secs));
        }
        if let Some(retries) = self.retries {
            builder = builder.max_token_retries(retries);
        }
        builder.build()
    }
}

#[derive(Args, Debug, Clone)]
struct WorkerArgs {
    #[arg(long, env = "PDPSCRAPE_DB", default_value = "pdpscrape.sqlite")]
    database: PathBuf,
    /// Concurrent jobs
    #[arg(long, env = "MAX_CONCURRENCY")]
    concurrency: Option<usize>,
    /// Messages requested per poll
    #[arg(long)]
    batch_size: Option<usize>,
    /// Empty polls before exiting
    #[arg(long)]
    idle_polls: Option<u32>,
    /// Seconds a received message stays hidden
    #[arg(long)]
    visibility_timeout: Option<u64>,
    /// Receives before a message is dead-lettered
    #[arg(long)]
    max_receives: Option<u32>,
}

impl WorkerArgs {
    fn build(&self) -> Result<WorkerConfig> {
        let mut builder = WorkerConfig::builder().database_path(&self.database);
        if let Some(n) = self.concurrency {
            builder = builder.max_concurrency(n);
        }
        if let Some(n) = self.batch_size {
            builder = builder.max_batch_size(n);
        }
        if let Some(n) = self.idle_polls {
            builder = builder.max_idle_polls(n);
        }
        if let Some(secs) = self.visibility_timeout {
            builder = builder.visibility_timeout(Duration::from_secs(secs));
        }
        if let Some(n) = self.max_receives {
            builder = builder.max_receive_count(n);
        }
        builder.build()
    }
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("info,chromiumoxide::handler=off,chromiumoxide::conn=off")
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))
}

async fn open_store(path: PathBuf) -> Result<SqliteJobStore> {
    let config = WorkerConfig::builder().database_path(path).build()?;
    SqliteJobStore::from_config(&config)
        .await
        .with_context(|| format!("Failed to open job store {}", config.database_path().display()))
}

async fn run_worker(scrape: &ScrapeArgs, worker: &WorkerArgs) -> Result<()> {
    let scrape_config = scrape.build()?;
    let worker_config = worker.build()?;

    let store = Arc::new(
        SqliteJobStore::from_config(&worker_config)
            .await
            .context("Failed to open job store")?,
    );
    let scraper = ScraperFactory::new(&scrape_config)?.build();
    let consumer = JobConsumer::new(
        scraper,
        store.clone(),
        store.clone(),
        store.clone(),
        worker_config,
    );

    let (tx, rx) = shutdown_channel();
    let listener = spawn_signal_listener(tx);

    let summary = consumer.run(rx).await;
    listener.abort();

    info!(
        "Worker finished: succeeded={} failed={} skipped={} rejected={}",
        summary.succeeded, summary.failed, summary.skipped, summary.rejected
    );
    if summary.deferred > 0 {
        info!("{} duplicate in-flight message(s) left for redelivery", summary.deferred);
    }
    match store.dead_letter_count().await {
        Ok(0) => {}
        Ok(n) => warn!("{n} message(s) in dead_letters"),
        Err(e) => warn!("Could not read dead letter count: {e}"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing()?;
    let cli = Cli::parse();

    match cli.command {
        Command::Worker { scrape, worker } => run_worker(&scrape, &worker).await?,
        Command::Batch {
            input,
            output,
            workers,
            scrape,
        } => {
            let factory = ScraperFactory::new(&scrape.build()?)?;
            let summary = run_batch_file(&input, &output, workers, || factory.build()).await?;
            info!(
                "Batch finished: total={} ok={} errors={} duplicates={}",
                summary.total, summary.ok, summary.errors, summary.duplicates
            );
        }
        Command::Scrape { url, scrape } => {
            let scraper = ScraperFactory::new(&scrape.build()?)?.build();
            let report = scraper.scrape_report(&url).await;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Enqueue { input, database } => {
            let store = open_store(database).await?;
            let sent = enqueue_file(&input, &store).await?;
            println!("Sent {sent} URLs");
        }
        Command::Export {
            output,
            fields,
            database,
        } => {
            let fields = fields.as_deref().map(parse_fields).transpose()?;
            let store = open_store(database).await?;
            let records = store.all_products().await?;
            let file = std::fs::File::create(&output)
                .with_context(|| format!("Failed to create {}", output.display()))?;
            let written = write_records(&records, fields.as_deref(), file)?;
            println!("Exported {written} records to {}", output.display());
        }
        Command::Count { input, error_field } => {
            let file = std::fs::File::open(&input)
                .with_context(|| format!("Failed to open {}", input.display()))?;
            let counts = count_rows(file, &error_field)?;
            println!("Total rows: {}", counts.total);
            println!("Without error: {}", counts.ok);
            println!("With error: {}", counts.errors());
        }
    }

    Ok(())
}
