//! Command line entry point.

use anyhow::{bail, Context, Result};
use biblio_ingest::index::{ElasticClient, Indexer};
use biblio_ingest::ingest::{ConsumerKind, IngestConfig, Ingester};
use biblio_ingest::logging::{init_logging, LogConfig, LogFormat};
use biblio_ingest::{storage, SourceFormat};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tracing::{error, info};

/// Ingest library metadata into a search index.
#[derive(Debug, Parser)]
#[command(name = "biblio-ingest", version, about)]
struct Cli {
    /// Search engine URL.
    #[arg(short, long, env = "ES_URL", default_value = "http://127.0.0.1:9200", global = true)]
    url: String,

    /// Index to act on.
    #[arg(short, long, env = "ES_INDEX", global = true)]
    index: Option<String>,

    /// Minimum log level; overrides LOG_LEVEL.
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Log format (text or json); overrides LOG_FORMAT.
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Parse and ingest an input file (use s3://bucket/key for S3).
    Ingest {
        /// Input path or S3 URL.
        filename: String,

        /// Source system of the input: aleph, alma, aspace, mods, dspace or mario.
        #[arg(short, long)]
        source: SourceFormat,

        /// Output: es, json, title or silent.
        #[arg(short, long, default_value = "es")]
        consumer: ConsumerKind,

        /// MARC rule file replacing the bundled rules.
        #[arg(long)]
        rules: Option<PathBuf>,

        /// Index name prefix; defaults to the source's prefix.
        #[arg(short, long)]
        prefix: Option<String>,

        /// Promote the index to the primary alias when done.
        #[arg(long)]
        auto: bool,
    },
    /// List indexes.
    Indexes,
    /// List aliases and their indexes.
    Aliases,
    /// Show cluster information.
    Ping,
    /// Delete the index given with --index.
    Delete,
    /// Link the index given with --index to the primary alias.
    Promote {
        /// Prefix whose current index is demoted.
        #[arg(short, long)]
        prefix: String,
    },
    /// Copy the index given with --index into another index.
    Reindex {
        /// Name of the new index.
        #[arg(long)]
        destination: String,
    },
}

fn main() {
    let cli = Cli::parse();

    let log_config = match logging_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e:#}");
            process::exit(2);
        },
    };
    if let Err(e) = init_logging(&log_config) {
        eprintln!("Error: {e}");
        process::exit(2);
    }

    if let Err(e) = run(cli) {
        error!(error = %format!("{e:#}"), "command failed");
        process::exit(1);
    }
}

fn logging_config(cli: &Cli) -> Result<LogConfig> {
    let mut config = LogConfig::from_env().context("Invalid logging environment")?;
    if let Some(level) = &cli.log_level {
        config = config.with_level(level)?;
    }
    if let Some(format) = cli.log_format {
        config.format = format;
    }
    Ok(config)
}

fn client(url: &str) -> Result<ElasticClient> {
    ElasticClient::new(url).with_context(|| format!("Could not create client for {url}"))
}

fn required_index(index: Option<String>) -> Result<String> {
    match index {
        Some(index) => Ok(index),
        None => bail!("--index is required for this command"),
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Ingest {
            filename,
            source,
            consumer,
            rules,
            prefix,
            auto,
        } => {
            let mut config = IngestConfig::new(filename, source);
            config.consumer = consumer;
            config.index = cli.index;
            config.promote = auto;
            config.rules = rules;
            if let Some(prefix) = prefix {
                config.prefix = prefix;
            }

            info!(filename = %config.filename, "ingesting records");
            let stream = storage::open(&config.filename)
                .with_context(|| format!("Could not open {}", config.filename))?;
            let indexer: Option<Arc<dyn Indexer>> = match consumer {
                ConsumerKind::Es => Some(Arc::new(client(&cli.url)?)),
                _ => None,
            };
            let ingester = Ingester::configure(config, stream, indexer, Box::new(std::io::stdout()))
                .context("Could not configure ingest")?;
            let count = ingester.ingest().context("Ingest failed")?;
            info!(count, "total records ingested");
        },
        Command::Indexes => {
            for index in client(&cli.url)?.indexes()? {
                println!(
                    "\nName: {}\n  Documents: {}\n  Health: {}\n  Status: {}\n  UUID: {}\n  Size: {}",
                    index.index,
                    index.docs_count.unwrap_or_default(),
                    index.health.unwrap_or_default(),
                    index.status.unwrap_or_default(),
                    index.uuid.unwrap_or_default(),
                    index.store_size.unwrap_or_default(),
                );
            }
        },
        Command::Aliases => {
            for alias in client(&cli.url)?.aliases()? {
                println!("\nAlias: {}\n  Index: {}", alias.alias, alias.index);
            }
        },
        Command::Ping => {
            let info = client(&cli.url)?.ping()?;
            println!(
                "\nName: {}\nCluster: {}\nVersion: {}",
                info.name, info.cluster_name, info.version
            );
        },
        Command::Delete => {
            let index = required_index(cli.index)?;
            client(&cli.url)?.delete(&index)?;
            info!(index = %index, "index deleted");
        },
        Command::Promote { prefix } => {
            let index = required_index(cli.index)?;
            client(&cli.url)?.promote(&index, Some(&prefix))?;
            info!(index = %index, prefix = %prefix, "index promoted");
        },
        Command::Reindex { destination } => {
            let index = required_index(cli.index)?;
            let count = client(&cli.url)?.reindex(&index, &destination)?;
            println!("{count} documents reindexed");
        },
    }
    Ok(())
}
