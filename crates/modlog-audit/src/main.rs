use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use async_trait::async_trait;
use chrono::Utc;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn};

use modlog_audit::view::{MessageView, record_json};
use modlog_audit::{
    AuditConfig, AuditLog, EventDispatcher, HistoryWindow, ModerationRecord, RecordSink,
};
use modlog_core::{
    ChannelDirectory, ChannelInfo, GatewayEvent, Snowflake, StaticChannelDirectory, SystemClock,
    account_age_days, created_at,
};
use modlog_fetch::StaticSource;
use modlog_logging::ModlogSubscriberBuilder;
use modlog_storage::{AuditStorage, StorageConfig};

const DEFAULT_DATA_DIR: &str = "./modlog-data";

#[derive(Parser)]
#[command(name = "modlog", about = "Moderation audit-log store", version)]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Data directory (overrides the configuration)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Ban history window, "unbounded" or hours like "24h" (overrides the configuration)
    #[arg(long, global = true)]
    window: Option<HistoryWindow>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Dispatch JSON-lines gateway events and print moderation records
    Replay {
        /// File with one event per line
        events: PathBuf,
        /// Do not download attachments
        #[arg(long)]
        offline: bool,
    },
    /// Print the recorded messages of a channel
    Channel { guild: Snowflake, channel: Snowflake },
    /// Print a member record
    Member { guild: Snowflake, user: Snowflake },
    /// Collect a user's history across all recorded channels of a guild
    BanContext {
        guild: Snowflake,
        user: Snowflake,
        /// Print plain-text transcripts instead of JSON
        #[arg(long)]
        text: bool,
    },
    /// Decode the creation time of an identifier
    Snowflake { id: String },
}

/// Prints every record as one JSON line on stdout
struct StdoutSink;

#[async_trait]
impl RecordSink for StdoutSink {
    async fn emit(&self, record: ModerationRecord) {
        match record_json(&record) {
            Ok(line) => println!("{line}"),
            Err(e) => warn!(error = %e, "Cannot serialize record"),
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value)?;
    writeln!(stdout)?;
    Ok(())
}

/// Full configuration, for commands that need the history window
fn audit_config(cli: &Cli) -> anyhow::Result<AuditConfig> {
    let mut config = match (&cli.config, cli.window) {
        (Some(path), window) => {
            let config = AuditConfig::load(path)
                .with_context(|| format!("loading {}", path.display()))?;
            match window {
                Some(window) => config.with_history_window(window),
                None => config,
            }
        }
        (None, Some(window)) => AuditConfig::new(DEFAULT_DATA_DIR, window),
        (None, None) => bail!("no history window configured: pass --config or --window"),
    };

    if let Some(data_dir) = &cli.data_dir {
        config = config.with_data_dir(data_dir);
    }
    Ok(config)
}

/// Storage configuration alone, for read-only lookups
fn storage_config(cli: &Cli) -> anyhow::Result<StorageConfig> {
    if let Some(data_dir) = &cli.data_dir {
        let mut storage = StorageConfig::in_dir(data_dir);
        if let Some(path) = &cli.config {
            storage.cache_size = AuditConfig::load(path)?.storage.cache_size;
        }
        return Ok(storage);
    }

    match &cli.config {
        Some(path) => Ok(AuditConfig::load(path)?.storage),
        None => Ok(StorageConfig::in_dir(DEFAULT_DATA_DIR)),
    }
}

async fn replay(config: AuditConfig, events: &Path, offline: bool) -> anyhow::Result<()> {
    let file = std::fs::File::open(events)
        .with_context(|| format!("opening {}", events.display()))?;

    let cache = Arc::new(StaticChannelDirectory::new());
    let directory: Arc<dyn ChannelDirectory> = cache.clone();

    let audit = if offline {
        let storage = AuditStorage::open(config.storage.clone())?;
        AuditLog::with_parts(
            config,
            storage,
            Arc::new(StaticSource::new()),
            directory,
            Arc::new(SystemClock),
        )
    } else {
        AuditLog::open(config, directory).await?
    };

    let audit = Arc::new(audit);
    let dispatcher =
        EventDispatcher::new(Arc::clone(&audit), Arc::new(StdoutSink)).with_channel_cache(cache);

    // Sequential, so records come out in file order
    let (mut handled, mut failed) = (0usize, 0usize);
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let event: GatewayEvent = match serde_json::from_str(&line) {
            Ok(event) => event,
            Err(e) => {
                warn!(line = index + 1, error = %e, "Skipping malformed event");
                failed += 1;
                continue;
            }
        };

        match dispatcher.dispatch(event).await {
            Ok(()) => handled += 1,
            Err(e) => {
                warn!(line = index + 1, error = %e, "Event handler failed");
                failed += 1;
            }
        }
    }

    info!(handled, failed, "Replay finished");
    drop(dispatcher);
    if let Ok(audit) = Arc::try_unwrap(audit) {
        audit.close();
    }
    Ok(())
}

async fn ban_context(
    config: AuditConfig,
    guild: Snowflake,
    user: Snowflake,
    text: bool,
) -> anyhow::Result<()> {
    // Without a gateway the recorded channels stand in for the guild's channel list
    let storage = AuditStorage::open(config.storage.clone())?;
    let directory = StaticChannelDirectory::new();
    let channels = storage
        .messages()
        .known_channels(guild)?
        .into_iter()
        .map(|id| ChannelInfo::text(id, ""))
        .collect();
    directory.set_guild(guild, channels);

    let audit = AuditLog::with_parts(
        config,
        storage,
        Arc::new(StaticSource::new()),
        Arc::new(directory),
        Arc::new(SystemClock),
    );
    let context = audit.ban_context(guild, user).await;

    if text {
        if context.is_empty() {
            println!("No history");
        }
        for transcript in context.transcripts.values() {
            let label = transcript
                .lines
                .first()
                .map(|line| line.author_name.clone())
                .unwrap_or_default();
            println!("==> {} <==", transcript.file_name());
            print!("{}", transcript.render_text(&label, ""));
            println!();
        }
    } else {
        print_json(&context)?;
    }

    audit.close();
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let logging = cli
        .config
        .as_deref()
        .and_then(|path| AuditConfig::load(path).ok())
        .map(|config| config.logging)
        .unwrap_or_default();
    let _guard = ModlogSubscriberBuilder::new().with_config(logging).init();

    match &cli.command {
        Command::Replay { events, offline } => {
            let config = audit_config(&cli)?;
            replay(config, events, *offline).await?;
        }

        Command::Channel { guild, channel } => {
            let storage = AuditStorage::open(storage_config(&cli)?)?;
            let messages = storage.messages().scan_by_channel(*guild, *channel)?;
            let views: Vec<MessageView<'_>> = messages.iter().map(MessageView::from).collect();
            print_json(&views)?;
        }

        Command::Member { guild, user } => {
            let storage = AuditStorage::open(storage_config(&cli)?)?;
            match storage.members().find(*guild, *user)? {
                Some(member) => print_json(&member)?,
                None => bail!("no member record for {user} in guild {guild}"),
            }
        }

        Command::BanContext { guild, user, text } => {
            let config = audit_config(&cli)?;
            ban_context(config, *guild, *user, *text).await?;
        }

        Command::Snowflake { id } => {
            let created = created_at(id)?;
            let age = account_age_days(id, Utc::now())?;
            println!("{id}");
            println!("created: {}", created.to_rfc3339());
            println!("age:     {age} days");
        }
    }

    Ok(())
}
