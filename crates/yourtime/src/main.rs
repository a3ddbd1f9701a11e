//! `yourtime` - CLI for the yourtime stopwatch store.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::io::Write;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;

use yourtime::cli::{Cli, Command, ConfigCommand};
use yourtime::{
    init_logging, Breakdown, Config, Coordinator, Outcome, Presence, RecordId, RecordStore,
    SqliteStore, StoreHealth, TimerEngine,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbosity());

    let config = Config::load_from(cli.config.clone()).context("loading configuration")?;

    match cli.command {
        Command::Config(cmd) => handle_config(&config, cmd),
        Command::List(cmd) => handle_list(open_store(&config)?.as_ref(), cmd.json).await,
        Command::Add(cmd) => handle_add(open_store(&config)?.as_ref(), &config, cmd.name).await,
        Command::Rename(cmd) => {
            handle_rename(open_store(&config)?, &config, cmd.record_id(), &cmd.name).await
        }
        Command::Delete(cmd) => {
            handle_delete(open_store(&config)?.as_ref(), cmd.record_id()).await
        }
        Command::Reset(cmd) => handle_reset(open_store(&config)?, &config, cmd.record_id()).await,
        Command::Run(cmd) => handle_run(open_store(&config)?, &config, cmd.record_id()).await,
        Command::Analytics(cmd) => {
            handle_analytics(open_store(&config)?.as_ref(), cmd.json).await
        }
    }
}

fn open_store(config: &Config) -> anyhow::Result<Arc<dyn RecordStore>> {
    let path = config.database_path();
    let store = SqliteStore::open(&path)
        .with_context(|| format!("opening database {}", path.display()))?;
    Ok(Arc::new(store))
}

async fn handle_list(store: &dyn RecordStore, json: bool) -> anyhow::Result<()> {
    let records = store.read_all().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("No stopwatches yet. Create one with `yourtime add`.");
        return Ok(());
    }

    for record in &records {
        println!("#{:<5} {}  {}", record.id, record.display(), record.name);
    }
    Ok(())
}

async fn handle_add(
    store: &dyn RecordStore,
    config: &Config,
    name: Option<String>,
) -> anyhow::Result<()> {
    let name = name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| config.timer.default_name.clone());

    let id = store.create(&name, 0).await?;
    println!("Created stopwatch #{id} ({name})");
    Ok(())
}

async fn handle_delete(store: &dyn RecordStore, id: RecordId) -> anyhow::Result<()> {
    match store.delete(id).await {
        Ok(()) => {
            println!("Deleted stopwatch #{id}");
            Ok(())
        }
        Err(e) if e.is_not_found() => bail!("stopwatch #{id} does not exist"),
        Err(e) => Err(e.into()),
    }
}

/// Mount an engine for a record that must exist.
async fn mount_existing(
    store: Arc<dyn RecordStore>,
    coordinator: Coordinator,
    config: &Config,
    id: RecordId,
) -> anyhow::Result<TimerEngine> {
    let engine = TimerEngine::mount(store, coordinator, id, config.engine_config())
        .await
        .with_context(|| format!("loading stopwatch #{id}"))?;

    if engine.view().presence == Presence::Missing {
        bail!("stopwatch #{id} does not exist");
    }
    Ok(engine)
}

async fn handle_rename(
    store: Arc<dyn RecordStore>,
    config: &Config,
    id: RecordId,
    name: &str,
) -> anyhow::Result<()> {
    let engine = mount_existing(store, Coordinator::new(), config, id).await?;

    match engine.rename(name).await {
        Outcome::Applied => println!("Renamed stopwatch #{id} to {}", engine.view().name),
        Outcome::Ignored => println!("Name unchanged"),
        Outcome::Failed => bail!("could not save the new name for stopwatch #{id}"),
    }
    Ok(())
}

async fn handle_reset(
    store: Arc<dyn RecordStore>,
    config: &Config,
    id: RecordId,
) -> anyhow::Result<()> {
    let engine = mount_existing(store, Coordinator::new(), config, id).await?;

    match engine.reset().await {
        Outcome::Applied | Outcome::Ignored => {
            println!("Reset stopwatch #{id} to {}", engine.view().display());
            Ok(())
        }
        Outcome::Failed => bail!("could not reset stopwatch #{id}"),
    }
}

async fn handle_run(
    store: Arc<dyn RecordStore>,
    config: &Config,
    id: RecordId,
) -> anyhow::Result<()> {
    let engine = mount_existing(store, Coordinator::new(), config, id).await?;
    let mut updates = engine.subscribe();

    if engine.start().await != Outcome::Applied {
        bail!("stopwatch #{id} could not be started");
    }

    let view = engine.view();
    println!("Running #{id} {} (Ctrl-C to stop)", view.name);
    render_line(&view.display(), view.store_health)?;

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = &mut shutdown => {
                result.context("waiting for Ctrl-C")?;
                break;
            }
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let view = updates.borrow_and_update().clone();
                render_line(&view.display(), view.store_health)?;
            }
        }
    }

    let _ = engine.stop().await;
    println!();
    println!("Stopped #{id} at {}", engine.view().display());
    Ok(())
}

fn render_line(display: &str, health: StoreHealth) -> anyhow::Result<()> {
    let mut stdout = std::io::stdout().lock();
    match health {
        StoreHealth::Healthy => write!(stdout, "\r{display}          ")?,
        StoreHealth::Degraded { .. } => write!(stdout, "\r{display}  (not saving)")?,
    }
    stdout.flush()?;
    Ok(())
}

async fn handle_analytics(store: &dyn RecordStore, json: bool) -> anyhow::Result<()> {
    let breakdown = Breakdown::from_records(&store.read_all().await?);

    if json {
        let value = serde_json::json!({
            "total_ms": breakdown.total_ms,
            "total_hours": breakdown.total_hours(),
            "record_count": breakdown.record_count,
            "active_count": breakdown.active_count(),
            "average_ms": breakdown.average_ms(),
            "slices": breakdown.slices,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("Total Time Tracked");
    println!("==================");
    println!(
        "{}  ({} hours)",
        breakdown.total_display(),
        breakdown.total_hours()
    );
    println!();

    if breakdown.is_empty() {
        println!("No time tracked yet. Start a stopwatch with `yourtime run <ID>`.");
        return Ok(());
    }

    println!("[Time Distribution]");
    for slice in &breakdown.slices {
        println!(
            "  {:>6}  {}  {}",
            slice.share_display(),
            yourtime::record::format_hms(slice.accumulated_ms),
            slice.label
        );
    }
    println!();
    println!("[Statistics]");
    println!("  Activities:         {}", breakdown.record_count);
    println!("  Active activities:  {}", breakdown.active_count());
    println!(
        "  Average time:       {}",
        yourtime::record::format_hms(breakdown.average_ms())
    );
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Storage]");
                println!("  Database path:      {}", config.database_path().display());
                println!();
                println!("[Timer]");
                println!("  Period (ms):        {}", config.timer.period_ms);
                println!("  Default name:       {}", config.timer.default_name);
                println!("  Failure threshold:  {}", config.timer.failure_threshold);
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}
