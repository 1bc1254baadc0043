//! COSMIC Remote
//!
//! Command-line front end that drives a remote session against simulated
//! device collaborators.

mod app;
mod config;
mod diagnostics;
mod simulated;

use anyhow::{Context, Result};
use app::App;
use chrono::Utc;
use clap::Parser;
use config::Config;
use cosmic_remote_protocol::{
    ConnectOutcome, KeyCode, ListingQuery, RemoteEntry, TransferTask, TransferTracker,
};
use diagnostics::{Cli, Command, ConnectCommand, InputCommand, TransferCommand};
use std::time::Duration;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let cli = Cli::parse();

    // Initialize logging with CLI configuration
    diagnostics::init_logging(&cli).context("Failed to initialize logging")?;

    // Load configuration
    let config = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .context("Failed to load configuration")?;

    info!("Configuration loaded");

    if matches!(cli.command, Command::DumpConfig) {
        let contents = toml::to_string_pretty(&config).context("Failed to serialize config")?;
        println!("{}", contents);
        return Ok(());
    }

    let app = App::new(config).await.context("Failed to create session")?;

    match cli.command {
        Command::Connect { via } => handle_connect(&app, via).await,
        Command::History { clear } => handle_history(&app, clear).await,
        Command::Browse {
            path,
            filter,
            sort,
            dirs_first,
        } => {
            app.ensure_connected().await?;
            for segment in &path {
                app.navigator
                    .enter_directory(segment)
                    .await
                    .with_context(|| format!("Failed to open {}", segment))?;
            }

            let mut query = ListingQuery::sorted(sort).with_directories_first(dirs_first);
            if let Some(filter) = filter {
                query = query.with_filter(filter);
            }
            print_listing(&app, &query);
            Ok(())
        }
        Command::Transfer { action } => {
            app.ensure_connected().await?;
            handle_transfer(&app, action).await
        }
        Command::Stream {
            quality,
            seconds,
            reset_after,
        } => handle_stream(&app, quality, seconds, reset_after).await,
        Command::Input { action } => {
            app.ensure_connected().await?;
            handle_input(&app, action).await
        }
        Command::DumpConfig => Ok(()),
    }
}

async fn handle_connect(app: &App, via: ConnectCommand) -> Result<()> {
    let result = match via {
        ConnectCommand::Network { address, port } => {
            let port = port.unwrap_or(app.config.connection.default_port);
            app.session.connect_network(&address, port).await
        }
        ConnectCommand::Wired => app.session.connect_wired().await,
        ConnectCommand::ShortRange { target } => {
            let target = match target {
                Some(target) => target,
                None => {
                    println!("Scanning for devices...");
                    let found = app
                        .session
                        .scan_short_range_targets()
                        .await
                        .context("Bluetooth scan failed")?;
                    for name in &found {
                        println!("  {}", name);
                    }
                    found
                        .into_iter()
                        .next()
                        .context("No Bluetooth devices found")?
                }
            };
            app.session.select_short_range_target(Some(target));
            app.session.connect_short_range().await
        }
        ConnectCommand::Uri { uri } => app.session.connect_uri(&uri).await,
    };

    let outcome = ConnectOutcome::from(result);
    if outcome.success {
        println!("{}", outcome.message);
        Ok(())
    } else {
        anyhow::bail!("Connection failed: {}", outcome.message)
    }
}

async fn handle_history(app: &App, clear: bool) -> Result<()> {
    let history = app.session.history();

    if clear {
        history
            .clear()
            .await
            .context("Failed to clear connection history")?;
        println!("Connection history cleared.");
        return Ok(());
    }

    println!("\n=== Recent Connections ===");
    if history.is_empty() {
        println!("No recent connections.");
        return Ok(());
    }

    let now = Utc::now();
    for record in history.snapshot() {
        println!(
            "{} ({}) via {} - port {} - {}",
            record.display_name,
            record.address,
            record.transport_kind,
            record.port_label(),
            record.last_connected_label(now)
        );
    }
    println!("\nTotal: {} connections", history.len());
    Ok(())
}

fn print_listing(app: &App, query: &ListingQuery) {
    println!("\n=== {} ===", app.navigator.path());
    if let Some(error) = app.navigator.state().last_error {
        println!("Error: {}", error);
        return;
    }

    let entries = app.navigator.query(query);
    if entries.is_empty() {
        println!("No files.");
        return;
    }
    for entry in &entries {
        print_entry(entry);
    }
}

fn print_entry(entry: &RemoteEntry) {
    let marker = if entry.is_directory { "d" } else { "-" };
    println!(
        "{} {:>10}  {}  {}",
        marker,
        entry.formatted_size(),
        entry.modified_at.format("%Y-%m-%d %H:%M"),
        entry.name
    );
}

async fn handle_transfer(app: &App, action: TransferCommand) -> Result<()> {
    let tasks = match action {
        TransferCommand::Upload { file, to } => {
            open_remote_dir(app, &to).await?;
            vec![app.navigator.upload_file(&file)?]
        }
        TransferCommand::Download { paths } => {
            let dir = app.config.download_dir();
            info!("Downloads go to {}", dir.display());
            app.navigator.download(&paths)
        }
        TransferCommand::Compress { paths, name } => {
            if let Some(parent) = paths.first().and_then(|p| parent_dir(p)) {
                open_remote_dir(app, parent).await?;
            }
            vec![app.navigator.compress(&paths, name.as_deref())?]
        }
    };

    let printer = tokio::spawn(print_progress(app.tracker.clone()));
    let results = futures::future::join_all(tasks.into_iter().map(wait_task)).await;
    printer.abort();

    let mut failures = 0;
    for (label, result) in results {
        match result {
            Ok(()) => println!("{}: done", label),
            Err(e) => {
                failures += 1;
                println!("{}: {}", label, e.user_message());
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{} transfers did not complete", failures);
    }
    Ok(())
}

async fn wait_task(task: TransferTask) -> (String, cosmic_remote_protocol::Result<()>) {
    let label = task.label().to_string();
    (label, task.wait().await)
}

async fn print_progress(tracker: TransferTracker) {
    let mut updates = tracker.subscribe();
    while updates.changed().await.is_ok() {
        let snapshot = updates.borrow_and_update().clone();
        for record in snapshot.values() {
            println!("  {} {}: {}%", record.kind, record.label, record.percent());
        }
    }
}

/// Parent directory of a remote path
fn parent_dir(path: &str) -> Option<&str> {
    match path.rfind('/') {
        Some(0) => Some("/"),
        Some(idx) => Some(&path[..idx]),
        None => None,
    }
}

async fn open_remote_dir(app: &App, dir: &str) -> Result<()> {
    app.navigator
        .go_to_root()
        .await
        .context("Failed to list the remote root")?;
    for segment in dir.split('/').filter(|s| !s.is_empty()) {
        app.navigator
            .enter_directory(segment)
            .await
            .with_context(|| format!("Failed to open {}", segment))?;
    }
    Ok(())
}

async fn handle_stream(
    app: &App,
    quality: Option<cosmic_remote_protocol::QualityPreset>,
    seconds: u64,
    reset_after: Option<u64>,
) -> Result<()> {
    let streaming = &app.streaming;
    if let Some(quality) = quality {
        streaming.set_quality(quality);
    }

    streaming.start();
    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    ticker.tick().await;

    for elapsed in 1..=seconds {
        ticker.tick().await;

        if reset_after == Some(elapsed) {
            println!("Resetting stream...");
            if !streaming.reset().await {
                warn!("Stream reset was superseded");
            }
        }

        let session = streaming.snapshot();
        println!(
            "[{:>3}s] {} {} @ {} fps, {} ms, {} used",
            elapsed,
            session.quality,
            session.resolution,
            session.frame_rate,
            session.latency_ms,
            session.data_usage()
        );
    }

    streaming.stop();
    println!("Streaming stopped.");
    Ok(())
}

async fn handle_input(app: &App, action: InputCommand) -> Result<()> {
    match action {
        InputCommand::Text { text } => app.control.send_text(&text).await?,
        InputCommand::Key { name } => {
            let key = parse_key(&name)?;
            app.control.send_key(key).await?;
        }
        InputCommand::Function { number } => app.control.send_function_key(number).await?,
    }
    println!("Sent.");
    Ok(())
}

/// Key code from its serialized name
fn parse_key(name: &str) -> Result<KeyCode> {
    let normalized = name.trim().to_lowercase();
    let mut chars = normalized.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        if let Some(key) = KeyCode::letter(c) {
            return Ok(key);
        }
    }
    serde_json::from_value(serde_json::Value::String(normalized))
        .with_context(|| format!("Unknown key '{}'", name))
}
