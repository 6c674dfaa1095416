//! Command-line host for native plughost plugins.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use plughost_core::config::env_vars;
use plughost_core::prelude::*;
use tracing::{info, warn};

/// plughost - load native plugins and talk to them.
#[derive(Parser, Debug)]
#[command(name = "plughost")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Action to perform.
    #[command(subcommand)]
    command: Command,

    /// TOML configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Plugin directory (overrides config and environment).
    #[arg(short, long, global = true)]
    dir: Option<PathBuf>,

    /// Comma-separated plugin names to initialize, or "All".
    #[arg(short, long, global = true)]
    allow: Option<String>,

    /// Directory handed to plugins for their own files.
    #[arg(long, global = true)]
    storage: Option<PathBuf>,

    /// Verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Command {
    /// Load the plugin directory and report what happened.
    Load {
        /// Print the report and loaded modules as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Run a command on one plugin or on all of them.
    Command {
        /// Plugin name, or "All".
        target: String,
        /// Command name.
        cmd: String,
        /// Command arguments.
        args: Vec<String>,
    },
    /// Send journal entries (one JSON object per line) to every plugin.
    Notify {
        /// Journal file.
        file: PathBuf,
        /// Commander name passed with refresh notifications.
        #[arg(long, default_value = "")]
        commander: String,
        /// Send entries as history replay instead of new entries.
        #[arg(long)]
        refresh: bool,
    },
    /// Ask one plugin, or all of them, to act on a journal entry.
    Action {
        /// Plugin name, or "All".
        target: String,
        /// Journal entry as a JSON object.
        entry: String,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = resolve_config(&args)?;
    let storage_dir = config.storage_dir();
    if config.plugin_dir.is_dir() {
        if let Err(e) = fs::create_dir_all(&storage_dir) {
            warn!("Cannot create storage directory {}: {}", storage_dir.display(), e);
        }
    }

    let callbacks = tracing_callbacks();
    let mut manager = PluginManager::new();
    let report = manager.load(
        &config.plugin_dir,
        &config.host_version,
        &storage_dir,
        &callbacks,
        &config.allow,
    );

    let outcome = match args.command {
        Command::Load { json } => print_load(&manager, &report, json),
        Command::Command { target, cmd, args } => {
            log_report(&report);
            run_command(&manager, &target, &cmd, &args);
            Ok(())
        }
        Command::Notify {
            file,
            commander,
            refresh,
        } => {
            log_report(&report);
            notify(&manager, &file, &commander, refresh)
        }
        Command::Action { target, entry } => {
            log_report(&report);
            action(&manager, &target, &entry)
        }
    };

    manager.unload();
    outcome
}

fn init_logging(verbose: bool) {
    // JSON output for container environments
    let json_logging = std::env::var(env_vars::LOG_JSON)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(false);

    let level = if verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("warn,plughost={}", level)));

    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .compact()
            .with_writer(std::io::stderr)
            .init();
    }
}

/// Config file (or defaults), then environment, then command-line flags.
fn resolve_config(args: &Args) -> Result<HostConfig> {
    let config = match &args.config {
        Some(path) => HostConfig::load(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?,
        None => HostConfig::default(),
    };
    let mut config = config.with_env_overrides();

    if let Some(dir) = &args.dir {
        config.plugin_dir = dir.clone();
    }
    if let Some(allow) = &args.allow {
        config.allow = AllowPolicy::parse(allow);
    }
    if let Some(storage) = &args.storage {
        config.storage_dir = Some(storage.clone());
    }
    Ok(config)
}

fn or_none(list: String) -> String {
    if list.is_empty() {
        "(none)".to_string()
    } else {
        list
    }
}

fn log_report(report: &LoadReport) {
    info!(
        loaded = %report.loaded_list(),
        failed = %report.failed_list(),
        not_allowed = %report.not_allowed_list(),
        "Plugins loaded"
    );
}

fn print_load(manager: &PluginManager, report: &LoadReport, json: bool) -> Result<()> {
    if json {
        let out = serde_json::json!({
            "report": report,
            "modules": manager.module_infos(),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("Loaded: {}", or_none(report.loaded_list()));
    println!("Failed: {}", or_none(report.failed_list()));
    println!("Not allowed: {}", or_none(report.not_allowed_list()));

    if !manager.is_empty() {
        println!();
        println!("{:<24} {:<12} CAPABILITIES", "NAME", "VERSION");
        for module in manager.module_infos() {
            println!(
                "{:<24} {:<12} {}",
                module.name,
                module.version,
                module.capabilities.join(",")
            );
        }
    }
    Ok(())
}

fn run_command(manager: &PluginManager, target: &str, cmd: &str, args: &[String]) {
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    for result in manager.action_command(&Target::parse(target), cmd, &args) {
        let status = if result.ok { "OK" } else { "FAILED" };
        println!("{} {}: {}", status, result.module, result.message);
    }
}

fn notify(manager: &PluginManager, file: &Path, commander: &str, refresh: bool) -> Result<()> {
    let text = fs::read_to_string(file)
        .with_context(|| format!("Failed to read journal {}", file.display()))?;

    let mut sent = 0usize;
    for (index, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let entry = match JournalEntry::from_json(line) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping line {}: {}", index + 1, e);
                continue;
            }
        };
        if refresh {
            manager.refresh(commander, &entry);
        } else {
            manager.new_journal_entry(&entry);
        }
        sent += 1;
    }

    println!("Sent {} entries to {} plugins", sent, manager.len());
    Ok(())
}

fn action(manager: &PluginManager, target: &str, entry: &str) -> Result<()> {
    let entry = JournalEntry::from_json(entry).context("Invalid journal entry")?;
    let outcome = manager.action_journal_entry(&Target::parse(target), &entry);
    println!("found: {}, handled: {}", outcome.found, outcome.handled);
    Ok(())
}
