//! `clipredact` - CLI for the clipboard redaction service
//!
//! This binary runs the clipboard monitor and manages detection rules and the
//! audit log.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::io::Read;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use tracing::info;

use clipredact::cli::{Cli, Command, ConfigCommand, LogsCommand, RulesCommand, ScanCommand};
use clipredact::redaction::CATEGORIES;
use clipredact::{
    init_logging, Config, ConfigManager, Monitor, PatternCache, Redactor, RuleSet, RuleWatcher,
    Storage, SystemClipboard,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // Load configuration
    let config = Config::load_from(cli.config.clone()).context("loading configuration")?;

    // Execute the command
    match cli.command {
        Command::Run(run_cmd) => handle_run(&config, run_cmd.no_audit).await,
        Command::Scan(scan_cmd) => handle_scan(&config, &scan_cmd),
        Command::Rules(rules_cmd) => handle_rules(&config, &rules_cmd),
        Command::Logs(logs_cmd) => handle_logs(&config, &logs_cmd),
        Command::Config(config_cmd) => handle_config(&config, config_cmd),
    }
}

fn open_storage(config: &Config) -> anyhow::Result<Arc<Storage>> {
    let path = config.database_path();
    let storage = Storage::open(&path)
        .with_context(|| format!("opening database {}", path.display()))?
        .with_max_audit_entries(config.storage.max_audit_entries);
    Ok(Arc::new(storage))
}

fn open_rules(storage: &Arc<Storage>, cache: &Arc<PatternCache>) -> anyhow::Result<ConfigManager> {
    let manager = ConfigManager::load(storage.clone()).context("loading detection rules")?;
    Ok(manager.with_pattern_cache(cache.clone()))
}

async fn handle_run(config: &Config, no_audit: bool) -> anyhow::Result<()> {
    let storage = open_storage(config)?;
    let cache = Arc::new(PatternCache::new());
    let manager = Arc::new(open_rules(&storage, &cache)?);
    let redactor = Arc::new(Redactor::new(cache));

    let mut monitor = Monitor::new(
        Arc::new(SystemClipboard::new()),
        manager.clone(),
        redactor,
        config.monitor.clone(),
    );
    if !no_audit {
        monitor = monitor.with_audit_sink(storage);
    }
    let handle = monitor.handle();

    let rescan = handle.clone();
    manager.on_change(move |rules| {
        let enabled: Vec<&str> = CATEGORIES
            .iter()
            .filter(|d| rules.is_enabled(d.category))
            .map(|d| d.name)
            .collect();
        info!(
            interval_ms = rules.polling_interval_ms,
            categories = ?enabled,
            exact_rules = rules.exact_rules.len(),
            "Detection rules changed"
        );
        rescan.request_rescan();
    });

    let watcher = RuleWatcher::new(manager, config.monitor.rules_check_interval());
    let watcher_task = tokio::spawn(watcher.run(handle.clone()));
    let monitor_task = tokio::spawn(monitor.run());

    tokio::signal::ctrl_c()
        .await
        .context("waiting for interrupt")?;
    info!("Interrupt received, shutting down");
    handle.stop();
    monitor_task.await.context("monitor task failed")?;
    watcher_task.await.context("rule watcher task failed")?;
    Ok(())
}

fn handle_scan(config: &Config, cmd: &ScanCommand) -> anyhow::Result<()> {
    let text = match &cmd.text {
        Some(text) => text.clone(),
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("reading stdin")?;
            buf
        }
    };

    let storage = open_storage(config)?;
    let cache = Arc::new(PatternCache::new());
    let manager = open_rules(&storage, &cache)?;
    let outcome = Redactor::new(cache).redact(&text, &manager.get());

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print!("{}", outcome.text);
        if !outcome.text.ends_with('\n') {
            println!();
        }
        for record in &outcome.summary {
            eprintln!(
                "  {:<14} {} -> {}",
                record.name, record.original, record.replacement
            );
        }
    }
    Ok(())
}

fn handle_rules(config: &Config, cmd: &RulesCommand) -> anyhow::Result<()> {
    let storage = open_storage(config)?;
    let manager = open_rules(&storage, &Arc::new(PatternCache::new()))?;
    let current = manager.get();

    match cmd {
        RulesCommand::Show { json } => {
            if *json {
                println!("{}", serde_json::to_string_pretty(current.as_ref())?);
            } else {
                print_rules(&current);
            }
        }
        RulesCommand::Reset { yes } => {
            if *yes {
                manager.update(RuleSet::default())?;
                println!("Rules reset to defaults.");
            } else {
                println!("This will replace all detection rules with the defaults.");
                println!("Use --yes to confirm.");
            }
        }
        edit => {
            let Some(rules) = edit.edited(&current)? else {
                bail!("command does not change the rule set");
            };
            manager.update(rules)?;
            println!("Rules updated.");
        }
    }
    Ok(())
}

fn print_rules(rules: &RuleSet) {
    println!("Detection Rules");
    println!("===============");
    println!();
    println!("Polling interval:  {} ms", rules.polling_interval_ms);
    println!("Log redactions:    {}", rules.notify_on_change);
    println!();
    println!("[Categories]");
    for descriptor in CATEGORIES {
        let category = descriptor.category;
        let state = if rules.is_enabled(category) { "on" } else { "off" };
        let pattern = match rules.override_pattern(category) {
            "" => "(default)",
            custom => custom,
        };
        println!(
            "  {:<12} {:<4} {:<24} pattern: {}",
            descriptor.name,
            state,
            rules.replacement(category),
            pattern
        );
    }
    println!();
    println!("[Exact matches]");
    if rules.exact_rules.is_empty() {
        println!("  (none)");
    }
    for rule in &rules.exact_rules {
        let state = if rule.enabled { "on" } else { "off" };
        println!(
            "  {:<12} {:<4} {:?} -> {:?}",
            rule.name, state, rule.pattern, rule.replacement
        );
    }
}

fn handle_logs(config: &Config, cmd: &LogsCommand) -> anyhow::Result<()> {
    let storage = open_storage(config)?;

    match cmd {
        LogsCommand::List {
            page,
            page_size,
            json,
        } => {
            let page = storage.audit_entries(*page, *page_size)?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&page)?);
                return Ok(());
            }

            if page.entries.is_empty() {
                println!("No redactions logged.");
                return Ok(());
            }
            for entry in &page.entries {
                println!(
                    "#{:<6} {}  [{}]",
                    entry.id,
                    entry.timestamp,
                    entry.detections.join(", ")
                );
                println!("        {}", entry.filtered_text.replace('\n', "\n        "));
            }
            println!();
            println!(
                "Page {} of {} ({} entries)",
                page.page, page.total_pages, page.total_count
            );
        }
        LogsCommand::Clear { yes } => {
            if *yes {
                let removed = storage.clear_audit_log()?;
                println!("Removed {removed} entries.");
            } else {
                println!(
                    "This will delete all {} logged redactions.",
                    storage.audit_count()?
                );
                println!("Use --yes to confirm.");
            }
        }
        LogsCommand::Prune { keep } => {
            let removed = storage.prune_audit_keep_recent(*keep)?;
            println!("Removed {removed} entries.");
        }
    }
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
                println!("  Database path:       {}", config.database_path().display());
                println!(
                    "  Max audit entries:   {}",
                    config.storage.max_audit_entries
                );
                println!();
                println!("[Monitor]");
                println!(
                    "  Read error backoff:  {} ms",
                    config.monitor.read_error_backoff_ms
                );
                println!(
                    "  Max content length:  {} bytes",
                    config.monitor.max_content_length
                );
                println!(
                    "  Rules check:         {} ms",
                    config.monitor.rules_check_interval_ms
                );
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
