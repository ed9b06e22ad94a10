//! End-to-end tests over the public API: rules persisted in SQLite, redaction
//! with live rule snapshots, and the monitor writing to the audit log.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use async_trait::async_trait;
use clipredact::cli::RulesCommand;
use clipredact::config::MonitorConfig;
use clipredact::rules::{CategoryRule, ExactMatchRule};
use clipredact::{
    Category, ConfigManager, Monitor, MonitorHandle, PatternCache, PollOutcome, Redactor, Result,
    RuleSet, RuleWatcher, Storage, TextSource,
};

fn manager_over(storage: &Arc<Storage>, cache: &Arc<PatternCache>) -> ConfigManager {
    ConfigManager::load(storage.clone())
        .unwrap()
        .with_pattern_cache(cache.clone())
}

fn tagged(tag: &str, interval: u64) -> RuleSet {
    RuleSet {
        polling_interval_ms: interval,
        ..RuleSet::disabled()
    }
    .with_category(
        Category::Email,
        CategoryRule {
            replacement: format!("[{tag}]"),
            ..CategoryRule::default_for(Category::Email)
        },
    )
}

#[test]
fn test_first_run_persists_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("clipredact.db");

    {
        let storage = Arc::new(Storage::open(&path).unwrap());
        let manager = manager_over(&storage, &Arc::new(PatternCache::new()));
        assert_eq!(*manager.get(), RuleSet::default());
    }

    let storage = Arc::new(Storage::open(&path).unwrap());
    let manager = manager_over(&storage, &Arc::new(PatternCache::new()));
    assert_eq!(*manager.get(), RuleSet::default());
}

#[test]
fn test_updates_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clipredact.db");

    let rules = RuleSet::default()
        .with_category(Category::Phone, CategoryRule::default())
        .with_exact_rule(ExactMatchRule::new("codename", "Project Falcon", "[PROJECT]"))
        .with_exact_rule(ExactMatchRule::new("host", "db-prod-01", "[HOST]").enabled(false));

    {
        let storage = Arc::new(Storage::open(&path).unwrap());
        let manager = manager_over(&storage, &Arc::new(PatternCache::new()));
        manager.update(rules).unwrap();
    }

    let storage = Arc::new(Storage::open(&path).unwrap());
    let manager = manager_over(&storage, &Arc::new(PatternCache::new()));
    let loaded = manager.get();

    assert!(!loaded.is_enabled(Category::Phone));
    assert!(loaded.is_enabled(Category::Email));
    assert_eq!(loaded.exact_rules.len(), 2);
    assert_eq!(loaded.exact_rules[0].name, "codename");
    assert!(!loaded.exact_rules[1].enabled);
}

#[test]
fn test_redaction_follows_updates() {
    let storage = Arc::new(Storage::open_in_memory().unwrap());
    let cache = Arc::new(PatternCache::new());
    let manager = manager_over(&storage, &cache);
    let redactor = Redactor::new(cache);

    let text = "write to user@example.com";

    let before = redactor.redact(text, &manager.get());
    assert_eq!(before.text, "write to security@example.com");

    manager.update(tagged("EMAIL", 500)).unwrap();
    let after = redactor.redact(text, &manager.get());
    assert_eq!(after.text, "write to [EMAIL]");
    assert_eq!(after.summary.names(), vec!["email".to_string()]);
}

#[test]
fn test_invalid_override_falls_back_to_default() {
    let storage = Arc::new(Storage::open_in_memory().unwrap());
    let cache = Arc::new(PatternCache::new());
    let manager = manager_over(&storage, &cache);
    let redactor = Redactor::new(cache);

    let broken = RuleSet::default().with_category(
        Category::Email,
        CategoryRule {
            pattern: "[unclosed".to_string(),
            ..CategoryRule::default_for(Category::Email)
        },
    );
    manager.update(broken).unwrap();

    let text = "user@example.com";
    let with_override = redactor.redact(text, &manager.get());
    let with_default = redactor.redact(text, &RuleSet::default());

    assert_eq!(with_override, with_default);
    assert!(redactor.source().fallback_count() >= 1);
}

#[test]
fn test_reload_picks_up_external_change() {
    let storage = Arc::new(Storage::open_in_memory().unwrap());
    let cache = Arc::new(PatternCache::new());
    let manager = manager_over(&storage, &cache);

    let seen = Arc::new(AtomicUsize::new(0));
    let counter = seen.clone();
    manager.on_change(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let other = manager_over(&storage, &Arc::new(PatternCache::new()));
    other.update(tagged("OTHER", 750)).unwrap();
    assert_eq!(manager.get().polling_interval_ms, 500);

    let reloaded = manager.reload().unwrap();
    assert_eq!(reloaded.polling_interval_ms, 750);
    assert_eq!(manager.get().replacement(Category::Email), "[OTHER]");
    assert_eq!(seen.load(Ordering::SeqCst), 1);
}

#[test]
fn test_readers_never_see_mixed_snapshots() {
    let storage = Arc::new(Storage::open_in_memory().unwrap());
    let manager = Arc::new(manager_over(&storage, &Arc::new(PatternCache::new())));
    manager.update(tagged("A", 100)).unwrap();

    let writer = {
        let manager = manager.clone();
        thread::spawn(move || {
            for i in 0..50 {
                let rules = if i % 2 == 0 {
                    tagged("B", 200)
                } else {
                    tagged("A", 100)
                };
                manager.update(rules).unwrap();
            }
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let manager = manager.clone();
            thread::spawn(move || {
                for _ in 0..500 {
                    let snapshot = manager.get();
                    let expected = match snapshot.polling_interval_ms {
                        100 => "[A]",
                        200 => "[B]",
                        other => panic!("unexpected interval {other}"),
                    };
                    assert_eq!(snapshot.replacement(Category::Email), expected);
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }
}

/// Text source fed from a queue; writes are captured.
#[derive(Default)]
struct QueueSource {
    reads: Mutex<VecDeque<String>>,
    writes: Mutex<Vec<String>>,
}

#[async_trait]
impl TextSource for QueueSource {
    async fn read(&self) -> Result<String> {
        let mut reads = self.reads.lock().unwrap();
        let next = reads.pop_front().unwrap_or_default();
        Ok(next)
    }

    async fn write(&self, text: &str) -> Result<()> {
        self.writes.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

#[tokio::test]
async fn test_monitor_writes_audit_entries() {
    let storage = Arc::new(Storage::open_in_memory().unwrap());
    let cache = Arc::new(PatternCache::new());
    let manager = Arc::new(manager_over(&storage, &cache));
    manager
        .update(RuleSet::default().with_exact_rule(ExactMatchRule::new(
            "codename",
            "Falcon",
            "[PROJECT]",
        )))
        .unwrap();

    let source = Arc::new(QueueSource::default());
    source.reads.lock().unwrap().extend([
        "nothing to see".to_string(),
        "Falcon ships to 10.0.0.12".to_string(),
    ]);

    let mut monitor = Monitor::new(
        source.clone(),
        manager,
        Arc::new(Redactor::new(cache)),
        MonitorConfig::default(),
    )
    .with_audit_sink(storage.clone());

    assert_eq!(monitor.poll_once().await, PollOutcome::Clean);
    assert_eq!(
        monitor.poll_once().await,
        PollOutcome::Redacted {
            detections: vec!["ipv4".to_string(), "codename".to_string()]
        }
    );
    assert_eq!(monitor.poll_once().await, PollOutcome::Empty);

    assert_eq!(
        *source.writes.lock().unwrap(),
        vec!["[PROJECT] ships to 0.0.0.0".to_string()]
    );

    let page = storage.audit_entries(1, 10).unwrap();
    assert_eq!(page.total_count, 1);
    let entry = &page.entries[0];
    assert_eq!(entry.original_text, "Falcon ships to 10.0.0.12");
    assert_eq!(entry.filtered_text, "[PROJECT] ships to 0.0.0.0");
    assert_eq!(entry.detections, vec!["ipv4", "codename"]);
}

#[tokio::test]
async fn test_monitor_run_stops_on_handle() {
    let storage = Arc::new(Storage::open_in_memory().unwrap());
    let cache = Arc::new(PatternCache::new());
    let manager = Arc::new(manager_over(&storage, &cache));
    manager.update(tagged("EMAIL", 5)).unwrap();

    let source = Arc::new(QueueSource::default());
    source
        .reads
        .lock()
        .unwrap()
        .push_back("ping admin@example.org".to_string());

    let monitor = Monitor::new(
        source.clone(),
        manager,
        Arc::new(Redactor::new(cache)),
        MonitorConfig::default(),
    )
    .with_audit_sink(storage.clone());
    let handle = monitor.handle();
    let task = tokio::spawn(monitor.run());

    for _ in 0..200 {
        if storage.audit_count().unwrap() > 0 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    handle.stop();
    tokio::time::timeout(std::time::Duration::from_secs(5), task)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(*source.writes.lock().unwrap(), vec!["ping [EMAIL]".to_string()]);
    assert_eq!(storage.audit_count().unwrap(), 1);
}

/// Text source that keeps whatever was last written, like a clipboard.
#[derive(Default)]
struct ClipboardCell {
    text: Mutex<String>,
}

impl ClipboardCell {
    fn holding(text: &str) -> Self {
        Self {
            text: Mutex::new(text.to_string()),
        }
    }

    fn contents(&self) -> String {
        self.text.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextSource for ClipboardCell {
    async fn read(&self) -> Result<String> {
        Ok(self.contents())
    }

    async fn write(&self, text: &str) -> Result<()> {
        *self.text.lock().unwrap() = text.to_string();
        Ok(())
    }
}

fn email_disabled() -> RuleSet {
    RuleSet::default().with_category(
        Category::Email,
        CategoryRule {
            enabled: false,
            ..CategoryRule::default_for(Category::Email)
        },
    )
}

/// Apply a `clipredact rules` edit the way the CLI process does: its own
/// connection, its own manager.
fn edit_from_cli(path: &std::path::Path, cmd: &RulesCommand) {
    let storage = Arc::new(Storage::open(path).unwrap());
    let manager = manager_over(&storage, &Arc::new(PatternCache::new()));
    let edited = cmd.edited(&manager.get()).unwrap().unwrap();
    manager.update(edited).unwrap();
}

/// Observer installed by `run`: any rule change makes the monitor look at the
/// current text again.
fn rescan_on_change(manager: &ConfigManager, handle: &MonitorHandle) -> Arc<AtomicUsize> {
    let changes = Arc::new(AtomicUsize::new(0));
    let counter = changes.clone();
    let handle = handle.clone();
    manager.on_change(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        handle.request_rescan();
    });
    changes
}

#[tokio::test]
async fn test_cli_edit_reaches_running_monitor() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clipredact.db");

    let storage = Arc::new(Storage::open(&path).unwrap());
    let cache = Arc::new(PatternCache::new());
    let manager = Arc::new(manager_over(&storage, &cache));
    manager.update(email_disabled()).unwrap();

    let clipboard = Arc::new(ClipboardCell::holding("mail jane@corp.example"));
    let mut monitor = Monitor::new(
        clipboard.clone(),
        manager.clone(),
        Arc::new(Redactor::new(cache)),
        MonitorConfig::default(),
    )
    .with_audit_sink(storage.clone());
    let changes = rescan_on_change(&manager, &monitor.handle());
    let watcher = RuleWatcher::new(manager.clone(), Duration::from_millis(10));

    assert_eq!(monitor.poll_once().await, PollOutcome::Clean);
    assert_eq!(monitor.poll_once().await, PollOutcome::Unchanged);
    assert!(!watcher.check_once());

    edit_from_cli(
        &path,
        &RulesCommand::Enable {
            category: Category::Email,
        },
    );
    // Nothing changes until the watcher notices.
    assert!(!manager.get().is_enabled(Category::Email));

    assert!(watcher.check_once());
    assert!(manager.get().is_enabled(Category::Email));
    assert_eq!(changes.load(Ordering::SeqCst), 1);
    assert!(!watcher.check_once());

    assert_eq!(
        monitor.poll_once().await,
        PollOutcome::Redacted {
            detections: vec!["email".to_string()]
        }
    );
    assert!(!clipboard.contents().contains("jane@corp.example"));
    assert_eq!(storage.audit_count().unwrap(), 1);
}

#[tokio::test]
async fn test_cli_disable_stops_redaction_in_running_monitor() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clipredact.db");

    let storage = Arc::new(Storage::open(&path).unwrap());
    let cache = Arc::new(PatternCache::new());
    let manager = Arc::new(manager_over(&storage, &cache));

    let clipboard = Arc::new(ClipboardCell::default());
    let mut monitor = Monitor::new(
        clipboard.clone(),
        manager.clone(),
        Arc::new(Redactor::new(cache)),
        MonitorConfig::default(),
    );
    rescan_on_change(&manager, &monitor.handle());
    let watcher = RuleWatcher::new(manager.clone(), Duration::from_millis(10));

    edit_from_cli(
        &path,
        &RulesCommand::Disable {
            category: Category::Email,
        },
    );
    assert!(watcher.check_once());

    clipboard.write("mail jane@corp.example").await.unwrap();
    assert_eq!(monitor.poll_once().await, PollOutcome::Clean);
    assert_eq!(clipboard.contents(), "mail jane@corp.example");
}

#[tokio::test]
async fn test_watcher_task_applies_cli_edits_while_running() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clipredact.db");

    let storage = Arc::new(Storage::open(&path).unwrap());
    let cache = Arc::new(PatternCache::new());
    let manager = Arc::new(manager_over(&storage, &cache));
    manager
        .update(RuleSet {
            polling_interval_ms: 5,
            ..email_disabled()
        })
        .unwrap();

    let clipboard = Arc::new(ClipboardCell::holding("mail jane@corp.example"));
    let monitor = Monitor::new(
        clipboard.clone(),
        manager.clone(),
        Arc::new(Redactor::new(cache)),
        MonitorConfig::default(),
    )
    .with_audit_sink(storage.clone());
    let handle = monitor.handle();
    rescan_on_change(&manager, &handle);

    let watcher = RuleWatcher::new(manager.clone(), Duration::from_millis(10));
    let watcher_task = tokio::spawn(watcher.run(handle.clone()));
    let monitor_task = tokio::spawn(monitor.run());

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(clipboard.contents(), "mail jane@corp.example");

    edit_from_cli(
        &path,
        &RulesCommand::Enable {
            category: Category::Email,
        },
    );
    for _ in 0..400 {
        if storage.audit_count().unwrap() > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    handle.stop();
    tokio::time::timeout(Duration::from_secs(5), monitor_task)
        .await
        .unwrap()
        .unwrap();
    tokio::time::timeout(Duration::from_secs(5), watcher_task)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(storage.audit_count().unwrap(), 1);
    assert!(!clipboard.contents().contains("jane@corp.example"));
}
