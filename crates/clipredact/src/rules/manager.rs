//! Live rule set management.
//!
//! The [`ConfigManager`] owns the active [`RuleSet`] snapshot. Readers get a
//! cheap `Arc` clone that never changes underneath them; writers persist
//! first, swap the pointer, then notify observers.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use tracing::{debug, info, warn};

use super::RuleSet;
use crate::error::{Error, Result};
use crate::redaction::PatternCache;

/// Durable storage for the rule set.
pub trait RuleStore: Send + Sync {
    /// Load the stored rule set.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RuleSetNotFound`] if nothing has been stored yet,
    /// [`Error::CorruptRuleSet`] if the stored data is unusable, or another
    /// error if the store cannot be read.
    fn load_rule_set(&self) -> Result<RuleSet>;

    /// Replace the stored rule set.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails; the stored rule set is then
    /// unchanged.
    fn save_rule_set(&self, rules: &RuleSet) -> Result<()>;

    /// A token that changes whenever the stored rule set is written, by this
    /// process or any other. `None` means the store cannot tell, or holds
    /// nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn revision(&self) -> Result<Option<String>> {
        Ok(None)
    }
}

/// Callback invoked with the new snapshot after every update or reload.
pub type RuleObserver = Arc<dyn Fn(&Arc<RuleSet>) + Send + Sync>;

/// Holds the current rule set and publishes changes to it.
pub struct ConfigManager {
    store: Arc<dyn RuleStore>,
    current: RwLock<Arc<RuleSet>>,
    observers: RwLock<Vec<RuleObserver>>,
    /// Serializes update and reload so persistence, swap and notification
    /// happen in the same order for every writer.
    write_lock: Mutex<()>,
    /// Store revision the current snapshot corresponds to.
    revision: Mutex<Option<String>>,
    cache: Option<Arc<PatternCache>>,
}

impl fmt::Debug for ConfigManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigManager")
            .field("current", &self.get())
            .field("observers", &self.observer_count())
            .field("revision", &*self.lock_revision())
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl ConfigManager {
    /// Load the rule set from `store`.
    ///
    /// A missing or corrupt stored rule set is replaced by
    /// [`RuleSet::default`], which is written back. If that write fails the
    /// defaults are still used for this process.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Persistence`] if the store cannot be read for any
    /// other reason.
    pub fn load(store: Arc<dyn RuleStore>) -> Result<Self> {
        let mut revision = read_revision(store.as_ref());
        let rules = match store.load_rule_set() {
            Ok(rules) => {
                debug!(
                    exact_rules = rules.exact_rules.len(),
                    interval_ms = rules.polling_interval_ms,
                    "Loaded rule set"
                );
                rules
            }
            Err(err) if err.is_missing_or_corrupt() => {
                info!(reason = %err, "Using default rule set");
                let defaults = RuleSet::default();
                match store.save_rule_set(&defaults) {
                    Ok(()) => revision = read_revision(store.as_ref()),
                    Err(save_err) => {
                        warn!(error = %save_err, "Failed to persist default rule set");
                    }
                }
                defaults
            }
            Err(err) => return Err(Error::persistence("load", err)),
        };

        Ok(Self {
            store,
            current: RwLock::new(Arc::new(rules)),
            observers: RwLock::new(Vec::new()),
            write_lock: Mutex::new(()),
            revision: Mutex::new(revision),
            cache: None,
        })
    }

    /// Clear `cache` on every reload.
    #[must_use]
    pub fn with_pattern_cache(mut self, cache: Arc<PatternCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// The current snapshot. Never touches storage.
    #[must_use]
    pub fn get(&self) -> Arc<RuleSet> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Persist `rules`, make them current, then notify observers.
    ///
    /// Observers run on the calling thread before this returns. An observer
    /// must not call [`update`](Self::update) or [`reload`](Self::reload).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Persistence`] if the store rejects the write. The
    /// current snapshot is then unchanged and no observer is called.
    pub fn update(&self, rules: RuleSet) -> Result<Arc<RuleSet>> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        self.store
            .save_rule_set(&rules)
            .map_err(|err| Error::persistence("save", err))?;
        *self.lock_revision() = read_revision(self.store.as_ref());

        let rules = Arc::new(rules);
        self.publish(&rules);
        info!("Rule set updated");
        Ok(rules)
    }

    /// Re-read the rule set from storage, make it current, then notify
    /// observers.
    ///
    /// A missing or corrupt stored rule set is replaced by
    /// [`RuleSet::default`], which is written back; a failed write is logged
    /// and the defaults are still used. The pattern cache, if attached, is
    /// cleared.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Persistence`] if the store cannot be read. The
    /// current snapshot is then unchanged and no observer is called.
    pub fn reload(&self) -> Result<Arc<RuleSet>> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        // Read before loading so a write racing with this reload still shows
        // up as a new revision on the next check.
        let mut revision = read_revision(self.store.as_ref());
        let rules = match self.store.load_rule_set() {
            Ok(rules) => rules,
            Err(err) if err.is_missing_or_corrupt() => {
                warn!(reason = %err, "Stored rule set unusable, restoring defaults");
                let defaults = RuleSet::default();
                match self.store.save_rule_set(&defaults) {
                    Ok(()) => revision = read_revision(self.store.as_ref()),
                    Err(save_err) => {
                        warn!(error = %save_err, "Failed to persist default rule set");
                    }
                }
                defaults
            }
            Err(err) => return Err(Error::persistence("reload", err)),
        };
        *self.lock_revision() = revision;

        if let Some(cache) = &self.cache {
            cache.clear();
        }

        let rules = Arc::new(rules);
        self.publish(&rules);
        info!("Rule set reloaded");
        Ok(rules)
    }

    /// Reload if the store's revision differs from the one the current
    /// snapshot was read at. Returns the new snapshot when a reload happened.
    ///
    /// Stores that report no revision are never reloaded by this method.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Persistence`] if the revision or the rule set cannot
    /// be read.
    pub fn reload_if_changed(&self) -> Result<Option<Arc<RuleSet>>> {
        let latest = self
            .store
            .revision()
            .map_err(|err| Error::persistence("check", err))?;
        if latest == *self.lock_revision() {
            return Ok(None);
        }

        debug!(revision = ?latest, "Stored rule set changed");
        self.reload().map(Some)
    }

    /// Register an observer. Observers are called in registration order.
    pub fn on_change<F>(&self, observer: F)
    where
        F: Fn(&Arc<RuleSet>) + Send + Sync + 'static,
    {
        self.observers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(observer));
    }

    /// Number of registered observers.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.observers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn lock_revision(&self) -> MutexGuard<'_, Option<String>> {
        self.revision.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, rules: &Arc<RuleSet>) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::clone(rules);

        // Observers may call get() or on_change(), so no lock is held while
        // they run.
        let observers = self
            .observers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for observer in &observers {
            observer(rules);
        }
    }
}

fn read_revision(store: &dyn RuleStore) -> Option<String> {
    store.revision().unwrap_or_else(|err| {
        warn!(error = %err, "Failed to read rule set revision");
        None
    })
}
