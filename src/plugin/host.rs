//! Plugin lifecycle and health tracking.

use tracing::{info, warn};

use super::{Plugin, Registrar};
use crate::dispatch::{DispatchOutcome, Dispatcher};
use crate::error::{ClientError, ClientResult, PluginError};
use crate::session::Snapshot;

/// Failure bookkeeping for one plugin.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PluginHealth {
    /// Dispatch cycles in a row in which the plugin failed.
    pub consecutive_failures: u32,
    /// Failed callbacks since load.
    pub total_failures: u64,
    pub last_error: Option<PluginError>,
}

impl PluginHealth {
    pub fn is_healthy(&self) -> bool {
        self.consecutive_failures == 0
    }
}

struct Record {
    name: String,
    plugin: Box<dyn Plugin>,
    /// Bindings are live in the dispatcher.
    enabled: bool,
    health: PluginHealth,
}

/// Loaded plugins, kept in load order.
pub struct PluginHost {
    records: Vec<Record>,
    /// Auto-deactivation threshold. 0 disables it.
    max_failures: u32,
}

impl PluginHost {
    pub fn new(max_failures: u32) -> Self {
        Self {
            records: Vec::new(),
            max_failures,
        }
    }

    fn find(&self, name: &str) -> ClientResult<&Record> {
        self.records
            .iter()
            .find(|r| r.name == name)
            .ok_or_else(|| ClientError::UnknownPlugin(name.to_string()))
    }

    fn find_mut(&mut self, name: &str) -> ClientResult<&mut Record> {
        self.records
            .iter_mut()
            .find(|r| r.name == name)
            .ok_or_else(|| ClientError::UnknownPlugin(name.to_string()))
    }

    /// Load a plugin: run its load hook, then bind its callbacks.
    pub fn load(
        &mut self,
        name: &str,
        mut plugin: Box<dyn Plugin>,
        dispatcher: &mut Dispatcher,
        snapshot: &Snapshot,
    ) -> ClientResult<()> {
        if self.records.iter().any(|r| r.name == name) {
            return Err(ClientError::DuplicateName(name.to_string()));
        }

        plugin.on_load(snapshot);
        let mut registrar = Registrar::new(name, dispatcher);
        plugin.register_events(&mut registrar);
        info!(plugin = %name, bindings = registrar.bound(), "plugin loaded");

        self.records.push(Record {
            name: name.to_string(),
            plugin,
            enabled: true,
            health: PluginHealth::default(),
        });
        Ok(())
    }

    /// Remove a plugin entirely. Its bindings are gone before this returns.
    pub fn unload(&mut self, name: &str, dispatcher: &mut Dispatcher) -> ClientResult<()> {
        let index = self
            .records
            .iter()
            .position(|r| r.name == name)
            .ok_or_else(|| ClientError::UnknownPlugin(name.to_string()))?;

        let mut record = self.records.remove(index);
        let removed = dispatcher.remove_owner(name);
        if record.enabled {
            record.plugin.on_unload();
        }
        info!(plugin = %name, bindings = removed, "plugin unloaded");
        Ok(())
    }

    /// Drop a plugin's bindings but keep it loaded. Returns `false` if it was
    /// already deactivated.
    pub fn deactivate(&mut self, name: &str, dispatcher: &mut Dispatcher) -> ClientResult<bool> {
        let record = self.find_mut(name)?;
        if !record.enabled {
            return Ok(false);
        }
        dispatcher.remove_owner(name);
        record.plugin.on_unload();
        record.enabled = false;
        info!(plugin = %name, "plugin deactivated");
        Ok(true)
    }

    /// Re-bind a deactivated plugin. Resets its failure streak.
    pub fn activate(
        &mut self,
        name: &str,
        dispatcher: &mut Dispatcher,
        snapshot: &Snapshot,
    ) -> ClientResult<bool> {
        let record = self.find_mut(name)?;
        if record.enabled {
            return Ok(false);
        }
        record.plugin.on_load(snapshot);
        let mut registrar = Registrar::new(&record.name, dispatcher);
        record.plugin.register_events(&mut registrar);
        record.enabled = true;
        record.health.consecutive_failures = 0;
        info!(plugin = %name, "plugin activated");
        Ok(true)
    }

    /// Bound by the host and reported active by the plugin itself.
    pub fn is_active(&self, name: &str) -> ClientResult<bool> {
        let record = self.find(name)?;
        Ok(record.enabled && record.plugin.is_active())
    }

    pub fn help(&self, name: &str) -> ClientResult<String> {
        Ok(self.find(name)?.plugin.help())
    }

    pub fn set_option(&mut self, name: &str, option: &str) -> ClientResult<()> {
        let record = self.find_mut(name)?;
        record
            .plugin
            .set_option(option)
            .map_err(|e| ClientError::PluginCallback {
                plugin: name.to_string(),
                message: e.to_string(),
            })
    }

    /// Plugin names in load order.
    pub fn names(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.name.as_str()).collect()
    }

    pub fn health(&self, name: &str) -> Option<&PluginHealth> {
        self.records
            .iter()
            .find(|r| r.name == name)
            .map(|r| &r.health)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Fold one dispatch cycle into health records. A plugin fails a cycle
    /// when any of its callbacks failed, however many did. Plugins that reach
    /// the failure threshold are deactivated; their names are returned.
    pub fn record_outcome(
        &mut self,
        outcome: &DispatchOutcome,
        dispatcher: &mut Dispatcher,
    ) -> Vec<String> {
        // (plugin, failed callbacks, last error) in first-failure order.
        let mut failed: Vec<(&str, u64, &PluginError)> = Vec::new();
        for failure in &outcome.failures {
            match failed.iter_mut().find(|(name, ..)| *name == failure.plugin) {
                Some(entry) => {
                    entry.1 += 1;
                    entry.2 = &failure.error;
                }
                None => failed.push((failure.plugin.as_str(), 1, &failure.error)),
            }
        }

        for owner in &outcome.succeeded {
            if failed.iter().any(|(name, ..)| name == owner) {
                continue;
            }
            if let Some(record) = self.records.iter_mut().find(|r| &r.name == owner) {
                record.health.consecutive_failures = 0;
            }
        }

        let mut tripped = Vec::new();
        for (name, count, error) in failed {
            let Some(record) = self.records.iter_mut().find(|r| r.name == name) else {
                continue;
            };
            record.health.consecutive_failures += 1;
            record.health.total_failures += count;
            record.health.last_error = Some(error.clone());

            if self.max_failures > 0
                && record.enabled
                && record.health.consecutive_failures >= self.max_failures
            {
                warn!(
                    plugin = %name,
                    failures = record.health.consecutive_failures,
                    error = %error,
                    "plugin failing repeatedly, deactivating"
                );
                tripped.push(name.to_string());
            }
        }

        for name in &tripped {
            if let Err(e) = self.deactivate(name, dispatcher) {
                warn!(plugin = %name, error = %e, "auto-deactivation failed");
            }
        }
        tripped
    }
}
