//! Plugin driver — ordered composition of plugin-contributed values.
//!
//! Four primitives, deliberately kept separate because their fold semantics
//! differ: shallow object merge (later wins), array concatenation, boolean
//! short-circuit, and value reduction. Each one recomputes the merged plugin
//! list on every call, so a wholesale [`PluginDriver::set_plugins`] takes
//! effect on the very next invocation. A failing hook is logged against the
//! owning application and skipped; it never stops the other plugins or the
//! caller.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use dashmap::DashMap;
use tracing::error;

use super::context::PluginContext;
use super::registration::{PluginRegistration, PluginSet};

/// Holds the registered plugins and hands out per-application contexts.
#[derive(Debug, Default)]
pub struct PluginDriver {
    plugins: RwLock<PluginSet>,
    contexts: DashMap<String, Arc<PluginContext>>,
}

impl PluginDriver {
    /// Driver with an initial plugin configuration.
    pub fn new(plugins: PluginSet) -> Arc<Self> {
        Arc::new(Self {
            plugins: RwLock::new(plugins),
            contexts: DashMap::new(),
        })
    }

    /// Replace the plugin configuration wholesale.
    ///
    /// Existing [`PluginContext`] handles observe the new configuration on
    /// their next call — merged results are never cached.
    pub fn set_plugins(&self, plugins: PluginSet) {
        *self
            .plugins
            .write()
            .unwrap_or_else(PoisonError::into_inner) = plugins;
    }

    /// The cached per-application facade, created on first use.
    ///
    /// Exactly one context exists per application name for the driver's
    /// lifetime.
    pub fn select(self: &Arc<Self>, app_name: &str) -> Arc<PluginContext> {
        self.contexts
            .entry(app_name.to_string())
            .or_insert_with(|| {
                Arc::new(PluginContext::new(Arc::downgrade(self), app_name.to_string()))
            })
            .clone()
    }

    /// Global plugins followed by the application's own, both in
    /// registration order. Missing lists are empty.
    pub fn merged_plugins(&self, app_name: &str) -> Vec<Arc<PluginRegistration>> {
        let plugins = self.plugins.read().unwrap_or_else(PoisonError::into_inner);
        let mut merged = plugins.global.clone();
        if let Some(module) = plugins.modules.get(app_name) {
            merged.extend(module.iter().cloned());
        }
        merged
    }

    /// Shallow-merge a mapping-valued property across the merged list.
    /// Later plugins overwrite earlier keys; plugins without the property
    /// are skipped.
    pub fn merge_object_property<F>(
        &self,
        app_name: &str,
        select: F,
    ) -> HashMap<String, serde_json::Value>
    where
        F: Fn(&PluginRegistration) -> Option<&HashMap<String, serde_json::Value>>,
    {
        let mut merged = HashMap::new();
        for plugin in self.merged_plugins(app_name) {
            if let Some(fragment) = select(&plugin) {
                for (key, value) in fragment {
                    merged.insert(key.clone(), value.clone());
                }
            }
        }
        merged
    }

    /// Concatenate a sequence-valued property across the merged list,
    /// preserving plugin order and within-plugin order.
    pub fn concat_array_property<F>(&self, app_name: &str, select: F) -> Vec<String>
    where
        F: Fn(&PluginRegistration) -> Option<&[String]>,
    {
        let mut concatenated = Vec::new();
        for plugin in self.merged_plugins(app_name) {
            if let Some(items) = select(&plugin) {
                concatenated.extend(items.iter().cloned());
            }
        }
        concatenated
    }

    /// Run a boolean hook across the merged list, short-circuiting on the
    /// first truthy result.
    ///
    /// `invoke` returns `None` when the plugin does not define the hook. A
    /// plugin after a truthy return is not invoked. An `Err` counts as
    /// `false` and the chain continues.
    pub fn first_true_hook<F>(&self, app_name: &str, invoke: F) -> bool
    where
        F: Fn(&PluginRegistration) -> Option<anyhow::Result<bool>>,
    {
        for plugin in self.merged_plugins(app_name) {
            match invoke(&plugin) {
                Some(Ok(true)) => return true,
                Some(Ok(false)) | None => {}
                Some(Err(err)) => log_hook_failure(app_name, &plugin.name, &err),
            }
        }
        false
    }

    /// Thread a value through every plugin's hook in order.
    ///
    /// `invoke` receives the current value and returns the plugin's
    /// transformation, or `None` when the hook is not defined — the value
    /// then passes through unchanged. An `Err` leaves the value untouched
    /// for that plugin and the chain continues.
    pub fn reduce_hook<V, F>(&self, app_name: &str, init: V, invoke: F) -> V
    where
        F: Fn(&PluginRegistration, &V) -> Option<anyhow::Result<V>>,
    {
        let mut value = init;
        for plugin in self.merged_plugins(app_name) {
            match invoke(&plugin, &value) {
                Some(Ok(next)) => value = next,
                Some(Err(err)) => log_hook_failure(app_name, &plugin.name, &err),
                None => {}
            }
        }
        value
    }
}

fn log_hook_failure(app_name: &str, plugin_name: &str, err: &anyhow::Error) {
    error!(app = app_name, plugin = plugin_name, "plugin hook failed: {err:#}");
}
