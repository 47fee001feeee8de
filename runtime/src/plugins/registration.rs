//! Plugin registration types.
//!
//! A plugin is a named record of optional capabilities: configuration
//! fragments (`options`, `scope_properties`, `escape_properties`) and hook
//! functions invoked at defined extension points. Every slot is optional —
//! the driver probes for presence before invoking.
//!
//! Hooks are synchronous by contract. A hook that needs asynchronous work
//! must be modeled by the surrounding collaborator, not here. Fallibility is
//! expressed through the `Result` return: an `Err` is logged against the
//! owning application and the hook chain continues as if the plugin had
//! returned nothing.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// URL veto hook (`exclude_checker` / `ignore_checker`).
pub type CheckerHook = Box<dyn Fn(&str) -> Result<bool> + Send + Sync>;

/// Content transformation hook (`process_html` / `loader`): receives the
/// current text and the source URL, returns the transformed text.
pub type TransformHook = Box<dyn Fn(&str, &str) -> Result<String> + Send + Sync>;

/// Sandbox post-processing hook: threads a [`SandboxSpec`] through the chain.
pub type SandboxHook = Box<dyn Fn(&SandboxSpec) -> Result<SandboxSpec> + Send + Sync>;

/// Descriptor for the host's sandbox, threaded through `process_sandbox`.
///
/// The sandbox itself (proxying, property isolation) is a host concern; the
/// pipeline only composes plugin transformations of this descriptor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SandboxSpec {
    /// Strict isolation mode.
    pub strict: bool,
    /// Property keys confined to the sub-application scope.
    pub scope_properties: Vec<String>,
    /// Property keys escaping to the host scope.
    pub escape_properties: Vec<String>,
}

/// A named plugin with optional configuration and hook slots.
#[derive(Default)]
pub struct PluginRegistration {
    /// Plugin name, used in hook failure diagnostics.
    pub name: String,
    /// Free-form configuration fragment, shallow-merged across plugins.
    pub options: Option<HashMap<String, serde_json::Value>>,
    /// Property keys to confine, concatenated across plugins.
    pub scope_properties: Option<Vec<String>>,
    /// Property keys to escape, concatenated across plugins.
    pub escape_properties: Option<Vec<String>>,
    /// Veto hook: any plugin returning `true` excludes the URL entirely.
    pub exclude_checker: Option<CheckerHook>,
    /// Veto hook: any plugin returning `true` leaves the URL untouched.
    pub ignore_checker: Option<CheckerHook>,
    /// Script code interception, applied to each fetched script.
    pub loader: Option<TransformHook>,
    /// Whole-document HTML transformation, applied before isolation.
    pub process_html: Option<TransformHook>,
    /// Sandbox descriptor post-processing.
    pub process_sandbox: Option<SandboxHook>,
}

impl PluginRegistration {
    /// A plugin with the given name and no capabilities.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Attach an options fragment.
    pub fn with_options(mut self, options: HashMap<String, serde_json::Value>) -> Self {
        self.options = Some(options);
        self
    }

    /// Attach scope property keys.
    pub fn with_scope_properties(mut self, keys: Vec<String>) -> Self {
        self.scope_properties = Some(keys);
        self
    }

    /// Attach escape property keys.
    pub fn with_escape_properties(mut self, keys: Vec<String>) -> Self {
        self.escape_properties = Some(keys);
        self
    }

    /// Attach an `exclude_checker` hook.
    pub fn with_exclude_checker<F>(mut self, hook: F) -> Self
    where
        F: Fn(&str) -> Result<bool> + Send + Sync + 'static,
    {
        self.exclude_checker = Some(Box::new(hook));
        self
    }

    /// Attach an `ignore_checker` hook.
    pub fn with_ignore_checker<F>(mut self, hook: F) -> Self
    where
        F: Fn(&str) -> Result<bool> + Send + Sync + 'static,
    {
        self.ignore_checker = Some(Box::new(hook));
        self
    }

    /// Attach a `loader` hook.
    pub fn with_loader<F>(mut self, hook: F) -> Self
    where
        F: Fn(&str, &str) -> Result<String> + Send + Sync + 'static,
    {
        self.loader = Some(Box::new(hook));
        self
    }

    /// Attach a `process_html` hook.
    pub fn with_process_html<F>(mut self, hook: F) -> Self
    where
        F: Fn(&str, &str) -> Result<String> + Send + Sync + 'static,
    {
        self.process_html = Some(Box::new(hook));
        self
    }

    /// Attach a `process_sandbox` hook.
    pub fn with_process_sandbox<F>(mut self, hook: F) -> Self
    where
        F: Fn(&SandboxSpec) -> Result<SandboxSpec> + Send + Sync + 'static,
    {
        self.process_sandbox = Some(Box::new(hook));
        self
    }
}

impl fmt::Debug for PluginRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRegistration")
            .field("name", &self.name)
            .field("options", &self.options)
            .field("scope_properties", &self.scope_properties)
            .field("escape_properties", &self.escape_properties)
            .field("exclude_checker", &self.exclude_checker.is_some())
            .field("ignore_checker", &self.ignore_checker.is_some())
            .field("loader", &self.loader.is_some())
            .field("process_html", &self.process_html.is_some())
            .field("process_sandbox", &self.process_sandbox.is_some())
            .finish()
    }
}

/// The full plugin configuration: a global list applied to every application
/// plus per-application lists keyed by name.
///
/// In any merged chain, application-specific plugins always run after global
/// plugins; within each group, registration order is preserved.
#[derive(Debug, Default)]
pub struct PluginSet {
    /// Plugins applied to every application.
    pub global: Vec<Arc<PluginRegistration>>,
    /// Plugins applied only to the named application.
    pub modules: HashMap<String, Vec<Arc<PluginRegistration>>>,
}

impl PluginSet {
    /// Empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a global plugin.
    pub fn with_global(mut self, plugin: PluginRegistration) -> Self {
        self.global.push(Arc::new(plugin));
        self
    }

    /// Append a plugin for one application.
    pub fn with_module(mut self, app_name: impl Into<String>, plugin: PluginRegistration) -> Self {
        self.modules
            .entry(app_name.into())
            .or_default()
            .push(Arc::new(plugin));
        self
    }
}
