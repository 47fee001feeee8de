//! Per-application plugin facade.
//!
//! A [`PluginContext`] exposes the combined plugin configuration and hooks
//! for one application as if they were a single plugin. Contexts are created
//! lazily by [`PluginDriver::select`] and cached for the application's
//! lifetime, but every accessor delegates back to the driver — nothing is
//! memoized here, so plugin replacement is visible on the next call.

use std::collections::HashMap;
use std::sync::Weak;

use super::driver::PluginDriver;
use super::registration::SandboxSpec;

/// Combined view of all plugins applying to one application.
#[derive(Debug)]
pub struct PluginContext {
    driver: Weak<PluginDriver>,
    app_name: String,
}

impl PluginContext {
    pub(super) fn new(driver: Weak<PluginDriver>, app_name: String) -> Self {
        Self { driver, app_name }
    }

    /// The application this context is bound to.
    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    /// Merged `options` mapping, later plugins overwriting earlier keys.
    pub fn options(&self) -> HashMap<String, serde_json::Value> {
        let Some(driver) = self.driver.upgrade() else {
            return HashMap::new();
        };
        driver.merge_object_property(&self.app_name, |p| p.options.as_ref())
    }

    /// Concatenated `scope_properties` across the merged plugin list.
    pub fn scope_properties(&self) -> Vec<String> {
        let Some(driver) = self.driver.upgrade() else {
            return Vec::new();
        };
        driver.concat_array_property(&self.app_name, |p| p.scope_properties.as_deref())
    }

    /// Concatenated `escape_properties` across the merged plugin list.
    pub fn escape_properties(&self) -> Vec<String> {
        let Some(driver) = self.driver.upgrade() else {
            return Vec::new();
        };
        driver.concat_array_property(&self.app_name, |p| p.escape_properties.as_deref())
    }

    /// Whether any plugin excludes this URL from processing.
    pub fn exclude_checker(&self, url: &str) -> bool {
        let Some(driver) = self.driver.upgrade() else {
            return false;
        };
        driver.first_true_hook(&self.app_name, |p| {
            p.exclude_checker.as_ref().map(|hook| hook(url))
        })
    }

    /// Whether any plugin asks for this URL to be left untouched.
    pub fn ignore_checker(&self, url: &str) -> bool {
        let Some(driver) = self.driver.upgrade() else {
            return false;
        };
        driver.first_true_hook(&self.app_name, |p| {
            p.ignore_checker.as_ref().map(|hook| hook(url))
        })
    }

    /// Thread fetched script code through every plugin's `loader` hook.
    pub fn loader(&self, code: String, url: &str) -> String {
        let Some(driver) = self.driver.upgrade() else {
            return code;
        };
        driver.reduce_hook(&self.app_name, code, |p, current| {
            p.loader.as_ref().map(|hook| hook(current, url))
        })
    }

    /// Thread document HTML through every plugin's `process_html` hook.
    pub fn process_html(&self, code: String, url: &str) -> String {
        let Some(driver) = self.driver.upgrade() else {
            return code;
        };
        driver.reduce_hook(&self.app_name, code, |p, current| {
            p.process_html.as_ref().map(|hook| hook(current, url))
        })
    }

    /// Thread a sandbox descriptor through every plugin's `process_sandbox`
    /// hook.
    pub fn process_sandbox(&self, spec: SandboxSpec) -> SandboxSpec {
        let Some(driver) = self.driver.upgrade() else {
            return spec;
        };
        driver.reduce_hook(&self.app_name, spec, |p, current| {
            p.process_sandbox.as_ref().map(|hook| hook(current))
        })
    }
}
