//! Host-application seam.
//!
//! The host application (lifecycle, sandboxing, DOM mounting) lives outside
//! this crate. The pipeline talks to it through [`HostApplication`]: identity
//! and base URL on one side, the mutable [`ResourcePool`] and the terminal
//! callbacks on the other.

use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use crate::error::LoadError;
use crate::sources::dom::{ElementTree, NodeId};

/// The flattened document, shared between the link and script completion
/// paths and the host's ready callbacks.
pub type SharedTree = Arc<Mutex<ElementTree>>;

/// Which resource category a ready signal is attributable to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceCategory {
    /// Stylesheet links.
    Links,
    /// Scripts (inline and external).
    Scripts,
}

/// A stylesheet link discovered during flattening.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinkInfo {
    /// Fetched stylesheet text, empty until the coordinator resolves it.
    pub code: String,
    /// Placeholder comment node left in the tree where the link stood.
    pub placeholder: Option<NodeId>,
}

/// A script discovered during flattening.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScriptInfo {
    /// Script source text. Inline scripts carry it immediately; external
    /// scripts start empty and are filled by the coordinator.
    pub code: String,
    /// Whether the script came from a `src` attribute.
    pub is_external: bool,
    /// `async` attribute present.
    pub is_async: bool,
    /// `defer` attribute present.
    pub defer: bool,
    /// `type="module"`.
    pub module: bool,
}

impl ScriptInfo {
    /// An external script pending fetch.
    pub fn external(is_async: bool, defer: bool, module: bool) -> Self {
        Self {
            code: String::new(),
            is_external: true,
            is_async,
            defer,
            module,
        }
    }

    /// An inline script with its code already in hand.
    pub fn inline(code: String, module: bool) -> Self {
        Self {
            code,
            is_external: false,
            is_async: false,
            defer: false,
            module,
        }
    }
}

#[derive(Debug, Default)]
struct PoolInner {
    links: Vec<(String, LinkInfo)>,
    scripts: Vec<(String, ScriptInfo)>,
    inline_counter: usize,
}

/// Mutable accumulator of discovered resources, owned by the host app.
///
/// Extractors insert entries while walking the tree; the pipeline reads the
/// counts to decide between waiting on a fetch coordinator and signalling
/// readiness immediately. Entries keep insertion order.
#[derive(Debug, Default)]
pub struct ResourcePool {
    inner: Mutex<PoolInner>,
}

impl ResourcePool {
    /// Empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PoolInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a stylesheet link. Re-registering an address replaces the
    /// previous entry, keeping its original position.
    pub fn insert_link(&self, address: impl Into<String>, info: LinkInfo) {
        let address = address.into();
        let mut inner = self.lock();
        if let Some(slot) = inner.links.iter_mut().find(|(a, _)| *a == address) {
            slot.1 = info;
        } else {
            inner.links.push((address, info));
        }
    }

    /// Register a script under its address (or inline key).
    pub fn insert_script(&self, address: impl Into<String>, info: ScriptInfo) {
        let address = address.into();
        let mut inner = self.lock();
        if let Some(slot) = inner.scripts.iter_mut().find(|(a, _)| *a == address) {
            slot.1 = info;
        } else {
            inner.scripts.push((address, info));
        }
    }

    /// Number of registered links.
    pub fn link_count(&self) -> usize {
        self.lock().links.len()
    }

    /// Number of registered scripts, inline included.
    pub fn script_count(&self) -> usize {
        self.lock().scripts.len()
    }

    /// Addresses of all registered links, in discovery order.
    pub fn link_addresses(&self) -> Vec<String> {
        self.lock().links.iter().map(|(a, _)| a.clone()).collect()
    }

    /// Addresses of external scripts still awaiting their code.
    pub fn pending_script_addresses(&self) -> Vec<String> {
        self.lock()
            .scripts
            .iter()
            .filter(|(_, info)| info.is_external && info.code.is_empty())
            .map(|(a, _)| a.clone())
            .collect()
    }

    /// Look up a link entry.
    pub fn link(&self, address: &str) -> Option<LinkInfo> {
        self.lock()
            .links
            .iter()
            .find(|(a, _)| a == address)
            .map(|(_, info)| info.clone())
    }

    /// Look up a script entry.
    pub fn script(&self, address: &str) -> Option<ScriptInfo> {
        self.lock()
            .scripts
            .iter()
            .find(|(a, _)| a == address)
            .map(|(_, info)| info.clone())
    }

    /// Store fetched stylesheet text for `address`.
    pub fn set_link_code(&self, address: &str, code: &str) {
        if let Some(slot) = self.lock().links.iter_mut().find(|(a, _)| a == address) {
            slot.1.code = code.to_string();
        }
    }

    /// Store fetched (and loader-transformed) script text for `address`.
    pub fn set_script_code(&self, address: &str, code: &str) {
        if let Some(slot) = self.lock().scripts.iter_mut().find(|(a, _)| a == address) {
            slot.1.code = code.to_string();
        }
    }

    /// Placeholder node recorded for a link, if any.
    pub fn link_placeholder(&self, address: &str) -> Option<NodeId> {
        self.lock()
            .links
            .iter()
            .find(|(a, _)| a == address)
            .and_then(|(_, info)| info.placeholder)
    }

    /// Key for the next inline script ("inline-0", "inline-1", ...).
    pub fn next_inline_key(&self) -> String {
        let mut inner = self.lock();
        let key = format!("inline-{}", inner.inline_counter);
        inner.inline_counter += 1;
        key
    }
}

/// The embedded sub-application, as seen by the loading pipeline.
///
/// `on_ready` may legitimately fire up to twice per document — once when the
/// link set settles and once when the script set settles. The two categories
/// resolve on independent asynchronous paths, so the host must treat repeat
/// invocations idempotently (first mount wins, or wait for both categories).
pub trait HostApplication: Send + Sync {
    /// Application name, used for plugin selection and log correlation.
    fn name(&self) -> &str;

    /// Canonical application URL, the base for relative resource paths.
    fn url(&self) -> &str;

    /// Server-side-rendered document URL, preferred over [`Self::url`] for
    /// the document fetch when present.
    fn ssr_url(&self) -> Option<&str> {
        None
    }

    /// Whether style elements should be handed to the CSS scoping
    /// collaborator during flattening.
    fn scope_css(&self) -> bool {
        true
    }

    /// The application's resource accumulator.
    fn resources(&self) -> &ResourcePool;

    /// A resource category finished resolving; the tree is ready for use.
    fn on_ready(&self, tree: SharedTree, category: ResourceCategory);

    /// Terminal content error (empty document, missing head/body container).
    fn on_error(&self, error: LoadError);

    /// Terminal transport error fetching the document.
    fn on_load_error(&self, error: LoadError);
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_counts_and_order() {
        let pool = ResourcePool::new();
        pool.insert_link("https://x.test/a.css", LinkInfo::default());
        pool.insert_link("https://x.test/b.css", LinkInfo::default());
        pool.insert_script("https://x.test/a.js", ScriptInfo::external(false, false, false));
        assert_eq!(pool.link_count(), 2);
        assert_eq!(pool.script_count(), 1);
        assert_eq!(
            pool.link_addresses(),
            vec!["https://x.test/a.css", "https://x.test/b.css"]
        );
    }

    #[test]
    fn test_reinsert_replaces_entry_in_place() {
        let pool = ResourcePool::new();
        pool.insert_link("a.css", LinkInfo::default());
        pool.insert_link("b.css", LinkInfo::default());
        pool.insert_link(
            "a.css",
            LinkInfo {
                code: "x".to_string(),
                placeholder: None,
            },
        );
        assert_eq!(pool.link_count(), 2);
        assert_eq!(pool.link_addresses(), vec!["a.css", "b.css"]);
        assert_eq!(pool.link("a.css").unwrap().code, "x");
    }

    #[test]
    fn test_pending_scripts_skips_inline_and_resolved() {
        let pool = ResourcePool::new();
        pool.insert_script("inline-0", ScriptInfo::inline("console.log(1)".to_string(), false));
        pool.insert_script("https://x.test/a.js", ScriptInfo::external(false, false, false));
        pool.insert_script("https://x.test/b.js", ScriptInfo::external(true, false, false));
        pool.set_script_code("https://x.test/b.js", "done()");
        assert_eq!(pool.pending_script_addresses(), vec!["https://x.test/a.js"]);
    }

    #[test]
    fn test_inline_keys_are_sequential() {
        let pool = ResourcePool::new();
        assert_eq!(pool.next_inline_key(), "inline-0");
        assert_eq!(pool.next_inline_key(), "inline-1");
    }
}
