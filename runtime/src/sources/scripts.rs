//! Script extraction and fetch coordination.
//!
//! Every script element passes through here during flattening. JavaScript
//! scripts — inline or external — are pulled into the application's script
//! set and replaced by comments; non-JS script types (templates, JSON data)
//! stay in the document. The coordinator fetches external scripts, threads
//! each one through the plugin `loader` chain, and signals the host when the
//! script category has settled.

use futures::future::join_all;
use tracing::error;

use crate::app::{HostApplication, ResourceCategory, ScriptInfo, SharedTree};
use crate::plugins::PluginContext;
use crate::sources::cache::SourceCache;
use crate::sources::dom::{complete_path, ElementTree, NodeId};
use crate::sources::fetch::Fetch;

/// `type` attribute values treated as executable JavaScript.
const JS_MIME_TYPES: &[&str] = &[
    "",
    "text/javascript",
    "text/ecmascript",
    "application/javascript",
    "application/ecmascript",
    "module",
];

/// Classify one script element and register it for execution by the host.
pub fn extract_script(
    tree: &mut ElementTree,
    node: NodeId,
    app: &dyn HostApplication,
    context: &PluginContext,
) {
    let type_attr = tree
        .attr(node, "type")
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    if !JS_MIME_TYPES.contains(&type_attr.as_str()) {
        // template/data scripts are content, not code
        return;
    }
    if tree.has_attr(node, "exclude") {
        tree.replace_with_comment(node, "script element with exclude attribute ignored");
        return;
    }
    let module = type_attr == "module";

    match tree.attr(node, "src").map(str::to_string) {
        Some(src) => {
            let address = complete_path(&src, app.url());
            if tree.has_attr(node, "ignore") || context.ignore_checker(&address) {
                tree.set_attr(node, "src", &address);
                return;
            }
            if context.exclude_checker(&address) {
                tree.replace_with_comment(
                    node,
                    &format!("script with src={address} is excluded"),
                );
                return;
            }
            let info = ScriptInfo::external(
                tree.has_attr(node, "async"),
                tree.has_attr(node, "defer"),
                module,
            );
            app.resources().insert_script(address.clone(), info);
            tree.replace_with_comment(node, &format!("script with src={address} extracted"));
        }
        None => {
            if tree.has_attr(node, "ignore") {
                return;
            }
            let code = tree.text_content(node);
            if code.trim().is_empty() {
                tree.remove(node);
                return;
            }
            let key = app.resources().next_inline_key();
            app.resources().insert_script(key, ScriptInfo::inline(code, module));
            tree.replace_with_comment(node, "inline script extracted");
        }
    }
}

/// Fetch all pending external scripts and signal the host once the script
/// category has settled.
///
/// Fetched code runs through the plugin `loader` chain before it is stored.
/// Inline scripts are already resolved and need no fetch; failures are
/// logged per script and do not block the ready signal.
pub async fn fetch_scripts_from_html(
    tree: &SharedTree,
    app: &dyn HostApplication,
    context: &PluginContext,
    fetcher: &dyn Fetch,
    cache: &SourceCache,
) {
    let addresses = app.resources().pending_script_addresses();
    let app_name = app.name().to_string();

    let results = join_all(addresses.iter().map(|address| {
        let app_name = app_name.clone();
        async move { cache.fetch(address, &app_name, fetcher).await }
    }))
    .await;

    for (address, result) in addresses.iter().zip(results) {
        match result {
            Ok(code) => {
                let code = context.loader(code.to_string(), address);
                app.resources().set_script_code(address, &code);
            }
            Err(err) => {
                error!(app = %app_name, "failed to fetch script {address}: {err:#}");
            }
        }
    }

    app.on_ready(tree.clone(), ResourceCategory::Scripts);
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use anyhow::Result;
    use async_trait::async_trait;

    use super::*;
    use crate::app::test_support::{AppEvent, RecordingApp};
    use crate::plugins::{PluginDriver, PluginRegistration, PluginSet};

    struct FixedFetcher(&'static str);

    #[async_trait]
    impl Fetch for FixedFetcher {
        async fn fetch_text(&self, _url: &str, _app_name: &str) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    fn plain_context() -> (Arc<PluginDriver>, Arc<PluginContext>) {
        let driver = PluginDriver::new(PluginSet::new());
        let context = driver.select("app");
        (driver, context)
    }

    #[test]
    fn test_external_script_extracted_with_flags() {
        let mut tree =
            ElementTree::parse(r#"<script type="module" src="main.js" defer></script>"#);
        let script = tree.first_by_tag("script").unwrap();
        let app = RecordingApp::new("app", "https://x.test/app/");
        let (_driver, context) = plain_context();
        extract_script(&mut tree, script, &app, &context);

        let info = app.resources().script("https://x.test/app/main.js").unwrap();
        assert!(info.is_external);
        assert!(info.defer);
        assert!(info.module);
        assert!(!info.is_async);
        assert!(tree.first_by_tag("script").is_none());
    }

    #[test]
    fn test_inline_script_extracted() {
        let mut tree = ElementTree::parse("<script>window.start()</script>");
        let script = tree.first_by_tag("script").unwrap();
        let app = RecordingApp::new("app", "https://x.test/app/");
        let (_driver, context) = plain_context();
        extract_script(&mut tree, script, &app, &context);

        let info = app.resources().script("inline-0").unwrap();
        assert!(!info.is_external);
        assert_eq!(info.code, "window.start()");
        assert!(tree.to_html().contains("inline script extracted"));
    }

    #[test]
    fn test_non_js_script_left_in_place() {
        let mut tree =
            ElementTree::parse(r#"<script type="text/template"><p>tmpl</p></script>"#);
        let script = tree.first_by_tag("script").unwrap();
        let app = RecordingApp::new("app", "https://x.test/app/");
        let (_driver, context) = plain_context();
        extract_script(&mut tree, script, &app, &context);

        assert_eq!(app.resources().script_count(), 0);
        assert!(tree.first_by_tag("script").is_some());
    }

    #[test]
    fn test_exclude_attribute_drops_script() {
        let mut tree = ElementTree::parse(r#"<script exclude src="a.js"></script>"#);
        let script = tree.first_by_tag("script").unwrap();
        let app = RecordingApp::new("app", "https://x.test/app/");
        let (_driver, context) = plain_context();
        extract_script(&mut tree, script, &app, &context);

        assert_eq!(app.resources().script_count(), 0);
        assert!(tree.to_html().starts_with("<!--"));
    }

    #[test]
    fn test_ignore_attribute_resolves_src_in_place() {
        let mut tree = ElementTree::parse(r#"<script ignore src="a.js"></script>"#);
        let script = tree.first_by_tag("script").unwrap();
        let app = RecordingApp::new("app", "https://x.test/app/");
        let (_driver, context) = plain_context();
        extract_script(&mut tree, script, &app, &context);

        assert_eq!(app.resources().script_count(), 0);
        assert_eq!(tree.attr(script, "src"), Some("https://x.test/app/a.js"));
    }

    #[test]
    fn test_empty_inline_script_removed() {
        let mut tree = ElementTree::parse("<script>   </script><p>x</p>");
        let script = tree.first_by_tag("script").unwrap();
        let app = RecordingApp::new("app", "https://x.test/app/");
        let (_driver, context) = plain_context();
        extract_script(&mut tree, script, &app, &context);

        assert_eq!(app.resources().script_count(), 0);
        assert_eq!(tree.to_html(), "<p>x</p>");
    }

    #[tokio::test]
    async fn test_fetch_scripts_applies_loader_chain_and_signals_ready() {
        let mut tree = ElementTree::parse(r#"<script src="main.js"></script>"#);
        let script = tree.first_by_tag("script").unwrap();
        let app = RecordingApp::new("app", "https://x.test/app/");
        let driver = PluginDriver::new(PluginSet::new().with_global(
            PluginRegistration::new("wrapper")
                .with_loader(|code, url| Ok(format!("/* {url} */ {code}"))),
        ));
        let context = driver.select("app");
        extract_script(&mut tree, script, &app, &context);

        let tree: SharedTree = Arc::new(Mutex::new(tree));
        let fetcher = FixedFetcher("run()");
        let cache = SourceCache::new();
        fetch_scripts_from_html(&tree, &app, &context, &fetcher, &cache).await;

        assert_eq!(
            app.recorded(),
            vec![AppEvent::Ready(ResourceCategory::Scripts)]
        );
        assert_eq!(
            app.resources().script("https://x.test/app/main.js").unwrap().code,
            "/* https://x.test/app/main.js */ run()"
        );
    }
}
