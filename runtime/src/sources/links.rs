//! Stylesheet link extraction and fetch coordination.
//!
//! During flattening, stylesheet links are pulled out of the tree and
//! replaced by placeholder comments; every other link kind just gets its
//! `href` absolutized. Once flattening is done the coordinator fetches all
//! registered stylesheets, swaps each placeholder for an inline style node,
//! and signals the host that the link category is ready.

use std::sync::PoisonError;

use futures::future::join_all;
use tracing::error;

use crate::app::{HostApplication, LinkInfo, ResourceCategory, SharedTree};
use crate::plugins::PluginContext;
use crate::sources::cache::SourceCache;
use crate::sources::dom::{complete_path, ElementTree, NodeId};
use crate::sources::fetch::Fetch;
use crate::sources::scoped_css::StyleScoper;

/// Classify one link element and register it if it is a stylesheet.
///
/// Plugin checkers run against the absolutized address: an excluded link is
/// dropped to a comment, an ignored one is left in place with its `href`
/// resolved. Links without an `href` are left untouched.
pub fn extract_link(
    tree: &mut ElementTree,
    node: NodeId,
    app: &dyn HostApplication,
    context: &PluginContext,
) {
    let rel = tree.attr(node, "rel").unwrap_or("").to_ascii_lowercase();
    let Some(href) = tree.attr(node, "href").map(str::to_string) else {
        return;
    };
    let address = complete_path(&href, app.url());

    if rel == "stylesheet" {
        if context.exclude_checker(&address) {
            tree.replace_with_comment(
                node,
                &format!("link element with href={address} is excluded"),
            );
        } else if context.ignore_checker(&address) {
            tree.set_attr(node, "href", &address);
        } else {
            app.resources().insert_link(
                address.clone(),
                LinkInfo {
                    code: String::new(),
                    placeholder: Some(node),
                },
            );
            tree.replace_with_comment(
                node,
                &format!("link element with href={address} extracted as style"),
            );
        }
    } else {
        // icon / preload / prefetch and friends stay, with a resolved href
        tree.set_attr(node, "href", &address);
    }
}

/// Fetch every registered stylesheet, inline the results, and signal the
/// host once the category has settled.
///
/// Individual fetch failures are logged and leave the placeholder comment in
/// place; they do not block the ready signal.
pub async fn fetch_links_from_html(
    tree: &SharedTree,
    app: &dyn HostApplication,
    fetcher: &dyn Fetch,
    cache: &SourceCache,
    scoper: &dyn StyleScoper,
) {
    let addresses = app.resources().link_addresses();
    let app_name = app.name().to_string();

    let results = join_all(addresses.iter().map(|address| {
        let app_name = app_name.clone();
        async move { cache.fetch(address, &app_name, fetcher).await }
    }))
    .await;

    {
        let mut guard = tree.lock().unwrap_or_else(PoisonError::into_inner);
        for (address, result) in addresses.iter().zip(results) {
            match result {
                Ok(code) => {
                    app.resources().set_link_code(address, &code);
                    if let Some(placeholder) = app.resources().link_placeholder(address) {
                        guard.replace_with_element(placeholder, "style");
                        guard.set_text(placeholder, &code);
                        if app.scope_css() {
                            scoper.scope(&mut guard, placeholder, app);
                        }
                    }
                }
                Err(err) => {
                    error!(app = %app_name, "failed to fetch link {address}: {err:#}");
                }
            }
        }
    }

    app.on_ready(tree.clone(), ResourceCategory::Links);
}
