//! The HTML extraction pipeline.
//!
//! Loads a sub-application's document, runs it through the plugin
//! `process_html` chain, renames its head/body into isolated container tags,
//! parses and flattens the result, and coordinates resource fetching. Links
//! and scripts settle on independent asynchronous paths: the host's ready
//! callback fires once per category, immediately when a category is empty.

use std::sync::{Arc, LazyLock, Mutex};

use regex::{Captures, Regex};
use tracing::error;

use crate::app::{HostApplication, ResourceCategory, SharedTree};
use crate::error::LoadError;
use crate::plugins::{PluginContext, PluginDriver};
use crate::sources::cache::SourceCache;
use crate::sources::dom::{complete_path, ElementTree, NodeId};
use crate::sources::fetch::{Fetch, HttpFetcher};
use crate::sources::scoped_css::{NoopScoper, StyleScoper};
use crate::sources::{links, scripts};

/// Isolated stand-in for the document's `<head>`.
pub const APP_HEAD_TAG: &str = "alcove-app-head";

/// Isolated stand-in for the document's `<body>`.
pub const APP_BODY_TAG: &str = "alcove-app-body";

static HEAD_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<head[^>]*>.*?</head>").unwrap());
static HEAD_OPEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<head").unwrap());
static HEAD_CLOSE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)</head>").unwrap());
static BODY_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<body[^>]*>.*?</body>").unwrap());
static BODY_OPEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<body").unwrap());
static BODY_CLOSE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)</body>").unwrap());

/// Rename the first head and body blocks into isolated container tags.
///
/// A single-pass, case-insensitive, non-recursive textual rewrite — only the
/// first block of each kind is touched, attributes are preserved, and a
/// missing block is tolerated here (the structural check happens after
/// parsing). Must run before parsing: the fragment parser would swallow raw
/// `<head>`/`<body>` tags.
pub fn rename_head_body(html: &str) -> String {
    let html = HEAD_BLOCK.replace(html, |caps: &Captures| {
        let opened = HEAD_OPEN.replace(&caps[0], format!("<{APP_HEAD_TAG}"));
        HEAD_CLOSE
            .replace(&opened, format!("</{APP_HEAD_TAG}>"))
            .into_owned()
    });
    BODY_BLOCK
        .replace(&html, |caps: &Captures| {
            let opened = BODY_OPEN.replace(&caps[0], format!("<{APP_BODY_TAG}"));
            BODY_CLOSE
                .replace(&opened, format!("</{APP_BODY_TAG}>"))
                .into_owned()
        })
        .into_owned()
}

/// The extraction pipeline with its collaborator seams.
pub struct HtmlExtractor {
    driver: Arc<PluginDriver>,
    fetcher: Arc<dyn Fetch>,
    scoper: Arc<dyn StyleScoper>,
    cache: Arc<SourceCache>,
}

impl HtmlExtractor {
    /// Pipeline with default collaborators: HTTP fetching, no CSS scoping,
    /// a fresh resource cache.
    pub fn new(driver: Arc<PluginDriver>) -> Self {
        Self {
            driver,
            fetcher: Arc::new(HttpFetcher::new()),
            scoper: Arc::new(NoopScoper),
            cache: Arc::new(SourceCache::new()),
        }
    }

    /// Substitute the fetch collaborator.
    pub fn with_fetcher(mut self, fetcher: Arc<dyn Fetch>) -> Self {
        self.fetcher = fetcher;
        self
    }

    /// Substitute the CSS scoping collaborator.
    pub fn with_scoper(mut self, scoper: Arc<dyn StyleScoper>) -> Self {
        self.scoper = scoper;
        self
    }

    /// Share a resource cache with other pipelines.
    pub fn with_cache(mut self, cache: Arc<SourceCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Load, transform, and extract one application's document.
    ///
    /// Every failure path delivers exactly one terminal signal to the host;
    /// on success the host receives one ready signal per resource category.
    pub async fn extract(&self, app: Arc<dyn HostApplication>) {
        let app_name = app.name().to_string();
        let html_url = app.ssr_url().unwrap_or_else(|| app.url()).to_string();

        let html = match self.fetcher.fetch_text(&html_url, &app_name).await {
            Ok(html) => html,
            Err(cause) => {
                error!(
                    app = %app_name,
                    "failed to fetch data from {html_url}, rendering stopped: {cause:#}"
                );
                app.on_load_error(LoadError::fetch(html_url, cause));
                return;
            }
        };
        if html.is_empty() {
            let err = LoadError::EmptyDocument;
            error!(app = %app_name, "{err}");
            app.on_error(err);
            return;
        }

        let context = self.driver.select(&app_name);
        let html = context.process_html(html, &html_url);
        let html = rename_head_body(&html);

        self.extract_source_tree(html, app, &context).await;
    }

    /// Parse the isolated text, flatten it, and run the resource join.
    async fn extract_source_tree(
        &self,
        html: String,
        app: Arc<dyn HostApplication>,
        context: &PluginContext,
    ) {
        let mut tree = ElementTree::parse(&html);

        let head = tree.first_by_tag(APP_HEAD_TAG);
        let body = tree.first_by_tag(APP_BODY_TAG);
        if head.is_none() || body.is_none() {
            let element = if head.is_none() { "head" } else { "body" };
            let err = LoadError::MissingElement { element };
            error!(app = app.name(), "{err}");
            app.on_error(err);
            return;
        }

        let root = tree.root();
        flatten_children(&mut tree, root, app.as_ref(), context, self.scoper.as_ref());

        let tree: SharedTree = Arc::new(Mutex::new(tree));

        // Links and scripts resolve independently; neither waits on the
        // other, and an empty category signals readiness at once.
        let links_ready = async {
            if app.resources().link_count() > 0 {
                links::fetch_links_from_html(
                    &tree,
                    app.as_ref(),
                    self.fetcher.as_ref(),
                    self.cache.as_ref(),
                    self.scoper.as_ref(),
                )
                .await;
            } else {
                app.on_ready(tree.clone(), ResourceCategory::Links);
            }
        };
        let scripts_ready = async {
            if app.resources().script_count() > 0 {
                scripts::fetch_scripts_from_html(
                    &tree,
                    app.as_ref(),
                    context,
                    self.fetcher.as_ref(),
                    self.cache.as_ref(),
                )
                .await;
            } else {
                app.on_ready(tree.clone(), ResourceCategory::Scripts);
            }
        };
        futures::join!(links_ready, scripts_ready);
    }
}

/// Recursively flatten a subtree, children before their parent's own
/// classification, so replacements happen bottom-up.
fn flatten_children(
    tree: &mut ElementTree,
    parent: NodeId,
    app: &dyn HostApplication,
    context: &PluginContext,
    scoper: &dyn StyleScoper,
) {
    let children = tree.children(parent);
    for child in &children {
        flatten_children(tree, *child, app, context, scoper);
    }

    for child in children {
        let Some(tag) = tree.tag(child).map(str::to_string) else {
            continue;
        };
        match tag.as_str() {
            "link" => {
                if tree.has_attr(child, "exclude") {
                    tree.replace_with_comment(
                        child,
                        "link element with exclude attribute ignored",
                    );
                } else if !tree.has_attr(child, "ignore") {
                    links::extract_link(tree, child, app, context);
                } else if let Some(href) = tree.attr(child, "href").map(str::to_string) {
                    tree.set_attr(child, "href", &complete_path(&href, app.url()));
                }
            }
            "style" => {
                if tree.has_attr(child, "exclude") {
                    tree.replace_with_comment(
                        child,
                        "style element with exclude attribute ignored",
                    );
                } else if app.scope_css() && !tree.has_attr(child, "ignore") {
                    scoper.scope(tree, child, app);
                }
            }
            "script" => scripts::extract_script(tree, child, app, context),
            "meta" | "title" => tree.remove(child),
            "img" => {
                if let Some(src) = tree.attr(child, "src").map(str::to_string) {
                    tree.set_attr(child, "src", &complete_path(&src, app.url()));
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::Result;
    use async_trait::async_trait;

    use super::*;
    use crate::app::test_support::{AppEvent, RecordingApp};
    use crate::plugins::{PluginRegistration, PluginSet};

    struct FixedFetcher(String);

    #[async_trait]
    impl Fetch for FixedFetcher {
        async fn fetch_text(&self, _url: &str, _app_name: &str) -> Result<String> {
            Ok(self.0.clone())
        }
    }

    struct FailingFetcher;

    #[async_trait]
    impl Fetch for FailingFetcher {
        async fn fetch_text(&self, url: &str, _app_name: &str) -> Result<String> {
            anyhow::bail!("connection refused for {url}")
        }
    }

    #[test]
    fn test_rename_head_body_basic() {
        let out = rename_head_body("<html><head><title>t</title></head><body><p>x</p></body></html>");
        assert!(out.contains("<alcove-app-head><title>t</title></alcove-app-head>"));
        assert!(out.contains("<alcove-app-body><p>x</p></alcove-app-body>"));
    }

    #[test]
    fn test_rename_head_body_preserves_attributes_and_case() {
        let out = rename_head_body(r#"<HEAD lang="en"><meta></HEAD><BODY class="a"><div></div></BODY>"#);
        assert!(out.contains(r#"<alcove-app-head lang="en">"#));
        assert!(out.contains(r#"<alcove-app-body class="a">"#));
    }

    #[test]
    fn test_rename_head_body_first_block_only() {
        let out = rename_head_body("<body>1</body><body>2</body>");
        assert_eq!(out, "<alcove-app-body>1</alcove-app-body><body>2</body>");
    }

    #[test]
    fn test_rename_tolerates_missing_blocks() {
        assert_eq!(rename_head_body("<div>no document</div>"), "<div>no document</div>");
    }

    fn doc(head: &str, body: &str) -> String {
        format!("<html><head>{head}</head><body>{body}</body></html>")
    }

    fn extractor_with(html: &str) -> HtmlExtractor {
        HtmlExtractor::new(PluginDriver::new(PluginSet::new()))
            .with_fetcher(Arc::new(FixedFetcher(html.to_string())))
    }

    #[tokio::test]
    async fn test_missing_body_is_structural_error() {
        let extractor = extractor_with("<html><head></head>no body here</html>");
        let app = Arc::new(RecordingApp::new("app", "https://x.test/app/"));
        extractor.extract(app.clone()).await;

        assert_eq!(
            app.recorded(),
            vec![AppEvent::Error("element body is missing".to_string())]
        );
        assert_eq!(app.resources().link_count(), 0);
        assert_eq!(app.resources().script_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_head_is_structural_error() {
        let extractor = extractor_with("<html><body></body></html>");
        let app = Arc::new(RecordingApp::new("app", "https://x.test/app/"));
        extractor.extract(app.clone()).await;

        assert_eq!(
            app.recorded(),
            vec![AppEvent::Error("element head is missing".to_string())]
        );
    }

    #[tokio::test]
    async fn test_empty_document_reported() {
        let extractor = extractor_with("");
        let app = Arc::new(RecordingApp::new("app", "https://x.test/app/"));
        extractor.extract(app.clone()).await;

        assert_eq!(
            app.recorded(),
            vec![AppEvent::Error(
                "html is empty, please check in detail".to_string()
            )]
        );
    }

    #[tokio::test]
    async fn test_fetch_failure_reported_as_load_error() {
        let extractor = HtmlExtractor::new(PluginDriver::new(PluginSet::new()))
            .with_fetcher(Arc::new(FailingFetcher));
        let app = Arc::new(RecordingApp::new("app", "https://x.test/app/"));
        extractor.extract(app.clone()).await;

        let recorded = app.recorded();
        assert_eq!(recorded.len(), 1);
        assert!(matches!(&recorded[0], AppEvent::LoadError(msg)
            if msg.contains("https://x.test/app/")));
    }

    #[tokio::test]
    async fn test_empty_categories_signal_ready_immediately() {
        let extractor = extractor_with(&doc("", "<div>hello</div>"));
        let app = Arc::new(RecordingApp::new("app", "https://x.test/app/"));
        extractor.extract(app.clone()).await;

        let recorded = app.recorded();
        assert!(recorded.contains(&AppEvent::Ready(ResourceCategory::Links)));
        assert!(recorded.contains(&AppEvent::Ready(ResourceCategory::Scripts)));
        assert_eq!(recorded.len(), 2);
    }

    #[tokio::test]
    async fn test_meta_title_removed_and_img_absolutized() {
        let extractor = extractor_with(&doc(
            r#"<meta charset="utf-8"><title>app</title>"#,
            r#"<img src="a.png">"#,
        ));
        let app = Arc::new(RecordingApp::new("app", "https://x.test/app/"));
        extractor.extract(app.clone()).await;

        assert!(app
            .recorded()
            .contains(&AppEvent::Ready(ResourceCategory::Links)));
        let html = app.ready_html().unwrap();
        assert!(!html.contains("<meta"));
        assert!(!html.contains("<title"));
        assert!(html.contains(r#"<img src="https://x.test/app/a.png">"#));
    }

    #[tokio::test]
    async fn test_process_html_runs_before_isolation() {
        let driver = PluginDriver::new(PluginSet::new().with_global(
            PluginRegistration::new("injector").with_process_html(|code, _| {
                Ok(code.replace("<body>", "<body><div id=\"injected\"></div>"))
            }),
        ));
        let extractor = HtmlExtractor::new(driver)
            .with_fetcher(Arc::new(FixedFetcher(doc("", "<p>x</p>"))));
        let app = Arc::new(RecordingApp::new("app", "https://x.test/app/"));
        extractor.extract(app.clone()).await;

        // Plugin output still contained standard body tags, so isolation and
        // extraction proceeded normally.
        assert!(app
            .recorded()
            .contains(&AppEvent::Ready(ResourceCategory::Scripts)));
    }

    #[tokio::test]
    async fn test_link_with_exclude_attribute_dropped_before_extraction() {
        let extractor = extractor_with(&doc(
            r#"<link rel="stylesheet" href="skip.css" exclude>"#,
            "<p>x</p>",
        ));
        let app = Arc::new(RecordingApp::new("app", "https://x.test/app/"));
        extractor.extract(app.clone()).await;

        // Never reaches the link extractor: no registration, inert comment.
        assert_eq!(app.resources().link_count(), 0);
        let html = app.ready_html().unwrap();
        assert!(!html.contains("<link"));
        assert!(html.contains("link element with exclude attribute ignored"));
    }

    #[tokio::test]
    async fn test_style_with_exclude_becomes_comment() {
        let extractor = extractor_with(&doc("<style exclude>p{}</style>", "<p>x</p>"));
        let app = Arc::new(RecordingApp::new("app", "https://x.test/app/"));
        extractor.extract(app.clone()).await;

        let html = app.ready_html().unwrap();
        assert!(!html.contains("<style"));
        assert!(html.contains("style element with exclude attribute ignored"));
    }

    #[tokio::test]
    async fn test_ssr_url_preferred_for_document_fetch() {
        struct UrlEchoFetcher;

        #[async_trait]
        impl Fetch for UrlEchoFetcher {
            async fn fetch_text(&self, url: &str, _app_name: &str) -> Result<String> {
                Ok(format!(
                    "<html><head></head><body><p>{url}</p></body></html>"
                ))
            }
        }

        let extractor = HtmlExtractor::new(PluginDriver::new(PluginSet::new()))
            .with_fetcher(Arc::new(UrlEchoFetcher));
        let app = Arc::new(
            RecordingApp::new("app", "https://x.test/app/").with_ssr_url("https://x.test/ssr/"),
        );
        extractor.extract(app.clone()).await;

        let html = app.ready_html().unwrap();
        assert!(html.contains("https://x.test/ssr/"));
    }
}
