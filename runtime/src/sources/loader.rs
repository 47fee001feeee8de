//! Text-level HTML loader.
//!
//! A lighter entry point than the full pipeline: fetch, plugin `process_html`
//! chain, head/body isolation — then hand the text to the caller. No parsing,
//! no resource extraction. It shares [`rename_head_body`] with the pipeline,
//! so the two stay interchangeable at the text level.

use std::sync::Arc;

use tracing::error;

use crate::app::HostApplication;
use crate::error::LoadError;
use crate::plugins::PluginDriver;
use crate::sources::fetch::Fetch;
use crate::sources::html::rename_head_body;

/// Fetches and isolates HTML text without extracting resources.
#[derive(Debug, Default, Clone, Copy)]
pub struct HtmlLoader;

impl HtmlLoader {
    /// The shared loader instance.
    pub fn instance() -> &'static HtmlLoader {
        static INSTANCE: HtmlLoader = HtmlLoader;
        &INSTANCE
    }

    /// Load the application's document and pass the isolated text to
    /// `success`.
    ///
    /// Errors follow the pipeline's contract: transport failures go to
    /// `on_load_error`, an empty body to `on_error`; `success` is not called
    /// on either path.
    pub async fn run<F>(
        &self,
        app: &dyn HostApplication,
        driver: &Arc<PluginDriver>,
        fetcher: &dyn Fetch,
        success: F,
    ) where
        F: FnOnce(String),
    {
        let app_name = app.name().to_string();
        let html_url = app.ssr_url().unwrap_or_else(|| app.url()).to_string();

        match fetcher.fetch_text(&html_url, &app_name).await {
            Ok(html) if html.is_empty() => {
                let err = LoadError::EmptyDocument;
                error!(app = %app_name, "{err}");
                app.on_error(err);
            }
            Ok(html) => {
                let context = driver.select(&app_name);
                let html = rename_head_body(&context.process_html(html, &html_url));
                success(html);
            }
            Err(cause) => {
                error!(
                    app = %app_name,
                    "failed to fetch data from {html_url}, rendering stopped: {cause:#}"
                );
                app.on_load_error(LoadError::fetch(html_url, cause));
            }
        }
    }
}
