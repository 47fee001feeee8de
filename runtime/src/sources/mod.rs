//! Document loading, isolation, and resource extraction.
//!
//! The pipeline turns a fetched HTML document into an isolated, flattened
//! tree and coordinates the asynchronous fetching of the stylesheet and
//! script resources discovered along the way.

pub mod cache;
pub mod dom;
pub mod fetch;
pub mod html;
pub mod links;
pub mod loader;
pub mod scoped_css;
pub mod scripts;

pub use cache::SourceCache;
pub use dom::{complete_path, ElementTree, NodeId, NodeKind};
pub use fetch::{Fetch, HttpFetcher};
pub use html::{rename_head_body, HtmlExtractor, APP_BODY_TAG, APP_HEAD_TAG};
pub use loader::HtmlLoader;
pub use scoped_css::{NoopScoper, StyleScoper};
