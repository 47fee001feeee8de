//! Alcove runtime — isolated HTML loading for embedded sub-applications.
//!
//! Loads a remote HTML document on behalf of an embedded sub-application,
//! rewrites its head/body into isolated container tags, and extracts its
//! stylesheet/script resources for controlled asynchronous fetching. Plugins
//! intercept and transform the document and its resources at defined
//! extension points, composed in a stable global-then-per-application order.
//!
//! The two halves:
//! - [`plugins`]: the hook driver — merge, concatenate, first-true, and
//!   reduce composition over registered plugins, with per-application
//!   facades.
//! - [`sources`]: the extraction pipeline — fetch, transform, isolate,
//!   flatten, and join the link/script resource streams into per-category
//!   ready signals for the host.
//!
//! The host application itself (mounting, sandboxing, lifecycle) stays
//! outside this crate, behind [`app::HostApplication`].

pub mod app;
pub mod error;
pub mod plugins;
pub mod sources;

pub use app::{
    HostApplication, LinkInfo, ResourceCategory, ResourcePool, ScriptInfo, SharedTree,
};
pub use error::LoadError;
pub use plugins::{PluginContext, PluginDriver, PluginRegistration, PluginSet, SandboxSpec};
pub use sources::{
    complete_path, ElementTree, Fetch, HtmlExtractor, HtmlLoader, HttpFetcher, NodeId, NodeKind,
    SourceCache, StyleScoper,
};
