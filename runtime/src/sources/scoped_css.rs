//! CSS scoping seam.
//!
//! Selector rewriting itself is a host concern; the pipeline only decides
//! *which* style nodes are handed over (scoping enabled, no `exclude`, no
//! `ignore`) and when (during flattening for inline styles, after fetch for
//! stylesheet links).

use crate::app::HostApplication;
use crate::sources::dom::{ElementTree, NodeId};

/// Rewrites a style element's selectors in place.
pub trait StyleScoper: Send + Sync {
    /// Rewrite `style`'s text content for the given application.
    fn scope(&self, tree: &mut ElementTree, style: NodeId, app: &dyn HostApplication);
}

/// Scoper that leaves styles untouched.
///
/// Default wiring for hosts that scope elsewhere or not at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopScoper;

impl StyleScoper for NoopScoper {
    fn scope(&self, _tree: &mut ElementTree, _style: NodeId, _app: &dyn HostApplication) {}
}
