//! Error taxonomy for the loading pipeline.
//!
//! Three failure classes reach the host: fetch failures (transport errors or
//! an empty body), structural failures (the isolated head/body container is
//! missing after parsing), and plugin hook failures. Hook failures are
//! recovered inside the driver and never abort the pipeline; the other two
//! terminate loading for that document with exactly one signal to the host.

use thiserror::Error;

/// Terminal errors reported to the host application.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The document (or a resource) could not be fetched.
    #[error("failed to fetch data from {url}, rendering stopped")]
    Fetch {
        /// URL that failed to load.
        url: String,
        /// Underlying transport error.
        cause: anyhow::Error,
    },

    /// The document fetch succeeded but returned an empty body.
    #[error("html is empty, please check in detail")]
    EmptyDocument,

    /// The isolated head or body container is absent after transformation.
    #[error("element {element} is missing")]
    MissingElement {
        /// Which container was not found: `"head"` or `"body"`.
        element: &'static str,
    },
}

impl LoadError {
    /// Build a fetch error for `url`.
    pub fn fetch(url: impl Into<String>, cause: anyhow::Error) -> Self {
        Self::Fetch {
            url: url.into(),
            cause,
        }
    }
}
