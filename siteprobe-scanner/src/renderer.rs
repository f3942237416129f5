//! Renderer abstraction.
//!
//! The analysis pipeline only needs one capability from a rendering engine:
//! turn a URL into a DOM snapshot, an optional screenshot and a fetch status
//! within a deadline. Any engine implementing [`Renderer`] is substitutable.

use crate::error::Result;
use crate::result::RenderOutput;
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_USER_AGENT: &str = "siteprobe/0.1 (https://github.com/trapdoorsec/siteprobe)";

/// Linked stylesheets read per page.
pub const MAX_STYLESHEETS: usize = 20;

/// Time an engine may spend after the page deadline collecting partial
/// state and closing its page.
pub const SALVAGE_BUDGET: Duration = Duration::from_secs(4);

/// How long past the page deadline a caller waits before abandoning a
/// render. Covers [`SALVAGE_BUDGET`] plus teardown.
pub const RENDER_GRACE: Duration = Duration::from_secs(6);

const _: () = assert!(RENDER_GRACE.as_millis() > SALVAGE_BUDGET.as_millis());

/// Engine-independent render settings.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub user_agent: String,
    /// How long the network has to stay quiet before the DOM is snapshotted.
    pub network_idle: Duration,
    /// Global symbols (`jQuery`, `Shopify.theme`) to test for on each page.
    pub global_probes: Vec<String>,
    /// Where full-page screenshots are written. `None` disables them.
    pub screenshot_dir: Option<PathBuf>,
    pub max_redirects: usize,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            network_idle: Duration::from_millis(500),
            global_probes: Vec::new(),
            screenshot_dir: None,
            max_redirects: 5,
        }
    }
}

#[async_trait]
pub trait Renderer: Send + Sync {
    /// Short engine name recorded in the report.
    fn name(&self) -> &'static str;

    /// Render `url`, waiting for network quiescence bounded by `timeout`.
    ///
    /// A timeout is not an error: the output carries whatever was captured
    /// with `FetchStatus::Timeout`. `Err` is reserved for the engine itself
    /// being unusable. Implementations return within `timeout` plus
    /// [`SALVAGE_BUDGET`].
    async fn render(&self, url: &str, timeout: Duration) -> Result<RenderOutput>;
}
