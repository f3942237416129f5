use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Outcome of a single page render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchStatus {
    Ok,
    Timeout,
    Error,
}

impl FetchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchStatus::Ok => "ok",
            FetchStatus::Timeout => "timeout",
            FetchStatus::Error => "error",
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, FetchStatus::Ok)
    }
}

/// Opaque reference to a screenshot owned by the renderer that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScreenshotHandle(pub String);

impl ScreenshotHandle {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Where a set of style declarations came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StyleOrigin {
    /// Computed by the browser for a rendered element.
    Computed,
    /// A `style` attribute or presentational attribute on an element.
    Inline,
    /// A rule inside a `<style>` block or a linked stylesheet.
    Stylesheet,
}

/// Style data for one element (or one stylesheet rule).
///
/// Property names are lowercase CSS names (`background-color`, `font-family`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyledElement {
    pub selector: String,
    pub tag: String,
    pub visible: bool,
    /// The element carries its own `style` attribute.
    pub inline: bool,
    pub origin: StyleOrigin,
    pub properties: BTreeMap<String, String>,
}

impl StyledElement {
    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }
}

/// Body of a linked stylesheet, keyed by the URL it was fetched from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stylesheet {
    pub url: String,
    pub text: String,
}

/// Rendered DOM plus the side data the analysis stages read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DomSnapshot {
    pub requested_url: String,
    pub final_url: String,
    pub html: String,
    pub http_status: Option<u16>,
    /// Response headers, lowercase names.
    pub headers: BTreeMap<String, String>,
    pub styles: Vec<StyledElement>,
    /// Global symbols the page exposed, from the probe list the renderer was given.
    pub globals: Vec<String>,
    /// Linked stylesheets the renderer could read, in document order.
    #[serde(default)]
    pub stylesheets: Vec<Stylesheet>,
}

impl DomSnapshot {
    pub fn empty(url: &str) -> Self {
        Self {
            requested_url: url.to_string(),
            final_url: url.to_string(),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.html.trim().is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderOutput {
    pub dom: DomSnapshot,
    pub screenshot: Option<ScreenshotHandle>,
    pub status: FetchStatus,
    pub error: Option<String>,
    pub elapsed: Duration,
}

impl RenderOutput {
    pub fn ok(dom: DomSnapshot, elapsed: Duration) -> Self {
        Self {
            dom,
            screenshot: None,
            status: FetchStatus::Ok,
            error: None,
            elapsed,
        }
    }

    /// Whatever was captured before the deadline, marked as timed out.
    pub fn timed_out(dom: DomSnapshot, elapsed: Duration) -> Self {
        Self {
            dom,
            screenshot: None,
            status: FetchStatus::Timeout,
            error: Some(format!("render timed out after {}ms", elapsed.as_millis())),
            elapsed,
        }
    }

    pub fn failed(dom: DomSnapshot, error: String, elapsed: Duration) -> Self {
        Self {
            dom,
            screenshot: None,
            status: FetchStatus::Error,
            error: Some(error),
            elapsed,
        }
    }

    pub fn with_screenshot(mut self, screenshot: Option<ScreenshotHandle>) -> Self {
        self.screenshot = screenshot;
        self
    }
}
