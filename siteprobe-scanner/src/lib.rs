#[cfg(feature = "chromium")]
pub mod chromium;
pub mod error;
pub mod http;
pub mod probe;
pub mod renderer;
pub mod result;
pub mod styles;
pub mod urls;

#[cfg(feature = "chromium")]
pub use chromium::ChromiumRenderer;
pub use error::ScanError;
pub use http::HttpRenderer;
pub use probe::{AssetProber, ProbeOutcome};
pub use renderer::{
    DEFAULT_USER_AGENT, MAX_STYLESHEETS, RENDER_GRACE, RenderOptions, Renderer, SALVAGE_BUDGET,
};
pub use result::{
    DomSnapshot, FetchStatus, RenderOutput, ScreenshotHandle, StyleOrigin, StyledElement,
    Stylesheet,
};
