//! Headless Chromium renderer using chromiumoxide.

use crate::error::{Result, ScanError};
use crate::renderer::{MAX_STYLESHEETS, RenderOptions, Renderer, SALVAGE_BUDGET};
use crate::result::{DomSnapshot, RenderOutput, ScreenshotHandle, StyledElement, Stylesheet};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use serde::de::DeserializeOwned;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Reserved from the salvage budget for closing the page.
const CLOSE_TIMEOUT: Duration = Duration::from_millis(500);

/// Collects computed color and font properties for up to 1500 elements.
const COMPUTED_STYLES_JS: &str = r##"
(() => {
  const pick = ["color", "background-color", "border-top-color", "border-right-color",
    "border-bottom-color", "border-left-color", "outline-color", "fill", "stroke",
    "font-family", "font-weight"];
  const describe = (el) => {
    let s = el.tagName.toLowerCase();
    if (el.id) s += "#" + el.id;
    if (el.classList) s += Array.from(el.classList).slice(0, 3).map(c => "." + c).join("");
    return s;
  };
  return Array.from(document.querySelectorAll("body *")).slice(0, 1500).map(el => {
    const cs = getComputedStyle(el);
    const rect = el.getBoundingClientRect();
    const visible = cs.display !== "none" && cs.visibility !== "hidden"
      && rect.width > 0 && rect.height > 0;
    const properties = {};
    for (const p of pick) {
      const v = cs.getPropertyValue(p);
      if (v) properties[p] = v.trim();
    }
    return {
      selector: describe(el),
      tag: el.tagName.toLowerCase(),
      visible,
      inline: el.hasAttribute("style"),
      origin: "computed",
      properties
    };
  });
})()
"##;

/// Linked stylesheets whose rules the page may read. Cross-origin sheets
/// without CORS throw on `cssRules` and are skipped.
const STYLESHEETS_JS: &str = r#"
(() => {
  const sheets = [];
  for (const sheet of Array.from(document.styleSheets)) {
    if (!sheet.href || sheets.length >= __MAX__) continue;
    try {
      const text = Array.from(sheet.cssRules).map(r => r.cssText).join("\n");
      sheets.push({ url: sheet.href, text });
    } catch (e) {}
  }
  return sheets;
})()
"#;

const RESOURCE_COUNT_JS: &str = r#"
(() => [document.readyState, performance.getEntriesByType("resource").length])()
"#;

/// Closes its page when dropped, so a render abandoned by its caller does
/// not leak a tab.
struct PageGuard(Option<Page>);

impl PageGuard {
    async fn close(mut self, url: &str) {
        if let Some(page) = self.0.take() {
            match tokio::time::timeout(CLOSE_TIMEOUT, page.close()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => debug!("Closing page for {} failed: {}", url, e),
                Err(_) => debug!("Closing page for {} timed out", url),
            }
        }
    }
}

impl Drop for PageGuard {
    fn drop(&mut self) {
        if let Some(page) = self.0.take()
            && let Ok(runtime) = tokio::runtime::Handle::try_current()
        {
            runtime.spawn(async move {
                if let Err(e) = page.close().await {
                    debug!("Closing abandoned page failed: {}", e);
                }
            });
        }
    }
}

/// Chromium-based renderer.
pub struct ChromiumRenderer {
    browser: Browser,
    options: RenderOptions,
    screenshot_seq: AtomicUsize,
}

impl ChromiumRenderer {
    /// Launch a headless Chromium instance. `chrome_path` overrides executable discovery.
    pub async fn launch(options: RenderOptions, chrome_path: Option<PathBuf>) -> Result<Self> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .window_size(1440, 900)
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-blink-features=AutomationControlled")
            .arg(format!("--user-agent={}", options.user_agent));
        if let Some(path) = chrome_path {
            builder = builder.chrome_executable(path);
        }
        let config = builder.build().map_err(ScanError::Browser)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| ScanError::Browser(format!("failed to launch Chromium: {}", e)))?;

        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("Chromium handler event error: {}", e);
                }
            }
        });

        if let Some(ref dir) = options.screenshot_dir {
            tokio::fs::create_dir_all(dir).await?;
        }

        Ok(Self {
            browser,
            options,
            screenshot_seq: AtomicUsize::new(0),
        })
    }

    async fn evaluate<T: DeserializeOwned>(page: &Page, script: &str) -> Result<T> {
        let result = page
            .evaluate(script)
            .await
            .map_err(|e| ScanError::Browser(format!("JS execution failed: {}", e)))?;
        result
            .into_value()
            .map_err(|e| ScanError::ParseError(format!("failed to convert JS result: {}", e)))
    }

    /// Wait until the document is complete and no new resource entries have
    /// appeared for the configured idle window. Returns false on deadline.
    async fn wait_for_network_idle(&self, page: &Page, deadline: Instant) -> bool {
        let mut last_count: Option<u64> = None;
        let mut quiet_since = Instant::now();

        while Instant::now() < deadline {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let probe = Self::evaluate::<(String, u64)>(page, RESOURCE_COUNT_JS);
            match tokio::time::timeout(remaining, probe).await {
                Ok(Ok((ready_state, count))) => {
                    if last_count != Some(count) {
                        last_count = Some(count);
                        quiet_since = Instant::now();
                    } else if ready_state == "complete"
                        && quiet_since.elapsed() >= self.options.network_idle
                    {
                        return true;
                    }
                }
                Ok(Err(e)) => debug!("Quiescence probe failed: {}", e),
                Err(_) => break,
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
        false
    }

    fn globals_script(&self) -> String {
        let probes = serde_json::to_string(&self.options.global_probes)
            .unwrap_or_else(|_| "[]".to_string());
        format!(
            r#"(() => {{
  const names = {probes};
  return names.filter(n => {{
    try {{
      return n.split(".").reduce((o, k) => (o == null ? undefined : o[k]), window) !== undefined;
    }} catch (e) {{ return false; }}
  }});
}})()"#
        )
    }

    /// Evaluate `script`, giving up at `until`. Failures yield the default.
    async fn salvage<T: DeserializeOwned + Default>(page: &Page, script: &str, until: Instant) -> T {
        let remaining = until.saturating_duration_since(Instant::now());
        match tokio::time::timeout(remaining, Self::evaluate::<T>(page, script)).await {
            Ok(Ok(value)) => value,
            Ok(Err(e)) => {
                debug!("Snapshot evaluation failed: {}", e);
                T::default()
            }
            Err(_) => T::default(),
        }
    }

    async fn capture_screenshot(
        &self,
        page: &Page,
        url: &str,
        until: Instant,
    ) -> Option<ScreenshotHandle> {
        let dir = self.options.screenshot_dir.as_ref()?;
        let params = ScreenshotParams::builder().full_page(true).build();
        let remaining = until.saturating_duration_since(Instant::now());
        let bytes = match tokio::time::timeout(remaining, page.screenshot(params)).await {
            Ok(Ok(bytes)) => bytes,
            Ok(Err(e)) => {
                warn!("Screenshot of {} failed: {}", url, e);
                return None;
            }
            Err(_) => return None,
        };

        let seq = self.screenshot_seq.fetch_add(1, Ordering::Relaxed);
        let path = dir.join(screenshot_file_name(seq, url));
        match tokio::fs::write(&path, bytes).await {
            Ok(()) => Some(ScreenshotHandle(path.display().to_string())),
            Err(e) => {
                warn!("Could not write screenshot {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Every step shares one budget ending at `until`.
    async fn snapshot(&self, page: &Page, url: &str, until: Instant) -> DomSnapshot {
        let remaining = || until.saturating_duration_since(Instant::now());
        let mut dom = DomSnapshot::empty(url);
        if let Ok(Ok(Some(final_url))) = tokio::time::timeout(remaining(), page.url()).await {
            dom.final_url = final_url;
        }
        if let Ok(Ok(html)) = tokio::time::timeout(remaining(), page.content()).await {
            dom.html = html;
        }
        dom.styles = Self::salvage::<Vec<StyledElement>>(page, COMPUTED_STYLES_JS, until).await;
        let stylesheets_js = STYLESHEETS_JS.replace("__MAX__", &MAX_STYLESHEETS.to_string());
        dom.stylesheets = Self::salvage::<Vec<Stylesheet>>(page, &stylesheets_js, until).await;
        if !self.options.global_probes.is_empty() {
            dom.globals = Self::salvage::<Vec<String>>(page, &self.globals_script(), until).await;
        }
        dom
    }
}

fn screenshot_file_name(seq: usize, url: &str) -> String {
    let slug: String = url
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .take(80)
        .collect();
    format!("{:03}_{}.png", seq, slug)
}

#[async_trait]
impl Renderer for ChromiumRenderer {
    fn name(&self) -> &'static str {
        "chromium"
    }

    async fn render(&self, url: &str, timeout: Duration) -> Result<RenderOutput> {
        let start = Instant::now();
        let deadline = start + timeout;

        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| ScanError::Browser(format!("failed to create page: {}", e)))?;
        let guard = PageGuard(Some(page.clone()));

        let remaining = deadline.saturating_duration_since(Instant::now());
        let navigation = tokio::time::timeout(remaining, async {
            page.goto(url).await?;
            page.wait_for_navigation().await?;
            Ok::<(), chromiumoxide::error::CdpError>(())
        })
        .await;

        let (timed_out, nav_error) = match navigation {
            Ok(Ok(())) => (!self.wait_for_network_idle(&page, deadline).await, None),
            Ok(Err(e)) => (false, Some(format!("navigation failed: {}", e))),
            Err(_) => (true, None),
        };

        // Snapshot and screenshot share the budget left after closing the page.
        let until = deadline.max(Instant::now()) + SALVAGE_BUDGET.saturating_sub(CLOSE_TIMEOUT);
        let dom = self.snapshot(&page, url, until).await;
        let screenshot = if nav_error.is_none() {
            self.capture_screenshot(&page, url, until).await
        } else {
            None
        };

        guard.close(url).await;

        let elapsed = start.elapsed();
        let output = match nav_error {
            Some(error) => RenderOutput::failed(dom, error, elapsed),
            None if timed_out => RenderOutput::timed_out(dom, elapsed),
            None => RenderOutput::ok(dom, elapsed),
        };
        Ok(output.with_screenshot(screenshot))
    }
}
