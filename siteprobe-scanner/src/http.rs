use crate::error::Result;
use crate::renderer::{RenderOptions, Renderer};
use crate::result::{DomSnapshot, RenderOutput, Stylesheet};
use crate::styles::{extract_static_styles, linked_stylesheets, parse_css_rules};
use async_trait::async_trait;
use futures::future::join_all;
use reqwest::Client;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Renderer that fetches raw HTML over HTTP without executing scripts.
///
/// Style data comes from inline declarations, `<style>` blocks and linked
/// stylesheets fetched within the page deadline. No global symbols or
/// screenshots are available.
pub struct HttpRenderer {
    client: Client,
}

impl HttpRenderer {
    pub fn new(options: &RenderOptions) -> Result<Self> {
        let client = Client::builder()
            .user_agent(options.user_agent.clone())
            .pool_max_idle_per_host(8)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .redirect(reqwest::redirect::Policy::limited(options.max_redirects))
            .build()?;

        Ok(Self { client })
    }

    /// Best effort: a stylesheet that fails or misses the deadline is left out.
    async fn fetch_stylesheet(&self, url: String, deadline: Instant) -> Option<Stylesheet> {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let request = async {
            let response = self.client.get(&url).send().await?.error_for_status()?;
            response.text().await
        };
        match tokio::time::timeout(remaining, request).await {
            Ok(Ok(text)) => Some(Stylesheet { url, text }),
            Ok(Err(e)) => {
                debug!("Stylesheet {} unavailable: {}", url, e);
                None
            }
            Err(_) => {
                debug!("Stylesheet {} missed the page deadline", url);
                None
            }
        }
    }

    async fn fetch(&self, url: &str, timeout: Duration) -> RenderOutput {
        debug!("Fetching {}", url);
        let start = Instant::now();
        let deadline = start + timeout;
        let mut dom = DomSnapshot::empty(url);

        let response = match tokio::time::timeout(timeout, self.client.get(url).send()).await {
            Err(_) => return RenderOutput::timed_out(dom, start.elapsed()),
            Ok(Err(e)) if e.is_timeout() => return RenderOutput::timed_out(dom, start.elapsed()),
            Ok(Err(e)) => return RenderOutput::failed(dom, e.to_string(), start.elapsed()),
            Ok(Ok(response)) => response,
        };

        let status_code = response.status().as_u16();
        dom.final_url = response.url().to_string();
        dom.http_status = Some(status_code);
        dom.headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect::<BTreeMap<_, _>>();

        let remaining = timeout.saturating_sub(start.elapsed());
        let body = match tokio::time::timeout(remaining, response.text()).await {
            Err(_) => return RenderOutput::timed_out(dom, start.elapsed()),
            Ok(Err(e)) => return RenderOutput::failed(dom, e.to_string(), start.elapsed()),
            Ok(Ok(body)) => body,
        };

        // Only parse HTML content
        let is_html = dom
            .headers
            .get("content-type")
            .map(|ct| ct.contains("text/html") || ct.contains("application/xhtml"))
            .unwrap_or(false);

        if !is_html {
            let content_type = dom.headers.get("content-type").cloned().unwrap_or_default();
            return RenderOutput::failed(
                dom,
                format!("unsupported content type '{}'", content_type),
                start.elapsed(),
            );
        }

        dom.styles = extract_static_styles(&body);
        dom.html = body;

        if status_code >= 400 {
            warn!("{} answered HTTP {}", url, status_code);
            return RenderOutput::failed(dom, format!("HTTP {}", status_code), start.elapsed());
        }

        let links = linked_stylesheets(&dom.html, &dom.final_url);
        dom.stylesheets = join_all(
            links
                .into_iter()
                .map(|link| self.fetch_stylesheet(link, deadline)),
        )
        .await
        .into_iter()
        .flatten()
        .collect();
        for sheet in &dom.stylesheets {
            dom.styles.extend(parse_css_rules(&sheet.text));
        }

        RenderOutput::ok(dom, start.elapsed())
    }
}

#[async_trait]
impl Renderer for HttpRenderer {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn render(&self, url: &str, timeout: Duration) -> Result<RenderOutput> {
        Ok(self.fetch(url, timeout).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::FetchStatus;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    fn renderer() -> HttpRenderer {
        HttpRenderer::new(&RenderOptions::default()).unwrap()
    }

    #[tokio::test]
    async fn test_render_html_page() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html; charset=utf-8")
                    .insert_header("x-powered-by", "Express")
                    .set_body_bytes(
                        br#"<html><body><button style="color: #123456">Go</button></body></html>"#
                            .as_slice(),
                    ),
            )
            .mount(&mock_server)
            .await;

        let url = format!("{}/", mock_server.uri());
        let output = renderer().render(&url, Duration::from_secs(5)).await.unwrap();

        assert_eq!(output.status, FetchStatus::Ok);
        assert_eq!(output.dom.http_status, Some(200));
        assert_eq!(
            output.dom.headers.get("x-powered-by").map(String::as_str),
            Some("Express")
        );
        assert_eq!(output.dom.styles.len(), 1);
        assert!(output.screenshot.is_none());
    }

    #[tokio::test]
    async fn test_render_reads_linked_stylesheets() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_bytes(
                        br#"<html><head>
                            <link rel="stylesheet" href="/css/site.css">
                            <link rel="stylesheet" href="/css/missing.css">
                        </head><body></body></html>"#
                            .as_slice(),
                    ),
            )
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/css/site.css"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/css")
                    .set_body_bytes(b".brand { color: #112233 }".as_slice()),
            )
            .mount(&mock_server)
            .await;

        let url = format!("{}/", mock_server.uri());
        let output = renderer().render(&url, Duration::from_secs(5)).await.unwrap();

        assert_eq!(output.status, FetchStatus::Ok);
        assert_eq!(output.dom.stylesheets.len(), 1);
        assert_eq!(
            output.dom.stylesheets[0].url,
            format!("{}/css/site.css", mock_server.uri())
        );
        let rule = output
            .dom
            .styles
            .iter()
            .find(|s| s.selector == ".brand")
            .unwrap();
        assert_eq!(rule.property("color"), Some("#112233"));
    }

    #[tokio::test]
    async fn test_slow_stylesheet_does_not_hold_the_page() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_bytes(
                        br#"<html><head><link rel="stylesheet" href="/slow.css"></head></html>"#
                            .as_slice(),
                    ),
            )
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/slow.css"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(b"a { color: red }".as_slice())
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&mock_server)
            .await;

        let url = format!("{}/", mock_server.uri());
        let start = Instant::now();
        let output = renderer()
            .render(&url, Duration::from_millis(500))
            .await
            .unwrap();

        assert!(start.elapsed() < Duration::from_secs(2));
        assert_eq!(output.status, FetchStatus::Ok);
        assert!(output.dom.stylesheets.is_empty());
    }

    #[tokio::test]
    async fn test_render_slow_page_times_out() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_bytes(b"<html></html>".as_slice())
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&mock_server)
            .await;

        let url = format!("{}/slow", mock_server.uri());
        let output = renderer()
            .render(&url, Duration::from_millis(50))
            .await
            .unwrap();

        assert_eq!(output.status, FetchStatus::Timeout);
        assert!(output.dom.is_empty());
    }

    #[tokio::test]
    async fn test_render_server_error_is_error_status() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/broken"))
            .respond_with(
                ResponseTemplate::new(500)
                    .insert_header("content-type", "text/html")
                    .set_body_bytes(b"<html><body>oops</body></html>".as_slice()),
            )
            .mount(&mock_server)
            .await;

        let url = format!("{}/broken", mock_server.uri());
        let output = renderer().render(&url, Duration::from_secs(5)).await.unwrap();

        assert_eq!(output.status, FetchStatus::Error);
        assert_eq!(output.error.as_deref(), Some("HTTP 500"));
    }

    #[tokio::test]
    async fn test_render_non_html_is_error_status() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/data.json"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "application/json")
                    .set_body_bytes(b"{}".as_slice()),
            )
            .mount(&mock_server)
            .await;

        let url = format!("{}/data.json", mock_server.uri());
        let output = renderer().render(&url, Duration::from_secs(5)).await.unwrap();

        assert_eq!(output.status, FetchStatus::Error);
        assert!(output.error.unwrap().contains("application/json"));
    }

    #[tokio::test]
    async fn test_render_unreachable_host_is_error_status() {
        let output = renderer()
            .render("http://127.0.0.1:1/", Duration::from_secs(2))
            .await
            .unwrap();

        assert_eq!(output.status, FetchStatus::Error);
    }
}
