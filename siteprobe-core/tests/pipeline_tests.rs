// End-to-end tests for the analysis pipeline

use async_trait::async_trait;
use siteprobe_core::color::{delta_e, parse_color};
use siteprobe_core::model::{AssetKind, Completeness, IntegrationKind, Severity, Stage};
use siteprobe_core::{AnalysisConfig, AnalysisError, Pipeline, PipelineEvent, analyze};
use siteprobe_scanner::styles::extract_static_styles;
use siteprobe_scanner::{
    DomSnapshot, FetchStatus, RenderOutput, Renderer, SALVAGE_BUDGET, ScanError,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

const ROOT: &str = "https://example.com/";

#[derive(Clone)]
enum Fixture {
    Html(String),
    /// Lands on another fixture's URL and serves its page.
    Redirect(String),
    Timeout,
    /// Uses the whole salvage budget after the deadline, then hands back a
    /// partial DOM that landed on the given URL.
    Overrun(String),
    Broken,
}

/// Serves canned pages keyed by URL and counts every render call.
struct FakeRenderer {
    pages: HashMap<String, Fixture>,
    renders: AtomicUsize,
    rendered: Mutex<Vec<String>>,
}

impl FakeRenderer {
    fn new() -> Self {
        Self {
            pages: HashMap::new(),
            renders: AtomicUsize::new(0),
            rendered: Mutex::new(Vec::new()),
        }
    }

    fn page(mut self, url: &str, html: &str) -> Self {
        self.pages
            .insert(url.to_string(), Fixture::Html(html.to_string()));
        self
    }

    fn fixture(mut self, url: &str, fixture: Fixture) -> Self {
        self.pages.insert(url.to_string(), fixture);
        self
    }

    fn render_count(&self) -> usize {
        self.renders.load(Ordering::SeqCst)
    }

    fn rendered_urls(&self) -> Vec<String> {
        self.rendered.lock().unwrap().clone()
    }
}

#[async_trait]
impl Renderer for FakeRenderer {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn render(&self, url: &str, timeout: Duration) -> Result<RenderOutput, ScanError> {
        self.renders.fetch_add(1, Ordering::SeqCst);
        self.rendered.lock().unwrap().push(url.to_string());

        let mut dom = DomSnapshot::empty(url);
        let (landing, fixture) = match self.pages.get(url) {
            Some(Fixture::Redirect(target)) => (target.as_str(), self.pages.get(target)),
            fixture => (url, fixture),
        };
        match fixture {
            Some(Fixture::Html(html)) => {
                dom.final_url = landing.to_string();
                dom.http_status = Some(200);
                dom.headers = BTreeMap::from([(
                    "content-type".to_string(),
                    "text/html; charset=utf-8".to_string(),
                )]);
                dom.styles = extract_static_styles(html);
                dom.html = html.clone();
                Ok(RenderOutput::ok(dom, Duration::from_millis(1)))
            }
            Some(Fixture::Timeout) => Ok(RenderOutput::timed_out(dom, Duration::from_millis(1))),
            Some(Fixture::Overrun(landed)) => {
                tokio::time::sleep(timeout + SALVAGE_BUDGET).await;
                dom.final_url = landed.clone();
                dom.html = "<html><body>partial</body></html>".to_string();
                Ok(RenderOutput::timed_out(dom, timeout + SALVAGE_BUDGET))
            }
            Some(Fixture::Broken) => Err(ScanError::Browser("tab crashed".to_string())),
            Some(Fixture::Redirect(_)) | None => Ok(RenderOutput::failed(
                dom,
                "HTTP 404".to_string(),
                Duration::from_millis(1),
            )),
        }
    }
}

fn create_test_config() -> AnalysisConfig {
    AnalysisConfig {
        per_page_timeout_ms: 1_000,
        resolve_asset_sizes: false,
        ..AnalysisConfig::default()
    }
}

fn create_test_pipeline(renderer: Arc<FakeRenderer>, config: AnalysisConfig) -> Pipeline {
    Pipeline::new(renderer, config)
}

fn link_page(links: &[&str]) -> String {
    let anchors: String = links
        .iter()
        .map(|href| format!(r#"<a href="{}">{}</a>"#, href, href))
        .collect();
    format!("<html><body><main>{}</main></body></html>", anchors)
}

// ============================================================================
// Design Tests
// ============================================================================

#[tokio::test]
async fn test_near_identical_colors_share_a_swatch() {
    let renderer = Arc::new(FakeRenderer::new().page(
        ROOT,
        r##"<html><body>
            <button style="background-color: #FF0000">Buy</button>
            <button style="background-color: #FE0101">Sell</button>
        </body></html>"##,
    ));

    let report = create_test_pipeline(renderer, create_test_config())
        .analyze(ROOT)
        .await
        .unwrap();

    let colors = &report.site.design.colors;
    assert_eq!(colors.len(), 1);
    assert_eq!(colors[0].hex, "#FF0000");
    assert_eq!(colors[0].usage_count, 2);
    assert_eq!(report.site.design.inline_style_count, 2);
}

#[tokio::test]
async fn test_swatches_are_separated_by_threshold() {
    let html = r##"<html><body>
        <p style="color: #000000">a</p>
        <p style="color: #050505">b</p>
        <p style="color: #FFFFFF">c</p>
        <p style="color: #FAFAFA">d</p>
        <p style="color: #1E90FF">e</p>
        <p style="color: #1C8CF5">f</p>
        <p style="color: #FF6347">g</p>
        <p style="color: rgb(250, 100, 70)">h</p>
        <p style="color: hsl(120, 100%, 25%)">i</p>
    </body></html>"##;
    let renderer = Arc::new(FakeRenderer::new().page(ROOT, html));
    let config = create_test_config();
    let threshold = config.color_cluster_threshold;

    let report = create_test_pipeline(renderer, config)
        .analyze(ROOT)
        .await
        .unwrap();

    let swatches: Vec<_> = report
        .site
        .design
        .colors
        .iter()
        .map(|s| parse_color(&s.hex).unwrap())
        .collect();
    assert!(swatches.len() >= 4);
    for (i, a) in swatches.iter().enumerate() {
        for b in &swatches[i + 1..] {
            assert!(delta_e(a, b) >= threshold);
        }
    }

    let total: usize = report.site.design.colors.iter().map(|s| s.usage_count).sum();
    assert_eq!(total, 9);
}

#[tokio::test]
async fn test_repeated_analysis_is_identical() {
    let html = r##"<html><head>
            <script src="https://code.jquery.com/jquery-3.7.1.min.js"></script>
        </head><body>
            <h1 id="top">Welcome</h1>
            <p style="color: #336699; font-family: 'Inter', sans-serif">Hello</p>
            <img src="/hero.jpg">
        </body></html>"##;

    let mut runs = Vec::new();
    for _ in 0..2 {
        let renderer = Arc::new(FakeRenderer::new().page(ROOT, html));
        let report = create_test_pipeline(renderer, create_test_config())
            .analyze(ROOT)
            .await
            .unwrap();
        runs.push(report);
    }

    assert_eq!(runs[0].site.design, runs[1].site.design);
    assert_eq!(runs[0].site.tech, runs[1].site.tech);
    assert_eq!(runs[0].site.assets, runs[1].site.assets);
    assert_eq!(runs[0].site.risk, runs[1].site.risk);
    assert_eq!(runs[0].site.pages[0].structure, runs[1].site.pages[0].structure);
    assert!(runs[0].site.tech.find("jQuery").is_some());
}

// ============================================================================
// Integration and Risk Tests
// ============================================================================

#[tokio::test]
async fn test_form_without_token_is_flagged() {
    let renderer = Arc::new(FakeRenderer::new().page(
        ROOT,
        r#"<html><body>
            <form action="/subscribe" method="post">
                <input type="email" name="email">
                <button type="submit">Join</button>
            </form>
        </body></html>"#,
    ));

    let report = create_test_pipeline(renderer, create_test_config())
        .analyze(ROOT)
        .await
        .unwrap();

    let form = report.site.pages[0]
        .integrations
        .iter()
        .find(|i| i.kind == IntegrationKind::Form)
        .unwrap();
    assert_eq!(form.target, "/subscribe");
    assert_eq!(form.method.as_deref(), Some("POST"));
    assert!(!form.token_protected);

    let finding = report
        .site
        .risk
        .findings
        .iter()
        .find(|f| f.rule_id == "integration.form-without-token")
        .unwrap();
    assert_eq!(finding.severity, Severity::High);
    assert!(finding.description.contains("/subscribe"));
}

#[tokio::test]
async fn test_token_protected_form_is_not_flagged() {
    let renderer = Arc::new(FakeRenderer::new().page(
        ROOT,
        r#"<html><body>
            <form action="/contact" method="post">
                <input type="hidden" name="csrf_token" value="abc">
                <input type="text" name="message">
            </form>
        </body></html>"#,
    ));

    let report = create_test_pipeline(renderer, create_test_config())
        .analyze(ROOT)
        .await
        .unwrap();

    assert!(report.site.pages[0].integrations[0].token_protected);
    assert!(
        !report
            .site
            .risk
            .findings
            .iter()
            .any(|f| f.rule_id == "integration.form-without-token")
    );
}

// ============================================================================
// Crawl Bound Tests
// ============================================================================

#[tokio::test]
async fn test_page_count_never_exceeds_max_pages() {
    let mut renderer = FakeRenderer::new().page(
        ROOT,
        &link_page(&["/a", "/b", "/c", "/d", "/e", "/f"]),
    );
    for name in ["a", "b", "c", "d", "e", "f"] {
        renderer = renderer.page(
            &format!("https://example.com/{}", name),
            &link_page(&["/g", "/h"]),
        );
    }
    let renderer = Arc::new(renderer);
    let config = AnalysisConfig {
        max_pages: 3,
        max_depth: 3,
        ..create_test_config()
    };

    let report = create_test_pipeline(renderer.clone(), config)
        .analyze(ROOT)
        .await
        .unwrap();

    assert_eq!(report.site.pages.len(), 3);
    assert_eq!(renderer.render_count(), 3);
    assert_eq!(report.site.pages[0].url, ROOT);
    assert_eq!(report.site.pages[1].url, "https://example.com/a");
    assert_eq!(report.site.pages[2].url, "https://example.com/b");
}

#[tokio::test]
async fn test_depth_limit_and_no_revisits() {
    let renderer = Arc::new(
        FakeRenderer::new()
            .page(ROOT, &link_page(&["/about", "/about#team", "/"]))
            .page("https://example.com/about", &link_page(&["/", "/deeper"]))
            .page("https://example.com/deeper", &link_page(&[])),
    );

    let report = create_test_pipeline(renderer.clone(), create_test_config())
        .analyze(ROOT)
        .await
        .unwrap();

    let urls: Vec<&str> = report.site.pages.iter().map(|p| p.url.as_str()).collect();
    assert_eq!(urls, vec![ROOT, "https://example.com/about"]);

    let rendered: HashSet<String> = renderer.rendered_urls().into_iter().collect();
    assert_eq!(rendered.len(), renderer.render_count());
}

#[tokio::test]
async fn test_redirect_onto_known_page_is_not_analysed_twice() {
    let renderer = Arc::new(
        FakeRenderer::new()
            .page(ROOT, &link_page(&["/old", "/new", "/moved"]))
            .fixture(
                "https://example.com/old",
                Fixture::Redirect("https://example.com/new".to_string()),
            )
            .page("https://example.com/new", &link_page(&["/target"]))
            .fixture(
                "https://example.com/moved",
                Fixture::Redirect("https://example.com/target".to_string()),
            )
            .page("https://example.com/target", &link_page(&[])),
    );
    let config = AnalysisConfig {
        max_depth: 2,
        ..create_test_config()
    };

    let report = create_test_pipeline(renderer.clone(), config)
        .analyze(ROOT)
        .await
        .unwrap();

    let urls: Vec<&str> = report.site.pages.iter().map(|p| p.url.as_str()).collect();
    assert_eq!(
        urls,
        vec![ROOT, "https://example.com/new", "https://example.com/moved"]
    );
    assert_eq!(report.site.pages[2].final_url, "https://example.com/target");
    assert_eq!(renderer.render_count(), 4);
    assert!(
        !renderer
            .rendered_urls()
            .contains(&"https://example.com/target".to_string())
    );
}

#[tokio::test]
async fn test_cross_origin_links_are_not_followed() {
    let renderer = Arc::new(
        FakeRenderer::new()
            .page(
                ROOT,
                &link_page(&["https://other.example.org/", "mailto:hi@example.com", "/ok"]),
            )
            .page("https://example.com/ok", &link_page(&[])),
    );

    let report = create_test_pipeline(renderer.clone(), create_test_config())
        .analyze(ROOT)
        .await
        .unwrap();

    assert_eq!(report.site.pages.len(), 2);
    assert!(
        renderer
            .rendered_urls()
            .iter()
            .all(|u| u.starts_with("https://example.com/"))
    );
}

// ============================================================================
// Failure Handling Tests
// ============================================================================

#[tokio::test]
async fn test_root_timeout_is_retried_then_unreachable() {
    let renderer = Arc::new(FakeRenderer::new().fixture(ROOT, Fixture::Timeout));

    let result = create_test_pipeline(renderer.clone(), create_test_config())
        .analyze(ROOT)
        .await;

    match result {
        Err(AnalysisError::RootUnreachable { url, reason }) => {
            assert_eq!(url, ROOT);
            assert!(reason.contains("timed out"));
        }
        other => panic!("expected RootUnreachable, got {:?}", other.map(|r| r.run_id)),
    }
    assert_eq!(renderer.render_count(), 2);
}

#[tokio::test]
async fn test_root_engine_error_is_unreachable_without_retry() {
    let renderer = Arc::new(FakeRenderer::new().fixture(ROOT, Fixture::Broken));

    let result = create_test_pipeline(renderer.clone(), create_test_config())
        .analyze(ROOT)
        .await;

    assert!(matches!(result, Err(AnalysisError::RootUnreachable { .. })));
    assert_eq!(renderer.render_count(), 1);
}

#[tokio::test]
async fn test_non_http_root_is_rejected() {
    let renderer = Arc::new(FakeRenderer::new());

    let result = create_test_pipeline(renderer.clone(), create_test_config())
        .analyze("ftp://example.com/")
        .await;

    assert!(matches!(result, Err(AnalysisError::RootUnreachable { .. })));
    assert_eq!(renderer.render_count(), 0);
}

#[tokio::test]
async fn test_invalid_config_is_rejected() {
    let renderer = Arc::new(FakeRenderer::new().page(ROOT, "<html></html>"));
    let config = AnalysisConfig {
        max_pages: 0,
        ..create_test_config()
    };

    let result = create_test_pipeline(renderer, config).analyze(ROOT).await;
    assert!(matches!(result, Err(AnalysisError::InvalidConfig(_))));
}

#[tokio::test]
async fn test_timed_out_page_degrades_the_run() {
    let renderer = Arc::new(
        FakeRenderer::new()
            .page(ROOT, &link_page(&["/slow", "/fine", "/missing"]))
            .fixture("https://example.com/slow", Fixture::Timeout)
            .page("https://example.com/fine", &link_page(&[])),
    );

    let report = create_test_pipeline(renderer.clone(), create_test_config())
        .analyze(ROOT)
        .await
        .unwrap();

    assert_eq!(report.site.pages.len(), 4);
    let slow = report
        .site
        .pages
        .iter()
        .find(|p| p.url.ends_with("/slow"))
        .unwrap();
    assert_eq!(slow.status, FetchStatus::Timeout);
    assert_eq!(slow.attempts, 2);
    assert_eq!(slow.stages.get(&Stage::Render), Some(&Completeness::Partial));
    assert_eq!(slow.stages.get(&Stage::Design), Some(&Completeness::Skipped));

    let missing = report
        .site
        .pages
        .iter()
        .find(|p| p.url.ends_with("/missing"))
        .unwrap();
    assert_eq!(missing.status, FetchStatus::Error);
    assert_eq!(missing.attempts, 1);
    assert_eq!(missing.error.as_deref(), Some("HTTP 404"));

    assert_eq!(report.stages.get(&Stage::Render), Some(&Completeness::Partial));
    assert!(!report.is_complete());
    assert!(
        report
            .site
            .risk
            .findings
            .iter()
            .any(|f| f.rule_id == "coverage.incomplete-analysis")
    );
    // root + slow twice + fine + missing
    assert_eq!(renderer.render_count(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_overrunning_render_keeps_salvaged_dom() {
    let renderer = Arc::new(
        FakeRenderer::new()
            .page(ROOT, &link_page(&["/slow"]))
            .fixture(
                "https://example.com/slow",
                Fixture::Overrun("https://example.com/slow/landed".to_string()),
            ),
    );

    let report = create_test_pipeline(renderer.clone(), create_test_config())
        .analyze(ROOT)
        .await
        .unwrap();

    let slow = &report.site.pages[1];
    assert_eq!(slow.status, FetchStatus::Timeout);
    assert_eq!(slow.attempts, 2);
    assert_eq!(slow.final_url, "https://example.com/slow/landed");
    assert!(slow.dom.html.contains("partial"));
    assert_eq!(renderer.render_count(), 3);
}

// ============================================================================
// Asset Tests
// ============================================================================

#[tokio::test]
async fn test_assets_are_unique_across_pages() {
    let shared = r#"<img src="/logo.png"><script src="/app.js"></script>"#;
    let renderer = Arc::new(
        FakeRenderer::new()
            .page(
                ROOT,
                &format!(
                    r#"<html><body>{}<a href="/about">About</a><img src="/logo.png"></body></html>"#,
                    shared
                ),
            )
            .page(
                "https://example.com/about",
                &format!("<html><body>{}</body></html>", shared),
            ),
    );

    let report = create_test_pipeline(renderer, create_test_config())
        .analyze(ROOT)
        .await
        .unwrap();

    let urls: Vec<&str> = report.site.assets.iter().map(|a| a.url.as_str()).collect();
    let unique: HashSet<&str> = urls.iter().copied().collect();
    assert_eq!(urls.len(), unique.len());
    assert_eq!(urls.len(), 2);

    let logo = report
        .site
        .assets
        .iter()
        .find(|a| a.url == "https://example.com/logo.png")
        .unwrap();
    assert_eq!(logo.referrers.len(), 2);
    assert_eq!(
        report.stages.get(&Stage::AssetSizes),
        Some(&Completeness::Skipped)
    );
}

// ============================================================================
// Cancellation and Progress Tests
// ============================================================================

#[tokio::test]
async fn test_cancelled_before_root_is_unreachable() {
    let renderer = Arc::new(FakeRenderer::new().page(ROOT, "<html></html>"));
    let token = CancellationToken::new();
    token.cancel();

    let result = create_test_pipeline(renderer.clone(), create_test_config())
        .with_cancellation(token)
        .analyze(ROOT)
        .await;

    assert!(matches!(result, Err(AnalysisError::RootUnreachable { .. })));
    assert_eq!(renderer.render_count(), 0);
}

#[tokio::test]
async fn test_cancel_after_root_keeps_partial_report() {
    let renderer = Arc::new(
        FakeRenderer::new()
            .page(ROOT, &link_page(&["/a", "/b"]))
            .page("https://example.com/a", &link_page(&[]))
            .page("https://example.com/b", &link_page(&[])),
    );
    let token = CancellationToken::new();
    let trigger = token.clone();

    let report = create_test_pipeline(renderer.clone(), create_test_config())
        .with_cancellation(token)
        .with_progress_callback(Arc::new(move |event: PipelineEvent| {
            if matches!(event, PipelineEvent::PageFinished { .. }) {
                trigger.cancel();
            }
        }))
        .analyze(ROOT)
        .await
        .unwrap();

    assert!(report.cancelled);
    assert_eq!(report.site.pages.len(), 1);
    assert_eq!(renderer.render_count(), 1);
    assert_eq!(report.stages.get(&Stage::Render), Some(&Completeness::Partial));
    assert!(!report.is_complete());
}

#[tokio::test]
async fn test_progress_events_bracket_the_run() {
    let renderer = Arc::new(
        FakeRenderer::new()
            .page(ROOT, &link_page(&["/a"]))
            .page("https://example.com/a", &link_page(&[])),
    );
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();

    create_test_pipeline(renderer, create_test_config())
        .with_progress_callback(Arc::new(move |event: PipelineEvent| sink.lock().unwrap().push(event)))
        .analyze(ROOT)
        .await
        .unwrap();

    let events = events.lock().unwrap();
    assert_eq!(
        events.first(),
        Some(&PipelineEvent::RenderStarted {
            url: ROOT.to_string(),
            depth: 0
        })
    );
    assert_eq!(
        events.last(),
        Some(&PipelineEvent::Finished {
            pages: 2,
            cancelled: false
        })
    );
    let finished = events
        .iter()
        .filter(|e| matches!(e, PipelineEvent::PageFinished { .. }))
        .count();
    assert_eq!(finished, 2);
}

#[tokio::test]
async fn test_clean_run_marks_every_stage() {
    let renderer = Arc::new(FakeRenderer::new().page(
        ROOT,
        "<html><head><title>Hi</title></head><body><h1>Hi</h1></body></html>",
    ));

    let report = create_test_pipeline(renderer, create_test_config())
        .analyze(ROOT)
        .await
        .unwrap();

    for stage in Stage::PER_PAGE {
        assert_eq!(report.stages.get(&stage), Some(&Completeness::Complete));
    }
    assert_eq!(report.stages.get(&Stage::Risk), Some(&Completeness::Complete));
    assert!(report.is_complete());
    assert_eq!(report.renderer, "fake");
    assert_eq!(report.site.pages[0].title.as_deref(), Some("Hi"));
}

// ============================================================================
// HTTP Renderer Tests
// ============================================================================

#[tokio::test]
async fn test_analyze_over_http() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html")
                .set_body_raw(
                    r##"<html><head><title>Shop</title>
                        <meta name="generator" content="WordPress 6.4">
                    </head><body>
                        <nav><ul><li><a href="/products">Products</a></li></ul></nav>
                        <img src="/hero.jpg">
                        <p style="color: #222222">Welcome</p>
                    </body></html>"##,
                    "text/html",
                ),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/products"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html")
                .set_body_raw("<html><body><h1>Products</h1></body></html>", "text/html"),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("HEAD"))
        .and(path("/hero.jpg"))
        .respond_with(ResponseTemplate::new(200).insert_header("content-type", "image/jpeg"))
        .mount(&mock_server)
        .await;

    let config = AnalysisConfig {
        per_page_timeout_ms: 5_000,
        ..AnalysisConfig::default()
    };
    let root = format!("{}/", mock_server.uri());
    let report = analyze(&root, config).await.unwrap();

    assert_eq!(report.renderer, "http");
    assert_eq!(report.site.pages.len(), 2);
    assert_eq!(report.site.pages[0].title.as_deref(), Some("Shop"));
    assert!(report.site.tech.find("WordPress").is_some());
    assert_eq!(report.site.pages[0].structure.navigation.len(), 1);

    let hero = &report.site.assets[0];
    assert!(hero.url.ends_with("/hero.jpg"));
    assert_eq!(hero.content_type.as_deref(), Some("image/jpeg"));
    assert_eq!(
        report.stages.get(&Stage::AssetSizes),
        Some(&Completeness::Complete)
    );
}

#[tokio::test]
async fn test_analyze_reads_linked_stylesheets() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html")
                .set_body_raw(
                    r#"<html><head><link rel="stylesheet" href="/css/site.css"></head>
                    <body><p class="brand">Hello</p></body></html>"#,
                    "text/html",
                ),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/css/site.css"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/css")
                .set_body_raw(
                    r#".brand { color: #123456; font-family: "Brand", serif }
                    .hero { background-image: url(../img/bg.png) }
                    @font-face { font-family: Brand; src: url(/fonts/brand.woff2) }"#,
                    "text/css",
                ),
        )
        .mount(&mock_server)
        .await;

    let config = AnalysisConfig {
        per_page_timeout_ms: 5_000,
        resolve_asset_sizes: false,
        ..AnalysisConfig::default()
    };
    let root = format!("{}/", mock_server.uri());
    let report = analyze(&root, config).await.unwrap();

    let design = &report.site.design;
    assert!(design.colors.iter().any(|c| c.hex == "#123456"));
    assert!(design.fonts.iter().any(|f| f.family == "Brand"));

    let kind_of = |suffix: &str| {
        report
            .site
            .assets
            .iter()
            .find(|a| a.url.ends_with(suffix))
            .map(|a| a.kind)
    };
    assert_eq!(kind_of("/css/site.css"), Some(AssetKind::Stylesheet));
    assert_eq!(kind_of("/img/bg.png"), Some(AssetKind::Image));
    assert_eq!(kind_of("/fonts/brand.woff2"), Some(AssetKind::Font));
}
