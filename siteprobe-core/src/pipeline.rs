use crate::assets::{AssetAccumulator, AssetRef, apply_probe_outcomes, inventory_assets};
use crate::config::AnalysisConfig;
use crate::design::{DesignAccumulator, DesignSample, extract_design};
use crate::error::{AnalysisError, Result, StageError};
use crate::integrations::detect_integrations;
use crate::model::{Asset, Completeness, Page, Site, Stage, StageFlags, TechSignature};
use crate::report::Report;
use crate::risk;
use crate::signatures::SignatureTable;
use crate::stack::{TechAccumulator, detect_stack};
use crate::structure::map_structure;
use futures::future::join_all;
use siteprobe_scanner::urls::normalize_str;
use siteprobe_scanner::{
    AssetProber, DomSnapshot, FetchStatus, HttpRenderer, RENDER_GRACE, RenderOutput, Renderer,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Attempts per page. Only a timeout earns a second attempt.
const MAX_RENDER_ATTEMPTS: u32 = 2;

/// Progress notifications emitted while a run is in flight
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    RenderStarted { url: String, depth: usize },
    PageFinished { url: String, status: FetchStatus, pages_done: usize },
    StageDegraded { url: String, stage: Stage, error: String },
    ProbingAssets { count: usize },
    Finished { pages: usize, cancelled: bool },
}

/// Callback for reporting pipeline progress
pub type PipelineProgressCallback = Arc<dyn Fn(PipelineEvent) + Send + Sync>;

/// Everything one page contributed, before merging into the site.
struct PageOutcome {
    page: Page,
    design: Option<DesignSample>,
    tech: Vec<TechSignature>,
    assets: Vec<AssetRef>,
}

pub struct Pipeline {
    renderer: Arc<dyn Renderer>,
    prober: Option<Arc<AssetProber>>,
    config: AnalysisConfig,
    signatures: &'static SignatureTable,
    progress: Option<PipelineProgressCallback>,
    cancel: CancellationToken,
}

/// Analyze a site with the HTTP renderer and, when enabled, asset size probes.
pub async fn analyze(root_url: &str, config: AnalysisConfig) -> Result<Report> {
    config.validate()?;
    let renderer = HttpRenderer::new(&config.render_options())?;
    let mut pipeline = Pipeline::new(Arc::new(renderer), config.clone());
    if config.resolve_asset_sizes {
        let prober = AssetProber::new(&config.user_agent, config.asset_probe_timeout())?;
        pipeline = pipeline.with_asset_prober(prober);
    }
    pipeline.analyze(root_url).await
}

impl Pipeline {
    pub fn new(renderer: Arc<dyn Renderer>, config: AnalysisConfig) -> Self {
        Self {
            renderer,
            prober: None,
            config,
            signatures: SignatureTable::builtin(),
            progress: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_asset_prober(mut self, prober: AssetProber) -> Self {
        self.prober = Some(Arc::new(prober));
        self
    }

    pub fn with_progress_callback(mut self, callback: PipelineProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Share a token with the caller. Cancelling it stops new renders; the
    /// pages already rendered still make it into the report.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    fn emit(&self, event: PipelineEvent) {
        if let Some(callback) = &self.progress {
            callback(event);
        }
    }

    pub async fn analyze(&self, root_url: &str) -> Result<Report> {
        self.config.validate()?;

        let root = normalize_str(root_url)
            .filter(|u| u.starts_with("http://") || u.starts_with("https://"))
            .ok_or_else(|| AnalysisError::RootUnreachable {
                url: root_url.to_string(),
                reason: "not an absolute http(s) URL".to_string(),
            })?;

        info!(
            "Analyzing {} with the {} renderer (max {} pages, depth {})",
            root,
            self.renderer.name(),
            self.config.max_pages,
            self.config.max_depth
        );

        let semaphore = Semaphore::new(self.config.render_concurrency);
        let root_outcome = self
            .process_page(&semaphore, root.clone(), 0, None)
            .await
            .ok_or_else(|| AnalysisError::RootUnreachable {
                url: root.clone(),
                reason: "cancelled before the root page rendered".to_string(),
            })?;

        if root_outcome.page.status != FetchStatus::Ok {
            let reason = match root_outcome.page.status {
                FetchStatus::Timeout => format!(
                    "render timed out after {} attempts",
                    root_outcome.page.attempts
                ),
                _ => root_outcome
                    .page
                    .error
                    .clone()
                    .unwrap_or_else(|| "render failed".to_string()),
            };
            warn!("Root page {} unreachable: {}", root, reason);
            return Err(AnalysisError::RootUnreachable { url: root, reason });
        }

        // Same-origin checks follow the root wherever it redirected.
        let origin = root_outcome.page.final_url.clone();
        let mut seen: HashSet<String> = HashSet::new();
        seen.insert(root.clone());
        if let Some(final_url) = normalize_str(&origin) {
            seen.insert(final_url);
        }

        let mut scheduled = 1;
        let mut frontier = self.enqueue(&root_outcome, &mut seen, &mut scheduled);
        let mut outcomes = vec![root_outcome];
        self.emit(PipelineEvent::PageFinished {
            url: root.clone(),
            status: FetchStatus::Ok,
            pages_done: 1,
        });

        while !frontier.is_empty() && !self.cancel.is_cancelled() {
            let wave = std::mem::take(&mut frontier);
            debug!("Rendering {} page(s) at depth {}", wave.len(), wave[0].1);

            let results = join_all(wave.into_iter().map(|(url, depth)| {
                self.process_page(&semaphore, url, depth, Some(origin.as_str()))
            }))
            .await;

            // Claim every redirect target of the wave before queueing links.
            let mut landed = Vec::with_capacity(results.len());
            for outcome in results.into_iter().flatten() {
                if redirected_to_seen(&outcome.page, &mut seen) {
                    debug!(
                        "Dropping {}: redirected to already seen {}",
                        outcome.page.url, outcome.page.final_url
                    );
                    continue;
                }
                landed.push(outcome);
            }

            for outcome in landed {
                frontier.extend(self.enqueue(&outcome, &mut seen, &mut scheduled));
                self.emit(PipelineEvent::PageFinished {
                    url: outcome.page.url.clone(),
                    status: outcome.page.status,
                    pages_done: outcomes.len() + 1,
                });
                outcomes.push(outcome);
            }
        }

        let cancelled = self.cancel.is_cancelled();
        let report = self.assemble(root, outcomes, cancelled).await;

        info!(
            "Analysis finished: {} pages, {} assets, {} findings{}",
            report.site.pages.len(),
            report.site.assets.len(),
            report.site.risk.findings.len(),
            if cancelled { " (cancelled)" } else { "" }
        );
        self.emit(PipelineEvent::Finished {
            pages: report.site.pages.len(),
            cancelled,
        });

        Ok(report)
    }

    /// Queue unseen links of a page one level deeper, while the page budget
    /// allows. `scheduled` counts every page handed to the renderer so far.
    fn enqueue(
        &self,
        outcome: &PageOutcome,
        seen: &mut HashSet<String>,
        scheduled: &mut usize,
    ) -> Vec<(String, usize)> {
        let mut queued = Vec::new();
        if outcome.page.depth >= self.config.max_depth {
            return queued;
        }

        for link in &outcome.page.structure.links {
            if *scheduled >= self.config.max_pages {
                break;
            }
            if seen.insert(link.clone()) {
                *scheduled += 1;
                queued.push((link.clone(), outcome.page.depth + 1));
            }
        }
        queued
    }

    async fn render_page(&self, url: &str) -> (RenderOutput, u32) {
        let timeout = self.config.page_timeout();
        let mut attempts = 0;

        loop {
            attempts += 1;
            let started = Instant::now();
            let output =
                match tokio::time::timeout(timeout + RENDER_GRACE, self.renderer.render(url, timeout))
                    .await
                {
                    Ok(Ok(output)) => output,
                    Ok(Err(e)) => {
                        RenderOutput::failed(DomSnapshot::empty(url), e.to_string(), started.elapsed())
                    }
                    Err(_) => RenderOutput::timed_out(DomSnapshot::empty(url), started.elapsed()),
                };

            if output.status == FetchStatus::Timeout && attempts < MAX_RENDER_ATTEMPTS {
                debug!("Render of {} timed out, retrying", url);
                continue;
            }
            return (output, attempts);
        }
    }

    /// Render one page and run the extraction stages on it. `None` when the
    /// run was cancelled before the render started.
    async fn process_page(
        &self,
        semaphore: &Semaphore,
        url: String,
        depth: usize,
        origin: Option<&str>,
    ) -> Option<PageOutcome> {
        let (output, attempts) = {
            let _permit = semaphore.acquire().await.ok()?;
            if self.cancel.is_cancelled() {
                debug!("Skipping {}: run cancelled", url);
                return None;
            }
            self.emit(PipelineEvent::RenderStarted {
                url: url.clone(),
                depth,
            });
            self.render_page(&url).await
        };

        let RenderOutput {
            dom,
            screenshot,
            status,
            error,
            elapsed,
        } = output;
        debug!(
            "Rendered {} in {:?}: {} ({} attempt(s))",
            url,
            elapsed,
            status.as_str(),
            attempts
        );

        let mut page = Page::unrendered(url, depth, attempts, dom);
        page.status = status;
        page.error = error;
        page.screenshot = screenshot;
        page.stages.insert(
            Stage::Render,
            match status {
                FetchStatus::Ok => Completeness::Complete,
                FetchStatus::Timeout => Completeness::Partial,
                FetchStatus::Error => Completeness::Failed,
            },
        );

        if status != FetchStatus::Ok {
            warn!(
                "Page {} degraded: {}",
                page.url,
                page.error.as_deref().unwrap_or(status.as_str())
            );
            return Some(PageOutcome {
                page,
                design: None,
                tech: Vec::new(),
                assets: Vec::new(),
            });
        }

        let origin = origin
            .map(str::to_string)
            .unwrap_or_else(|| page.final_url.clone());
        Some(self.run_stages(page, origin).await)
    }

    async fn run_stages(&self, mut page: Page, origin: String) -> PageOutcome {
        let dom = Arc::new(std::mem::take(&mut page.dom));
        let table = self.signatures;
        let min_repetition = self.config.min_pattern_repetition;

        let (design, stack, structure, assets, integrations) = tokio::join!(
            run_stage(dom.clone(), move |d| extract_design(d, min_repetition)),
            run_stage(dom.clone(), move |d| detect_stack(d, table)),
            run_stage(dom.clone(), move |d| map_structure(d, &origin)),
            run_stage(dom.clone(), inventory_assets),
            run_stage(dom.clone(), move |d| detect_integrations(d, table)),
        );

        page.dom = Arc::try_unwrap(dom).unwrap_or_else(|shared| (*shared).clone());

        let design = self.settle(&mut page, Stage::Design, design);
        let tech = self.settle(&mut page, Stage::Stack, stack).unwrap_or_default();
        if let Some(structure) = self.settle(&mut page, Stage::Structure, structure) {
            page.title = structure.title;
            page.structure = structure.map;
        }
        let assets = self.settle(&mut page, Stage::Assets, assets).unwrap_or_default();
        page.assets = assets.iter().map(|a| a.url.clone()).collect();
        page.integrations = self
            .settle(&mut page, Stage::Integrations, integrations)
            .unwrap_or_default();

        PageOutcome {
            page,
            design,
            tech,
            assets,
        }
    }

    /// Record a stage result on the page. Failures leave the aggregate empty.
    fn settle<T>(
        &self,
        page: &mut Page,
        stage: Stage,
        result: std::result::Result<T, StageError>,
    ) -> Option<T> {
        match result {
            Ok(value) => {
                page.stages.insert(stage, Completeness::Complete);
                Some(value)
            }
            Err(e) => {
                warn!("Stage {} failed on {}: {}", stage.as_str(), page.url, e);
                page.stages.insert(stage, Completeness::Failed);
                self.emit(PipelineEvent::StageDegraded {
                    url: page.url.clone(),
                    stage,
                    error: e.to_string(),
                });
                None
            }
        }
    }

    async fn assemble(&self, root: String, outcomes: Vec<PageOutcome>, cancelled: bool) -> Report {
        let mut design = DesignAccumulator::default();
        let mut tech = TechAccumulator::default();
        let mut assets = AssetAccumulator::default();
        let mut pages = Vec::with_capacity(outcomes.len());

        for outcome in outcomes {
            if let Some(sample) = &outcome.design {
                design.add(sample);
            }
            tech.add(&outcome.tech);
            assets.add(&outcome.page.url, &outcome.assets);
            pages.push(outcome.page);
        }

        let mut stages = StageFlags::new();
        let mut render = Completeness::summarize(
            pages
                .iter()
                .filter_map(|p| p.stages.get(&Stage::Render).copied()),
        );
        if cancelled && render == Completeness::Complete {
            render = Completeness::Partial;
        }
        stages.insert(Stage::Render, render);
        for stage in Stage::PER_PAGE {
            stages.insert(
                stage,
                Completeness::summarize(pages.iter().filter_map(|p| p.stages.get(&stage).copied())),
            );
        }

        let mut assets = assets.finish();
        let sizes = self.resolve_asset_sizes(&mut assets, cancelled).await;
        stages.insert(Stage::AssetSizes, sizes);

        let mut site = Site {
            root_url: root,
            pages,
            design: design.finish(self.config.color_cluster_threshold),
            tech: tech.finish(),
            assets,
            risk: Default::default(),
        };

        site.risk = risk::assess(&site, &stages, cancelled);
        stages.insert(Stage::Risk, Completeness::Complete);

        Report::new(
            site,
            stages,
            self.config.clone(),
            self.renderer.name(),
            cancelled,
        )
    }

    async fn resolve_asset_sizes(
        &self,
        assets: &mut [Asset],
        cancelled: bool,
    ) -> Completeness {
        let Some(prober) = &self.prober else {
            return Completeness::Skipped;
        };
        if !self.config.resolve_asset_sizes || cancelled || assets.is_empty() {
            return Completeness::Skipped;
        }

        let limit = assets.len().min(self.config.max_asset_probes);
        let urls: Vec<String> = assets[..limit].iter().map(|a| a.url.clone()).collect();
        self.emit(PipelineEvent::ProbingAssets { count: urls.len() });
        debug!("Probing {} of {} assets", urls.len(), assets.len());

        let outcomes = prober
            .probe_all(&urls, self.config.render_concurrency)
            .await;
        apply_probe_outcomes(assets, outcomes);

        if limit < assets.len() {
            Completeness::Partial
        } else {
            Completeness::Complete
        }
    }
}

/// A page that redirected onto a URL already rendered or queued duplicates
/// that page. Otherwise its landing URL is claimed.
fn redirected_to_seen(page: &Page, seen: &mut HashSet<String>) -> bool {
    match normalize_str(&page.final_url) {
        Some(landing) if landing != page.url => !seen.insert(landing),
        _ => false,
    }
}

/// Run a CPU-bound extraction off the async workers. A panic inside the
/// stage surfaces as a `StageError`.
async fn run_stage<T, F>(dom: Arc<DomSnapshot>, stage: F) -> std::result::Result<T, StageError>
where
    T: Send + 'static,
    F: FnOnce(&DomSnapshot) -> std::result::Result<T, StageError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || stage(&dom)).await?
}

#[cfg(test)]
mod tests {
    use super::*;
    use siteprobe_scanner::RenderOptions;
    use siteprobe_scanner::styles::extract_static_styles;
    use std::sync::Mutex;

    const ROOT: &str = "https://example.com/";
    const ABOUT: &str = "https://example.com/about";

    fn create_test_pipeline() -> Pipeline {
        let renderer = HttpRenderer::new(&RenderOptions::default()).unwrap();
        let config = AnalysisConfig {
            resolve_asset_sizes: false,
            ..AnalysisConfig::default()
        };
        Pipeline::new(Arc::new(renderer), config)
    }

    fn rendered_page(url: &str, html: &str) -> Page {
        let mut dom = DomSnapshot::empty(url);
        dom.html = html.to_string();
        dom.styles = extract_static_styles(html);
        let mut page = Page::unrendered(url.to_string(), 0, 1, dom);
        page.status = FetchStatus::Ok;
        page.stages.insert(Stage::Render, Completeness::Complete);
        page
    }

    fn aborted() -> std::result::Result<DesignSample, StageError> {
        Err(StageError::Aborted("worker panicked".to_string()))
    }

    #[tokio::test]
    async fn test_panicking_stage_becomes_stage_error() {
        let dom = Arc::new(DomSnapshot::empty(ROOT));
        let result: std::result::Result<(), StageError> =
            run_stage(dom, |_| panic!("extraction blew up")).await;

        assert!(matches!(result, Err(StageError::Aborted(_))));
    }

    #[tokio::test]
    async fn test_failed_stage_leaves_other_stages_intact() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let pipeline = create_test_pipeline().with_progress_callback(Arc::new(
            move |event: PipelineEvent| sink.lock().unwrap().push(event),
        ));

        let healthy = pipeline
            .run_stages(
                rendered_page(ROOT, r#"<p style="color: #FF0000">home</p>"#),
                ROOT.to_string(),
            )
            .await;
        let mut degraded = pipeline
            .run_stages(
                rendered_page(ABOUT, r#"<p style="color: #0000FF">about</p>"#),
                ROOT.to_string(),
            )
            .await;
        degraded.design = pipeline.settle(&mut degraded.page, Stage::Design, aborted());

        assert_eq!(
            degraded.page.stages.get(&Stage::Design),
            Some(&Completeness::Failed)
        );
        for stage in [Stage::Stack, Stage::Structure, Stage::Assets, Stage::Integrations] {
            assert_eq!(degraded.page.stages.get(&stage), Some(&Completeness::Complete));
        }
        assert_eq!(
            events.lock().unwrap().as_slice(),
            &[PipelineEvent::StageDegraded {
                url: ABOUT.to_string(),
                stage: Stage::Design,
                error: "stage task aborted: worker panicked".to_string(),
            }]
        );

        let report = pipeline
            .assemble(ROOT.to_string(), vec![healthy, degraded], false)
            .await;

        assert_eq!(report.stages.get(&Stage::Design), Some(&Completeness::Partial));
        assert_eq!(report.stages.get(&Stage::Stack), Some(&Completeness::Complete));
        assert_eq!(report.stages.get(&Stage::Render), Some(&Completeness::Complete));
        assert!(!report.is_complete());

        let hexes: Vec<&str> = report.site.design.colors.iter().map(|c| c.hex.as_str()).collect();
        assert_eq!(hexes, vec!["#FF0000"]);
        assert!(
            report
                .site
                .risk
                .findings
                .iter()
                .any(|f| f.rule_id == "coverage.incomplete-analysis")
        );
    }

    #[tokio::test]
    async fn test_stage_failed_everywhere_fails_the_run_flag() {
        let pipeline = create_test_pipeline();

        let mut outcomes = Vec::new();
        for url in [ROOT, ABOUT] {
            let mut outcome = pipeline
                .run_stages(rendered_page(url, "<p>text</p>"), ROOT.to_string())
                .await;
            outcome.design = pipeline.settle(&mut outcome.page, Stage::Design, aborted());
            outcomes.push(outcome);
        }

        let report = pipeline.assemble(ROOT.to_string(), outcomes, false).await;

        assert_eq!(report.stages.get(&Stage::Design), Some(&Completeness::Failed));
        assert_eq!(
            report.stages.get(&Stage::Structure),
            Some(&Completeness::Complete)
        );
        assert!(report.site.design.colors.is_empty());
    }

    #[test]
    fn test_redirect_onto_seen_url_is_a_duplicate() {
        let mut seen = HashSet::from([ROOT.to_string(), ABOUT.to_string()]);

        let mut moved = rendered_page("https://example.com/old", "");
        moved.final_url = ABOUT.to_string();
        assert!(redirected_to_seen(&moved, &mut seen));

        let mut fresh = rendered_page("https://example.com/legacy", "");
        fresh.final_url = "https://example.com/new#top".to_string();
        assert!(!redirected_to_seen(&fresh, &mut seen));
        assert!(seen.contains("https://example.com/new"));

        let direct = rendered_page("https://example.com/plain", "");
        assert!(!redirected_to_seen(&direct, &mut seen));
    }
}
