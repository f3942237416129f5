use crate::error::{AnalysisError, Result};
use crate::signatures::SignatureTable;
use serde::{Deserialize, Serialize};
use siteprobe_scanner::{DEFAULT_USER_AGENT, RenderOptions};
use std::path::Path;
use std::time::Duration;

/// Options for one analysis run. Threaded explicitly through the pipeline so
/// independent runs in the same process never share settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AnalysisConfig {
    /// Upper bound on pages in the report, root included.
    pub max_pages: usize,
    pub per_page_timeout_ms: u64,
    /// Renders allowed in flight at once.
    pub render_concurrency: usize,
    /// CIE76 ΔE below which two colors collapse into one swatch.
    pub color_cluster_threshold: f64,
    /// Similar siblings required before a UI pattern is labelled.
    pub min_pattern_repetition: usize,
    /// Link depth followed from the root. 1 follows links on the root page only.
    pub max_depth: usize,
    pub network_idle_ms: u64,
    pub asset_probe_timeout_ms: u64,
    pub resolve_asset_sizes: bool,
    pub max_asset_probes: usize,
    pub user_agent: String,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_pages: 10,
            per_page_timeout_ms: 30_000,
            render_concurrency: 3,
            color_cluster_threshold: 10.0,
            min_pattern_repetition: 3,
            max_depth: 1,
            network_idle_ms: 500,
            asset_probe_timeout_ms: 5_000,
            resolve_asset_sizes: true,
            max_asset_probes: 250,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl AnalysisConfig {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AnalysisError::InvalidConfig(format!("failed to read {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&content).map_err(|e| {
            AnalysisError::InvalidConfig(format!("failed to parse {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_pages == 0 {
            return Err(AnalysisError::InvalidConfig("maxPages must be at least 1".into()));
        }
        if self.per_page_timeout_ms == 0 {
            return Err(AnalysisError::InvalidConfig(
                "perPageTimeoutMs must be positive".into(),
            ));
        }
        if self.render_concurrency == 0 {
            return Err(AnalysisError::InvalidConfig(
                "renderConcurrency must be at least 1".into(),
            ));
        }
        if !self.color_cluster_threshold.is_finite() || self.color_cluster_threshold <= 0.0 {
            return Err(AnalysisError::InvalidConfig(
                "colorClusterThreshold must be a positive number".into(),
            ));
        }
        if self.min_pattern_repetition < 2 {
            return Err(AnalysisError::InvalidConfig(
                "minPatternRepetition must be at least 2".into(),
            ));
        }
        Ok(())
    }

    pub fn page_timeout(&self) -> Duration {
        Duration::from_millis(self.per_page_timeout_ms)
    }

    pub fn asset_probe_timeout(&self) -> Duration {
        Duration::from_millis(self.asset_probe_timeout_ms)
    }

    /// Render settings for any engine, with global probes taken from the
    /// built-in signature table.
    pub fn render_options(&self) -> RenderOptions {
        RenderOptions {
            user_agent: self.user_agent.clone(),
            network_idle: Duration::from_millis(self.network_idle_ms),
            global_probes: SignatureTable::builtin().global_probes(),
            ..RenderOptions::default()
        }
    }
}
