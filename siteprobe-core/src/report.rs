// Report document assembly and rendering

use crate::config::AnalysisConfig;
use crate::model::{Completeness, Severity, Site, StageFlags};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use uuid::Uuid;

/// Bumped whenever a field is renamed, removed or changes meaning.
pub const SCHEMA_VERSION: &str = "1.0";

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";
const THIN_RULE: &str =
    "────────────────────────────────────────────────────────────────────────────────";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportFormat {
    Json,
    Text,
}

impl ReportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(ReportFormat::Json),
            "text" | "txt" => Some(ReportFormat::Text),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub schema_version: String,
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    /// Engine that rendered the pages.
    pub renderer: String,
    pub cancelled: bool,
    pub config: AnalysisConfig,
    pub stages: StageFlags,
    pub site: Site,
}

impl Report {
    pub fn new(
        site: Site,
        stages: StageFlags,
        config: AnalysisConfig,
        renderer: &str,
        cancelled: bool,
    ) -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            run_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            renderer: renderer.to_string(),
            cancelled,
            config,
            stages,
            site,
        }
    }

    /// Every stage ran to completion and the run was not cancelled.
    pub fn is_complete(&self) -> bool {
        !self.cancelled
            && self
                .stages
                .values()
                .all(|flag| matches!(flag, Completeness::Complete | Completeness::Skipped))
    }

    pub fn severity_counts(&self) -> SeverityCounts {
        let mut counts = SeverityCounts::default();
        for finding in &self.site.risk.findings {
            match finding.severity {
                Severity::Critical => counts.critical += 1,
                Severity::High => counts.high += 1,
                Severity::Medium => counts.medium += 1,
                Severity::Low => counts.low += 1,
                Severity::Info => counts.info += 1,
            }
        }
        counts
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub info: usize,
}

impl SeverityCounts {
    pub fn total(&self) -> usize {
        self.critical + self.high + self.medium + self.low + self.info
    }
}

pub fn generate_json_report(report: &Report) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(report)
}

pub fn generate_text_report(report: &Report) -> String {
    let site = &report.site;
    let mut out = String::new();

    out.push_str(RULE);
    out.push('\n');
    out.push_str("                          SITEPROBE DISCOVERY REPORT\n");
    out.push_str(RULE);
    out.push_str("\n\n");

    out.push_str(&format!("Run ID:       {}\n", report.run_id));
    out.push_str(&format!(
        "Generated:    {}\n",
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    out.push_str(&format!("Root URL:     {}\n", site.root_url));
    out.push_str(&format!("Renderer:     {}\n", report.renderer));
    out.push_str(&format!("Pages:        {}\n", site.pages.len()));
    if report.cancelled {
        out.push_str("Status:       Cancelled\n");
    }
    out.push('\n');

    section(&mut out, "COVERAGE");
    for (stage, flag) in &report.stages {
        out.push_str(&format!("  {:<14}{}\n", stage.as_str(), flag.as_str()));
    }
    out.push('\n');
    for page in &site.pages {
        out.push_str(&format!("  [{}] {}\n", page.status.as_str(), page.url));
    }
    out.push('\n');

    section(&mut out, "DESIGN SYSTEM");
    out.push_str("Colors:\n");
    for swatch in site.design.colors.iter().take(12) {
        out.push_str(&format!("  {}  x{}\n", swatch.hex, swatch.usage_count));
    }
    out.push_str("Fonts:\n");
    for font in site.design.fonts.iter().take(8) {
        out.push_str(&format!(
            "  {} {}  x{}\n",
            font.family, font.weight, font.usage_count
        ));
    }
    if !site.design.patterns.is_empty() {
        let patterns: Vec<&str> = site.design.patterns.iter().map(String::as_str).collect();
        out.push_str(&format!("Patterns:     {}\n", patterns.join(", ")));
    }
    out.push('\n');

    section(&mut out, "TECHNOLOGY");
    if site.tech.signatures.is_empty() {
        out.push_str("  No known technologies detected\n");
    }
    for signature in &site.tech.signatures {
        out.push_str(&format!(
            "  {:<24}{:<16}{:.0}%\n",
            signature.name,
            signature.category.as_str(),
            signature.confidence * 100.0
        ));
    }
    out.push_str(&format!("\nAssets:       {}\n", site.assets.len()));
    let integrations: usize = site.pages.iter().map(|p| p.integrations.len()).sum();
    out.push_str(&format!("Integrations: {}\n\n", integrations));

    section(&mut out, "RISKS");
    let counts = report.severity_counts();
    out.push_str(&format!("Total Findings: {}\n\n", counts.total()));
    for (idx, finding) in site.risk.findings.iter().enumerate() {
        out.push_str(&format!("[{}] {}\n", idx + 1, finding.title));
        out.push_str(&format!(
            "Severity:     {}\n",
            finding.severity.as_str().to_uppercase()
        ));
        out.push_str(&format!("Category:     {}\n", finding.category.as_str()));
        out.push_str(&wrap_text(&finding.description, 80, "  "));
        out.push('\n');
        out.push_str(THIN_RULE);
        out.push_str("\n\n");
    }

    out
}

pub fn save_report(content: &str, path: &Path) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}

fn section(out: &mut String, title: &str) {
    out.push_str(RULE);
    out.push('\n');
    out.push_str(title);
    out.push('\n');
    out.push_str(RULE);
    out.push_str("\n\n");
}

fn wrap_text(text: &str, width: usize, indent: &str) -> String {
    let mut result = String::new();
    let mut current_line = String::new();

    for word in text.split_whitespace() {
        if current_line.len() + word.len() + 1 > width - indent.len() && !current_line.is_empty()
        {
            result.push_str(indent);
            result.push_str(&current_line);
            result.push('\n');
            current_line.clear();
        }

        if !current_line.is_empty() {
            current_line.push(' ');
        }
        current_line.push_str(word);
    }

    if !current_line.is_empty() {
        result.push_str(indent);
        result.push_str(&current_line);
        result.push('\n');
    }

    result
}
