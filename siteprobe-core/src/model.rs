// Domain model for analysed sites

use serde::{Deserialize, Serialize};
use siteprobe_scanner::{DomSnapshot, FetchStatus, ScreenshotHandle};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Info,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
            Severity::Info => "info",
        }
    }
}

/// How far a stage got, per page or for the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Completeness {
    Complete,
    Partial,
    Failed,
    /// The stage never ran, e.g. extraction on a page that did not render.
    Skipped,
}

impl Completeness {
    pub fn as_str(&self) -> &'static str {
        match self {
            Completeness::Complete => "complete",
            Completeness::Partial => "partial",
            Completeness::Failed => "failed",
            Completeness::Skipped => "skipped",
        }
    }

    /// Fold per-page flags into one run-level flag.
    pub fn summarize<I>(flags: I) -> Self
    where
        I: IntoIterator<Item = Completeness>,
    {
        let (mut total, mut complete, mut partial, mut failed, mut skipped) = (0, 0, 0, 0, 0);
        for flag in flags {
            total += 1;
            match flag {
                Completeness::Complete => complete += 1,
                Completeness::Partial => partial += 1,
                Completeness::Failed => failed += 1,
                Completeness::Skipped => skipped += 1,
            }
        }

        if total == 0 || skipped == total {
            Completeness::Skipped
        } else if complete == total {
            Completeness::Complete
        } else if complete == 0 && partial == 0 && failed > 0 {
            Completeness::Failed
        } else {
            Completeness::Partial
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Render,
    Design,
    Stack,
    Structure,
    Assets,
    Integrations,
    AssetSizes,
    Risk,
}

impl Stage {
    /// Stages that run once per rendered page.
    pub const PER_PAGE: [Stage; 5] = [
        Stage::Design,
        Stage::Stack,
        Stage::Structure,
        Stage::Assets,
        Stage::Integrations,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Render => "render",
            Stage::Design => "design",
            Stage::Stack => "stack",
            Stage::Structure => "structure",
            Stage::Assets => "assets",
            Stage::Integrations => "integrations",
            Stage::AssetSizes => "asset_sizes",
            Stage::Risk => "risk",
        }
    }
}

pub type StageFlags = BTreeMap<Stage, Completeness>;

// ============================================================================
// Site and pages
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Site {
    pub root_url: String,
    pub pages: Vec<Page>,
    pub design: DesignSystem,
    pub tech: TechProfile,
    pub assets: Vec<Asset>,
    pub risk: RiskAssessment,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub url: String,
    pub status: FetchStatus,
    pub depth: usize,
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    pub final_url: String,
    /// Raw rendered DOM. Kept in memory for consumers of the library, left
    /// out of the JSON document.
    #[serde(skip)]
    pub dom: DomSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<ScreenshotHandle>,
    pub assets: Vec<String>,
    pub integrations: Vec<IntegrationPoint>,
    pub structure: StructureMap,
    pub stages: StageFlags,
}

impl Page {
    /// A page whose render did not succeed: raw DOM kept, aggregates empty.
    pub fn unrendered(url: String, depth: usize, attempts: u32, dom: DomSnapshot) -> Self {
        let stages = Stage::PER_PAGE
            .iter()
            .map(|stage| (*stage, Completeness::Skipped))
            .collect();
        let final_url = if dom.final_url.is_empty() {
            url.clone()
        } else {
            dom.final_url.clone()
        };
        Self {
            final_url,
            http_status: dom.http_status,
            url,
            status: FetchStatus::Error,
            depth,
            attempts,
            title: None,
            error: None,
            dom,
            screenshot: None,
            assets: Vec::new(),
            integrations: Vec::new(),
            structure: StructureMap::default(),
            stages,
        }
    }
}

// ============================================================================
// Design system
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignSystem {
    pub colors: Vec<ColorSwatch>,
    pub fonts: Vec<FontUsage>,
    pub patterns: BTreeSet<String>,
    pub inline_style_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorSwatch {
    pub hex: String,
    pub usage_count: usize,
    pub selectors: Vec<String>,
    /// Exact values folded into this swatch, representative first.
    pub members: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FontUsage {
    pub family: String,
    pub weight: u16,
    pub usage_count: usize,
}

// ============================================================================
// Technology profile
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TechCategory {
    CssFramework,
    JsLibrary,
    Analytics,
    Cms,
    ChatWidget,
    Payment,
    TrackingPixel,
    Maps,
    Video,
    Scheduling,
    Forms,
}

impl TechCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            TechCategory::CssFramework => "css-framework",
            TechCategory::JsLibrary => "js-library",
            TechCategory::Analytics => "analytics",
            TechCategory::Cms => "cms",
            TechCategory::ChatWidget => "chat-widget",
            TechCategory::Payment => "payment",
            TechCategory::TrackingPixel => "tracking-pixel",
            TechCategory::Maps => "maps",
            TechCategory::Video => "video",
            TechCategory::Scheduling => "scheduling",
            TechCategory::Forms => "forms",
        }
    }

    /// Third-party embeds reported as integration points rather than stack.
    pub fn is_integration(&self) -> bool {
        !matches!(
            self,
            TechCategory::CssFramework
                | TechCategory::JsLibrary
                | TechCategory::Analytics
                | TechCategory::Cms
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TechProfile {
    pub signatures: Vec<TechSignature>,
}

impl TechProfile {
    pub fn has_category(&self, category: TechCategory) -> bool {
        self.signatures.iter().any(|s| s.category == category)
    }

    pub fn find(&self, name: &str) -> Option<&TechSignature> {
        self.signatures.iter().find(|s| s.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechSignature {
    pub name: String,
    pub category: TechCategory,
    pub confidence: f32,
    pub evidence: Vec<String>,
}

// ============================================================================
// Structure
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutlineKind {
    Heading,
    Navigation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutlineNode {
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub depth: u8,
    pub kind: OutlineKind,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub children: Vec<OutlineNode>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructureMap {
    pub headings: Vec<OutlineNode>,
    pub navigation: Vec<OutlineNode>,
    /// Same-origin links, normalised, in discovery order.
    pub links: Vec<String>,
}

// ============================================================================
// Assets
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Image,
    Font,
    Document,
    Script,
    Stylesheet,
}

impl AssetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetKind::Image => "image",
            AssetKind::Font => "font",
            AssetKind::Document => "document",
            AssetKind::Script => "script",
            AssetKind::Stylesheet => "stylesheet",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub url: String,
    pub kind: AssetKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    pub referrers: Vec<String>,
}

// ============================================================================
// Integrations
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IntegrationKind {
    Form,
    EmbeddedWidget,
    ExternalScriptEndpoint,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormField {
    pub name: String,
    pub field_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationPoint {
    pub kind: IntegrationKind,
    /// Target as written in the page: form action, script or iframe URL,
    /// endpoint literal.
    pub target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub fields: Vec<FormField>,
    /// Forms only: a CSRF-style token field or meta tag was found.
    #[serde(default)]
    pub token_protected: bool,
}

// ============================================================================
// Risk
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskCategory {
    Customization,
    Integration,
    Migration,
    Design,
    Performance,
    Security,
    Coverage,
}

impl RiskCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskCategory::Customization => "customization",
            RiskCategory::Integration => "integration",
            RiskCategory::Migration => "migration",
            RiskCategory::Design => "design",
            RiskCategory::Performance => "performance",
            RiskCategory::Security => "security",
            RiskCategory::Coverage => "coverage",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskFinding {
    pub rule_id: String,
    pub severity: Severity,
    pub category: RiskCategory,
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub findings: Vec<RiskFinding>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summarize_all_complete() {
        let flags = vec![Completeness::Complete, Completeness::Complete];
        assert_eq!(Completeness::summarize(flags), Completeness::Complete);
    }

    #[test]
    fn test_summarize_mixed_is_partial() {
        let flags = vec![Completeness::Complete, Completeness::Failed];
        assert_eq!(Completeness::summarize(flags), Completeness::Partial);

        let flags = vec![Completeness::Complete, Completeness::Skipped];
        assert_eq!(Completeness::summarize(flags), Completeness::Partial);
    }

    #[test]
    fn test_summarize_edges() {
        assert_eq!(Completeness::summarize(vec![]), Completeness::Skipped);
        assert_eq!(
            Completeness::summarize(vec![Completeness::Failed, Completeness::Skipped]),
            Completeness::Failed
        );
    }

    #[test]
    fn test_integration_categories() {
        assert!(TechCategory::Payment.is_integration());
        assert!(!TechCategory::Cms.is_integration());
    }

    #[test]
    fn test_stage_flags_serialize_in_stage_order() {
        let mut flags = StageFlags::new();
        flags.insert(Stage::Risk, Completeness::Complete);
        flags.insert(Stage::Render, Completeness::Partial);
        let json = serde_json::to_string(&flags).unwrap();
        assert_eq!(json, r#"{"render":"partial","risk":"complete"}"#);
    }
}
