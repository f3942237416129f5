// Deterministic risk rules over an analysed site

use crate::model::{
    AssetKind, Completeness, IntegrationKind, IntegrationPoint, RiskAssessment, RiskCategory,
    RiskFinding, Severity, Site, Stage, StageFlags, TechCategory,
};
use siteprobe_scanner::FetchStatus;
use std::collections::BTreeSet;
use url::Url;

pub const INLINE_STYLE_THRESHOLD: usize = 20;
pub const THIRD_PARTY_THRESHOLD: usize = 4;
pub const PALETTE_THRESHOLD: usize = 12;
pub const FONT_FAMILY_THRESHOLD: usize = 4;
pub const HEAVY_IMAGE_BYTES: u64 = 1024 * 1024;
pub const HEAVY_TOTAL_BYTES: u64 = 10 * 1024 * 1024;

const LEGACY_LIBRARIES: &[&str] = &["jQuery", "jQuery UI", "AngularJS", "MooTools", "Prototype"];
const SEARCH_FIELD_NAMES: &[&str] = &["q", "query", "s", "search", "keyword", "keywords", "term"];
const MAX_LISTED: usize = 5;

fn finding(
    rule_id: &str,
    severity: Severity,
    category: RiskCategory,
    title: &str,
    description: String,
) -> RiskFinding {
    RiskFinding {
        rule_id: rule_id.to_string(),
        severity,
        category,
        title: title.to_string(),
        description,
    }
}

fn list<T: AsRef<str>>(items: &[T]) -> String {
    let mut listed: Vec<&str> = items.iter().take(MAX_LISTED).map(|s| s.as_ref()).collect();
    if items.len() > MAX_LISTED {
        listed.push("...");
    }
    listed.join(", ")
}

fn forms(site: &Site) -> impl Iterator<Item = &IntegrationPoint> {
    site.pages
        .iter()
        .flat_map(|p| p.integrations.iter())
        .filter(|i| i.kind == IntegrationKind::Form)
}

/// A GET form whose visible fields are all search inputs. A form with no
/// named visible field is never a search form.
fn is_search_form(form: &IntegrationPoint) -> bool {
    if form.method.as_deref().unwrap_or("GET") != "GET" {
        return false;
    }
    let mut visible = form
        .fields
        .iter()
        .filter(|f| !matches!(f.field_type.as_str(), "submit" | "button" | "hidden"))
        .peekable();
    visible.peek().is_some()
        && visible.all(|f| {
            f.field_type == "search"
                || SEARCH_FIELD_NAMES.contains(&f.name.to_ascii_lowercase().as_str())
        })
}

pub fn check_customization(site: &Site) -> Vec<RiskFinding> {
    let mut findings = Vec::new();
    let inline = site.design.inline_style_count;

    if !site.tech.has_category(TechCategory::CssFramework) && inline >= INLINE_STYLE_THRESHOLD {
        findings.push(finding(
            "customization.inline-styles",
            Severity::Medium,
            RiskCategory::Customization,
            "Hand-built styling",
            format!(
                "No CSS framework was recognised and {} elements carry inline styles; visual details will need to be rebuilt by hand.",
                inline
            ),
        ));
    }

    findings
}

pub fn check_form_tokens(site: &Site) -> Vec<RiskFinding> {
    let mut findings = Vec::new();

    let mut targets: Vec<String> = Vec::new();
    for form in forms(site).filter(|f| !f.token_protected && !is_search_form(f)) {
        if !targets.contains(&form.target) {
            targets.push(form.target.clone());
        }
    }

    if !targets.is_empty() {
        findings.push(finding(
            "integration.form-without-token",
            Severity::High,
            RiskCategory::Integration,
            "Form without CSRF-style token",
            format!(
                "{} form target(s) submit without a recognisable anti-forgery token: {}. The receiving backend must be identified and rebuilt or re-integrated.",
                targets.len(),
                list(&targets)
            ),
        ));
    }

    findings
}

pub fn check_third_parties(site: &Site) -> Vec<RiskFinding> {
    let mut findings = Vec::new();

    let providers: BTreeSet<&str> = site
        .pages
        .iter()
        .flat_map(|p| p.integrations.iter())
        .filter_map(|i| i.provider.as_deref())
        .collect();

    if providers.len() >= THIRD_PARTY_THRESHOLD {
        let names: Vec<&str> = providers.into_iter().collect();
        findings.push(finding(
            "integration.third-party-count",
            Severity::Medium,
            RiskCategory::Integration,
            "Many third-party integrations",
            format!(
                "{} third-party services are embedded ({}); each needs credentials and re-configuration.",
                names.len(),
                list(&names)
            ),
        ));
    }

    findings
}

pub fn check_cms_migration(site: &Site) -> Vec<RiskFinding> {
    let mut findings = Vec::new();

    let cms: Vec<&str> = site
        .tech
        .signatures
        .iter()
        .filter(|s| s.category == TechCategory::Cms && s.confidence >= 0.7)
        .map(|s| s.name.as_str())
        .collect();

    if !cms.is_empty() {
        findings.push(finding(
            "migration.cms",
            Severity::Medium,
            RiskCategory::Migration,
            "Content managed by a CMS",
            format!(
                "Content is served by {}; pages, media and editorial workflows must be exported and migrated.",
                list(&cms)
            ),
        ));
    }

    findings
}

pub fn check_legacy_libraries(site: &Site) -> Vec<RiskFinding> {
    let mut findings = Vec::new();

    let legacy: Vec<&str> = LEGACY_LIBRARIES
        .iter()
        .copied()
        .filter(|name| site.tech.find(name).is_some())
        .collect();

    if !legacy.is_empty() {
        findings.push(finding(
            "migration.legacy-javascript",
            Severity::Low,
            RiskCategory::Migration,
            "Legacy JavaScript libraries",
            format!(
                "Behaviour depends on {}; interactive features will need rewriting.",
                list(&legacy)
            ),
        ));
    }

    findings
}

pub fn check_palette(site: &Site) -> Vec<RiskFinding> {
    let mut findings = Vec::new();
    let swatches = site.design.colors.len();

    if swatches > PALETTE_THRESHOLD {
        findings.push(finding(
            "design.fragmented-palette",
            Severity::Low,
            RiskCategory::Design,
            "Fragmented color palette",
            format!(
                "{} distinct color swatches remain after clustering; the palette needs consolidation before a redesign.",
                swatches
            ),
        ));
    }

    findings
}

pub fn check_typography(site: &Site) -> Vec<RiskFinding> {
    let mut findings = Vec::new();

    let families: BTreeSet<String> = site
        .design
        .fonts
        .iter()
        .map(|f| f.family.to_ascii_lowercase())
        .collect();

    if families.len() > FONT_FAMILY_THRESHOLD {
        findings.push(finding(
            "design.typography-sprawl",
            Severity::Low,
            RiskCategory::Design,
            "Typography sprawl",
            format!("{} font families are in use.", families.len()),
        ));
    }

    findings
}

pub fn check_heavy_assets(site: &Site) -> Vec<RiskFinding> {
    let mut findings = Vec::new();

    let heavy_images: Vec<&str> = site
        .assets
        .iter()
        .filter(|a| a.kind == AssetKind::Image && a.size.is_some_and(|s| s > HEAVY_IMAGE_BYTES))
        .map(|a| a.url.as_str())
        .collect();
    let total: u64 = site.assets.iter().filter_map(|a| a.size).sum();

    if !heavy_images.is_empty() || total > HEAVY_TOTAL_BYTES {
        findings.push(finding(
            "performance.heavy-assets",
            Severity::Medium,
            RiskCategory::Performance,
            "Heavy assets",
            format!(
                "Known asset weight is {:.1} MiB; {} image(s) exceed 1 MiB{}{}.",
                total as f64 / (1024.0 * 1024.0),
                heavy_images.len(),
                if heavy_images.is_empty() { "" } else { ": " },
                list(&heavy_images)
            ),
        ));
    }

    findings
}

fn is_insecure(url: &str) -> bool {
    Url::parse(url).is_ok_and(|parsed| {
        parsed.scheme() == "http"
            && parsed
                .host_str()
                .is_some_and(|host| !host.starts_with("127.") && host != "localhost")
    })
}

pub fn check_insecure_transport(site: &Site) -> Vec<RiskFinding> {
    let mut findings = Vec::new();

    let insecure: Vec<&str> = site
        .pages
        .iter()
        .map(|p| p.final_url.as_str())
        .chain(forms(site).filter_map(|f| f.resolved_target.as_deref()))
        .filter(|u| is_insecure(u))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    if !insecure.is_empty() {
        findings.push(finding(
            "security.insecure-transport",
            Severity::Medium,
            RiskCategory::Security,
            "Insecure transport (HTTP)",
            format!(
                "{} page(s) or form target(s) are served over plain HTTP: {}.",
                insecure.len(),
                list(&insecure)
            ),
        ));
    }

    findings
}

pub fn check_coverage(site: &Site, stages: &StageFlags, cancelled: bool) -> Vec<RiskFinding> {
    let mut findings = Vec::new();

    let degraded_pages = site
        .pages
        .iter()
        .filter(|p| p.status != FetchStatus::Ok)
        .count();
    let degraded_stages: Vec<&str> = stages
        .iter()
        .filter(|(stage, flag)| {
            matches!(flag, Completeness::Partial | Completeness::Failed)
                && **stage != Stage::Risk
        })
        .map(|(stage, _)| stage.as_str())
        .collect();

    if cancelled || degraded_pages > 0 || !degraded_stages.is_empty() {
        let mut reasons = Vec::new();
        if cancelled {
            reasons.push("the run was cancelled".to_string());
        }
        if degraded_pages > 0 {
            reasons.push(format!("{} page(s) did not render", degraded_pages));
        }
        if !degraded_stages.is_empty() {
            reasons.push(format!("incomplete stages: {}", degraded_stages.join(", ")));
        }
        findings.push(finding(
            "coverage.incomplete-analysis",
            Severity::Info,
            RiskCategory::Coverage,
            "Incomplete analysis",
            format!("Findings may be understated: {}.", reasons.join("; ")),
        ));
    }

    findings
}

/// Run every rule in definition order.
pub fn assess(site: &Site, stages: &StageFlags, cancelled: bool) -> RiskAssessment {
    let mut findings = Vec::new();

    findings.extend(check_customization(site));
    findings.extend(check_form_tokens(site));
    findings.extend(check_third_parties(site));
    findings.extend(check_cms_migration(site));
    findings.extend(check_legacy_libraries(site));
    findings.extend(check_palette(site));
    findings.extend(check_typography(site));
    findings.extend(check_heavy_assets(site));
    findings.extend(check_insecure_transport(site));
    findings.extend(check_coverage(site, stages, cancelled));

    RiskAssessment { findings }
}
