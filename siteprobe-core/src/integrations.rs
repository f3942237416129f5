// Forms, third-party embeds and script-referenced endpoints

use crate::error::{StageError, selector};
use crate::model::{FormField, IntegrationKind, IntegrationPoint};
use crate::signals::PageSignals;
use crate::signatures::SignatureTable;
use regex::Regex;
use scraper::{ElementRef, Html};
use siteprobe_scanner::DomSnapshot;
use siteprobe_scanner::urls::{normalize_str, resolve_url};
use std::collections::HashSet;
use std::sync::OnceLock;

fn token_name_regex() -> &'static Regex {
    static TOKEN: OnceLock<Regex> = OnceLock::new();
    TOKEN.get_or_init(|| {
        Regex::new(
            r"(?i)(csrf|xsrf|authenticity_token|requestverificationtoken|^_?token$|_token$|nonce|form_key|form_build_id)",
        )
        .expect("static regex")
    })
}

/// Calls whose first string argument is a request target. The last capture
/// group is the target, an earlier one the HTTP verb when present.
fn endpoint_regexes() -> &'static [(Regex, Option<&'static str>)] {
    static ENDPOINTS: OnceLock<Vec<(Regex, Option<&'static str>)>> = OnceLock::new();
    ENDPOINTS.get_or_init(|| {
        [
            (r#"fetch\(\s*['"`]([^'"`]+)['"`]"#, None),
            (r#"axios\.(get|post|put|patch|delete)\(\s*['"`]([^'"`]+)['"`]"#, None),
            (r#"\$\.(?:ajax|getJSON)\(\s*\{?\s*(?:url\s*:\s*)?['"`]([^'"`]+)['"`]"#, None),
            (r#"\$\.(get|post)\(\s*['"`]([^'"`]+)['"`]"#, None),
            (r#"\.open\(\s*['"](GET|POST|PUT|PATCH|DELETE)['"]\s*,\s*['"`]([^'"`]+)['"`]"#, None),
            (
                r#"['"`]((?:https?://[^'"`\s]+)?/(?:api|graphql)(?:/[^'"`\s]*)?)['"`]"#,
                Some("literal"),
            ),
        ]
        .into_iter()
        .map(|(pattern, tag)| (Regex::new(pattern).expect("static regex"), tag))
        .collect()
    })
}

fn form_fields(form: &ElementRef) -> Result<Vec<FormField>, StageError> {
    let mut fields = Vec::new();
    for field in form.select(&selector("input, select, textarea, button[name]")?) {
        let value = field.value();
        let Some(name) = value.attr("name").filter(|n| !n.trim().is_empty()) else {
            continue;
        };
        let field_type = match value.name() {
            "input" => value
                .attr("type")
                .map(|t| t.trim().to_ascii_lowercase())
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| "text".to_string()),
            other => other.to_string(),
        };
        fields.push(FormField {
            name: name.to_string(),
            field_type,
        });
    }
    Ok(fields)
}

/// A token-like hidden field, or any field named after a CSRF scheme.
pub fn has_token_field(fields: &[FormField]) -> bool {
    fields.iter().any(|f| {
        let lower = f.name.to_ascii_lowercase();
        token_name_regex().is_match(&f.name)
            && (f.field_type == "hidden" || lower.contains("csrf") || lower.contains("xsrf"))
    })
}

fn detect_forms(document: &Html, page_url: &str) -> Result<Vec<IntegrationPoint>, StageError> {
    let csrf_meta = document
        .select(&selector("meta[name]")?)
        .any(|m| {
            m.value()
                .attr("name")
                .is_some_and(|n| token_name_regex().is_match(n))
        });

    let mut points = Vec::new();
    for form in document.select(&selector("form")?) {
        let value = form.value();
        let action = value.attr("action").map(str::trim).filter(|a| !a.is_empty());
        let (target, resolved_target) = match action {
            Some(action) => (action.to_string(), resolve_url(page_url, action)),
            None => (page_url.to_string(), normalize_str(page_url)),
        };
        let method = value
            .attr("method")
            .map(|m| m.trim().to_ascii_uppercase())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| "GET".to_string());
        let fields = form_fields(&form)?;
        let token_protected = csrf_meta || has_token_field(&fields);

        points.push(IntegrationPoint {
            kind: IntegrationKind::Form,
            target,
            resolved_target,
            method: Some(method),
            provider: None,
            fields,
            token_protected,
        });
    }
    Ok(points)
}

fn detect_embeds(signals: &PageSignals, table: &SignatureTable) -> Vec<IntegrationPoint> {
    let mut points: Vec<IntegrationPoint> = Vec::new();

    for found in table.matches(signals, |category| category.is_integration()) {
        let existing = points
            .iter_mut()
            .find(|p| p.provider.as_deref() == Some(found.name));
        match existing {
            // Prefer a concrete resource URL over a global or markup hit.
            Some(point) => {
                if point.resolved_target.is_none() && found.channel.is_url() {
                    point.target = found.value.clone();
                    point.resolved_target = normalize_str(&found.value);
                }
            }
            None => points.push(IntegrationPoint {
                kind: IntegrationKind::EmbeddedWidget,
                resolved_target: if found.channel.is_url() {
                    normalize_str(&found.value)
                } else {
                    None
                },
                target: found.value.clone(),
                method: None,
                provider: Some(found.name.to_string()),
                fields: Vec::new(),
                token_protected: false,
            }),
        }
    }

    points
}

fn detect_endpoints(signals: &PageSignals, page_url: &str) -> Vec<IntegrationPoint> {
    let mut seen = HashSet::new();
    let mut points = Vec::new();

    for script in &signals.inline_scripts {
        for (regex, tag) in endpoint_regexes() {
            for capture in regex.captures_iter(script) {
                let groups = capture.len();
                let Some(target) = capture.get(groups - 1).map(|m| m.as_str().trim()) else {
                    continue;
                };
                if target.is_empty() || target.starts_with("data:") || !seen.insert(target.to_string()) {
                    continue;
                }
                let method = if tag.is_none() && groups > 2 {
                    capture.get(1).map(|m| m.as_str().to_ascii_uppercase())
                } else {
                    None
                };
                points.push(IntegrationPoint {
                    kind: IntegrationKind::ExternalScriptEndpoint,
                    target: target.to_string(),
                    resolved_target: resolve_url(page_url, target),
                    method,
                    provider: None,
                    fields: Vec::new(),
                    token_protected: false,
                });
            }
        }
    }

    points
}

/// Forms first, then embeds in signature-table order, then script endpoints.
pub fn detect_integrations(
    dom: &DomSnapshot,
    table: &SignatureTable,
) -> Result<Vec<IntegrationPoint>, StageError> {
    let document = Html::parse_document(&dom.html);
    let signals = PageSignals::from_document(dom, &document)?;
    let page_url = signals.page_url.clone();

    let mut points = detect_forms(&document, &page_url)?;
    points.extend(detect_embeds(&signals, table));
    points.extend(detect_endpoints(&signals, &page_url));
    Ok(points)
}
