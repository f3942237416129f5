// Observable page evidence the signature table is matched against

use crate::error::{StageError, selector};
use scraper::{ElementRef, Html};
use siteprobe_scanner::DomSnapshot;
use siteprobe_scanner::urls::resolve_url;
use std::collections::BTreeSet;

/// Cap on raw HTML scanned by markup rules.
const MAX_HTML_SCAN: usize = 512 * 1024;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageSignals {
    pub page_url: String,
    pub class_names: BTreeSet<String>,
    pub meta_generators: Vec<String>,
    pub script_urls: Vec<String>,
    pub stylesheet_urls: Vec<String>,
    pub iframe_sources: Vec<String>,
    pub globals: Vec<String>,
    /// `name: value`, lowercase names.
    pub headers: Vec<String>,
    pub inline_scripts: Vec<String>,
    pub markup: String,
}

impl PageSignals {
    pub fn collect(dom: &DomSnapshot) -> Result<Self, StageError> {
        let document = Html::parse_document(&dom.html);
        Self::from_document(dom, &document)
    }

    pub fn from_document(dom: &DomSnapshot, document: &Html) -> Result<Self, StageError> {
        let base = if dom.final_url.is_empty() {
            dom.requested_url.as_str()
        } else {
            dom.final_url.as_str()
        };
        let absolute = |href: &str| resolve_url(base, href).unwrap_or_else(|| href.to_string());

        let mut signals = PageSignals {
            page_url: base.to_string(),
            globals: dom.globals.clone(),
            headers: dom
                .headers
                .iter()
                .map(|(name, value)| format!("{}: {}", name.to_ascii_lowercase(), value))
                .collect(),
            ..PageSignals::default()
        };

        for element in document.root_element().descendants().filter_map(ElementRef::wrap) {
            signals
                .class_names
                .extend(element.value().classes().map(str::to_string));
        }

        for meta in document.select(&selector("meta[name]")?) {
            let value = meta.value();
            if value
                .attr("name")
                .is_some_and(|n| n.eq_ignore_ascii_case("generator"))
                && let Some(content) = value.attr("content")
            {
                signals.meta_generators.push(content.trim().to_string());
            }
        }

        for script in document.select(&selector("script")?) {
            match script.value().attr("src") {
                Some(src) => signals.script_urls.push(absolute(src)),
                None => {
                    let text: String = script.text().collect();
                    if !text.trim().is_empty() {
                        signals.inline_scripts.push(text);
                    }
                }
            }
        }

        for link in document.select(&selector("link[href]")?) {
            let value = link.value();
            let is_stylesheet = value
                .attr("rel")
                .is_some_and(|rel| rel.split_whitespace().any(|r| r.eq_ignore_ascii_case("stylesheet")))
                || value.attr("as") == Some("style");
            if is_stylesheet && let Some(href) = value.attr("href") {
                signals.stylesheet_urls.push(absolute(href));
            }
        }

        for iframe in document.select(&selector("iframe[src]")?) {
            if let Some(src) = iframe.value().attr("src") {
                signals.iframe_sources.push(absolute(src));
            }
        }

        signals.markup = truncate(&dom.html, MAX_HTML_SCAN).to_string();
        Ok(signals)
    }
}

fn truncate(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
