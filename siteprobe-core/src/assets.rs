// Asset inventory: images, fonts, documents, scripts and stylesheets

use crate::error::StageError;
use crate::model::{Asset, AssetKind};
use regex::Regex;
use scraper::{ElementRef, Html};
use siteprobe_scanner::urls::{path_extension, resolve_url};
use siteprobe_scanner::{DomSnapshot, ProbeOutcome};
use std::collections::HashMap;
use std::sync::OnceLock;

const DOCUMENT_EXTENSIONS: &[&str] = &[
    "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "csv", "txt", "zip",
];
const FONT_EXTENSIONS: &[&str] = &["woff", "woff2", "ttf", "otf", "eot"];
const IMAGE_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "webp", "avif", "svg", "ico", "bmp",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRef {
    pub url: String,
    pub kind: AssetKind,
}

fn css_url_regex() -> &'static Regex {
    static URL: OnceLock<Regex> = OnceLock::new();
    URL.get_or_init(|| {
        Regex::new(r#"(?i)url\(\s*['"]?([^'")]+?)['"]?\s*\)"#).expect("static regex")
    })
}

fn css_import_regex() -> &'static Regex {
    static IMPORT: OnceLock<Regex> = OnceLock::new();
    IMPORT.get_or_init(|| {
        Regex::new(r#"(?i)@import\s+(?:url\(\s*)?['"]([^'"]+)['"]"#).expect("static regex")
    })
}

fn kind_from_extension(url: &str) -> Option<AssetKind> {
    let ext = path_extension(url)?;
    let ext = ext.as_str();
    if FONT_EXTENSIONS.contains(&ext) {
        Some(AssetKind::Font)
    } else if IMAGE_EXTENSIONS.contains(&ext) {
        Some(AssetKind::Image)
    } else if DOCUMENT_EXTENSIONS.contains(&ext) {
        Some(AssetKind::Document)
    } else if ext == "css" {
        Some(AssetKind::Stylesheet)
    } else if ext == "js" || ext == "mjs" {
        Some(AssetKind::Script)
    } else {
        None
    }
}

fn link_kind(element: &ElementRef, href: &str) -> Option<AssetKind> {
    let value = element.value();
    let rel = value.attr("rel").unwrap_or_default().to_ascii_lowercase();
    let rels: Vec<&str> = rel.split_whitespace().collect();

    if rels.contains(&"stylesheet") {
        return Some(AssetKind::Stylesheet);
    }
    if rels
        .iter()
        .any(|r| matches!(*r, "icon" | "apple-touch-icon" | "mask-icon"))
    {
        return Some(AssetKind::Image);
    }
    if rels.contains(&"manifest") {
        return Some(AssetKind::Document);
    }
    if rels.contains(&"preload") || rels.contains(&"prefetch") {
        return match value.attr("as").map(|a| a.to_ascii_lowercase()).as_deref() {
            Some("font") => Some(AssetKind::Font),
            Some("style") => Some(AssetKind::Stylesheet),
            Some("script") => Some(AssetKind::Script),
            Some("image") => Some(AssetKind::Image),
            _ => kind_from_extension(href),
        };
    }
    None
}

/// Candidate URLs from a `srcset` list.
fn srcset_urls(srcset: &str) -> impl Iterator<Item = &str> {
    srcset
        .split(',')
        .filter_map(|candidate| candidate.split_whitespace().next())
}

struct Collector<'a> {
    base: &'a str,
    seen: HashMap<String, usize>,
    refs: Vec<AssetRef>,
}

impl<'a> Collector<'a> {
    fn push(&mut self, raw: &str, kind: AssetKind) {
        self.push_relative(self.base, raw, kind);
    }

    fn push_relative(&mut self, base: &str, raw: &str, kind: AssetKind) {
        let raw = raw.trim();
        if raw.is_empty() || raw.starts_with("data:") || raw.starts_with("blob:") {
            return;
        }
        let Some(url) = resolve_url(base, raw) else {
            return;
        };
        if !self.seen.contains_key(&url) {
            self.seen.insert(url.clone(), self.refs.len());
            self.refs.push(AssetRef { url, kind });
        }
    }

    /// `@import` and `url()` references, resolved against `base`: the page
    /// for inline CSS, the stylesheet itself for linked CSS.
    fn push_css(&mut self, css: &str, base: &str) {
        for capture in css_import_regex().captures_iter(css) {
            self.push_relative(base, &capture[1], AssetKind::Stylesheet);
        }
        for capture in css_url_regex().captures_iter(css) {
            let raw = capture[1].trim();
            let kind = resolve_url(base, raw)
                .and_then(|url| kind_from_extension(&url))
                .unwrap_or(AssetKind::Image);
            self.push_relative(base, raw, kind);
        }
    }
}

/// Every asset the page references, absolute and deduplicated, in document
/// order, followed by what its linked stylesheets reference.
pub fn inventory_assets(dom: &DomSnapshot) -> Result<Vec<AssetRef>, StageError> {
    let document = Html::parse_document(&dom.html);
    let base = if dom.final_url.is_empty() {
        dom.requested_url.as_str()
    } else {
        dom.final_url.as_str()
    };

    let mut collector = Collector {
        base,
        seen: HashMap::new(),
        refs: Vec::new(),
    };

    for element in document.root_element().descendants().filter_map(ElementRef::wrap) {
        let value = element.value();
        match value.name() {
            "img" => {
                for attr in ["src", "data-src"] {
                    if let Some(src) = value.attr(attr) {
                        collector.push(src, AssetKind::Image);
                    }
                }
                if let Some(srcset) = value.attr("srcset") {
                    for url in srcset_urls(srcset) {
                        collector.push(url, AssetKind::Image);
                    }
                }
            }
            "source" => {
                let in_picture = element
                    .parent()
                    .and_then(ElementRef::wrap)
                    .is_some_and(|p| p.value().name() == "picture");
                let candidates = value
                    .attr("src")
                    .into_iter()
                    .chain(value.attr("srcset").into_iter().flat_map(srcset_urls));
                for url in candidates {
                    let kind = if in_picture {
                        Some(AssetKind::Image)
                    } else {
                        resolve_url(base, url)
                            .and_then(|u| kind_from_extension(&u))
                            .filter(|k| *k == AssetKind::Image)
                    };
                    if let Some(kind) = kind {
                        collector.push(url, kind);
                    }
                }
            }
            "video" => {
                if let Some(poster) = value.attr("poster") {
                    collector.push(poster, AssetKind::Image);
                }
            }
            "link" => {
                if let Some(href) = value.attr("href")
                    && let Some(kind) = link_kind(&element, href)
                {
                    collector.push(href, kind);
                }
            }
            "script" => {
                if let Some(src) = value.attr("src") {
                    collector.push(src, AssetKind::Script);
                }
            }
            "a" => {
                if let Some(href) = value.attr("href")
                    && let Some(url) = resolve_url(base, href)
                    && kind_from_extension(&url) == Some(AssetKind::Document)
                {
                    collector.push(href, AssetKind::Document);
                }
            }
            "style" => {
                let css: String = element.text().collect();
                collector.push_css(&css, base);
            }
            _ => {}
        }

        if let Some(style) = value.attr("style") {
            collector.push_css(style, base);
        }
    }

    for sheet in &dom.stylesheets {
        collector.push_relative(base, &sheet.url, AssetKind::Stylesheet);
        collector.push_css(&sheet.text, &sheet.url);
    }

    Ok(collector.refs)
}

/// Site-level asset list keyed by normalised URL. Pages are added in
/// discovery order so referrers stay in that order.
#[derive(Debug, Default)]
pub struct AssetAccumulator {
    index: HashMap<String, usize>,
    assets: Vec<Asset>,
}

impl AssetAccumulator {
    pub fn add(&mut self, page_url: &str, refs: &[AssetRef]) {
        for asset_ref in refs {
            let i = match self.index.get(&asset_ref.url) {
                Some(&i) => i,
                None => {
                    self.index.insert(asset_ref.url.clone(), self.assets.len());
                    self.assets.push(Asset {
                        url: asset_ref.url.clone(),
                        kind: asset_ref.kind,
                        size: None,
                        content_type: None,
                        referrers: Vec::new(),
                    });
                    self.assets.len() - 1
                }
            };
            let referrers = &mut self.assets[i].referrers;
            if !referrers.iter().any(|r| r == page_url) {
                referrers.push(page_url.to_string());
            }
        }
    }

    pub fn finish(self) -> Vec<Asset> {
        self.assets
    }
}

/// Attach probe results to the first `outcomes.len()` assets.
pub fn apply_probe_outcomes(assets: &mut [Asset], outcomes: Vec<ProbeOutcome>) {
    for (asset, outcome) in assets.iter_mut().zip(outcomes) {
        asset.size = outcome.size;
        asset.content_type = outcome.content_type;
    }
}
