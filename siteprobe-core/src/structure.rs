// Content outline and same-origin link discovery

use crate::error::{StageError, selector};
use crate::model::{OutlineKind, OutlineNode, StructureMap};
use scraper::{ElementRef, Html};
use siteprobe_scanner::DomSnapshot;
use siteprobe_scanner::urls::{is_same_origin, normalize_str, path_extension, resolve_url};
use std::collections::HashSet;

/// Link targets that are files rather than pages.
const NON_PAGE_EXTENSIONS: &[&str] = &[
    "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "csv", "txt", "zip", "gz", "rar", "jpg",
    "jpeg", "png", "gif", "webp", "svg", "ico", "mp3", "mp4", "webm", "mov", "css", "js", "json",
    "xml", "woff", "woff2", "ttf", "otf",
];

const MAX_LABEL_CHARS: usize = 120;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageStructure {
    pub title: Option<String>,
    pub map: StructureMap,
}

fn collapse_text(element: &ElementRef) -> String {
    let text = element.text().collect::<Vec<_>>().join(" ");
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.chars().take(MAX_LABEL_CHARS).collect()
}

/// Nest a flat pre-order list of nodes: each node becomes a child of the
/// closest preceding node with a smaller depth.
pub fn build_tree(flat: Vec<OutlineNode>) -> Vec<OutlineNode> {
    fn attach(roots: &mut Vec<OutlineNode>, node: OutlineNode) {
        match roots.last_mut() {
            Some(last) if last.depth < node.depth => attach(&mut last.children, node),
            _ => roots.push(node),
        }
    }

    let mut roots = Vec::new();
    for node in flat {
        attach(&mut roots, node);
    }
    roots
}

fn heading_outline(document: &Html, page_url: &str) -> Result<Vec<OutlineNode>, StageError> {
    let mut flat = Vec::new();
    for heading in document.select(&selector("h1, h2, h3, h4, h5, h6")?) {
        let label = collapse_text(&heading);
        if label.is_empty() {
            continue;
        }
        let depth = heading.value().name()[1..].parse::<u8>().unwrap_or(1);
        let url = heading
            .value()
            .id()
            .and_then(|id| normalize_str(page_url).map(|base| format!("{}#{}", base, id)));
        flat.push(OutlineNode {
            label,
            url,
            depth,
            kind: OutlineKind::Heading,
            children: Vec::new(),
        });
    }
    Ok(build_tree(flat))
}

fn navigation_outline(document: &Html, page_url: &str) -> Result<Vec<OutlineNode>, StageError> {
    let nav_selector = selector("nav, [role=navigation]")?;
    let link_selector = selector("a[href]")?;
    let mut flat = Vec::new();

    for nav in document.select(&nav_selector) {
        // Nested navs are covered by their outermost ancestor.
        let nested = nav.ancestors().filter_map(ElementRef::wrap).any(|a| {
            a.value().name() == "nav" || a.value().attr("role") == Some("navigation")
        });
        if nested {
            continue;
        }

        for link in nav.select(&link_selector) {
            let label = collapse_text(&link);
            if label.is_empty() {
                continue;
            }
            let lists = link
                .ancestors()
                .filter_map(ElementRef::wrap)
                .take_while(|a| *a != nav)
                .filter(|a| matches!(a.value().name(), "ul" | "ol"))
                .count();
            flat.push(OutlineNode {
                label,
                url: link
                    .value()
                    .attr("href")
                    .and_then(|href| resolve_url(page_url, href)),
                depth: lists.clamp(1, u8::MAX as usize) as u8,
                kind: OutlineKind::Navigation,
                children: Vec::new(),
            });
        }
    }

    Ok(build_tree(flat))
}

fn same_origin_links(
    document: &Html,
    page_url: &str,
    origin_url: &str,
) -> Result<Vec<String>, StageError> {
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for anchor in document.select(&selector("a[href], area[href]")?) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let Some(url) = resolve_url(page_url, href) else {
            continue;
        };
        if !is_same_origin(&url, origin_url) {
            continue;
        }
        if path_extension(&url).is_some_and(|ext| NON_PAGE_EXTENSIONS.contains(&ext.as_str())) {
            continue;
        }
        if seen.insert(url.clone()) {
            links.push(url);
        }
    }

    Ok(links)
}

/// Outline a page and list the links discovery may follow.
/// `origin_url` is the site root; only links sharing its origin are kept.
pub fn map_structure(dom: &DomSnapshot, origin_url: &str) -> Result<PageStructure, StageError> {
    let document = Html::parse_document(&dom.html);
    let page_url = if dom.final_url.is_empty() {
        dom.requested_url.as_str()
    } else {
        dom.final_url.as_str()
    };

    let title = document
        .select(&selector("title")?)
        .next()
        .map(|t| collapse_text(&t))
        .filter(|t| !t.is_empty());

    Ok(PageStructure {
        title,
        map: StructureMap {
            headings: heading_outline(&document, page_url)?,
            navigation: navigation_outline(&document, page_url)?,
            links: same_origin_links(&document, page_url, origin_url)?,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dom(html: &str) -> DomSnapshot {
        DomSnapshot {
            requested_url: "https://example.com/".to_string(),
            final_url: "https://example.com/".to_string(),
            html: html.to_string(),
            ..DomSnapshot::default()
        }
    }

    #[test]
    fn test_heading_tree() {
        let page = dom(r#"<title> Home  Page </title>
            <h1 id="top">Welcome</h1>
            <h2>Services</h2><h3>Design</h3>
            <h2>About</h2>
            <h4></h4>"#);

        let structure = map_structure(&page, "https://example.com/").unwrap();
        assert_eq!(structure.title.as_deref(), Some("Home Page"));

        let headings = &structure.map.headings;
        assert_eq!(headings.len(), 1);
        assert_eq!(headings[0].label, "Welcome");
        assert_eq!(headings[0].url.as_deref(), Some("https://example.com/#top"));
        assert_eq!(headings[0].children.len(), 2);
        assert_eq!(headings[0].children[0].children[0].label, "Design");
    }

    #[test]
    fn test_navigation_depth_follows_lists() {
        let page = dom(r#"<nav><ul>
            <li><a href="/services">Services</a>
                <ul><li><a href="/services/web">Web</a></li></ul>
            </li>
            <li><a href="/about">About</a></li>
        </ul></nav>"#);

        let structure = map_structure(&page, "https://example.com/").unwrap();
        let nav = &structure.map.navigation;
        assert_eq!(nav.len(), 2);
        assert_eq!(nav[0].label, "Services");
        assert_eq!(nav[0].depth, 1);
        assert_eq!(nav[0].children[0].label, "Web");
        assert_eq!(nav[0].children[0].depth, 2);
        assert_eq!(nav[1].url.as_deref(), Some("https://example.com/about"));
    }

    #[test]
    fn test_links_same_origin_deduped_in_order() {
        let page = dom(r##"
            <a href="/b">B</a>
            <a href="https://other.com/x">Other</a>
            <a href="/a#section">A</a>
            <a href="/b#again">B again</a>
            <a href="/brochure.pdf">PDF</a>
            <a href="mailto:hi@example.com">Mail</a>
            <a href="#top">Top</a>
            <a href="/a">A</a>"##);

        let structure = map_structure(&page, "https://example.com/").unwrap();
        assert_eq!(
            structure.map.links,
            vec!["https://example.com/b", "https://example.com/a"]
        );
    }

    #[test]
    fn test_build_tree_siblings_at_same_depth() {
        let node = |label: &str, depth| OutlineNode {
            label: label.to_string(),
            url: None,
            depth,
            kind: OutlineKind::Heading,
            children: Vec::new(),
        };
        let tree = build_tree(vec![node("a", 2), node("b", 2), node("c", 1)]);
        assert_eq!(tree.len(), 3);
    }
}
