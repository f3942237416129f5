// Structural heuristics for recurring UI components

use scraper::{ElementRef, Html};
use std::collections::{BTreeSet, HashMap};

pub const CARD: &str = "card";
pub const GALLERY: &str = "gallery";
pub const ACCORDION: &str = "accordion";
pub const NAVIGATION_MENU: &str = "navigation-menu";
pub const TABS: &str = "tabs";
pub const MODAL: &str = "modal";

const HEADINGS: &[&str] = &["h1", "h2", "h3", "h4", "h5", "h6"];
const MEDIA: &[&str] = &["img", "picture", "video"];

/// What a sibling contains, used as part of its similarity key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
struct Shape {
    media: bool,
    heading: bool,
    paragraph: bool,
    action: bool,
    disclosure: bool,
    tab: bool,
}

impl Shape {
    fn of(element: &ElementRef) -> Self {
        let mut shape = Shape {
            tab: element.value().attr("role") == Some("tab"),
            ..Shape::default()
        };
        for node in element.descendants().filter_map(ElementRef::wrap) {
            let value = node.value();
            let tag = value.name();
            if MEDIA.contains(&tag) {
                shape.media = true;
            } else if HEADINGS.contains(&tag) {
                shape.heading |= has_text(&node);
            } else if tag == "p" {
                shape.paragraph |= has_text(&node);
            } else if tag == "button" || (tag == "a" && value.attr("href").is_some()) {
                shape.action = true;
            }
            if value.attr("aria-expanded").is_some() || tag == "summary" {
                shape.disclosure = true;
            }
            if value.attr("role") == Some("tab") {
                shape.tab = true;
            }
        }
        shape
    }
}

fn has_text(element: &ElementRef) -> bool {
    element.text().any(|t| !t.trim().is_empty())
}

fn in_navigation(element: &ElementRef) -> bool {
    std::iter::once(*element)
        .chain(element.ancestors().filter_map(ElementRef::wrap))
        .any(|e| e.value().name() == "nav" || e.value().attr("role") == Some("navigation"))
}

fn is_modal(element: &ElementRef) -> bool {
    let value = element.value();
    value.name() == "dialog"
        || matches!(value.attr("role"), Some("dialog") | Some("alertdialog"))
        || value.attr("aria-modal") == Some("true")
}

fn classify(tag: &str, shape: &Shape, parent: &ElementRef) -> Option<&'static str> {
    if shape.tab {
        return Some(TABS);
    }
    if tag == "details" || (shape.disclosure && (shape.heading || shape.paragraph)) {
        return Some(ACCORDION);
    }
    if in_navigation(parent) {
        return if shape.action && matches!(tag, "li" | "a") {
            Some(NAVIGATION_MENU)
        } else {
            None
        };
    }
    if tag == "img" || (shape.media && !shape.heading && !shape.paragraph) {
        return Some(GALLERY);
    }
    if (shape.media && (shape.heading || shape.paragraph))
        || (shape.heading && shape.paragraph && shape.action)
    {
        return Some(CARD);
    }
    None
}

/// Label the recurring components of a document. Structural patterns need
/// at least `min_repetition` similar siblings; modals only need an explicit
/// dialog declaration.
pub fn detect_patterns(document: &Html, min_repetition: usize) -> BTreeSet<String> {
    let mut patterns = BTreeSet::new();

    for element in document.root_element().descendants().filter_map(ElementRef::wrap) {
        if is_modal(&element) {
            patterns.insert(MODAL.to_string());
        }

        let children: Vec<ElementRef> = element.children().filter_map(ElementRef::wrap).collect();
        if children.len() < min_repetition {
            continue;
        }

        let mut groups: HashMap<(String, String, Shape), usize> = HashMap::new();
        for child in &children {
            let value = child.value();
            let mut classes: Vec<&str> = value.classes().collect();
            classes.sort_unstable();
            let key = (value.name().to_string(), classes.join(" "), Shape::of(child));
            *groups.entry(key).or_insert(0) += 1;
        }

        for ((tag, _, shape), count) in groups {
            if count < min_repetition {
                continue;
            }
            if let Some(label) = classify(&tag, &shape, &element) {
                patterns.insert(label.to_string());
            }
        }
    }

    patterns
}
