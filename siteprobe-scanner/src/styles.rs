// Style data recoverable from static HTML, used when no browser computed styles exist

use crate::renderer::MAX_STYLESHEETS;
use crate::result::{StyleOrigin, StyledElement};
use crate::urls::resolve_url;
use regex::Regex;
use scraper::{ElementRef, Html};
use std::collections::BTreeMap;
use std::sync::OnceLock;

const INVISIBLE_CONTAINERS: &[&str] = &["head", "script", "noscript", "template", "style"];

fn css_rule_regex() -> &'static Regex {
    static RULE: OnceLock<Regex> = OnceLock::new();
    RULE.get_or_init(|| Regex::new(r"([^{}]+)\{([^{}]*)\}").expect("static regex"))
}

fn css_comment_regex() -> &'static Regex {
    static COMMENT: OnceLock<Regex> = OnceLock::new();
    COMMENT.get_or_init(|| Regex::new(r"(?s)/\*.*?\*/").expect("static regex"))
}

/// Parse a CSS declaration block (`color: red; font-weight: bold`).
pub fn parse_declarations(block: &str) -> BTreeMap<String, String> {
    let mut properties = BTreeMap::new();
    for declaration in block.split(';') {
        if let Some((name, value)) = declaration.split_once(':') {
            let name = name.trim().to_ascii_lowercase();
            let value = value.trim().trim_end_matches("!important").trim();
            if !name.is_empty() && !value.is_empty() {
                properties.insert(name, value.to_string());
            }
        }
    }
    properties
}

/// Short selector describing an element: `tag#id.class1.class2`.
pub fn describe_element(element: &ElementRef) -> String {
    let value = element.value();
    let mut selector = value.name().to_string();
    if let Some(id) = value.id() {
        selector.push('#');
        selector.push_str(id);
    }
    for class in value.classes().take(3) {
        selector.push('.');
        selector.push_str(class);
    }
    selector
}

fn hides_itself(element: &ElementRef) -> bool {
    let value = element.value();
    if value.attr("hidden").is_some() || INVISIBLE_CONTAINERS.contains(&value.name()) {
        return true;
    }
    if let Some(style) = value.attr("style") {
        let properties = parse_declarations(style);
        let display_none = properties.get("display").is_some_and(|v| v == "none");
        let visibility_hidden = properties
            .get("visibility")
            .is_some_and(|v| v == "hidden" || v == "collapse");
        return display_none || visibility_hidden;
    }
    false
}

/// Visible unless the element or one of its ancestors is hidden.
pub fn is_visible(element: &ElementRef) -> bool {
    if hides_itself(element) {
        return false;
    }
    !element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .any(|ancestor| hides_itself(&ancestor))
}

fn presentational_properties(element: &ElementRef) -> BTreeMap<String, String> {
    let value = element.value();
    let mut properties = BTreeMap::new();
    if let Some(color) = value.attr("color") {
        properties.insert("color".to_string(), color.trim().to_string());
    }
    if let Some(bgcolor) = value.attr("bgcolor") {
        properties.insert("background-color".to_string(), bgcolor.trim().to_string());
    }
    if let Some(face) = value.attr("face") {
        properties.insert("font-family".to_string(), face.trim().to_string());
    }
    properties
}

/// Elements carrying `style` or presentational attributes.
pub fn extract_inline_styles(document: &Html) -> Vec<StyledElement> {
    let mut styled = Vec::new();

    for element in document.root_element().descendants().filter_map(ElementRef::wrap) {
        let mut properties = presentational_properties(&element);
        let style_attr = element.value().attr("style");
        if let Some(style) = style_attr {
            properties.extend(parse_declarations(style));
        }
        if properties.is_empty() {
            continue;
        }

        styled.push(StyledElement {
            selector: describe_element(&element),
            tag: element.value().name().to_string(),
            visible: is_visible(&element),
            inline: style_attr.is_some(),
            origin: StyleOrigin::Inline,
            properties,
        });
    }

    styled
}

/// Flat rules from a CSS text. At-rule preludes are skipped, rules nested
/// inside `@media` are kept.
pub fn parse_css_rules(css: &str) -> Vec<StyledElement> {
    let css = css_comment_regex().replace_all(css, "");
    let mut rules = Vec::new();
    for capture in css_rule_regex().captures_iter(&css) {
        let selector = capture[1].trim();
        if selector.is_empty() || selector.starts_with('@') {
            continue;
        }
        let properties = parse_declarations(&capture[2]);
        if properties.is_empty() {
            continue;
        }
        rules.push(StyledElement {
            selector: selector.split_whitespace().collect::<Vec<_>>().join(" "),
            tag: String::new(),
            visible: true,
            inline: false,
            origin: StyleOrigin::Stylesheet,
            properties,
        });
    }
    rules
}

/// Rules from every `<style>` block, in document order.
pub fn extract_stylesheet_rules(document: &Html) -> Vec<StyledElement> {
    let Ok(style_selector) = scraper::Selector::parse("style") else {
        return Vec::new();
    };
    document
        .select(&style_selector)
        .flat_map(|block| parse_css_rules(&block.text().collect::<String>()))
        .collect()
}

/// Absolute URLs of `<link rel="stylesheet">` elements, deduplicated and
/// capped at [`MAX_STYLESHEETS`].
pub fn linked_stylesheets(html: &str, base_url: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let Ok(link_selector) = scraper::Selector::parse("link[rel][href]") else {
        return Vec::new();
    };

    let mut urls: Vec<String> = Vec::new();
    for link in document.select(&link_selector) {
        let value = link.value();
        let is_stylesheet = value
            .attr("rel")
            .is_some_and(|rel| rel.split_whitespace().any(|r| r.eq_ignore_ascii_case("stylesheet")));
        if !is_stylesheet {
            continue;
        }
        if let Some(url) = value.attr("href").and_then(|href| resolve_url(base_url, href))
            && !urls.contains(&url)
        {
            urls.push(url);
        }
        if urls.len() == MAX_STYLESHEETS {
            break;
        }
    }
    urls
}

/// Inline styles followed by stylesheet rules, in document order within each group.
pub fn extract_static_styles(html: &str) -> Vec<StyledElement> {
    let document = Html::parse_document(html);
    let mut styles = extract_inline_styles(&document);
    styles.extend(extract_stylesheet_rules(&document));
    styles
}
