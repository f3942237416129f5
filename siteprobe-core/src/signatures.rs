// Declarative technology signature table shared by stack and integration detection

use crate::error::StageError;
use crate::model::{TechCategory, TechSignature};
use crate::signals::PageSignals;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

use Channel::*;
use TechCategory::*;

const MAX_EVIDENCE: usize = 10;
const MAX_EVIDENCE_VALUE: usize = 120;

/// Where a rule looks for its pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    ClassName,
    MetaGenerator,
    ScriptUrl,
    StylesheetUrl,
    /// Exact global symbol name, probed in the page by the renderer.
    Global,
    Header,
    InlineScript,
    IframeSrc,
    Markup,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClassName => "class",
            MetaGenerator => "meta-generator",
            ScriptUrl => "script",
            StylesheetUrl => "stylesheet",
            Global => "global",
            Header => "header",
            InlineScript => "inline-script",
            IframeSrc => "iframe",
            Markup => "markup",
        }
    }

    /// Channels whose matched value is a resource URL.
    pub fn is_url(&self) -> bool {
        matches!(self, ScriptUrl | StylesheetUrl | IframeSrc)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignatureRule {
    pub name: &'static str,
    pub category: TechCategory,
    pub channel: Channel,
    /// Case-insensitive regex, or the exact symbol for `Global` rules.
    pub pattern: &'static str,
    pub confidence: f32,
}

const fn rule(
    name: &'static str,
    category: TechCategory,
    channel: Channel,
    pattern: &'static str,
    confidence: f32,
) -> SignatureRule {
    SignatureRule {
        name,
        category,
        channel,
        pattern,
        confidence,
    }
}

pub const SIGNATURES: &[SignatureRule] = &[
    // CSS frameworks
    rule("Bootstrap", CssFramework, StylesheetUrl, r"bootstrap(\.min)?\.css", 0.9),
    rule("Bootstrap", CssFramework, ScriptUrl, r"bootstrap(\.bundle)?(\.min)?\.js", 0.9),
    rule("Bootstrap", CssFramework, ClassName, r"^col-(xs|sm|md|lg|xl|xxl)-\d{1,2}$", 0.6),
    rule("Bootstrap", CssFramework, ClassName, r"^navbar-expand(-[a-z]+)?$", 0.7),
    rule("Bootstrap", CssFramework, Global, "bootstrap", 0.8),
    rule("Tailwind CSS", CssFramework, StylesheetUrl, r"tailwind", 0.9),
    rule("Tailwind CSS", CssFramework, ScriptUrl, r"cdn\.tailwindcss\.com", 0.95),
    rule("Tailwind CSS", CssFramework, ClassName, r"^(sm|md|lg|xl|2xl|hover|focus):[a-z]", 0.6),
    rule("Tailwind CSS", CssFramework, ClassName, r"^(bg|text|border)-(slate|gray|zinc|neutral|stone|red|orange|amber|yellow|lime|green|emerald|teal|cyan|sky|blue|indigo|violet|purple|fuchsia|pink|rose)-\d{2,3}$", 0.7),
    rule("Bulma", CssFramework, StylesheetUrl, r"bulma(\.min)?\.css", 0.9),
    rule("Foundation", CssFramework, StylesheetUrl, r"foundation(\.min)?\.css", 0.9),
    rule("Foundation", CssFramework, Global, "Foundation", 0.8),
    rule("Materialize", CssFramework, StylesheetUrl, r"materialize(\.min)?\.css", 0.9),
    // JavaScript libraries
    rule("jQuery", JsLibrary, ScriptUrl, r"jquery([-.]?\d[\d.]*)?(\.slim)?(\.min)?\.js", 0.9),
    rule("jQuery", JsLibrary, Global, "jQuery", 0.95),
    rule("jQuery UI", JsLibrary, ScriptUrl, r"jquery-ui(\.min)?\.js", 0.9),
    rule("React", JsLibrary, ScriptUrl, r"react(-dom)?(\.production)?(\.min)?\.js", 0.9),
    rule("React", JsLibrary, Global, "React", 0.9),
    rule("React", JsLibrary, Markup, r"data-reactroot", 0.8),
    rule("Vue.js", JsLibrary, ScriptUrl, r"vue(\.runtime)?(\.global)?(\.prod)?(\.min)?\.js", 0.9),
    rule("Vue.js", JsLibrary, Global, "Vue", 0.9),
    rule("Vue.js", JsLibrary, Markup, r"data-v-[0-9a-f]{8}", 0.8),
    rule("Angular", JsLibrary, Markup, r#"ng-version="[\d.]+""#, 0.9),
    rule("AngularJS", JsLibrary, ScriptUrl, r"angular(\.min)?\.js", 0.9),
    rule("AngularJS", JsLibrary, Global, "angular", 0.9),
    rule("Next.js", JsLibrary, ScriptUrl, r"/_next/static/", 0.9),
    rule("Next.js", JsLibrary, Global, "__NEXT_DATA__", 0.95),
    rule("Nuxt.js", JsLibrary, ScriptUrl, r"/_nuxt/", 0.9),
    rule("Nuxt.js", JsLibrary, Global, "__NUXT__", 0.95),
    rule("Alpine.js", JsLibrary, Global, "Alpine", 0.9),
    rule("Alpine.js", JsLibrary, Markup, r#"\sx-data="#, 0.7),
    rule("GSAP", JsLibrary, Global, "gsap", 0.9),
    rule("Swiper", JsLibrary, Global, "Swiper", 0.9),
    rule("Swiper", JsLibrary, StylesheetUrl, r"swiper(-bundle)?(\.min)?\.css", 0.8),
    rule("MooTools", JsLibrary, Global, "MooTools", 0.9),
    rule("Prototype", JsLibrary, ScriptUrl, r"prototype(\.min)?\.js", 0.8),
    // Analytics
    rule("Google Analytics", Analytics, ScriptUrl, r"google-analytics\.com/(analytics|ga)\.js", 0.95),
    rule("Google Analytics", Analytics, ScriptUrl, r"googletagmanager\.com/gtag/js", 0.95),
    rule("Google Analytics", Analytics, Global, "gtag", 0.8),
    rule("Google Tag Manager", Analytics, ScriptUrl, r"googletagmanager\.com/gtm\.js", 0.95),
    rule("Google Tag Manager", Analytics, InlineScript, r"GTM-[A-Z0-9]{4,}", 0.8),
    rule("Google Tag Manager", Analytics, Global, "google_tag_manager", 0.9),
    rule("Hotjar", Analytics, ScriptUrl, r"static\.hotjar\.com", 0.95),
    rule("Hotjar", Analytics, Global, "hj", 0.6),
    rule("Plausible", Analytics, ScriptUrl, r"plausible\.io/js", 0.95),
    rule("Matomo", Analytics, ScriptUrl, r"(matomo|piwik)\.js", 0.9),
    rule("Matomo", Analytics, InlineScript, r"_paq\.push", 0.8),
    rule("Segment", Analytics, ScriptUrl, r"cdn\.segment\.com", 0.95),
    rule("Mixpanel", Analytics, ScriptUrl, r"cdn\.mxpnl\.com", 0.95),
    rule("Mixpanel", Analytics, Global, "mixpanel", 0.8),
    // Content management
    rule("WordPress", Cms, MetaGenerator, r"^WordPress", 0.95),
    rule("WordPress", Cms, ScriptUrl, r"/wp-(content|includes)/", 0.9),
    rule("WordPress", Cms, StylesheetUrl, r"/wp-(content|includes)/", 0.9),
    rule("WordPress", Cms, ClassName, r"^wp-block-", 0.7),
    rule("WordPress", Cms, Header, r"^link: .*api\.w\.org", 0.9),
    rule("Drupal", Cms, MetaGenerator, r"^Drupal", 0.95),
    rule("Drupal", Cms, Global, "Drupal", 0.9),
    rule("Drupal", Cms, Header, r"^x-drupal-", 0.9),
    rule("Joomla", Cms, MetaGenerator, r"^Joomla", 0.95),
    rule("Shopify", Cms, ScriptUrl, r"cdn\.shopify\.com", 0.9),
    rule("Shopify", Cms, Global, "Shopify", 0.95),
    rule("Shopify", Cms, Header, r"^x-shopid:", 0.9),
    rule("Wix", Cms, MetaGenerator, r"^Wix\.com", 0.95),
    rule("Wix", Cms, Header, r"^x-wix-request-id:", 0.9),
    rule("Squarespace", Cms, ScriptUrl, r"static1\.squarespace\.com", 0.9),
    rule("Squarespace", Cms, MetaGenerator, r"^Squarespace", 0.95),
    rule("Webflow", Cms, MetaGenerator, r"^Webflow", 0.95),
    rule("Webflow", Cms, Markup, r"data-wf-page=", 0.9),
    rule("Ghost", Cms, MetaGenerator, r"^Ghost", 0.95),
    rule("Hugo", Cms, MetaGenerator, r"^Hugo", 0.9),
    rule("Gatsby", Cms, MetaGenerator, r"^Gatsby", 0.9),
    rule("Gatsby", Cms, Markup, r#"id="___gatsby""#, 0.9),
    // Chat widgets
    rule("Intercom", ChatWidget, ScriptUrl, r"widget\.intercom\.io|js\.intercomcdn\.com", 0.95),
    rule("Intercom", ChatWidget, Global, "Intercom", 0.9),
    rule("Drift", ChatWidget, ScriptUrl, r"js\.driftt\.com", 0.95),
    rule("Zendesk Chat", ChatWidget, ScriptUrl, r"static\.zdassets\.com", 0.9),
    rule("Zendesk Chat", ChatWidget, Global, "zE", 0.8),
    rule("Crisp", ChatWidget, ScriptUrl, r"client\.crisp\.chat", 0.95),
    rule("Tawk.to", ChatWidget, ScriptUrl, r"embed\.tawk\.to", 0.95),
    rule("HubSpot Chat", ChatWidget, ScriptUrl, r"js\.(hs-scripts|usemessages)\.com", 0.9),
    // Payments
    rule("Stripe", Payment, ScriptUrl, r"js\.stripe\.com", 0.95),
    rule("Stripe", Payment, IframeSrc, r"js\.stripe\.com", 0.95),
    rule("Stripe", Payment, Global, "Stripe", 0.9),
    rule("PayPal", Payment, ScriptUrl, r"paypal\.com/sdk/js|paypalobjects\.com", 0.95),
    rule("PayPal", Payment, IframeSrc, r"paypal\.com", 0.9),
    rule("Square", Payment, ScriptUrl, r"(squarecdn|squareup)\.com", 0.9),
    rule("Braintree", Payment, ScriptUrl, r"js\.braintreegateway\.com", 0.95),
    // Tracking pixels
    rule("Meta Pixel", TrackingPixel, ScriptUrl, r"connect\.facebook\.net/.+/fbevents\.js", 0.95),
    rule("Meta Pixel", TrackingPixel, Global, "fbq", 0.9),
    rule("Meta Pixel", TrackingPixel, Markup, r"facebook\.com/tr\?id=", 0.9),
    rule("LinkedIn Insight", TrackingPixel, ScriptUrl, r"snap\.licdn\.com", 0.95),
    rule("TikTok Pixel", TrackingPixel, ScriptUrl, r"analytics\.tiktok\.com", 0.95),
    rule("X Pixel", TrackingPixel, ScriptUrl, r"static\.ads-twitter\.com", 0.95),
    // Maps
    rule("Google Maps", Maps, IframeSrc, r"google\.[a-z.]+/maps", 0.95),
    rule("Google Maps", Maps, ScriptUrl, r"maps\.googleapis\.com", 0.95),
    rule("Mapbox", Maps, ScriptUrl, r"api\.mapbox\.com", 0.95),
    rule("Mapbox", Maps, StylesheetUrl, r"api\.mapbox\.com", 0.9),
    // Video
    rule("YouTube", Video, IframeSrc, r"youtube(-nocookie)?\.com/embed", 0.95),
    rule("Vimeo", Video, IframeSrc, r"player\.vimeo\.com", 0.95),
    rule("Wistia", Video, ScriptUrl, r"fast\.wistia\.(com|net)", 0.95),
    // Scheduling
    rule("Calendly", Scheduling, ScriptUrl, r"assets\.calendly\.com", 0.95),
    rule("Calendly", Scheduling, IframeSrc, r"calendly\.com", 0.95),
    // Hosted forms
    rule("HubSpot Forms", Forms, ScriptUrl, r"js\.hsforms\.net", 0.95),
    rule("Typeform", Forms, ScriptUrl, r"embed\.typeform\.com", 0.95),
    rule("Typeform", Forms, IframeSrc, r"typeform\.com", 0.9),
    rule("Mailchimp", Forms, Markup, r"list-manage\.com/subscribe", 0.9),
];

/// One rule firing on one page.
#[derive(Debug, Clone, PartialEq)]
pub struct SignatureMatch {
    pub name: &'static str,
    pub category: TechCategory,
    pub channel: Channel,
    pub value: String,
    pub confidence: f32,
}

impl SignatureMatch {
    pub fn evidence(&self) -> String {
        let mut value = self.value.trim().to_string();
        if value.len() > MAX_EVIDENCE_VALUE {
            let mut end = MAX_EVIDENCE_VALUE;
            while !value.is_char_boundary(end) {
                end -= 1;
            }
            value.truncate(end);
        }
        format!("{}: {}", self.channel.as_str(), value)
    }
}

struct CompiledRule {
    rule: SignatureRule,
    regex: Option<Regex>,
}

pub struct SignatureTable {
    rules: Vec<CompiledRule>,
}

impl SignatureTable {
    pub fn new(rules: &[SignatureRule]) -> Result<Self, StageError> {
        let rules = rules
            .iter()
            .map(|rule| {
                let regex = match rule.channel {
                    Global => None,
                    _ => Some(
                        Regex::new(&format!("(?i){}", rule.pattern))
                            .map_err(|e| StageError::Signature(format!("{}: {}", rule.name, e)))?,
                    ),
                };
                Ok(CompiledRule { rule: *rule, regex })
            })
            .collect::<Result<Vec<_>, StageError>>()?;
        Ok(Self { rules })
    }

    /// The built-in table, compiled once.
    pub fn builtin() -> &'static SignatureTable {
        static TABLE: OnceLock<SignatureTable> = OnceLock::new();
        TABLE.get_or_init(|| SignatureTable::new(SIGNATURES).expect("built-in signature table"))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Global symbols a renderer should probe for, deduplicated.
    pub fn global_probes(&self) -> Vec<String> {
        let mut probes: Vec<String> = Vec::new();
        for compiled in &self.rules {
            if compiled.rule.channel == Global
                && !probes.iter().any(|p| p == compiled.rule.pattern)
            {
                probes.push(compiled.rule.pattern.to_string());
            }
        }
        probes
    }

    /// Every rule in table order that fires on the page, restricted to the
    /// categories `include` accepts. A rule fires at most once per page.
    pub fn matches<F>(&self, signals: &PageSignals, include: F) -> Vec<SignatureMatch>
    where
        F: Fn(TechCategory) -> bool,
    {
        let mut found = Vec::new();

        for compiled in &self.rules {
            let rule = &compiled.rule;
            if !include(rule.category) {
                continue;
            }

            let value = match (&compiled.regex, rule.channel) {
                (None, _) => signals
                    .globals
                    .iter()
                    .find(|g| g.as_str() == rule.pattern)
                    .cloned(),
                (Some(regex), ClassName) => find_whole(regex, signals.class_names.iter()),
                (Some(regex), MetaGenerator) => find_whole(regex, signals.meta_generators.iter()),
                (Some(regex), ScriptUrl) => find_whole(regex, signals.script_urls.iter()),
                (Some(regex), StylesheetUrl) => find_whole(regex, signals.stylesheet_urls.iter()),
                (Some(regex), IframeSrc) => find_whole(regex, signals.iframe_sources.iter()),
                (Some(regex), Header) => find_whole(regex, signals.headers.iter()),
                (Some(regex), InlineScript) => find_fragment(regex, signals.inline_scripts.iter()),
                (Some(regex), Markup) => find_fragment(regex, std::iter::once(&signals.markup)),
                (Some(_), Global) => None,
            };

            if let Some(value) = value {
                found.push(SignatureMatch {
                    name: rule.name,
                    category: rule.category,
                    channel: rule.channel,
                    value,
                    confidence: rule.confidence,
                });
            }
        }

        found
    }
}

fn find_whole<'a>(regex: &Regex, mut values: impl Iterator<Item = &'a String>) -> Option<String> {
    values.find(|v| regex.is_match(v)).cloned()
}

fn find_fragment<'a>(regex: &Regex, values: impl Iterator<Item = &'a String>) -> Option<String> {
    values
        .filter_map(|v| regex.find(v))
        .map(|m| m.as_str().to_string())
        .next()
}

/// Fold matches into one signature per technology: highest confidence wins,
/// evidence is kept once per distinct observation.
pub fn merge_matches(matches: &[SignatureMatch]) -> Vec<TechSignature> {
    let mut merged: BTreeMap<(TechCategory, &str), TechSignature> = BTreeMap::new();

    for found in matches {
        let signature = merged
            .entry((found.category, found.name))
            .or_insert_with(|| TechSignature {
                name: found.name.to_string(),
                category: found.category,
                confidence: 0.0,
                evidence: Vec::new(),
            });
        signature.confidence = signature.confidence.max(found.confidence);
        let evidence = found.evidence();
        if signature.evidence.len() < MAX_EVIDENCE && !signature.evidence.contains(&evidence) {
            signature.evidence.push(evidence);
        }
    }

    merged.into_values().collect()
}
