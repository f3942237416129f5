// Design token extraction: colors, fonts and UI patterns

use crate::color::{Rgb, colors_in_value, delta_e};
use crate::error::{StageError, selector};
use crate::model::{ColorSwatch, DesignSystem, FontUsage};
use crate::patterns::detect_patterns;
use scraper::Html;
use siteprobe_scanner::DomSnapshot;
use std::collections::{BTreeSet, HashMap};

/// Properties whose value is a single color.
const COLOR_PROPERTIES: &[&str] = &[
    "color",
    "background-color",
    "border-color",
    "border-top-color",
    "border-right-color",
    "border-bottom-color",
    "border-left-color",
    "outline-color",
    "fill",
    "stroke",
];

/// Shorthands that may embed a color among other tokens.
const SHORTHAND_PROPERTIES: &[&str] = &[
    "background",
    "border",
    "border-top",
    "border-right",
    "border-bottom",
    "border-left",
    "outline",
];

const MAX_SELECTORS_PER_SWATCH: usize = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct ColorTally {
    pub rgb: Rgb,
    pub hex: String,
    pub count: usize,
    pub selectors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontTally {
    pub family: String,
    pub weight: u16,
    pub count: usize,
}

/// Raw design observations for one page, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DesignSample {
    pub colors: Vec<ColorTally>,
    pub fonts: Vec<FontTally>,
    pub patterns: BTreeSet<String>,
    pub inline_style_count: usize,
}

/// First family of a `font-family` list, unquoted.
pub fn primary_family(value: &str) -> Option<String> {
    let first = value.split(',').next()?.trim();
    let unquoted = first.trim_matches(|c| c == '"' || c == '\'').trim();
    if unquoted.is_empty() || matches!(unquoted, "inherit" | "initial" | "unset") {
        None
    } else {
        Some(unquoted.to_string())
    }
}

pub fn normalize_weight(value: Option<&str>) -> u16 {
    match value.map(|v| v.trim().to_ascii_lowercase()) {
        None => 400,
        Some(v) => match v.as_str() {
            "normal" => 400,
            "bold" | "bolder" => 700,
            "lighter" => 300,
            other => other
                .parse::<f32>()
                .ok()
                .filter(|w| (1.0..=1000.0).contains(w))
                .map(|w| w.round() as u16)
                .unwrap_or(400),
        },
    }
}

/// Pull colors, fonts and patterns out of one rendered page.
pub fn extract_design(
    dom: &DomSnapshot,
    min_pattern_repetition: usize,
) -> Result<DesignSample, StageError> {
    let mut colors: Vec<ColorTally> = Vec::new();
    let mut color_index: HashMap<String, usize> = HashMap::new();
    let mut fonts: Vec<FontTally> = Vec::new();
    let mut font_index: HashMap<(String, u16), usize> = HashMap::new();

    for element in dom.styles.iter().filter(|e| e.visible) {
        for (name, value) in &element.properties {
            let name = name.as_str();
            let found = if COLOR_PROPERTIES.contains(&name) || SHORTHAND_PROPERTIES.contains(&name)
            {
                colors_in_value(value)
            } else {
                continue;
            };

            for rgb in found {
                let hex = rgb.to_hex();
                let index = *color_index.entry(hex.clone()).or_insert_with(|| {
                    colors.push(ColorTally {
                        rgb,
                        hex,
                        count: 0,
                        selectors: Vec::new(),
                    });
                    colors.len() - 1
                });
                let tally = &mut colors[index];
                tally.count += 1;
                if tally.selectors.len() < MAX_SELECTORS_PER_SWATCH
                    && !tally.selectors.contains(&element.selector)
                {
                    tally.selectors.push(element.selector.clone());
                }
            }
        }

        if let Some(family) = element.property("font-family").and_then(primary_family) {
            let weight = normalize_weight(element.property("font-weight"));
            let key = (family.to_ascii_lowercase(), weight);
            let index = *font_index.entry(key).or_insert_with(|| {
                fonts.push(FontTally {
                    family,
                    weight,
                    count: 0,
                });
                fonts.len() - 1
            });
            fonts[index].count += 1;
        }
    }

    let document = Html::parse_document(&dom.html);
    let inline_style_count = document.select(&selector("[style]")?).count();
    let patterns = detect_patterns(&document, min_pattern_repetition);

    Ok(DesignSample {
        colors,
        fonts,
        patterns,
        inline_style_count,
    })
}

/// Group exact colors into swatches. Candidates are visited most frequent
/// first, so each swatch is represented by its most used exact value and no
/// two representatives end up closer than `threshold`. Ties keep input order.
pub fn cluster_colors(tallies: &[ColorTally], threshold: f64) -> Vec<ColorSwatch> {
    struct Cluster {
        representative: Rgb,
        first_seen: usize,
        swatch: ColorSwatch,
    }

    let mut order: Vec<usize> = (0..tallies.len()).collect();
    order.sort_by(|a, b| tallies[*b].count.cmp(&tallies[*a].count).then(a.cmp(b)));

    let mut clusters: Vec<Cluster> = Vec::new();
    for index in order {
        let tally = &tallies[index];
        let nearest = clusters
            .iter()
            .enumerate()
            .map(|(i, c)| (i, delta_e(&c.representative, &tally.rgb)))
            .filter(|(_, distance)| *distance < threshold)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _)| i);

        match nearest {
            Some(i) => {
                let cluster = &mut clusters[i];
                cluster.first_seen = cluster.first_seen.min(index);
                cluster.swatch.usage_count += tally.count;
                cluster.swatch.members.push(tally.hex.clone());
                for selector in &tally.selectors {
                    if cluster.swatch.selectors.len() >= MAX_SELECTORS_PER_SWATCH {
                        break;
                    }
                    if !cluster.swatch.selectors.contains(selector) {
                        cluster.swatch.selectors.push(selector.clone());
                    }
                }
            }
            None => clusters.push(Cluster {
                representative: tally.rgb,
                first_seen: index,
                swatch: ColorSwatch {
                    hex: tally.hex.clone(),
                    usage_count: tally.count,
                    selectors: tally.selectors.clone(),
                    members: vec![tally.hex.clone()],
                },
            }),
        }
    }

    clusters.sort_by(|a, b| {
        b.swatch
            .usage_count
            .cmp(&a.swatch.usage_count)
            .then(a.first_seen.cmp(&b.first_seen))
    });
    clusters.into_iter().map(|c| c.swatch).collect()
}

/// Sums per-page samples into the site design system. Pages must be added in
/// discovery order for ties to resolve by first sighting.
#[derive(Debug, Default)]
pub struct DesignAccumulator {
    colors: Vec<ColorTally>,
    color_index: HashMap<String, usize>,
    fonts: Vec<FontTally>,
    font_index: HashMap<(String, u16), usize>,
    patterns: BTreeSet<String>,
    inline_style_count: usize,
}

impl DesignAccumulator {
    pub fn add(&mut self, sample: &DesignSample) {
        for tally in &sample.colors {
            match self.color_index.get(&tally.hex) {
                Some(&i) => {
                    let existing = &mut self.colors[i];
                    existing.count += tally.count;
                    for selector in &tally.selectors {
                        if existing.selectors.len() < MAX_SELECTORS_PER_SWATCH
                            && !existing.selectors.contains(selector)
                        {
                            existing.selectors.push(selector.clone());
                        }
                    }
                }
                None => {
                    self.color_index.insert(tally.hex.clone(), self.colors.len());
                    self.colors.push(tally.clone());
                }
            }
        }

        for font in &sample.fonts {
            let key = (font.family.to_ascii_lowercase(), font.weight);
            match self.font_index.get(&key) {
                Some(&i) => self.fonts[i].count += font.count,
                None => {
                    self.font_index.insert(key, self.fonts.len());
                    self.fonts.push(font.clone());
                }
            }
        }

        self.patterns.extend(sample.patterns.iter().cloned());
        self.inline_style_count += sample.inline_style_count;
    }

    pub fn finish(self, threshold: f64) -> DesignSystem {
        let mut fonts: Vec<(usize, FontTally)> = self.fonts.into_iter().enumerate().collect();
        fonts.sort_by(|a, b| b.1.count.cmp(&a.1.count).then(a.0.cmp(&b.0)));

        DesignSystem {
            colors: cluster_colors(&self.colors, threshold),
            fonts: fonts
                .into_iter()
                .map(|(_, f)| FontUsage {
                    family: f.family,
                    weight: f.weight,
                    usage_count: f.count,
                })
                .collect(),
            patterns: self.patterns,
            inline_style_count: self.inline_style_count,
        }
    }
}
