// CSS color parsing, canonical hex form and CIE76 perceptual distance

use regex::Regex;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lab {
    pub l: f64,
    pub a: f64,
    pub b: f64,
}

const NAMED_COLORS: &[(&str, Rgb)] = &[
    ("black", Rgb::new(0, 0, 0)),
    ("white", Rgb::new(255, 255, 255)),
    ("red", Rgb::new(255, 0, 0)),
    ("green", Rgb::new(0, 128, 0)),
    ("lime", Rgb::new(0, 255, 0)),
    ("blue", Rgb::new(0, 0, 255)),
    ("yellow", Rgb::new(255, 255, 0)),
    ("cyan", Rgb::new(0, 255, 255)),
    ("aqua", Rgb::new(0, 255, 255)),
    ("magenta", Rgb::new(255, 0, 255)),
    ("fuchsia", Rgb::new(255, 0, 255)),
    ("gray", Rgb::new(128, 128, 128)),
    ("grey", Rgb::new(128, 128, 128)),
    ("silver", Rgb::new(192, 192, 192)),
    ("maroon", Rgb::new(128, 0, 0)),
    ("olive", Rgb::new(128, 128, 0)),
    ("navy", Rgb::new(0, 0, 128)),
    ("purple", Rgb::new(128, 0, 128)),
    ("teal", Rgb::new(0, 128, 128)),
    ("orange", Rgb::new(255, 165, 0)),
    ("pink", Rgb::new(255, 192, 203)),
    ("brown", Rgb::new(165, 42, 42)),
    ("gold", Rgb::new(255, 215, 0)),
    ("indigo", Rgb::new(75, 0, 130)),
    ("violet", Rgb::new(238, 130, 238)),
    ("coral", Rgb::new(255, 127, 80)),
    ("crimson", Rgb::new(220, 20, 60)),
    ("tomato", Rgb::new(255, 99, 71)),
    ("salmon", Rgb::new(250, 128, 114)),
    ("khaki", Rgb::new(240, 230, 140)),
    ("beige", Rgb::new(245, 245, 220)),
    ("ivory", Rgb::new(255, 255, 240)),
    ("lavender", Rgb::new(230, 230, 250)),
    ("turquoise", Rgb::new(64, 224, 208)),
    ("tan", Rgb::new(210, 180, 140)),
    ("darkgray", Rgb::new(169, 169, 169)),
    ("darkgrey", Rgb::new(169, 169, 169)),
    ("lightgray", Rgb::new(211, 211, 211)),
    ("lightgrey", Rgb::new(211, 211, 211)),
    ("dimgray", Rgb::new(105, 105, 105)),
    ("gainsboro", Rgb::new(220, 220, 220)),
    ("whitesmoke", Rgb::new(245, 245, 245)),
    ("darkblue", Rgb::new(0, 0, 139)),
    ("darkred", Rgb::new(139, 0, 0)),
    ("darkgreen", Rgb::new(0, 100, 0)),
    ("lightblue", Rgb::new(173, 216, 230)),
    ("skyblue", Rgb::new(135, 206, 235)),
    ("steelblue", Rgb::new(70, 130, 180)),
    ("royalblue", Rgb::new(65, 105, 225)),
    ("slategray", Rgb::new(112, 128, 144)),
    ("rebeccapurple", Rgb::new(102, 51, 153)),
];

/// Keywords that carry no concrete color of their own.
const NON_COLORS: &[&str] = &[
    "transparent",
    "currentcolor",
    "inherit",
    "initial",
    "unset",
    "revert",
    "none",
    "auto",
];

fn color_token_regex() -> &'static Regex {
    static TOKEN: OnceLock<Regex> = OnceLock::new();
    TOKEN.get_or_init(|| {
        Regex::new(r"(?i)#[0-9a-f]{3,8}\b|(?:rgba?|hsla?)\([^)]*\)|\b[a-z][a-z-]{2,40}\b")
            .expect("static regex")
    })
}

/// Spans whose words are names, not colors: `var(...)`, `url(...)` and
/// custom property identifiers.
fn opaque_span_regex() -> &'static Regex {
    static OPAQUE: OnceLock<Regex> = OnceLock::new();
    OPAQUE.get_or_init(|| {
        Regex::new(r"(?i)\b(?:var|url)\((?:[^()]|\([^()]*\))*\)|--[\w-]+").expect("static regex")
    })
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Canonical form: `#RRGGBB`, uppercase.
    pub fn to_hex(&self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }

    pub fn to_lab(&self) -> Lab {
        fn linear(channel: u8) -> f64 {
            let c = channel as f64 / 255.0;
            if c <= 0.04045 {
                c / 12.92
            } else {
                ((c + 0.055) / 1.055).powf(2.4)
            }
        }

        let (r, g, b) = (linear(self.r), linear(self.g), linear(self.b));

        // sRGB to XYZ, D65 white point
        let x = (r * 0.4124564 + g * 0.3575761 + b * 0.1804375) / 0.95047;
        let y = r * 0.2126729 + g * 0.7151522 + b * 0.0721750;
        let z = (r * 0.0193339 + g * 0.1191920 + b * 0.9503041) / 1.08883;

        fn f(t: f64) -> f64 {
            const DELTA: f64 = 6.0 / 29.0;
            if t > DELTA * DELTA * DELTA {
                t.cbrt()
            } else {
                t / (3.0 * DELTA * DELTA) + 4.0 / 29.0
            }
        }

        let (fx, fy, fz) = (f(x), f(y), f(z));
        Lab {
            l: 116.0 * fy - 16.0,
            a: 500.0 * (fx - fy),
            b: 200.0 * (fy - fz),
        }
    }
}

/// CIE76 color difference: Euclidean distance in CIELAB.
pub fn delta_e(a: &Rgb, b: &Rgb) -> f64 {
    let (la, lb) = (a.to_lab(), b.to_lab());
    ((la.l - lb.l).powi(2) + (la.a - lb.a).powi(2) + (la.b - lb.b).powi(2)).sqrt()
}

/// Parse one CSS color value. Fully transparent values and keywords without
/// a concrete color return `None`.
pub fn parse_color(value: &str) -> Option<Rgb> {
    let value = value.trim().to_ascii_lowercase();
    if value.is_empty() || NON_COLORS.contains(&value.as_str()) {
        return None;
    }

    if let Some(hex) = value.strip_prefix('#') {
        return parse_hex(hex);
    }

    if let Some((function, args)) = value.split_once('(') {
        let args = args.strip_suffix(')')?;
        return match function.trim() {
            "rgb" | "rgba" => parse_rgb_function(args),
            "hsl" | "hsla" => parse_hsl_function(args),
            _ => None,
        };
    }

    NAMED_COLORS
        .iter()
        .find(|(name, _)| *name == value)
        .map(|(_, rgb)| *rgb)
}

/// Every concrete color inside a property value, in order. Handles
/// shorthands such as `1px solid #ccc`.
pub fn colors_in_value(value: &str) -> Vec<Rgb> {
    if let Some(rgb) = parse_color(value) {
        return vec![rgb];
    }
    let value = opaque_span_regex().replace_all(value, " ");
    color_token_regex()
        .find_iter(&value)
        .filter_map(|token| parse_color(token.as_str()))
        .collect()
}

fn parse_hex(hex: &str) -> Option<Rgb> {
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let digit = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok().map(|d| d * 17);
    let pair = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();

    let (rgb, alpha) = match hex.len() {
        3 => (Rgb::new(digit(0)?, digit(1)?, digit(2)?), 255),
        4 => (Rgb::new(digit(0)?, digit(1)?, digit(2)?), digit(3)?),
        6 => (Rgb::new(pair(0)?, pair(2)?, pair(4)?), 255),
        8 => (Rgb::new(pair(0)?, pair(2)?, pair(4)?), pair(6)?),
        _ => return None,
    };

    if alpha == 0 { None } else { Some(rgb) }
}

/// Split functional notation arguments, accepting both the comma and the
/// space-separated `r g b / a` syntax.
fn split_args(args: &str) -> Vec<&str> {
    args.split(|c: char| c == ',' || c == '/' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .collect()
}

fn parse_alpha(token: Option<&&str>) -> Option<f64> {
    match token {
        None => Some(1.0),
        Some(token) => {
            if let Some(percent) = token.strip_suffix('%') {
                percent.parse::<f64>().ok().map(|p| p / 100.0)
            } else {
                token.parse::<f64>().ok()
            }
        }
    }
}

fn parse_rgb_channel(token: &str) -> Option<u8> {
    let value = if let Some(percent) = token.strip_suffix('%') {
        percent.parse::<f64>().ok()? * 255.0 / 100.0
    } else {
        token.parse::<f64>().ok()?
    };
    Some(value.round().clamp(0.0, 255.0) as u8)
}

fn parse_rgb_function(args: &str) -> Option<Rgb> {
    let parts = split_args(args);
    if parts.len() < 3 || parts.len() > 4 {
        return None;
    }
    let alpha = parse_alpha(parts.get(3))?;
    if alpha <= 0.0 {
        return None;
    }
    Some(Rgb::new(
        parse_rgb_channel(parts[0])?,
        parse_rgb_channel(parts[1])?,
        parse_rgb_channel(parts[2])?,
    ))
}

fn parse_hsl_function(args: &str) -> Option<Rgb> {
    let parts = split_args(args);
    if parts.len() < 3 || parts.len() > 4 {
        return None;
    }
    let alpha = parse_alpha(parts.get(3))?;
    if alpha <= 0.0 {
        return None;
    }

    let hue = parts[0]
        .trim_end_matches("deg")
        .parse::<f64>()
        .ok()?
        .rem_euclid(360.0);
    let saturation = parts[1].trim_end_matches('%').parse::<f64>().ok()? / 100.0;
    let lightness = parts[2].trim_end_matches('%').parse::<f64>().ok()? / 100.0;
    let (s, l) = (saturation.clamp(0.0, 1.0), lightness.clamp(0.0, 1.0));

    let chroma = (1.0 - (2.0 * l - 1.0).abs()) * s;
    let h = hue / 60.0;
    let x = chroma * (1.0 - (h % 2.0 - 1.0).abs());
    let (r1, g1, b1) = match h as u32 {
        0 => (chroma, x, 0.0),
        1 => (x, chroma, 0.0),
        2 => (0.0, chroma, x),
        3 => (0.0, x, chroma),
        4 => (x, 0.0, chroma),
        _ => (chroma, 0.0, x),
    };
    let m = l - chroma / 2.0;
    let channel = |v: f64| ((v + m) * 255.0).round().clamp(0.0, 255.0) as u8;

    Some(Rgb::new(channel(r1), channel(g1), channel(b1)))
}
