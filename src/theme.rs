use serde::{Deserialize, Serialize};

/// Six-attribute colour/font record applied at export time.
/// Values are CSS strings; the pipeline only ever reads them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Theme {
    pub primary: String,
    pub secondary: String,
    pub accent: String,
    pub background: String,
    pub text: String,
    pub font_family: String,
}

impl Default for Theme {
    fn default() -> Self {
        Theme::preset("professional").unwrap_or_else(|| Theme {
            primary: "#1e3a8a".into(),
            secondary: "#3b82f6".into(),
            accent: "#2563eb".into(),
            background: "#ffffff".into(),
            text: "#1f2937".into(),
            font_family: "Arial, sans-serif".into(),
        })
    }
}

const PRESETS: &[(&str, [&str; 6])] = &[
    (
        "professional",
        ["#1e3a8a", "#3b82f6", "#2563eb", "#ffffff", "#1f2937", "Arial, sans-serif"],
    ),
    (
        "modern",
        ["#7c3aed", "#a78bfa", "#db2777", "#fafafa", "#18181b", "Inter, Helvetica, sans-serif"],
    ),
    (
        "classic",
        ["#78350f", "#b45309", "#92400e", "#fffbeb", "#292524", "Georgia, 'Times New Roman', serif"],
    ),
    (
        "minimal",
        ["#111827", "#6b7280", "#111827", "#ffffff", "#111827", "Helvetica, sans-serif"],
    ),
];

impl Theme {
    pub fn preset(name: &str) -> Option<Theme> {
        PRESETS
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, [p, s, a, b, t, f])| Theme {
                primary: p.to_string(),
                secondary: s.to_string(),
                accent: a.to_string(),
                background: b.to_string(),
                text: t.to_string(),
                font_family: f.to_string(),
            })
    }

    pub fn preset_names() -> impl Iterator<Item = &'static str> {
        PRESETS.iter().map(|(n, _)| *n)
    }
}

pub type Rgb = [u8; 3];

pub const WHITE: Rgb = [255, 255, 255];
pub const BLACK: Rgb = [0, 0, 0];
/// Background behind unresolved placeholders in every output format.
pub const PLACEHOLDER_HIGHLIGHT: Rgb = [0xfe, 0xf0, 0x8a];

/// Parse a CSS colour: `#rgb`, `#rrggbb`, `rgb()/rgba()` or a handful of names.
pub fn parse_css_color(val: &str) -> Option<Rgb> {
    let val = val.trim().trim_end_matches("!important").trim();
    if let Some(hex) = val.strip_prefix('#') {
        return parse_hex(hex);
    }
    let lower = val.to_ascii_lowercase();
    if let Some(args) = lower
        .strip_prefix("rgba(")
        .or_else(|| lower.strip_prefix("rgb("))
        .and_then(|s| s.strip_suffix(')'))
    {
        let parts: Vec<u8> = args
            .split(|c| c == ',' || c == ' ' || c == '/')
            .filter(|s| !s.is_empty())
            .take(3)
            .filter_map(|s| s.trim().parse::<f32>().ok())
            .map(|v| v.clamp(0.0, 255.0) as u8)
            .collect();
        return match parts.as_slice() {
            [r, g, b] => Some([*r, *g, *b]),
            _ => None,
        };
    }
    match lower.as_str() {
        "white" => Some(WHITE),
        "black" => Some(BLACK),
        "red" => Some([255, 0, 0]),
        "green" => Some([0, 128, 0]),
        "blue" => Some([0, 0, 255]),
        "yellow" => Some([255, 255, 0]),
        "gray" | "grey" => Some([128, 128, 128]),
        "navy" => Some([0, 0, 128]),
        "orange" => Some([255, 165, 0]),
        "purple" => Some([128, 0, 128]),
        _ => None,
    }
}

fn parse_hex(hex: &str) -> Option<Rgb> {
    let digit = |i: usize, len: usize| u8::from_str_radix(hex.get(i..i + len)?, 16).ok();
    match hex.len() {
        3 | 4 => {
            let r = digit(0, 1)?;
            let g = digit(1, 1)?;
            let b = digit(2, 1)?;
            Some([r * 17, g * 17, b * 17])
        }
        6 | 8 => Some([digit(0, 2)?, digit(2, 2)?, digit(4, 2)?]),
        _ => None,
    }
}

/// Uppercase-free 6-digit hex as used by OOXML (`112233`).
pub fn to_hex(rgb: Rgb) -> String {
    format!("{:02x}{:02x}{:02x}", rgb[0], rgb[1], rgb[2])
}

/// Mix `rgb` towards white; `amount` 0.0 keeps the colour, 1.0 gives white.
pub fn tint(rgb: Rgb, amount: f32) -> Rgb {
    let mix = |c: u8| (c as f32 + (255.0 - c as f32) * amount.clamp(0.0, 1.0)).round() as u8;
    [mix(rgb[0]), mix(rgb[1]), mix(rgb[2])]
}

/// Resolved colours of a theme, with fallbacks for anything unparseable.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Palette {
    pub(crate) primary: Rgb,
    pub(crate) secondary: Rgb,
    pub(crate) accent: Rgb,
    pub(crate) background: Rgb,
    pub(crate) text: Rgb,
}

impl Palette {
    pub(crate) fn of(theme: &Theme) -> Palette {
        Palette {
            primary: parse_css_color(&theme.primary).unwrap_or([0x1e, 0x3a, 0x8a]),
            secondary: parse_css_color(&theme.secondary).unwrap_or([0x3b, 0x82, 0xf6]),
            accent: parse_css_color(&theme.accent).unwrap_or([0x25, 0x63, 0xeb]),
            background: parse_css_color(&theme.background).unwrap_or(WHITE),
            text: parse_css_color(&theme.text).unwrap_or([0x1f, 0x29, 0x37]),
        }
    }
}

/// Split a CSS `font-family` list into bare family names.
pub(crate) fn font_families(css: &str) -> Vec<String> {
    css.split(',')
        .map(|f| f.trim().trim_matches(|c| c == '"' || c == '\'').trim().to_string())
        .filter(|f| !f.is_empty())
        .collect()
}
