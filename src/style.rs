//! The fixed visual vocabulary shared by every chart in a run.

use anyhow::{bail, Result};
use palette::{named, Srgb};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// An opaque sRGB color, written as `#RRGGBB` or a CSS color name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const BLACK: Rgb = Rgb(0, 0, 0);
    /// Used for series the registry does not know
    pub const FALLBACK: Rgb = Rgb(0x77, 0x77, 0x77);
}

impl From<Srgb<u8>> for Rgb {
    fn from(c: Srgb<u8>) -> Self {
        Rgb(c.red, c.green, c.blue)
    }
}

impl FromStr for Rgb {
    type Err = String;

    /// Accepts `#RRGGBB`, `#RGB` or a CSS color name such as `gray`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(named) = named::from_str(&s.to_ascii_lowercase()) {
            return Ok(named.into());
        }
        if !s.starts_with('#') {
            return Err(format!("invalid color {s:?}, expected #RRGGBB or a color name"));
        }

        let rgb: Srgb<u8> = s.parse().map_err(|e| format!("invalid color {s:?}: {e}"))?;
        Ok(rgb.into())
    }
}

impl TryFrom<String> for Rgb {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Rgb> for String {
    fn from(c: Rgb) -> Self {
        c.to_string()
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.0, self.1, self.2)
    }
}

/// Whether a bar's interior is painted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FillMode {
    #[default]
    Solid,
    /// Transparent interior; edge and hatch drawn in the series color
    Hollow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Marker {
    #[default]
    None,
    Square,
    Circle,
    Triangle,
    Diamond,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LineDash {
    #[default]
    Solid,
    Dashed,
    DashDot,
    Dotted,
}

impl LineDash {
    /// Dash and gap lengths in multiples of the line width, `None` when solid
    pub fn dash(&self) -> Option<(f64, f64)> {
        match self {
            LineDash::Solid => None,
            LineDash::Dashed => Some((3.7, 1.6)),
            LineDash::DashDot => Some((6.4, 2.6)),
            LineDash::Dotted => Some((1.0, 1.65)),
        }
    }
}

/// Texture drawn inside bars, parsed from strings such as `"xxx"` or `"//"`.
///
/// `/` and `\` are diagonals, `x` both, `-` horizontal, `|` vertical, `+`
/// both straight. Repeating a symbol makes the texture denser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Hatch {
    pub forward: bool,
    pub backward: bool,
    pub horizontal: bool,
    pub vertical: bool,
    pub density: u32,
}

impl Hatch {
    pub fn is_empty(&self) -> bool {
        !(self.forward || self.backward || self.horizontal || self.vertical)
    }

    /// Distance between parallel hatch lines for a base spacing in pixels
    pub fn spacing(&self, base: u32) -> u32 {
        (base / self.density.max(1)).max(3)
    }
}

impl FromStr for Hatch {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut hatch = Hatch::default();
        let mut counts = [0u32; 6];

        for ch in s.chars() {
            let slot = match ch {
                '/' => {
                    hatch.forward = true;
                    0
                }
                '\\' => {
                    hatch.backward = true;
                    1
                }
                'x' | 'X' => {
                    hatch.forward = true;
                    hatch.backward = true;
                    2
                }
                '-' => {
                    hatch.horizontal = true;
                    3
                }
                '|' => {
                    hatch.vertical = true;
                    4
                }
                '+' => {
                    hatch.horizontal = true;
                    hatch.vertical = true;
                    5
                }
                other => return Err(format!("unsupported hatch symbol {other:?} in {s:?}")),
            };
            counts[slot] += 1;
        }

        hatch.density = counts.into_iter().max().unwrap_or(0);
        Ok(hatch)
    }
}

impl TryFrom<String> for Hatch {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Hatch> for String {
    fn from(h: Hatch) -> Self {
        let n = h.density as usize;
        let mut out = String::new();
        match (h.forward, h.backward) {
            (true, true) => out.push_str(&"x".repeat(n)),
            (true, false) => out.push_str(&"/".repeat(n)),
            (false, true) => out.push_str(&"\\".repeat(n)),
            (false, false) => {}
        }
        match (h.horizontal, h.vertical) {
            (true, true) => out.push_str(&"+".repeat(n)),
            (true, false) => out.push_str(&"-".repeat(n)),
            (false, true) => out.push_str(&"|".repeat(n)),
            (false, false) => {}
        }
        out
    }
}

fn default_edge() -> Rgb {
    Rgb::BLACK
}

fn default_line_width() -> f64 {
    2.5
}

/// One registry entry as written in the configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleEntry {
    pub id: String,
    pub color: Rgb,
    #[serde(default = "default_edge")]
    pub edge: Rgb,
    #[serde(default)]
    pub fill: FillMode,
    #[serde(default)]
    pub hatch: Hatch,
    #[serde(default)]
    pub marker: Marker,
    #[serde(default)]
    pub line: LineDash,
    #[serde(default = "default_line_width")]
    pub line_width: f64,
}

/// Resolved rendering style of one series identifier
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesStyle {
    pub id: String,
    /// Registration order, stable for the whole run
    pub rank: usize,
    pub color: Rgb,
    pub edge: Rgb,
    pub fill: FillMode,
    pub hatch: Hatch,
    pub marker: Marker,
    pub line: LineDash,
    pub line_width: f64,
}

impl SeriesStyle {
    fn from_entry(rank: usize, entry: StyleEntry) -> Self {
        Self {
            id: entry.id,
            rank,
            color: entry.color,
            edge: entry.edge,
            fill: entry.fill,
            hatch: entry.hatch,
            marker: entry.marker,
            line: entry.line,
            line_width: entry.line_width,
        }
    }

    /// Gray, unhatched style for an identifier with no entry
    pub fn fallback(id: &str) -> Self {
        Self {
            id: id.to_string(),
            rank: usize::MAX,
            color: Rgb::FALLBACK,
            edge: Rgb::BLACK,
            fill: FillMode::Solid,
            hatch: Hatch::default(),
            marker: Marker::Circle,
            line: LineDash::Solid,
            line_width: default_line_width(),
        }
    }

    /// Interior color of a bar, `None` when hollow
    pub fn face(&self) -> Option<Rgb> {
        match self.fill {
            FillMode::Solid => Some(self.color),
            FillMode::Hollow => None,
        }
    }

    /// Color of the bar outline and its hatch lines
    pub fn outline(&self) -> Rgb {
        match self.fill {
            FillMode::Solid => self.edge,
            FillMode::Hollow => self.color,
        }
    }
}

/// Read-only map from series identifier to style, built once per run
#[derive(Debug, Clone, PartialEq)]
pub struct StyleRegistry {
    styles: Vec<SeriesStyle>,
}

impl StyleRegistry {
    pub fn from_entries(entries: Vec<StyleEntry>) -> Result<Self> {
        let mut seen = HashSet::new();
        for entry in &entries {
            if !seen.insert(entry.id.as_str()) {
                bail!("duplicate style for series {}", entry.id);
            }
            if !(entry.line_width.is_finite() && entry.line_width > 0.0) {
                bail!("style {}: line width must be positive", entry.id);
            }
        }

        let styles = entries
            .into_iter()
            .enumerate()
            .map(|(rank, entry)| SeriesStyle::from_entry(rank, entry))
            .collect();
        Ok(Self { styles })
    }

    pub fn get(&self, id: &str) -> Option<&SeriesStyle> {
        self.styles.iter().find(|s| s.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Style for `id`, falling back to a neutral gray
    pub fn style_for(&self, id: &str) -> SeriesStyle {
        self.get(id)
            .cloned()
            .unwrap_or_else(|| SeriesStyle::fallback(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, color: &str, fill: FillMode) -> StyleEntry {
        StyleEntry {
            id: id.to_string(),
            color: color.parse().unwrap(),
            edge: Rgb::BLACK,
            fill,
            hatch: "//".parse().unwrap(),
            marker: Marker::Square,
            line: LineDash::Dashed,
            line_width: 2.5,
        }
    }

    #[test]
    fn parses_hex_and_named_colors() {
        assert_eq!("#CC4125".parse::<Rgb>().unwrap(), Rgb(0xCC, 0x41, 0x25));
        assert_eq!("gray".parse::<Rgb>().unwrap(), Rgb(128, 128, 128));
        assert_eq!(" Green ".parse::<Rgb>().unwrap(), Rgb(0, 128, 0));
        assert_eq!("#fff".parse::<Rgb>().unwrap(), Rgb(255, 255, 255));
        assert!("#12345".parse::<Rgb>().is_err());
        assert!("CC4125".parse::<Rgb>().is_err());
        assert!("#GG0000".parse::<Rgb>().is_err());
        assert_eq!(Rgb(0x64, 0x95, 0xED).to_string(), "#6495ED");
    }

    #[test]
    fn hatch_density_counts_repeats() {
        let cross: Hatch = "xxx".parse().unwrap();
        assert!(cross.forward && cross.backward);
        assert_eq!(cross.density, 3);

        let back: Hatch = "\\\\\\\\".parse().unwrap();
        assert!(back.backward && !back.forward);
        assert_eq!(back.density, 4);
        assert_eq!(back.spacing(18), 4);

        assert!("".parse::<Hatch>().unwrap().is_empty());
        assert!("o".parse::<Hatch>().is_err());
    }

    #[test]
    fn only_solid_lines_have_no_dash() {
        assert_eq!(LineDash::Solid.dash(), None);
        let (dot, _) = LineDash::Dotted.dash().unwrap();
        let (dash, _) = LineDash::Dashed.dash().unwrap();
        assert!(dot < dash);
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let err = StyleRegistry::from_entries(vec![
            entry("RAIN", "#CC4125", FillMode::Solid),
            entry("RAIN", "#FF8080", FillMode::Solid),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("RAIN"));
    }

    #[test]
    fn hollow_styles_outline_in_series_color() {
        let registry = StyleRegistry::from_entries(vec![
            entry("RAIN", "#CC4125", FillMode::Solid),
            entry("RAIN-0.5", "#E5A370", FillMode::Hollow),
        ])
        .unwrap();

        let rain = registry.style_for("RAIN");
        assert_eq!(rain.face(), Some(Rgb(0xCC, 0x41, 0x25)));
        assert_eq!(rain.outline(), Rgb::BLACK);
        assert_eq!(rain.rank, 0);

        let variant = registry.style_for("RAIN-0.5");
        assert_eq!(variant.face(), None);
        assert_eq!(variant.outline(), Rgb(0xE5, 0xA3, 0x70));
        assert_eq!(variant.rank, 1);
    }

    #[test]
    fn unknown_ids_get_the_fallback() {
        let registry = StyleRegistry::from_entries(Vec::new()).unwrap();
        let style = registry.style_for("PS");
        assert_eq!(style.color, Rgb::FALLBACK);
        assert!(!registry.contains("PS"));
    }
}
