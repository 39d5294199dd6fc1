//! Run configuration: series styles, experiment profiles and mode groups.
//!
//! A built-in configuration is compiled into the binary; `--config` swaps
//! it for a user-supplied JSON document with the same shape.

use crate::chart::{AxisScale, ChartKind, ChartProfile, FontSizes, LegendLayout};
use crate::error::PlotError;
use crate::loader::Layout;
use crate::normalize::UnitScale;
use crate::select::SeriesSelector;
use crate::style::{StyleEntry, StyleRegistry};
use anyhow::{bail, ensure, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

const BUILTIN: &str = include_str!("../config/default.json");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub styles: Vec<StyleEntry>,
    pub profiles: Vec<ProfileConfig>,
    #[serde(default)]
    pub mode_groups: Vec<ModeGroup>,
}

/// Where a profile finds its inputs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Inputs {
    /// Every file in the working directory with this extension, one chart each
    Glob { extension: String },
    /// Files that must all exist before anything is processed
    Fixed { files: Vec<String> },
    /// One whitespace-pairs file per series, drawn together on one chart
    Paired {
        series: Vec<PairedInput>,
        output: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairedInput {
    pub id: String,
    pub file: String,
}

/// Rewrites the index values used as category labels
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "style", rename_all = "kebab-case")]
pub enum CategoryLabels {
    #[default]
    AsIs,
    /// Numeric labels without a fractional part, `4.0` -> `4`
    Integer,
    /// `0.1%` -> `0.1`
    StripSuffix { suffix: String },
    /// Replacement labels by position; extra rows keep their index value
    Fixed { labels: Vec<String> },
}

impl CategoryLabels {
    pub fn apply(&self, categories: Vec<String>) -> Vec<String> {
        match self {
            CategoryLabels::AsIs => categories,
            CategoryLabels::Integer => categories
                .into_iter()
                .map(|c| match c.trim().parse::<f64>() {
                    Ok(v) if v.is_finite() => format!("{}", v.trunc() as i64),
                    _ => c,
                })
                .collect(),
            CategoryLabels::StripSuffix { suffix } => categories
                .into_iter()
                .map(|c| {
                    let trimmed = c.trim_end();
                    trimmed.strip_suffix(suffix.as_str()).unwrap_or(trimmed).to_string()
                })
                .collect(),
            CategoryLabels::Fixed { labels } => categories
                .into_iter()
                .enumerate()
                .map(|(i, c)| labels.get(i).cloned().unwrap_or(c))
                .collect(),
        }
    }
}

fn one() -> f64 {
    1.0
}

/// Unit divisors as written in the configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaleConfig {
    #[serde(default = "one")]
    pub divisor: f64,
    #[serde(default)]
    pub columns: BTreeMap<String, f64>,
}

impl Default for ScaleConfig {
    fn default() -> Self {
        Self {
            divisor: 1.0,
            columns: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct XAxisConfig {
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub categories: CategoryLabels,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct YAxisConfig {
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub scale: AxisScale,
    #[serde(default)]
    pub ticks: Option<Vec<f64>>,
    #[serde(default)]
    pub limits: Option<[f64; 2]>,
}

/// Legend overrides for inputs belonging to one experiment family
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FamilyRule {
    /// Matched against the input's file stem, or given with `--family`
    pub token: String,
    #[serde(default)]
    pub legend_columns: Option<usize>,
    #[serde(default)]
    pub legend_font_size: Option<u32>,
}

fn default_bar_width() -> f64 {
    0.3
}

fn default_size() -> [u32; 2] {
    [1000, 600]
}

/// Everything needed to plot one experiment family
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileConfig {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub inputs: Inputs,
    pub layout: Layout,
    #[serde(default)]
    pub chart: ChartKind,
    /// Canonical series identifiers in comparison order
    pub series: Vec<String>,
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,
    #[serde(default)]
    pub scale: ScaleConfig,
    #[serde(default)]
    pub x: XAxisConfig,
    #[serde(default)]
    pub y: YAxisConfig,
    #[serde(default = "default_bar_width")]
    pub bar_width: f64,
    #[serde(default)]
    pub max_markers: Option<usize>,
    #[serde(default)]
    pub legend: LegendLayout,
    #[serde(default)]
    pub families: Vec<FamilyRule>,
    #[serde(default = "default_size")]
    pub size: [u32; 2],
    #[serde(default)]
    pub fonts: FontSizes,
}

impl ProfileConfig {
    pub fn selector(&self) -> SeriesSelector {
        self.aliases
            .iter()
            .fold(SeriesSelector::new(self.series.iter().cloned()), |s, (column, id)| {
                s.with_alias(column.clone(), id.clone())
            })
    }

    pub fn unit_scale(&self) -> UnitScale {
        self.scale
            .columns
            .iter()
            .fold(UnitScale::new(self.scale.divisor), |s, (column, d)| {
                s.with_column(column.clone(), *d)
            })
    }

    /// Family whose token occurs in `stem`, first rule wins
    pub fn family_for(&self, stem: &str) -> Option<&str> {
        self.families
            .iter()
            .find(|rule| stem.contains(rule.token.as_str()))
            .map(|rule| rule.token.as_str())
    }

    /// Resolve rendering options, applying the rule for `family` if one exists
    pub fn chart_profile(&self, family: Option<&str>) -> ChartProfile {
        let rule = family.and_then(|f| {
            self.families
                .iter()
                .find(|rule| rule.token.eq_ignore_ascii_case(f))
        });

        let mut legend = self.legend.clone();
        if let Some(rule) = rule {
            if let Some(columns) = rule.legend_columns {
                legend.columns = columns;
            }
            if let Some(size) = rule.legend_font_size {
                legend.font_size = size;
            }
        }

        ChartProfile {
            family: rule.map(|r| r.token.clone()),
            kind: self.chart,
            size: (self.size[0], self.size[1]),
            x_label: self.x.label.clone(),
            y_label: self.y.label.clone(),
            y_scale: self.y.scale,
            y_ticks: self.y.ticks.clone(),
            y_limits: self.y.limits.map(|[lo, hi]| (lo, hi)),
            bar_width: self.bar_width,
            max_markers: self.max_markers,
            legend,
            fonts: self.fonts.clone(),
        }
    }

    fn validate(&self, registry: &StyleRegistry) -> Result<()> {
        ensure!(!self.series.is_empty(), "no series listed");
        for id in &self.series {
            ensure!(registry.contains(id), "series {id} has no style");
        }
        for (column, id) in &self.aliases {
            ensure!(
                self.series.contains(id),
                "alias {column} points at {id}, which is not a listed series"
            );
        }

        let divisors = std::iter::once(("default", self.scale.divisor)).chain(
            self.scale
                .columns
                .iter()
                .map(|(c, d)| (c.as_str(), *d)),
        );
        for (column, divisor) in divisors {
            ensure!(
                divisor.is_finite() && divisor != 0.0,
                "divisor for {column} must be finite and non-zero, got {divisor}"
            );
        }

        ensure!(
            self.bar_width > 0.0 && self.bar_width <= 1.0,
            "bar width must be in (0, 1], got {}",
            self.bar_width
        );
        ensure!(self.size[0] > 0 && self.size[1] > 0, "chart size must be positive");
        ensure!(self.legend.columns > 0, "legend needs at least one column");

        if let Some([lo, hi]) = self.y.limits {
            ensure!(lo < hi, "y limits must be increasing");
            if self.y.scale == AxisScale::Log {
                ensure!(lo > 0.0, "log y limits must be positive");
            }
        }
        if let (AxisScale::Log, Some(ticks)) = (self.y.scale, &self.y.ticks) {
            ensure!(ticks.iter().all(|t| *t > 0.0), "log y ticks must be positive");
        }

        match &self.inputs {
            Inputs::Glob { extension } => {
                ensure!(!extension.is_empty(), "glob inputs need an extension")
            }
            Inputs::Fixed { files } => ensure!(!files.is_empty(), "no fixed input files"),
            Inputs::Paired { series, output } => {
                ensure!(!output.is_empty(), "paired inputs need an output name");
                ensure!(
                    self.layout == Layout::WhitespacePairs && self.chart == ChartKind::Line,
                    "paired inputs are whitespace-pairs line charts"
                );
                for input in series {
                    ensure!(
                        self.series.contains(&input.id),
                        "paired input {} is not a listed series",
                        input.id
                    );
                }
            }
        }
        Ok(())
    }
}

/// A prompted choice between profiles, such as a network type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModeGroup {
    pub name: String,
    pub prompt: String,
    /// Mode token -> profile name
    pub modes: BTreeMap<String, String>,
}

impl ModeGroup {
    pub fn tokens(&self) -> Vec<String> {
        self.modes.keys().cloned().collect()
    }

    /// Profile for a typed answer; surrounding whitespace and case are ignored
    pub fn resolve(&self, answer: &str) -> Result<&str, PlotError> {
        let token = answer.trim().to_uppercase();
        self.modes
            .iter()
            .find(|(mode, _)| mode.to_uppercase() == token)
            .map(|(_, profile)| profile.as_str())
            .ok_or_else(|| PlotError::UnknownMode {
                token,
                expected: self.tokens(),
            })
    }
}

impl Config {
    pub fn builtin() -> Result<Self> {
        serde_json::from_str(BUILTIN).context("Failed to parse built-in configuration")
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Built-in configuration, or the file at `path`, validated
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::builtin()?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn registry(&self) -> Result<StyleRegistry> {
        StyleRegistry::from_entries(self.styles.clone())
    }

    pub fn validate(&self) -> Result<()> {
        let registry = self.registry()?;

        let mut names = HashSet::new();
        for profile in &self.profiles {
            if !names.insert(profile.name.as_str()) {
                bail!("duplicate profile {}", profile.name);
            }
            profile
                .validate(&registry)
                .with_context(|| format!("invalid profile {}", profile.name))?;
        }

        for group in &self.mode_groups {
            if !names.insert(group.name.as_str()) {
                bail!("mode group {} clashes with another profile or group", group.name);
            }
            ensure!(!group.modes.is_empty(), "mode group {} has no modes", group.name);
            for (token, target) in &group.modes {
                ensure!(
                    self.profile(target).is_some(),
                    "mode {token} of group {} points at unknown profile {target}",
                    group.name
                );
            }
        }
        Ok(())
    }

    pub fn profile(&self, name: &str) -> Option<&ProfileConfig> {
        self.profiles.iter().find(|p| p.name == name)
    }

    pub fn mode_group(&self, name: &str) -> Option<&ModeGroup> {
        self.mode_groups.iter().find(|g| g.name == name)
    }
}
