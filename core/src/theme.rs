//! Value-to-icon/color theming.
//!
//! A theme is either one of the built-in tables ([`BuiltinTheme`]) or a
//! user-supplied [`CustomTheme`] validated at construction. Lookups are
//! pure; [`ThemeResolver`] picks the table and post-processes colors.

use crate::error::{ProgressError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Color names the dashboard exposes as `var(--<name>-color)`.
pub const NAMED_COLORS: &[&str] = &[
    "primary",
    "accent",
    "red",
    "pink",
    "purple",
    "deep-purple",
    "indigo",
    "blue",
    "light-blue",
    "cyan",
    "teal",
    "green",
    "light-green",
    "lime",
    "yellow",
    "amber",
    "orange",
    "deep-orange",
    "brown",
    "light-grey",
    "grey",
    "dark-grey",
    "blue-grey",
    "black",
    "white",
    "disabled",
];

/// Map a bare color name to its CSS custom property; anything else is
/// assumed to be a CSS color already and passes through.
///
/// ```rust
/// use entity_progress_core::theme::css_color;
///
/// assert_eq!(css_color("red"), "var(--red-color)");
/// assert_eq!(css_color("#ff0000"), "#ff0000");
/// ```
#[must_use]
pub fn css_color(color: &str) -> String {
    let trimmed = color.trim();
    if NAMED_COLORS.contains(&trimmed) {
        format!("var(--{trimmed}-color)")
    } else {
        trimmed.to_owned()
    }
}

/// How a value selects an entry in a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThemeMode {
    /// Equal-width bands over `[0, max]`, one per entry
    Linear { max: u32 },
    /// Explicit `[min, max)` bands
    Stepped,
}

/// One band of a theme table.
#[derive(Debug, Clone, PartialEq)]
pub struct ThemeBand {
    pub min: f64,
    pub max: f64,
    pub icon: Option<String>,
    pub icon_color: Option<String>,
    pub bar_color: Option<String>,
}

impl ThemeBand {
    fn builtin(min: f64, max: f64, icon: Option<&str>, color: &str) -> Self {
        Self {
            min,
            max,
            icon: icon.map(str::to_owned),
            icon_color: Some(color.to_owned()),
            bar_color: Some(color.to_owned()),
        }
    }
}

/// Icon and colors selected for a value.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ThemeStyle {
    pub icon: Option<String>,
    pub icon_color: Option<String>,
    pub bar_color: Option<String>,
}

/// A theme table with its lookup mode.
#[derive(Debug, Clone, PartialEq)]
pub struct ThemeTable {
    pub mode: ThemeMode,
    pub based_on_percent: bool,
    pub bands: Vec<ThemeBand>,
}

impl ThemeTable {
    /// Select the band for `value`.
    #[must_use]
    pub fn lookup(&self, value: f64) -> Option<&ThemeBand> {
        let last = self.bands.len().checked_sub(1)?;
        let index = match self.mode {
            ThemeMode::Linear { max } => {
                let max = f64::from(max);
                if last == 0 || max <= 0.0 {
                    0
                } else {
                    let width = max / last as f64;
                    ((value.clamp(0.0, max) / width).floor() as usize).min(last)
                }
            }
            ThemeMode::Stepped => {
                if value < self.bands[0].min {
                    0
                } else {
                    self.bands
                        .iter()
                        .position(|b| value >= b.min && value < b.max)
                        .unwrap_or(last)
                }
            }
        };
        self.bands.get(index)
    }

    /// Look up `value` and map colors to CSS.
    #[must_use]
    pub fn style_for(&self, value: f64) -> Option<ThemeStyle> {
        let band = self.lookup(value)?;
        Some(ThemeStyle {
            icon: band.icon.clone(),
            icon_color: band.icon_color.as_deref().map(css_color),
            bar_color: band.bar_color.as_deref().map(css_color),
        })
    }
}

/// The fixed catalog of named themes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BuiltinTheme {
    Battery,
    Cpu,
    Memory,
    OptimalWhenLow,
    OptimalWhenHigh,
    Light,
    Temperature,
    Humidity,
    Pm25,
    Voc,
}

impl BuiltinTheme {
    pub const ALL: &'static [BuiltinTheme] = &[
        Self::Battery,
        Self::Cpu,
        Self::Memory,
        Self::OptimalWhenLow,
        Self::OptimalWhenHigh,
        Self::Light,
        Self::Temperature,
        Self::Humidity,
        Self::Pm25,
        Self::Voc,
    ];

    /// Whether the table is keyed on the percentage rather than the value.
    #[must_use]
    pub const fn based_on_percent(self) -> bool {
        !matches!(
            self,
            Self::Temperature | Self::Humidity | Self::Pm25 | Self::Voc
        )
    }

    #[must_use]
    pub fn table(self) -> ThemeTable {
        let b = ThemeBand::builtin;
        let (mode, bands) = match self {
            Self::Battery => (
                ThemeMode::Stepped,
                vec![
                    b(0.0, 10.0, Some("mdi:battery-alert"), "red"),
                    b(10.0, 20.0, Some("mdi:battery-10"), "deep-orange"),
                    b(20.0, 30.0, Some("mdi:battery-20"), "orange"),
                    b(30.0, 40.0, Some("mdi:battery-30"), "amber"),
                    b(40.0, 50.0, Some("mdi:battery-40"), "yellow"),
                    b(50.0, 60.0, Some("mdi:battery-50"), "lime"),
                    b(60.0, 70.0, Some("mdi:battery-60"), "light-green"),
                    b(70.0, 80.0, Some("mdi:battery-70"), "light-green"),
                    b(80.0, 90.0, Some("mdi:battery-80"), "green"),
                    b(90.0, 100.0, Some("mdi:battery"), "green"),
                ],
            ),
            Self::Cpu => (ThemeMode::Stepped, low_is_good(Some("mdi:cpu-64-bit"))),
            Self::Memory => (ThemeMode::Stepped, low_is_good(Some("mdi:memory"))),
            Self::OptimalWhenLow => (ThemeMode::Stepped, low_is_good(None)),
            Self::OptimalWhenHigh => {
                let mut bands = low_is_good(None);
                let colors: Vec<_> = bands.iter().rev().map(|b| b.bar_color.clone()).collect();
                for (band, color) in bands.iter_mut().zip(colors) {
                    band.icon_color = color.clone();
                    band.bar_color = color;
                }
                (ThemeMode::Stepped, bands)
            }
            Self::Light => (
                ThemeMode::Linear { max: 100 },
                vec![
                    b(0.0, 0.0, Some("mdi:lightbulb-outline"), "#4B4B4B"),
                    b(0.0, 0.0, Some("mdi:lightbulb-outline"), "#877F67"),
                    b(0.0, 0.0, Some("mdi:lightbulb"), "#C3B382"),
                    b(0.0, 0.0, Some("mdi:lightbulb"), "#E1C06E"),
                    b(0.0, 0.0, Some("mdi:lightbulb"), "#FFCF57"),
                ],
            ),
            Self::Temperature => (
                ThemeMode::Stepped,
                vec![
                    b(-50.0, -30.0, Some("mdi:thermometer-low"), "deep-purple"),
                    b(-30.0, -15.0, Some("mdi:thermometer-low"), "indigo"),
                    b(-15.0, -2.0, Some("mdi:thermometer-low"), "blue"),
                    b(-2.0, 2.0, Some("mdi:thermometer-low"), "light-blue"),
                    b(2.0, 8.0, Some("mdi:thermometer-low"), "cyan"),
                    b(8.0, 16.0, Some("mdi:thermometer"), "teal"),
                    b(16.0, 18.0, Some("mdi:thermometer"), "light-green"),
                    b(18.0, 26.0, Some("mdi:thermometer-check"), "green"),
                    b(26.0, 28.0, Some("mdi:thermometer-high"), "yellow"),
                    b(28.0, 35.0, Some("mdi:thermometer-high"), "orange"),
                    b(35.0, 60.0, Some("mdi:thermometer-alert"), "red"),
                ],
            ),
            Self::Humidity => (
                ThemeMode::Stepped,
                vec![
                    b(0.0, 23.0, Some("mdi:water-percent-alert"), "red"),
                    b(23.0, 30.0, Some("mdi:water-percent-alert"), "orange"),
                    b(30.0, 40.0, Some("mdi:water-percent"), "yellow"),
                    b(40.0, 50.0, Some("mdi:water-percent"), "green"),
                    b(50.0, 60.0, Some("mdi:water-percent"), "teal"),
                    b(60.0, 65.0, Some("mdi:water-percent"), "light-blue"),
                    b(65.0, 80.0, Some("mdi:water-percent-alert"), "indigo"),
                    b(80.0, 100.0, Some("mdi:water-percent-alert"), "deep-purple"),
                ],
            ),
            Self::Pm25 => (
                ThemeMode::Stepped,
                vec![
                    b(0.0, 12.0, Some("mdi:air-filter"), "green"),
                    b(12.0, 35.0, Some("mdi:air-filter"), "yellow"),
                    b(35.0, 55.0, Some("mdi:air-filter"), "orange"),
                    b(55.0, 150.0, Some("mdi:alert-outline"), "red"),
                    b(150.0, 250.0, Some("mdi:alert-outline"), "purple"),
                    b(250.0, 500.0, Some("mdi:alert"), "deep-purple"),
                ],
            ),
            Self::Voc => (
                ThemeMode::Stepped,
                vec![
                    b(0.0, 300.0, Some("mdi:air-filter"), "green"),
                    b(300.0, 500.0, Some("mdi:air-filter"), "yellow"),
                    b(500.0, 3000.0, Some("mdi:alert-outline"), "orange"),
                    b(3000.0, 25000.0, Some("mdi:alert-outline"), "red"),
                    b(25000.0, 50000.0, Some("mdi:alert"), "purple"),
                ],
            ),
        };
        ThemeTable {
            mode,
            based_on_percent: self.based_on_percent(),
            bands,
        }
    }
}

fn low_is_good(icon: Option<&str>) -> Vec<ThemeBand> {
    ["green", "light-green", "yellow", "orange", "red"]
        .iter()
        .enumerate()
        .map(|(i, color)| {
            let min = i as f64 * 20.0;
            ThemeBand::builtin(min, min + 20.0, icon, color)
        })
        .collect()
}

impl fmt::Display for BuiltinTheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Battery => "battery",
            Self::Cpu => "cpu",
            Self::Memory => "memory",
            Self::OptimalWhenLow => "optimal_when_low",
            Self::OptimalWhenHigh => "optimal_when_high",
            Self::Light => "light",
            Self::Temperature => "temperature",
            Self::Humidity => "humidity",
            Self::Pm25 => "pm25",
            Self::Voc => "voc",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for BuiltinTheme {
    type Err = ThemeParseError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|theme| theme.to_string() == wanted)
            .ok_or_else(|| ThemeParseError {
                input: s.to_owned(),
            })
    }
}

/// Error type for parsing [`BuiltinTheme`] from string.
#[derive(Debug, thiserror::Error)]
#[error("Unknown theme '{input}'")]
pub struct ThemeParseError {
    input: String,
}

/// One entry of a user-supplied theme, as written in the card config.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CustomThemeEntry {
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub icon_color: Option<String>,
    #[serde(default)]
    pub bar_color: Option<String>,
}

impl CustomThemeEntry {
    #[must_use]
    pub fn new(min: f64, max: f64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    #[must_use]
    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    #[must_use]
    pub fn with_bar_color(mut self, color: impl Into<String>) -> Self {
        self.bar_color = Some(color.into());
        self
    }

    #[must_use]
    pub fn with_icon_color(mut self, color: impl Into<String>) -> Self {
        self.icon_color = Some(color.into());
        self
    }
}

/// A validated user-supplied stepped theme.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomTheme {
    table: ThemeTable,
}

impl CustomTheme {
    /// Validate `entries` into a stepped table.
    ///
    /// Entries must be non-empty, carry both bounds with `min < max`, name
    /// at least one of `color`/`icon_color`/`bar_color`, and be contiguous:
    /// each entry starts where the previous one ends.
    pub fn new(entries: &[CustomThemeEntry], based_on_percent: bool) -> Result<Self> {
        if entries.is_empty() {
            return Err(ProgressError::invalid_theme(0, "theme is empty"));
        }

        let mut bands = Vec::with_capacity(entries.len());
        let mut previous_max: Option<f64> = None;
        for (index, entry) in entries.iter().enumerate() {
            let (Some(min), Some(max)) = (entry.min, entry.max) else {
                return Err(ProgressError::invalid_theme(index, "min and max are required"));
            };
            if entry.color.is_none() && entry.icon_color.is_none() && entry.bar_color.is_none() {
                return Err(ProgressError::invalid_theme(
                    index,
                    "one of color, icon_color or bar_color is required",
                ));
            }
            if min >= max {
                return Err(ProgressError::invalid_theme(
                    index,
                    format!("min ({min}) must be lower than max ({max})"),
                ));
            }
            if let Some(previous_max) = previous_max {
                if min != previous_max {
                    return Err(ProgressError::invalid_theme(
                        index,
                        format!("min ({min}) must equal the previous max ({previous_max})"),
                    ));
                }
            }
            previous_max = Some(max);

            // Entry-specific colors win over the shared `color`
            let icon_color = entry.icon_color.clone().or_else(|| entry.color.clone());
            let bar_color = entry.bar_color.clone().or_else(|| entry.color.clone());
            bands.push(ThemeBand {
                min,
                max,
                icon: entry.icon.clone(),
                icon_color,
                bar_color,
            });
        }

        Ok(Self {
            table: ThemeTable {
                mode: ThemeMode::Stepped,
                based_on_percent,
                bands,
            },
        })
    }

    #[must_use]
    pub fn table(&self) -> &ThemeTable {
        &self.table
    }
}

/// Picks the active theme table and resolves values against it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ThemeResolver {
    table: Option<ThemeTable>,
    custom: bool,
}

impl ThemeResolver {
    /// No theme; every lookup yields `None`.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn builtin(theme: BuiltinTheme) -> Self {
        Self {
            table: Some(theme.table()),
            custom: false,
        }
    }

    #[must_use]
    pub fn custom(theme: CustomTheme) -> Self {
        Self {
            table: Some(theme.table),
            custom: true,
        }
    }

    /// Build from card options. A custom table takes precedence over a
    /// named theme; an invalid custom table or unknown name yields no theme.
    #[must_use]
    pub fn from_options(
        name: Option<&str>,
        custom: Option<&[CustomThemeEntry]>,
        custom_based_on_percent: bool,
    ) -> Self {
        if let Some(entries) = custom {
            return match CustomTheme::new(entries, custom_based_on_percent) {
                Ok(theme) => Self::custom(theme),
                Err(e) => {
                    tracing::warn!(error = %e, "custom theme rejected, falling back to no theme");
                    Self::none()
                }
            };
        }
        match name.map(str::parse::<BuiltinTheme>) {
            Some(Ok(theme)) => Self::builtin(theme),
            Some(Err(e)) => {
                tracing::warn!(error = %e, "unknown theme, falling back to no theme");
                Self::none()
            }
            None => Self::none(),
        }
    }

    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.table.is_some()
    }

    #[must_use]
    pub const fn is_custom(&self) -> bool {
        self.custom
    }

    #[must_use]
    pub fn based_on_percent(&self) -> bool {
        self.table.as_ref().is_some_and(|t| t.based_on_percent)
    }

    /// Icon and colors for `value`, `None` without an active theme.
    #[must_use]
    pub fn resolve(&self, value: f64) -> Option<ThemeStyle> {
        self.table.as_ref().and_then(|t| t.style_for(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_band() -> CustomTheme {
        CustomTheme::new(
            &[
                CustomThemeEntry::new(0.0, 20.0).with_color("colorA"),
                CustomThemeEntry::new(20.0, 50.0).with_color("colorB"),
            ],
            false,
        )
        .unwrap()
    }

    #[test]
    fn test_stepped_lookup_boundaries() {
        let resolver = ThemeResolver::custom(two_band());
        let bar = |v| resolver.resolve(v).and_then(|s| s.bar_color);

        assert_eq!(bar(19.999).as_deref(), Some("colorA"));
        assert_eq!(bar(20.0).as_deref(), Some("colorB"));
        assert_eq!(bar(-5.0).as_deref(), Some("colorA"));
        assert_eq!(bar(100.0).as_deref(), Some("colorB"));
        assert_eq!(bar(50.0).as_deref(), Some("colorB"));
    }

    #[test]
    fn test_custom_theme_rejects_gap() {
        let err = CustomTheme::new(
            &[
                CustomThemeEntry::new(0.0, 50.0).with_color("red"),
                CustomThemeEntry::new(60.0, 100.0).with_color("blue"),
            ],
            false,
        )
        .unwrap_err();
        assert!(matches!(err, ProgressError::InvalidTheme { index: 1, .. }));
    }

    #[test]
    fn test_custom_theme_validation_rules() {
        assert!(CustomTheme::new(&[], false).is_err());
        assert!(CustomTheme::new(&[CustomThemeEntry::new(0.0, 10.0)], false).is_err());
        assert!(
            CustomTheme::new(&[CustomThemeEntry::new(10.0, 10.0).with_color("red")], false)
                .is_err()
        );
        let missing_max = CustomThemeEntry {
            min: Some(0.0),
            color: Some("red".into()),
            ..CustomThemeEntry::default()
        };
        assert!(CustomTheme::new(&[missing_max], false).is_err());
        assert!(CustomTheme::new(
            &[CustomThemeEntry::new(0.0, 10.0).with_bar_color("red")],
            false
        )
        .is_ok());
    }

    #[test]
    fn test_custom_color_precedence() {
        let theme = CustomTheme::new(
            &[CustomThemeEntry::new(0.0, 10.0)
                .with_color("red")
                .with_icon_color("#00ff00")
                .with_icon("mdi:fire")],
            false,
        )
        .unwrap();
        let style = ThemeResolver::custom(theme).resolve(5.0).unwrap();
        assert_eq!(style.icon.as_deref(), Some("mdi:fire"));
        assert_eq!(style.icon_color.as_deref(), Some("#00ff00"));
        assert_eq!(style.bar_color.as_deref(), Some("var(--red-color)"));
    }

    #[test]
    fn test_linear_lookup() {
        let table = BuiltinTheme::Light.table();
        let icon_color = |v| table.style_for(v).and_then(|s| s.icon_color);

        assert_eq!(icon_color(0.0).as_deref(), Some("#4B4B4B"));
        assert_eq!(icon_color(24.9).as_deref(), Some("#4B4B4B"));
        assert_eq!(icon_color(25.0).as_deref(), Some("#877F67"));
        assert_eq!(icon_color(99.0).as_deref(), Some("#E1C06E"));
        assert_eq!(icon_color(100.0).as_deref(), Some("#FFCF57"));
        assert_eq!(icon_color(250.0).as_deref(), Some("#FFCF57"));
        assert_eq!(icon_color(-10.0).as_deref(), Some("#4B4B4B"));
    }

    #[test]
    fn test_builtin_tables() {
        let battery = ThemeResolver::builtin(BuiltinTheme::Battery);
        let style = battery.resolve(5.0).unwrap();
        assert_eq!(style.icon.as_deref(), Some("mdi:battery-alert"));
        assert_eq!(style.bar_color.as_deref(), Some("var(--red-color)"));
        assert_eq!(
            battery.resolve(100.0).unwrap().icon.as_deref(),
            Some("mdi:battery")
        );

        let high = BuiltinTheme::OptimalWhenHigh.table();
        assert_eq!(
            high.style_for(10.0).unwrap().bar_color.as_deref(),
            Some("var(--red-color)")
        );
        assert_eq!(
            high.style_for(90.0).unwrap().bar_color.as_deref(),
            Some("var(--green-color)")
        );

        let temperature = ThemeResolver::builtin(BuiltinTheme::Temperature);
        assert!(!temperature.based_on_percent());
        assert_eq!(
            temperature.resolve(21.0).unwrap().icon.as_deref(),
            Some("mdi:thermometer-check")
        );
    }

    #[test]
    fn test_builtin_tables_are_contiguous() {
        for theme in BuiltinTheme::ALL {
            let table = theme.table();
            if table.mode != ThemeMode::Stepped {
                continue;
            }
            for pair in table.bands.windows(2) {
                assert_eq!(pair[0].max, pair[1].min, "gap in {theme}");
            }
        }
    }

    #[test]
    fn test_resolver_from_options() {
        assert!(ThemeResolver::from_options(Some("battery"), None, false).is_active());
        assert!(!ThemeResolver::from_options(Some("rainbow"), None, false).is_active());
        assert!(!ThemeResolver::from_options(None, None, false).is_active());

        let invalid = [CustomThemeEntry::new(0.0, 10.0)];
        let resolver = ThemeResolver::from_options(Some("battery"), Some(invalid.as_slice()), false);
        assert!(!resolver.is_active());

        let valid = [CustomThemeEntry::new(0.0, 10.0).with_color("red")];
        let resolver = ThemeResolver::from_options(Some("battery"), Some(valid.as_slice()), true);
        assert!(resolver.is_custom());
        assert!(resolver.based_on_percent());
    }

    #[test]
    fn test_theme_name_parsing() {
        assert_eq!(
            "optimal_when_low".parse::<BuiltinTheme>().unwrap(),
            BuiltinTheme::OptimalWhenLow
        );
        assert_eq!(" PM25 ".parse::<BuiltinTheme>().unwrap(), BuiltinTheme::Pm25);
        assert!("rainbow".parse::<BuiltinTheme>().is_err());
    }

    #[test]
    fn test_css_color() {
        assert_eq!(css_color("deep-purple"), "var(--deep-purple-color)");
        assert_eq!(css_color("rgb(1, 2, 3)"), "rgb(1, 2, 3)");
        assert_eq!(css_color("var(--my-color)"), "var(--my-color)");
    }
}
