//! Card configuration: loading, defaults and validation.
//!
//! The configuration lives in a RON file, by default
//! `~/.config/entity-progress/config.ron`. Structural problems are reported
//! as [`ConfigMessage`]s so the card can keep running in a degraded state.

use crate::entity::{EntityKind, EntityRef, ValueOrEntity};
use crate::error::{ConfigMessage, ProgressError, Result};
use crate::format::{NumberFormat, UnitSpacing};
use crate::scalar::{Decimal, Unit, UnitKind};
use crate::source::EntitySource;
use crate::theme::{BuiltinTheme, CustomTheme, CustomThemeEntry};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

const CONFIG_DIR_NAME: &str = "entity-progress";
const CONFIG_FILE_NAME: &str = "config.ron";

/// Default lower bound when neither config nor entity provide one
pub const DEFAULT_MIN: f64 = 0.0;
/// Default upper bound when neither config nor entity provide one
pub const DEFAULT_MAX: f64 = 100.0;

/// How a watermark is drawn on the bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WatermarkType {
    #[default]
    Blended,
    Area,
    Striped,
    Triangle,
    Round,
    Line,
}

impl fmt::Display for WatermarkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Blended => "blended",
            Self::Area => "area",
            Self::Striped => "striped",
            Self::Triangle => "triangle",
            Self::Round => "round",
            Self::Line => "line",
        };
        f.write_str(name)
    }
}

/// Low/high threshold markers, in source-value units.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct WatermarkSpec {
    #[serde(default = "default_watermark_low")]
    pub low: f64,
    #[serde(default = "default_watermark_high")]
    pub high: f64,
    #[serde(default = "default_watermark_color")]
    pub low_color: String,
    #[serde(default = "default_watermark_color")]
    pub high_color: String,
    #[serde(default = "default_watermark_opacity")]
    pub opacity: f64,
    #[serde(default, rename = "type")]
    pub kind: WatermarkType,
    #[serde(default = "default_line_size")]
    pub line_size: String,
    #[serde(default)]
    pub disable_low: bool,
    #[serde(default)]
    pub disable_high: bool,
}

impl Default for WatermarkSpec {
    fn default() -> Self {
        Self {
            low: default_watermark_low(),
            high: default_watermark_high(),
            low_color: default_watermark_color(),
            high_color: default_watermark_color(),
            opacity: default_watermark_opacity(),
            kind: WatermarkType::default(),
            line_size: default_line_size(),
            disable_low: false,
            disable_high: false,
        }
    }
}

fn default_watermark_low() -> f64 {
    20.0
}

fn default_watermark_high() -> f64 {
    80.0
}

fn default_watermark_color() -> String {
    "red".to_owned()
}

fn default_watermark_opacity() -> f64 {
    0.8
}

fn default_line_size() -> String {
    "1px".to_owned()
}

fn default_locale() -> String {
    "en".to_owned()
}

/// Options of one progress card.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CardConfig {
    /// Entity whose value drives the bar
    #[serde(default)]
    pub entity: Option<String>,
    /// Attribute to read instead of the entity state
    #[serde(default)]
    pub attribute: Option<String>,
    /// Further entities summed with the main one into a stacked bar
    #[serde(default)]
    pub entities: Vec<EntityRef>,
    #[serde(default)]
    pub min_value: Option<ValueOrEntity>,
    #[serde(default)]
    pub max_value: Option<ValueOrEntity>,
    /// Fraction digits; defaults depend on the displayed unit
    #[serde(default)]
    pub decimal: Option<i64>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub disable_unit: bool,
    #[serde(default)]
    pub unit_spacing: UnitSpacing,
    #[serde(default)]
    pub reverse: bool,
    #[serde(default)]
    pub center_zero: bool,
    /// Built-in theme name
    #[serde(default)]
    pub theme: Option<String>,
    /// User theme; takes precedence over `theme`
    #[serde(default)]
    pub custom_theme: Option<Vec<CustomThemeEntry>>,
    #[serde(default)]
    pub custom_theme_based_on_percent: bool,
    #[serde(default)]
    pub icon: Option<String>,
    /// Icon color
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub bar_color: Option<String>,
    #[serde(default)]
    pub watermark: Option<WatermarkSpec>,
    #[serde(default = "default_locale")]
    pub locale: String,
    #[serde(default)]
    pub number_format: NumberFormat,
}

impl Default for CardConfig {
    fn default() -> Self {
        Self {
            entity: None,
            attribute: None,
            entities: Vec::new(),
            min_value: None,
            max_value: None,
            decimal: None,
            unit: None,
            disable_unit: false,
            unit_spacing: UnitSpacing::default(),
            reverse: false,
            center_zero: false,
            theme: None,
            custom_theme: None,
            custom_theme_based_on_percent: false,
            icon: None,
            color: None,
            bar_color: None,
            watermark: None,
            locale: default_locale(),
            number_format: NumberFormat::default(),
        }
    }
}

impl CardConfig {
    /// Create a configuration for `entity` with default options.
    #[must_use]
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: Some(entity.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = Some(attribute.into());
        self
    }

    #[must_use]
    pub fn with_range(mut self, min: impl Into<ValueOrEntity>, max: impl Into<ValueOrEntity>) -> Self {
        self.min_value = Some(min.into());
        self.max_value = Some(max.into());
        self
    }

    #[must_use]
    pub fn with_decimal(mut self, decimal: i64) -> Self {
        self.decimal = Some(decimal);
        self
    }

    #[must_use]
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    #[must_use]
    pub fn with_theme(mut self, theme: BuiltinTheme) -> Self {
        self.theme = Some(theme.to_string());
        self
    }

    #[must_use]
    pub fn with_custom_theme(mut self, entries: Vec<CustomThemeEntry>) -> Self {
        self.custom_theme = Some(entries);
        self
    }

    #[must_use]
    pub fn with_watermark(mut self, watermark: WatermarkSpec) -> Self {
        self.watermark = Some(watermark);
        self
    }

    #[must_use]
    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = locale.into();
        self
    }

    #[must_use]
    pub fn with_additional_entity(mut self, target: EntityRef) -> Self {
        self.entities.push(target);
        self
    }

    #[must_use]
    pub fn reversed(mut self, reverse: bool) -> Self {
        self.reverse = reverse;
        self
    }

    #[must_use]
    pub fn center_zero(mut self, center_zero: bool) -> Self {
        self.center_zero = center_zero;
        self
    }

    /// Main entity as a resolver target.
    #[must_use]
    pub fn target(&self) -> Option<EntityRef> {
        let entity = self.entity.as_deref().filter(|e| !e.trim().is_empty())?;
        Some(EntityRef {
            entity: entity.to_owned(),
            attribute: self.attribute.clone(),
        })
    }

    /// Unit in effect for an entity of `kind`.
    #[must_use]
    pub fn effective_unit(&self, kind: EntityKind) -> Unit {
        let unit = Unit::new(self.unit.as_deref().unwrap_or(kind.default_unit()));
        if self.disable_unit {
            unit.hidden()
        } else {
            unit
        }
    }

    /// Unit the value is measured in: the configured one, else the one the
    /// host reports, else the kind's default. Decides °F→°C conversion for
    /// value themes, independent of what is displayed.
    #[must_use]
    pub fn measurement_unit(&self, kind: EntityKind, host_unit: Option<&str>) -> Unit {
        Unit::new(
            self.unit
                .as_deref()
                .or(host_unit)
                .unwrap_or(kind.default_unit()),
        )
    }

    /// Precision in effect: the configured one, else 0 for percentages,
    /// clocks and counters and 2 for other units.
    #[must_use]
    pub fn effective_decimal(&self, kind: EntityKind, unit: &Unit) -> Decimal {
        if let Some(decimal) = self.decimal.and_then(Decimal::new) {
            return decimal;
        }
        let digits = match (unit.kind(), kind) {
            (UnitKind::Percent | UnitKind::Timer | UnitKind::FlexTimer, _) => 0,
            (_, EntityKind::Counter) => 0,
            _ => 2,
        };
        Decimal::new(digits).unwrap_or_default()
    }

    /// Whether watermark thresholds are already expressed in percent.
    #[must_use]
    pub fn watermark_in_percent(&self, unit: &Unit) -> bool {
        unit.is_percent() || self.disable_unit
    }

    /// Check the configuration against `source`.
    ///
    /// Returns every problem found; an empty list means the card is fully
    /// usable. Error-severity messages put the card in its not-available
    /// state, warnings only disable the affected feature.
    #[must_use]
    pub fn validate(&self, source: &dyn EntitySource) -> Vec<ConfigMessage> {
        let mut messages = Vec::new();

        match self.target() {
            None => messages.push(ConfigMessage::error("Entity required")),
            Some(target) if !source.has_entity(&target.entity) => {
                messages.push(ConfigMessage::error(format!(
                    "Entity not found: {}",
                    target.entity
                )));
            }
            Some(EntityRef {
                entity,
                attribute: Some(attribute),
            }) => {
                if source.attribute(&entity, &attribute).is_none() {
                    messages.push(ConfigMessage::error(format!(
                        "Attribute '{attribute}' not found on {entity}"
                    )));
                }
            }
            Some(_) => {}
        }

        if let Some(decimal) = self.decimal {
            if decimal < 0 {
                messages.push(ConfigMessage::error(format!(
                    "decimal must be a positive integer, got {decimal}"
                )));
            }
        }

        if let (Some(ValueOrEntity::Number(min)), Some(ValueOrEntity::Number(max))) =
            (&self.min_value, &self.max_value)
        {
            if min >= max {
                messages.push(ConfigMessage::error(format!(
                    "min_value ({min}) must be lower than max_value ({max})"
                )));
            }
        }

        for (field, bound) in [("min_value", &self.min_value), ("max_value", &self.max_value)] {
            if let Some(entity) = bound.as_ref().and_then(ValueOrEntity::entity) {
                if !source.has_entity(entity) {
                    messages.push(ConfigMessage::warning(format!(
                        "{field} entity not found: {entity}"
                    )));
                }
            }
        }

        for extra in &self.entities {
            if !source.has_entity(&extra.entity) {
                messages.push(ConfigMessage::warning(format!(
                    "Entity not found: {}",
                    extra.entity
                )));
            }
        }

        if let Some(entries) = &self.custom_theme {
            if let Err(e) = CustomTheme::new(entries, self.custom_theme_based_on_percent) {
                messages.push(ConfigMessage::warning(e.to_string()));
            }
            if let Some(name) = &self.theme {
                messages.push(ConfigMessage::info(format!(
                    "custom_theme is set, theme '{name}' is ignored"
                )));
            }
        } else if let Some(name) = &self.theme {
            if let Err(e) = name.parse::<BuiltinTheme>() {
                messages.push(ConfigMessage::warning(e.to_string()));
            }
        }

        if let Some(watermark) = &self.watermark {
            if !watermark.disable_low && !watermark.disable_high && watermark.low > watermark.high {
                messages.push(ConfigMessage::warning(format!(
                    "watermark low ({}) is above high ({})",
                    watermark.low, watermark.high
                )));
            }
        }

        messages
    }

    /// Load configuration from the standard config file location.
    ///
    /// Searches for config in:
    /// 1. ~/.config/entity-progress/config.ron
    /// 2. ~/.entity-progress/config.ron (fallback)
    ///
    /// Returns default config if no file is found.
    pub fn load() -> Result<Self> {
        if let Some(config_path) = Self::find_config_file() {
            Self::load_from_file(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_ron(&content)
    }

    /// Parse configuration from RON text.
    pub fn from_ron(content: &str) -> Result<Self> {
        ron::from_str(content)
            .map_err(|e| ProgressError::parse(format!("Failed to parse config file: {e}")))
    }

    /// Find the config file in standard locations.
    #[must_use]
    pub fn find_config_file() -> Option<PathBuf> {
        if let Some(config_dir) = dirs::config_dir() {
            let xdg_path = config_dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME);
            if xdg_path.exists() {
                return Some(xdg_path);
            }
        }

        if let Some(home_dir) = dirs::home_dir() {
            let home_path = home_dir
                .join(format!(".{CONFIG_DIR_NAME}"))
                .join(CONFIG_FILE_NAME);
            if home_path.exists() {
                return Some(home_path);
            }
        }

        None
    }

    /// Get the default config file path for writing.
    #[must_use]
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Save configuration to a specific file path.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| ProgressError::parse(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Write a commented example configuration to `path`.
    pub fn save_example_config_to_file(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, EXAMPLE_CONFIG)?;
        Ok(())
    }
}

/// Commented example configuration.
pub const EXAMPLE_CONFIG: &str = r##"// entity-progress configuration
// Copy this to ~/.config/entity-progress/config.ron and adjust.

(
    // Entity whose value drives the bar
    entity: Some("sensor.battery_phone"),

    // Read an attribute instead of the state (e.g. "brightness")
    attribute: None,

    // Extra entities summed into a stacked bar
    entities: [],

    // Bounds: a number, an entity id, or (entity: "...", attribute: Some("..."))
    min_value: Some(0),
    max_value: Some(100),

    // Fraction digits (0 for percentages by default)
    decimal: None,

    // Displayed unit. "%" shows the percentage, "timer"/"flextimer"
    // render a clock, anything else shows the value with that unit.
    unit: None,
    disable_unit: false,

    // auto, space, no_space
    unit_spacing: auto,

    reverse: false,
    center_zero: false,

    // battery, cpu, memory, optimal_when_low, optimal_when_high,
    // light, temperature, humidity, pm25, voc
    theme: Some("battery"),

    // Contiguous bands, each with min/max and a color:
    // custom_theme: Some([
    //     (min: Some(0), max: Some(50), color: Some("red")),
    //     (min: Some(50), max: Some(100), color: Some("green")),
    // ]),
    custom_theme: None,
    custom_theme_based_on_percent: false,

    icon: None,
    color: None,
    bar_color: None,

    watermark: Some((
        low: 20,
        high: 80,
        low_color: "red",
        high_color: "red",
        opacity: 0.8,
        type: blended,
        line_size: "1px",
    )),

    locale: "en",
    // language, system, comma_decimal, decimal_comma, space_comma, none
    number_format: language,
)
"##;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{EntityState, StateSnapshot};
    use serde_json::json;

    fn source() -> StateSnapshot {
        StateSnapshot::new()
            .with_entity(
                "light.desk",
                EntityState::new("on").with_attribute("brightness", json!(128)),
            )
            .with_entity("sensor.capacity", EntityState::new("80"))
    }

    #[test]
    fn test_valid_config_has_no_messages() {
        let config = CardConfig::new("light.desk")
            .with_attribute("brightness")
            .with_range(0.0, ValueOrEntity::Id("sensor.capacity".into()))
            .with_theme(BuiltinTheme::Light);
        assert!(config.validate(&source()).is_empty());
    }

    #[test]
    fn test_missing_and_unknown_entity() {
        let messages = CardConfig::default().validate(&source());
        assert_eq!(messages, vec![ConfigMessage::error("Entity required")]);

        let messages = CardConfig::new("sensor.nope").validate(&source());
        assert_eq!(messages.len(), 1);
        assert!(messages[0].is_blocking());
        assert!(messages[0].content.contains("sensor.nope"));
    }

    #[test]
    fn test_missing_attribute() {
        let messages = CardConfig::new("light.desk")
            .with_attribute("color_temp")
            .validate(&source());
        assert_eq!(messages.len(), 1);
        assert!(messages[0].content.contains("color_temp"));
    }

    #[test]
    fn test_invalid_range_and_decimal() {
        let messages = CardConfig::new("light.desk")
            .with_range(50.0, 10.0)
            .with_decimal(-1)
            .validate(&source());
        assert_eq!(messages.len(), 2);
        assert!(messages.iter().all(ConfigMessage::is_blocking));
    }

    #[test]
    fn test_theme_problems_are_warnings() {
        let messages = CardConfig::new("light.desk")
            .with_custom_theme(vec![
                CustomThemeEntry::new(0.0, 50.0).with_color("red"),
                CustomThemeEntry::new(60.0, 100.0).with_color("blue"),
            ])
            .validate(&source());
        assert_eq!(messages.len(), 1);
        assert!(!messages[0].is_blocking());

        let mut config = CardConfig::new("light.desk");
        config.theme = Some("rainbow".into());
        let messages = config.validate(&source());
        assert_eq!(messages.len(), 1);
        assert!(!messages[0].is_blocking());
    }

    #[test]
    fn test_custom_theme_shadowing_named_theme_is_info() {
        let config = CardConfig::new("light.desk")
            .with_theme(BuiltinTheme::Battery)
            .with_custom_theme(vec![
                CustomThemeEntry::new(0.0, 50.0).with_color("red"),
                CustomThemeEntry::new(50.0, 100.0).with_color("green"),
            ]);
        let messages = config.validate(&source());
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].severity, crate::error::Severity::Info);
        assert!(messages[0].content.contains("battery"));
        assert!(!messages[0].is_blocking());
    }

    #[test]
    fn test_effective_unit_and_decimal() {
        let config = CardConfig::new("sensor.x");
        let unit = config.effective_unit(EntityKind::Plain);
        assert!(unit.is_percent());
        assert_eq!(config.effective_decimal(EntityKind::Plain, &unit).digits(), 0);

        let unit = config.effective_unit(EntityKind::Duration);
        assert!(unit.is_timer());

        let config = CardConfig::new("sensor.x").with_unit("kWh");
        let unit = config.effective_unit(EntityKind::Plain);
        assert_eq!(config.effective_decimal(EntityKind::Plain, &unit).digits(), 2);
        assert_eq!(config.effective_decimal(EntityKind::Counter, &unit).digits(), 0);

        let config = config.with_decimal(3);
        assert_eq!(config.effective_decimal(EntityKind::Plain, &unit).digits(), 3);
    }

    #[test]
    fn test_measurement_unit_falls_back_to_host() {
        let config = CardConfig::new("sensor.outdoor");
        assert!(config
            .measurement_unit(EntityKind::Plain, Some("°F"))
            .is_fahrenheit());
        assert!(config.measurement_unit(EntityKind::Plain, None).is_percent());
        assert!(config.effective_unit(EntityKind::Plain).is_percent());

        let config = config.with_unit("°C");
        assert!(!config
            .measurement_unit(EntityKind::Plain, Some("°F"))
            .is_fahrenheit());
    }

    #[test]
    fn test_parse_ron() {
        let config = CardConfig::from_ron(
            r#"(
                entity: Some("sensor.power"),
                max_value: Some("sensor.capacity"),
                unit: Some("W"),
                unit_spacing: no_space,
                watermark: Some((high: 90, type: line)),
            )"#,
        )
        .unwrap();

        assert_eq!(config.entity.as_deref(), Some("sensor.power"));
        assert_eq!(
            config.max_value,
            Some(ValueOrEntity::Id("sensor.capacity".into()))
        );
        assert_eq!(config.unit_spacing, UnitSpacing::NoSpace);
        let watermark = config.watermark.unwrap();
        assert_eq!(watermark.low, 20.0);
        assert_eq!(watermark.high, 90.0);
        assert_eq!(watermark.kind, WatermarkType::Line);
        assert_eq!(config.locale, "en");
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE_NAME);

        let config = CardConfig::new("sensor.capacity")
            .with_range(0.0, ValueOrEntity::Id("light.desk".into()))
            .with_theme(BuiltinTheme::Cpu)
            .with_watermark(WatermarkSpec::default());
        config.save_to_file(&path).unwrap();

        assert_eq!(CardConfig::load_from_file(&path).unwrap(), config);
    }

    #[test]
    fn test_save_example_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        CardConfig::save_example_config_to_file(&path).unwrap();
        assert!(CardConfig::load_from_file(&path).is_ok());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = CardConfig::load_from_file(&dir.path().join("absent.ron")).unwrap_err();
        assert_eq!(err.category(), "io");
    }

    #[test]
    fn test_example_config_parses() {
        let config = CardConfig::from_ron(EXAMPLE_CONFIG).unwrap();
        assert_eq!(config.entity.as_deref(), Some("sensor.battery_phone"));
        assert_eq!(config.theme.as_deref(), Some("battery"));
        assert!(config.watermark.is_some());
    }
}
