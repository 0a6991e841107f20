//! The progress card: one refresh of the full pipeline.
//!
//! A [`ProgressCard`] owns its configuration and the pieces derived from it
//! (theme, number formatter). Each [`ProgressCard::refresh`] reads the
//! current entity states through an [`EntitySource`] and produces a
//! [`CardOutput`] ready to be rendered.

use crate::config::{CardConfig, WatermarkSpec, WatermarkType, DEFAULT_MAX, DEFAULT_MIN};
use crate::entity::{resolve, EntityValue, StateLabel, ValueOrEntity};
use crate::error::{ConfigMessage, Result};
use crate::format::NumberFormatter;
use crate::multi::MultiEntityAggregator;
use crate::percent::{PercentParams, PercentageResult, ThemeInput};
use crate::scalar::Unit;
use crate::source::EntitySource;
use crate::theme::{css_color, ThemeResolver, ThemeStyle};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

const DISABLED_COLOR: &str = "disabled";
const DEFAULT_BAR_COLOR: &str = "var(--state-icon-color)";

/// Resolved watermark markers, positioned in percent of the bar.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WatermarkOutput {
    pub low: Option<f64>,
    pub high: Option<f64>,
    pub low_color: String,
    pub high_color: String,
    pub opacity: f64,
    #[serde(rename = "type")]
    pub kind: WatermarkType,
    pub line_size: String,
}

/// Everything needed to draw the card after one refresh.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CardOutput {
    pub state: StateLabel,
    /// Bar fill, -100..=100 for center-zero bars, 0..=100 otherwise
    pub percent: f64,
    pub display: String,
    pub icon: Option<String>,
    pub icon_color: Option<String>,
    pub bar_color: String,
    pub watermark: Option<WatermarkOutput>,
    /// Stacked bar background when several entities are aggregated
    pub gradient: Option<String>,
    pub messages: Vec<ConfigMessage>,
    #[serde(rename = "refresh_interval_ms", with = "optional_millis")]
    pub refresh_interval: Option<Duration>,
}

impl CardOutput {
    /// Whether the bar shows a live value.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.state.is_available() && !self.messages.iter().any(ConfigMessage::is_blocking)
    }
}

/// Sources a color can come from, tried in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColorSource {
    Unavailable,
    Configured,
    Theme,
    Fallback,
}

const COLOR_PRECEDENCE: [ColorSource; 4] = [
    ColorSource::Unavailable,
    ColorSource::Configured,
    ColorSource::Theme,
    ColorSource::Fallback,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColorSlot {
    Icon,
    Bar,
}

struct ColorContext<'a> {
    available: bool,
    config: &'a CardConfig,
    style: Option<&'a ThemeStyle>,
}

impl ColorSource {
    fn color_for(self, slot: ColorSlot, ctx: &ColorContext<'_>) -> Option<String> {
        match self {
            Self::Unavailable => (!ctx.available).then(|| css_color(DISABLED_COLOR)),
            Self::Configured => match slot {
                ColorSlot::Icon => ctx.config.color.as_deref().map(css_color),
                ColorSlot::Bar => ctx.config.bar_color.as_deref().map(css_color),
            },
            Self::Theme => ctx.style.and_then(|s| match slot {
                ColorSlot::Icon => s.icon_color.clone(),
                ColorSlot::Bar => s.bar_color.clone(),
            }),
            Self::Fallback => match slot {
                ColorSlot::Icon => None,
                ColorSlot::Bar => Some(DEFAULT_BAR_COLOR.to_owned()),
            },
        }
    }
}

fn pick_color(slot: ColorSlot, ctx: &ColorContext<'_>) -> Option<String> {
    COLOR_PRECEDENCE
        .iter()
        .find_map(|source| source.color_for(slot, ctx))
}

/// A configured card.
///
/// # Examples
///
/// ```rust
/// use chrono::Utc;
/// use entity_progress_core::card::ProgressCard;
/// use entity_progress_core::config::CardConfig;
/// use entity_progress_core::source::{EntityState, StateSnapshot};
/// use entity_progress_core::theme::BuiltinTheme;
///
/// let states = StateSnapshot::new().with_entity("sensor.phone", EntityState::new("15"));
/// let card = ProgressCard::new(CardConfig::new("sensor.phone").with_theme(BuiltinTheme::Battery));
///
/// let output = card.refresh(&states, Utc::now()).unwrap();
/// assert_eq!(output.percent, 15.0);
/// assert_eq!(output.display, "15%");
/// assert_eq!(output.icon_color.as_deref(), Some("var(--deep-orange-color)"));
/// ```
#[derive(Debug, Clone)]
pub struct ProgressCard {
    config: CardConfig,
    theme: ThemeResolver,
    formatter: NumberFormatter,
}

impl ProgressCard {
    #[must_use]
    pub fn new(config: CardConfig) -> Self {
        let theme = ThemeResolver::from_options(
            config.theme.as_deref(),
            config.custom_theme.as_deref(),
            config.custom_theme_based_on_percent,
        );
        let formatter = NumberFormatter::new(&config.locale, config.number_format);
        Self {
            config,
            theme,
            formatter,
        }
    }

    #[must_use]
    pub fn config(&self) -> &CardConfig {
        &self.config
    }

    /// Run the pipeline once against the current entity states.
    ///
    /// Configuration problems are returned inside the output; only
    /// resolution failures (unknown timer states, unreadable timestamps,
    /// unknown duration units) are errors.
    pub fn refresh(&self, source: &dyn EntitySource, now: DateTime<Utc>) -> Result<CardOutput> {
        let messages = self.config.validate(source);
        for message in &messages {
            tracing::warn!(severity = %message.severity, "{}", message.content);
        }

        let Some(target) = self.config.target() else {
            return Ok(self.unavailable(StateLabel::InvalidConfig, messages));
        };
        let main = resolve(source, &target, now)?;
        if main.state.is_available() && messages.iter().any(ConfigMessage::is_blocking) {
            return Ok(self.unavailable(StateLabel::InvalidConfig, messages));
        }
        if !main.is_usable() {
            return Ok(self.unavailable(main.state, messages));
        }

        let unit = self.config.effective_unit(main.kind);
        let decimal = self.config.effective_decimal(main.kind, &unit);
        let refresh_interval = main.refresh_interval();
        let state = main.state;

        let aggregator = self.aggregate(source, main.clone(), now)?;
        let current = aggregator
            .as_ref()
            .map_or(main.value, MultiEntityAggregator::total_value);
        let (min, max) = self.bounds(source, &main, now)?;

        let params = PercentParams::new(current, min, max)
            .with_decimal(decimal)
            .reversed(self.config.reverse)
            .center_zero(self.config.center_zero);
        let result = params.compute();

        let measured = self.config.measurement_unit(main.kind, main.unit.as_deref());
        let style = self.theme_style(&result, &measured);
        let ctx = ColorContext {
            available: true,
            config: &self.config,
            style: style.as_ref(),
        };
        let icon_color = pick_color(ColorSlot::Icon, &ctx);
        let bar_color = pick_color(ColorSlot::Bar, &ctx).unwrap_or_else(|| DEFAULT_BAR_COLOR.to_owned());
        let icon = self
            .config
            .icon
            .clone()
            .or_else(|| style.as_ref().and_then(|s| s.icon.clone()));

        let text = result.display_string(&params, &unit, self.config.unit_spacing, &self.formatter);
        let watermark = self
            .config
            .watermark
            .as_ref()
            .map(|spec| self.watermark(spec, &result, &params, &unit));
        let gradient = aggregator.and_then(|agg| agg.gradient(&bar_color));

        tracing::debug!(
            entity = %target.entity,
            percent = result.percent,
            text = %text,
            "card refreshed"
        );

        Ok(CardOutput {
            state,
            percent: result.percent,
            display: text,
            icon,
            icon_color,
            bar_color,
            watermark,
            gradient,
            messages,
            refresh_interval,
        })
    }

    fn unavailable(&self, state: StateLabel, messages: Vec<ConfigMessage>) -> CardOutput {
        let ctx = ColorContext {
            available: false,
            config: &self.config,
            style: None,
        };
        CardOutput {
            state,
            percent: 0.0,
            display: state.to_string(),
            icon: self.config.icon.clone(),
            icon_color: pick_color(ColorSlot::Icon, &ctx),
            bar_color: pick_color(ColorSlot::Bar, &ctx).unwrap_or_else(|| DEFAULT_BAR_COLOR.to_owned()),
            watermark: None,
            gradient: None,
            messages,
            refresh_interval: None,
        }
    }

    /// Aggregator over the main and additional entities; `None` for a
    /// single-entity card.
    fn aggregate(
        &self,
        source: &dyn EntitySource,
        main: EntityValue,
        now: DateTime<Utc>,
    ) -> Result<Option<MultiEntityAggregator>> {
        if self.config.entities.is_empty() {
            return Ok(None);
        }
        let mut aggregator = MultiEntityAggregator::new();
        aggregator.push(main);
        for extra in &self.config.entities {
            aggregator.push(resolve(source, extra, now)?);
        }
        Ok(Some(aggregator))
    }

    /// Configured bound, else the entity's own, else the default.
    fn bounds(
        &self,
        source: &dyn EntitySource,
        main: &EntityValue,
        now: DateTime<Utc>,
    ) -> Result<(f64, f64)> {
        let bound = |configured: Option<&ValueOrEntity>| -> Result<Option<f64>> {
            match configured {
                Some(bound) => bound.resolve(source, now),
                None => Ok(None),
            }
        };
        let min = bound(self.config.min_value.as_ref())?
            .or(main.min)
            .unwrap_or(DEFAULT_MIN);
        let max = bound(self.config.max_value.as_ref())?
            .or(main.max)
            .unwrap_or(DEFAULT_MAX);
        Ok((min, max))
    }

    fn theme_style(&self, result: &PercentageResult, unit: &Unit) -> Option<ThemeStyle> {
        if !self.theme.is_active() {
            return None;
        }
        let input = ThemeInput {
            is_custom_theme: self.theme.is_custom(),
            based_on_percent: self.theme.based_on_percent(),
        };
        self.theme.resolve(result.theme_value(input, unit))
    }

    fn watermark(
        &self,
        spec: &WatermarkSpec,
        result: &PercentageResult,
        params: &PercentParams,
        unit: &Unit,
    ) -> WatermarkOutput {
        let percent_space = self.config.watermark_in_percent(unit);
        let position = |raw: f64| result.watermark_position(raw, params, percent_space);
        WatermarkOutput {
            low: (!spec.disable_low).then(|| position(spec.low)),
            high: (!spec.disable_high).then(|| position(spec.high)),
            low_color: css_color(&spec.low_color),
            high_color: css_color(&spec.high_color),
            opacity: spec.opacity,
            kind: spec.kind,
            line_size: spec.line_size.clone(),
        }
    }
}

mod optional_millis {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_some(&(d.as_millis() as u64)),
            None => serializer.serialize_none(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityRef;
    use crate::source::{EntityState, StateSnapshot};
    use crate::theme::{BuiltinTheme, CustomThemeEntry};
    use chrono::TimeZone;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn states() -> StateSnapshot {
        StateSnapshot::new()
            .with_entity("sensor.battery", EntityState::new("15"))
            .with_entity("sensor.offline", EntityState::new("unavailable"))
            .with_entity(
                "sensor.temp",
                EntityState::new("21.456").with_attribute("unit_of_measurement", json!("°C")),
            )
            .with_entity("sensor.capacity", EntityState::new("200"))
            .with_entity(
                "light.desk",
                EntityState::new("on").with_attribute("brightness", json!(255)),
            )
            .with_entity("sensor.a", EntityState::new("10"))
            .with_entity("sensor.b", EntityState::new("30"))
            .with_entity("sensor.c", EntityState::new("60"))
    }

    fn refresh(config: CardConfig) -> CardOutput {
        ProgressCard::new(config).refresh(&states(), now()).unwrap()
    }

    #[test]
    fn test_plain_percentage() {
        let output = refresh(CardConfig::new("sensor.battery"));
        assert_eq!(output.state, StateLabel::Available);
        assert_eq!(output.percent, 15.0);
        assert_eq!(output.display, "15%");
        assert_eq!(output.bar_color, DEFAULT_BAR_COLOR);
        assert_eq!(output.icon_color, None);
        assert!(output.messages.is_empty());
        assert!(output.is_available());
    }

    #[test]
    fn test_light_brightness_default_attribute() {
        let output = refresh(CardConfig::new("light.desk"));
        assert_eq!(output.percent, 100.0);
    }

    #[test]
    fn test_entity_bound_and_value_display() {
        let config = CardConfig::new("sensor.temp")
            .with_range(0.0, ValueOrEntity::Id("sensor.capacity".into()))
            .with_unit("°C")
            .with_decimal(1);
        let output = refresh(config);
        assert_eq!(output.percent, 10.7);
        assert_eq!(output.display, "21.5 °C");
    }

    #[test]
    fn test_unavailable_entity_uses_disabled_colors() {
        let mut config = CardConfig::new("sensor.offline");
        config.color = Some("blue".into());
        let output = refresh(config);
        assert_eq!(output.state, StateLabel::Unavailable);
        assert_eq!(output.percent, 0.0);
        assert_eq!(output.display, "unavailable");
        assert_eq!(output.icon_color.as_deref(), Some("var(--disabled-color)"));
        assert_eq!(output.bar_color, "var(--disabled-color)");
        assert!(!output.is_available());
    }

    #[test]
    fn test_missing_entity_reports_message() {
        let output = refresh(CardConfig::new("sensor.nope"));
        assert_eq!(output.state, StateLabel::NotFound);
        assert_eq!(output.messages.len(), 1);
        assert!(!output.is_available());
    }

    #[test]
    fn test_blocking_message_on_live_entity_is_invalid_config() {
        let output = refresh(CardConfig::new("sensor.battery").with_decimal(-1));
        assert_eq!(output.state, StateLabel::InvalidConfig);
        assert_eq!(output.display, "invalid_config");
        assert_eq!(output.bar_color, "var(--disabled-color)");
        assert!(output.messages[0].is_blocking());
        assert!(!output.is_available());

        let output = refresh(CardConfig::default());
        assert_eq!(output.state, StateLabel::InvalidConfig);
    }

    #[test]
    fn test_host_fahrenheit_unit_drives_theme() {
        let source = StateSnapshot::new().with_entity(
            "sensor.outdoor",
            EntityState::new("77").with_attribute("unit_of_measurement", json!("°F")),
        );
        let card = ProgressCard::new(
            CardConfig::new("sensor.outdoor")
                .with_range(32.0, 212.0)
                .with_theme(BuiltinTheme::Temperature),
        );
        let output = card.refresh(&source, now()).unwrap();
        assert_eq!(output.display, "25%");
        assert_eq!(output.icon.as_deref(), Some("mdi:thermometer-check"));
        assert_eq!(output.bar_color, "var(--green-color)");
    }

    #[test]
    fn test_active_timer_without_finishes_at_is_not_an_error() {
        let source = StateSnapshot::new().with_entity(
            "timer.tea",
            EntityState::new("active").with_attribute("duration", json!("0:05:00")),
        );
        let card = ProgressCard::new(CardConfig::new("timer.tea"));
        let output = card.refresh(&source, now()).unwrap();
        assert_eq!(output.state, StateLabel::Active);
        assert_eq!(output.percent, 0.0);
        assert_eq!(output.bar_color, "var(--disabled-color)");
        assert!(output.messages.is_empty());
    }

    #[test]
    fn test_configured_color_beats_theme() {
        let mut config = CardConfig::new("sensor.battery").with_theme(BuiltinTheme::Battery);
        let themed = refresh(config.clone());
        assert_eq!(themed.icon_color.as_deref(), Some("var(--deep-orange-color)"));

        config.color = Some("purple".into());
        let output = refresh(config);
        assert_eq!(output.icon_color.as_deref(), Some("var(--purple-color)"));
        assert_eq!(output.bar_color, themed.bar_color);
    }

    #[test]
    fn test_custom_theme_on_value() {
        let config = CardConfig::new("sensor.battery")
            .with_range(0.0, 30.0)
            .with_custom_theme(vec![
                CustomThemeEntry::new(0.0, 10.0).with_color("red"),
                CustomThemeEntry::new(10.0, 20.0)
                    .with_color("green")
                    .with_icon("mdi:check"),
                CustomThemeEntry::new(20.0, 30.0).with_color("blue"),
            ]);
        let output = refresh(config);
        assert_eq!(output.percent, 50.0);
        assert_eq!(output.icon.as_deref(), Some("mdi:check"));
        assert_eq!(output.bar_color, "var(--green-color)");
    }

    #[test]
    fn test_invalid_custom_theme_falls_back() {
        let config = CardConfig::new("sensor.battery").with_custom_theme(vec![
            CustomThemeEntry::new(0.0, 10.0).with_color("red"),
            CustomThemeEntry::new(20.0, 30.0).with_color("blue"),
        ]);
        let output = refresh(config);
        assert_eq!(output.bar_color, DEFAULT_BAR_COLOR);
        assert_eq!(output.messages.len(), 1);
        assert!(output.is_available());
    }

    #[test]
    fn test_zero_range_shows_div0() {
        let output = refresh(CardConfig::new("sensor.battery").with_range(
            ValueOrEntity::Id("sensor.capacity".into()),
            ValueOrEntity::Id("sensor.capacity".into()),
        ));
        assert_eq!(output.percent, 0.0);
        assert_eq!(output.display, crate::percent::DIV0_LABEL);
    }

    #[test]
    fn test_reversed() {
        let output = refresh(CardConfig::new("sensor.battery").reversed(true));
        assert_eq!(output.percent, 85.0);
    }

    #[test]
    fn test_watermark_positions() {
        let config = CardConfig::new("sensor.temp")
            .with_unit("°C")
            .with_range(0.0, 40.0)
            .with_watermark(WatermarkSpec {
                low: 10.0,
                high: 30.0,
                disable_high: true,
                ..WatermarkSpec::default()
            });
        let watermark = refresh(config).watermark.unwrap();
        assert_eq!(watermark.low, Some(25.0));
        assert_eq!(watermark.high, None);
        assert_eq!(watermark.low_color, "var(--red-color)");

        let config = CardConfig::new("sensor.battery").with_watermark(WatermarkSpec::default());
        let watermark = refresh(config).watermark.unwrap();
        assert_eq!((watermark.low, watermark.high), (Some(20.0), Some(80.0)));
    }

    #[test]
    fn test_multi_entity_gradient() {
        let mut config = CardConfig::new("sensor.a")
            .with_additional_entity(EntityRef::new("sensor.b"))
            .with_additional_entity(EntityRef::new("sensor.c"))
            .with_range(0.0, 200.0);
        config.bar_color = Some("red".into());
        let output = refresh(config);
        assert_eq!(output.percent, 50.0);
        let gradient = output.gradient.unwrap();
        assert!(gradient.starts_with("linear-gradient(to right, "));
        assert!(gradient.contains("color-mix(in srgb, var(--red-color), black 50%) 0%"));
    }

    #[test]
    fn test_active_timer_refresh_interval() {
        let source = StateSnapshot::new().with_entity(
            "timer.tea",
            EntityState::new("active")
                .with_attribute("duration", json!("0:05:00"))
                .with_attribute("finishes_at", json!("2024-05-01T12:03:00+00:00")),
        );
        let card = ProgressCard::new(CardConfig::new("timer.tea"));
        let output = card.refresh(&source, now()).unwrap();
        assert_eq!(output.state, StateLabel::Active);
        assert_eq!(output.percent, 40.0);
        assert_eq!(output.refresh_interval, Some(Duration::from_secs(1)));

        let json = serde_json::to_value(&output).unwrap();
        assert_eq!(json["refresh_interval_ms"], 1000);
        assert_eq!(json["state"], "active");
    }

    #[test]
    fn test_unknown_timer_state_is_error() {
        let source = StateSnapshot::new().with_entity("timer.tea", EntityState::new("exploded"));
        let card = ProgressCard::new(CardConfig::new("timer.tea"));
        assert!(card.refresh(&source, now()).is_err());
    }
}
