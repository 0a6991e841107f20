//! Entity classification and value extraction.
//!
//! [`resolve`] turns one entity of an [`EntitySource`] into an
//! [`EntityValue`]: a current value plus optional bounds, the entity kind
//! that decided how they were read, and a lifecycle label.

use crate::error::{ProgressError, Result};
use crate::scalar::Value;
use crate::source::{EntitySource, STATE_UNAVAILABLE, STATE_UNKNOWN};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

const ATTR_DEVICE_CLASS: &str = "device_class";
const ATTR_UNIT: &str = "unit_of_measurement";
const ATTR_TIMER_DURATION: &str = "duration";
const ATTR_TIMER_REMAINING: &str = "remaining";
const ATTR_TIMER_FINISHES_AT: &str = "finishes_at";

/// Attribute read by default for domains whose state is not the value,
/// with the factor applied to bring it onto a 0-100 scale where needed.
const DOMAIN_DEFAULT_ATTRIBUTES: &[(&str, &str, f64)] = &[
    ("light", "brightness", 100.0 / 255.0),
    ("cover", "current_position", 1.0),
    ("valve", "current_position", 1.0),
    ("fan", "percentage", 1.0),
    ("climate", "current_temperature", 1.0),
    ("humidifier", "current_humidity", 1.0),
    ("media_player", "volume_level", 100.0),
];

/// Seconds per duration unit.
const DURATION_UNITS: &[(&str, f64)] = &[
    ("d", 86_400.0),
    ("h", 3_600.0),
    ("min", 60.0),
    ("s", 1.0),
    ("ms", 0.001),
    ("μs", 0.000_001),
    ("µs", 0.000_001),
];

/// Convert a duration reading to seconds.
///
/// # Examples
///
/// ```rust
/// use entity_progress_core::entity::duration_to_seconds;
///
/// assert_eq!(duration_to_seconds(2.0, "h").unwrap(), 7200.0);
/// assert_eq!(duration_to_seconds(500.0, "ms").unwrap(), 0.5);
/// assert!(duration_to_seconds(1.0, "x").is_err());
/// ```
pub fn duration_to_seconds(value: f64, unit: &str) -> Result<f64> {
    DURATION_UNITS
        .iter()
        .find(|(name, _)| *name == unit)
        .map(|(_, factor)| value * factor)
        .ok_or_else(|| ProgressError::unknown_duration_unit(unit))
}

/// Parse a host clock string (`H:MM:SS`, optionally prefixed by `N day(s), `).
#[must_use]
pub fn parse_clock(text: &str) -> Option<f64> {
    let text = text.trim();
    let (days, clock) = match text.split_once(',') {
        Some((days, clock)) => {
            let count = days.split_whitespace().next()?.parse::<f64>().ok()?;
            (count, clock.trim())
        }
        None => (0.0, text),
    };

    let parts: Vec<&str> = clock.split(':').collect();
    let (h, m, s) = match parts.as_slice() {
        [h, m, s] => (*h, *m, *s),
        [m, s] => ("0", *m, *s),
        _ => return None,
    };
    let hours = h.parse::<f64>().ok()?;
    let minutes = m.parse::<f64>().ok()?;
    let seconds = s.parse::<f64>().ok()?;
    Some(days * 86_400.0 + hours * 3_600.0 + minutes * 60.0 + seconds)
}

/// Category deciding how an entity's value and bounds are read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Plain,
    Timer,
    Duration,
    Counter,
    NumberHelper,
}

impl EntityKind {
    /// Classify by domain prefix, then by the `duration` device class.
    #[must_use]
    pub fn classify(id: &str, source: &dyn EntitySource) -> Self {
        match domain(id) {
            "timer" => Self::Timer,
            "counter" => Self::Counter,
            "number" | "input_number" => Self::NumberHelper,
            _ => {
                let is_duration = source
                    .attribute(id, ATTR_DEVICE_CLASS)
                    .and_then(serde_json::Value::as_str)
                    == Some("duration");
                if is_duration {
                    Self::Duration
                } else {
                    Self::Plain
                }
            }
        }
    }

    /// Unit shown when the card configuration does not name one.
    #[must_use]
    pub const fn default_unit(self) -> &'static str {
        match self {
            Self::Duration => crate::scalar::Unit::TIMER,
            _ => crate::scalar::Unit::PERCENT,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Plain => "plain",
            Self::Timer => "timer",
            Self::Duration => "duration",
            Self::Counter => "counter",
            Self::NumberHelper => "number",
        };
        f.write_str(name)
    }
}

/// Lifecycle and availability marker, independent of numeric validity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateLabel {
    Available,
    Unavailable,
    Unknown,
    NotFound,
    /// The entity is readable but the card options around it are not
    InvalidConfig,
    Idle,
    Active,
    Paused,
}

impl StateLabel {
    fn from_host_state(state: &str) -> Self {
        match state {
            STATE_UNAVAILABLE => Self::Unavailable,
            STATE_UNKNOWN => Self::Unknown,
            _ => Self::Available,
        }
    }

    /// Whether a numeric value can be shown for this label.
    #[must_use]
    pub const fn is_available(self) -> bool {
        !matches!(
            self,
            Self::Unavailable | Self::Unknown | Self::NotFound | Self::InvalidConfig
        )
    }
}

impl fmt::Display for StateLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Available => "available",
            Self::Unavailable => "unavailable",
            Self::Unknown => "unknown",
            Self::NotFound => "not_found",
            Self::InvalidConfig => "invalid_config",
            Self::Idle => "idle",
            Self::Active => "active",
            Self::Paused => "paused",
        };
        f.write_str(name)
    }
}

/// An entity id plus an optional attribute to read instead of the state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub entity: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
}

impl EntityRef {
    #[must_use]
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            attribute: None,
        }
    }

    #[must_use]
    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = Some(attribute.into());
        self
    }
}

/// Normalized result of resolving one entity.
///
/// `min <= value <= max` is not guaranteed: timers and counters can step
/// outside their bounds between refreshes, so consumers clamp.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityValue {
    pub id: String,
    pub kind: EntityKind,
    pub state: StateLabel,
    pub value: f64,
    pub min: Option<f64>,
    pub max: Option<f64>,
    /// Host-reported `unit_of_measurement`, if any
    pub unit: Option<String>,
    valid: bool,
}

impl EntityValue {
    fn new(id: &str, kind: EntityKind, state: StateLabel) -> Self {
        Self {
            id: id.to_owned(),
            kind,
            state,
            value: 0.0,
            min: None,
            max: None,
            unit: None,
            valid: true,
        }
    }

    fn invalid(id: &str, kind: EntityKind, state: StateLabel) -> Self {
        Self {
            valid: false,
            ..Self::new(id, kind, state)
        }
    }

    /// False when the entity or a required attribute is missing.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.valid
    }

    /// Valid and currently reporting a usable state.
    #[must_use]
    pub const fn is_usable(&self) -> bool {
        self.valid && self.state.is_available()
    }

    /// Host-driven refresh cadence needed to animate this value.
    ///
    /// Active timers move without state changes, so they ask for a tick
    /// every 1% of their duration, clamped to 250 ms..1 s. Everything else
    /// updates when the host pushes a new state.
    #[must_use]
    pub fn refresh_interval(&self) -> Option<Duration> {
        if self.kind != EntityKind::Timer || self.state != StateLabel::Active {
            return None;
        }
        let duration = self.max.filter(|d| *d > 0.0)?;
        let millis = (duration * 1000.0 / 100.0).clamp(250.0, 1000.0);
        Some(Duration::from_millis(millis as u64))
    }
}

/// Resolve `target` against `source` at time `now`.
///
/// Missing entities and attributes come back as invalid values; only
/// unknown timer states, unknown duration units and unreadable timer
/// timestamps fail.
pub fn resolve(
    source: &dyn EntitySource,
    target: &EntityRef,
    now: DateTime<Utc>,
) -> Result<EntityValue> {
    let id = target.entity.as_str();
    let kind = EntityKind::classify(id, source);

    let Some(state) = source.state(id) else {
        tracing::warn!(entity = id, "entity not found");
        return Ok(EntityValue::invalid(id, kind, StateLabel::NotFound));
    };

    let mut resolved = match kind {
        EntityKind::Timer => resolve_timer(source, id, state, now)?,
        EntityKind::Duration => resolve_duration(source, id, state)?,
        EntityKind::Counter => resolve_ranged(source, target, state, kind, ("minimum", "maximum")),
        EntityKind::NumberHelper => resolve_ranged(source, target, state, kind, ("min", "max")),
        EntityKind::Plain => resolve_plain(source, target, state),
    };
    resolved.unit = source
        .attribute(id, ATTR_UNIT)
        .and_then(serde_json::Value::as_str)
        .map(str::to_owned);

    tracing::debug!(
        entity = id,
        kind = %resolved.kind,
        state = %resolved.state,
        value = resolved.value,
        valid = resolved.valid,
        "resolved entity"
    );
    Ok(resolved)
}

fn resolve_timer(
    source: &dyn EntitySource,
    id: &str,
    state: &str,
    now: DateTime<Utc>,
) -> Result<EntityValue> {
    let label = match state {
        "idle" => StateLabel::Idle,
        "active" => StateLabel::Active,
        "paused" => StateLabel::Paused,
        STATE_UNAVAILABLE | STATE_UNKNOWN => {
            return Ok(EntityValue::new(id, EntityKind::Timer, StateLabel::from_host_state(state)));
        }
        other => return Err(ProgressError::unknown_timer_state(id, other)),
    };

    let Some(duration) = clock_attribute(source, id, ATTR_TIMER_DURATION) else {
        return Ok(EntityValue::invalid(id, EntityKind::Timer, label));
    };

    let elapsed = match label {
        StateLabel::Active => {
            let Some(finishes_at) = source
                .attribute(id, ATTR_TIMER_FINISHES_AT)
                .and_then(serde_json::Value::as_str)
            else {
                tracing::warn!(entity = id, "active timer without finishes_at");
                return Ok(EntityValue::invalid(id, EntityKind::Timer, label));
            };
            let finishes_at = DateTime::parse_from_rfc3339(finishes_at)
                .map_err(|e| ProgressError::invalid_timestamp(id, e.to_string()))?
                .with_timezone(&Utc);
            let started_at = finishes_at.timestamp_millis() as f64 / 1000.0 - duration;
            now.timestamp_millis() as f64 / 1000.0 - started_at
        }
        StateLabel::Paused => {
            let Some(remaining) = clock_attribute(source, id, ATTR_TIMER_REMAINING) else {
                tracing::warn!(entity = id, "paused timer without remaining");
                return Ok(EntityValue::invalid(id, EntityKind::Timer, label));
            };
            duration - remaining
        }
        _ => 0.0,
    };

    Ok(EntityValue {
        value: elapsed,
        min: Some(0.0),
        max: Some(duration),
        ..EntityValue::new(id, EntityKind::Timer, label)
    })
}

fn resolve_duration(source: &dyn EntitySource, id: &str, state: &str) -> Result<EntityValue> {
    let label = StateLabel::from_host_state(state);
    let mut resolved = EntityValue::new(id, EntityKind::Duration, label);
    if !label.is_available() {
        return Ok(resolved);
    }

    let unit = source
        .attribute(id, ATTR_UNIT)
        .and_then(serde_json::Value::as_str)
        .unwrap_or("s");
    let raw = Value::parse(state).map(Value::get).unwrap_or_default();
    resolved.value = duration_to_seconds(raw, unit)?;
    Ok(resolved)
}

fn resolve_ranged(
    source: &dyn EntitySource,
    target: &EntityRef,
    state: &str,
    kind: EntityKind,
    (min_attr, max_attr): (&str, &str),
) -> EntityValue {
    let id = target.entity.as_str();
    let mut resolved = match &target.attribute {
        Some(_) => resolve_plain(source, target, state),
        None => {
            let mut v = EntityValue::new(id, kind, StateLabel::from_host_state(state));
            v.value = Value::parse(state).map(Value::get).unwrap_or_default();
            v
        }
    };
    resolved.kind = kind;
    resolved.min = numeric_attribute(source, id, min_attr);
    resolved.max = numeric_attribute(source, id, max_attr);
    resolved
}

fn resolve_plain(source: &dyn EntitySource, target: &EntityRef, state: &str) -> EntityValue {
    let id = target.entity.as_str();
    let label = StateLabel::from_host_state(state);
    let mut resolved = EntityValue::new(id, EntityKind::Plain, label);
    let entity_domain = domain(id);

    if let Some(attribute) = &target.attribute {
        let Some(raw) = source.attribute(id, attribute) else {
            tracing::warn!(entity = id, attribute = attribute.as_str(), "attribute not found");
            return EntityValue::invalid(id, EntityKind::Plain, label);
        };
        let scale = DOMAIN_DEFAULT_ATTRIBUTES
            .iter()
            .find(|(d, a, _)| *d == entity_domain && *a == attribute.as_str())
            .map_or(1.0, |(_, _, scale)| *scale);
        resolved.value = Value::from_json(raw).map(Value::get).unwrap_or_default() * scale;
        return resolved;
    }

    if let Some((_, attribute, scale)) = DOMAIN_DEFAULT_ATTRIBUTES
        .iter()
        .find(|(d, _, _)| *d == entity_domain)
    {
        // An absent default attribute means "off" (a dark light, a stopped fan)
        resolved.value = numeric_attribute(source, id, attribute).unwrap_or_default() * scale;
        return resolved;
    }

    resolved.value = Value::parse(state).map(Value::get).unwrap_or_default();
    resolved
}

fn domain(id: &str) -> &str {
    id.split_once('.').map_or("", |(domain, _)| domain)
}

fn numeric_attribute(source: &dyn EntitySource, id: &str, name: &str) -> Option<f64> {
    source
        .attribute(id, name)
        .and_then(Value::from_json)
        .map(Value::get)
}

fn clock_attribute(source: &dyn EntitySource, id: &str, name: &str) -> Option<f64> {
    match source.attribute(id, name)? {
        serde_json::Value::String(text) => parse_clock(text),
        other => Value::from_json(other).map(Value::get),
    }
}

/// A bound given either literally or by another entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ValueOrEntity {
    Number(f64),
    Id(String),
    Entity(EntityRef),
}

impl ValueOrEntity {
    /// Current bound, `None` when the referenced entity is not usable.
    pub fn resolve(&self, source: &dyn EntitySource, now: DateTime<Utc>) -> Result<Option<f64>> {
        let target = match self {
            Self::Number(n) => return Ok(Some(*n)),
            Self::Id(id) => EntityRef::new(id.as_str()),
            Self::Entity(target) => target.clone(),
        };
        let resolved = resolve(source, &target, now)?;
        Ok(resolved.is_usable().then_some(resolved.value))
    }

    /// Entity referenced by this bound, if any.
    #[must_use]
    pub fn entity(&self) -> Option<&str> {
        match self {
            Self::Number(_) => None,
            Self::Id(id) => Some(id.as_str()),
            Self::Entity(target) => Some(target.entity.as_str()),
        }
    }
}

impl From<f64> for ValueOrEntity {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}
