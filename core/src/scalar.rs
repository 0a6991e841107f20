//! Small validated scalar containers shared by the resolver and the engine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A finite numeric value.
///
/// Host states arrive as strings or JSON numbers; anything that does not
/// parse to a finite `f64` is rejected rather than propagated as NaN.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize)]
pub struct Value(f64);

impl Value {
    #[must_use]
    pub fn new(value: f64) -> Option<Self> {
        value.is_finite().then_some(Self(value))
    }

    /// Parse a host state string (`"42.5"`, `" 7 "`).
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        text.trim().parse::<f64>().ok().and_then(Self::new)
    }

    /// Read a JSON attribute that may be a number or a numeric string.
    #[must_use]
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Number(n) => n.as_f64().and_then(Self::new),
            serde_json::Value::String(s) => Self::parse(s),
            _ => None,
        }
    }

    #[must_use]
    pub const fn get(self) -> f64 {
        self.0
    }
}

impl From<Value> for f64 {
    fn from(value: Value) -> Self {
        value.0
    }
}

/// Number of fraction digits used when rounding and formatting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Decimal(u8);

impl Decimal {
    /// Upper bound on precision; more digits than this are noise for a bar.
    pub const MAX: u8 = 10;

    /// Build a precision, rejecting negative input and capping at [`Self::MAX`].
    #[must_use]
    pub fn new(digits: i64) -> Option<Self> {
        if digits < 0 {
            return None;
        }
        Some(Self(digits.min(i64::from(Self::MAX)) as u8))
    }

    #[must_use]
    pub const fn digits(self) -> u8 {
        self.0
    }

    /// Round `value` half away from zero to this many fraction digits.
    #[must_use]
    pub fn round(self, value: f64) -> f64 {
        let factor = 10f64.powi(i32::from(self.0));
        (value * factor).round() / factor
    }
}

impl TryFrom<i64> for Decimal {
    type Error = String;

    fn try_from(digits: i64) -> Result<Self, Self::Error> {
        Self::new(digits).ok_or_else(|| format!("decimal must be >= 0, got {digits}"))
    }
}

/// Classification of a unit string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitKind {
    Percent,
    Celsius,
    Fahrenheit,
    /// Clock rendering, `HH:MM:SS`
    Timer,
    /// Clock rendering compacted below one hour and one minute
    FlexTimer,
    Other,
}

/// Measurement unit attached to the displayed value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    symbol: String,
    #[serde(default = "default_visible")]
    visible: bool,
}

fn default_visible() -> bool {
    true
}

impl Unit {
    pub const PERCENT: &'static str = "%";
    pub const TIMER: &'static str = "timer";
    pub const FLEX_TIMER: &'static str = "flextimer";

    #[must_use]
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into().trim().to_owned(),
            visible: true,
        }
    }

    #[must_use]
    pub fn percent() -> Self {
        Self::new(Self::PERCENT)
    }

    /// Keep the unit for computation but drop it from the display string.
    #[must_use]
    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    #[must_use]
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Symbol as it should appear next to the value, empty when hidden.
    #[must_use]
    pub fn display_symbol(&self) -> &str {
        if self.visible && !self.is_timer() {
            &self.symbol
        } else {
            ""
        }
    }

    #[must_use]
    pub const fn is_visible(&self) -> bool {
        self.visible
    }

    #[must_use]
    pub fn kind(&self) -> UnitKind {
        match self.symbol.as_str() {
            "%" => UnitKind::Percent,
            "°C" | "C" => UnitKind::Celsius,
            "°F" | "F" => UnitKind::Fahrenheit,
            s if s.eq_ignore_ascii_case(Self::TIMER) => UnitKind::Timer,
            s if s.eq_ignore_ascii_case(Self::FLEX_TIMER) => UnitKind::FlexTimer,
            _ => UnitKind::Other,
        }
    }

    #[must_use]
    pub fn is_percent(&self) -> bool {
        self.kind() == UnitKind::Percent
    }

    #[must_use]
    pub fn is_fahrenheit(&self) -> bool {
        self.kind() == UnitKind::Fahrenheit
    }

    #[must_use]
    pub fn is_timer(&self) -> bool {
        matches!(self.kind(), UnitKind::Timer | UnitKind::FlexTimer)
    }

    #[must_use]
    pub fn is_flex_timer(&self) -> bool {
        self.kind() == UnitKind::FlexTimer
    }
}

impl Default for Unit {
    fn default() -> Self {
        Self::percent()
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.symbol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_parsing() {
        assert_eq!(Value::parse(" 42.5 ").map(Value::get), Some(42.5));
        assert_eq!(Value::parse("on"), None);
        assert_eq!(Value::parse("NaN"), None);
        assert_eq!(Value::new(f64::INFINITY), None);

        assert_eq!(
            Value::from_json(&serde_json::json!(12)).map(Value::get),
            Some(12.0)
        );
        assert_eq!(
            Value::from_json(&serde_json::json!("3.5")).map(Value::get),
            Some(3.5)
        );
        assert_eq!(Value::from_json(&serde_json::json!(null)), None);
    }

    #[test]
    fn test_decimal_validation() {
        assert_eq!(Decimal::new(2).map(Decimal::digits), Some(2));
        assert_eq!(Decimal::new(-1), None);
        assert_eq!(Decimal::new(50).map(Decimal::digits), Some(Decimal::MAX));
        assert!(Decimal::try_from(-3).is_err());
    }

    #[test]
    fn test_decimal_rounding() {
        let d = Decimal::new(1).unwrap();
        assert_eq!(d.round(33.333), 33.3);
        assert_eq!(d.round(66.666), 66.7);
        assert_eq!(Decimal::default().round(49.5), 50.0);
    }

    #[test]
    fn test_unit_kinds() {
        assert!(Unit::default().is_percent());
        assert!(Unit::new("°F").is_fahrenheit());
        assert!(Unit::new("timer").is_timer());
        assert!(Unit::new("FlexTimer").is_flex_timer());
        assert_eq!(Unit::new("kWh").kind(), UnitKind::Other);
    }

    #[test]
    fn test_unit_display_symbol() {
        assert_eq!(Unit::new("kWh").display_symbol(), "kWh");
        assert_eq!(Unit::new("kWh").hidden().display_symbol(), "");
        assert_eq!(Unit::new("timer").display_symbol(), "");
    }
}
