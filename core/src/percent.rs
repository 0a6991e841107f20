//! Percentage computation over a normalized value range.
//!
//! [`PercentParams::compute`] is a pure function of its six inputs; the
//! resulting [`PercentageResult`] also answers the questions the rest of
//! the pipeline asks of it: which value to feed a theme, where a watermark
//! sits on the bar, and how to render the value as text.

use crate::format::{NumberFormatter, UnitSpacing};
use crate::scalar::{Decimal, Unit};
use serde::Serialize;

/// Label shown in place of a value when the range is degenerate.
pub const DIV0_LABEL: &str = "Div0";

/// Inputs of the percentage computation.
///
/// # Examples
///
/// ```rust
/// use entity_progress_core::percent::PercentParams;
///
/// let result = PercentParams::new(25.0, 0.0, 200.0).compute();
/// assert_eq!(result.percent, 13.0);
/// assert!(result.is_valid());
///
/// let reversed = PercentParams::new(25.0, 0.0, 200.0).reversed(true).compute();
/// assert_eq!(reversed.percent, 88.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PercentParams {
    pub current: f64,
    pub min: f64,
    pub max: f64,
    pub decimal: Decimal,
    pub is_reversed: bool,
    pub is_center_zero: bool,
}

impl PercentParams {
    #[must_use]
    pub fn new(current: f64, min: f64, max: f64) -> Self {
        Self {
            current,
            min,
            max,
            decimal: Decimal::default(),
            is_reversed: false,
            is_center_zero: false,
        }
    }

    #[must_use]
    pub fn with_decimal(mut self, decimal: Decimal) -> Self {
        self.decimal = decimal;
        self
    }

    #[must_use]
    pub fn reversed(mut self, reversed: bool) -> Self {
        self.is_reversed = reversed;
        self
    }

    #[must_use]
    pub fn center_zero(mut self, center_zero: bool) -> Self {
        self.is_center_zero = center_zero;
        self
    }

    /// Value after optional reversal (`max - current`).
    #[must_use]
    pub fn actual(&self) -> f64 {
        if self.is_reversed {
            self.max - self.current
        } else {
            self.current
        }
    }

    /// Compute the percentage.
    ///
    /// Standard mode: `(actual - min) / (max - min) * 100`, clamped to
    /// 0..=100. Center-zero mode normalizes positive values against `max`
    /// and negative values against `-min`, clamped to -100..=100. A zero
    /// range yields `percent = 0` and an invalid result.
    #[must_use]
    pub fn compute(&self) -> PercentageResult {
        let actual = self.actual();
        let (range, corrected_value) = if self.is_center_zero {
            let range = if self.current >= 0.0 { self.max } else { -self.min };
            (range, self.current)
        } else {
            (self.max - self.min, actual - self.min)
        };

        if range == 0.0 {
            return PercentageResult {
                percent: 0.0,
                range,
                corrected_value,
                actual,
                valid: false,
            };
        }

        let raw = self.decimal.round(corrected_value / range * 100.0);
        let percent = if self.is_center_zero {
            raw.clamp(-100.0, 100.0)
        } else {
            raw.clamp(0.0, 100.0)
        };

        PercentageResult {
            percent,
            range,
            corrected_value,
            actual,
            valid: true,
        }
    }
}

/// Which value a theme lookup should receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThemeInput {
    pub is_custom_theme: bool,
    pub based_on_percent: bool,
}

/// Output of [`PercentParams::compute`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PercentageResult {
    pub percent: f64,
    pub range: f64,
    pub corrected_value: f64,
    pub actual: f64,
    valid: bool,
}

impl PercentageResult {
    /// False when the range was zero.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.valid
    }

    /// Value handed to the theme resolver.
    ///
    /// Percent-based themes get the percentage. Value-based built-in themes
    /// (temperature and friends) get the actual value, converted from
    /// Fahrenheit to Celsius since their tables are in Celsius. Custom
    /// themes get the raw actual value untouched.
    #[must_use]
    pub fn theme_value(&self, input: ThemeInput, unit: &Unit) -> f64 {
        if input.based_on_percent {
            self.percent
        } else if !input.is_custom_theme && unit.is_fahrenheit() {
            (self.actual - 32.0) * 5.0 / 9.0
        } else {
            self.actual
        }
    }

    /// Position of a watermark threshold on the bar, 0..=100.
    ///
    /// `percent_space` thresholds are already percentages. Center-zero bars
    /// place thresholds at `50 + raw / 2`, which assumes a range symmetric
    /// around zero.
    #[must_use]
    pub fn watermark_position(&self, raw: f64, params: &PercentParams, percent_space: bool) -> f64 {
        let position = if params.is_center_zero {
            50.0 + raw / 2.0
        } else if percent_space {
            raw
        } else {
            let range = params.max - params.min;
            if range == 0.0 {
                0.0
            } else {
                (raw - params.min) / range * 100.0
            }
        };
        position.clamp(0.0, 100.0)
    }

    /// Render for display: a clock string for timer units, the percentage
    /// for `%`, otherwise the current value with its unit.
    #[must_use]
    pub fn display_string(
        &self,
        params: &PercentParams,
        unit: &Unit,
        spacing: UnitSpacing,
        formatter: &NumberFormatter,
    ) -> String {
        let decimal = params.decimal.digits();
        if unit.is_timer() {
            formatter.format_timing(self.actual, decimal, unit.is_flex_timer())
        } else if unit.is_percent() {
            if !self.valid {
                return DIV0_LABEL.to_owned();
            }
            formatter.format_with_unit(self.percent, decimal, unit, spacing)
        } else {
            formatter.format_with_unit(params.current, decimal, unit, spacing)
        }
    }
}
