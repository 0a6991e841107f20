//! Locale-aware number, duration and unit formatting.
//!
//! The host hands the card a language tag and a number-format preference;
//! [`NumberFormatter`] turns those into grouping and decimal separators and
//! renders values, clock strings and unit suffixes consistently.

use crate::scalar::{Decimal, Unit, UnitKind};
use serde::{Deserialize, Serialize};
use std::fmt;

const NBSP: &str = "\u{a0}";

/// Languages that put a space between a number and `%`.
const SPACE_BEFORE_PERCENT: &[&str] = &["cs", "de", "fi", "fr", "sk", "sv"];

/// Languages grouping with a space and using a decimal comma.
const SPACE_COMMA_LANGUAGES: &[&str] = &[
    "bg", "cs", "et", "fi", "fr", "hu", "lt", "lv", "nb", "no", "pl", "ru", "sk", "sv", "uk",
];

/// Languages grouping with a dot and using a decimal comma.
const DECIMAL_COMMA_LANGUAGES: &[&str] = &[
    "da", "de", "el", "es", "hr", "id", "it", "nl", "pt", "ro", "sl", "sr", "tr",
];

/// Number format preference reported by the host profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NumberFormat {
    /// Follow the language tag
    #[default]
    Language,
    /// Follow the system locale; resolved from the language tag here
    System,
    /// `1,234.5`
    CommaDecimal,
    /// `1.234,5`
    DecimalComma,
    /// `1 234,5`
    SpaceComma,
    /// `1234.5`
    None,
}

impl fmt::Display for NumberFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Language => "language",
            Self::System => "system",
            Self::CommaDecimal => "comma_decimal",
            Self::DecimalComma => "decimal_comma",
            Self::SpaceComma => "space_comma",
            Self::None => "none",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for NumberFormat {
    type Err = ParseOptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "language" => Ok(Self::Language),
            "system" => Ok(Self::System),
            "comma_decimal" => Ok(Self::CommaDecimal),
            "decimal_comma" => Ok(Self::DecimalComma),
            "space_comma" => Ok(Self::SpaceComma),
            "none" => Ok(Self::None),
            _ => Err(ParseOptionError {
                input: s.to_owned(),
                valid_options: &[
                    "language",
                    "system",
                    "comma_decimal",
                    "decimal_comma",
                    "space_comma",
                    "none",
                ],
            }),
        }
    }
}

/// Spacing between a value and its unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitSpacing {
    /// Locale rules: never before `°`, before `%` only in some languages
    #[default]
    Auto,
    /// Always a space
    Space,
    /// Never a space
    #[serde(alias = "no-space")]
    NoSpace,
}

impl fmt::Display for UnitSpacing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Auto => "auto",
            Self::Space => "space",
            Self::NoSpace => "no-space",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for UnitSpacing {
    type Err = ParseOptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "space" => Ok(Self::Space),
            "no-space" | "nospace" | "no_space" => Ok(Self::NoSpace),
            _ => Err(ParseOptionError {
                input: s.to_owned(),
                valid_options: &["auto", "space", "no-space"],
            }),
        }
    }
}

/// Error type for parsing [`NumberFormat`] and [`UnitSpacing`] from strings.
#[derive(Debug, thiserror::Error)]
#[error("Invalid option '{input}'. Valid options: {}", valid_options.join(", "))]
pub struct ParseOptionError {
    input: String,
    valid_options: &'static [&'static str],
}

/// Formats numbers for a given language tag and number format.
///
/// # Examples
///
/// ```rust
/// use entity_progress_core::format::{NumberFormat, NumberFormatter};
///
/// let en = NumberFormatter::new("en-US", NumberFormat::Language);
/// assert_eq!(en.format_number(1234.5, 1), "1,234.5");
///
/// let none = NumberFormatter::new("en", NumberFormat::None);
/// assert_eq!(none.format_number(1234.5, 1), "1234.5");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumberFormatter {
    language: String,
    group: &'static str,
    decimal: &'static str,
}

impl NumberFormatter {
    #[must_use]
    pub fn new(locale: &str, format: NumberFormat) -> Self {
        let language = locale
            .split(['-', '_'])
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();

        let (group, decimal) = match format {
            NumberFormat::Language | NumberFormat::System => separators_for(&language),
            NumberFormat::CommaDecimal => (",", "."),
            NumberFormat::DecimalComma => (".", ","),
            NumberFormat::SpaceComma => (NBSP, ","),
            NumberFormat::None => ("", "."),
        };

        Self {
            language,
            group,
            decimal,
        }
    }

    /// Primary language subtag, lowercased.
    #[must_use]
    pub fn language(&self) -> &str {
        &self.language
    }

    /// Round to `decimal` fraction digits and render with locale separators.
    #[must_use]
    pub fn format_number(&self, value: f64, decimal: u8) -> String {
        let rounded = Decimal::new(i64::from(decimal))
            .unwrap_or_default()
            .round(value);
        let text = format!("{:.*}", usize::from(decimal), rounded.abs());
        let (integer, fraction) = match text.split_once('.') {
            Some((i, f)) => (i, Some(f)),
            None => (text.as_str(), None),
        };

        let mut out = String::with_capacity(text.len() + 4);
        // "-0" and "-0.00" collapse to zero
        if rounded < 0.0 && text.chars().any(|c| c.is_ascii_digit() && c != '0') {
            out.push('-');
        }
        out.push_str(&group_digits(integer, self.group));
        if let Some(fraction) = fraction {
            out.push_str(self.decimal);
            out.push_str(fraction);
        }
        out
    }

    /// Render seconds as a clock string.
    ///
    /// Standard mode always renders `HH:MM:SS`. Flex mode drops the hours
    /// below one hour (`MM:SS`) and renders `<seconds>s` below one minute.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use entity_progress_core::format::{NumberFormat, NumberFormatter};
    ///
    /// let f = NumberFormatter::new("en", NumberFormat::Language);
    /// assert_eq!(f.format_timing(3661.0, 0, false), "01:01:01");
    /// assert_eq!(f.format_timing(125.0, 0, true), "02:05");
    /// assert_eq!(f.format_timing(45.0, 0, true), "45s");
    /// ```
    #[must_use]
    pub fn format_timing(&self, total_seconds: f64, decimal: u8, flex: bool) -> String {
        let sign = if total_seconds < 0.0 { "-" } else { "" };
        let total = total_seconds.abs();

        if flex && total < 60.0 {
            return format!("{sign}{}s", self.format_number(total, decimal));
        }

        let whole = total.round() as u64;
        let hours = whole / 3600;
        let minutes = (whole % 3600) / 60;
        let seconds = whole % 60;

        if flex && hours == 0 {
            format!("{sign}{minutes:02}:{seconds:02}")
        } else {
            format!("{sign}{hours:02}:{minutes:02}:{seconds:02}")
        }
    }

    /// Separator placed between a value and `unit`.
    #[must_use]
    pub fn unit_separator(&self, unit: &Unit, spacing: UnitSpacing) -> &'static str {
        let symbol = unit.display_symbol();
        if symbol.is_empty() {
            return "";
        }
        match spacing {
            UnitSpacing::Space => " ",
            UnitSpacing::NoSpace => "",
            UnitSpacing::Auto => {
                if symbol == "°" {
                    ""
                } else if unit.kind() == UnitKind::Percent {
                    if SPACE_BEFORE_PERCENT.contains(&self.language.as_str()) {
                        NBSP
                    } else {
                        ""
                    }
                } else {
                    " "
                }
            }
        }
    }

    /// Format `value` with its unit, or as a clock string for timer units.
    #[must_use]
    pub fn format_with_unit(
        &self,
        value: f64,
        decimal: u8,
        unit: &Unit,
        spacing: UnitSpacing,
    ) -> String {
        if unit.is_timer() {
            return self.format_timing(value, decimal, unit.is_flex_timer());
        }
        format!(
            "{}{}{}",
            self.format_number(value, decimal),
            self.unit_separator(unit, spacing),
            unit.display_symbol()
        )
    }
}

impl Default for NumberFormatter {
    fn default() -> Self {
        Self::new("en", NumberFormat::Language)
    }
}

fn separators_for(language: &str) -> (&'static str, &'static str) {
    if SPACE_COMMA_LANGUAGES.contains(&language) {
        (NBSP, ",")
    } else if DECIMAL_COMMA_LANGUAGES.contains(&language) {
        (".", ",")
    } else {
        (",", ".")
    }
}

fn group_digits(digits: &str, separator: &str) -> String {
    if separator.is_empty() || digits.len() <= 3 {
        return digits.to_owned();
    }
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 * separator.len());
    let lead = digits.len() % 3;
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (i + 3 - lead) % 3 == 0 {
            out.push_str(separator);
        }
        out.push(c);
    }
    out
}
