//! Aggregation of several entities into one stacked bar.

use crate::entity::EntityValue;
use serde::Serialize;

/// Darkest shade, as a percentage of black mixed into the first segment.
const MAX_SHADE: f64 = 50.0;

/// Share of one entity in the aggregate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityShare {
    pub entity: String,
    pub value: f64,
    pub percent: f64,
}

/// One colored segment of the stacked bar, in percent of the bar.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GradientStop {
    pub color: String,
    pub start: f64,
    pub end: f64,
}

/// Sums several entity values and splits a bar between them.
///
/// Only entities that are valid and available take part; the rest are
/// kept so the declaration count is still known.
///
/// # Examples
///
/// ```rust
/// use entity_progress_core::multi::MultiEntityAggregator;
///
/// let aggregator = MultiEntityAggregator::new();
/// assert_eq!(aggregator.total_value(), 0.0);
/// assert!(aggregator.percentages().is_empty());
/// assert_eq!(aggregator.gradient("red"), None);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MultiEntityAggregator {
    values: Vec<EntityValue>,
}

impl MultiEntityAggregator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, value: EntityValue) {
        self.values.push(value);
    }

    /// Number of declared entities, usable or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn usable(&self) -> impl Iterator<Item = &EntityValue> {
        self.values.iter().filter(|v| v.is_usable())
    }

    /// Sum of the usable entities' values.
    #[must_use]
    pub fn total_value(&self) -> f64 {
        self.usable().map(|v| v.value).sum()
    }

    /// Each usable entity's share of the total, in declaration order.
    /// Empty when the total is zero.
    #[must_use]
    pub fn percentages(&self) -> Vec<EntityShare> {
        let total = self.total_value();
        if total == 0.0 {
            return Vec::new();
        }
        self.usable()
            .map(|v| EntityShare {
                entity: v.id.clone(),
                value: v.value,
                percent: v.value * 100.0 / total,
            })
            .collect()
    }

    /// Segments of the stacked bar, shading `base_color` from half black
    /// on the first entity to the plain color on the last.
    #[must_use]
    pub fn gradient_stops(&self, base_color: &str) -> Vec<GradientStop> {
        let shares = self.percentages();
        if self.values.len() < 2 || shares.len() < 2 {
            return Vec::new();
        }

        let steps = (shares.len() - 1) as f64;
        let mut start = 0.0;
        let mut stops = Vec::with_capacity(shares.len());
        for (i, share) in shares.iter().enumerate() {
            let shade = MAX_SHADE * (steps - i as f64) / steps;
            let end = if i + 1 == shares.len() {
                100.0
            } else {
                start + share.percent
            };
            stops.push(GradientStop {
                color: format!(
                    "color-mix(in srgb, {base_color}, black {}%)",
                    trim_number(shade)
                ),
                start,
                end,
            });
            start = end;
        }
        stops
    }

    /// CSS `linear-gradient` for the stacked bar; `None` for fewer than two
    /// entities or a zero total.
    #[must_use]
    pub fn gradient(&self, base_color: &str) -> Option<String> {
        let stops = self.gradient_stops(base_color);
        if stops.is_empty() {
            return None;
        }
        let parts: Vec<String> = stops
            .iter()
            .map(|s| {
                format!(
                    "{color} {start}%, {color} {end}%",
                    color = s.color,
                    start = trim_number(s.start),
                    end = trim_number(s.end)
                )
            })
            .collect();
        Some(format!("linear-gradient(to right, {})", parts.join(", ")))
    }
}

impl FromIterator<EntityValue> for MultiEntityAggregator {
    fn from_iter<I: IntoIterator<Item = EntityValue>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

fn trim_number(value: f64) -> String {
    let text = format!("{value:.2}");
    text.trim_end_matches('0').trim_end_matches('.').to_owned()
}
