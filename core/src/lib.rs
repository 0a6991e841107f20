//! # entity-progress-core
//!
//! Core library for entity progress cards: turns home-automation entity
//! states into a themed progress bar with a formatted value.
//!
//! ## Features
//!
//! - **Entity resolution** - Timers, durations, counters, number helpers and
//!   domain default attributes normalized to one numeric value
//! - **Percentage engine** - Standard, reversed and center-zero bars with
//!   degenerate-range detection
//! - **Theming** - Built-in value and percent themes plus validated custom tables
//! - **Locale-aware formatting** - Digit grouping, decimal separators,
//!   unit spacing and clock rendering
//! - **Multi-entity bars** - Summed values with a shaded stacked gradient
//! - **Configuration management** - RON-based card configuration with validation
//!
//! ## Quick Start
//!
//! ```rust
//! use chrono::Utc;
//! use entity_progress_core::{CardConfig, EntityState, ProgressCard, StateSnapshot};
//!
//! let states = StateSnapshot::new()
//!     .with_entity("sensor.tank", EntityState::new("750"));
//!
//! let card = ProgressCard::new(CardConfig::new("sensor.tank").with_range(0.0, 1000.0));
//! let output = card.refresh(&states, Utc::now()).unwrap();
//!
//! assert_eq!(output.percent, 75.0);
//! assert_eq!(output.display, "75%");
//! ```

pub mod card;
pub mod config;
pub mod entity;
pub mod error;
pub mod format;
pub mod multi;
pub mod percent;
pub mod scalar;
pub mod source;
pub mod theme;

pub use card::{CardOutput, ProgressCard, WatermarkOutput};
pub use config::{CardConfig, WatermarkSpec, WatermarkType};
pub use entity::{resolve, EntityKind, EntityRef, EntityValue, StateLabel, ValueOrEntity};
pub use error::{ConfigMessage, ProgressError, Result, Severity};
pub use format::{NumberFormat, NumberFormatter, UnitSpacing};
pub use multi::MultiEntityAggregator;
pub use percent::{PercentParams, PercentageResult, ThemeInput};
pub use scalar::{Decimal, Unit, UnitKind, Value};
pub use source::{EntitySource, EntityState, StateSnapshot};
pub use theme::{BuiltinTheme, CustomTheme, CustomThemeEntry, ThemeResolver, ThemeStyle};
