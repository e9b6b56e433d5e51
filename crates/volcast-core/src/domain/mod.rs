//! # Domain Models
//!
//! Validated value types shared by every volcast component.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Ticker`] | Case-sensitive instrument identifier |
//! | [`PriceBar`] | One day of open/high/low/close prices |
//! | [`PriceSeries`] | Date-unique, ascending daily history of a ticker |
//! | [`ReturnPoint`] / [`ReturnSeries`] | Percentage returns derived from closes |
//!
//! Constructors enforce their invariants and return [`ValidationError`]
//! on bad input:
//!
//! ```rust
//! use time::macros::date;
//! use volcast_core::{PriceBar, ValidationError};
//!
//! let invalid = PriceBar::new(date!(2024 - 01 - 05), 100.0, 105.0, 95.0, 0.0);
//! assert!(matches!(invalid, Err(ValidationError::NonPositiveValue { field: "close" })));
//! ```
//!
//! [`ValidationError`]: crate::ValidationError

mod date;
mod price;
mod ticker;

pub use date::{business_days_after, format_date, is_business_day, iso_date, parse_date, ISO_DATE};
pub use price::{PriceBar, PriceSeries, ReturnPoint, ReturnSeries};
pub use ticker::Ticker;
