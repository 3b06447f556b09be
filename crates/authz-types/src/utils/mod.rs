//! Utility functions for common conversions and formatting.

pub mod formatting;
pub mod helpers;
pub mod serde_decimal;

pub use formatting::{
	format_token_amount, parse_token_amount, with_0x_prefix, without_0x_prefix, AmountError,
};
pub use helpers::{current_timestamp, current_timestamp_millis};
