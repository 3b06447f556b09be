//! String formatting utilities.
//!
//! Hex prefix handling and conversion between token base
//! units and the human-readable decimal amounts accepted on the command line.

use alloy_primitives::U256;
use thiserror::Error;

/// Errors raised when parsing a human-readable token amount.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AmountError {
	#[error("Amount is empty")]
	Empty,
	#[error("Invalid character in amount: {0}")]
	InvalidDigit(String),
	#[error("Amount has more than {0} decimal places")]
	TooManyDecimals(u8),
	#[error("Amount does not fit in 256 bits")]
	Overflow,
}

/// Adds a "0x" prefix unless one (in either case) is already present.
pub fn with_0x_prefix(hex_str: &str) -> String {
	if hex_str.starts_with("0x") || hex_str.starts_with("0X") {
		hex_str.to_string()
	} else {
		format!("0x{}", hex_str)
	}
}

/// Strips a leading "0x" or "0X".
pub fn without_0x_prefix(hex_str: &str) -> &str {
	hex_str
		.strip_prefix("0x")
		.or_else(|| hex_str.strip_prefix("0X"))
		.unwrap_or(hex_str)
}

/// Parses a decimal amount such as "1.5" into base units for a token with
/// `decimals` places ("1.5" with 6 decimals is 1_500_000).
pub fn parse_token_amount(input: &str, decimals: u8) -> Result<U256, AmountError> {
	let input = input.trim();
	if input.is_empty() {
		return Err(AmountError::Empty);
	}

	let (whole, fraction) = match input.split_once('.') {
		Some((whole, fraction)) => (whole, fraction),
		None => (input, ""),
	};
	if whole.is_empty() && fraction.is_empty() {
		return Err(AmountError::Empty);
	}
	if let Some(bad) = whole.chars().chain(fraction.chars()).find(|c| !c.is_ascii_digit()) {
		return Err(AmountError::InvalidDigit(bad.to_string()));
	}
	if fraction.len() > decimals as usize {
		return Err(AmountError::TooManyDecimals(decimals));
	}

	let digits = format!(
		"{}{:0<width$}",
		whole,
		fraction,
		width = decimals as usize
	);
	let digits = digits.trim_start_matches('0');
	if digits.is_empty() {
		return Ok(U256::ZERO);
	}
	U256::from_str_radix(digits, 10).map_err(|_| AmountError::Overflow)
}

/// Formats base units as a decimal amount, dropping trailing zeros
/// (1_500_000 with 6 decimals is "1.5").
pub fn format_token_amount(amount: U256, decimals: u8) -> String {
	let raw = amount.to_string();
	if decimals == 0 {
		return raw;
	}

	let places = decimals as usize;
	let padded = if raw.len() <= places {
		format!("{:0>width$}", raw, width = places + 1)
	} else {
		raw
	};
	let (whole, fraction) = padded.split_at(padded.len() - places);
	let fraction = fraction.trim_end_matches('0');

	if fraction.is_empty() {
		whole.to_string()
	} else {
		format!("{}.{}", whole, fraction)
	}
}
