//! Decimal-string serde adapters for large integers.
//!
//! Persisted records and relay payloads carry integers as base-10 strings so
//! that no consumer truncates them to a float. Deserialization also accepts
//! plain numbers for hand-edited files.
//!
//! ```ignore
//! #[serde(with = "serde_decimal::u256")]
//! pub value: U256,
//! ```

use serde::Deserialize;

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
	String(String),
	Number(std::primitive::u64),
}

pub mod u256 {
	use super::StringOrNumber;
	use alloy_primitives::U256;
	use serde::{de::Error, Deserialize, Deserializer, Serializer};

	pub fn serialize<S>(value: &U256, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_str(&value.to_string())
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<U256, D::Error>
	where
		D: Deserializer<'de>,
	{
		match StringOrNumber::deserialize(deserializer)? {
			StringOrNumber::String(s) => U256::from_str_radix(s.trim(), 10)
				.map_err(|e| D::Error::custom(format!("invalid decimal '{}': {}", s, e))),
			StringOrNumber::Number(n) => Ok(U256::from(n)),
		}
	}
}

pub mod u64 {
	use super::StringOrNumber;
	use serde::{de::Error, Deserialize, Deserializer, Serializer};

	pub fn serialize<S>(value: &u64, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_str(&value.to_string())
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<u64, D::Error>
	where
		D: Deserializer<'de>,
	{
		match StringOrNumber::deserialize(deserializer)? {
			StringOrNumber::String(s) => s
				.trim()
				.parse::<u64>()
				.map_err(|e| D::Error::custom(format!("invalid decimal '{}': {}", s, e))),
			StringOrNumber::Number(n) => Ok(n),
		}
	}
}
