//! Configuration schema validation for pluggable backends.
//!
//! Every backend implementation (storage, account, delivery, relay) publishes a
//! [`ConfigSchema`] describing the TOML table it expects. The table is checked
//! before the backend factory runs, so a typo in the configuration surfaces as
//! a field-level error rather than a runtime failure.

use async_trait::async_trait;
use thiserror::Error;

/// Errors raised while validating a configuration table.
#[derive(Debug, Error)]
pub enum ValidationError {
	#[error("Missing required field: {0}")]
	MissingField(String),
	#[error("Invalid value for field '{field}': {message}")]
	InvalidValue { field: String, message: String },
	#[error("Type mismatch for field '{field}': expected {expected}, got {actual}")]
	TypeMismatch {
		field: String,
		expected: String,
		actual: String,
	},
	#[error("Failed to deserialize config: {0}")]
	DeserializationError(String),
}

impl ValidationError {
	/// Prefixes the offending field name with `parent.`.
	fn nested_in(self, parent: &str) -> Self {
		match self {
			ValidationError::MissingField(f) => {
				ValidationError::MissingField(format!("{}.{}", parent, f))
			},
			ValidationError::InvalidValue { field, message } => ValidationError::InvalidValue {
				field: format!("{}.{}", parent, field),
				message,
			},
			ValidationError::TypeMismatch {
				field,
				expected,
				actual,
			} => ValidationError::TypeMismatch {
				field: format!("{}.{}", parent, field),
				expected,
				actual,
			},
			other => other,
		}
	}
}

/// Expected type of a configuration field.
#[derive(Debug)]
pub enum FieldType {
	String,
	/// Integer with optional inclusive bounds.
	Integer { min: Option<i64>, max: Option<i64> },
	Boolean,
	/// A 0x-prefixed 20-byte hex address.
	Address,
	/// An http(s) URL.
	Url,
	/// A nested table with its own schema.
	Table(Schema),
}

/// Custom check run after the type check passes.
pub type FieldValidator = Box<dyn Fn(&toml::Value) -> Result<(), String> + Send + Sync>;

/// A named field in a [`Schema`].
pub struct Field {
	pub name: String,
	pub field_type: FieldType,
	pub validator: Option<FieldValidator>,
}

impl std::fmt::Debug for Field {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Field")
			.field("name", &self.name)
			.field("field_type", &self.field_type)
			.field("validator", &self.validator.is_some())
			.finish()
	}
}

impl Field {
	pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
		Self {
			name: name.into(),
			field_type,
			validator: None,
		}
	}

	pub fn with_validator<F>(mut self, validator: F) -> Self
	where
		F: Fn(&toml::Value) -> Result<(), String> + Send + Sync + 'static,
	{
		self.validator = Some(Box::new(validator));
		self
	}

	fn check(&self, value: &toml::Value) -> Result<(), ValidationError> {
		check_type(&self.name, value, &self.field_type)?;
		if let Some(validator) = &self.validator {
			validator(value).map_err(|message| ValidationError::InvalidValue {
				field: self.name.clone(),
				message,
			})?;
		}
		Ok(())
	}
}

/// Required and optional fields of a configuration table.
#[derive(Debug)]
pub struct Schema {
	pub required: Vec<Field>,
	pub optional: Vec<Field>,
}

impl Schema {
	pub fn new(required: Vec<Field>, optional: Vec<Field>) -> Self {
		Self { required, optional }
	}

	/// Checks presence of required fields, then the type and custom validator
	/// of every present field, recursing into nested tables.
	pub fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let table = config
			.as_table()
			.ok_or_else(|| mismatch("root", "table", config))?;

		for field in &self.required {
			let value = table
				.get(&field.name)
				.ok_or_else(|| ValidationError::MissingField(field.name.clone()))?;
			field.check(value)?;
		}

		for field in &self.optional {
			if let Some(value) = table.get(&field.name) {
				field.check(value)?;
			}
		}

		Ok(())
	}
}

fn mismatch(field: &str, expected: &str, value: &toml::Value) -> ValidationError {
	ValidationError::TypeMismatch {
		field: field.to_string(),
		expected: expected.to_string(),
		actual: value.type_str().to_string(),
	}
}

fn check_type(name: &str, value: &toml::Value, expected: &FieldType) -> Result<(), ValidationError> {
	match expected {
		FieldType::String => {
			value.as_str().ok_or_else(|| mismatch(name, "string", value))?;
		},
		FieldType::Boolean => {
			value.as_bool().ok_or_else(|| mismatch(name, "boolean", value))?;
		},
		FieldType::Integer { min, max } => {
			let n = value
				.as_integer()
				.ok_or_else(|| mismatch(name, "integer", value))?;
			if let Some(min) = min.filter(|min| n < *min) {
				return Err(ValidationError::InvalidValue {
					field: name.to_string(),
					message: format!("Value {} is less than minimum {}", n, min),
				});
			}
			if let Some(max) = max.filter(|max| n > *max) {
				return Err(ValidationError::InvalidValue {
					field: name.to_string(),
					message: format!("Value {} is greater than maximum {}", n, max),
				});
			}
		},
		FieldType::Address => {
			let s = value.as_str().ok_or_else(|| mismatch(name, "address", value))?;
			let hex_part = s.strip_prefix("0x").unwrap_or("");
			if hex_part.len() != 40 || !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
				return Err(ValidationError::InvalidValue {
					field: name.to_string(),
					message: format!("'{}' is not a 0x-prefixed 20-byte address", s),
				});
			}
		},
		FieldType::Url => {
			let s = value.as_str().ok_or_else(|| mismatch(name, "url", value))?;
			if !(s.starts_with("http://") || s.starts_with("https://")) {
				return Err(ValidationError::InvalidValue {
					field: name.to_string(),
					message: format!("'{}' must start with http:// or https://", s),
				});
			}
		},
		FieldType::Table(schema) => {
			schema.validate(value).map_err(|e| e.nested_in(name))?;
		},
	}
	Ok(())
}

/// Implemented by each backend to validate its configuration table.
#[async_trait]
pub trait ConfigSchema: Send + Sync {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError>;
}

#[cfg(test)]
mod tests {
	use super::*;

	fn relay_schema() -> Schema {
		Schema::new(
			vec![Field::new("url", FieldType::Url)],
			vec![
				Field::new(
					"timeout_seconds",
					FieldType::Integer {
						min: Some(1),
						max: Some(300),
					},
				),
				Field::new("spender", FieldType::Address),
				Field::new("label", FieldType::String).with_validator(|v| {
					if v.as_str() == Some("") {
						Err("must not be empty".into())
					} else {
						Ok(())
					}
				}),
			],
		)
	}

	#[test]
	fn test_valid_table_passes() {
		let config: toml::Value = toml::from_str(
			r#"
			url = "https://relay.example"
			timeout_seconds = 30
			spender = "0xE004eB206f7D26CD0E3d69eDB85814Cc137Ae9D9"
			"#,
		)
		.unwrap();
		assert!(relay_schema().validate(&config).is_ok());
	}

	#[test]
	fn test_field_errors() {
		let missing: toml::Value = toml::from_str("timeout_seconds = 30").unwrap();
		assert!(matches!(
			relay_schema().validate(&missing),
			Err(ValidationError::MissingField(f)) if f == "url"
		));

		let bad_url: toml::Value = toml::from_str(r#"url = "ftp://relay""#).unwrap();
		assert!(matches!(
			relay_schema().validate(&bad_url),
			Err(ValidationError::InvalidValue { field, .. }) if field == "url"
		));

		let out_of_range: toml::Value =
			toml::from_str("url = \"http://x\"\ntimeout_seconds = 0").unwrap();
		assert!(matches!(
			relay_schema().validate(&out_of_range),
			Err(ValidationError::InvalidValue { field, .. }) if field == "timeout_seconds"
		));

		let short_address: toml::Value =
			toml::from_str("url = \"http://x\"\nspender = \"0x1234\"").unwrap();
		assert!(relay_schema().validate(&short_address).is_err());

		let empty_label: toml::Value = toml::from_str("url = \"http://x\"\nlabel = \"\"").unwrap();
		assert!(matches!(
			relay_schema().validate(&empty_label),
			Err(ValidationError::InvalidValue { message, .. }) if message == "must not be empty"
		));
	}

	#[test]
	fn test_nested_field_names_are_qualified() {
		let schema = Schema::new(
			vec![Field::new("inner", FieldType::Table(relay_schema()))],
			vec![],
		);
		let config: toml::Value = toml::from_str("[inner]\ntimeout_seconds = \"thirty\"").unwrap();
		assert!(matches!(
			schema.validate(&config),
			Err(ValidationError::MissingField(f)) if f == "inner.url"
		));
	}
}
