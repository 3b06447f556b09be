//! Decomposition of 65-byte ECDSA signatures.

use crate::CodecError;
use alloy_primitives::B256;
use authz_types::{without_0x_prefix, SplitSignature};

/// Length of an `r || s || v` signature.
pub const SIGNATURE_LENGTH: usize = 65;

/// Splits `r || s || v` into its components.
///
/// `v` is normalized to 27/28; wallets that emit a 0/1 recovery id are
/// accepted.
pub fn split_signature(signature: &[u8]) -> Result<SplitSignature, CodecError> {
	if signature.len() != SIGNATURE_LENGTH {
		return Err(CodecError::MalformedSignature(format!(
			"expected {} bytes, got {}",
			SIGNATURE_LENGTH,
			signature.len()
		)));
	}

	let v = match signature[64] {
		v @ (27 | 28) => v,
		v @ (0 | 1) => v + 27,
		other => {
			return Err(CodecError::MalformedSignature(format!(
				"invalid recovery id {}",
				other
			)))
		},
	};

	Ok(SplitSignature {
		v,
		r: B256::from_slice(&signature[..32]),
		s: B256::from_slice(&signature[32..64]),
	})
}

/// Splits a `0x`-prefixed 130-character hex signature.
pub fn split_signature_hex(signature: &str) -> Result<SplitSignature, CodecError> {
	if !signature.starts_with("0x") || signature.len() != 2 + SIGNATURE_LENGTH * 2 {
		return Err(CodecError::MalformedSignature(
			"expected 0x followed by 130 hex characters".into(),
		));
	}
	let bytes = hex::decode(without_0x_prefix(signature))
		.map_err(|e| CodecError::MalformedSignature(e.to_string()))?;
	split_signature(&bytes)
}
