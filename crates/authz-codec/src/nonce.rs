//! Random nonces for single-use authorizations.

use alloy_primitives::B256;
use rand::{rngs::OsRng, RngCore};

/// Draws 32 bytes from the operating system CSPRNG.
pub fn generate_nonce() -> B256 {
	let mut bytes = [0u8; 32];
	OsRng.fill_bytes(&mut bytes);
	B256::from(bytes)
}
