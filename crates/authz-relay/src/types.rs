//! Relayer wire types.
//!
//! Every numeric field travels as a decimal string except `v`, which is a JSON
//! number. Field names are camelCase.

use alloy_primitives::{Address, Bytes, B256, U256};
use authz_types::utils::serde_decimal;
use authz_types::{PermitAuthorization, TransferAuthorization};
use serde::{Deserialize, Serialize};

/// Body of `POST /relay`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRelayRequest {
	pub from: Address,
	pub to: Address,
	#[serde(with = "serde_decimal::u256")]
	pub value: U256,
	#[serde(with = "serde_decimal::u64")]
	pub valid_after: u64,
	#[serde(with = "serde_decimal::u64")]
	pub valid_before: u64,
	pub nonce: B256,
	pub v: u8,
	pub r: B256,
	pub s: B256,
}

impl From<&TransferAuthorization> for TransferRelayRequest {
	fn from(auth: &TransferAuthorization) -> Self {
		Self {
			from: auth.from,
			to: auth.to,
			value: auth.value,
			valid_after: auth.valid_after,
			valid_before: auth.valid_before,
			nonce: auth.nonce,
			v: auth.v,
			r: auth.r,
			s: auth.s,
		}
	}
}

/// Body of `POST /permit`. The relayer reads the nonce from chain itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermitRelayRequest {
	pub owner: Address,
	pub spender: Address,
	#[serde(with = "serde_decimal::u256")]
	pub value: U256,
	#[serde(with = "serde_decimal::u64")]
	pub deadline: u64,
	pub v: u8,
	pub r: B256,
	pub s: B256,
}

impl From<&PermitAuthorization> for PermitRelayRequest {
	fn from(permit: &PermitAuthorization) -> Self {
		Self {
			owner: permit.owner,
			spender: permit.spender,
			value: permit.value,
			deadline: permit.deadline,
			v: permit.v,
			r: permit.r,
			s: permit.s,
		}
	}
}

/// Body of `POST /permit2/transfer`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permit2TransferRequest {
	pub owner: Address,
	pub to: Address,
	#[serde(with = "serde_decimal::u256")]
	pub amount: U256,
	#[serde(with = "serde_decimal::u256")]
	pub nonce: U256,
	#[serde(with = "serde_decimal::u64")]
	pub deadline: u64,
	/// Full 65-byte signature as 0x-hex.
	pub signature: Bytes,
}

/// Body of `POST /transfer`: a spend within an activated allowance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowanceTransferRequest {
	pub from: Address,
	pub to: Address,
	#[serde(with = "serde_decimal::u256")]
	pub value: U256,
}

/// Relayer reply; `hash` on success, `error` otherwise.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct RelayResponse {
	#[serde(default)]
	pub hash: Option<String>,
	#[serde(default)]
	pub error: Option<String>,
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn test_transfer_request_wire_format() {
		let request = TransferRelayRequest {
			from: Address::repeat_byte(0x11),
			to: Address::repeat_byte(0x22),
			value: U256::MAX,
			valid_after: 0,
			valid_before: 1_700_003_600,
			nonce: B256::repeat_byte(0xab),
			v: 27,
			r: B256::repeat_byte(1),
			s: B256::repeat_byte(2),
		};

		let value = serde_json::to_value(&request).unwrap();
		assert_eq!(value["value"], json!(U256::MAX.to_string()));
		assert_eq!(value["validAfter"], json!("0"));
		assert_eq!(value["validBefore"], json!("1700003600"));
		assert_eq!(value["v"], json!(27));
		assert!(value["nonce"].as_str().unwrap().starts_with("0xabab"));
	}

	#[test]
	fn test_permit2_request_signature_is_hex() {
		let request = Permit2TransferRequest {
			owner: Address::repeat_byte(1),
			to: Address::repeat_byte(2),
			amount: U256::from(1_000_000u64),
			nonce: U256::ZERO,
			deadline: 10,
			signature: Bytes::from(vec![0xffu8; 65]),
		};
		let value = serde_json::to_value(&request).unwrap();
		assert_eq!(value["amount"], json!("1000000"));
		assert_eq!(value["nonce"], json!("0"));
		assert_eq!(value["signature"].as_str().unwrap().len(), 2 + 130);
	}
}
