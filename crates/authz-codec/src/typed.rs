//! A message bound to its signing domain.

use crate::messages::{
	CancelAuthorization, Permit, PermitTransferFrom, ReceiveWithAuthorization,
	TransferWithAuthorization,
};
use crate::{split_signature, CodecError};
use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_sol_types::{Eip712Domain, SolStruct};
use authz_types::{PermitAuthorization, TransferAuthorization};
use serde_json::{json, Value};

type TypeFields = &'static [(&'static str, &'static str)];

const AUTHORIZATION_FIELDS: TypeFields = &[
	("from", "address"),
	("to", "address"),
	("value", "uint256"),
	("validAfter", "uint256"),
	("validBefore", "uint256"),
	("nonce", "bytes32"),
];
const CANCEL_FIELDS: TypeFields = &[("authorizer", "address"), ("nonce", "bytes32")];
const PERMIT_FIELDS: TypeFields = &[
	("owner", "address"),
	("spender", "address"),
	("value", "uint256"),
	("nonce", "uint256"),
	("deadline", "uint256"),
];
const PERMIT_TRANSFER_FROM_FIELDS: TypeFields = &[
	("permitted", "TokenPermissions"),
	("spender", "address"),
	("nonce", "uint256"),
	("deadline", "uint256"),
];
const TOKEN_PERMISSIONS_FIELDS: TypeFields = &[("token", "address"), ("amount", "uint256")];

/// The message kinds the codec can build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationMessage {
	TransferWithAuthorization(TransferWithAuthorization),
	ReceiveWithAuthorization(ReceiveWithAuthorization),
	CancelAuthorization(CancelAuthorization),
	Permit(Permit),
	PermitTransferFrom(PermitTransferFrom),
}

macro_rules! impl_from_message {
	($($variant:ident),*) => {
		$(
			impl From<$variant> for AuthorizationMessage {
				fn from(message: $variant) -> Self {
					AuthorizationMessage::$variant(message)
				}
			}
		)*
	};
}

impl_from_message!(
	TransferWithAuthorization,
	ReceiveWithAuthorization,
	CancelAuthorization,
	Permit,
	PermitTransferFrom
);

/// Typed data ready to be signed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypedMessage {
	domain: Eip712Domain,
	message: AuthorizationMessage,
}

impl TypedMessage {
	pub fn new(domain: Eip712Domain, message: AuthorizationMessage) -> Self {
		Self { domain, message }
	}

	pub fn domain(&self) -> &Eip712Domain {
		&self.domain
	}

	pub fn message(&self) -> &AuthorizationMessage {
		&self.message
	}

	/// EIP-712 primary type name.
	pub fn primary_type(&self) -> &'static str {
		match &self.message {
			AuthorizationMessage::TransferWithAuthorization(_) => "TransferWithAuthorization",
			AuthorizationMessage::ReceiveWithAuthorization(_) => "ReceiveWithAuthorization",
			AuthorizationMessage::CancelAuthorization(_) => "CancelAuthorization",
			AuthorizationMessage::Permit(_) => "Permit",
			AuthorizationMessage::PermitTransferFrom(_) => "PermitTransferFrom",
		}
	}

	/// `keccak256(0x1901 || domainSeparator || hashStruct(message))`.
	pub fn signing_hash(&self) -> B256 {
		match &self.message {
			AuthorizationMessage::TransferWithAuthorization(m) => m.eip712_signing_hash(&self.domain),
			AuthorizationMessage::ReceiveWithAuthorization(m) => m.eip712_signing_hash(&self.domain),
			AuthorizationMessage::CancelAuthorization(m) => m.eip712_signing_hash(&self.domain),
			AuthorizationMessage::Permit(m) => m.eip712_signing_hash(&self.domain),
			AuthorizationMessage::PermitTransferFrom(m) => m.eip712_signing_hash(&self.domain),
		}
	}

	/// Renders the message in the `eth_signTypedData_v4` JSON layout.
	pub fn to_json(&self) -> Value {
		let mut types = serde_json::Map::new();
		types.insert("EIP712Domain".into(), self.domain_type());
		for (name, fields) in self.message_types() {
			let fields: Vec<Value> = fields
				.iter()
				.map(|(field, ty)| json!({ "name": field, "type": ty }))
				.collect();
			types.insert(name.into(), Value::Array(fields));
		}

		json!({
			"types": types,
			"primaryType": self.primary_type(),
			"domain": self.domain_json(),
			"message": self.message_json(),
		})
	}

	/// Pairs a transfer authorization message with its signature.
	pub fn into_transfer_authorization(
		self,
		signature: Bytes,
		saved_at: u64,
	) -> Result<TransferAuthorization, CodecError> {
		let actual = self.primary_type();
		let AuthorizationMessage::TransferWithAuthorization(m) = self.message else {
			return Err(CodecError::UnexpectedMessage {
				expected: "TransferWithAuthorization",
				actual,
			});
		};
		let split = split_signature(&signature)?;
		Ok(TransferAuthorization {
			from: m.from,
			to: m.to,
			value: m.value,
			valid_after: to_u64(m.validAfter, "validAfter")?,
			valid_before: to_u64(m.validBefore, "validBefore")?,
			nonce: m.nonce,
			signature,
			v: split.v,
			r: split.r,
			s: split.s,
			saved_at,
			tx_hash: None,
		})
	}

	/// Pairs a permit message with its signature.
	pub fn into_permit_authorization(
		self,
		signature: Bytes,
		saved_at: u64,
	) -> Result<PermitAuthorization, CodecError> {
		let actual = self.primary_type();
		let AuthorizationMessage::Permit(m) = self.message else {
			return Err(CodecError::UnexpectedMessage {
				expected: "Permit",
				actual,
			});
		};
		let split = split_signature(&signature)?;
		Ok(PermitAuthorization {
			owner: m.owner,
			spender: m.spender,
			value: m.value,
			nonce: m.nonce,
			deadline: to_u64(m.deadline, "deadline")?,
			signature,
			v: split.v,
			r: split.r,
			s: split.s,
			saved_at,
			tx_hash: None,
		})
	}

	fn domain_type(&self) -> Value {
		let mut fields = Vec::new();
		if self.domain.name.is_some() {
			fields.push(json!({ "name": "name", "type": "string" }));
		}
		if self.domain.version.is_some() {
			fields.push(json!({ "name": "version", "type": "string" }));
		}
		if self.domain.chain_id.is_some() {
			fields.push(json!({ "name": "chainId", "type": "uint256" }));
		}
		if self.domain.verifying_contract.is_some() {
			fields.push(json!({ "name": "verifyingContract", "type": "address" }));
		}
		Value::Array(fields)
	}

	fn domain_json(&self) -> Value {
		let mut domain = serde_json::Map::new();
		if let Some(name) = &self.domain.name {
			domain.insert("name".into(), json!(name));
		}
		if let Some(version) = &self.domain.version {
			domain.insert("version".into(), json!(version));
		}
		if let Some(chain_id) = self.domain.chain_id {
			domain.insert("chainId".into(), json!(chain_id.to_string()));
		}
		if let Some(contract) = self.domain.verifying_contract {
			domain.insert("verifyingContract".into(), json!(contract.to_string()));
		}
		Value::Object(domain)
	}

	fn message_types(&self) -> Vec<(&'static str, TypeFields)> {
		match &self.message {
			AuthorizationMessage::TransferWithAuthorization(_) => {
				vec![("TransferWithAuthorization", AUTHORIZATION_FIELDS)]
			},
			AuthorizationMessage::ReceiveWithAuthorization(_) => {
				vec![("ReceiveWithAuthorization", AUTHORIZATION_FIELDS)]
			},
			AuthorizationMessage::CancelAuthorization(_) => {
				vec![("CancelAuthorization", CANCEL_FIELDS)]
			},
			AuthorizationMessage::Permit(_) => vec![("Permit", PERMIT_FIELDS)],
			AuthorizationMessage::PermitTransferFrom(_) => vec![
				("PermitTransferFrom", PERMIT_TRANSFER_FROM_FIELDS),
				("TokenPermissions", TOKEN_PERMISSIONS_FIELDS),
			],
		}
	}

	fn message_json(&self) -> Value {
		let address = |a: &Address| json!(a.to_string());
		let uint = |n: &U256| json!(n.to_string());
		let bytes32 = |b: &B256| json!(format!("0x{}", hex::encode(b)));

		match &self.message {
			AuthorizationMessage::TransferWithAuthorization(m) => json!({
				"from": address(&m.from),
				"to": address(&m.to),
				"value": uint(&m.value),
				"validAfter": uint(&m.validAfter),
				"validBefore": uint(&m.validBefore),
				"nonce": bytes32(&m.nonce),
			}),
			AuthorizationMessage::ReceiveWithAuthorization(m) => json!({
				"from": address(&m.from),
				"to": address(&m.to),
				"value": uint(&m.value),
				"validAfter": uint(&m.validAfter),
				"validBefore": uint(&m.validBefore),
				"nonce": bytes32(&m.nonce),
			}),
			AuthorizationMessage::CancelAuthorization(m) => json!({
				"authorizer": address(&m.authorizer),
				"nonce": bytes32(&m.nonce),
			}),
			AuthorizationMessage::Permit(m) => json!({
				"owner": address(&m.owner),
				"spender": address(&m.spender),
				"value": uint(&m.value),
				"nonce": uint(&m.nonce),
				"deadline": uint(&m.deadline),
			}),
			AuthorizationMessage::PermitTransferFrom(m) => json!({
				"permitted": {
					"token": address(&m.permitted.token),
					"amount": uint(&m.permitted.amount),
				},
				"spender": address(&m.spender),
				"nonce": uint(&m.nonce),
				"deadline": uint(&m.deadline),
			}),
		}
	}
}

fn to_u64(value: U256, field: &'static str) -> Result<u64, CodecError> {
	if value > U256::from(u64::MAX) {
		return Err(CodecError::TimestampOverflow(field));
	}
	Ok(value.as_limbs()[0])
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::TokenDomain;
	use authz_types::DeploymentConfig;

	fn domain() -> TokenDomain {
		TokenDomain::from_deployment(&DeploymentConfig::base_sepolia("http://localhost:8545"))
	}

	fn signature_bytes(v: u8) -> Bytes {
		let mut sig = vec![0x11u8; 32];
		sig.extend([0x22u8; 32]);
		sig.push(v);
		Bytes::from(sig)
	}

	#[test]
	fn test_typed_data_json_layout() {
		let message = domain().build_permit(
			Address::repeat_byte(1),
			Address::repeat_byte(2),
			U256::MAX,
			U256::from(3u64),
			1_700_000_000,
		);
		let json = message.to_json();

		assert_eq!(json["primaryType"], "Permit");
		assert_eq!(json["domain"]["name"], "USDC");
		assert_eq!(json["domain"]["version"], "2");
		assert_eq!(json["domain"]["chainId"], "84532");
		assert_eq!(json["types"]["EIP712Domain"].as_array().unwrap().len(), 4);
		assert_eq!(json["types"]["Permit"][3]["name"], "nonce");
		assert_eq!(json["message"]["value"], U256::MAX.to_string());
		assert_eq!(json["message"]["deadline"], "1700000000");
	}

	#[test]
	fn test_permit2_json_includes_nested_type() {
		let message = crate::Permit2Domain {
			chain_id: 8453,
			permit2: authz_types::CANONICAL_PERMIT2_ADDRESS,
		}
		.build_permit2_transfer(
			Address::repeat_byte(3),
			U256::from(10u64),
			Address::repeat_byte(4),
			U256::ZERO,
			60,
		);
		let json = message.to_json();

		assert_eq!(json["types"]["EIP712Domain"].as_array().unwrap().len(), 3);
		assert_eq!(json["types"]["TokenPermissions"][1]["name"], "amount");
		assert_eq!(json["message"]["permitted"]["amount"], "10");
	}

	#[test]
	fn test_into_transfer_authorization() {
		let nonce = B256::repeat_byte(0xaa);
		let message = domain()
			.build_transfer_authorization(
				Address::repeat_byte(1),
				Address::repeat_byte(2),
				U256::from(1_000_000u64),
				0,
				3600,
				Some(nonce),
			)
			.unwrap();

		let record = message
			.into_transfer_authorization(signature_bytes(0), 42)
			.unwrap();
		assert_eq!(record.nonce, nonce);
		assert_eq!(record.valid_before, 3600);
		assert_eq!(record.v, 27);
		assert_eq!(record.r, B256::repeat_byte(0x11));
		assert_eq!(record.saved_at, 42);
		assert!(record.tx_hash.is_none());
	}

	#[test]
	fn test_into_record_rejects_other_kind() {
		let message = domain().build_cancel_authorization(Address::repeat_byte(1), B256::ZERO);
		assert!(matches!(
			message.into_permit_authorization(signature_bytes(27), 0),
			Err(CodecError::UnexpectedMessage {
				expected: "Permit",
				actual: "CancelAuthorization"
			})
		));
	}
}
