//! EIP-712 message codec for gasless token authorizations.
//!
//! Builds the canonical typed messages for ERC-3009 transfer authorizations,
//! ERC-2612 permits and Permit2 signature transfers, computes their signing
//! digests, and decomposes wallet signatures into `(v, r, s)`. Everything in
//! this crate is pure; signing and submission live behind the account and
//! delivery seams.

use thiserror::Error;

pub mod contracts;
pub mod messages;
pub mod nonce;
pub mod signature;
pub mod typed;

pub use contracts::IAuthorizationToken;
pub use messages::{
	CancelAuthorization, Permit, Permit2Domain, PermitTransferFrom, ReceiveWithAuthorization,
	TokenDomain, TokenPermissions, TransferWithAuthorization,
};
pub use nonce::generate_nonce;
pub use signature::{split_signature, split_signature_hex, SIGNATURE_LENGTH};
pub use typed::{AuthorizationMessage, TypedMessage};

/// Errors raised while building messages or decoding signatures.
#[derive(Debug, Error)]
pub enum CodecError {
	#[error("Malformed signature: {0}")]
	MalformedSignature(String),
	#[error("Invalid validity window: validAfter {valid_after} is not before validBefore {valid_before}")]
	InvalidValidityWindow { valid_after: u64, valid_before: u64 },
	#[error("Expected a {expected} message, got {actual}")]
	UnexpectedMessage {
		expected: &'static str,
		actual: &'static str,
	},
	#[error("Field {0} does not fit in a unix timestamp")]
	TimestampOverflow(&'static str),
}
