//! ABI bindings for the verifying token contract.
//!
//! Covers the ERC-20 subset plus the ERC-3009 and ERC-2612 entry points used by
//! the chain reader and writer. Only the `(v, r, s)` signature overloads are
//! declared.

use alloy_sol_types::sol;

sol! {
	#[allow(missing_docs)]
	#[allow(clippy::too_many_arguments)]
	#[derive(Debug, PartialEq, Eq)]
	interface IAuthorizationToken {
		function balanceOf(address account) external view returns (uint256);
		function allowance(address owner, address spender) external view returns (uint256);
		function nonces(address owner) external view returns (uint256);
		function authorizationState(address authorizer, bytes32 nonce) external view returns (bool);

		function transferWithAuthorization(
			address from,
			address to,
			uint256 value,
			uint256 validAfter,
			uint256 validBefore,
			bytes32 nonce,
			uint8 v,
			bytes32 r,
			bytes32 s
		) external;

		function receiveWithAuthorization(
			address from,
			address to,
			uint256 value,
			uint256 validAfter,
			uint256 validBefore,
			bytes32 nonce,
			uint8 v,
			bytes32 r,
			bytes32 s
		) external;

		function cancelAuthorization(
			address authorizer,
			bytes32 nonce,
			uint8 v,
			bytes32 r,
			bytes32 s
		) external;

		function permit(
			address owner,
			address spender,
			uint256 value,
			uint256 deadline,
			uint8 v,
			bytes32 r,
			bytes32 s
		) external;

		function approve(address spender, uint256 value) external returns (bool);
		function transferFrom(address from, address to, uint256 value) external returns (bool);
	}
}
