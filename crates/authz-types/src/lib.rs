//! Common types module for the gasless authorization system.
//!
//! This module defines the data model shared by every crate in the workspace:
//! the two authorization kinds and their dedup key, the statuses derived from
//! chain state, deployment configuration, delivery primitives and the
//! configuration validation framework used by pluggable backends.

/// Signed authorization records and their dedup key.
pub mod authorization;
/// Deployment (token, chain, relayer) configuration types.
pub mod deployment;
/// Transaction delivery types for blockchain interactions.
pub mod delivery;
/// Registry trait for self-registering backend implementations.
pub mod registry;
/// Secure string wrapper for key material.
pub mod secret_string;
/// Statuses derived from cached entries and chain state.
pub mod status;
/// Storage collection keys.
pub mod storage;
/// Utility functions for common conversions and formatting.
pub mod utils;
/// Configuration validation types for backend configurations.
pub mod validation;

pub use alloy_primitives::{Address, Bytes, B256, U256};

pub use authorization::*;
pub use deployment::{DeploymentConfig, TokenConfig, CANONICAL_PERMIT2_ADDRESS};
pub use delivery::*;
pub use registry::ImplementationRegistry;
pub use secret_string::SecretString;
pub use status::*;
pub use storage::*;
pub use utils::{
	current_timestamp, current_timestamp_millis, format_token_amount, parse_token_amount,
	with_0x_prefix, without_0x_prefix, AmountError,
};
pub use validation::*;
