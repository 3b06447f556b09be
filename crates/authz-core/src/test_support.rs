//! In-process fakes for the wallet, chain and relayer.

use crate::{AuthorizationManager, ManualClock};
use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_sol_types::{SolCall, SolValue};
use async_trait::async_trait;
use authz_account::implementations::local::LocalWallet;
use authz_account::{AccountError, AccountInterface, AccountService};
use authz_codec::IAuthorizationToken;
use authz_config::ManagerConfig;
use authz_delivery::{DeliveryError, DeliveryInterface, DeliveryService};
use authz_relay::{
	AllowanceTransferRequest, Permit2TransferRequest, PermitRelayRequest, RelayError,
	RelayInterface, RelayService, TransferRelayRequest,
};
use authz_storage::implementations::memory::MemoryStorage;
use authz_storage::StorageService;
use authz_types::{
	ConfigSchema, DeploymentConfig, SecretString, Transaction, TransactionHash, TransactionReceipt,
	ValidationError, CANONICAL_PERMIT2_ADDRESS,
};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

pub(crate) const DEV_KEY: &str =
	"0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

/// Start of the manual clock in manager tests.
pub(crate) const NOW: u64 = 1_700_000_000;

struct NoSchema;

impl ConfigSchema for NoSchema {
	fn validate(&self, _: &toml::Value) -> Result<(), ValidationError> {
		Ok(())
	}
}

/// How the fake chain answers receipt waits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) enum Confirm {
	#[default]
	Success,
	Revert,
	Hang,
	/// The receipt poll itself fails.
	RpcDown,
}

#[derive(Default)]
pub(crate) struct ChainState {
	pub balance: U256,
	pub allowance: U256,
	pub permit2_allowance: U256,
	pub nonce: U256,
	pub used: HashSet<B256>,
	pub submitted: Vec<Transaction>,
	/// Refuse every submission with this message.
	pub reject_submit: Option<String>,
	pub confirm: Confirm,
	/// Parks submissions until notified.
	pub gate: Option<Arc<Notify>>,
}

/// Token contract stand-in that applies confirmed writes to its own state.
#[derive(Clone)]
pub(crate) struct FakeChain {
	state: Arc<Mutex<ChainState>>,
}

impl FakeChain {
	pub const TX_HASH: TransactionHash = TransactionHash(B256::repeat_byte(0xaa));

	pub fn new(state: ChainState) -> Self {
		Self {
			state: Arc::new(Mutex::new(state)),
		}
	}

	pub fn service(&self) -> DeliveryService {
		DeliveryService::new(
			Box::new(self.clone()),
			Address::repeat_byte(0x70),
			1,
			Duration::from_secs(120),
		)
	}

	pub fn submitted_count(&self) -> usize {
		self.state.lock().unwrap().submitted.len()
	}

	pub fn mark_used(&self, nonce: B256) {
		self.state.lock().unwrap().used.insert(nonce);
	}

	pub fn set_nonce(&self, nonce: u64) {
		self.state.lock().unwrap().nonce = U256::from(nonce);
	}

	pub fn set_allowance(&self, allowance: U256) {
		self.state.lock().unwrap().allowance = allowance;
	}

	pub fn set_confirm(&self, confirm: Confirm) {
		self.state.lock().unwrap().confirm = confirm;
	}

	fn apply(state: &mut ChainState, data: &[u8]) {
		if let Ok(call) = IAuthorizationToken::transferWithAuthorizationCall::abi_decode(data, true) {
			state.used.insert(call.nonce);
		} else if let Ok(call) = IAuthorizationToken::cancelAuthorizationCall::abi_decode(data, true) {
			state.used.insert(call.nonce);
		} else if let Ok(call) = IAuthorizationToken::permitCall::abi_decode(data, true) {
			state.nonce += U256::from(1u64);
			state.allowance = call.value;
		} else if let Ok(call) = IAuthorizationToken::approveCall::abi_decode(data, true) {
			state.permit2_allowance = call.value;
		}
	}
}

#[async_trait]
impl DeliveryInterface for FakeChain {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(NoSchema)
	}

	async fn call(&self, tx: &Transaction) -> Result<Bytes, DeliveryError> {
		let state = self.state.lock().unwrap();
		let data = &tx.data[..];
		let ret = if data.starts_with(&IAuthorizationToken::balanceOfCall::SELECTOR) {
			state.balance.abi_encode()
		} else if let Ok(call) = IAuthorizationToken::allowanceCall::abi_decode(data, true) {
			if call.spender == CANONICAL_PERMIT2_ADDRESS {
				state.permit2_allowance.abi_encode()
			} else {
				state.allowance.abi_encode()
			}
		} else if data.starts_with(&IAuthorizationToken::noncesCall::SELECTOR) {
			state.nonce.abi_encode()
		} else if let Ok(call) =
			IAuthorizationToken::authorizationStateCall::abi_decode(data, true)
		{
			state.used.contains(&call.nonce).abi_encode()
		} else {
			return Err(DeliveryError::Network("unexpected call".into()));
		};
		Ok(Bytes::from(ret))
	}

	async fn submit(&self, tx: Transaction) -> Result<TransactionHash, DeliveryError> {
		let gate = self.state.lock().unwrap().gate.clone();
		if let Some(gate) = gate {
			gate.notified().await;
		}

		let mut state = self.state.lock().unwrap();
		if let Some(reason) = &state.reject_submit {
			return Err(DeliveryError::TransactionFailed(reason.clone()));
		}
		if state.confirm == Confirm::Success {
			Self::apply(&mut state, &tx.data);
		}
		state.submitted.push(tx);
		Ok(Self::TX_HASH)
	}

	async fn wait_for_confirmation(
		&self,
		hash: &TransactionHash,
		_confirmations: u64,
	) -> Result<TransactionReceipt, DeliveryError> {
		let confirm = self.state.lock().unwrap().confirm;
		match confirm {
			Confirm::Success | Confirm::Revert => Ok(TransactionReceipt {
				hash: *hash,
				block_number: 100,
				success: confirm == Confirm::Success,
			}),
			Confirm::Hang => std::future::pending().await,
			Confirm::RpcDown => Err(DeliveryError::Network(
				"Failed to get receipt: connection reset".into(),
			)),
		}
	}
}

/// Relayer stand-in recording which endpoints were hit.
#[derive(Clone, Default)]
pub(crate) struct FakeRelay {
	calls: Arc<Mutex<Vec<&'static str>>>,
	reject: Option<String>,
	/// Answer 2xx without a hash.
	hashless: bool,
	gate: Option<Arc<Notify>>,
}

impl FakeRelay {
	pub const TX_HASH: TransactionHash = TransactionHash(B256::repeat_byte(0xbb));

	pub fn rejecting(message: &str) -> Self {
		Self {
			reject: Some(message.to_string()),
			..Self::default()
		}
	}

	pub fn hashless() -> Self {
		Self {
			hashless: true,
			..Self::default()
		}
	}

	pub fn gated(gate: Arc<Notify>) -> Self {
		Self {
			gate: Some(gate),
			..Self::default()
		}
	}

	pub fn service(&self) -> RelayService {
		RelayService::new(Box::new(self.clone()))
	}

	pub fn calls(&self) -> Vec<&'static str> {
		self.calls.lock().unwrap().clone()
	}

	async fn answer(&self, endpoint: &'static str) -> Result<TransactionHash, RelayError> {
		if let Some(gate) = &self.gate {
			gate.notified().await;
		}
		self.calls.lock().unwrap().push(endpoint);
		match &self.reject {
			Some(message) => Err(RelayError::Rejected(message.clone())),
			None if self.hashless => Err(RelayError::InvalidResponse("missing hash".into())),
			None => Ok(Self::TX_HASH),
		}
	}
}

#[async_trait]
impl RelayInterface for FakeRelay {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(NoSchema)
	}

	async fn submit_transfer(
		&self,
		_request: &TransferRelayRequest,
	) -> Result<TransactionHash, RelayError> {
		self.answer("/relay").await
	}

	async fn submit_permit(
		&self,
		_request: &PermitRelayRequest,
	) -> Result<TransactionHash, RelayError> {
		self.answer("/permit").await
	}

	async fn submit_permit2_transfer(
		&self,
		_request: &Permit2TransferRequest,
	) -> Result<TransactionHash, RelayError> {
		self.answer("/permit2/transfer").await
	}

	async fn submit_allowance_transfer(
		&self,
		_request: &AllowanceTransferRequest,
	) -> Result<TransactionHash, RelayError> {
		self.answer("/transfer").await
	}
}

/// Wallet whose holder declines every request.
pub(crate) struct DecliningWallet;

#[async_trait]
impl AccountInterface for DecliningWallet {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(NoSchema)
	}

	async fn address(&self) -> Result<Address, AccountError> {
		Ok(Address::repeat_byte(0x0d))
	}

	async fn sign_typed_hash(&self, _digest: &B256) -> Result<Bytes, AccountError> {
		Err(AccountError::SigningRejected("User denied message signature".into()))
	}

	fn get_private_key(&self) -> SecretString {
		SecretString::from("")
	}
}

pub(crate) fn dev_wallet() -> Box<dyn AccountInterface> {
	Box::new(LocalWallet::new(SecretString::from(DEV_KEY)).unwrap())
}

/// Manager over fresh in-memory storage with a manual clock at [`NOW`].
pub(crate) fn manager(
	chain: &FakeChain,
	relay: &FakeRelay,
	wallet: Box<dyn AccountInterface>,
) -> (Arc<AuthorizationManager>, Arc<ManualClock>) {
	let storage = Arc::new(StorageService::new(Box::new(MemoryStorage::new())));
	manager_over(storage, chain, relay, wallet)
}

/// Manager over `storage`, as a later process sharing the cache would see it.
pub(crate) fn manager_over(
	storage: Arc<StorageService>,
	chain: &FakeChain,
	relay: &FakeRelay,
	wallet: Box<dyn AccountInterface>,
) -> (Arc<AuthorizationManager>, Arc<ManualClock>) {
	let clock = Arc::new(ManualClock::new(NOW));
	let manager = AuthorizationManager::new(
		DeploymentConfig::base_sepolia("http://localhost:8545"),
		ManagerConfig::default(),
		storage,
		Arc::new(AccountService::new(wallet)),
		Arc::new(chain.service()),
		Arc::new(relay.service()),
		clock.clone(),
	);
	(Arc::new(manager), clock)
}
