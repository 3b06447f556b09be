//! Authorization lifecycle manager.
//!
//! Orchestrates signing, read-time status derivation, selection, execution and
//! invalidation. The local cache is a hint: every decision that moves value is
//! taken on a fresh chain read.

use crate::executor::{ensure_within_allowance, AllowanceExecutor, AuthorizationExecutor};
use crate::selection::{ActiveSelection, SelectedAuthorization};
use crate::state::LifecycleTracker;
use crate::status::{derive_permit_status, derive_transfer_status, PermitSnapshot, TransferSnapshot};
use crate::{AuthorizationError, Clock, ExecutionMode};
use alloy_primitives::{Address, Bytes, B256, U256};
use authz_account::AccountService;
use authz_codec::{generate_nonce, split_signature, Permit2Domain, TokenDomain};
use authz_config::ManagerConfig;
use authz_delivery::DeliveryService;
use authz_relay::{Permit2TransferRequest, RelayService};
use authz_storage::{sort_newest_first, AuthorizationCache, FieldUpdate, StorageService};
use authz_types::{
	AuthorizationKey, AuthorizationState, CachedAuthorization, DeploymentConfig, DerivedStatus,
	PermitAuthorization, PermitStatus, TransactionHash, TransferAuthorization, TransferStatus,
};
use futures::future::try_join_all;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::instrument;

/// Parameters of a new single-use transfer authorization.
#[derive(Debug, Clone)]
pub struct TransferRequest {
	pub to: Address,
	pub value: U256,
	/// Defaults to 0 (valid immediately).
	pub valid_after: Option<u64>,
	/// Defaults to now plus the configured validity.
	pub valid_before: Option<u64>,
}

/// Parameters of a new permit.
#[derive(Debug, Clone)]
pub struct PermitRequest {
	/// Defaults to the deployment's spender.
	pub spender: Option<Address>,
	pub value: U256,
	pub deadline: Option<u64>,
}

/// Parameters of a Permit2 signature transfer.
#[derive(Debug, Clone)]
pub struct Permit2Request {
	pub to: Address,
	pub amount: U256,
	/// Permit2 unordered nonce, chosen by the caller.
	pub nonce: U256,
	pub deadline: Option<u64>,
}

/// Outcome of a maintenance pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshReport {
	pub purged_transfers: usize,
	pub purged_permits: usize,
}

impl RefreshReport {
	pub fn total(&self) -> usize {
		self.purged_transfers + self.purged_permits
	}
}

/// Lifecycle manager for one deployment and one holder account.
pub struct AuthorizationManager {
	deployment: DeploymentConfig,
	config: ManagerConfig,
	token_domain: TokenDomain,
	permit2_domain: Permit2Domain,
	transfers: AuthorizationCache<TransferAuthorization>,
	permits: AuthorizationCache<PermitAuthorization>,
	account: Arc<AccountService>,
	delivery: Arc<DeliveryService>,
	relay: Arc<RelayService>,
	executor: AuthorizationExecutor,
	allowance_executor: AllowanceExecutor,
	tracker: LifecycleTracker,
	selection: RwLock<ActiveSelection>,
	clock: Arc<dyn Clock>,
}

impl AuthorizationManager {
	pub fn new(
		deployment: DeploymentConfig,
		config: ManagerConfig,
		storage: Arc<StorageService>,
		account: Arc<AccountService>,
		delivery: Arc<DeliveryService>,
		relay: Arc<RelayService>,
		clock: Arc<dyn Clock>,
	) -> Self {
		// One collection pair per chain.
		let scope = deployment.chain_id.to_string();
		Self {
			token_domain: TokenDomain::from_deployment(&deployment),
			permit2_domain: Permit2Domain::from_deployment(&deployment),
			transfers: AuthorizationCache::new(storage.clone(), scope.clone()),
			permits: AuthorizationCache::new(storage, scope),
			executor: AuthorizationExecutor::new(delivery.clone(), relay.clone()),
			allowance_executor: AllowanceExecutor::new(relay.clone()),
			tracker: LifecycleTracker::new(),
			selection: RwLock::new(ActiveSelection::None),
			deployment,
			config,
			account,
			delivery,
			relay,
			clock,
		}
	}

	pub fn deployment(&self) -> &DeploymentConfig {
		&self.deployment
	}

	pub fn config(&self) -> &ManagerConfig {
		&self.config
	}

	/// Address of the holder.
	pub async fn owner(&self) -> Result<Address, AuthorizationError> {
		Ok(self.account.get_address().await?)
	}

	/// Session state of `key`.
	pub fn state(&self, key: &AuthorizationKey) -> AuthorizationState {
		self.tracker.state(key)
	}

	pub fn selection(&self) -> ActiveSelection {
		self.selection
			.read()
			.unwrap_or_else(PoisonError::into_inner)
			.clone()
	}

	pub fn clear_selection(&self) {
		self.set_selection(ActiveSelection::None);
	}

	fn set_selection(&self, selection: ActiveSelection) {
		*self
			.selection
			.write()
			.unwrap_or_else(PoisonError::into_inner) = selection;
	}

	fn release_selection(&self, key: &AuthorizationKey) {
		self.selection
			.write()
			.unwrap_or_else(PoisonError::into_inner)
			.release(key);
	}

	fn default_expiry(&self) -> u64 {
		self.clock
			.now()
			.saturating_add(self.config.default_validity_seconds)
	}

	/// Signs a single-use transfer authorization and caches it.
	#[instrument(skip_all, fields(to = %request.to, value = %request.value))]
	pub async fn sign_transfer(
		&self,
		request: TransferRequest,
	) -> Result<TransferAuthorization, AuthorizationError> {
		require_amount(request.value)?;
		require_address(request.to, "recipient")?;

		let now = self.clock.now();
		let valid_after = request.valid_after.unwrap_or(0);
		let valid_before = request.valid_before.unwrap_or_else(|| self.default_expiry());
		if valid_before <= now {
			return Err(AuthorizationError::Validation(format!(
				"validBefore {} is not in the future",
				valid_before
			)));
		}

		let from = self.owner().await?;
		let nonce = generate_nonce();
		let message = self.token_domain.build_transfer_authorization(
			from,
			request.to,
			request.value,
			valid_after,
			valid_before,
			Some(nonce),
		)?;

		let key = AuthorizationKey::transfer(from, nonce);
		let _guard = self.tracker.begin(&key)?;
		let signature = self.sign_digest(&key, message.signing_hash()).await?;
		let auth = message
			.into_transfer_authorization(signature, self.clock.now_millis())
			.map_err(|e| self.abandon(&key, e.into()))?;

		self.transfers.save(auth.clone()).await;
		self.tracker.transition(&key, AuthorizationState::Signed)?;
		self.set_selection(ActiveSelection::FreshlySigned(SelectedAuthorization::Transfer(
			auth.clone(),
		)));
		tracing::info!(key = %key, valid_before, "Signed transfer authorization");
		Ok(auth)
	}

	/// Signs a permit at the owner's current chain nonce and caches it.
	#[instrument(skip_all, fields(value = %request.value))]
	pub async fn sign_permit(
		&self,
		request: PermitRequest,
	) -> Result<PermitAuthorization, AuthorizationError> {
		require_amount(request.value)?;
		let spender = request.spender.unwrap_or(self.deployment.spender);
		require_address(spender, "spender")?;

		let deadline = request.deadline.unwrap_or_else(|| self.default_expiry());
		if deadline <= self.clock.now() {
			return Err(AuthorizationError::Validation(format!(
				"Deadline {} is not in the future",
				deadline
			)));
		}

		let owner = self.owner().await?;
		let nonce = self.delivery.nonces(owner).await?;
		let key = AuthorizationKey::permit(owner, nonce);
		let _guard = self.tracker.begin(&key)?;
		if self.permits.get(&key).await.is_some() {
			return Err(AuthorizationError::Validation(format!(
				"A permit at nonce {} is already cached; activate it or let it expire",
				nonce
			)));
		}

		let permit = self
			.sign_permit_at(&key, owner, spender, request.value, nonce, deadline)
			.await?;
		self.permits.save(permit.clone()).await;
		self.tracker.transition(&key, AuthorizationState::Signed)?;
		self.set_selection(ActiveSelection::FreshlySigned(SelectedAuthorization::Permit(
			permit.clone(),
		)));
		tracing::info!(key = %key, spender = %spender, deadline, "Signed permit");
		Ok(permit)
	}

	async fn sign_permit_at(
		&self,
		key: &AuthorizationKey,
		owner: Address,
		spender: Address,
		value: U256,
		nonce: U256,
		deadline: u64,
	) -> Result<PermitAuthorization, AuthorizationError> {
		self.tracker.forget(key);
		let message = self
			.token_domain
			.build_permit(owner, spender, value, nonce, deadline);
		let signature = self.sign_digest(key, message.signing_hash()).await?;
		message
			.into_permit_authorization(signature, self.clock.now_millis())
			.map_err(|e| self.abandon(key, e.into()))
	}

	/// Asks the wallet for a signature while `key` sits in `Signing`.
	async fn sign_digest(
		&self,
		key: &AuthorizationKey,
		digest: B256,
	) -> Result<Bytes, AuthorizationError> {
		self.tracker.transition(key, AuthorizationState::Signing)?;
		match self.account.sign_typed_hash(&digest).await {
			Ok(signature) => Ok(signature),
			Err(e) => {
				tracing::info!(key = %key, error = %e, "Signature not obtained");
				Err(self.abandon(key, e.into()))
			},
		}
	}

	/// Returns a key stuck in `Signing` to `None`.
	fn abandon(&self, key: &AuthorizationKey, err: AuthorizationError) -> AuthorizationError {
		if let Err(e) = self.tracker.transition(key, AuthorizationState::None) {
			tracing::debug!(key = %key, error = %e, "Could not reset signing state");
		}
		err
	}

	/// Derives the status of a transfer authorization from the chain.
	pub async fn transfer_status(
		&self,
		auth: &TransferAuthorization,
	) -> Result<TransferStatus, AuthorizationError> {
		let used = self
			.delivery
			.authorization_state(auth.from, auth.nonce)
			.await?;
		Ok(derive_transfer_status(
			auth,
			&TransferSnapshot { used },
			self.clock.now(),
		))
	}

	/// Derives the status of a permit from the chain.
	pub async fn permit_status(
		&self,
		permit: &PermitAuthorization,
	) -> Result<PermitStatus, AuthorizationError> {
		let chain_nonce = self.delivery.nonces(permit.owner).await?;
		let allowance = self
			.delivery
			.allowance(permit.owner, permit.spender)
			.await?;
		Ok(derive_permit_status(
			permit,
			&PermitSnapshot {
				chain_nonce,
				allowance,
			},
			self.clock.now(),
		))
	}

	/// Makes a cached transfer authorization the active one.
	#[instrument(skip_all, fields(key = %auth.key()))]
	pub async fn select_transfer(
		&self,
		auth: &TransferAuthorization,
	) -> Result<TransferStatus, AuthorizationError> {
		let key = auth.key();
		let status = self.transfer_status(auth).await?;
		if !status.is_executable() {
			return Err(stale(&key, status));
		}
		let unsettled = self.recorded_tx_hash(&self.transfers, auth).await;
		self.tracker.adopt(&key, unsettled);
		self.set_selection(ActiveSelection::Picked(SelectedAuthorization::Transfer(
			auth.clone(),
		)));
		Ok(status)
	}

	/// Makes a cached permit the active one. Used and expired permits are refused.
	#[instrument(skip_all, fields(key = %permit.key()))]
	pub async fn select_permit(
		&self,
		permit: &PermitAuthorization,
	) -> Result<PermitStatus, AuthorizationError> {
		let key = permit.key();
		let status = self.permit_status(permit).await?;
		if matches!(status, PermitStatus::Used | PermitStatus::Expired) {
			return Err(stale(&key, status));
		}
		self.adopt_permit(permit, status).await;
		self.set_selection(ActiveSelection::Picked(SelectedAuthorization::Permit(
			permit.clone(),
		)));
		Ok(status)
	}

	/// Puts a transfer authorization on chain.
	///
	/// The cached entry is removed once the transfer went through.
	#[instrument(skip_all, fields(key = %auth.key(), mode = %mode))]
	pub async fn execute_transfer(
		&self,
		auth: &TransferAuthorization,
		mode: ExecutionMode,
	) -> Result<TransactionHash, AuthorizationError> {
		let key = auth.key();
		let _guard = self.tracker.begin(&key)?;
		let unsettled = self.recorded_tx_hash(&self.transfers, auth).await;
		self.tracker.adopt(&key, unsettled);

		let status = self.transfer_status(auth).await?;
		if !status.is_executable() {
			if status == TransferStatus::Expired {
				self.mark_expired(&key);
			}
			return Err(stale(&key, status));
		}

		self.tracker.transition(&key, AuthorizationState::Submitting)?;
		match self.executor.execute_transfer(auth, mode).await {
			Ok(hash) => {
				self.transfers.remove(&key).await;
				self.tracker.transition(&key, AuthorizationState::Submitted)?;
				self.release_selection(&key);
				tracing::info!(key = %key, tx_hash = %hash, "Executed transfer authorization");
				Ok(hash)
			},
			Err(e) => Err(self.settle_failure(&self.transfers, &key, e).await),
		}
	}

	/// Submits a pending permit so that the spender's allowance is set.
	///
	/// The entry stays cached with the transaction hash attached.
	#[instrument(skip_all, fields(key = %permit.key(), mode = %mode))]
	pub async fn activate_permit(
		&self,
		permit: &PermitAuthorization,
		mode: ExecutionMode,
	) -> Result<TransactionHash, AuthorizationError> {
		let key = permit.key();
		let _guard = self.tracker.begin(&key)?;

		let status = self.permit_status(permit).await?;
		self.adopt_permit(permit, status).await;
		if !status.is_activatable() {
			if status == PermitStatus::Expired {
				self.mark_expired(&key);
			}
			return Err(stale(&key, status));
		}

		self.tracker.transition(&key, AuthorizationState::Submitting)?;
		match self.executor.activate_permit(permit, mode).await {
			Ok(hash) => {
				self.permits
					.update_field(&key, FieldUpdate::TxHash(Some(hash.0)))
					.await;
				self.tracker.transition(&key, AuthorizationState::Submitted)?;
				tracing::info!(key = %key, tx_hash = %hash, "Activated permit");
				Ok(hash)
			},
			Err(e) => Err(self.settle_failure(&self.permits, &key, e).await),
		}
	}

	/// Invalidates a transfer authorization on chain with `cancelAuthorization`.
	#[instrument(skip_all, fields(key = %auth.key()))]
	pub async fn cancel_transfer(
		&self,
		auth: &TransferAuthorization,
	) -> Result<TransactionHash, AuthorizationError> {
		let key = auth.key();
		let _guard = self.tracker.begin(&key)?;
		let unsettled = self.recorded_tx_hash(&self.transfers, auth).await;
		self.tracker.adopt(&key, unsettled);

		let owner = self.owner().await?;
		if auth.from != owner {
			return Err(AuthorizationError::Validation(format!(
				"Only the authorizer {} can cancel {}",
				auth.from, key
			)));
		}
		if self.transfer_status(auth).await? == TransferStatus::Used {
			return Err(AuthorizationError::NonceAlreadyUsed(key.to_string()));
		}

		self.tracker.transition(&key, AuthorizationState::Cancelling)?;
		let message = self
			.token_domain
			.build_cancel_authorization(auth.from, auth.nonce);
		let signature = match self.account.sign_typed_hash(&message.signing_hash()).await {
			Ok(signature) => split_signature(&signature).map_err(AuthorizationError::from),
			Err(e) => Err(e.into()),
		};
		let signature = match signature {
			Ok(signature) => signature,
			Err(e) => {
				self.restore_signed(&key);
				return Err(e);
			},
		};

		match self.executor.cancel(auth.from, auth.nonce, &signature).await {
			Ok(hash) => {
				self.transfers.remove(&key).await;
				self.tracker.transition(&key, AuthorizationState::Cancelled)?;
				self.release_selection(&key);
				tracing::info!(key = %key, tx_hash = %hash, "Cancelled transfer authorization");
				Ok(hash)
			},
			Err(e) => Err(self.settle_failure(&self.transfers, &key, e).await),
		}
	}

	/// Resets the spender's allowance with a zero-value permit, relayed at once.
	///
	/// Consumes the owner's current nonce, so every cached permit below it
	/// derives as used afterwards.
	#[instrument(skip_all)]
	pub async fn revoke(&self, spender: Option<Address>) -> Result<TransactionHash, AuthorizationError> {
		let spender = spender.unwrap_or(self.deployment.spender);
		require_address(spender, "spender")?;

		let owner = self.owner().await?;
		let nonce = self.delivery.nonces(owner).await?;
		let key = AuthorizationKey::permit(owner, nonce);
		let _guard = self.tracker.begin(&key)?;

		let permit = self
			.sign_permit_at(&key, owner, spender, U256::ZERO, nonce, self.default_expiry())
			.await?;
		self.tracker.transition(&key, AuthorizationState::Signed)?;
		self.tracker.transition(&key, AuthorizationState::Submitting)?;

		match self
			.executor
			.activate_permit(&permit, ExecutionMode::Relayed)
			.await
		{
			Ok(hash) => {
				self.tracker.transition(&key, AuthorizationState::Submitted)?;
				tracing::info!(key = %key, spender = %spender, tx_hash = %hash, "Revoked allowance");
				Ok(hash)
			},
			Err(e) if e.is_outcome_unknown() => {
				self.mark_indeterminate(&key);
				tracing::warn!(key = %key, error = %e, "Revocation outcome unknown");
				Err(e)
			},
			Err(e) => {
				self.restore_signed(&key);
				Err(e)
			},
		}
	}

	/// Spends `amount` of the holder's allowance towards `to` via the relayer.
	#[instrument(skip_all, fields(to = %to, amount = %amount))]
	pub async fn transfer_within_allowance(
		&self,
		to: Address,
		amount: U256,
	) -> Result<TransactionHash, AuthorizationError> {
		require_address(to, "recipient")?;
		let owner = self.owner().await?;
		let known = self.allowance().await?;
		ensure_within_allowance(amount, known)?;
		self.allowance_executor
			.transfer_within_allowance(owner, to, amount)
			.await
	}

	/// Lets the Permit2 contract spend `amount` of the holder's tokens.
	///
	/// A plain self-paid `approve`; Permit2 transfers draw on this allowance.
	#[instrument(skip_all, fields(amount = %amount))]
	pub async fn approve_permit2(&self, amount: U256) -> Result<TransactionHash, AuthorizationError> {
		let permit2 = self.deployment.permit2;
		require_address(permit2, "Permit2 contract")?;
		let hash = self.executor.approve(permit2, amount).await?;
		tracing::info!(spender = %permit2, tx_hash = %hash, "Approved Permit2");
		Ok(hash)
	}

	/// Signs a Permit2 `PermitTransferFrom` and relays it.
	#[instrument(skip_all, fields(to = %request.to, amount = %request.amount))]
	pub async fn permit2_transfer(
		&self,
		request: Permit2Request,
	) -> Result<TransactionHash, AuthorizationError> {
		require_amount(request.amount)?;
		require_address(request.to, "recipient")?;
		let deadline = request.deadline.unwrap_or_else(|| self.default_expiry());
		if deadline <= self.clock.now() {
			return Err(AuthorizationError::Validation(format!(
				"Deadline {} is not in the future",
				deadline
			)));
		}

		let owner = self.owner().await?;
		let message = self.permit2_domain.build_permit2_transfer(
			self.deployment.token.address,
			request.amount,
			self.deployment.spender,
			request.nonce,
			deadline,
		);
		let signature = self.account.sign_typed_hash(&message.signing_hash()).await?;
		// Permit2 takes the packed bytes; only the shape is checked here.
		split_signature(&signature).map(drop)?;

		let hash = self
			.relay
			.relay_permit2_transfer(&Permit2TransferRequest {
				owner,
				to: request.to,
				amount: request.amount,
				nonce: request.nonce,
				deadline,
				signature,
			})
			.await?;
		Ok(hash)
	}

	/// The holder's transfer authorizations, newest first, with derived status.
	///
	/// Expired entries are purged first.
	pub async fn transfer_statuses(
		&self,
	) -> Result<Vec<(TransferAuthorization, TransferStatus)>, AuthorizationError> {
		self.transfers.purge_expired(self.clock.now()).await;
		let owner = self.owner().await?;
		let mut entries = self.transfers.list_by_owner(owner).await;
		sort_newest_first(&mut entries);

		try_join_all(entries.into_iter().map(|entry| async move {
			let status = self.transfer_status(&entry).await?;
			Ok::<_, AuthorizationError>((entry, status))
		}))
		.await
	}

	/// The holder's permits, newest first, with derived status.
	pub async fn permit_statuses(
		&self,
	) -> Result<Vec<(PermitAuthorization, PermitStatus)>, AuthorizationError> {
		self.permits.purge_expired(self.clock.now()).await;
		let owner = self.owner().await?;
		let mut entries = self.permits.list_by_owner(owner).await;
		sort_newest_first(&mut entries);

		try_join_all(entries.into_iter().map(|entry| async move {
			let status = self.permit_status(&entry).await?;
			Ok::<_, AuthorizationError>((entry, status))
		}))
		.await
	}

	/// Cached transfer authorization of the holder with `nonce`.
	pub async fn cached_transfer(
		&self,
		nonce: B256,
	) -> Result<Option<TransferAuthorization>, AuthorizationError> {
		let owner = self.owner().await?;
		Ok(self
			.transfers
			.get(&AuthorizationKey::transfer(owner, nonce))
			.await)
	}

	/// Cached permit of the holder with `nonce`.
	pub async fn cached_permit(
		&self,
		nonce: U256,
	) -> Result<Option<PermitAuthorization>, AuthorizationError> {
		let owner = self.owner().await?;
		Ok(self.permits.get(&AuthorizationKey::permit(owner, nonce)).await)
	}

	pub async fn balance(&self) -> Result<U256, AuthorizationError> {
		let owner = self.owner().await?;
		Ok(self.delivery.balance_of(owner).await?)
	}

	/// Allowance of the deployment's spender over the holder's tokens.
	pub async fn allowance(&self) -> Result<U256, AuthorizationError> {
		let owner = self.owner().await?;
		Ok(self
			.delivery
			.allowance(owner, self.deployment.spender)
			.await?)
	}

	/// Allowance of the Permit2 contract over the holder's tokens.
	pub async fn permit2_allowance(&self) -> Result<U256, AuthorizationError> {
		let owner = self.owner().await?;
		Ok(self
			.delivery
			.allowance(owner, self.deployment.permit2)
			.await?)
	}

	/// The holder's current ERC-2612 nonce.
	pub async fn chain_nonce(&self) -> Result<U256, AuthorizationError> {
		let owner = self.owner().await?;
		Ok(self.delivery.nonces(owner).await?)
	}

	/// Purges expired entries from both collections.
	#[instrument(skip_all)]
	pub async fn refresh(&self) -> RefreshReport {
		let now = self.clock.now();
		let expired_transfers = self.transfers.list_all().await;
		let expired_permits = self.permits.list_all().await;
		expired_transfers
			.iter()
			.filter(|entry| entry.is_expired_at(now))
			.map(CachedAuthorization::key)
			.chain(
				expired_permits
					.iter()
					.filter(|entry| entry.is_expired_at(now))
					.map(CachedAuthorization::key),
			)
			.for_each(|key| self.mark_expired(&key));

		let report = RefreshReport {
			purged_transfers: self.transfers.purge_expired(now).await,
			purged_permits: self.permits.purge_expired(now).await,
		};
		if report.total() > 0 {
			tracing::info!(
				transfers = report.purged_transfers,
				permits = report.purged_permits,
				"Purged expired authorizations"
			);
		}
		report
	}

	fn mark_expired(&self, key: &AuthorizationKey) {
		if self.tracker.state(key) == AuthorizationState::Signed {
			if let Err(e) = self.tracker.transition(key, AuthorizationState::Expired) {
				tracing::debug!(key = %key, error = %e, "Could not mark expired");
			}
		}
	}

	/// Submission hash recorded for `entry`, preferring the cached copy.
	async fn recorded_tx_hash<T: CachedAuthorization>(
		&self,
		cache: &AuthorizationCache<T>,
		entry: &T,
	) -> Option<B256> {
		cache
			.get(&entry.key())
			.await
			.and_then(|cached| cached.tx_hash())
			.or_else(|| entry.tx_hash())
	}

	/// A permit keeps its activation hash once it went through, so the hash
	/// only marks an unsettled submission while the chain still reads `Pending`.
	async fn adopt_permit(&self, permit: &PermitAuthorization, status: PermitStatus) {
		let unsettled = match status {
			PermitStatus::Pending => self.recorded_tx_hash(&self.permits, permit).await,
			_ => None,
		};
		self.tracker.adopt(&permit.key(), unsettled);
	}

	fn mark_indeterminate(&self, key: &AuthorizationKey) {
		if let Err(e) = self
			.tracker
			.transition(key, AuthorizationState::Indeterminate)
		{
			tracing::debug!(key = %key, error = %e, "Could not mark indeterminate");
		}
	}

	fn restore_signed(&self, key: &AuthorizationKey) {
		if let Err(e) = self.tracker.transition(key, AuthorizationState::Signed) {
			tracing::debug!(key = %key, error = %e, "Could not restore signed state");
		}
	}

	/// Records the outcome of a failed submission.
	///
	/// A submission that may still land leaves the entry indeterminate, with
	/// its hash attached when one is known. Anything else returns it to
	/// `Signed`.
	async fn settle_failure<T: CachedAuthorization>(
		&self,
		cache: &AuthorizationCache<T>,
		key: &AuthorizationKey,
		err: AuthorizationError,
	) -> AuthorizationError {
		match &err {
			AuthorizationError::Unconfirmed { tx_hash } => {
				cache
					.update_field(key, FieldUpdate::TxHash(Some(tx_hash.0)))
					.await;
				self.mark_indeterminate(key);
				tracing::warn!(key = %key, tx_hash = %tx_hash, "Submission outcome unknown");
			},
			AuthorizationError::RelayOutcomeUnknown(_) => {
				self.mark_indeterminate(key);
				tracing::warn!(key = %key, error = %err, "Relayed submission outcome unknown");
			},
			_ => {
				self.restore_signed(key);
				tracing::warn!(key = %key, error = %err, "Submission failed");
			},
		}
		err
	}
}

fn require_amount(amount: U256) -> Result<(), AuthorizationError> {
	if amount.is_zero() {
		return Err(AuthorizationError::Validation("Amount must be greater than zero".into()));
	}
	Ok(())
}

fn require_address(address: Address, role: &str) -> Result<(), AuthorizationError> {
	if address == Address::ZERO {
		return Err(AuthorizationError::Validation(format!(
			"The {} cannot be the zero address",
			role
		)));
	}
	Ok(())
}

fn stale(key: &AuthorizationKey, status: impl Into<DerivedStatus>) -> AuthorizationError {
	AuthorizationError::StaleAuthorization {
		key: key.to_string(),
		status: status.into(),
	}
}
