//! Command handlers.

use crate::Command;
use alloy_primitives::U256;
use authz_core::{
	AuthorizationManager, MaintenanceScheduler, Permit2Request, PermitRequest, TransferRequest,
};
use authz_types::{
	current_timestamp, format_token_amount, parse_token_amount, DeploymentConfig, TransactionHash,
};
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

type CommandResult = Result<(), Box<dyn Error>>;

pub async fn run(manager: Arc<AuthorizationManager>, command: Command) -> CommandResult {
	let deployment = manager.deployment().clone();
	let decimals = deployment.token.decimals;

	match command {
		Command::SignTransfer {
			to,
			amount,
			valid_after,
			valid_for,
		} => {
			let auth = manager
				.sign_transfer(TransferRequest {
					to,
					value: parse_token_amount(&amount, decimals)?,
					valid_after,
					valid_before: valid_for.map(expires_in),
				})
				.await?;
			println!("Signed transfer authorization");
			println!("  nonce:        {}", auth.nonce);
			println!("  to:           {}", auth.to);
			println!("  amount:       {}", amount_label(auth.value, &deployment));
			println!("  valid before: {}", auth.valid_before);
		},
		Command::SignPermit {
			amount,
			spender,
			valid_for,
		} => {
			let permit = manager
				.sign_permit(PermitRequest {
					spender,
					value: parse_token_amount(&amount, decimals)?,
					deadline: valid_for.map(expires_in),
				})
				.await?;
			println!("Signed permit");
			println!("  nonce:    {}", permit.nonce);
			println!("  spender:  {}", permit.spender);
			println!("  amount:   {}", amount_label(permit.value, &deployment));
			println!("  deadline: {}", permit.deadline);
		},
		Command::List { json } => list(&manager, &deployment, json).await?,
		Command::Execute { nonce, mode } => {
			let auth = manager
				.cached_transfer(nonce)
				.await?
				.ok_or_else(|| format!("No cached transfer authorization with nonce {}", nonce))?;
			let hash = manager.execute_transfer(&auth, mode).await?;
			print_submitted("Executed transfer", &hash, &deployment);
		},
		Command::Activate { nonce, mode } => {
			let permit = manager
				.cached_permit(U256::from(nonce))
				.await?
				.ok_or_else(|| format!("No cached permit with nonce {}", nonce))?;
			let hash = manager.activate_permit(&permit, mode).await?;
			print_submitted("Activated permit", &hash, &deployment);
		},
		Command::Cancel { nonce } => {
			let auth = manager
				.cached_transfer(nonce)
				.await?
				.ok_or_else(|| format!("No cached transfer authorization with nonce {}", nonce))?;
			let hash = manager.cancel_transfer(&auth).await?;
			print_submitted("Cancelled authorization", &hash, &deployment);
		},
		Command::Revoke { spender } => {
			let hash = manager.revoke(spender).await?;
			print_submitted("Revoked allowance", &hash, &deployment);
		},
		Command::Transfer { to, amount } => {
			let hash = manager
				.transfer_within_allowance(to, parse_token_amount(&amount, decimals)?)
				.await?;
			print_submitted("Transferred within allowance", &hash, &deployment);
		},
		Command::ApprovePermit2 { amount } => {
			let amount = match amount {
				Some(amount) => parse_token_amount(&amount, decimals)?,
				None => U256::MAX,
			};
			let hash = manager.approve_permit2(amount).await?;
			print_submitted("Approved Permit2", &hash, &deployment);
		},
		Command::Permit2Transfer {
			to,
			amount,
			nonce,
			valid_for,
		} => {
			let hash = manager
				.permit2_transfer(Permit2Request {
					to,
					amount: parse_token_amount(&amount, decimals)?,
					nonce: U256::from(nonce),
					deadline: valid_for.map(expires_in),
				})
				.await?;
			print_submitted("Relayed Permit2 transfer", &hash, &deployment);
		},
		Command::Balance => {
			let owner = manager.owner().await?;
			println!("Account:           {}", owner);
			if let Some(url) = deployment.address_url(&owner) {
				println!("                   {}", url);
			}
			println!(
				"Balance:           {}",
				amount_label(manager.balance().await?, &deployment)
			);
			println!(
				"Spender allowance: {}",
				amount_label(manager.allowance().await?, &deployment)
			);
			println!(
				"Permit2 allowance: {}",
				amount_label(manager.permit2_allowance().await?, &deployment)
			);
			println!("Permit nonce:      {}", manager.chain_nonce().await?);
		},
		Command::Purge => {
			let report = manager.refresh().await;
			println!(
				"Purged {} transfer authorization(s) and {} permit(s)",
				report.purged_transfers, report.purged_permits
			);
		},
		Command::Watch => {
			let interval = Duration::from_secs(manager.config().refresh_interval_seconds);
			let scheduler = MaintenanceScheduler::new(manager, interval);
			scheduler.start();
			tokio::signal::ctrl_c().await?;
			tracing::info!("Received shutdown signal");
			scheduler.stop();
		},
	}
	Ok(())
}

async fn list(
	manager: &AuthorizationManager,
	deployment: &DeploymentConfig,
	json: bool,
) -> CommandResult {
	let transfers = manager.transfer_statuses().await?;
	let permits = manager.permit_statuses().await?;

	if json {
		let value = serde_json::json!({
			"transfers": transfers
				.iter()
				.map(|(auth, status)| serde_json::json!({ "authorization": auth, "status": status }))
				.collect::<Vec<_>>(),
			"permits": permits
				.iter()
				.map(|(permit, status)| serde_json::json!({ "permit": permit, "status": status }))
				.collect::<Vec<_>>(),
		});
		println!("{}", serde_json::to_string_pretty(&value)?);
		return Ok(());
	}

	println!("Transfer authorizations ({})", transfers.len());
	for (auth, status) in &transfers {
		println!(
			"  {:<14} {}  to {}  {}  valid before {}",
			status.to_string(),
			auth.nonce,
			auth.to,
			amount_label(auth.value, deployment),
			auth.valid_before
		);
	}
	println!("Permits ({})", permits.len());
	for (permit, status) in &permits {
		println!(
			"  {:<14} nonce {}  spender {}  {}  deadline {}",
			status.to_string(),
			permit.nonce,
			permit.spender,
			amount_label(permit.value, deployment),
			permit.deadline
		);
	}
	Ok(())
}

fn expires_in(seconds: u64) -> u64 {
	current_timestamp().saturating_add(seconds)
}

fn amount_label(amount: U256, deployment: &DeploymentConfig) -> String {
	format!(
		"{} {}",
		format_token_amount(amount, deployment.token.decimals),
		deployment.token.symbol
	)
}

fn print_submitted(action: &str, hash: &TransactionHash, deployment: &DeploymentConfig) {
	println!("{}: {}", action, hash);
	if let Some(url) = deployment.tx_url(&hash.0) {
		println!("  {}", url);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_amount_label_uses_token_decimals() {
		let deployment = DeploymentConfig::base_sepolia("http://localhost:8545");
		assert_eq!(
			amount_label(U256::from(1_500_000u64), &deployment),
			format!("1.5 {}", deployment.token.symbol)
		);
	}

	#[test]
	fn test_expiry_is_relative_to_now() {
		let before = current_timestamp();
		let expiry = expires_in(3600);
		assert!(expiry >= before + 3600);
		assert!(expiry <= current_timestamp() + 3600);
		assert_eq!(expires_in(u64::MAX), u64::MAX);
	}
}
