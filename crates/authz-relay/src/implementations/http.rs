//! HTTP relayer client.

use crate::types::RelayResponse;
use crate::{
	parse_hash, AllowanceTransferRequest, Permit2TransferRequest, PermitRelayRequest,
	RelayError, RelayFactory, RelayInterface, RelayRegistry, TransferRelayRequest,
};
use async_trait::async_trait;
use authz_types::{
	ConfigSchema, Field, FieldType, ImplementationRegistry, Schema, TransactionHash,
	ValidationError,
};
use serde::Serialize;
use std::time::Duration;

const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

/// JSON-over-HTTP relayer.
pub struct HttpRelay {
	client: reqwest::Client,
	base_url: String,
}

impl HttpRelay {
	pub fn new(base_url: &str, timeout: Duration) -> Result<Self, RelayError> {
		let client = reqwest::Client::builder()
			.timeout(timeout)
			.build()
			.map_err(|e| RelayError::Configuration(format!("Failed to build client: {}", e)))?;

		Ok(Self {
			client,
			base_url: base_url.trim_end_matches('/').to_string(),
		})
	}

	async fn post<T: Serialize + Sync>(
		&self,
		path: &str,
		body: &T,
	) -> Result<TransactionHash, RelayError> {
		let url = format!("{}{}", self.base_url, path);
		tracing::debug!(url = %url, "Posting to relayer");

		let response = self
			.client
			.post(&url)
			.json(body)
			.send()
			.await
			.map_err(|e| RelayError::Unavailable(e.to_string()))?;

		let status = response.status();
		let text = response
			.text()
			.await
			.map_err(|e| RelayError::Unavailable(e.to_string()))?;
		let reply: RelayResponse = serde_json::from_str(&text).unwrap_or_default();

		if !status.is_success() {
			let message = reply.error.unwrap_or_else(|| format!("HTTP {}", status));
			tracing::warn!(url = %url, status = %status, error = %message, "Relayer rejected request");
			return Err(RelayError::Rejected(message));
		}

		parse_hash(reply.hash.as_deref())
	}
}

/// Requires `url`; optional `timeout_seconds` (1 to 300).
pub struct HttpRelaySchema;

impl ConfigSchema for HttpRelaySchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![Field::new("url", FieldType::Url)],
			vec![Field::new(
				"timeout_seconds",
				FieldType::Integer {
					min: Some(1),
					max: Some(300),
				},
			)],
		);
		schema.validate(config)
	}
}

#[async_trait]
impl RelayInterface for HttpRelay {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(HttpRelaySchema)
	}

	async fn submit_transfer(
		&self,
		request: &TransferRelayRequest,
	) -> Result<TransactionHash, RelayError> {
		self.post("/relay", request).await
	}

	async fn submit_permit(
		&self,
		request: &PermitRelayRequest,
	) -> Result<TransactionHash, RelayError> {
		self.post("/permit", request).await
	}

	async fn submit_permit2_transfer(
		&self,
		request: &Permit2TransferRequest,
	) -> Result<TransactionHash, RelayError> {
		self.post("/permit2/transfer", request).await
	}

	async fn submit_allowance_transfer(
		&self,
		request: &AllowanceTransferRequest,
	) -> Result<TransactionHash, RelayError> {
		self.post("/transfer", request).await
	}
}

pub fn create_relay(config: &toml::Value) -> Result<Box<dyn RelayInterface>, RelayError> {
	HttpRelaySchema
		.validate(config)
		.map_err(|e| RelayError::Configuration(format!("Invalid configuration: {}", e)))?;

	let url = config
		.get("url")
		.and_then(|v| v.as_str())
		.ok_or_else(|| RelayError::Configuration("url is required".into()))?;
	let timeout = config
		.get("timeout_seconds")
		.and_then(|v| v.as_integer())
		.map(|v| v as u64)
		.unwrap_or(DEFAULT_TIMEOUT_SECONDS);

	Ok(Box::new(HttpRelay::new(url, Duration::from_secs(timeout))?))
}

pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "http";
	type Factory = RelayFactory;

	fn factory() -> Self::Factory {
		create_relay
	}
}

impl RelayRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::{Address, Bytes, B256, U256};
	use axum::{http::StatusCode, routing::post, Json, Router};
	use serde_json::{json, Value};

	async fn relay(Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
		if body["value"] == json!("1000000") && body["validBefore"] == json!("3600") {
			(
				StatusCode::OK,
				Json(json!({ "hash": format!("0x{}", "11".repeat(32)) })),
			)
		} else {
			(
				StatusCode::UNPROCESSABLE_ENTITY,
				Json(json!({ "error": "bad body" })),
			)
		}
	}

	async fn permit() -> (StatusCode, Json<Value>) {
		(
			StatusCode::BAD_REQUEST,
			Json(json!({ "error": "Permit expired" })),
		)
	}

	async fn transfer() -> (StatusCode, Json<Value>) {
		(StatusCode::OK, Json(json!({ "ok": true })))
	}

	async fn permit2() -> (StatusCode, &'static str) {
		(StatusCode::INTERNAL_SERVER_ERROR, "boom")
	}

	async fn spawn_relayer() -> String {
		let app = Router::new()
			.route("/relay", post(relay))
			.route("/permit", post(permit))
			.route("/transfer", post(transfer))
			.route("/permit2/transfer", post(permit2));
		let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
		let addr = listener.local_addr().unwrap();
		tokio::spawn(async move {
			axum::serve(listener, app).await.unwrap();
		});
		format!("http://{}/", addr)
	}

	fn transfer_request() -> TransferRelayRequest {
		TransferRelayRequest {
			from: Address::repeat_byte(1),
			to: Address::repeat_byte(2),
			value: U256::from(1_000_000u64),
			valid_after: 0,
			valid_before: 3600,
			nonce: B256::repeat_byte(3),
			v: 27,
			r: B256::repeat_byte(4),
			s: B256::repeat_byte(5),
		}
	}

	fn client(url: &str) -> Box<dyn RelayInterface> {
		let config: toml::Value = toml::from_str(&format!("url = \"{}\"", url)).unwrap();
		create_relay(&config).unwrap()
	}

	#[tokio::test]
	async fn test_relay_returns_hash() {
		let relay = client(&spawn_relayer().await);
		let hash = relay.submit_transfer(&transfer_request()).await.unwrap();
		assert_eq!(hash, TransactionHash(B256::repeat_byte(0x11)));
	}

	#[tokio::test]
	async fn test_error_body_is_surfaced_verbatim() {
		let relay = client(&spawn_relayer().await);
		let request = PermitRelayRequest {
			owner: Address::repeat_byte(1),
			spender: Address::repeat_byte(2),
			value: U256::ZERO,
			deadline: 10,
			v: 28,
			r: B256::ZERO,
			s: B256::ZERO,
		};

		match relay.submit_permit(&request).await {
			Err(RelayError::Rejected(message)) => assert_eq!(message, "Permit expired"),
			other => panic!("unexpected result: {:?}", other),
		}
	}

	#[tokio::test]
	async fn test_non_json_failure_uses_status() {
		let relay = client(&spawn_relayer().await);
		let request = Permit2TransferRequest {
			owner: Address::repeat_byte(1),
			to: Address::repeat_byte(2),
			amount: U256::from(1u64),
			nonce: U256::ZERO,
			deadline: 10,
			signature: Bytes::from(vec![0u8; 65]),
		};

		match relay.submit_permit2_transfer(&request).await {
			Err(RelayError::Rejected(message)) => assert!(message.contains("500")),
			other => panic!("unexpected result: {:?}", other),
		}
	}

	#[tokio::test]
	async fn test_success_without_hash_is_invalid() {
		let relay = client(&spawn_relayer().await);
		let request = AllowanceTransferRequest {
			from: Address::repeat_byte(1),
			to: Address::repeat_byte(2),
			value: U256::from(5u64),
		};
		assert!(matches!(
			relay.submit_allowance_transfer(&request).await,
			Err(RelayError::InvalidResponse(_))
		));
	}

	#[tokio::test]
	async fn test_unreachable_relayer_is_unavailable() {
		let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
		let addr = listener.local_addr().unwrap();
		drop(listener);

		let relay = client(&format!("http://{}", addr));
		assert!(matches!(
			relay.submit_transfer(&transfer_request()).await,
			Err(RelayError::Unavailable(_))
		));
	}

	#[test]
	fn test_schema_requires_http_url() {
		let config: toml::Value = toml::from_str("url = \"ftp://relayer\"").unwrap();
		assert!(create_relay(&config).is_err());
		assert!(create_relay(&toml::Value::Table(Default::default())).is_err());
	}
}
