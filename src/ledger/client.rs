//!
//! REST client for the Firefly III ledger.
//!
//! Lists asset accounts and stores transaction groups with duplicate detection enabled.
//! Every request carries the personal access token as a bearer credential.

use super::types::*;
use reqwest::{Client, StatusCode, Url};
use std::time::Duration;
use tracing::debug;

/// Operations the sync needs from the ledger.
#[async_trait::async_trait]
pub trait LedgerService: Send + Sync {
	/// List all asset accounts in listing order.
	async fn list_asset_accounts(&self) -> Result<Vec<LedgerAccount>, LedgerError>;

	/// Store one transaction group, returning the id the ledger assigned to it.
	async fn store_transaction(
		&self,
		request: &StoreTransactionRequest,
	) -> Result<LedgerTransactionId, LedgerError>;
}

/// Firefly III API client
#[derive(Clone)]
pub struct FireflyClient {
	/// The underlying HTTP client.
	http_client: Client,
	/// Base URL of the Firefly installation, always ending in `/`.
	base_url: Url,
	/// Personal access token.
	access_token: String,
}

impl FireflyClient {
	/// Create a new ledger client.
	///
	/// # Arguments
	/// * `base_url` - Root URL of the Firefly III installation.
	/// * `access_token` - Personal access token used as bearer credential.
	pub fn new(base_url: Url, access_token: String) -> Result<Self, LedgerError> {
		let http_client = Client::builder()
			.timeout(Duration::from_secs(30))
			.build()?;

		let mut base_url = base_url;
		if !base_url.path().ends_with('/') {
			let path = format!("{}/", base_url.path());
			base_url.set_path(&path);
		}

		Ok(Self {
			http_client,
			base_url,
			access_token,
		})
	}

	fn endpoint(&self, path: &str) -> Result<Url, LedgerError> {
		Ok(self.base_url.join(path)?)
	}

	async fn fetch_account_page(&self, page: u32) -> Result<AccountPage, LedgerError> {
		let url = self.endpoint("api/v1/accounts")?;
		let response = self
			.http_client
			.get(url)
			.bearer_auth(&self.access_token)
			.header("Accept", "application/json")
			.query(&[("type", "asset".to_string()), ("page", page.to_string())])
			.send()
			.await?;

		let status = response.status();
		if !status.is_success() {
			let body = response.text().await.unwrap_or_default();
			return Err(LedgerError::Status { status, body });
		}

		let body = response.text().await?;
		Ok(serde_json::from_str(&body)?)
	}
}

#[async_trait::async_trait]
impl LedgerService for FireflyClient {
	async fn list_asset_accounts(&self) -> Result<Vec<LedgerAccount>, LedgerError> {
		let mut accounts = Vec::new();
		let mut page = 1;

		loop {
			let response = self.fetch_account_page(page).await?;
			debug!(
				"Fetched {} asset accounts from page {}",
				response.data.len(),
				page
			);
			accounts.extend(response.data.into_iter().map(LedgerAccount::from));

			let pagination = response.meta.and_then(|meta| meta.pagination);
			match pagination {
				Some(p) if p.current_page < p.total_pages => page = p.current_page + 1,
				_ => break,
			}
		}

		Ok(accounts)
	}

	async fn store_transaction(
		&self,
		request: &StoreTransactionRequest,
	) -> Result<LedgerTransactionId, LedgerError> {
		let url = self.endpoint("api/v1/transactions")?;
		let response = self
			.http_client
			.post(url)
			.bearer_auth(&self.access_token)
			.header("Accept", "application/json")
			.json(request)
			.send()
			.await?;

		let status = response.status();
		let body = response.text().await?;

		if status == StatusCode::UNPROCESSABLE_ENTITY {
			let parsed: ValidationErrorBody = serde_json::from_str(&body).unwrap_or_default();
			return Err(LedgerError::Rejected {
				details: parsed.details(),
			});
		}

		if !status.is_success() {
			return Err(LedgerError::Status { status, body });
		}

		let group: StoredTransactionGroup = serde_json::from_str(&body)?;
		Ok(LedgerTransactionId(group.data.id))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::NaiveDate;
	use serde_json::json;
	use wiremock::matchers::{body_partial_json, header, method, path, query_param};
	use wiremock::{Mock, MockServer, ResponseTemplate};

	fn client(server: &MockServer) -> FireflyClient {
		let url = Url::parse(&server.uri()).expect("mock server uri");
		FireflyClient::new(url, "secret-token".to_string()).expect("client")
	}

	fn record() -> LedgerTransactionRecord {
		LedgerTransactionRecord {
			amount: "20.00".to_string(),
			date: NaiveDate::from_ymd_opt(2026, 10, 12).expect("date"),
			description: "Rent October".to_string(),
			transaction_type: TransactionType::Withdrawal,
			source: Endpoint::Id(LedgerAccountId::new("1")),
			destination: Endpoint::Name("Landlord".to_string()),
		}
	}

	#[tokio::test]
	async fn lists_accounts_across_pages() {
		let server = MockServer::start().await;

		Mock::given(method("GET"))
			.and(path("/api/v1/accounts"))
			.and(query_param("type", "asset"))
			.and(query_param("page", "1"))
			.and(header("Authorization", "Bearer secret-token"))
			.respond_with(ResponseTemplate::new(200).set_body_json(json!({
				"data": [
					{"type": "accounts", "id": "1", "attributes": {"name": "Checking", "iban": "DE02120300000000202051"}},
					{"type": "accounts", "id": "2", "attributes": {"name": "Cash", "iban": null}}
				],
				"meta": {"pagination": {"total": 3, "count": 2, "per_page": 2, "current_page": 1, "total_pages": 2}}
			})))
			.mount(&server)
			.await;

		Mock::given(method("GET"))
			.and(path("/api/v1/accounts"))
			.and(query_param("page", "2"))
			.respond_with(ResponseTemplate::new(200).set_body_json(json!({
				"data": [
					{"type": "accounts", "id": "7", "attributes": {"name": "Savings", "iban": "DE02500105170137075030"}}
				],
				"meta": {"pagination": {"total": 3, "count": 1, "per_page": 2, "current_page": 2, "total_pages": 2}}
			})))
			.mount(&server)
			.await;

		let accounts = client(&server).list_asset_accounts().await.expect("accounts");
		let ids: Vec<&str> = accounts.iter().map(|a| a.id.as_str()).collect();
		assert_eq!(ids, vec!["1", "2", "7"]);
		assert_eq!(accounts[1].iban, None);
		assert_eq!(accounts[2].iban.as_deref(), Some("DE02500105170137075030"));
	}

	#[tokio::test]
	async fn listing_failure_surfaces_status() {
		let server = MockServer::start().await;
		Mock::given(method("GET"))
			.and(path("/api/v1/accounts"))
			.respond_with(ResponseTemplate::new(401).set_body_string("Unauthenticated."))
			.mount(&server)
			.await;

		let err = client(&server).list_asset_accounts().await.unwrap_err();
		match err {
			LedgerError::Status { status, body } => {
				assert_eq!(status, StatusCode::UNAUTHORIZED);
				assert_eq!(body, "Unauthenticated.");
			}
			other => panic!("unexpected error: {other:?}"),
		}
	}

	#[tokio::test]
	async fn stores_transaction_with_duplicate_check() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/api/v1/transactions"))
			.and(body_partial_json(json!({
				"error_if_duplicate_hash": true,
				"transactions": [{
					"type": "withdrawal",
					"date": "2026-10-12",
					"amount": "20.00",
					"source_id": "1",
					"destination_name": "Landlord"
				}]
			})))
			.respond_with(ResponseTemplate::new(200).set_body_json(json!({
				"data": {"type": "transactions", "id": "123", "attributes": {}}
			})))
			.expect(1)
			.mount(&server)
			.await;

		let request = StoreTransactionRequest::deduplicated(&record());
		let id = client(&server).store_transaction(&request).await.expect("stored");
		assert_eq!(id, LedgerTransactionId("123".to_string()));
	}

	#[tokio::test]
	async fn duplicate_hash_is_reported_as_rejection() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/api/v1/transactions"))
			.respond_with(ResponseTemplate::new(422).set_body_json(json!({
				"message": "The given data was invalid.",
				"errors": {"transactions.0.description": ["Duplicate of transaction #123."]}
			})))
			.mount(&server)
			.await;

		let request = StoreTransactionRequest::deduplicated(&record());
		let err = client(&server).store_transaction(&request).await.unwrap_err();
		match err {
			LedgerError::Rejected { details } => {
				assert_eq!(details, vec!["Duplicate of transaction #123.".to_string()]);
			}
			other => panic!("unexpected error: {other:?}"),
		}
	}

	#[tokio::test]
	async fn validation_messages_keep_the_ledger_order() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/api/v1/transactions"))
			.respond_with(ResponseTemplate::new(422).set_body_raw(
				r#"{"message":"The given data was invalid.","errors":{"transactions.0.description":["Duplicate of transaction #123."],"transactions.0.amount":["Amount must be positive."]}}"#,
				"application/json",
			))
			.mount(&server)
			.await;

		let request = StoreTransactionRequest::deduplicated(&record());
		let err = client(&server).store_transaction(&request).await.unwrap_err();
		assert_eq!(
			err.to_string(),
			"Rejected by ledger: Duplicate of transaction #123."
		);
		match err {
			LedgerError::Rejected { details } => assert_eq!(
				details,
				vec![
					"Duplicate of transaction #123.".to_string(),
					"Amount must be positive.".to_string()
				]
			),
			other => panic!("unexpected error: {other:?}"),
		}
	}

	#[tokio::test]
	async fn server_error_on_store_surfaces_status() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/api/v1/transactions"))
			.respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
			.expect(1)
			.mount(&server)
			.await;

		let request = StoreTransactionRequest::deduplicated(&record());
		let err = client(&server).store_transaction(&request).await.unwrap_err();
		match err {
			LedgerError::Status { status, body } => {
				assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
				assert_eq!(body, "Internal Server Error");
			}
			other => panic!("unexpected error: {other:?}"),
		}
	}

	#[test]
	fn split_carries_exactly_one_field_per_endpoint() {
		let split = serde_json::to_value(record().to_split()).expect("json");
		assert_eq!(split["source_id"], "1");
		assert!(split.get("source_name").is_none());
		assert_eq!(split["destination_name"], "Landlord");
		assert!(split.get("destination_id").is_none());
	}

	#[test]
	fn json_api_error_list_is_understood() {
		let body: ValidationErrorBody = serde_json::from_value(json!({
			"errors": [{"status": "422", "detail": "Duplicate of transaction #9."}]
		}))
		.expect("body");
		assert_eq!(body.details(), vec!["Duplicate of transaction #9.".to_string()]);

		let bare: ValidationErrorBody =
			serde_json::from_value(json!({"message": "Nope"})).expect("body");
		assert_eq!(bare.details(), vec!["Nope".to_string()]);
	}
}
