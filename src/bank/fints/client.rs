//!
//! FinTS 3.0 PIN/TAN client.
//!
//! Implements `BankSource` on top of the FinTS dialog model:
//! - a synchronization dialog (single-step) obtains the customer system id, the bank
//!   parameters and the TAN mechanisms the user may use,
//! - a working dialog is opened with the chosen mechanism, answering a TAN challenge if the
//!   bank issues one,
//! - SEPA accounts and MT940 statements are fetched inside the working dialog, following
//!   touchdown points until the bank has sent everything.

use super::codec::{SegmentBuilder, decode_latin1, parse_segments};
use super::message::{MessageContext, SINGLE_STEP, build_message};
use super::mt940::parse_statements;
use super::response::{BankParameters, Response};
use super::segments;
use crate::bank::{
	BankAccount, BankError, BankSource, BankTransaction, ChallengeProvider,
};

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{Local, NaiveDate};
use rand::Rng;
use reqwest::{Client, Url};
use std::fmt;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Connection settings for a FinTS PIN/TAN endpoint.
#[derive(Clone)]
pub struct FinTsConfig {
	/// PIN/TAN endpoint of the bank.
	pub url: Url,
	/// German bank code (BLZ).
	pub bank_code: String,
	pub user_id: String,
	/// Customer id; equals the user id for most private accounts.
	pub customer_id: String,
	/// PIN, if known up front. Otherwise the challenge provider is asked.
	pub pin: Option<String>,
	/// Product registration id issued by the Deutsche Kreditwirtschaft.
	pub product_id: String,
	pub product_version: String,
	/// Preferred security function, e.g. `942`.
	pub tan_mechanism: Option<String>,
	/// TAN medium to name for mechanisms that require one, e.g. a phone name.
	pub tan_medium: Option<String>,
}

impl fmt::Debug for FinTsConfig {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("FinTsConfig")
			.field("url", &self.url.as_str())
			.field("bank_code", &self.bank_code)
			.field("user_id", &self.user_id)
			.field("customer_id", &self.customer_id)
			.field("pin", &self.pin.as_ref().map(|_| "***"))
			.field("product_id", &self.product_id)
			.field("product_version", &self.product_version)
			.field("tan_mechanism", &self.tan_mechanism)
			.field("tan_medium", &self.tan_medium)
			.finish()
	}
}

/// State of an open dialog.
#[derive(Debug)]
struct Dialog {
	id: String,
	message_number: u32,
}

impl Dialog {
	fn new() -> Self {
		Self {
			id: "0".to_string(),
			message_number: 1,
		}
	}
}

/// FinTS client for one bank login.
pub struct FinTsClient<C: ChallengeProvider> {
	http_client: Client,
	config: FinTsConfig,
	challenge: C,
	pin: Option<String>,
	system_id: String,
	security_function: String,
	tan_medium: Option<String>,
	parameters: BankParameters,
	dialog: Option<Dialog>,
}

impl<C: ChallengeProvider> FinTsClient<C> {
	/// Create a new client. No connection is made until `open`.
	pub fn new(config: FinTsConfig, challenge: C) -> Result<Self, BankError> {
		let http_client = Client::builder()
			.timeout(Duration::from_secs(30))
			.build()?;

		Ok(Self {
			http_client,
			pin: config.pin.clone(),
			tan_medium: config.tan_medium.clone(),
			config,
			challenge,
			system_id: "0".to_string(),
			security_function: SINGLE_STEP.to_string(),
			parameters: BankParameters::default(),
			dialog: None,
		})
	}

	fn two_step(&self) -> bool {
		self.security_function != SINGLE_STEP
	}

	/// Send one message in the open dialog and check the answer for errors.
	async fn send(
		&mut self,
		segments: &[SegmentBuilder],
		tan: Option<&str>,
	) -> Result<Response, BankError> {
		let dialog = self
			.dialog
			.as_ref()
			.ok_or_else(|| BankError::DialogError("No dialog open".to_string()))?;
		let pin = self
			.pin
			.as_deref()
			.ok_or_else(|| BankError::DialogError("No PIN available".to_string()))?;
		let control_reference = rand::rng().random_range(1_000_000..10_000_000u32).to_string();

		let ctx = MessageContext {
			dialog_id: &dialog.id,
			message_number: dialog.message_number,
			bank_code: &self.config.bank_code,
			user_id: &self.config.user_id,
			system_id: &self.system_id,
			security_function: &self.security_function,
			control_reference: &control_reference,
			timestamp: Local::now().naive_local(),
		};
		let message = build_message(&ctx, segments, pin, tan);
		debug!(
			"Sending message {} in dialog {}: {:?}",
			dialog.message_number,
			dialog.id,
			segments.iter().map(SegmentBuilder::kind).collect::<Vec<_>>()
		);

		let response = self
			.http_client
			.post(self.config.url.clone())
			.header("Content-Type", "text/plain")
			.body(BASE64.encode(message))
			.send()
			.await?;

		let status = response.status();
		if !status.is_success() {
			return Err(BankError::DialogError(format!("HTTP status {}", status)));
		}

		let body: String = response
			.text()
			.await?
			.chars()
			.filter(|c| !c.is_whitespace())
			.collect();
		let parsed = Response::new(parse_segments(&BASE64.decode(body)?)?);

		if let Some(dialog) = self.dialog.as_mut() {
			if let Some(id) = parsed.dialog_id() {
				dialog.id = id;
			}
			dialog.message_number += 1;
		}
		self.parameters.update(&parsed);

		for code in parsed.codes() {
			if code.is_error() {
				error!("Bank reported {}: {}", code.code, code.text);
			} else if code.is_warning() {
				debug!("Bank note {}: {} {:?}", code.code, code.text, code.parameters);
			} else {
				debug!("Bank reported {}: {}", code.code, code.text);
			}
		}
		parsed.check()?;
		Ok(parsed)
	}

	/// Send business segments, announcing them with `HKTAN` and answering a challenge if needed.
	async fn send_with_challenge(
		&mut self,
		mut segments: Vec<SegmentBuilder>,
	) -> Result<Response, BankError> {
		let kind = segments.first().map(SegmentBuilder::kind).unwrap_or_default();
		if self.two_step() {
			segments.push(segments::tan_announcement(kind, self.tan_medium.as_deref()));
		}

		let response = self.send(&segments, None).await?;
		match response.tan_challenge() {
			Some(challenge) => {
				info!("Bank requested a TAN for {}", kind);
				let tan = self.challenge.tan(&challenge)?;
				self.send(
					&[segments::tan_submission(&challenge.task_reference)],
					Some(&tan),
				)
				.await
			}
			None => Ok(response),
		}
	}

	/// End the open dialog, if any.
	async fn end_dialog(&mut self) -> Result<(), BankError> {
		let Some(dialog) = &self.dialog else {
			return Ok(());
		};
		let end = segments::dialog_end(&dialog.id);
		let result = self.send(&[end], None).await;
		self.dialog = None;
		result.map(|_| ())
	}

	/// Run the synchronization dialog, returning the permitted security functions.
	async fn synchronize(&mut self) -> Result<Vec<String>, BankError> {
		self.security_function = SINGLE_STEP.to_string();
		self.system_id = "0".to_string();
		self.dialog = Some(Dialog::new());

		let request = [
			segments::identification(&self.config.bank_code, &self.config.customer_id, "0"),
			self.preparation(),
			segments::synchronization(),
		];
		let response = match self.send(&request, None).await {
			Ok(response) => response,
			Err(e) => {
				self.dialog = None;
				return Err(e);
			}
		};

		match response.system_id() {
			Some(system_id) => {
				debug!("Received system id {}", system_id);
				self.system_id = system_id;
			}
			None => warn!("Bank did not assign a system id"),
		}
		let allowed = response.allowed_security_functions();
		self.end_dialog().await?;
		Ok(allowed)
	}

	fn preparation(&self) -> SegmentBuilder {
		segments::processing_preparation(
			self.parameters.bpd_version,
			self.parameters.upd_version,
			&self.config.product_id,
			&self.config.product_version,
		)
	}

	fn choose_security_function(&self, allowed: &[String]) -> Result<String, BankError> {
		if allowed.is_empty() {
			return Ok(SINGLE_STEP.to_string());
		}
		if let Some(preferred) = &self.config.tan_mechanism {
			return if allowed.contains(preferred) {
				Ok(preferred.clone())
			} else {
				Err(BankError::DialogError(format!(
					"TAN mechanism {} is not permitted, choose one of {}",
					preferred,
					allowed.join(", ")
				)))
			};
		}
		if let [only] = allowed {
			return Ok(only.clone());
		}

		let options: Vec<_> = allowed
			.iter()
			.map(|function| self.parameters.mechanism(function))
			.collect();
		self.challenge.select_mechanism(&options)
	}

	/// List the user's TAN media in a dialog of its own.
	async fn fetch_tan_media(&mut self) -> Result<Vec<String>, BankError> {
		self.init_dialog().await?;
		let request = segments::tan_media(self.parameters.tan_media_version);
		let media = match self.send_with_challenge(vec![request]).await {
			Ok(response) => response.tan_media(),
			Err(e) => {
				if let Err(end) = self.end_dialog().await {
					debug!("Failed to end TAN media dialog: {}", end);
				}
				return Err(e);
			}
		};
		self.end_dialog().await?;
		Ok(media)
	}

	/// Pick the TAN medium for mechanisms that require one and none is configured.
	async fn choose_tan_medium(&mut self) -> Result<(), BankError> {
		let mechanism = self.parameters.mechanism(&self.security_function);
		if !mechanism.medium_required || self.tan_medium.is_some() {
			return Ok(());
		}

		let media = self.fetch_tan_media().await?;
		self.tan_medium = match media.as_slice() {
			[] => {
				warn!("{} requires a TAN medium but the bank listed none", mechanism.name);
				None
			}
			[only] => Some(only.clone()),
			_ => Some(self.challenge.select_medium(&media)?),
		};
		if let Some(medium) = &self.tan_medium {
			info!("Using TAN medium {}", medium);
		}
		Ok(())
	}

	/// Open the working dialog with the chosen security function.
	async fn init_dialog(&mut self) -> Result<(), BankError> {
		self.dialog = Some(Dialog::new());
		let request = vec![
			segments::identification(
				&self.config.bank_code,
				&self.config.customer_id,
				&self.system_id,
			),
			self.preparation(),
		];
		match self.send_with_challenge(request).await {
			Ok(_) => Ok(()),
			Err(e) => {
				self.dialog = None;
				Err(e)
			}
		}
	}
}

#[async_trait::async_trait]
impl<C: ChallengeProvider> BankSource for FinTsClient<C> {
	async fn open(&mut self) -> Result<(), BankError> {
		if self.pin.is_none() {
			self.pin = Some(self.challenge.pin(&self.config.user_id)?);
		}

		let allowed = self.synchronize().await?;
		self.security_function = self.choose_security_function(&allowed)?;
		let mechanism = self.parameters.mechanism(&self.security_function);
		info!(
			"Opening dialog with {} using security function {} ({})",
			self.config.url, mechanism.security_function, mechanism.name
		);

		self.choose_tan_medium().await?;
		self.init_dialog().await
	}

	async fn list_accounts(&mut self) -> Result<Vec<BankAccount>, BankError> {
		let request = segments::sepa_accounts(self.parameters.sepa_account_version);
		let response = self.send_with_challenge(vec![request]).await?;
		let accounts = response.sepa_accounts();
		info!("Bank reported {} SEPA accounts", accounts.len());
		Ok(accounts)
	}

	async fn list_transactions(
		&mut self,
		account: &BankAccount,
		start: NaiveDate,
		end: NaiveDate,
	) -> Result<Vec<BankTransaction>, BankError> {
		let mut mt940 = String::new();
		let mut touchdown: Option<String> = None;

		loop {
			let request = segments::statement(
				self.parameters.statement_version,
				account,
				start,
				end,
				touchdown.as_deref(),
			);
			let response = self.send_with_challenge(vec![request]).await?;
			for payload in response.statements() {
				mt940.push_str(&decode_latin1(payload));
				mt940.push('\n');
			}

			let next = response.touchdown();
			match &next {
				Some(point) if touchdown.as_ref() == Some(point) => {
					return Err(BankError::DialogError(format!(
						"Bank repeated touchdown {} for {}",
						point, account.iban
					)));
				}
				Some(point) => debug!("Statement continues at touchdown {}", point),
				None => break,
			}
			touchdown = next;
		}

		let transactions = parse_statements(&mt940)?;
		debug!(
			"Fetched {} transactions for {} between {} and {}",
			transactions.len(),
			account.iban,
			start,
			end
		);
		Ok(transactions)
	}

	async fn close(&mut self) -> Result<(), BankError> {
		self.end_dialog().await
	}
}
