//!
//! Interpretation of bank responses.
//!
//! Result codes arrive in `HIRMG` (message level) and `HIRMS` (per request segment). Codes
//! starting with `9` are errors, `3` warnings and notes, `0` success. Parameter segments
//! (`HIBPA`, `HI*S`) describe which segment versions the bank supports.

use super::codec::{Segment, decode_latin1};
use crate::bank::{BankAccount, BankError, TanChallenge, TanMechanism};

/// Task reference the bank uses when no TAN is needed.
const NO_REFERENCE: &str = "noref";

/// A single result code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseCode {
	pub code: String,
	pub text: String,
	pub parameters: Vec<String>,
	/// Request segment number for segment-level codes.
	pub segment_reference: Option<u32>,
}

impl ResponseCode {
	pub fn is_error(&self) -> bool {
		self.code.starts_with('9')
	}

	pub fn is_warning(&self) -> bool {
		self.code.starts_with('3')
	}
}

/// Parsed answer to one message.
#[derive(Debug, Clone)]
pub struct Response {
	segments: Vec<Segment>,
}

impl Response {
	pub fn new(segments: Vec<Segment>) -> Self {
		Self { segments }
	}

	pub fn segments_of<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a Segment> + 'a {
		self.segments.iter().filter(move |s| s.kind == kind)
	}

	pub fn find(&self, kind: &str) -> Option<&Segment> {
		self.segments.iter().find(|s| s.kind == kind)
	}

	/// Dialog id assigned in the message header.
	pub fn dialog_id(&self) -> Option<String> {
		self.find("HNHBK").and_then(|s| s.text(2, 0))
	}

	/// All result codes of the message and its segments.
	pub fn codes(&self) -> Vec<ResponseCode> {
		let mut codes = Vec::new();
		for segment in self
			.segments
			.iter()
			.filter(|s| s.kind == "HIRMG" || s.kind == "HIRMS")
		{
			for element in &segment.elements {
				let text = |i: usize| element.get(i).map(|b| decode_latin1(b)).unwrap_or_default();
				let code = text(0);
				if code.is_empty() {
					continue;
				}
				codes.push(ResponseCode {
					code,
					text: text(2),
					parameters: element.iter().skip(3).map(|b| decode_latin1(b)).collect(),
					segment_reference: segment.reference,
				});
			}
		}
		codes
	}

	/// First error code, as an error.
	pub fn check(&self) -> Result<(), BankError> {
		match self.codes().into_iter().find(ResponseCode::is_error) {
			Some(error) => Err(BankError::BankMessage {
				code: error.code,
				text: error.text,
			}),
			None => Ok(()),
		}
	}

	/// Security functions the user may use for two-step authentication (code 3920).
	pub fn allowed_security_functions(&self) -> Vec<String> {
		self.codes()
			.into_iter()
			.filter(|c| c.code == "3920")
			.flat_map(|c| c.parameters)
			.filter(|p| !p.is_empty())
			.collect()
	}

	/// Continuation point when the bank splits a result over several responses (code 3040).
	pub fn touchdown(&self) -> Option<String> {
		self.codes()
			.into_iter()
			.find(|c| c.code == "3040")
			.and_then(|c| c.parameters.into_iter().next())
			.filter(|t| !t.is_empty())
	}

	/// Pending TAN challenge, if the bank asked for one.
	pub fn tan_challenge(&self) -> Option<TanChallenge> {
		let hitan = self.find("HITAN")?;
		let task_reference = hitan.text(2, 0)?;
		if task_reference == NO_REFERENCE {
			return None;
		}
		Some(TanChallenge {
			task_reference,
			text: hitan.text(3, 0).unwrap_or_default(),
			medium: hitan.text(6, 0),
		})
	}

	/// Customer system id from `HISYN`.
	pub fn system_id(&self) -> Option<String> {
		self.find("HISYN").and_then(|s| s.text(0, 0))
	}

	/// SEPA accounts from `HISPA`.
	pub fn sepa_accounts(&self) -> Vec<BankAccount> {
		self.segments_of("HISPA")
			.flat_map(|segment| segment.elements.iter())
			.filter_map(|groups| {
				let text = |i: usize| {
					groups
						.get(i)
						.filter(|b| !b.is_empty())
						.map(|b| decode_latin1(b))
				};
				Some(BankAccount {
					iban: text(1)?,
					bic: text(2),
					account_number: text(3).unwrap_or_default(),
					subaccount: text(4),
					bank_code: text(6).unwrap_or_default(),
				})
			})
			.collect()
	}

	/// Names of the TAN media listed in `HITAB`.
	pub fn tan_media(&self) -> Vec<String> {
		self.segments_of("HITAB")
			.flat_map(|segment| {
				// version 5 adds the security function before the card number
				let name_index = if segment.version >= 5 { 15 } else { 12 };
				segment
					.elements
					.iter()
					.skip(1)
					.filter_map(move |groups| groups.get(name_index))
			})
			.filter(|name| !name.is_empty())
			.map(|name| decode_latin1(name))
			.collect()
	}

	/// MT940 payloads of all `HIKAZ` segments (booked transactions only).
	pub fn statements(&self) -> Vec<&[u8]> {
		self.segments_of("HIKAZ")
			.filter_map(|segment| segment.bytes(0, 0))
			.collect()
	}
}

/// Bank parameter data relevant to this client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BankParameters {
	pub bpd_version: u32,
	pub upd_version: u32,
	pub sepa_account_version: u32,
	pub statement_version: u32,
	pub tan_media_version: u32,
	/// Two-step mechanisms described in `HITANS`, keyed by security function.
	pub mechanisms: Vec<TanMechanism>,
}

impl Default for BankParameters {
	fn default() -> Self {
		Self {
			bpd_version: 0,
			upd_version: 0,
			sepa_account_version: 1,
			statement_version: 6,
			tan_media_version: 4,
			mechanisms: Vec::new(),
		}
	}
}

impl BankParameters {
	/// Highest supported versions this client can speak.
	const MAX_SEPA_ACCOUNT_VERSION: u32 = 3;
	const MIN_STATEMENT_VERSION: u32 = 5;
	const MAX_STATEMENT_VERSION: u32 = 7;
	const MIN_TAN_MEDIA_VERSION: u32 = 4;
	const MAX_TAN_MEDIA_VERSION: u32 = 5;

	/// Merge parameter segments from `response`.
	pub fn update(&mut self, response: &Response) {
		if let Some(version) = response
			.find("HIBPA")
			.and_then(|s| s.text(0, 0))
			.and_then(|v| v.parse().ok())
		{
			self.bpd_version = version;
		}
		if let Some(version) = response
			.find("HIUPA")
			.and_then(|s| s.text(1, 0))
			.and_then(|v| v.parse().ok())
		{
			self.upd_version = version;
		}
		if let Some(version) = highest_version(response, "HISPAS", 1, Self::MAX_SEPA_ACCOUNT_VERSION) {
			self.sepa_account_version = version;
		}
		if let Some(version) = highest_version(
			response,
			"HIKAZS",
			Self::MIN_STATEMENT_VERSION,
			Self::MAX_STATEMENT_VERSION,
		) {
			self.statement_version = version;
		}
		if let Some(version) = highest_version(
			response,
			"HITABS",
			Self::MIN_TAN_MEDIA_VERSION,
			Self::MAX_TAN_MEDIA_VERSION,
		) {
			self.tan_media_version = version;
		}
		for segment in response.segments_of("HITANS") {
			for mechanism in tan_mechanisms(segment) {
				if !self
					.mechanisms
					.iter()
					.any(|m| m.security_function == mechanism.security_function)
				{
					self.mechanisms.push(mechanism);
				}
			}
		}
	}

	/// Describe `security_function` using the names from `HITANS`.
	pub fn mechanism(&self, security_function: &str) -> TanMechanism {
		self.mechanisms
			.iter()
			.find(|m| m.security_function == security_function)
			.cloned()
			.unwrap_or_else(|| TanMechanism {
				security_function: security_function.to_string(),
				name: security_function.to_string(),
				medium_required: false,
			})
	}
}

fn highest_version(response: &Response, kind: &str, min: u32, max: u32) -> Option<u32> {
	response
		.segments_of(kind)
		.map(|s| s.version)
		.filter(|v| (min..=max).contains(v))
		.max()
}

/// Extract the mechanisms described by a `HITANS` parameter block.
///
/// Each mechanism block starts with its three digit security function followed by the TAN
/// process (`1` or `2`), two technical ids, a version and the display name. Versions 6 and 7
/// have fixed size blocks whose 19th field is `2` when the TAN medium must be named.
fn tan_mechanisms(segment: &Segment) -> Vec<TanMechanism> {
	let (block_size, medium_field) = match segment.version {
		6 => (21, Some(18)),
		7 => (26, Some(18)),
		_ => (6, None),
	};

	let fields: Vec<String> = segment
		.element(3)
		.unwrap_or_default()
		.iter()
		.map(|b| decode_latin1(b))
		.collect();

	let mut mechanisms = Vec::new();
	let mut i = 3;
	while i + 5 < fields.len() {
		let code = &fields[i];
		let is_function = code.len() == 3 && code.starts_with('9') && code.chars().all(|c| c.is_ascii_digit());
		if is_function && (fields[i + 1] == "1" || fields[i + 1] == "2") {
			let medium_required = medium_field
				.and_then(|offset| fields.get(i + offset))
				.is_some_and(|flag| flag == "2");
			mechanisms.push(TanMechanism {
				security_function: code.clone(),
				name: fields[i + 5].clone(),
				medium_required,
			});
			i += block_size;
		} else {
			i += 1;
		}
	}
	mechanisms
}
