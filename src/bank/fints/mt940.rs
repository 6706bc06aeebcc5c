//!
//! MT940 statement parsing.
//!
//! Banks deliver booked transactions as MT940 text: `:61:` carries date, mark and amount,
//! the following `:86:` the structured purpose field with `?NN` subfields. SEPA keywords
//! (`SVWZ+`, `ABWA+`, `EREF+`) inside the purpose are split out as well.

use crate::bank::{BankError, BankTransaction, Direction};
use chrono::{Datelike, NaiveDate};
use regex::Regex;
use rust_decimal::Decimal;

/// Parse every statement in `text` into transactions, in the order they were booked.
pub fn parse_statements(text: &str) -> Result<Vec<BankTransaction>, BankError> {
	// :61: YYMMDD [MMDD] C|D|RC|RD [funds code] amount [N|F + 3 char type] ...
	let re_61 = Regex::new(
		r"^(?P<value>\d{6})(?P<entry>\d{4})?(?P<mark>C|D|RC|RD)(?P<funds>[A-Z])?(?P<amount>\d+,\d*)(?P<kind>[NF][A-Z0-9]{3})?",
	)
	.map_err(|e| BankError::ParseError(e.to_string()))?;
	let re_sepa = Regex::new(r"(EREF|KREF|MREF|CRED|DEBT|COAM|OAMT|SVWZ|ABWA|ABWE)\+")
		.map_err(|e| BankError::ParseError(e.to_string()))?;

	let mut transactions: Vec<BankTransaction> = Vec::new();
	let mut currency = String::from("EUR");
	let mut awaiting_details = false;

	for (tag, content) in fields(text) {
		match tag.as_str() {
			"60F" | "60M" => {
				if let Some(ccy) = content.get(7..10) {
					currency = ccy.to_string();
				}
			}
			"61" => {
				let first_line = content.lines().next().unwrap_or_default();
				transactions.push(parse_61(&re_61, first_line, &currency)?);
				awaiting_details = true;
			}
			"86" if awaiting_details => {
				if let Some(tx) = transactions.last_mut() {
					apply_details(&re_sepa, tx, &content);
				}
				awaiting_details = false;
			}
			_ => awaiting_details = false,
		}
	}

	Ok(transactions)
}

/// Split the text into `(tag, content)` pairs.
///
/// Continuation lines of `:86:` are joined without separator since banks wrap subfields at
/// fixed width; other fields keep their line breaks.
fn fields(text: &str) -> Vec<(String, String)> {
	let mut fields: Vec<(String, String)> = Vec::new();
	for line in text.lines() {
		let line = line.trim_end_matches('\r');
		if let Some((tag, rest)) = split_tag(line) {
			fields.push((tag.to_string(), rest.to_string()));
		} else if line == "-" || line.is_empty() {
			continue;
		} else if let Some((tag, content)) = fields.last_mut() {
			if tag.as_str() != "86" {
				content.push('\n');
			}
			content.push_str(line);
		}
	}
	fields
}

fn split_tag(line: &str) -> Option<(&str, &str)> {
	let rest = line.strip_prefix(':')?;
	let end = rest.find(':')?;
	let tag = &rest[..end];
	let valid = (2..=3).contains(&tag.len())
		&& tag.chars().take(2).all(|c| c.is_ascii_digit())
		&& tag.chars().skip(2).all(|c| c.is_ascii_uppercase());
	valid.then(|| (tag, &rest[end + 1..]))
}

fn parse_61(re: &Regex, line: &str, currency: &str) -> Result<BankTransaction, BankError> {
	let caps = re
		.captures(line)
		.ok_or_else(|| BankError::ParseError(format!("bad :61: line '{}'", line)))?;

	let req = |name: &str| {
		caps.name(name)
			.map(|m| m.as_str())
			.ok_or_else(|| BankError::ParseError(format!(":61: missing {name}")))
	};

	let value_date = parse_date(req("value")?)?;
	let entry_date = caps
		.name("entry")
		.and_then(|m| entry_date(value_date, m.as_str()));

	// reversal of a debit is money coming back, reversal of a credit money going out
	let direction = match req("mark")? {
		"C" | "RD" => Direction::Credit,
		_ => Direction::Debit,
	};

	let magnitude: Decimal = req("amount")?
		.replace(',', ".")
		.trim_end_matches('.')
		.parse()
		.map_err(|e| BankError::ParseError(format!(":61: amount: {e}")))?;
	let amount = match direction {
		Direction::Credit => magnitude,
		Direction::Debit => -magnitude,
	};

	let mut tx = BankTransaction::new(amount, currency, value_date, direction);
	tx.entry_date = entry_date;
	Ok(tx)
}

fn parse_date(yymmdd: &str) -> Result<NaiveDate, BankError> {
	let num = |range: std::ops::Range<usize>| -> Result<u32, BankError> {
		yymmdd
			.get(range)
			.and_then(|s| s.parse().ok())
			.ok_or_else(|| BankError::ParseError(format!("bad date {yymmdd}")))
	};
	let year = 2000 + num(0..2)? as i32;
	NaiveDate::from_ymd_opt(year, num(2..4)?, num(4..6)?)
		.ok_or_else(|| BankError::ParseError(format!("bad date {yymmdd}")))
}

/// Booking date `MMDD`, placed in the year closest to the value date.
fn entry_date(value: NaiveDate, mmdd: &str) -> Option<NaiveDate> {
	let month: u32 = mmdd.get(0..2)?.parse().ok()?;
	let day: u32 = mmdd.get(2..4)?.parse().ok()?;
	let year = match (value.month(), month) {
		(12, 1) => value.year() + 1,
		(1, 12) => value.year() - 1,
		_ => value.year(),
	};
	NaiveDate::from_ymd_opt(year, month, day)
}

/// Fill counterparty and purpose fields from a `:86:` field.
fn apply_details(re_sepa: &Regex, tx: &mut BankTransaction, content: &str) {
	let structured = content.get(..3).filter(|gvc| gvc.chars().all(|c| c.is_ascii_digit()));
	let separator = content.get(3..).and_then(|rest| rest.chars().next());

	let (gvc, separator) = match (structured, separator) {
		(Some(gvc), Some(sep)) if !sep.is_alphanumeric() && !sep.is_whitespace() => (gvc, sep),
		_ => {
			tx.purpose = Some(content.trim().to_string()).filter(|p| !p.is_empty());
			return;
		}
	};
	tx.transaction_code = Some(gvc.to_string());

	let mut purpose = String::new();
	let mut name = String::new();
	for part in content[3 + separator.len_utf8()..].split(separator) {
		let Some(code) = part.get(..2) else { continue };
		let value = &part[2..];
		match code {
			"00" => tx.posting_text = non_empty(value),
			"20" | "21" | "22" | "23" | "24" | "25" | "26" | "27" | "28" | "29" | "60" | "61"
			| "62" | "63" => purpose.push_str(value),
			"30" => tx.applicant_bin = non_empty(value),
			"31" => tx.applicant_iban = non_empty(value),
			"32" | "33" => name.push_str(value),
			_ => {}
		}
	}

	tx.applicant_name = non_empty(&name);
	apply_sepa_keywords(re_sepa, tx, &purpose);
}

/// Split SEPA keywords out of the purpose. Without `SVWZ+` the whole text is the purpose.
fn apply_sepa_keywords(re_sepa: &Regex, tx: &mut BankTransaction, purpose: &str) {
	let matches: Vec<_> = re_sepa.find_iter(purpose).collect();
	if matches.is_empty() {
		tx.purpose = non_empty(purpose);
		return;
	}

	let mut remittance = None;
	for (i, m) in matches.iter().enumerate() {
		let end = matches.get(i + 1).map_or(purpose.len(), |next| next.start());
		let value = non_empty(&purpose[m.end()..end]);
		match m.as_str() {
			"SVWZ+" => remittance = value,
			"ABWA+" => tx.deviate_applicant = value,
			"EREF+" => tx.end_to_end_reference = value,
			_ => {}
		}
	}
	tx.purpose = remittance.or_else(|| non_empty(purpose));
}

fn non_empty(value: &str) -> Option<String> {
	let trimmed = value.trim();
	(!trimmed.is_empty()).then(|| trimmed.to_string())
}
