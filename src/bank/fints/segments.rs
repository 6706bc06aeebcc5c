use super::codec::SegmentBuilder;
use super::message::COUNTRY_CODE;
use crate::bank::BankAccount;
use chrono::NaiveDate;

/// HKTAN version used for two-step authentication.
pub const TAN_VERSION: u32 = 6;

/// Identification: bank, customer and system id.
pub fn identification(bank_code: &str, customer_id: &str, system_id: &str) -> SegmentBuilder {
	SegmentBuilder::new("HKIDN", 2)
		.group([COUNTRY_CODE, bank_code])
		.text(customer_id)
		.text(system_id)
		.text("1")
}

/// Processing preparation: parameter data versions and the registered product.
pub fn processing_preparation(
	bpd_version: u32,
	upd_version: u32,
	product_id: &str,
	product_version: &str,
) -> SegmentBuilder {
	SegmentBuilder::new("HKVVB", 3)
		.text(&bpd_version.to_string())
		.text(&upd_version.to_string())
		.text("0")
		.text(product_id)
		.text(product_version)
}

/// Request a new customer system id.
pub fn synchronization() -> SegmentBuilder {
	SegmentBuilder::new("HKSYN", 3).text("0")
}

pub fn dialog_end(dialog_id: &str) -> SegmentBuilder {
	SegmentBuilder::new("HKEND", 1).text(dialog_id)
}

/// Announce a task (`HKTAN` process 4) for the segment type that follows.
///
/// `medium` names the TAN medium for mechanisms that require one.
pub fn tan_announcement(segment_kind: &str, medium: Option<&str>) -> SegmentBuilder {
	let mut segment = SegmentBuilder::new("HKTAN", TAN_VERSION)
		.text("4")
		.text(segment_kind);
	// account, hash, reference, follow-up, cancel, charge account, challenge class and its parameters
	for _ in 0..8 {
		segment = segment.empty();
	}
	segment.text(medium.unwrap_or(""))
}

/// List all TAN media of the user (`HKTAB`).
pub fn tan_media(version: u32) -> SegmentBuilder {
	SegmentBuilder::new("HKTAB", version).text("0").text("A")
}

/// Submit the TAN for a previously issued challenge (`HKTAN` process 2).
pub fn tan_submission(task_reference: &str) -> SegmentBuilder {
	SegmentBuilder::new("HKTAN", TAN_VERSION)
		.text("2")
		.empty()
		.empty()
		.empty()
		.text(task_reference)
		.text("N")
}

/// List SEPA accounts.
pub fn sepa_accounts(version: u32) -> SegmentBuilder {
	SegmentBuilder::new("HKSPA", version)
}

/// Request booked transactions of `account` between `start` and `end`.
///
/// Versions 5 and 6 address the account nationally, version 7 by IBAN and BIC.
pub fn statement(
	version: u32,
	account: &BankAccount,
	start: NaiveDate,
	end: NaiveDate,
	touchdown: Option<&str>,
) -> SegmentBuilder {
	let subaccount = account.subaccount.as_deref().unwrap_or("");
	let segment = SegmentBuilder::new("HKKAZ", version);
	let segment = if version >= 7 {
		segment.group([
			account.iban.as_str(),
			account.bic.as_deref().unwrap_or(""),
			account.account_number.as_str(),
			subaccount,
			COUNTRY_CODE,
			account.bank_code.as_str(),
		])
	} else {
		segment.group([
			account.account_number.as_str(),
			subaccount,
			COUNTRY_CODE,
			account.bank_code.as_str(),
		])
	};

	segment
		.text("N")
		.text(&start.format("%Y%m%d").to_string())
		.text(&end.format("%Y%m%d").to_string())
		.empty()
		.text(touchdown.unwrap_or(""))
}

#[cfg(test)]
mod tests {
	use super::*;

	fn account() -> BankAccount {
		BankAccount {
			iban: "DE02120300000000202051".to_string(),
			bic: Some("BYLADEM1001".to_string()),
			account_number: "202051".to_string(),
			subaccount: None,
			bank_code: "12030000".to_string(),
		}
	}

	fn day(d: u32) -> NaiveDate {
		NaiveDate::from_ymd_opt(2026, 10, d).expect("date")
	}

	#[test]
	fn statement_request_addresses_account_by_version() {
		let v7 = statement(7, &account(), day(12), day(19), None).encode(3);
		assert_eq!(
			String::from_utf8(v7).expect("ascii"),
			"HKKAZ:3:7+DE02120300000000202051:BYLADEM1001:202051::280:12030000+N+20261012+20261019'"
		);

		let v6 = statement(6, &account(), day(12), day(19), Some("4711?1")).encode(3);
		assert_eq!(
			String::from_utf8(v6).expect("ascii"),
			"HKKAZ:3:6+202051::280:12030000+N+20261012+20261019++4711??1'"
		);
	}

	#[test]
	fn tan_announcement_names_medium_only_when_given() {
		assert_eq!(
			String::from_utf8(tan_announcement("HKSPA", None).encode(4)).expect("ascii"),
			"HKTAN:4:6+4+HKSPA'"
		);
		assert_eq!(
			String::from_utf8(tan_announcement("HKSPA", Some("Handy")).encode(4)).expect("ascii"),
			"HKTAN:4:6+4+HKSPA+++++++++Handy'"
		);
		assert_eq!(
			String::from_utf8(tan_media(4).encode(3)).expect("ascii"),
			"HKTAB:3:4+0+A'"
		);
	}

	#[test]
	fn tan_submission_leaves_unused_fields_empty() {
		assert_eq!(
			String::from_utf8(tan_submission("task-1").encode(4)).expect("ascii"),
			"HKTAN:4:6+2++++task-1+N'"
		);
	}
}
