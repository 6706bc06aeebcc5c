//!
//! Framing of outgoing FinTS messages.
//!
//! Business segments are signed with a PIN/TAN signature (`HNSHK` ... `HNSHA`) and wrapped in
//! the dummy encryption envelope PIN/TAN uses (`HNVSK` + `HNVSD`), between the message header
//! `HNHBK` and trailer `HNHBS`.

use super::codec::{SegmentBuilder, binary, escape};
use chrono::NaiveDateTime;

/// Security function code for single-step (PIN only) authentication.
pub const SINGLE_STEP: &str = "999";

/// Country code for Germany, used in every bank identifier.
pub const COUNTRY_CODE: &str = "280";

const HBCI_VERSION: &str = "300";

/// Everything that goes into the envelope of one message.
#[derive(Debug, Clone)]
pub struct MessageContext<'a> {
	pub dialog_id: &'a str,
	pub message_number: u32,
	pub bank_code: &'a str,
	pub user_id: &'a str,
	pub system_id: &'a str,
	pub security_function: &'a str,
	/// Security control reference tying `HNSHK` to `HNSHA`.
	pub control_reference: &'a str,
	pub timestamp: NaiveDateTime,
}

impl MessageContext<'_> {
	fn security_profile(&self) -> &'static str {
		if self.security_function == SINGLE_STEP { "1" } else { "2" }
	}

	fn date(&self) -> String {
		self.timestamp.format("%Y%m%d").to_string()
	}

	fn time(&self) -> String {
		self.timestamp.format("%H%M%S").to_string()
	}
}

/// Frame `segments` into a complete message, signing with `pin` and optionally `tan`.
pub fn build_message(
	ctx: &MessageContext<'_>,
	segments: &[SegmentBuilder],
	pin: &str,
	tan: Option<&str>,
) -> Vec<u8> {
	let mut signed = signature_header(ctx).encode(2);
	let mut number = 3;
	for segment in segments {
		signed.extend(segment.encode(number));
		number += 1;
	}
	signed.extend(signature_trailer(ctx, pin, tan).encode(number));

	let mut body = encryption_header(ctx).encode(998);
	body.extend(SegmentBuilder::new("HNVSD", 1).binary(&signed).encode(999));
	body.extend(
		SegmentBuilder::new("HNHBS", 1)
			.text(&ctx.message_number.to_string())
			.encode(number + 1),
	);

	let header_len = message_header(ctx, 0).encode(1).len();
	let mut message = message_header(ctx, header_len + body.len()).encode(1);
	message.extend(body);
	message
}

fn message_header(ctx: &MessageContext<'_>, size: usize) -> SegmentBuilder {
	SegmentBuilder::new("HNHBK", 3)
		.text(&format!("{:012}", size))
		.text(HBCI_VERSION)
		.text(ctx.dialog_id)
		.text(&ctx.message_number.to_string())
}

fn encryption_header(ctx: &MessageContext<'_>) -> SegmentBuilder {
	SegmentBuilder::new("HNVSK", 3)
		.group(["PIN", ctx.security_profile()])
		.text("998")
		.text("1")
		.group(["1", "", ctx.system_id])
		.group(["1".to_string(), ctx.date(), ctx.time()])
		.raw(vec![
			escape("2"),
			escape("2"),
			escape("13"),
			binary(b"00000000"),
			escape("5"),
			escape("1"),
		])
		.group([COUNTRY_CODE, ctx.bank_code, ctx.user_id, "V", "0", "0"])
		.text("0")
}

fn signature_header(ctx: &MessageContext<'_>) -> SegmentBuilder {
	SegmentBuilder::new("HNSHK", 4)
		.group(["PIN", ctx.security_profile()])
		.text(ctx.security_function)
		.text(ctx.control_reference)
		.text("1")
		.text("1")
		.group(["1", "", ctx.system_id])
		.text("1")
		.group(["1".to_string(), ctx.date(), ctx.time()])
		.group(["1", "999", "1"])
		.group(["6", "10", "16"])
		.group([COUNTRY_CODE, ctx.bank_code, ctx.user_id, "S", "0", "0"])
}

fn signature_trailer(ctx: &MessageContext<'_>, pin: &str, tan: Option<&str>) -> SegmentBuilder {
	let credentials = match tan {
		Some(tan) => vec![pin, tan],
		None => vec![pin],
	};
	SegmentBuilder::new("HNSHA", 2)
		.text(ctx.control_reference)
		.empty()
		.group(credentials)
}
