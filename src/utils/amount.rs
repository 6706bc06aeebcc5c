use rust_decimal::{Decimal, RoundingStrategy};

/// Number of minor-unit digits for an ISO 4217 currency code.
///
/// Currencies not listed use two decimal places.
pub fn currency_precision(currency: &str) -> u32 {
	match currency.trim().to_ascii_uppercase().as_str() {
		"BIF" | "CLP" | "DJF" | "GNF" | "ISK" | "JPY" | "KMF" | "KRW" | "PYG" | "RWF" | "UGX"
		| "VND" | "VUV" | "XAF" | "XOF" | "XPF" => 0,
		"BHD" | "IQD" | "JOD" | "KWD" | "LYD" | "OMR" | "TND" => 3,
		_ => 2,
	}
}

/// Render `amount` with exactly the precision of `currency`, rounding half away from zero
/// when the source carries more digits.
pub fn format_amount(amount: Decimal, currency: &str) -> String {
	let precision = currency_precision(currency);
	let mut value = amount.round_dp_with_strategy(precision, RoundingStrategy::MidpointAwayFromZero);
	value.rescale(precision);
	value.to_string()
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::str::FromStr;

	fn dec(s: &str) -> Decimal {
		Decimal::from_str(s).expect("decimal")
	}

	#[test]
	fn pads_to_currency_precision() {
		assert_eq!(format_amount(dec("50"), "EUR"), "50.00");
		assert_eq!(format_amount(dec("50.5"), "eur"), "50.50");
		assert_eq!(format_amount(dec("1200"), "JPY"), "1200");
		assert_eq!(format_amount(dec("3.1"), "KWD"), "3.100");
	}

	#[test]
	fn keeps_sign_and_rounds_extra_digits() {
		assert_eq!(format_amount(dec("-20"), "EUR"), "-20.00");
		assert_eq!(format_amount(dec("0.125"), "EUR"), "0.13");
	}
}
