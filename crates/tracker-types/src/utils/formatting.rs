//! String formatting utilities.
//!
//! Provides helpers for keeping identifiers short in logs and notices and for
//! rendering monetary amounts.

/// Truncates an identifier for display.
///
/// Shows only the first 8 characters followed by ".." for longer identifiers.
pub fn truncate_id(id: &str) -> String {
	match id.char_indices().nth(8) {
		Some((end, _)) => format!("{}..", &id[..end]),
		None => id.to_string(),
	}
}

/// Formats an amount with thousands separators.
///
/// Whole amounts render without decimals; anything else keeps two.
pub fn format_amount(amount: f64) -> String {
	let negative = amount < 0.0;
	let cents = (amount.abs() * 100.0).round() as u64;
	let (whole, fraction) = (cents / 100, cents % 100);

	let digits = whole.to_string();
	let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
	for (i, ch) in digits.chars().enumerate() {
		if i > 0 && (digits.len() - i) % 3 == 0 {
			grouped.push(',');
		}
		grouped.push(ch);
	}

	let sign = if negative && cents > 0 { "-" } else { "" };
	if fraction == 0 {
		format!("{}{}", sign, grouped)
	} else {
		format!("{}{}.{:02}", sign, grouped, fraction)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_truncate_id() {
		assert_eq!(truncate_id("O1"), "O1");
		assert_eq!(truncate_id("12345678"), "12345678");
		assert_eq!(truncate_id("665f1c2ab9e0"), "665f1c2a..");
	}

	#[test]
	fn test_format_amount() {
		assert_eq!(format_amount(0.0), "0");
		assert_eq!(format_amount(2000.0), "2,000");
		assert_eq!(format_amount(1234567.0), "1,234,567");
		assert_eq!(format_amount(120.5), "120.50");
		assert_eq!(format_amount(-1500.0), "-1,500");
	}
}
