//! Payment types for the tracker.
//!
//! Defines the payment method and payment status as the tracker understands
//! them, the payment window derived from a backend status check, and the view
//! state a page renders for an order's payment.

use std::fmt;

/// How the customer chose to pay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaymentMethod {
	/// Cash on delivery.
	Cod,
	Cash,
	Online,
	Bank,
	/// Anything the tracker does not recognize.
	Unknown,
}

impl PaymentMethod {
	/// Parses a raw payment method, ignoring case and surrounding whitespace.
	pub fn from_raw(raw: Option<&str>) -> Self {
		let raw = raw.map(|s| s.trim().to_ascii_lowercase());
		match raw.as_deref() {
			Some("cod") => PaymentMethod::Cod,
			Some("cash") => PaymentMethod::Cash,
			Some("online") => PaymentMethod::Online,
			Some("bank") => PaymentMethod::Bank,
			_ => PaymentMethod::Unknown,
		}
	}

	/// Methods settled in cash never go through the payment provider.
	pub fn is_cash_like(&self) -> bool {
		matches!(self, PaymentMethod::Cod | PaymentMethod::Cash)
	}

	/// Methods that have a payment window tracked by a countdown.
	pub fn requires_online_payment(&self) -> bool {
		matches!(self, PaymentMethod::Online | PaymentMethod::Bank)
	}

	pub fn label(&self) -> &'static str {
		match self {
			PaymentMethod::Cod => "Cash on delivery",
			PaymentMethod::Cash => "Cash",
			PaymentMethod::Online => "Online payment",
			PaymentMethod::Bank => "Bank transfer",
			PaymentMethod::Unknown => "unknown",
		}
	}
}

impl fmt::Display for PaymentMethod {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.label())
	}
}

/// Payment status of an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentStatus {
	Pending,
	Success,
	/// Any other value, kept lowercased. Absent statuses become `Other("")`.
	Other(String),
}

impl PaymentStatus {
	pub fn from_raw(raw: Option<&str>) -> Self {
		let raw = raw.map(|s| s.trim().to_ascii_lowercase()).unwrap_or_default();
		match raw.as_str() {
			"pending" => PaymentStatus::Pending,
			"success" => PaymentStatus::Success,
			_ => PaymentStatus::Other(raw),
		}
	}

	pub fn is_pending(&self) -> bool {
		matches!(self, PaymentStatus::Pending)
	}

	pub fn is_success(&self) -> bool {
		matches!(self, PaymentStatus::Success)
	}
}

/// Payment window of an order as derived from a backend status check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentWindow {
	/// The window has closed; no payment may be started.
	Expired,
	/// The window is open for the given number of whole seconds.
	Open { seconds_left: u64 },
}

/// What a page shows in the payment column for an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentView {
	/// Cash payment or a method with no payment window.
	NotApplicable,
	Paid,
	/// The payment window is open and counting down.
	Countdown { seconds_left: u64 },
	Expired,
	/// The window has not been checked yet, or the check failed.
	Unknown,
}

impl fmt::Display for PaymentView {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			PaymentView::NotApplicable => f.write_str("-"),
			PaymentView::Paid => f.write_str("paid"),
			PaymentView::Countdown { seconds_left } => {
				write!(f, "pay within {:02}:{:02}", seconds_left / 60, seconds_left % 60)
			},
			PaymentView::Expired => f.write_str("expired"),
			PaymentView::Unknown => f.write_str("awaiting payment"),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_payment_method_parsing() {
		assert_eq!(PaymentMethod::from_raw(Some("COD")), PaymentMethod::Cod);
		assert_eq!(PaymentMethod::from_raw(Some(" online ")), PaymentMethod::Online);
		assert_eq!(PaymentMethod::from_raw(Some("momo")), PaymentMethod::Unknown);
		assert_eq!(PaymentMethod::from_raw(None), PaymentMethod::Unknown);
		assert_eq!(PaymentMethod::Unknown.label(), "unknown");
	}

	#[test]
	fn test_payment_method_classes() {
		assert!(PaymentMethod::Cod.is_cash_like());
		assert!(PaymentMethod::Cash.is_cash_like());
		assert!(!PaymentMethod::Unknown.is_cash_like());
		assert!(PaymentMethod::Bank.requires_online_payment());
		assert!(!PaymentMethod::Unknown.requires_online_payment());
	}

	#[test]
	fn test_payment_status_parsing() {
		assert!(PaymentStatus::from_raw(Some("Pending")).is_pending());
		assert!(PaymentStatus::from_raw(Some("success")).is_success());
		assert_eq!(
			PaymentStatus::from_raw(Some("failed")),
			PaymentStatus::Other("failed".to_string())
		);
		assert!(!PaymentStatus::from_raw(None).is_pending());
	}

	#[test]
	fn test_countdown_display() {
		let view = PaymentView::Countdown { seconds_left: 125 };
		assert_eq!(view.to_string(), "pay within 02:05");
	}
}
