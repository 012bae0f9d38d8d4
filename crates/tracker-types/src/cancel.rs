//! Cancellation reasons and the cancel form.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Inline validation errors of the cancel form. None of these reach the backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CancelValidationError {
	#[error("Please select a reason for cancelling")]
	MissingReason,
	#[error("Please describe your reason for cancelling")]
	MissingCustomReason,
}

/// The fixed set of reasons a customer can give when cancelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CancelReason {
	ChangeAddress,
	ChangeProducts,
	ChangePaymentMethod,
	BetterPriceElsewhere,
	DeliveryTooLong,
	NoLongerWanted,
	Other,
}

impl CancelReason {
	/// Reasons in the order the picker lists them; `Other` is always last.
	pub const ALL: [CancelReason; 7] = [
		CancelReason::ChangeAddress,
		CancelReason::ChangeProducts,
		CancelReason::ChangePaymentMethod,
		CancelReason::BetterPriceElsewhere,
		CancelReason::DeliveryTooLong,
		CancelReason::NoLongerWanted,
		CancelReason::Other,
	];

	pub fn as_str(&self) -> &'static str {
		match self {
			CancelReason::ChangeAddress => "I want to change the delivery address",
			CancelReason::ChangeProducts => "I want to change products in the order",
			CancelReason::ChangePaymentMethod => "I want to change the payment method",
			CancelReason::BetterPriceElsewhere => "I found a better price elsewhere",
			CancelReason::DeliveryTooLong => "Delivery time is too long",
			CancelReason::NoLongerWanted => "I no longer want to buy",
			CancelReason::Other => "Other reason",
		}
	}

	/// Looks a reason up by its 1-based position in the picker.
	pub fn from_position(position: usize) -> Option<Self> {
		position
			.checked_sub(1)
			.and_then(|index| Self::ALL.get(index).copied())
	}

	/// Looks a reason up by its exact text, ignoring case.
	pub fn from_text(text: &str) -> Option<Self> {
		let text = text.trim();
		Self::ALL
			.into_iter()
			.find(|reason| reason.as_str().eq_ignore_ascii_case(text))
	}

	/// `Other` needs free text before the form can be submitted.
	pub fn requires_custom_text(&self) -> bool {
		matches!(self, CancelReason::Other)
	}
}

impl fmt::Display for CancelReason {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Transient state of the cancel form for one order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancelRequest {
	pub order_id: String,
	pub reason: Option<CancelReason>,
	pub custom_reason: String,
}

impl CancelRequest {
	pub fn new(order_id: impl Into<String>) -> Self {
		Self {
			order_id: order_id.into(),
			reason: None,
			custom_reason: String::new(),
		}
	}

	/// Validates the form and returns the reason text to send.
	///
	/// For `Other` the trimmed free text is sent instead of the fixed label.
	pub fn submission_reason(&self) -> Result<String, CancelValidationError> {
		match self.reason {
			None => Err(CancelValidationError::MissingReason),
			Some(reason) if reason.requires_custom_text() => {
				let custom = self.custom_reason.trim();
				if custom.is_empty() {
					Err(CancelValidationError::MissingCustomReason)
				} else {
					Ok(custom.to_string())
				}
			},
			Some(reason) => Ok(reason.as_str().to_string()),
		}
	}
}
