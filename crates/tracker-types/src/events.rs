//! Event types published by the tracker.
//!
//! Operations never surface failures to their caller as errors. Instead they
//! publish events on the tracker's event bus; a front end turns the events that
//! carry a [`Notice`] into toasts and ignores the rest.

use serde::{Deserialize, Serialize};

use crate::{truncate_id, OrderStatus};

/// Main event type encompassing all tracker events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum TrackerEvent {
	Orders(OrdersEvent),
	Payment(PaymentEvent),
	Cancellation(CancellationEvent),
	Status(StatusEvent),
}

/// Events about the order list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum OrdersEvent {
	/// The order list was replaced.
	Loaded { count: usize },
	/// The order list could not be fetched and was treated as empty.
	LoadFailed { error: String },
}

/// Events about payment windows and payment initiation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum PaymentEvent {
	CountdownStarted { order_id: String, seconds: u64 },
	/// The payment window closed, either on the last countdown tick or because
	/// the backend reported it closed.
	Expired { order_id: String },
	/// A payment status check failed and was swallowed.
	CheckFailed { order_id: String, error: String },
	/// The backend issued a payment provider URL.
	RedirectIssued { order_id: String, url: String },
	InitiationFailed { order_id: String },
}

/// Events about customer cancellations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum CancellationEvent {
	Submitted { order_id: String, reason: String },
	Succeeded { order_id: String },
	Failed { order_id: String, error: String },
}

/// Events about staff status updates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum StatusEvent {
	Updated { order_id: String, status: OrderStatus },
	UpdateFailed { order_id: String, error: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoticeLevel {
	Info,
	Success,
	Warning,
	Error,
}

/// A user-visible notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
	pub level: NoticeLevel,
	pub message: String,
}

impl Notice {
	fn new(level: NoticeLevel, message: String) -> Self {
		Self { level, message }
	}
}

impl TrackerEvent {
	/// Returns the notification a user should see for this event, if any.
	pub fn notice(&self) -> Option<Notice> {
		match self {
			TrackerEvent::Payment(PaymentEvent::Expired { order_id }) => Some(Notice::new(
				NoticeLevel::Warning,
				format!(
					"The payment window for order {} has expired",
					truncate_id(order_id)
				),
			)),
			TrackerEvent::Payment(PaymentEvent::InitiationFailed { order_id }) => {
				Some(Notice::new(
					NoticeLevel::Error,
					format!(
						"Could not start payment for order {}. Please try again",
						truncate_id(order_id)
					),
				))
			},
			TrackerEvent::Payment(PaymentEvent::RedirectIssued { .. }) => Some(Notice::new(
				NoticeLevel::Info,
				"Redirecting to the payment provider".to_string(),
			)),
			TrackerEvent::Cancellation(CancellationEvent::Succeeded { order_id }) => {
				Some(Notice::new(
					NoticeLevel::Success,
					format!("Order {} has been cancelled", truncate_id(order_id)),
				))
			},
			TrackerEvent::Cancellation(CancellationEvent::Failed { order_id, .. }) => {
				Some(Notice::new(
					NoticeLevel::Error,
					format!(
						"Could not cancel order {}. Please try again",
						truncate_id(order_id)
					),
				))
			},
			TrackerEvent::Status(StatusEvent::Updated { order_id, status }) => Some(Notice::new(
				NoticeLevel::Success,
				format!(
					"Order {} is now {}",
					truncate_id(order_id),
					status.label().to_lowercase()
				),
			)),
			TrackerEvent::Status(StatusEvent::UpdateFailed { order_id, .. }) => Some(Notice::new(
				NoticeLevel::Error,
				format!("Could not update order {}", truncate_id(order_id)),
			)),
			_ => None,
		}
	}

	/// Order the event concerns, if it concerns a single order.
	pub fn order_id(&self) -> Option<&str> {
		match self {
			TrackerEvent::Orders(_) => None,
			TrackerEvent::Payment(
				PaymentEvent::CountdownStarted { order_id, .. }
				| PaymentEvent::Expired { order_id }
				| PaymentEvent::CheckFailed { order_id, .. }
				| PaymentEvent::RedirectIssued { order_id, .. }
				| PaymentEvent::InitiationFailed { order_id },
			) => Some(order_id),
			TrackerEvent::Cancellation(
				CancellationEvent::Submitted { order_id, .. }
				| CancellationEvent::Succeeded { order_id }
				| CancellationEvent::Failed { order_id, .. },
			) => Some(order_id),
			TrackerEvent::Status(
				StatusEvent::Updated { order_id, .. } | StatusEvent::UpdateFailed { order_id, .. },
			) => Some(order_id),
		}
	}
}
