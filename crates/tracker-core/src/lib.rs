//! Order and payment status tracker.
//!
//! This crate holds the stateful client logic behind the customer order pages:
//! it keeps the current order list, runs one payment countdown per order
//! awaiting an online or bank payment, drives the cancel flow and payment
//! initiation, and guards staff status updates. Outcomes are published on an
//! [`EventBus`] so a front end can turn them into notifications.

use thiserror::Error;
use tracker_types::{CancelValidationError, OrderStatus};

pub mod builder;
pub mod engine;
pub mod handlers;
pub mod monitoring;
pub mod state;
pub mod view;

pub use builder::{BuilderError, TrackerBuilder};
pub use engine::{event_bus::EventBus, OrderTracker};
pub use handlers::{CancelOutcome, CancelStage, PaymentOutcome};
pub use state::StatusTransitionError;
pub use view::OrderView;

/// Errors returned for requests the tracker refuses before contacting the
/// backend, and for lookups that failed outright.
#[derive(Debug, Error)]
pub enum TrackerError {
	#[error("Backend error: {0}")]
	Api(String),
	#[error("Order not found: {0}")]
	OrderNotFound(String),
	#[error("Order {order_id} cannot be cancelled while {status}")]
	NotCancellable {
		order_id: String,
		status: OrderStatus,
	},
	#[error("A cancellation for order {0} is already being submitted")]
	CancelInProgress(String),
	#[error("No cancellation has been started for order {0}")]
	NoCancellation(String),
	#[error(transparent)]
	InvalidCancelRequest(#[from] CancelValidationError),
	#[error("Payment is not available for order {0}")]
	NotPayable(String),
	#[error(transparent)]
	Transition(#[from] StatusTransitionError),
}
