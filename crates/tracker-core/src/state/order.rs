//! Order status transitions allowed to staff.
//!
//! Orders move through `pending -> processing -> delivering -> completed`, and
//! may be cancelled until they leave for delivery. `completed` and `cancelled`
//! are terminal. The backend is the authority; this guard only keeps obviously
//! invalid updates from being sent.

use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use tracker_types::{OrderStatus, UpdateStatusRequest};

/// Errors raised by the client-side status guard.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StatusTransitionError {
	#[error("Invalid state transition from {from} to {to}")]
	InvalidTransition { from: OrderStatus, to: OrderStatus },
	#[error("A reason is required to cancel an order")]
	MissingCancelReason,
}

// Static transition table - each state maps to allowed next states
static TRANSITIONS: Lazy<HashMap<OrderStatus, HashSet<OrderStatus>>> = Lazy::new(|| {
	let mut m = HashMap::new();
	m.insert(
		OrderStatus::Pending,
		HashSet::from([OrderStatus::Processing, OrderStatus::Cancelled]),
	);
	m.insert(
		OrderStatus::Processing,
		HashSet::from([OrderStatus::Delivering, OrderStatus::Cancelled]),
	);
	m.insert(
		OrderStatus::Delivering,
		HashSet::from([OrderStatus::Completed]),
	);
	m.insert(OrderStatus::Completed, HashSet::new()); // terminal
	m.insert(OrderStatus::Cancelled, HashSet::new()); // terminal
	m
});

/// Checks if a state transition is valid
pub fn is_valid_transition(from: OrderStatus, to: OrderStatus) -> bool {
	TRANSITIONS
		.get(&from)
		.is_some_and(|set| set.contains(&to))
}

/// Statuses an order in `from` may move to, in lifecycle order.
pub fn next_statuses(from: OrderStatus) -> Vec<OrderStatus> {
	OrderStatus::ALL
		.into_iter()
		.filter(|to| is_valid_transition(from, *to))
		.collect()
}

/// Builds the update request for a transition, enforcing the table and the
/// cancel reason requirement. A reason given for any other target is dropped.
pub fn build_update(
	from: OrderStatus,
	to: OrderStatus,
	reason: Option<&str>,
) -> Result<UpdateStatusRequest, StatusTransitionError> {
	if !is_valid_transition(from, to) {
		return Err(StatusTransitionError::InvalidTransition { from, to });
	}

	let cancel_reason = match to {
		OrderStatus::Cancelled => {
			let reason = reason
				.map(str::trim)
				.filter(|r| !r.is_empty())
				.ok_or(StatusTransitionError::MissingCancelReason)?;
			Some(reason.to_string())
		},
		_ => None,
	};

	Ok(UpdateStatusRequest {
		status: to,
		cancel_reason,
	})
}
