//! Cancellation handler for customer-initiated cancellations.
//!
//! Each order has its own cancel flow: `Idle -> ReasonSelection -> Submitting`,
//! ending back in `Idle` on success or in `ReasonSelection` with the form and
//! an error preserved on failure. A flow that is submitting rejects further
//! submissions without contacting the backend.

use crate::engine::event_bus::EventBus;
use crate::TrackerError;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::instrument;
use tracker_api::BackendService;
use tracker_types::{
	truncate_id, CancelReason, CancelRequest, CancellationEvent, Navigation, Order, OrderStatus,
	TrackerEvent,
};

/// Where an order's cancel flow currently is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelStage {
	Idle,
	ReasonSelection {
		request: CancelRequest,
		/// Inline error from the last failed validation or submission.
		error: Option<String>,
	},
	Submitting,
}

/// Result of a submitted cancellation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelOutcome {
	Cancelled,
	/// The backend refused or could not be reached; the form is kept.
	Failed { error: String },
}

enum Flow {
	Selecting {
		request: CancelRequest,
		error: Option<String>,
	},
	Submitting(CancelRequest),
}

pub struct CancellationHandler {
	backend: Arc<BackendService>,
	event_bus: EventBus,
	flows: Mutex<HashMap<String, Flow>>,
}

impl CancellationHandler {
	pub fn new(backend: Arc<BackendService>, event_bus: EventBus) -> Self {
		Self {
			backend,
			event_bus,
			flows: Mutex::new(HashMap::new()),
		}
	}

	fn flows(&self) -> MutexGuard<'_, HashMap<String, Flow>> {
		self.flows.lock().unwrap_or_else(PoisonError::into_inner)
	}

	pub fn stage(&self, order_id: &str) -> CancelStage {
		match self.flows().get(order_id) {
			None => CancelStage::Idle,
			Some(Flow::Selecting { request, error }) => CancelStage::ReasonSelection {
				request: request.clone(),
				error: error.clone(),
			},
			Some(Flow::Submitting(_)) => CancelStage::Submitting,
		}
	}

	pub fn is_submitting(&self, order_id: &str) -> bool {
		matches!(self.flows().get(order_id), Some(Flow::Submitting(_)))
	}

	/// Opens the cancel form for a pending order.
	pub fn begin(&self, order: &Order) -> Result<(), TrackerError> {
		let status = order.stage();
		if status != OrderStatus::Pending {
			return Err(TrackerError::NotCancellable {
				order_id: order.id.clone(),
				status,
			});
		}

		let mut flows = self.flows();
		match flows.get(&order.id) {
			Some(Flow::Submitting(_)) => Err(TrackerError::CancelInProgress(order.id.clone())),
			Some(Flow::Selecting { .. }) => Ok(()),
			None => {
				flows.insert(
					order.id.clone(),
					Flow::Selecting {
						request: CancelRequest::new(order.id.clone()),
						error: None,
					},
				);
				Ok(())
			},
		}
	}

	/// Records the chosen reason and free text on an open form.
	pub fn select_reason(
		&self,
		order_id: &str,
		reason: CancelReason,
		custom_reason: Option<&str>,
	) -> Result<(), TrackerError> {
		match self.flows().get_mut(order_id) {
			Some(Flow::Selecting { request, error }) => {
				request.reason = Some(reason);
				request.custom_reason = custom_reason.unwrap_or_default().to_string();
				*error = None;
				Ok(())
			},
			Some(Flow::Submitting(_)) => Err(TrackerError::CancelInProgress(order_id.to_string())),
			None => Err(TrackerError::NoCancellation(order_id.to_string())),
		}
	}

	/// Closes an open form. A submission in flight is left alone.
	pub fn abandon(&self, order_id: &str) {
		let mut flows = self.flows();
		if matches!(flows.get(order_id), Some(Flow::Selecting { .. })) {
			flows.remove(order_id);
		}
	}

	/// Validates the form and sends the cancel request.
	#[instrument(skip_all, fields(order_id = %truncate_id(order_id)))]
	pub async fn submit(&self, order_id: &str) -> Result<Navigation<CancelOutcome>, TrackerError> {
		let (request, reason) = {
			let mut flows = self.flows();
			let flow = flows
				.remove(order_id)
				.ok_or_else(|| TrackerError::NoCancellation(order_id.to_string()))?;
			match flow {
				Flow::Submitting(request) => {
					flows.insert(order_id.to_string(), Flow::Submitting(request));
					tracing::debug!("Cancellation already in flight");
					return Err(TrackerError::CancelInProgress(order_id.to_string()));
				},
				Flow::Selecting { request, .. } => match request.submission_reason() {
					Ok(reason) => {
						flows.insert(order_id.to_string(), Flow::Submitting(request.clone()));
						(request, reason)
					},
					Err(e) => {
						flows.insert(
							order_id.to_string(),
							Flow::Selecting {
								request,
								error: Some(e.to_string()),
							},
						);
						return Err(TrackerError::InvalidCancelRequest(e));
					},
				},
			}
		};

		self.event_bus
			.publish(TrackerEvent::Cancellation(CancellationEvent::Submitted {
				order_id: order_id.to_string(),
				reason: reason.clone(),
			}))
			.ok();

		match self.backend.cancel_order(order_id, &reason).await {
			Ok(Navigation::Ok(())) => {
				self.flows().remove(order_id);
				tracing::info!("Order cancelled");
				self.event_bus
					.publish(TrackerEvent::Cancellation(CancellationEvent::Succeeded {
						order_id: order_id.to_string(),
					}))
					.ok();
				Ok(Navigation::Ok(CancelOutcome::Cancelled))
			},
			Ok(Navigation::Redirect { to }) => {
				self.flows().remove(order_id);
				Ok(Navigation::Redirect { to })
			},
			Err(e) => {
				tracing::warn!(error = %e, "Cancellation failed");
				let error = e.to_string();
				self.flows().insert(
					order_id.to_string(),
					Flow::Selecting {
						request,
						error: Some(error.clone()),
					},
				);
				self.event_bus
					.publish(TrackerEvent::Cancellation(CancellationEvent::Failed {
						order_id: order_id.to_string(),
						error: error.clone(),
					}))
					.ok();
				Ok(Navigation::Ok(CancelOutcome::Failed { error }))
			},
		}
	}
}
