//! Status handler for staff-driven order status updates.

use crate::engine::event_bus::EventBus;
use crate::state::build_update;
use crate::TrackerError;
use std::sync::Arc;
use tracing::instrument;
use tracker_api::BackendService;
use tracker_types::{truncate_id, Navigation, Order, OrderStatus, StatusEvent, TrackerEvent};

pub struct StatusHandler {
	backend: Arc<BackendService>,
	event_bus: EventBus,
}

impl StatusHandler {
	pub fn new(backend: Arc<BackendService>, event_bus: EventBus) -> Self {
		Self { backend, event_bus }
	}

	/// Moves an order to a new status.
	///
	/// Transitions outside the lifecycle and cancellations without a reason are
	/// rejected before any request is sent. Backend failures are published and
	/// returned as `Ok(false)`.
	#[instrument(skip_all, fields(order_id = %truncate_id(&order.id), to = %to))]
	pub async fn update(
		&self,
		order: &Order,
		to: OrderStatus,
		reason: Option<&str>,
	) -> Result<Navigation<bool>, TrackerError> {
		let request = build_update(order.stage(), to, reason)?;

		match self.backend.update_order_status(&order.id, &request).await {
			Ok(Navigation::Ok(())) => {
				tracing::info!("Order status updated");
				self.event_bus
					.publish(TrackerEvent::Status(StatusEvent::Updated {
						order_id: order.id.clone(),
						status: to,
					}))
					.ok();
				Ok(Navigation::Ok(true))
			},
			Ok(Navigation::Redirect { to }) => Ok(Navigation::Redirect { to }),
			Err(e) => {
				tracing::warn!(error = %e, "Status update failed");
				self.event_bus
					.publish(TrackerEvent::Status(StatusEvent::UpdateFailed {
						order_id: order.id.clone(),
						error: e.to_string(),
					}))
					.ok();
				Ok(Navigation::Ok(false))
			},
		}
	}
}
