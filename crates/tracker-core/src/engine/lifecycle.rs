//! Lifecycle management for the order tracker.
//!
//! Countdown tasks are aborted when the tracker is dropped; `shutdown` lets a
//! front end release them explicitly while keeping the tracker around.

use super::OrderTracker;

impl OrderTracker {
	/// Stops every payment countdown.
	pub async fn shutdown(&self) {
		tracing::info!(
			active_countdowns = self.timers.active_count(),
			"Shutting down order tracker"
		);
		self.timers.reset();
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::engine::event_bus::EventBus;
	use std::time::Duration;
	use tracker_api::implementations::memory::MemoryBackend;
	use tracker_api::BackendService;
	use tracker_types::{Order, PaymentView, Session};

	#[tokio::test(start_paused = true)]
	async fn test_shutdown_stops_countdowns() {
		let memory = MemoryBackend::with_orders(vec![Order {
			id: "O1".to_string(),
			status: Some("pending".to_string()),
			payment_method: Some("bank".to_string()),
			payment_status: Some("pending".to_string()),
			items: vec![],
			total_amount: None,
			created_at: None,
		}]);
		memory.set_time_left("O1", 3.0).await;
		let service = BackendService::new(Box::new(memory), Session::anonymous(), "/login");
		let tracker = OrderTracker::new(service, EventBus::new(16), Duration::from_secs(1));
		let mut rx = tracker.subscribe();

		tracker.load_orders().await;
		tracker.shutdown().await;
		tokio::time::sleep(Duration::from_secs(5)).await;

		let o1 = tracker.find_order("O1").await.unwrap();
		assert_eq!(tracker.payment_view(&o1), PaymentView::Unknown);
		while let Ok(event) = rx.try_recv() {
			assert!(event.notice().is_none());
		}
	}
}
