//! Payment handler for window checks and payment initiation.
//!
//! Asks the backend how long an order's payment window has left, starts or
//! stops its countdown accordingly, and starts payments with the provider.

use crate::engine::event_bus::EventBus;
use crate::monitoring::PaymentTimers;
use crate::TrackerError;
use std::sync::Arc;
use tracing::instrument;
use tracker_api::BackendService;
use tracker_types::{
	truncate_id, CreatePaymentRequest, Navigation, Order, PaymentEvent, PaymentWindow,
	TrackerEvent,
};

/// Result of starting a payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentOutcome {
	/// The caller should send the customer to the payment provider.
	Redirect { url: String },
	/// The backend reported the payment window closed.
	Expired,
	/// No URL was issued or the request failed.
	Failed,
}

pub struct PaymentHandler {
	backend: Arc<BackendService>,
	timers: Arc<PaymentTimers>,
	event_bus: EventBus,
}

impl PaymentHandler {
	pub fn new(backend: Arc<BackendService>, timers: Arc<PaymentTimers>, event_bus: EventBus) -> Self {
		Self {
			backend,
			timers,
			event_bus,
		}
	}

	/// Checks the payment window of an order and starts its countdown.
	///
	/// Failures are logged and published but never returned. An order with no
	/// countdown stays in the unknown state; a countdown already running from an
	/// earlier check keeps running, since a failed re-check says nothing new
	/// about the window.
	#[instrument(skip_all, fields(order_id = %truncate_id(order_id)))]
	pub async fn check_timeout(&self, order_id: &str) -> Navigation<()> {
		let response = match self.backend.payment_status(order_id).await {
			Ok(Navigation::Ok(response)) => response,
			Ok(Navigation::Redirect { to }) => return Navigation::Redirect { to },
			Err(e) => {
				tracing::warn!(error = %e, "Payment status check failed");
				self.check_failed(order_id, e.to_string());
				return Navigation::Ok(());
			},
		};

		match response.window() {
			Some(PaymentWindow::Open { seconds_left }) => {
				self.timers.start(order_id, seconds_left);
			},
			Some(PaymentWindow::Expired) => {
				tracing::debug!("Payment window already closed");
				self.timers.mark_expired(order_id);
			},
			None => {
				tracing::warn!("Backend reported an unsuccessful payment status check");
				self.check_failed(order_id, "backend reported failure".to_string());
			},
		}
		Navigation::Ok(())
	}

	fn check_failed(&self, order_id: &str, error: String) {
		self.event_bus
			.publish(TrackerEvent::Payment(PaymentEvent::CheckFailed {
				order_id: order_id.to_string(),
				error,
			}))
			.ok();
	}

	/// Whether a payment may be started for the order right now.
	pub fn can_pay(&self, order: &Order) -> bool {
		order.accepts_online_payment() && !self.timers.is_expired(&order.id)
	}

	/// Starts a payment with the provider.
	#[instrument(skip_all, fields(order_id = %truncate_id(&order.id)))]
	pub async fn initiate(&self, order: &Order) -> Result<Navigation<PaymentOutcome>, TrackerError> {
		if !self.can_pay(order) {
			return Err(TrackerError::NotPayable(order.id.clone()));
		}

		let request = CreatePaymentRequest {
			order_id: order.id.clone(),
			payment_method: order.payment_method.clone().unwrap_or_default(),
		};
		let response = match self.backend.create_payment(&request).await {
			Ok(Navigation::Ok(response)) => response,
			Ok(Navigation::Redirect { to }) => return Ok(Navigation::Redirect { to }),
			Err(e) => {
				tracing::warn!(error = %e, "Payment initiation failed");
				return Ok(Navigation::Ok(self.initiation_failed(&order.id)));
			},
		};

		if response.expired {
			tracing::info!("Payment window expired before payment started");
			self.timers.mark_expired(&order.id);
			self.event_bus
				.publish(TrackerEvent::Payment(PaymentEvent::Expired {
					order_id: order.id.clone(),
				}))
				.ok();
			return Ok(Navigation::Ok(PaymentOutcome::Expired));
		}

		match response.payment_url() {
			Some(url) => {
				tracing::info!("Payment provider URL issued");
				self.event_bus
					.publish(TrackerEvent::Payment(PaymentEvent::RedirectIssued {
						order_id: order.id.clone(),
						url: url.to_string(),
					}))
					.ok();
				Ok(Navigation::Ok(PaymentOutcome::Redirect {
					url: url.to_string(),
				}))
			},
			None => {
				tracing::warn!("Backend returned neither a payment URL nor an expiry");
				Ok(Navigation::Ok(self.initiation_failed(&order.id)))
			},
		}
	}

	fn initiation_failed(&self, order_id: &str) -> PaymentOutcome {
		self.event_bus
			.publish(TrackerEvent::Payment(PaymentEvent::InitiationFailed {
				order_id: order_id.to_string(),
			}))
			.ok();
		PaymentOutcome::Failed
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::time::Duration;
	use tracker_api::implementations::memory::{BackendCall, MemoryBackend};
	use tracker_types::{PaymentStatusResponse, Session};

	fn online_order(id: &str, method: &str) -> Order {
		Order {
			id: id.to_string(),
			status: Some("pending".to_string()),
			payment_method: Some(method.to_string()),
			payment_status: Some("pending".to_string()),
			items: vec![],
			total_amount: Some(250_000.0),
			created_at: None,
		}
	}

	fn handler(memory: &MemoryBackend, bus: &EventBus) -> (PaymentHandler, Arc<PaymentTimers>) {
		let backend = Arc::new(BackendService::new(
			Box::new(memory.clone()),
			Session::with_token("t"),
			"/login",
		));
		let timers = Arc::new(PaymentTimers::new(bus.clone(), Duration::from_secs(1)));
		(
			PaymentHandler::new(backend, timers.clone(), bus.clone()),
			timers,
		)
	}

	#[tokio::test]
	async fn test_check_starts_countdown() {
		let memory = MemoryBackend::new();
		memory.set_time_left("O1", 120.0).await;
		let bus = EventBus::new(16);
		let (handler, timers) = handler(&memory, &bus);

		handler.check_timeout("O1").await;
		assert_eq!(
			timers.window("O1"),
			Some(PaymentWindow::Open { seconds_left: 120 })
		);
	}

	#[tokio::test]
	async fn test_check_marks_expired_silently() {
		let memory = MemoryBackend::new();
		memory.set_time_left("O1", 0.0).await;
		let bus = EventBus::new(16);
		let mut rx = bus.subscribe();
		let (handler, timers) = handler(&memory, &bus);

		handler.check_timeout("O1").await;
		assert!(timers.is_expired("O1"));
		assert!(rx.try_recv().is_err());
	}

	#[tokio::test]
	async fn test_failed_check_leaves_unknown() {
		let memory = MemoryBackend::new();
		memory
			.set_payment_status(
				"O1",
				PaymentStatusResponse {
					success: false,
					data: None,
				},
			)
			.await;
		let bus = EventBus::new(16);
		let mut rx = bus.subscribe();
		let (handler, timers) = handler(&memory, &bus);

		assert_eq!(handler.check_timeout("O1").await, Navigation::Ok(()));
		assert_eq!(timers.window("O1"), None);
		assert!(matches!(
			rx.recv().await.unwrap(),
			TrackerEvent::Payment(PaymentEvent::CheckFailed { .. })
		));

		memory.set_offline(true).await;
		assert_eq!(handler.check_timeout("O1").await, Navigation::Ok(()));
		assert!(!timers.is_expired("O1"));
	}

	#[tokio::test(start_paused = true)]
	async fn test_failed_recheck_keeps_running_countdown() {
		let memory = MemoryBackend::new();
		memory.set_time_left("O1", 120.0).await;
		let bus = EventBus::new(16);
		let mut rx = bus.subscribe();
		let (handler, timers) = handler(&memory, &bus);

		handler.check_timeout("O1").await;
		tokio::time::sleep(Duration::from_millis(2500)).await;

		memory.set_offline(true).await;
		assert_eq!(handler.check_timeout("O1").await, Navigation::Ok(()));
		assert_eq!(
			timers.window("O1"),
			Some(PaymentWindow::Open { seconds_left: 118 })
		);
		assert_eq!(timers.active_count(), 1);

		let events: Vec<TrackerEvent> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
		assert!(events
			.iter()
			.any(|e| matches!(e, TrackerEvent::Payment(PaymentEvent::CheckFailed { .. }))));
	}

	#[tokio::test]
	async fn test_check_redirects_on_unauthorized() {
		let memory = MemoryBackend::new();
		memory.require_token("other").await;
		let bus = EventBus::new(16);
		let (handler, _timers) = handler(&memory, &bus);

		let result = handler.check_timeout("O1").await;
		assert_eq!(result.redirect_target(), Some("/login"));
	}

	#[tokio::test]
	async fn test_initiate_redirects_to_provider() {
		let memory = MemoryBackend::with_orders(vec![online_order("O1", "online")]);
		memory.set_payment_url("O1", "https://pay.example/O1").await;
		let bus = EventBus::new(16);
		let (handler, _timers) = handler(&memory, &bus);

		let outcome = handler
			.initiate(&online_order("O1", "online"))
			.await
			.unwrap();
		assert_eq!(
			outcome,
			Navigation::Ok(PaymentOutcome::Redirect {
				url: "https://pay.example/O1".to_string()
			})
		);
		assert_eq!(
			memory.calls().await,
			vec![BackendCall::CreatePayment {
				order_id: "O1".to_string(),
				payment_method: "online".to_string(),
			}]
		);
	}

	#[tokio::test]
	async fn test_initiate_expired_disables_payment() {
		let memory = MemoryBackend::with_orders(vec![online_order("O1", "bank")]);
		memory.set_time_left("O1", -1.0).await;
		let bus = EventBus::new(16);
		let mut rx = bus.subscribe();
		let (handler, _timers) = handler(&memory, &bus);
		let order = online_order("O1", "bank");

		let outcome = handler.initiate(&order).await.unwrap();
		assert_eq!(outcome, Navigation::Ok(PaymentOutcome::Expired));
		assert!(!handler.can_pay(&order));
		assert_eq!(
			rx.recv().await.unwrap(),
			TrackerEvent::Payment(PaymentEvent::Expired {
				order_id: "O1".to_string()
			})
		);

		let again = handler.initiate(&order).await;
		assert!(matches!(again, Err(TrackerError::NotPayable(_))));
	}

	#[tokio::test]
	async fn test_initiate_without_url_or_network_fails() {
		let memory = MemoryBackend::with_orders(vec![online_order("O1", "online")]);
		let bus = EventBus::new(16);
		let (handler, _timers) = handler(&memory, &bus);
		let order = online_order("O1", "online");

		let outcome = handler.initiate(&order).await.unwrap();
		assert_eq!(outcome, Navigation::Ok(PaymentOutcome::Failed));

		memory.set_offline(true).await;
		let outcome = handler.initiate(&order).await.unwrap();
		assert_eq!(outcome, Navigation::Ok(PaymentOutcome::Failed));
	}

	#[tokio::test]
	async fn test_cash_orders_cannot_pay() {
		let memory = MemoryBackend::new();
		let bus = EventBus::new(16);
		let (handler, _timers) = handler(&memory, &bus);

		let result = handler.initiate(&online_order("O1", "cod")).await;
		assert!(matches!(result, Err(TrackerError::NotPayable(_))));
		assert!(memory.calls().await.is_empty());
	}
}
