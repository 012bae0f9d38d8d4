//! The order tracker.
//!
//! Owns the current order list, the payment countdowns and the handlers, and
//! exposes the operations behind the customer and staff order pages. The list
//! is replaced wholesale on every load; nothing mutates it in place.

pub mod event_bus;
pub mod lifecycle;

use crate::handlers::{
	CancelOutcome, CancelStage, CancellationHandler, PaymentHandler, PaymentOutcome,
	StatusHandler,
};
use crate::monitoring::PaymentTimers;
use crate::view::OrderView;
use crate::TrackerError;
use event_bus::EventBus;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};
use tracing::instrument;
use tracker_api::{ApiError, BackendService};
use tracker_types::{
	truncate_id, CancelReason, Navigation, Order, OrderStatus, OrdersEvent, PaymentView,
	PaymentWindow, StatusFilter, TrackerEvent,
};

/// Tracker for the orders of one session.
pub struct OrderTracker {
	backend: Arc<BackendService>,
	orders: RwLock<Vec<Order>>,
	timers: Arc<PaymentTimers>,
	payments: PaymentHandler,
	cancellations: CancellationHandler,
	status: StatusHandler,
	event_bus: EventBus,
}

impl OrderTracker {
	pub fn new(backend: BackendService, event_bus: EventBus, tick: Duration) -> Self {
		let backend = Arc::new(backend);
		let timers = Arc::new(PaymentTimers::new(event_bus.clone(), tick));

		let payments = PaymentHandler::new(backend.clone(), timers.clone(), event_bus.clone());
		let cancellations = CancellationHandler::new(backend.clone(), event_bus.clone());
		let status = StatusHandler::new(backend.clone(), event_bus.clone());

		Self {
			backend,
			orders: RwLock::new(Vec::new()),
			timers,
			payments,
			cancellations,
			status,
			event_bus,
		}
	}

	pub fn event_bus(&self) -> &EventBus {
		&self.event_bus
	}

	pub fn subscribe(&self) -> broadcast::Receiver<TrackerEvent> {
		self.event_bus.subscribe()
	}

	/// Fetches the order list, replacing the current one, and checks the
	/// payment window of every order awaiting an online payment.
	///
	/// A failed fetch leaves the list empty.
	#[instrument(skip_all)]
	pub async fn load_orders(&self) -> Navigation<usize> {
		self.refresh(false).await
	}

	async fn refresh(&self, keep_on_failure: bool) -> Navigation<usize> {
		let orders = match self.backend.list_my_orders().await {
			Ok(Navigation::Ok(orders)) => orders,
			Ok(Navigation::Redirect { to }) => return Navigation::Redirect { to },
			Err(e) => {
				tracing::warn!(error = %e, "Failed to load orders");
				self.event_bus
					.publish(TrackerEvent::Orders(OrdersEvent::LoadFailed {
						error: e.to_string(),
					}))
					.ok();
				if keep_on_failure {
					return Navigation::Ok(self.orders.read().await.len());
				}
				self.timers.reset();
				self.orders.write().await.clear();
				return Navigation::Ok(0);
			},
		};

		let count = orders.len();
		let eligible: Vec<String> = orders
			.iter()
			.filter(|order| order.awaits_online_payment())
			.map(|order| order.id.clone())
			.collect();

		self.timers.reset();
		*self.orders.write().await = orders;
		tracing::info!(count, awaiting_payment = eligible.len(), "Orders loaded");

		for order_id in &eligible {
			if let Navigation::Redirect { to } = self.payments.check_timeout(order_id).await {
				return Navigation::Redirect { to };
			}
		}

		self.event_bus
			.publish(TrackerEvent::Orders(OrdersEvent::Loaded { count }))
			.ok();
		Navigation::Ok(count)
	}

	/// Snapshot of the current order list, in backend order.
	pub async fn orders(&self) -> Vec<Order> {
		self.orders.read().await.clone()
	}

	pub async fn find_order(&self, order_id: &str) -> Option<Order> {
		self.orders
			.read()
			.await
			.iter()
			.find(|order| order.id == order_id)
			.cloned()
	}

	async fn require_order(&self, order_id: &str) -> Result<Order, TrackerError> {
		self.find_order(order_id)
			.await
			.ok_or_else(|| TrackerError::OrderNotFound(order_id.to_string()))
	}

	/// Fetches a single order from the backend.
	#[instrument(skip_all, fields(order_id = %truncate_id(order_id)))]
	pub async fn order_detail(&self, order_id: &str) -> Result<Navigation<Order>, TrackerError> {
		self.backend.get_order(order_id).await.map_err(|e| match e {
			ApiError::NotFound(_) => TrackerError::OrderNotFound(order_id.to_string()),
			e => TrackerError::Api(e.to_string()),
		})
	}

	/// Orders matching the filter, newest first. Orders without a creation
	/// time go last.
	pub async fn history(&self, filter: StatusFilter) -> Vec<Order> {
		let mut orders: Vec<Order> = self
			.orders
			.read()
			.await
			.iter()
			.filter(|order| filter.matches(order))
			.cloned()
			.collect();
		orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
		orders
	}

	pub fn payment_view(&self, order: &Order) -> PaymentView {
		if order.payment_status().is_success() {
			return PaymentView::Paid;
		}
		if !order.awaits_online_payment() {
			return PaymentView::NotApplicable;
		}
		match self.timers.window(&order.id) {
			Some(PaymentWindow::Expired) => PaymentView::Expired,
			Some(PaymentWindow::Open { seconds_left }) => PaymentView::Countdown { seconds_left },
			None => PaymentView::Unknown,
		}
	}

	/// Number of payment countdowns still running.
	pub fn active_countdowns(&self) -> usize {
		self.timers.active_count()
	}

	pub fn can_pay(&self, order: &Order) -> bool {
		self.payments.can_pay(order)
	}

	pub fn can_cancel(&self, order: &Order) -> bool {
		order.stage() == OrderStatus::Pending && !self.cancellations.is_submitting(&order.id)
	}

	pub fn view(&self, order: &Order) -> OrderView {
		OrderView {
			order: order.clone(),
			stage: order.stage(),
			payment: self.payment_view(order),
			total: order.items_total_excluding_deleted(),
			can_pay: self.can_pay(order),
			can_cancel: self.can_cancel(order),
		}
	}

	/// Views of the orders matching the filter, in backend order.
	pub async fn views(&self, filter: StatusFilter) -> Vec<OrderView> {
		self.orders
			.read()
			.await
			.iter()
			.filter(|order| filter.matches(order))
			.map(|order| self.view(order))
			.collect()
	}

	/// Re-checks the payment window of one order.
	pub async fn check_payment_timeout(&self, order_id: &str) -> Navigation<()> {
		self.payments.check_timeout(order_id).await
	}

	pub async fn initiate_payment(
		&self,
		order_id: &str,
	) -> Result<Navigation<PaymentOutcome>, TrackerError> {
		let order = self.require_order(order_id).await?;
		self.payments.initiate(&order).await
	}

	pub async fn begin_cancel(&self, order_id: &str) -> Result<(), TrackerError> {
		let order = self.require_order(order_id).await?;
		self.cancellations.begin(&order)
	}

	pub fn select_cancel_reason(
		&self,
		order_id: &str,
		reason: CancelReason,
		custom_reason: Option<&str>,
	) -> Result<(), TrackerError> {
		self.cancellations
			.select_reason(order_id, reason, custom_reason)
	}

	pub fn abandon_cancel(&self, order_id: &str) {
		self.cancellations.abandon(order_id);
	}

	pub fn cancel_stage(&self, order_id: &str) -> CancelStage {
		self.cancellations.stage(order_id)
	}

	/// Submits the open cancel form. A successful cancellation re-fetches the
	/// order list once; if that fetch fails the previous list is kept.
	pub async fn submit_cancel(
		&self,
		order_id: &str,
	) -> Result<Navigation<CancelOutcome>, TrackerError> {
		let outcome = self.cancellations.submit(order_id).await?;
		if outcome == Navigation::Ok(CancelOutcome::Cancelled) {
			if let Navigation::Redirect { to } = self.refresh(true).await {
				return Ok(Navigation::Redirect { to });
			}
		}
		Ok(outcome)
	}

	/// Runs the whole cancel flow for one order.
	pub async fn cancel_order(
		&self,
		order_id: &str,
		reason: CancelReason,
		custom_reason: Option<&str>,
	) -> Result<Navigation<CancelOutcome>, TrackerError> {
		self.begin_cancel(order_id).await?;
		if let Err(e) = self.select_cancel_reason(order_id, reason, custom_reason) {
			self.abandon_cancel(order_id);
			return Err(e);
		}
		self.submit_cancel(order_id).await
	}

	/// Moves an order to a new status on behalf of staff.
	///
	/// The order is taken from the current list, or fetched when absent.
	pub async fn update_status(
		&self,
		order_id: &str,
		to: OrderStatus,
		reason: Option<&str>,
	) -> Result<Navigation<bool>, TrackerError> {
		let order = match self.find_order(order_id).await {
			Some(order) => order,
			None => match self.order_detail(order_id).await? {
				Navigation::Ok(order) => order,
				Navigation::Redirect { to } => return Ok(Navigation::Redirect { to }),
			},
		};

		let result = self.status.update(&order, to, reason).await?;
		if result == Navigation::Ok(true) {
			if to.is_terminal() {
				self.timers.cancel(order_id);
			}
			let mut orders = self.orders.write().await;
			let updated: Vec<Order> = orders
				.iter()
				.cloned()
				.map(|mut o| {
					if o.id == order_id {
						o.status = Some(to.as_str().to_string());
					}
					o
				})
				.collect();
			*orders = updated;
		}
		Ok(result)
	}
}
