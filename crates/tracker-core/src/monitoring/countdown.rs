//! Payment countdowns for orders awaiting an online or bank payment.
//!
//! Each order gets its own countdown task that decrements the remaining
//! seconds once per tick. The tick that reaches zero removes the countdown,
//! records the order as expired and publishes a single expiry event, all under
//! one lock acquisition. Tasks are aborted when their countdown is cancelled,
//! replaced, or when the timers themselves are dropped.

use crate::engine::event_bus::EventBus;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracker_types::{truncate_id, PaymentEvent, PaymentWindow, TrackerEvent};

struct Countdown {
	seconds_left: u64,
	/// Distinguishes a replacement countdown from the one it replaced.
	generation: u64,
	handle: JoinHandle<()>,
}

#[derive(Default)]
struct TimerState {
	countdowns: HashMap<String, Countdown>,
	expired: HashSet<String>,
	next_generation: u64,
}

fn lock(state: &Mutex<TimerState>) -> MutexGuard<'_, TimerState> {
	state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Countdowns of every order tracked by one tracker instance.
pub struct PaymentTimers {
	state: Arc<Mutex<TimerState>>,
	event_bus: EventBus,
	tick: Duration,
}

impl PaymentTimers {
	pub fn new(event_bus: EventBus, tick: Duration) -> Self {
		Self {
			state: Arc::new(Mutex::new(TimerState::default())),
			event_bus,
			tick,
		}
	}

	/// Starts a countdown for an order, replacing any running one.
	///
	/// A zero-second window is recorded as expired without a countdown.
	pub fn start(&self, order_id: &str, seconds: u64) {
		if seconds == 0 {
			self.mark_expired(order_id);
			return;
		}

		let mut state = lock(&self.state);
		if let Some(previous) = state.countdowns.remove(order_id) {
			previous.handle.abort();
		}
		state.expired.remove(order_id);
		state.next_generation += 1;
		let generation = state.next_generation;

		let handle = tokio::spawn(run_countdown(
			Arc::clone(&self.state),
			self.event_bus.clone(),
			order_id.to_string(),
			generation,
			self.tick,
		));
		state.countdowns.insert(
			order_id.to_string(),
			Countdown {
				seconds_left: seconds,
				generation,
				handle,
			},
		);
		drop(state);

		tracing::debug!(order_id = %truncate_id(order_id), seconds, "Payment countdown started");
		self.event_bus
			.publish(TrackerEvent::Payment(PaymentEvent::CountdownStarted {
				order_id: order_id.to_string(),
				seconds,
			}))
			.ok();
	}

	/// Stops the countdown of an order, if one is running.
	pub fn cancel(&self, order_id: &str) {
		if let Some(countdown) = lock(&self.state).countdowns.remove(order_id) {
			countdown.handle.abort();
		}
	}

	/// Stops every countdown. Expired orders stay expired.
	pub fn cancel_all(&self) {
		let mut state = lock(&self.state);
		for (_, countdown) in state.countdowns.drain() {
			countdown.handle.abort();
		}
	}

	/// Stops every countdown and forgets which orders expired.
	pub fn reset(&self) {
		self.cancel_all();
		lock(&self.state).expired.clear();
	}

	/// Records an order as expired without publishing an event.
	pub fn mark_expired(&self, order_id: &str) {
		let mut state = lock(&self.state);
		if let Some(countdown) = state.countdowns.remove(order_id) {
			countdown.handle.abort();
		}
		state.expired.insert(order_id.to_string());
	}

	/// Current window of an order as far as the timers know.
	pub fn window(&self, order_id: &str) -> Option<PaymentWindow> {
		let state = lock(&self.state);
		if state.expired.contains(order_id) {
			return Some(PaymentWindow::Expired);
		}
		state
			.countdowns
			.get(order_id)
			.map(|countdown| PaymentWindow::Open {
				seconds_left: countdown.seconds_left,
			})
	}

	pub fn is_expired(&self, order_id: &str) -> bool {
		lock(&self.state).expired.contains(order_id)
	}

	pub fn active_count(&self) -> usize {
		lock(&self.state).countdowns.len()
	}
}

impl Drop for PaymentTimers {
	fn drop(&mut self) {
		self.cancel_all();
	}
}

/// Ticks one countdown until it expires or is replaced.
async fn run_countdown(
	state: Arc<Mutex<TimerState>>,
	event_bus: EventBus,
	order_id: String,
	generation: u64,
	tick: Duration,
) {
	let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + tick, tick);
	loop {
		interval.tick().await;

		let expired = {
			let mut state = lock(&state);
			let Some(countdown) = state.countdowns.get_mut(&order_id) else {
				return;
			};
			if countdown.generation != generation {
				return;
			}
			countdown.seconds_left = countdown.seconds_left.saturating_sub(1);
			if countdown.seconds_left == 0 {
				state.countdowns.remove(&order_id);
				state.expired.insert(order_id.clone());
				true
			} else {
				false
			}
		};

		if expired {
			tracing::info!(order_id = %truncate_id(&order_id), "Payment window expired");
			event_bus
				.publish(TrackerEvent::Payment(PaymentEvent::Expired { order_id }))
				.ok();
			return;
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use tokio::sync::broadcast::error::TryRecvError;

	const TICK: Duration = Duration::from_secs(1);

	fn expiry_count(rx: &mut tokio::sync::broadcast::Receiver<TrackerEvent>) -> usize {
		let mut count = 0;
		loop {
			match rx.try_recv() {
				Ok(TrackerEvent::Payment(PaymentEvent::Expired { .. })) => count += 1,
				Ok(_) => {},
				Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return count,
				Err(TryRecvError::Lagged(_)) => {},
			}
		}
	}

	#[tokio::test(start_paused = true)]
	async fn test_countdown_expires_once() {
		let bus = EventBus::new(16);
		let mut rx = bus.subscribe();
		let timers = PaymentTimers::new(bus, TICK);

		timers.start("O1", 5);
		assert_eq!(
			timers.window("O1"),
			Some(PaymentWindow::Open { seconds_left: 5 })
		);

		tokio::time::sleep(Duration::from_millis(4500)).await;
		assert_eq!(
			timers.window("O1"),
			Some(PaymentWindow::Open { seconds_left: 1 })
		);
		assert_eq!(expiry_count(&mut rx), 0);

		tokio::time::sleep(TICK).await;
		assert_eq!(timers.window("O1"), Some(PaymentWindow::Expired));
		assert_eq!(timers.active_count(), 0);
		assert_eq!(expiry_count(&mut rx), 1);

		// A further tick does not fire again
		tokio::time::sleep(TICK * 3).await;
		assert_eq!(expiry_count(&mut rx), 0);
	}

	#[tokio::test(start_paused = true)]
	async fn test_restart_replaces_countdown() {
		let bus = EventBus::new(16);
		let mut rx = bus.subscribe();
		let timers = PaymentTimers::new(bus, TICK);

		timers.start("O1", 2);
		tokio::time::sleep(Duration::from_millis(1500)).await;
		timers.start("O1", 10);

		// Sample between ticks of the new countdown
		tokio::time::sleep(Duration::from_millis(3500)).await;
		assert_eq!(
			timers.window("O1"),
			Some(PaymentWindow::Open { seconds_left: 7 })
		);
		assert_eq!(expiry_count(&mut rx), 0);
	}

	#[tokio::test(start_paused = true)]
	async fn test_cancel_stops_countdown() {
		let bus = EventBus::new(16);
		let mut rx = bus.subscribe();
		let timers = PaymentTimers::new(bus, TICK);

		timers.start("O1", 2);
		timers.start("O2", 2);
		timers.cancel("O1");

		tokio::time::sleep(Duration::from_secs(5)).await;
		assert_eq!(timers.window("O1"), None);
		assert_eq!(timers.window("O2"), Some(PaymentWindow::Expired));
		assert_eq!(expiry_count(&mut rx), 1);
	}

	#[tokio::test(start_paused = true)]
	async fn test_drop_aborts_tasks() {
		let bus = EventBus::new(16);
		let mut rx = bus.subscribe();
		let timers = PaymentTimers::new(bus.clone(), TICK);

		timers.start("O1", 1);
		drop(timers);

		tokio::time::sleep(Duration::from_secs(3)).await;
		assert_eq!(expiry_count(&mut rx), 0);
	}

	#[tokio::test]
	async fn test_zero_seconds_is_expired() {
		let timers = PaymentTimers::new(EventBus::new(4), TICK);
		timers.start("O1", 0);
		assert!(timers.is_expired("O1"));
		assert_eq!(timers.active_count(), 0);

		timers.reset();
		assert_eq!(timers.window("O1"), None);
	}
}
