//! Event bus for broadcasting tracker events.
//!
//! Thin wrapper over a tokio broadcast channel. Publishing with no subscriber
//! is not an error worth acting on, so callers usually discard the result.

use tokio::sync::broadcast;
use tracker_types::TrackerEvent;

#[derive(Clone)]
pub struct EventBus {
	sender: broadcast::Sender<TrackerEvent>,
}

impl EventBus {
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity);
		Self { sender }
	}

	pub fn subscribe(&self) -> broadcast::Receiver<TrackerEvent> {
		self.sender.subscribe()
	}

	/// Publishes an event to every current subscriber.
	pub fn publish(
		&self,
		event: TrackerEvent,
	) -> Result<(), broadcast::error::SendError<TrackerEvent>> {
		self.sender.send(event)?;
		Ok(())
	}
}
