//! Command execution against a built tracker.

use crate::render;
use crate::Command;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracker_core::{CancelOutcome, OrderTracker, PaymentOutcome};
use tracker_types::{
	truncate_id, CancelReason, Navigation, PaymentEvent, PaymentView, StatusFilter, TrackerEvent,
};

type CommandResult = Result<(), Box<dyn std::error::Error>>;

/// Runs one command and prints its outcome to stdout.
pub async fn run(tracker: &OrderTracker, command: Command) -> CommandResult {
	match command {
		Command::List { status } => {
			if load(tracker).await {
				let views = tracker.views(StatusFilter::parse(&status)).await;
				print!("{}", render::order_table(&views));
			}
		},
		Command::History { status } => {
			if load(tracker).await {
				let orders = tracker.history(StatusFilter::parse(&status)).await;
				print!("{}", render::history_table(&orders));
			}
		},
		Command::Show { order_id } => match tracker.order_detail(&order_id).await? {
			Navigation::Ok(order) => {
				if order.awaits_online_payment() {
					if let Navigation::Redirect { to } =
						tracker.check_payment_timeout(&order.id).await
					{
						print_redirect(&to);
						return Ok(());
					}
				}
				print!("{}", render::order_detail(&tracker.view(&order)));
			},
			Navigation::Redirect { to } => print_redirect(&to),
		},
		Command::Watch => watch(tracker).await?,
		Command::Cancel {
			order_id,
			reason,
			custom,
		} => {
			if !load(tracker).await {
				return Ok(());
			}
			let reason = CancelReason::from_position(usize::from(reason))
				.ok_or_else(|| format!("Unknown cancel reason {}", reason))?;
			let mut notices = tracker.subscribe();
			match tracker
				.cancel_order(&order_id, reason, custom.as_deref())
				.await
			{
				Ok(Navigation::Ok(CancelOutcome::Cancelled)) => print_notices(&mut notices),
				Ok(Navigation::Ok(CancelOutcome::Failed { .. })) => {
					print_notices(&mut notices);
					return Err(format!("Order {} was not cancelled", order_id).into());
				},
				Ok(Navigation::Redirect { to }) => print_redirect(&to),
				// Form errors surface here before anything is sent
				Err(e) => return Err(e.into()),
			}
		},
		Command::Pay { order_id } => {
			if !load(tracker).await {
				return Ok(());
			}
			let mut notices = tracker.subscribe();
			match tracker.initiate_payment(&order_id).await? {
				Navigation::Ok(PaymentOutcome::Redirect { url }) => {
					print_notices(&mut notices);
					println!("Continue payment at: {}", url);
				},
				Navigation::Ok(PaymentOutcome::Expired) | Navigation::Ok(PaymentOutcome::Failed) => {
					print_notices(&mut notices);
				},
				Navigation::Redirect { to } => print_redirect(&to),
			}
		},
		Command::SetStatus {
			order_id,
			status,
			reason,
		} => {
			let mut notices = tracker.subscribe();
			match tracker
				.update_status(&order_id, status, reason.as_deref())
				.await?
			{
				Navigation::Ok(_) => print_notices(&mut notices),
				Navigation::Redirect { to } => print_redirect(&to),
			}
		},
	}
	Ok(())
}

/// Loads the order list, printing a redirect when the session was rejected.
async fn load(tracker: &OrderTracker) -> bool {
	match tracker.load_orders().await {
		Navigation::Ok(_) => true,
		Navigation::Redirect { to } => {
			print_redirect(&to);
			false
		},
	}
}

fn print_redirect(to: &str) {
	println!("Session rejected, sign in again at {}", to);
}

/// Prints the notices of every event received so far.
fn print_notices(rx: &mut tokio::sync::broadcast::Receiver<TrackerEvent>) {
	while let Ok(event) = rx.try_recv() {
		if let Some(notice) = event.notice() {
			println!("{}", render::notice(&notice));
		}
	}
}

/// Shows the order list and re-renders it once per second while countdowns
/// run, printing notices as they arrive.
async fn watch(tracker: &OrderTracker) -> CommandResult {
	let mut events = tracker.subscribe();
	if !load(tracker).await {
		return Ok(());
	}
	print!("{}", render::order_table(&tracker.views(StatusFilter::All).await));

	let mut refresh = tokio::time::interval(Duration::from_secs(1));
	refresh.tick().await;
	while tracker.active_countdowns() > 0 {
		tokio::select! {
			event = events.recv() => match event {
				Ok(event) => {
					if let Some(notice) = event.notice() {
						println!("{}", render::notice(&notice));
					}
					if matches!(event, TrackerEvent::Payment(PaymentEvent::Expired { .. })) {
						print!("{}", render::order_table(&tracker.views(StatusFilter::All).await));
					}
				},
				Err(RecvError::Lagged(skipped)) => {
					tracing::warn!(skipped, "Event receiver lagged");
				},
				Err(RecvError::Closed) => break,
			},
			_ = refresh.tick() => {
				for view in tracker.views(StatusFilter::All).await {
					if let PaymentView::Countdown { .. } = view.payment {
						println!("{}: {}", truncate_id(view.order_id()), view.payment);
					}
				}
			},
			_ = tokio::signal::ctrl_c() => {
				tracing::info!("Interrupted");
				break;
			},
		}
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use tracker_api::implementations::memory::{BackendCall, MemoryBackend};
	use tracker_api::BackendService;
	use tracker_core::EventBus;
	use tracker_types::{Order, OrderStatus, Session};

	fn order(id: &str, status: &str, method: &str) -> Order {
		Order {
			id: id.to_string(),
			status: Some(status.to_string()),
			payment_method: Some(method.to_string()),
			payment_status: Some("pending".to_string()),
			items: vec![],
			total_amount: None,
			created_at: None,
		}
	}

	fn tracker(memory: &MemoryBackend) -> OrderTracker {
		let service = BackendService::new(Box::new(memory.clone()), Session::anonymous(), "/login");
		OrderTracker::new(service, EventBus::new(64), Duration::from_secs(1))
	}

	#[tokio::test]
	async fn test_cancel_command_sends_reason() {
		let memory = MemoryBackend::with_orders(vec![order("O1", "pending", "cod")]);
		let tracker = tracker(&memory);

		run(
			&tracker,
			Command::Cancel {
				order_id: "O1".to_string(),
				reason: 6,
				custom: None,
			},
		)
		.await
		.unwrap();

		assert!(memory.calls().await.contains(&BackendCall::CancelOrder {
			order_id: "O1".to_string(),
			reason: "I no longer want to buy".to_string(),
		}));
		assert_eq!(
			memory.order("O1").await.unwrap().stage(),
			OrderStatus::Cancelled
		);
	}

	#[tokio::test]
	async fn test_cancel_other_without_text_fails_locally() {
		let memory = MemoryBackend::with_orders(vec![order("O1", "pending", "cod")]);
		let tracker = tracker(&memory);

		let result = run(
			&tracker,
			Command::Cancel {
				order_id: "O1".to_string(),
				reason: 7,
				custom: None,
			},
		)
		.await;
		assert!(result.is_err());
		assert_eq!(
			memory
				.count_calls(|c| matches!(c, BackendCall::CancelOrder { .. }))
				.await,
			0
		);
	}

	#[tokio::test]
	async fn test_set_status_rejects_invalid_transition() {
		let memory = MemoryBackend::with_orders(vec![order("O1", "completed", "cod")]);
		let tracker = tracker(&memory);

		let result = run(
			&tracker,
			Command::SetStatus {
				order_id: "O1".to_string(),
				status: OrderStatus::Pending,
				reason: None,
			},
		)
		.await;
		assert!(result.is_err());
	}

	#[tokio::test]
	async fn test_watch_returns_without_countdowns() {
		let memory = MemoryBackend::with_orders(vec![order("O1", "pending", "cod")]);
		let tracker = tracker(&memory);
		run(&tracker, Command::Watch).await.unwrap();
	}
}
