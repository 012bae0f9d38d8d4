//! In-memory backend implementation.
//!
//! Keeps orders and payment windows in process memory and records every call
//! it receives. Used for demos, offline runs of the CLI and tests. Clones share
//! the same state, so a test can keep one handle while the tracker owns another.

use crate::{ApiError, BackendInterface};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracker_types::{
	CancelOrderRequest, ConfigSchema, CreatePaymentData, CreatePaymentRequest,
	CreatePaymentResponse, Field, FieldType, Order, OrderListResponse, OrderStatus,
	PaymentStatusData, PaymentStatusResponse, Schema, Session, UpdateStatusRequest,
	ValidationError,
};

/// Name under which this implementation is registered.
pub const NAME: &str = "memory";

/// A call received by the memory backend.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
	ListMyOrders,
	GetOrder(String),
	CancelOrder {
		order_id: String,
		reason: String,
	},
	UpdateStatus {
		order_id: String,
		status: OrderStatus,
		cancel_reason: Option<String>,
	},
	PaymentStatus(String),
	CreatePayment {
		order_id: String,
		payment_method: String,
	},
}

#[derive(Default)]
struct MemoryState {
	orders: Vec<Order>,
	payment_windows: HashMap<String, PaymentStatusResponse>,
	payment_urls: HashMap<String, String>,
	/// Window reported for pending online orders without an explicit one.
	default_window_seconds: Option<f64>,
	checkout_url: Option<String>,
	required_token: Option<String>,
	offline: bool,
	calls: Vec<BackendCall>,
}

/// Backend that serves orders from memory.
#[derive(Clone, Default)]
pub struct MemoryBackend {
	state: Arc<RwLock<MemoryState>>,
}

impl MemoryBackend {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_orders(orders: Vec<Order>) -> Self {
		let state = MemoryState {
			orders,
			..Default::default()
		};
		Self {
			state: Arc::new(RwLock::new(state)),
		}
	}

	/// Inserts an order, replacing any order with the same id.
	pub async fn insert_order(&self, order: Order) {
		let mut state = self.state.write().await;
		match state.orders.iter_mut().find(|o| o.id == order.id) {
			Some(existing) => *existing = order,
			None => state.orders.push(order),
		}
	}

	pub async fn order(&self, order_id: &str) -> Option<Order> {
		let state = self.state.read().await;
		state.orders.iter().find(|o| o.id == order_id).cloned()
	}

	/// Sets the exact payment status response returned for an order.
	pub async fn set_payment_status(&self, order_id: &str, response: PaymentStatusResponse) {
		let mut state = self.state.write().await;
		state.payment_windows.insert(order_id.to_string(), response);
	}

	/// Reports an open window of `time_left` seconds for an order.
	pub async fn set_time_left(&self, order_id: &str, time_left: f64) {
		self.set_payment_status(
			order_id,
			PaymentStatusResponse {
				success: true,
				data: Some(PaymentStatusData {
					payment_expired: time_left <= 0.0,
					time_left,
				}),
			},
		)
		.await;
	}

	pub async fn set_payment_url(&self, order_id: &str, url: impl Into<String>) {
		let mut state = self.state.write().await;
		state.payment_urls.insert(order_id.to_string(), url.into());
	}

	/// Rejects every call whose session does not carry this token.
	pub async fn require_token(&self, token: impl Into<String>) {
		self.state.write().await.required_token = Some(token.into());
	}

	/// Makes every call fail as if the backend were unreachable.
	pub async fn set_offline(&self, offline: bool) {
		self.state.write().await.offline = offline;
	}

	/// All calls received so far, in order.
	pub async fn calls(&self) -> Vec<BackendCall> {
		self.state.read().await.calls.clone()
	}

	pub async fn count_calls<F>(&self, predicate: F) -> usize
	where
		F: Fn(&BackendCall) -> bool,
	{
		self.state
			.read()
			.await
			.calls
			.iter()
			.filter(|call| predicate(call))
			.count()
	}

	/// Records the call and applies the offline and token checks.
	async fn admit(&self, session: &Session, call: BackendCall) -> Result<(), ApiError> {
		let mut state = self.state.write().await;
		state.calls.push(call);

		if state.offline {
			return Err(ApiError::Network("backend offline".into()));
		}
		if let Some(required) = &state.required_token {
			let expected = format!("Bearer {}", required);
			if session.authorization_header().as_deref() != Some(expected.as_str()) {
				return Err(ApiError::Unauthorized);
			}
		}
		Ok(())
	}

	fn window_for(state: &MemoryState, order_id: &str) -> PaymentStatusResponse {
		if let Some(response) = state.payment_windows.get(order_id) {
			return response.clone();
		}
		let awaiting = state
			.orders
			.iter()
			.find(|o| o.id == order_id)
			.is_some_and(|o| o.awaits_online_payment());
		match (awaiting, state.default_window_seconds) {
			(true, Some(time_left)) => PaymentStatusResponse {
				success: true,
				data: Some(PaymentStatusData {
					payment_expired: false,
					time_left,
				}),
			},
			_ => PaymentStatusResponse {
				success: false,
				data: None,
			},
		}
	}
}

#[async_trait]
impl BackendInterface for MemoryBackend {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(MemoryBackendSchema)
	}

	async fn list_my_orders(&self, session: &Session) -> Result<Vec<Order>, ApiError> {
		self.admit(session, BackendCall::ListMyOrders).await?;
		Ok(self.state.read().await.orders.clone())
	}

	async fn get_order(&self, session: &Session, order_id: &str) -> Result<Order, ApiError> {
		self.admit(session, BackendCall::GetOrder(order_id.to_string()))
			.await?;
		self.order(order_id)
			.await
			.ok_or_else(|| ApiError::NotFound(format!("Order {} not found", order_id)))
	}

	async fn cancel_order(
		&self,
		session: &Session,
		order_id: &str,
		request: &CancelOrderRequest,
	) -> Result<(), ApiError> {
		self.admit(
			session,
			BackendCall::CancelOrder {
				order_id: order_id.to_string(),
				reason: request.reason.clone(),
			},
		)
		.await?;

		let mut state = self.state.write().await;
		let order = state
			.orders
			.iter_mut()
			.find(|o| o.id == order_id)
			.ok_or_else(|| ApiError::NotFound(format!("Order {} not found", order_id)))?;
		if order.stage() != OrderStatus::Pending {
			return Err(ApiError::Status {
				status: 409,
				message: format!("Order is already {}", order.stage()),
			});
		}
		order.status = Some(OrderStatus::Cancelled.as_str().to_string());
		Ok(())
	}

	async fn update_order_status(
		&self,
		session: &Session,
		order_id: &str,
		request: &UpdateStatusRequest,
	) -> Result<(), ApiError> {
		self.admit(
			session,
			BackendCall::UpdateStatus {
				order_id: order_id.to_string(),
				status: request.status,
				cancel_reason: request.cancel_reason.clone(),
			},
		)
		.await?;

		let mut state = self.state.write().await;
		let order = state
			.orders
			.iter_mut()
			.find(|o| o.id == order_id)
			.ok_or_else(|| ApiError::NotFound(format!("Order {} not found", order_id)))?;
		order.status = Some(request.status.as_str().to_string());
		Ok(())
	}

	async fn payment_status(
		&self,
		session: &Session,
		order_id: &str,
	) -> Result<PaymentStatusResponse, ApiError> {
		self.admit(session, BackendCall::PaymentStatus(order_id.to_string()))
			.await?;
		let state = self.state.read().await;
		Ok(Self::window_for(&state, order_id))
	}

	async fn create_payment(
		&self,
		session: &Session,
		request: &CreatePaymentRequest,
	) -> Result<CreatePaymentResponse, ApiError> {
		self.admit(
			session,
			BackendCall::CreatePayment {
				order_id: request.order_id.clone(),
				payment_method: request.payment_method.clone(),
			},
		)
		.await?;

		let state = self.state.read().await;
		let expired = Self::window_for(&state, &request.order_id)
			.window()
			.is_some_and(|w| w == tracker_types::PaymentWindow::Expired);
		if expired {
			return Ok(CreatePaymentResponse {
				expired: true,
				data: None,
			});
		}

		let url = state.payment_urls.get(&request.order_id).cloned().or_else(|| {
			state
				.checkout_url
				.as_ref()
				.map(|base| format!("{}/{}", base.trim_end_matches('/'), request.order_id))
		});
		Ok(CreatePaymentResponse {
			expired: false,
			data: url.map(|payment_url| CreatePaymentData {
				payment_url: Some(payment_url),
			}),
		})
	}
}

/// Configuration schema for the memory backend.
///
/// # Optional Fields
///
/// - `fixture` - Path to a JSON file with the initial order list
/// - `payment_window_seconds` - Window reported for pending online orders
/// - `checkout_url` - Base of the payment URLs handed out
pub struct MemoryBackendSchema;

impl ConfigSchema for MemoryBackendSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![],
			vec![
				Field::new("fixture", FieldType::String),
				Field::new(
					"payment_window_seconds",
					FieldType::Integer {
						min: Some(1),
						max: Some(86_400),
					},
				),
				Field::new("checkout_url", FieldType::String),
			],
		);

		schema.validate(config)
	}
}

/// Factory function to create the memory backend from configuration.
pub fn create_backend(config: &toml::Value) -> Result<Box<dyn BackendInterface>, ApiError> {
	MemoryBackendSchema
		.validate(config)
		.map_err(|e| ApiError::Configuration(e.to_string()))?;

	let orders = match config.get("fixture").and_then(|v| v.as_str()) {
		Some(path) => {
			let content = std::fs::read_to_string(path).map_err(|e| {
				ApiError::Configuration(format!("Failed to read fixture {}: {}", path, e))
			})?;
			serde_json::from_str::<OrderListResponse>(&content)
				.map_err(|e| ApiError::Configuration(format!("Invalid fixture {}: {}", path, e)))?
				.into_orders()
		},
		None => Vec::new(),
	};

	let state = MemoryState {
		orders,
		default_window_seconds: config
			.get("payment_window_seconds")
			.and_then(|v| v.as_integer())
			.map(|v| v as f64),
		checkout_url: config
			.get("checkout_url")
			.and_then(|v| v.as_str())
			.map(String::from),
		..Default::default()
	};

	Ok(Box::new(MemoryBackend {
		state: Arc::new(RwLock::new(state)),
	}))
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;
	use tracker_types::PaymentWindow;

	fn order(id: &str, status: &str, method: &str) -> Order {
		Order {
			id: id.to_string(),
			status: Some(status.to_string()),
			payment_method: Some(method.to_string()),
			payment_status: Some("pending".to_string()),
			items: vec![],
			total_amount: Some(100.0),
			created_at: None,
		}
	}

	#[tokio::test]
	async fn test_cancel_only_pending() {
		let backend = MemoryBackend::with_orders(vec![
			order("O1", "pending", "cod"),
			order("O2", "delivering", "cod"),
		]);
		let session = Session::anonymous();
		let request = CancelOrderRequest {
			reason: "Other".to_string(),
		};

		backend.cancel_order(&session, "O1", &request).await.unwrap();
		assert_eq!(
			backend.order("O1").await.unwrap().stage(),
			OrderStatus::Cancelled
		);

		let refused = backend.cancel_order(&session, "O2", &request).await;
		assert!(matches!(refused, Err(ApiError::Status { status: 409, .. })));

		let missing = backend.cancel_order(&session, "O3", &request).await;
		assert!(matches!(missing, Err(ApiError::NotFound(_))));
		assert_eq!(
			backend
				.count_calls(|c| matches!(c, BackendCall::CancelOrder { .. }))
				.await,
			3
		);
	}

	#[tokio::test]
	async fn test_payment_window_defaults() {
		let config: toml::Value = toml::from_str("payment_window_seconds = 900").unwrap();
		let backend = create_backend(&config).unwrap();
		let session = Session::anonymous();

		// No such order: the check reports failure
		let status = backend.payment_status(&session, "O1").await.unwrap();
		assert!(!status.success);

		let memory = MemoryBackend::new();
		memory.insert_order(order("O1", "pending", "online")).await;
		memory.set_time_left("O1", 5.0).await;
		let status = memory.payment_status(&session, "O1").await.unwrap();
		assert_eq!(status.window(), Some(PaymentWindow::Open { seconds_left: 5 }));
	}

	#[tokio::test]
	async fn test_create_payment() {
		let backend = MemoryBackend::with_orders(vec![
			order("O1", "pending", "online"),
			order("O2", "pending", "bank"),
		]);
		let session = Session::anonymous();
		backend.set_payment_url("O1", "https://pay.example/O1").await;
		backend.set_time_left("O2", 0.0).await;

		let created = backend
			.create_payment(
				&session,
				&CreatePaymentRequest {
					order_id: "O1".to_string(),
					payment_method: "online".to_string(),
				},
			)
			.await
			.unwrap();
		assert_eq!(created.payment_url(), Some("https://pay.example/O1"));

		let expired = backend
			.create_payment(
				&session,
				&CreatePaymentRequest {
					order_id: "O2".to_string(),
					payment_method: "bank".to_string(),
				},
			)
			.await
			.unwrap();
		assert!(expired.expired);
	}

	#[tokio::test]
	async fn test_fixture_loading() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		write!(
			file,
			r#"{{"data": [{{"_id": "F1", "status": "pending"}}, {{"_id": "F2"}}]}}"#
		)
		.unwrap();

		let config = toml::Value::Table(toml::map::Map::from_iter([(
			"fixture".to_string(),
			toml::Value::String(file.path().display().to_string()),
		)]));
		let backend = create_backend(&config).unwrap();
		let orders = backend.list_my_orders(&Session::anonymous()).await.unwrap();
		assert_eq!(orders.len(), 2);
		assert_eq!(orders[1].id, "F2");
	}

	#[test]
	fn test_missing_fixture_is_config_error() {
		let config: toml::Value =
			toml::from_str("fixture = \"/nonexistent/orders.json\"").unwrap();
		assert!(matches!(
			create_backend(&config),
			Err(ApiError::Configuration(_))
		));
	}
}
