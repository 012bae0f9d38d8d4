//! Backend data-access module for the pharmacy order tracker.
//!
//! This module defines the interface the tracker uses to talk to the pharmacy
//! backend and the service that wraps it. The service owns the injected
//! [`Session`] and turns authentication failures into a
//! [`Navigation::Redirect`], so no caller ever has to deal with redirects as a
//! side effect of a request.

use async_trait::async_trait;
use thiserror::Error;
use tracing::instrument;
use tracker_types::{
	truncate_id, CancelOrderRequest, ConfigSchema, CreatePaymentRequest, CreatePaymentResponse,
	Navigation, Order, PaymentStatusResponse, Session, UpdateStatusRequest,
};

/// Re-export implementations
pub mod implementations {
	pub mod http;
	pub mod memory;
}

/// Errors that can occur while calling the backend.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ApiError {
	/// The request never produced a response.
	#[error("Network error: {0}")]
	Network(String),
	/// The backend rejected the session.
	#[error("Unauthorized")]
	Unauthorized,
	#[error("Not found: {0}")]
	NotFound(String),
	/// Any other non-success HTTP status.
	#[error("Unexpected status {status}: {message}")]
	Status { status: u16, message: String },
	/// The response body could not be decoded.
	#[error("Invalid response: {0}")]
	InvalidResponse(String),
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Operations the tracker needs from the backend.
///
/// Every call receives the session so implementations can attach credentials.
/// Implementations report a rejected session as [`ApiError::Unauthorized`] and
/// any non-success status as an error; success is never assumed.
#[cfg_attr(feature = "testing", mockall::automock)]
#[async_trait]
pub trait BackendInterface: Send + Sync {
	/// Returns the configuration schema for this implementation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// `GET /orders/my-orders`
	async fn list_my_orders(&self, session: &Session) -> Result<Vec<Order>, ApiError>;

	/// `GET /orders/:id`
	async fn get_order(&self, session: &Session, order_id: &str) -> Result<Order, ApiError>;

	/// `POST /orders/:id/cancel`
	async fn cancel_order(
		&self,
		session: &Session,
		order_id: &str,
		request: &CancelOrderRequest,
	) -> Result<(), ApiError>;

	/// `PATCH /orders/:id/status`
	async fn update_order_status(
		&self,
		session: &Session,
		order_id: &str,
		request: &UpdateStatusRequest,
	) -> Result<(), ApiError>;

	/// `GET /payments/status/:orderId`
	async fn payment_status(
		&self,
		session: &Session,
		order_id: &str,
	) -> Result<PaymentStatusResponse, ApiError>;

	/// `POST /payments/create`
	async fn create_payment(
		&self,
		session: &Session,
		request: &CreatePaymentRequest,
	) -> Result<CreatePaymentResponse, ApiError>;
}

/// Type alias for backend factory functions.
pub type BackendFactory = fn(&toml::Value) -> Result<Box<dyn BackendInterface>, ApiError>;

/// Get all registered backend implementations as (name, factory) pairs.
pub fn get_all_implementations() -> Vec<(&'static str, BackendFactory)> {
	use implementations::{http, memory};

	vec![
		(http::NAME, http::create_backend as BackendFactory),
		(memory::NAME, memory::create_backend as BackendFactory),
	]
}

/// Service that calls the backend on behalf of one session.
pub struct BackendService {
	backend: Box<dyn BackendInterface>,
	session: Session,
	login_path: String,
}

impl BackendService {
	pub fn new(
		backend: Box<dyn BackendInterface>,
		session: Session,
		login_path: impl Into<String>,
	) -> Self {
		Self {
			backend,
			session,
			login_path: login_path.into(),
		}
	}

	pub fn session(&self) -> &Session {
		&self.session
	}

	/// Converts an unauthorized error into a redirect to the login path.
	fn guard<T>(&self, result: Result<T, ApiError>) -> Result<Navigation<T>, ApiError> {
		match result {
			Ok(value) => Ok(Navigation::Ok(value)),
			Err(ApiError::Unauthorized) => {
				tracing::warn!(to = %self.login_path, "Session rejected by backend");
				Ok(Navigation::Redirect {
					to: self.login_path.clone(),
				})
			},
			Err(e) => Err(e),
		}
	}

	#[instrument(skip_all)]
	pub async fn list_my_orders(&self) -> Result<Navigation<Vec<Order>>, ApiError> {
		tracing::debug!("Fetching order list");
		self.guard(self.backend.list_my_orders(&self.session).await)
	}

	#[instrument(skip_all, fields(order_id = %truncate_id(order_id)))]
	pub async fn get_order(&self, order_id: &str) -> Result<Navigation<Order>, ApiError> {
		tracing::debug!("Fetching order");
		self.guard(self.backend.get_order(&self.session, order_id).await)
	}

	#[instrument(skip_all, fields(order_id = %truncate_id(order_id)))]
	pub async fn cancel_order(
		&self,
		order_id: &str,
		reason: &str,
	) -> Result<Navigation<()>, ApiError> {
		tracing::debug!(reason = %reason, "Requesting cancellation");
		let request = CancelOrderRequest {
			reason: reason.to_string(),
		};
		self.guard(
			self.backend
				.cancel_order(&self.session, order_id, &request)
				.await,
		)
	}

	#[instrument(skip_all, fields(order_id = %truncate_id(order_id), status = %request.status))]
	pub async fn update_order_status(
		&self,
		order_id: &str,
		request: &UpdateStatusRequest,
	) -> Result<Navigation<()>, ApiError> {
		tracing::debug!("Updating order status");
		self.guard(
			self.backend
				.update_order_status(&self.session, order_id, request)
				.await,
		)
	}

	#[instrument(skip_all, fields(order_id = %truncate_id(order_id)))]
	pub async fn payment_status(
		&self,
		order_id: &str,
	) -> Result<Navigation<PaymentStatusResponse>, ApiError> {
		tracing::debug!("Checking payment window");
		self.guard(self.backend.payment_status(&self.session, order_id).await)
	}

	#[instrument(skip_all, fields(order_id = %truncate_id(&request.order_id)))]
	pub async fn create_payment(
		&self,
		request: &CreatePaymentRequest,
	) -> Result<Navigation<CreatePaymentResponse>, ApiError> {
		tracing::debug!("Creating payment");
		self.guard(self.backend.create_payment(&self.session, request).await)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use implementations::memory::MemoryBackend;

	fn order(id: &str) -> Order {
		Order {
			id: id.to_string(),
			status: Some("pending".to_string()),
			payment_method: Some("cod".to_string()),
			payment_status: Some("pending".to_string()),
			items: vec![],
			total_amount: None,
			created_at: None,
		}
	}

	#[tokio::test]
	async fn test_unauthorized_becomes_redirect() {
		let backend = MemoryBackend::new();
		backend.require_token("right").await;

		let service = BackendService::new(
			Box::new(backend.clone()),
			Session::with_token("wrong"),
			"/login",
		);
		let result = service.list_my_orders().await.unwrap();
		assert_eq!(result.redirect_target(), Some("/login"));
	}

	#[tokio::test]
	async fn test_authorized_call_passes_through() {
		let backend = MemoryBackend::new();
		backend.require_token("right").await;
		backend.insert_order(order("O1")).await;

		let service = BackendService::new(
			Box::new(backend.clone()),
			Session::with_token("right"),
			"/login",
		);
		let orders = service.list_my_orders().await.unwrap().ok().unwrap();
		assert_eq!(orders.len(), 1);
	}

	#[tokio::test]
	async fn test_other_errors_propagate() {
		let backend = MemoryBackend::new();
		backend.set_offline(true).await;

		let service = BackendService::new(Box::new(backend), Session::anonymous(), "/login");
		let result = service.get_order("O1").await;
		assert!(matches!(result, Err(ApiError::Network(_))));
	}

	#[test]
	fn test_all_implementations_registered() {
		let names: Vec<&str> = get_all_implementations()
			.into_iter()
			.map(|(name, _)| name)
			.collect();
		assert_eq!(names, vec!["http", "memory"]);
	}
}
