//! REST backend implementation.
//!
//! Talks to the pharmacy backend over HTTP(S) with a pooled reqwest client.
//! The session's bearer token is attached to every request, `401` maps to
//! [`ApiError::Unauthorized`], and any other non-success status is an error.

use crate::{ApiError, BackendInterface};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracker_types::{
	CancelOrderRequest, ConfigSchema, CreatePaymentRequest, CreatePaymentResponse, Field,
	FieldType, Order, OrderDetailResponse, OrderListResponse, PaymentStatusResponse, Schema,
	Session, UpdateStatusRequest, ValidationError,
};

/// Name under which this implementation is registered.
pub const NAME: &str = "http";

const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

/// Backend reached through its REST API.
pub struct HttpBackend {
	client: Client,
	base_url: Url,
}

impl HttpBackend {
	pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
		let base_url = Url::parse(base_url)
			.map_err(|e| ApiError::Configuration(format!("Invalid base_url: {}", e)))?;
		if base_url.cannot_be_a_base() {
			return Err(ApiError::Configuration(format!(
				"base_url cannot be used as a base: {}",
				base_url
			)));
		}

		let client = Client::builder()
			.pool_idle_timeout(Duration::from_secs(90))
			.timeout(timeout)
			.build()
			.map_err(|e| ApiError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

		Ok(Self { client, base_url })
	}

	/// Appends path segments to the base URL, percent-encoding each one.
	fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
		let mut url = self.base_url.clone();
		url.path_segments_mut()
			.map_err(|_| ApiError::Configuration("base_url cannot be a base".into()))?
			.pop_if_empty()
			.extend(segments);
		Ok(url)
	}

	fn request(
		&self,
		method: Method,
		session: &Session,
		segments: &[&str],
	) -> Result<RequestBuilder, ApiError> {
		let url = self.endpoint(segments)?;
		tracing::trace!(%method, %url, "Backend request");

		let mut builder = self.client.request(method, url);
		if let Some(header) = session.authorization_header() {
			builder = builder.header(reqwest::header::AUTHORIZATION, header);
		}
		Ok(builder)
	}

	async fn send(builder: RequestBuilder) -> Result<Response, ApiError> {
		let response = builder
			.send()
			.await
			.map_err(|e| ApiError::Network(e.to_string()))?;

		let status = response.status();
		if status.is_success() {
			return Ok(response);
		}

		let message = response.text().await.unwrap_or_default();
		Err(match status {
			StatusCode::UNAUTHORIZED => ApiError::Unauthorized,
			StatusCode::NOT_FOUND => ApiError::NotFound(message),
			_ => ApiError::Status {
				status: status.as_u16(),
				message,
			},
		})
	}

	async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
		response
			.json::<T>()
			.await
			.map_err(|e| ApiError::InvalidResponse(e.to_string()))
	}
}

#[async_trait]
impl BackendInterface for HttpBackend {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(HttpBackendSchema)
	}

	async fn list_my_orders(&self, session: &Session) -> Result<Vec<Order>, ApiError> {
		let builder = self.request(Method::GET, session, &["orders", "my-orders"])?;
		let response = Self::send(builder).await?;
		let body: OrderListResponse = Self::decode(response).await?;
		Ok(body.into_orders())
	}

	async fn get_order(&self, session: &Session, order_id: &str) -> Result<Order, ApiError> {
		let builder = self.request(Method::GET, session, &["orders", order_id])?;
		let response = Self::send(builder).await?;
		let body: OrderDetailResponse = Self::decode(response).await?;
		Ok(body.into_order())
	}

	async fn cancel_order(
		&self,
		session: &Session,
		order_id: &str,
		request: &CancelOrderRequest,
	) -> Result<(), ApiError> {
		let builder = self
			.request(Method::POST, session, &["orders", order_id, "cancel"])?
			.json(request);
		Self::send(builder).await?;
		Ok(())
	}

	async fn update_order_status(
		&self,
		session: &Session,
		order_id: &str,
		request: &UpdateStatusRequest,
	) -> Result<(), ApiError> {
		let builder = self
			.request(Method::PATCH, session, &["orders", order_id, "status"])?
			.json(request);
		Self::send(builder).await?;
		Ok(())
	}

	async fn payment_status(
		&self,
		session: &Session,
		order_id: &str,
	) -> Result<PaymentStatusResponse, ApiError> {
		let builder = self.request(Method::GET, session, &["payments", "status", order_id])?;
		let response = Self::send(builder).await?;
		Self::decode(response).await
	}

	async fn create_payment(
		&self,
		session: &Session,
		request: &CreatePaymentRequest,
	) -> Result<CreatePaymentResponse, ApiError> {
		let builder = self
			.request(Method::POST, session, &["payments", "create"])?
			.json(request);
		let response = Self::send(builder).await?;
		Self::decode(response).await
	}
}

/// Configuration schema for the REST backend.
///
/// # Required Fields
///
/// - `base_url` - HTTP(S) URL of the API root, e.g. `http://localhost:5000/api`
///
/// # Optional Fields
///
/// - `timeout_seconds` - Request timeout (1-300)
pub struct HttpBackendSchema;

impl ConfigSchema for HttpBackendSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![Field::new("base_url", FieldType::String).with_validator(|value| {
				match value.as_str() {
					Some(url) if url.starts_with("http://") || url.starts_with("https://") => {
						Ok(())
					},
					Some(_) => Err("base_url must start with http:// or https://".to_string()),
					None => Err("Expected string value for base_url".to_string()),
				}
			})],
			vec![Field::new(
				"timeout_seconds",
				FieldType::Integer {
					min: Some(1),
					max: Some(300),
				},
			)],
		);

		schema.validate(config)
	}
}

/// Factory function to create the REST backend from configuration.
///
/// Configuration parameters:
/// - `base_url`: API root (required)
/// - `timeout_seconds`: request timeout (default: 30)
pub fn create_backend(config: &toml::Value) -> Result<Box<dyn BackendInterface>, ApiError> {
	HttpBackendSchema
		.validate(config)
		.map_err(|e| ApiError::Configuration(e.to_string()))?;

	let base_url = config
		.get("base_url")
		.and_then(|v| v.as_str())
		.ok_or_else(|| ApiError::Configuration("base_url is required".to_string()))?;

	let timeout_seconds = config
		.get("timeout_seconds")
		.and_then(|v| v.as_integer())
		.map(|v| v as u64)
		.unwrap_or(DEFAULT_TIMEOUT_SECONDS);

	let backend = HttpBackend::new(base_url, Duration::from_secs(timeout_seconds))?;
	Ok(Box::new(backend))
}

#[cfg(test)]
mod tests {
	use super::*;
	use axum::{
		extract::Path,
		http::{HeaderMap, StatusCode as AxumStatus},
		routing::{get, patch, post},
		Json, Router,
	};
	use serde_json::{json, Value};
	use std::sync::{Arc, Mutex};
	use tracker_types::OrderStatus;

	type Captured = Arc<Mutex<Vec<Value>>>;

	fn bearer(headers: &HeaderMap) -> Option<String> {
		headers
			.get("authorization")
			.and_then(|v| v.to_str().ok())
			.map(String::from)
	}

	async fn spawn_server(captured: Captured) -> String {
		let cancel_log = captured.clone();
		let status_log = captured.clone();

		let app = Router::new()
			.route(
				"/api/orders/my-orders",
				get(|headers: HeaderMap| async move {
					if bearer(&headers).as_deref() != Some("Bearer good") {
						return (AxumStatus::UNAUTHORIZED, Json(json!({"message": "no"})));
					}
					(
						AxumStatus::OK,
						Json(json!({"data": [{"_id": "O1", "status": "Pending"}]})),
					)
				}),
			)
			.route(
				"/api/orders/{id}",
				get(|Path(id): Path<String>| async move {
					if id == "missing" {
						return (AxumStatus::NOT_FOUND, Json(json!({"message": "gone"})));
					}
					(
						AxumStatus::OK,
						Json(json!({
							"order": {"id": id, "status": "processing"},
							"items": [{"productId": null, "quantity": 1, "unitPrice": 5000}]
						})),
					)
				}),
			)
			.route(
				"/api/orders/{id}/cancel",
				post(move |Path(id): Path<String>, Json(body): Json<Value>| {
					let log = cancel_log.clone();
					async move {
						log.lock().unwrap().push(json!({"id": id, "body": body}));
						if id == "locked" {
							return AxumStatus::CONFLICT;
						}
						AxumStatus::OK
					}
				}),
			)
			.route(
				"/api/orders/{id}/status",
				patch(move |Path(id): Path<String>, Json(body): Json<Value>| {
					let log = status_log.clone();
					async move {
						log.lock().unwrap().push(json!({"id": id, "body": body}));
						AxumStatus::NO_CONTENT
					}
				}),
			)
			.route(
				"/api/payments/status/{id}",
				get(|| async {
					Json(json!({"success": true, "data": {"paymentExpired": false, "timeLeft": 42}}))
				}),
			)
			.route(
				"/api/payments/create",
				post(|Json(body): Json<Value>| async move {
					let url = format!("https://pay.example/{}", body["orderId"].as_str().unwrap_or(""));
					Json(json!({"data": {"paymentUrl": url}}))
				}),
			);

		let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
		let addr = listener.local_addr().unwrap();
		tokio::spawn(async move {
			axum::serve(listener, app).await.unwrap();
		});
		format!("http://{}/api", addr)
	}

	fn backend(base_url: &str) -> HttpBackend {
		HttpBackend::new(base_url, Duration::from_secs(5)).unwrap()
	}

	#[tokio::test]
	async fn test_list_orders_with_bearer_token() {
		let base = spawn_server(Captured::default()).await;
		let backend = backend(&base);

		let orders = backend
			.list_my_orders(&Session::with_token("good"))
			.await
			.unwrap();
		assert_eq!(orders.len(), 1);
		assert_eq!(orders[0].id, "O1");

		let rejected = backend.list_my_orders(&Session::anonymous()).await;
		assert_eq!(rejected, Err(ApiError::Unauthorized));
	}

	#[tokio::test]
	async fn test_get_order_detail_and_not_found() {
		let base = spawn_server(Captured::default()).await;
		let backend = backend(&base);
		let session = Session::anonymous();

		let order = backend.get_order(&session, "O7").await.unwrap();
		assert_eq!(order.id, "O7");
		assert_eq!(order.items.len(), 1);
		assert!(order.items[0].is_product_deleted());

		let missing = backend.get_order(&session, "missing").await;
		assert!(matches!(missing, Err(ApiError::NotFound(_))));
	}

	#[tokio::test]
	async fn test_cancel_checks_status() {
		let captured = Captured::default();
		let base = spawn_server(captured.clone()).await;
		let backend = backend(&base);
		let session = Session::anonymous();
		let request = CancelOrderRequest {
			reason: "Delivery time is too long".to_string(),
		};

		backend.cancel_order(&session, "O1", &request).await.unwrap();
		let conflict = backend.cancel_order(&session, "locked", &request).await;
		assert!(matches!(conflict, Err(ApiError::Status { status: 409, .. })));

		let log = captured.lock().unwrap();
		assert_eq!(log.len(), 2);
		assert_eq!(log[0]["body"]["reason"], "Delivery time is too long");
	}

	#[tokio::test]
	async fn test_update_status_body() {
		let captured = Captured::default();
		let base = spawn_server(captured.clone()).await;
		let backend = backend(&base);

		let request = UpdateStatusRequest {
			status: OrderStatus::Delivering,
			cancel_reason: None,
		};
		backend
			.update_order_status(&Session::anonymous(), "O1", &request)
			.await
			.unwrap();

		let log = captured.lock().unwrap();
		assert_eq!(log[0]["id"], "O1");
		assert_eq!(log[0]["body"], json!({"status": "delivering"}));
	}

	#[tokio::test]
	async fn test_payment_endpoints() {
		let base = spawn_server(Captured::default()).await;
		let backend = backend(&base);
		let session = Session::anonymous();

		let status = backend.payment_status(&session, "O1").await.unwrap();
		assert!(status.success);

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
	}

	#[tokio::test]
	async fn test_network_error() {
		let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
		let addr = listener.local_addr().unwrap();
		drop(listener);

		let backend = backend(&format!("http://{}/api", addr));
		let result = backend.list_my_orders(&Session::anonymous()).await;
		assert!(matches!(result, Err(ApiError::Network(_))));
	}

	#[test]
	fn test_endpoint_encodes_segments() {
		let backend = backend("http://localhost:5000/api/");
		let url = backend.endpoint(&["orders", "a b/c"]).unwrap();
		assert_eq!(url.as_str(), "http://localhost:5000/api/orders/a%20b%2Fc");
	}

	#[test]
	fn test_factory_validates_config() {
		let missing: toml::Value = toml::from_str("timeout_seconds = 5").unwrap();
		assert!(matches!(
			create_backend(&missing),
			Err(ApiError::Configuration(_))
		));

		let bad_scheme: toml::Value = toml::from_str("base_url = \"ftp://host\"").unwrap();
		assert!(create_backend(&bad_scheme).is_err());

		let valid: toml::Value =
			toml::from_str("base_url = \"http://localhost:5000/api\"\ntimeout_seconds = 10")
				.unwrap();
		assert!(create_backend(&valid).is_ok());
	}
}
