//! Request and response envelopes exchanged with the backend REST API.
//!
//! The backend is not consistent about wrapping its payloads, so several of the
//! response types accept more than one shape and expose a single accessor for
//! the part the tracker needs.

use serde::{Deserialize, Serialize};

use crate::{Order, OrderItem, OrderStatus, PaymentWindow};

/// Response of `GET /orders/my-orders`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OrderListResponse {
	List(Vec<Order>),
	Wrapped { data: Vec<Order> },
}

impl OrderListResponse {
	pub fn into_orders(self) -> Vec<Order> {
		match self {
			OrderListResponse::List(orders) => orders,
			OrderListResponse::Wrapped { data } => data,
		}
	}
}

/// Response of `GET /orders/:id`, either `{order, items}` or a bare order.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OrderDetailResponse {
	Wrapped {
		order: Order,
		#[serde(default)]
		items: Vec<OrderItem>,
	},
	Bare(Order),
}

impl OrderDetailResponse {
	/// Returns the order, with the separately listed items attached when the
	/// wrapped form carries any.
	pub fn into_order(self) -> Order {
		match self {
			OrderDetailResponse::Wrapped { mut order, items } => {
				if !items.is_empty() {
					order.items = items;
				}
				order
			},
			OrderDetailResponse::Bare(order) => order,
		}
	}
}

/// Body of `POST /orders/:id/cancel`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CancelOrderRequest {
	pub reason: String,
}

/// Body of `PATCH /orders/:id/status`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusRequest {
	pub status: OrderStatus,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub cancel_reason: Option<String>,
}

/// Response of `GET /payments/status/:orderId`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentStatusResponse {
	#[serde(default)]
	pub success: bool,
	#[serde(default)]
	pub data: Option<PaymentStatusData>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStatusData {
	#[serde(default)]
	pub payment_expired: bool,
	/// Remaining seconds; may be fractional or negative.
	#[serde(default)]
	pub time_left: f64,
}

impl PaymentStatusResponse {
	/// Derives the payment window, or `None` when the backend reported failure.
	///
	/// A window is expired when flagged so or when no time is left. Fractional
	/// remaining time is rounded up so an open window never starts at zero.
	pub fn window(&self) -> Option<PaymentWindow> {
		if !self.success {
			return None;
		}
		let data = self.data.clone().unwrap_or_default();
		if data.payment_expired || !(data.time_left > 0.0) {
			return Some(PaymentWindow::Expired);
		}
		Some(PaymentWindow::Open {
			seconds_left: data.time_left.ceil() as u64,
		})
	}
}

/// Body of `POST /payments/create`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentRequest {
	pub order_id: String,
	pub payment_method: String,
}

/// Response of `POST /payments/create`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct CreatePaymentResponse {
	#[serde(default)]
	pub expired: bool,
	#[serde(default)]
	pub data: Option<CreatePaymentData>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentData {
	#[serde(default)]
	pub payment_url: Option<String>,
}

impl CreatePaymentResponse {
	/// Provider URL to redirect to, if the backend returned a non-blank one.
	pub fn payment_url(&self) -> Option<&str> {
		self.data
			.as_ref()
			.and_then(|data| data.payment_url.as_deref())
			.filter(|url| !url.trim().is_empty())
	}
}
