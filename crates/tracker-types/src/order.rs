//! Order types for the tracker.
//!
//! Orders are read from the backend as loosely-typed records. Free-text fields
//! such as the lifecycle status are kept as received and normalized on demand,
//! so that an unexpected value from the backend never fails a whole page.

use chrono::{DateTime, Utc};
use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{PaymentMethod, PaymentStatus};

/// Text shown in place of a product name when the product no longer exists.
pub const DELETED_PRODUCT_PLACEHOLDER: &str = "Product deleted";

/// A customer order as reported by the backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Order {
	/// Opaque unique identifier.
	#[serde(alias = "_id")]
	pub id: String,
	/// Raw lifecycle status. Use [`Order::stage`] for the normalized value.
	#[serde(default)]
	pub status: Option<String>,
	/// Raw payment method.
	#[serde(default)]
	pub payment_method: Option<String>,
	/// Raw payment status.
	#[serde(default)]
	pub payment_status: Option<String>,
	/// Ordered line items.
	#[serde(default)]
	pub items: Vec<OrderItem>,
	/// Stored total, when the backend provides one.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub total_amount: Option<f64>,
	/// Creation time, used to sort purchase history.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub created_at: Option<DateTime<Utc>>,
}

/// A single line of an order.
///
/// Deserialization is lenient: a malformed line degrades to a deleted-product
/// line with zero quantity or price rather than failing the whole order list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", from = "OrderItemRecord")]
pub struct OrderItem {
	/// Referenced product; `None` when the product has been deleted.
	pub product_id: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub product_name: Option<String>,
	pub quantity: u32,
	pub unit_price: f64,
}

/// Product reference as sent by the backend: a bare id, or the product
/// document itself when the backend populated it.
#[derive(Deserialize)]
#[serde(untagged)]
enum ProductRef {
	Id(String),
	Populated {
		#[serde(default, alias = "_id")]
		id: Option<String>,
		#[serde(default)]
		name: Option<String>,
	},
	Unrecognized(IgnoredAny),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderItemRecord {
	#[serde(default)]
	product_id: Option<ProductRef>,
	#[serde(default)]
	product_name: Option<String>,
	#[serde(default)]
	quantity: u32,
	#[serde(default, alias = "price")]
	unit_price: f64,
}

impl From<OrderItemRecord> for OrderItem {
	fn from(record: OrderItemRecord) -> Self {
		let (product_id, populated_name) = match record.product_id {
			Some(ProductRef::Id(id)) => (Some(id), None),
			Some(ProductRef::Populated { id, name }) => (id, name),
			Some(ProductRef::Unrecognized(_)) | None => (None, None),
		};
		Self {
			product_id,
			product_name: record.product_name.or(populated_name),
			quantity: record.quantity,
			unit_price: record.unit_price,
		}
	}
}

impl OrderItem {
	/// Quantity times unit price.
	pub fn subtotal(&self) -> f64 {
		f64::from(self.quantity) * self.unit_price
	}

	/// Returns true when the referenced product has been deleted.
	pub fn is_product_deleted(&self) -> bool {
		self.product_id.is_none()
	}

	/// Name to display for this item.
	///
	/// Deleted products render as [`DELETED_PRODUCT_PLACEHOLDER`]; otherwise the
	/// product name is preferred over the bare identifier.
	pub fn display_name(&self) -> &str {
		match (&self.product_id, &self.product_name) {
			(None, _) => DELETED_PRODUCT_PLACEHOLDER,
			(Some(_), Some(name)) if !name.trim().is_empty() => name,
			(Some(id), _) => id,
		}
	}
}

impl Order {
	/// Normalized lifecycle stage.
	pub fn stage(&self) -> OrderStatus {
		OrderStatus::normalize(self.status.as_deref())
	}

	pub fn payment_method(&self) -> PaymentMethod {
		PaymentMethod::from_raw(self.payment_method.as_deref())
	}

	pub fn payment_status(&self) -> PaymentStatus {
		PaymentStatus::from_raw(self.payment_status.as_deref())
	}

	/// Returns true when the order is waiting on an online or bank payment and
	/// therefore has a payment window the tracker should watch.
	///
	/// Completed and cancelled orders never do, whatever their payment status
	/// still says.
	pub fn awaits_online_payment(&self) -> bool {
		!self.stage().is_terminal()
			&& self.payment_method().requires_online_payment()
			&& self.payment_status().is_pending()
	}

	/// Returns true when payment can be started for this order, ignoring expiry.
	///
	/// Any method other than cash on delivery or cash qualifies, including
	/// methods the tracker does not recognize. Terminal orders never qualify.
	pub fn accepts_online_payment(&self) -> bool {
		!self.stage().is_terminal()
			&& !self.payment_method().is_cash_like()
			&& self.payment_status().is_pending()
	}

	/// Total used by the order list: items whose product was deleted are left
	/// out of the sum. The stored total is ignored.
	pub fn items_total_excluding_deleted(&self) -> f64 {
		self.items
			.iter()
			.filter(|item| !item.is_product_deleted())
			.map(OrderItem::subtotal)
			.sum()
	}

	/// Total used by purchase history: the stored total when it is positive,
	/// otherwise the sum over every item.
	pub fn history_total(&self) -> f64 {
		match self.total_amount {
			Some(total) if total > 0.0 => total,
			_ => self.items.iter().map(OrderItem::subtotal).sum(),
		}
	}
}

/// Normalized lifecycle status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
	Pending,
	Processing,
	Delivering,
	Completed,
	Cancelled,
}

impl OrderStatus {
	/// All statuses in lifecycle order.
	pub const ALL: [OrderStatus; 5] = [
		OrderStatus::Pending,
		OrderStatus::Processing,
		OrderStatus::Delivering,
		OrderStatus::Completed,
		OrderStatus::Cancelled,
	];

	/// Maps a raw backend status onto the closed set of statuses.
	///
	/// Matching ignores case and surrounding whitespace and accepts the US
	/// spelling `canceled`. Anything unrecognized, empty or absent is `Pending`.
	pub fn normalize(raw: Option<&str>) -> Self {
		let raw = raw.map(|s| s.trim().to_ascii_lowercase());
		match raw.as_deref() {
			Some("processing") => OrderStatus::Processing,
			Some("delivering") => OrderStatus::Delivering,
			Some("completed") => OrderStatus::Completed,
			Some("cancelled") | Some("canceled") => OrderStatus::Cancelled,
			_ => OrderStatus::Pending,
		}
	}

	/// Wire representation, as sent in status updates.
	pub fn as_str(&self) -> &'static str {
		match self {
			OrderStatus::Pending => "pending",
			OrderStatus::Processing => "processing",
			OrderStatus::Delivering => "delivering",
			OrderStatus::Completed => "completed",
			OrderStatus::Cancelled => "cancelled",
		}
	}

	pub fn label(&self) -> &'static str {
		match self {
			OrderStatus::Pending => "Pending",
			OrderStatus::Processing => "Processing",
			OrderStatus::Delivering => "Delivering",
			OrderStatus::Completed => "Completed",
			OrderStatus::Cancelled => "Cancelled",
		}
	}

	pub fn is_terminal(&self) -> bool {
		matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
	}
}

impl fmt::Display for OrderStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Free function form of [`OrderStatus::normalize`].
pub fn normalize_status(raw: Option<&str>) -> OrderStatus {
	OrderStatus::normalize(raw)
}

/// Status filter used by the order list and purchase history tabs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
	#[default]
	All,
	Only(OrderStatus),
}

impl StatusFilter {
	/// Parses a filter name; `all` (or blank) selects every order, anything else
	/// goes through status normalization.
	pub fn parse(raw: &str) -> Self {
		let trimmed = raw.trim();
		if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("all") {
			StatusFilter::All
		} else {
			StatusFilter::Only(OrderStatus::normalize(Some(trimmed)))
		}
	}

	pub fn matches(&self, order: &Order) -> bool {
		match self {
			StatusFilter::All => true,
			StatusFilter::Only(status) => order.stage() == *status,
		}
	}
}
