//! Per-order view state rendered by the order pages.

use tracker_types::{Order, OrderStatus, PaymentView};

/// Everything a page needs to render one order row.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderView {
	pub order: Order,
	pub stage: OrderStatus,
	pub payment: PaymentView,
	/// Sum over items whose product still exists.
	pub total: f64,
	pub can_pay: bool,
	pub can_cancel: bool,
}

impl OrderView {
	pub fn order_id(&self) -> &str {
		&self.order.id
	}

	/// Payment method label, `unknown` for unrecognized methods.
	pub fn payment_method_label(&self) -> &'static str {
		self.order.payment_method().label()
	}
}
