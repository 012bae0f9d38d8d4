//! Plain-text rendering of orders for the terminal.

use tracker_core::OrderView;
use tracker_types::{format_amount, truncate_id, Notice, NoticeLevel, Order, PaymentView};

/// Order list as shown on the customer order page.
pub fn order_table(views: &[OrderView]) -> String {
	if views.is_empty() {
		return "No orders found.\n".to_string();
	}

	let mut out = format!(
		"{:<12} {:<11} {:<16} {:<20} {:>12}  {}\n",
		"ORDER", "STATUS", "METHOD", "PAYMENT", "TOTAL", "ACTIONS"
	);
	for view in views {
		out.push_str(&format!(
			"{:<12} {:<11} {:<16} {:<20} {:>12}  {}\n",
			truncate_id(view.order_id()),
			view.stage.label(),
			view.payment_method_label(),
			view.payment.to_string(),
			format_amount(view.total),
			actions(view),
		));
	}
	out
}

fn actions(view: &OrderView) -> String {
	let mut actions = Vec::new();
	if view.can_pay {
		actions.push("pay");
	}
	if view.can_cancel {
		actions.push("cancel");
	}
	if actions.is_empty() {
		"-".to_string()
	} else {
		actions.join(", ")
	}
}

/// Purchase history, newest first, using the stored total when present.
pub fn history_table(orders: &[Order]) -> String {
	if orders.is_empty() {
		return "No orders found.\n".to_string();
	}

	let mut out = format!(
		"{:<12} {:<17} {:<11} {:>12}\n",
		"ORDER", "DATE", "STATUS", "TOTAL"
	);
	for order in orders {
		let date = order
			.created_at
			.map(|at| at.format("%Y-%m-%d %H:%M").to_string())
			.unwrap_or_else(|| "-".to_string());
		out.push_str(&format!(
			"{:<12} {:<17} {:<11} {:>12}\n",
			truncate_id(&order.id),
			date,
			order.stage().label(),
			format_amount(order.history_total()),
		));
	}
	out
}

/// Full detail of one order including its items.
pub fn order_detail(view: &OrderView) -> String {
	let order = &view.order;
	let mut out = format!("Order {}\n", order.id);
	out.push_str(&format!("  Status:   {}\n", view.stage.label()));
	out.push_str(&format!("  Method:   {}\n", view.payment_method_label()));
	if view.payment != PaymentView::NotApplicable {
		out.push_str(&format!("  Payment:  {}\n", view.payment));
	}
	out.push_str("  Items:\n");
	for item in &order.items {
		out.push_str(&format!(
			"    {:<30} {:>4} x {:>10} = {:>12}\n",
			item.display_name(),
			item.quantity,
			format_amount(item.unit_price),
			format_amount(item.subtotal()),
		));
	}
	out.push_str(&format!("  Total:    {}\n", format_amount(view.total)));
	out
}

pub fn notice(notice: &Notice) -> String {
	let tag = match notice.level {
		NoticeLevel::Info => "info",
		NoticeLevel::Success => "ok",
		NoticeLevel::Warning => "warning",
		NoticeLevel::Error => "error",
	};
	format!("[{}] {}", tag, notice.message)
}
