//! Handlers for the operations a customer or staff member triggers.
//!
//! This module contains specialized handlers for payment windows and payment
//! initiation, the customer cancel flow, and staff status updates.

pub mod cancellation;
pub mod payment;
pub mod status;

pub use cancellation::{CancelOutcome, CancelStage, CancellationHandler};
pub use payment::{PaymentHandler, PaymentOutcome};
pub use status::StatusHandler;
