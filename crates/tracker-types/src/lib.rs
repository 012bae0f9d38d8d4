//! Common types module for the pharmacy order tracker.
//!
//! This module defines the domain types shared by every tracker crate: orders
//! as the backend reports them, the payment and cancellation payloads exchanged
//! with it, the events the tracker publishes, and the session that authorizes
//! each call.

/// Request and response envelopes exchanged with the backend.
pub mod api;
/// Cancellation reasons and the transient cancel form.
pub mod cancel;
/// Event types published by the tracker.
pub mod events;
/// Order, item and status types including normalization.
pub mod order;
/// Payment method, payment status and payment window types.
pub mod payment;
/// Redacted string type for tokens.
pub mod secret_string;
/// Session and navigation intent types.
pub mod session;
/// Utility functions for display formatting.
pub mod utils;
/// Configuration validation types for implementation-specific tables.
pub mod validation;

pub use api::*;
pub use cancel::*;
pub use events::*;
pub use order::*;
pub use payment::*;
pub use secret_string::SecretString;
pub use session::*;
pub use utils::{format_amount, truncate_id};
pub use validation::*;
