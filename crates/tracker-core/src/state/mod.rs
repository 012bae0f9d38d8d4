//! State management for tracked orders.
//!
//! Provides the client-side guard over order status transitions.

pub mod order;

pub use order::{build_update, is_valid_transition, next_statuses, StatusTransitionError};
