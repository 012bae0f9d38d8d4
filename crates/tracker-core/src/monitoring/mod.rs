//! Monitoring of payment windows.
//!
//! Runs one countdown per order awaiting payment and publishes an event when a
//! window closes.

pub mod countdown;

pub use countdown::PaymentTimers;
