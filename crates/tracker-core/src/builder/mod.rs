//! Builder for constructing an order tracker from configuration.
//!
//! The backend implementation is chosen by name from a map of factory
//! functions, so the binary decides which implementations are available.

use crate::engine::{event_bus::EventBus, OrderTracker};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tracker_api::{ApiError, BackendInterface, BackendService};
use tracker_config::Config;

/// Errors that can occur while building a tracker.
#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Missing required component: {0}")]
	MissingComponent(String),
}

pub struct TrackerBuilder {
	config: Config,
}

impl TrackerBuilder {
	pub fn new(config: Config) -> Self {
		Self { config }
	}

	/// Builds the tracker with the configured primary backend.
	pub fn build<F>(self, factories: &HashMap<String, F>) -> Result<OrderTracker, BuilderError>
	where
		F: Fn(&toml::Value) -> Result<Box<dyn BackendInterface>, ApiError>,
	{
		let primary = &self.config.backend.primary;
		let backend_config = self.config.backend.primary_config().ok_or_else(|| {
			BuilderError::Config(format!(
				"Primary backend '{}' not found in implementations",
				primary
			))
		})?;
		let factory = factories.get(primary).ok_or_else(|| {
			BuilderError::MissingComponent(format!("backend implementation '{}'", primary))
		})?;

		// Validation already happens in the factory
		let backend = factory(backend_config).map_err(|e| {
			tracing::error!(
				component = "backend",
				implementation = %primary,
				error = %e,
				"Failed to create backend implementation"
			);
			BuilderError::Config(format!(
				"Failed to create backend implementation '{}': {}",
				primary, e
			))
		})?;
		tracing::info!(component = "backend", implementation = %primary, "Loaded");

		let session = self.config.session();
		if !session.is_authenticated() {
			tracing::warn!("No session token configured, backend calls are unauthenticated");
		}

		let service = BackendService::new(backend, session, self.config.tracker.login_path.clone());
		let event_bus = EventBus::new(self.config.tracker.event_capacity);
		let tick = Duration::from_millis(self.config.tracker.tick_interval_ms);

		Ok(OrderTracker::new(service, event_bus, tick))
	}
}
