//! Configuration module for the pharmacy order tracker.
//!
//! Configuration is read from TOML. `${VAR}` and `${VAR:-default}` references
//! are substituted from the environment before parsing, which is how the bearer
//! token is normally supplied.
//!
//! ## Modular Configuration Support
//!
//! A file may pull in others with `include = ["backend.toml"]`. Each top-level
//! section must be defined in exactly one file.

mod loader;

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;
use tracker_types::{SecretString, Session, UserInfo};

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	#[error("Configuration error: {0}")]
	Parse(String),
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Keep only the message; the full error echoes the whole input
		ConfigError::Parse(err.message().to_string())
	}
}

/// Main configuration structure for the tracker.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Tracker behaviour.
	#[serde(default)]
	pub tracker: TrackerConfig,
	/// Backend data-access implementations.
	pub backend: BackendConfig,
	/// Credentials used for every backend call.
	#[serde(default)]
	pub session: Option<SessionConfig>,
}

/// Settings of the order tracker itself.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TrackerConfig {
	/// Interval between payment countdown ticks, in milliseconds.
	#[serde(default = "default_tick_interval_ms")]
	pub tick_interval_ms: u64,
	/// Path callers are redirected to when the backend rejects the session.
	#[serde(default = "default_login_path")]
	pub login_path: String,
	/// Capacity of the event bus.
	#[serde(default = "default_event_capacity")]
	pub event_capacity: usize,
}

impl Default for TrackerConfig {
	fn default() -> Self {
		Self {
			tick_interval_ms: default_tick_interval_ms(),
			login_path: default_login_path(),
			event_capacity: default_event_capacity(),
		}
	}
}

fn default_tick_interval_ms() -> u64 {
	1000
}

fn default_login_path() -> String {
	"/login".to_string()
}

fn default_event_capacity() -> usize {
	64
}

/// Configuration for the backend data-access layer.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
	/// Which implementation to use.
	pub primary: String,
	/// Map of implementation names to their raw configuration tables.
	pub implementations: HashMap<String, toml::Value>,
}

impl BackendConfig {
	/// Configuration table of the primary implementation.
	pub fn primary_config(&self) -> Option<&toml::Value> {
		self.implementations.get(&self.primary)
	}
}

/// Session credentials.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SessionConfig {
	#[serde(default)]
	pub token: Option<SecretString>,
	#[serde(default)]
	pub user_id: Option<String>,
	#[serde(default)]
	pub user_name: Option<String>,
	#[serde(default)]
	pub role: Option<String>,
}

impl SessionConfig {
	/// Builds the session handed to the data-access layer. User information is
	/// attached only when both id and name are present.
	pub fn to_session(&self) -> Session {
		let user = match (&self.user_id, &self.user_name) {
			(Some(id), Some(name)) => Some(UserInfo {
				id: id.clone(),
				name: name.clone(),
				role: self.role.clone(),
			}),
			_ => None,
		};
		Session::new(self.token.clone(), user)
	}
}

impl Config {
	/// Session described by the configuration, anonymous if none is.
	pub fn session(&self) -> Session {
		self.session
			.as_ref()
			.map(SessionConfig::to_session)
			.unwrap_or_else(Session::anonymous)
	}

	/// Loads configuration from a file, following include directives.
	pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let path = path.as_ref();
		let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
		let file_name = path.file_name().ok_or_else(|| {
			ConfigError::Validation(format!("Invalid path: {}", path.display()))
		})?;

		let mut loader = loader::ConfigLoader::new(base_dir);
		loader.load_config(file_name).await
	}

	/// Validates values serde cannot check on its own.
	fn validate(&self) -> Result<(), ConfigError> {
		if self.tracker.tick_interval_ms == 0 {
			return Err(ConfigError::Validation(
				"tracker.tick_interval_ms must be greater than 0".into(),
			));
		}
		if self.tracker.tick_interval_ms > 60_000 {
			return Err(ConfigError::Validation(
				"tracker.tick_interval_ms cannot exceed 60000".into(),
			));
		}
		if !self.tracker.login_path.starts_with('/') {
			return Err(ConfigError::Validation(format!(
				"tracker.login_path must start with '/', got '{}'",
				self.tracker.login_path
			)));
		}
		if self.tracker.event_capacity == 0 {
			return Err(ConfigError::Validation(
				"tracker.event_capacity must be at least 1".into(),
			));
		}

		if self.backend.primary.is_empty() {
			return Err(ConfigError::Validation(
				"Backend primary implementation cannot be empty".into(),
			));
		}
		if self.backend.primary_config().is_none() {
			return Err(ConfigError::Validation(format!(
				"Primary backend '{}' not found in implementations",
				self.backend.primary
			)));
		}

		Ok(())
	}
}

/// Resolves environment variables in a string.
///
/// Replaces `${VAR_NAME}` with the value of `VAR_NAME`, or with `default` for
/// `${VAR_NAME:-default}` when the variable is unset.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	// Bound the input handed to the regex engine
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut result = String::with_capacity(input.len());
	let mut last = 0;
	for cap in re.captures_iter(input) {
		let (Some(full), Some(name)) = (cap.get(0), cap.get(1)) else {
			continue;
		};

		let value = match std::env::var(name.as_str()) {
			Ok(value) => value,
			Err(_) => match cap.get(2) {
				Some(default) => default.as_str().to_string(),
				None => {
					return Err(ConfigError::Validation(format!(
						"Environment variable '{}' not found",
						name.as_str()
					)))
				},
			},
		};

		result.push_str(&input[last..full.start()]);
		result.push_str(&value);
		last = full.end();
	}
	result.push_str(&input[last..]);

	Ok(result)
}

impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}
