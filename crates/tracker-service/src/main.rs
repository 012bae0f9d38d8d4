//! Main entry point for the pharmacy order tracker.
//!
//! This binary loads a configuration file, wires the configured backend into
//! an order tracker, and runs one command against it: listing orders, showing
//! purchase history or a single order, watching payment countdowns, cancelling,
//! paying, or updating an order's status on behalf of staff.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracker_config::Config;
use tracker_core::{OrderTracker, TrackerBuilder};
use tracker_types::OrderStatus;

mod commands;
mod render;

// Import implementations from the api crate
use tracker_api::implementations::http::create_backend as create_http_backend;
use tracker_api::implementations::memory::create_backend as create_memory_backend;

/// Command-line arguments for the order tracker.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config/tracker.toml", env = "TRACKER_CONFIG")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "warn")]
	log_level: String,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
	/// List your orders with payment countdowns and available actions
	List {
		/// Only show orders with this status (or "all")
		#[arg(long, default_value = "all")]
		status: String,
	},
	/// Show purchase history, newest first
	History {
		#[arg(long, default_value = "all")]
		status: String,
	},
	/// Show one order with its items
	Show { order_id: String },
	/// Follow payment countdowns until they expire or Ctrl-C is pressed
	Watch,
	/// Cancel a pending order
	Cancel {
		order_id: String,
		/// Position of the reason in the list (7 = other reason)
		#[arg(long, value_parser = clap::value_parser!(u8).range(1..=7))]
		reason: u8,
		/// Free text, required with reason 7
		#[arg(long)]
		custom: Option<String>,
	},
	/// Start an online payment
	Pay { order_id: String },
	/// Move an order to a new status (staff)
	SetStatus {
		order_id: String,
		#[arg(value_parser = parse_status)]
		status: OrderStatus,
		/// Reason, required when cancelling
		#[arg(long)]
		reason: Option<String>,
	},
}

/// Parses a status name strictly; unlike backend data, typos are rejected.
fn parse_status(raw: &str) -> Result<OrderStatus, String> {
	let normalized = match raw.trim().to_ascii_lowercase().as_str() {
		"canceled" => "cancelled".to_string(),
		other => other.to_string(),
	};
	OrderStatus::ALL
		.into_iter()
		.find(|status| status.as_str() == normalized)
		.ok_or_else(|| {
			let names: Vec<&str> = OrderStatus::ALL.iter().map(|s| s.as_str()).collect();
			format!("unknown status '{}', expected one of: {}", raw, names.join(", "))
		})
}

/// Main entry point for the order tracker.
///
/// This function:
/// 1. Parses command-line arguments
/// 2. Initializes logging infrastructure
/// 3. Loads configuration from file
/// 4. Builds the tracker with the configured backend
/// 5. Runs the requested command
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	// Initialize tracing with env filter
	use tracing_subscriber::{fmt, EnvFilter};

	// Create env filter with default from args
	let default_directive = args.log_level.to_string();
	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

	// Logs go to stderr so command output stays clean
	fmt()
		.with_env_filter(env_filter)
		.with_target(true)
		.with_writer(std::io::stderr)
		.init();

	let config = Config::from_file(&args.config).await?;
	tracing::info!(
		config = %args.config.display(),
		backend = %config.backend.primary,
		"Loaded configuration"
	);

	let tracker = build_tracker(config)?;
	let result = commands::run(&tracker, args.command).await;
	tracker.shutdown().await;
	result
}

/// Macro to create a factory HashMap with the appropriate type aliases
macro_rules! create_factory_map {
    ($interface:path, $error:path, $( $name:literal => $factory:expr ),* $(,)?) => {{
        let mut factories = std::collections::HashMap::new();
        $(
            factories.insert(
                $name.to_string(),
                $factory as fn(&toml::Value) -> Result<Box<dyn $interface>, $error>
            );
        )*
        factories
    }};
}

/// Builds the tracker with every available backend implementation.
fn build_tracker(config: Config) -> Result<OrderTracker, Box<dyn std::error::Error>> {
	let backend_factories = create_factory_map!(
		tracker_api::BackendInterface,
		tracker_api::ApiError,
		"http" => create_http_backend,
		"memory" => create_memory_backend,
	);

	Ok(TrackerBuilder::new(config).build(&backend_factories)?)
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::fs;
	use tempfile::TempDir;

	#[test]
	fn test_parse_cancel_command() {
		let args = Args::try_parse_from([
			"tracker",
			"--config",
			"demo.toml",
			"cancel",
			"O1",
			"--reason",
			"7",
			"--custom",
			"Ordered twice",
		])
		.unwrap();
		assert_eq!(args.config, PathBuf::from("demo.toml"));
		assert_eq!(
			args.command,
			Command::Cancel {
				order_id: "O1".to_string(),
				reason: 7,
				custom: Some("Ordered twice".to_string()),
			}
		);
	}

	#[test]
	fn test_reason_out_of_range_rejected() {
		let result = Args::try_parse_from(["tracker", "cancel", "O1", "--reason", "8"]);
		assert!(result.is_err());
	}

	#[test]
	fn test_parse_status_strict() {
		assert_eq!(parse_status("Delivering"), Ok(OrderStatus::Delivering));
		assert_eq!(parse_status("canceled"), Ok(OrderStatus::Cancelled));
		assert!(parse_status("shipped").is_err());

		let args = Args::try_parse_from([
			"tracker",
			"set-status",
			"O1",
			"cancelled",
			"--reason",
			"Out of stock",
		])
		.unwrap();
		assert!(matches!(
			args.command,
			Command::SetStatus {
				status: OrderStatus::Cancelled,
				..
			}
		));
	}

	#[tokio::test]
	async fn test_build_tracker_from_file() {
		let temp_dir = TempDir::new().unwrap();
		let path = temp_dir.path().join("tracker.toml");
		fs::write(
			&path,
			r#"
[tracker]
tick_interval_ms = 1000

[backend]
primary = "memory"
[backend.implementations.memory]
payment_window_seconds = 900
"#,
		)
		.unwrap();

		let config = Config::from_file(&path).await.unwrap();
		let tracker = build_tracker(config).unwrap();
		assert_eq!(tracker.load_orders().await.ok(), Some(0));
	}
}
