//! # WavePass
//!
//! A bounded ticket marketplace. Vendors release tickets into a shared pool
//! in batches on a fixed cadence; customers buy them one at a time; an
//! operator drives everything from a line-oriented console.
//!
//! This crate assembles the pieces:
//!
//! - [`config`]: defaults, environment overrides and the JSON config file
//! - [`registry`]: vendor and customer accounts with hashed passwords
//! - [`activity_file`]: appends the activity log to disk
//! - [`app`]: the composed application ([`WavePassApp`])
//! - [`console`]: command parsing and execution
//! - [`telemetry`]: tracing and Prometheus setup for the binaries
//!
//! # Example
//!
//! ```no_run
//! use wavepass::{Config, WavePassApp};
//! use wavepass::registry::SignUp;
//!
//! # async fn run() -> Result<(), wavepass::AppError> {
//! let app = WavePassApp::new(Config::default())?;
//! let vendor = app.register_vendor(
//!     &SignUp {
//!         name: "Wave Events".to_string(),
//!         email: "events@wave.lk".to_string(),
//!         mobile: "0771234567".to_string(),
//!         password: "secret1".to_string(),
//!     },
//!     20,
//!     5,
//! )?;
//! app.start(&wavepass::registry::Principal::Vendor(vendor))?;
//! let (_report, status) = app.shutdown().await;
//! println!("released {}", status.pool.released);
//! # Ok(())
//! # }
//! ```

pub mod activity_file;
pub mod app;
pub mod config;
pub mod console;
pub mod registry;

pub use app::{AppError, SystemStatus, WavePassApp};
pub use config::{Config, ConfigError};
pub use console::{Command, Console, Reply};

/// Process-wide tracing and metrics installation.
pub mod telemetry {
    use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    /// Install the global tracing subscriber.
    ///
    /// `RUST_LOG` wins over `default_filter`, which is normally the
    /// configured `logging.log_level`. Log lines go to stderr so they do not
    /// interleave with console replies on stdout.
    pub fn init_tracing(default_filter: &str) {
        tracing_subscriber::registry()
            .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    /// Install the Prometheus recorder and describe the marketplace metrics.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError`] if a recorder is already installed.
    pub fn install_metrics() -> Result<PrometheusHandle, BuildError> {
        let handle = PrometheusBuilder::new().install_recorder()?;
        wavepass_runtime::metrics::register_marketplace_metrics();
        Ok(handle)
    }
}
