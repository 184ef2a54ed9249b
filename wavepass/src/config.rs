//! Configuration management for the WavePass application.
//!
//! Loads configuration from environment variables with sensible defaults, or
//! from a JSON file written by a previous run.

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing_subscriber::EnvFilter;
use wavepass_core::Money;
use wavepass_runtime::SupervisorConfig;

/// Errors from loading, saving or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Reading or writing the config file failed
    #[error("config file {path}: {source}")]
    Io {
        /// File involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid JSON for [`Config`]
    #[error("config file is not valid: {0}")]
    Json(#[from] serde_json::Error),

    /// A value is out of range
    #[error("invalid configuration: {field} {reason}")]
    Invalid {
        /// Offending field
        field: &'static str,
        /// What is wrong with it
        reason: &'static str,
    },

    /// [`Config::set`] was given a field name it does not know
    #[error("unknown configuration field '{0}'")]
    UnknownField(String),

    /// [`Config::set`] was given a value that does not parse for its field
    #[error("'{value}' is not a valid value for {field}")]
    BadValue {
        /// Field being set
        field: String,
        /// Rejected text
        value: String,
    },
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Ticket supply and cadence
    pub tickets: TicketConfig,
    /// Executor widths and shutdown
    pub workers: WorkerConfig,
    /// Logging and activity output
    pub logging: LoggingConfig,
}

/// Ticket supply and cadence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketConfig {
    /// System-wide ceiling on tickets released across all vendors
    pub total_tickets: u64,
    /// Pool capacity
    pub max_capacity: u64,
    /// Pause between a vendor's batches in milliseconds
    pub release_interval_ms: u64,
    /// Pause between a customer's purchases in milliseconds
    pub retrieval_interval_ms: u64,
    /// Unit price of every ticket
    pub ticket_price: Money,
}

/// Executor widths and shutdown
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Vendor workers running at once (default: 10)
    pub vendor_concurrency: usize,
    /// Customer workers running at once (default: 50)
    pub customer_concurrency: usize,
    /// Seconds shutdown waits before aborting workers (default: 5)
    pub shutdown_grace_secs: u64,
}

/// Logging and activity output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default `tracing` filter when `RUST_LOG` is unset, e.g. `info` or
    /// `info,wavepass=debug`
    pub log_level: String,
    /// File the activity log is appended to, if any
    pub activity_log_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tickets: TicketConfig {
                total_tickets: 100,
                max_capacity: 50,
                release_interval_ms: 1_000,
                retrieval_interval_ms: 1_500,
                ticket_price: Money::from_cents(2_500),
            },
            workers: WorkerConfig {
                vendor_concurrency: 10,
                customer_concurrency: 50,
                shutdown_grace_secs: 5,
            },
            logging: LoggingConfig {
                log_level: "info".to_string(),
                activity_log_path: Some(PathBuf::from("activity.log")),
            },
        }
    }
}

/// Dotted names accepted by [`Config::set`]
pub const FIELDS: [&str; 10] = [
    "tickets.total_tickets",
    "tickets.max_capacity",
    "tickets.release_interval_ms",
    "tickets.retrieval_interval_ms",
    "tickets.ticket_price",
    "workers.vendor_concurrency",
    "workers.customer_concurrency",
    "workers.shutdown_grace_secs",
    "logging.log_level",
    "logging.activity_log_path",
];

fn parsed<T: FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.parse().ok())
}

fn value_of<T: FromStr>(field: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::BadValue {
        field: field.to_string(),
        value: value.to_string(),
    })
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Any variable that is missing or unparsable falls back to its default.
    /// `WAVEPASS_ACTIVITY_LOG` set to an empty string disables the file log.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            tickets: TicketConfig {
                total_tickets: parsed("WAVEPASS_TOTAL_TICKETS")
                    .unwrap_or(defaults.tickets.total_tickets),
                max_capacity: parsed("WAVEPASS_MAX_CAPACITY")
                    .unwrap_or(defaults.tickets.max_capacity),
                release_interval_ms: parsed("WAVEPASS_RELEASE_INTERVAL_MS")
                    .unwrap_or(defaults.tickets.release_interval_ms),
                retrieval_interval_ms: parsed("WAVEPASS_RETRIEVAL_INTERVAL_MS")
                    .unwrap_or(defaults.tickets.retrieval_interval_ms),
                ticket_price: parsed("WAVEPASS_TICKET_PRICE_CENTS")
                    .map_or(defaults.tickets.ticket_price, Money::from_cents),
            },
            workers: WorkerConfig {
                vendor_concurrency: parsed("WAVEPASS_VENDOR_CONCURRENCY")
                    .unwrap_or(defaults.workers.vendor_concurrency),
                customer_concurrency: parsed("WAVEPASS_CUSTOMER_CONCURRENCY")
                    .unwrap_or(defaults.workers.customer_concurrency),
                shutdown_grace_secs: parsed("WAVEPASS_SHUTDOWN_GRACE_SECS")
                    .unwrap_or(defaults.workers.shutdown_grace_secs),
            },
            logging: LoggingConfig {
                log_level: env::var("RUST_LOG").unwrap_or(defaults.logging.log_level),
                activity_log_path: match env::var("WAVEPASS_ACTIVITY_LOG") {
                    Ok(path) if path.is_empty() => None,
                    Ok(path) => Some(PathBuf::from(path)),
                    Err(_) => defaults.logging.activity_log_path,
                },
            },
        }
    }

    /// Read a config file written by [`save`](Self::save).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read and
    /// [`ConfigError::Json`] if it does not parse.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this config as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be written.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Change one field by its dotted name, e.g. `tickets.max_capacity`.
    ///
    /// Prices are given in cents. `none` clears
    /// `logging.activity_log_path`. The result is validated as a whole, and
    /// `self` is left untouched on any error.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownField`] for a name not in [`FIELDS`],
    /// [`ConfigError::BadValue`] if `value` does not parse, and
    /// [`ConfigError::Invalid`] if the changed config fails
    /// [`validate`](Self::validate).
    pub fn set(&mut self, field: &str, value: &str) -> Result<(), ConfigError> {
        let mut next = self.clone();
        match field {
            "tickets.total_tickets" => next.tickets.total_tickets = value_of(field, value)?,
            "tickets.max_capacity" => next.tickets.max_capacity = value_of(field, value)?,
            "tickets.release_interval_ms" => {
                next.tickets.release_interval_ms = value_of(field, value)?;
            }
            "tickets.retrieval_interval_ms" => {
                next.tickets.retrieval_interval_ms = value_of(field, value)?;
            }
            "tickets.ticket_price" => {
                next.tickets.ticket_price = Money::from_cents(value_of(field, value)?);
            }
            "workers.vendor_concurrency" => {
                next.workers.vendor_concurrency = value_of(field, value)?;
            }
            "workers.customer_concurrency" => {
                next.workers.customer_concurrency = value_of(field, value)?;
            }
            "workers.shutdown_grace_secs" => {
                next.workers.shutdown_grace_secs = value_of(field, value)?;
            }
            "logging.log_level" => next.logging.log_level = value.to_string(),
            "logging.activity_log_path" => {
                next.logging.activity_log_path = if value.eq_ignore_ascii_case("none") {
                    None
                } else {
                    Some(PathBuf::from(value))
                };
            }
            _ => return Err(ConfigError::UnknownField(field.to_string())),
        }
        next.validate()?;
        *self = next;
        Ok(())
    }

    /// Check every value is usable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad field: any
    /// count, interval or price of zero, a ticket ceiling below the pool
    /// capacity, or a log level that is not a `tracing` filter directive.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("tickets.total_tickets", self.tickets.total_tickets),
            ("tickets.max_capacity", self.tickets.max_capacity),
            ("tickets.release_interval_ms", self.tickets.release_interval_ms),
            ("tickets.retrieval_interval_ms", self.tickets.retrieval_interval_ms),
            ("tickets.ticket_price", self.tickets.ticket_price.cents()),
            ("workers.shutdown_grace_secs", self.workers.shutdown_grace_secs),
        ];
        if let Some(&(field, _)) = positive.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::Invalid {
                field,
                reason: "must be greater than zero",
            });
        }
        if self.workers.vendor_concurrency == 0 {
            return Err(ConfigError::Invalid {
                field: "workers.vendor_concurrency",
                reason: "must be greater than zero",
            });
        }
        if self.workers.customer_concurrency == 0 {
            return Err(ConfigError::Invalid {
                field: "workers.customer_concurrency",
                reason: "must be greater than zero",
            });
        }
        if self.tickets.total_tickets < self.tickets.max_capacity {
            return Err(ConfigError::Invalid {
                field: "tickets.total_tickets",
                reason: "must be at least tickets.max_capacity",
            });
        }
        if EnvFilter::try_new(&self.logging.log_level).is_err() {
            return Err(ConfigError::Invalid {
                field: "logging.log_level",
                reason: "is not a valid filter directive",
            });
        }
        Ok(())
    }

    /// Pause between a vendor's batches
    #[must_use]
    pub const fn release_interval(&self) -> Duration {
        Duration::from_millis(self.tickets.release_interval_ms)
    }

    /// Pause between a customer's purchases
    #[must_use]
    pub const fn retrieval_interval(&self) -> Duration {
        Duration::from_millis(self.tickets.retrieval_interval_ms)
    }

    /// Executor settings for the supervisor
    #[must_use]
    pub const fn supervisor(&self) -> SupervisorConfig {
        SupervisorConfig {
            vendor_concurrency: self.workers.vendor_concurrency,
            customer_concurrency: self.workers.customer_concurrency,
            shutdown_grace: Duration::from_secs(self.workers.shutdown_grace_secs),
        }
    }
}
