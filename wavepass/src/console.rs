//! Line-oriented operator console.
//!
//! Input lines parse into a [`Command`]; a [`Console`] executes commands
//! against a [`WavePassApp`] and returns the text to print. Parsing has no
//! side effects, and execution never reads from or writes to the terminal,
//! so both are tested without I/O.

use crate::app::{SystemStatus, WavePassApp};
use crate::config::Config;
use crate::registry::{Principal, SignUp};
use metrics_exporter_prometheus::PrometheusHandle;
use std::fmt::Write as _;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use wavepass_core::{Ticket, TicketId, TicketStatus};
use wavepass_runtime::SupervisorError;

const HELP: &str = "\
Commands:
  help                                   Show this help
  status                                 System counters
  logs [n]                               Last n activity lines (default 20)
  logs follow                            Print activity as it happens until Enter
  metrics                                Prometheus metrics snapshot
  config                                 Configuration in use
  config set <field> <value>             Save a change to the config file
  register vendor <name> <email> <mobile> <password> <total> <per_release>
  register customer <name> <email> <mobile> <password> <total>
  login <email> <password>               Log in and start your worker
  start                                  Start your worker
  stop                                   Stop your worker
  params <total> [per_release]           Replace your plan (vendors give per_release)
  tickets                                Your tickets
  refund <ticket_id>                     Return a ticket you own (customers)
  logout                                 End the session
  exit                                   Shut down";

/// Lines of history shown when following the activity log
const FOLLOW_BACKLOG: usize = 20;

/// A parsed console command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Show usage
    Help,
    /// System counters
    Status,
    /// Tail the activity log
    Logs(usize),
    /// Keep printing the activity log as it grows
    Follow,
    /// Render metrics
    Metrics,
    /// Show configuration
    Config,
    /// Change one field of the config file
    ConfigSet {
        /// Dotted field name
        field: String,
        /// New value as typed
        value: String,
    },
    /// Register a vendor
    RegisterVendor {
        /// Contact and password
        sign_up: SignUpArgs,
        /// Tickets to release
        total: u32,
        /// Batch size
        per_release: u32,
    },
    /// Register a customer
    RegisterCustomer {
        /// Contact and password
        sign_up: SignUpArgs,
        /// Tickets to buy
        total: u32,
    },
    /// Log in
    Login {
        /// Account email
        email: String,
        /// Account password
        password: String,
    },
    /// Start the session's worker
    Start,
    /// Stop the session's worker
    Stop,
    /// Replace the session actor's plan
    Params {
        /// New total
        total: u32,
        /// New batch size, vendors only
        per_release: Option<u32>,
    },
    /// List the session actor's tickets
    Tickets,
    /// Refund a ticket
    Refund(TicketId),
    /// End the session
    Logout,
    /// Shut down
    Exit,
}

/// Registration fields as typed on the console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignUpArgs {
    /// Display name
    pub name: String,
    /// Email
    pub email: String,
    /// Mobile number
    pub mobile: String,
    /// Password
    pub password: String,
}

impl From<SignUpArgs> for SignUp {
    fn from(args: SignUpArgs) -> Self {
        Self {
            name: args.name,
            email: args.email,
            mobile: args.mobile,
            password: args.password,
        }
    }
}

/// Why a line did not parse.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Blank line
    #[error("empty command")]
    Empty,

    /// First word is not a command
    #[error("unknown command '{0}', type 'help' for a list")]
    Unknown(String),

    /// Wrong number of arguments
    #[error("usage: {0}")]
    Usage(&'static str),

    /// A numeric argument is not a positive integer
    #[error("'{0}' is not a positive number")]
    NotPositive(String),
}

fn positive(raw: &str) -> Result<u32, ParseError> {
    match raw.parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ParseError::NotPositive(raw.to_string())),
    }
}

fn sign_up_args(words: &[&str]) -> SignUpArgs {
    SignUpArgs {
        name: words[0].to_string(),
        email: words[1].to_string(),
        mobile: words[2].to_string(),
        password: words[3].to_string(),
    }
}

impl FromStr for Command {
    type Err = ParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let words: Vec<&str> = line.split_whitespace().collect();
        let Some((&head, args)) = words.split_first() else {
            return Err(ParseError::Empty);
        };

        match (head.to_ascii_lowercase().as_str(), args) {
            ("help", []) => Ok(Self::Help),
            ("status", []) => Ok(Self::Status),
            ("logs", []) => Ok(Self::Logs(20)),
            ("logs", [mode]) if mode.eq_ignore_ascii_case("follow") => Ok(Self::Follow),
            ("logs", [n]) => {
                let n = positive(n)?;
                Ok(Self::Logs(usize::try_from(n).unwrap_or(usize::MAX)))
            }
            ("metrics", []) => Ok(Self::Metrics),
            ("config", []) => Ok(Self::Config),
            ("config", [set, field, value]) if set.eq_ignore_ascii_case("set") => {
                Ok(Self::ConfigSet {
                    field: (*field).to_string(),
                    value: (*value).to_string(),
                })
            }
            ("register", [role, rest @ ..]) => match (role.to_ascii_lowercase().as_str(), rest) {
                ("vendor", [_, _, _, _, total, per_release]) => Ok(Self::RegisterVendor {
                    sign_up: sign_up_args(rest),
                    total: positive(total)?,
                    per_release: positive(per_release)?,
                }),
                ("customer", [_, _, _, _, total]) => Ok(Self::RegisterCustomer {
                    sign_up: sign_up_args(rest),
                    total: positive(total)?,
                }),
                ("vendor", _) => Err(ParseError::Usage(
                    "register vendor <name> <email> <mobile> <password> <total> <per_release>",
                )),
                _ => Err(ParseError::Usage(
                    "register customer <name> <email> <mobile> <password> <total>",
                )),
            },
            ("login", [email, password]) => Ok(Self::Login {
                email: (*email).to_string(),
                password: (*password).to_string(),
            }),
            ("start", []) => Ok(Self::Start),
            ("stop", []) => Ok(Self::Stop),
            ("params", [total]) => Ok(Self::Params {
                total: positive(total)?,
                per_release: None,
            }),
            ("params", [total, per_release]) => Ok(Self::Params {
                total: positive(total)?,
                per_release: Some(positive(per_release)?),
            }),
            ("tickets", []) => Ok(Self::Tickets),
            ("refund", [id]) => Ok(Self::Refund(TicketId::new(u64::from(positive(id)?)))),
            ("logout", []) => Ok(Self::Logout),
            ("exit" | "quit", []) => Ok(Self::Exit),
            ("register", []) => Err(ParseError::Usage("register <vendor|customer> ...")),
            ("logs", _) => Err(ParseError::Usage("logs [n|follow]")),
            ("config", _) => Err(ParseError::Usage("config [set <field> <value>]")),
            ("login", _) => Err(ParseError::Usage("login <email> <password>")),
            ("params", _) => Err(ParseError::Usage("params <total> [per_release]")),
            ("refund", _) => Err(ParseError::Usage("refund <ticket_id>")),
            (
                "help" | "status" | "metrics" | "start" | "stop" | "tickets" | "logout" | "exit"
                | "quit",
                _,
            ) => Err(ParseError::Usage("this command takes no arguments")),
            (other, _) => Err(ParseError::Unknown(other.to_string())),
        }
    }
}

/// What the caller should do after a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Print and keep reading
    Continue(String),
    /// Print, then poll [`Console::follow_activity`] until the operator
    /// interrupts
    Follow(String),
    /// Print and shut down
    Exit(String),
}

impl Reply {
    /// Text to print
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Continue(text) | Self::Follow(text) | Self::Exit(text) => text,
        }
    }
}

/// Console session over one application.
pub struct Console {
    app: Arc<WavePassApp>,
    metrics: Option<PrometheusHandle>,
    session: Option<Principal>,
    config_path: Option<PathBuf>,
    /// Config file contents as last saved; the running app keeps its own
    saved_config: Config,
    log_cursor: usize,
}

impl Console {
    /// Create a console; `metrics` is the installed Prometheus recorder, if any
    #[must_use]
    pub fn new(app: Arc<WavePassApp>, metrics: Option<PrometheusHandle>) -> Self {
        let saved_config = app.config().clone();
        Self {
            app,
            metrics,
            session: None,
            config_path: None,
            saved_config,
            log_cursor: 0,
        }
    }

    /// Let `config set` write to the file the app was configured from
    #[must_use]
    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    /// The logged-in actor, if any
    #[must_use]
    pub const fn session(&self) -> Option<&Principal> {
        self.session.as_ref()
    }

    /// Prompt to show before reading the next line
    #[must_use]
    pub fn prompt(&self) -> String {
        self.session
            .as_ref()
            .map_or_else(|| "wavepass> ".to_string(), |p| format!("{}@wavepass> ", p.actor()))
    }

    /// Parse and execute one input line
    pub fn handle_line(&mut self, line: &str) -> Reply {
        match line.parse::<Command>() {
            Ok(command) => self.execute(command),
            Err(ParseError::Empty) => Reply::Continue(String::new()),
            Err(error) => Reply::Continue(error.to_string()),
        }
    }

    /// Execute a parsed command
    pub fn execute(&mut self, command: Command) -> Reply {
        let text = match command {
            Command::Exit => return Reply::Exit("Shutting down...".to_string()),
            Command::Help => HELP.to_string(),
            Command::Status => render_status(&self.app.status()),
            Command::Logs(n) => self.logs(n),
            Command::Follow => return Reply::Follow(self.start_follow()),
            Command::Metrics => self.metrics.as_ref().map_or_else(
                || "Metrics recorder is not installed.".to_string(),
                PrometheusHandle::render,
            ),
            Command::Config => serde_json::to_string_pretty(self.app.config())
                .unwrap_or_else(|error| format!("Could not render config: {error}")),
            Command::ConfigSet { field, value } => self.set_config(&field, &value),
            Command::RegisterVendor {
                sign_up,
                total,
                per_release,
            } => match self.app.register_vendor(&sign_up.into(), total, per_release) {
                Ok(vendor) => format!(
                    "Vendor registered: {} ({}). Log in to start releasing.",
                    vendor.name(),
                    vendor.id()
                ),
                Err(error) => format!("Registration failed: {error}"),
            },
            Command::RegisterCustomer { sign_up, total } => {
                match self.app.register_customer(&sign_up.into(), total) {
                    Ok(customer) => format!(
                        "Customer registered: {} ({}). Log in to start purchasing.",
                        customer.name(),
                        customer.id()
                    ),
                    Err(error) => format!("Registration failed: {error}"),
                }
            }
            Command::Login { email, password } => self.login(&email, &password),
            Command::Logout => match self.session.take() {
                Some(principal) => format!("Logged out {}.", principal.name()),
                None => "Not logged in.".to_string(),
            },
            Command::Start => self.with_session(start_message),
            Command::Stop => self.with_session(|app, principal| match app.stop(principal) {
                Ok(()) => format!("{} stopped.", principal.actor()),
                Err(error) => capitalize(&error.to_string()),
            }),
            Command::Params { total, per_release } => {
                self.with_session(|app, principal| params(app, principal, total, per_release))
            }
            Command::Tickets => self.with_session(tickets),
            Command::Refund(ticket) => self.with_session(|app, principal| match principal {
                Principal::Customer(customer) => {
                    if app.refund(customer.id(), ticket) {
                        format!("Ticket ID {ticket} has been successfully refunded.")
                    } else {
                        "Refund failed. Please ensure the Ticket ID is correct and you own \
                         the ticket."
                            .to_string()
                    }
                }
                Principal::Vendor(_) => "Only customers can refund tickets.".to_string(),
            }),
        };
        Reply::Continue(text)
    }

    fn with_session(&self, f: impl FnOnce(&WavePassApp, &Principal) -> String) -> String {
        self.session.as_ref().map_or_else(
            || "Log in first.".to_string(),
            |principal| f(&self.app, principal),
        )
    }

    fn login(&mut self, email: &str, password: &str) -> String {
        let Some(principal) = self.app.login(email, password) else {
            return "Invalid email or password.".to_string();
        };
        let mut out = format!("Login successful. Welcome, {}!", principal.name());
        out.push('\n');
        out.push_str(&start_message(&self.app, &principal));
        self.session = Some(principal);
        out
    }

    /// Activity lines recorded since the previous call.
    ///
    /// Pairs with [`Reply::Follow`]: the caller polls this until the
    /// operator stops following.
    pub fn follow_activity(&mut self) -> Vec<String> {
        let entries = self.app.activity().since(self.log_cursor);
        self.log_cursor += entries.len();
        entries.iter().map(ToString::to_string).collect()
    }

    fn start_follow(&mut self) -> String {
        let activity = self.app.activity();
        let start = activity.len().saturating_sub(FOLLOW_BACKLOG);
        let backlog = activity.since(start);
        self.log_cursor = start + backlog.len();

        let mut out: Vec<String> = backlog.iter().map(ToString::to_string).collect();
        out.push("Following activity, press Enter to stop.".to_string());
        out.join("\n")
    }

    fn set_config(&mut self, field: &str, value: &str) -> String {
        let Some(path) = &self.config_path else {
            return "No config file in use, nothing to update.".to_string();
        };
        let mut next = self.saved_config.clone();
        if let Err(error) = next.set(field, value) {
            return capitalize(&error.to_string());
        }
        match next.save(path) {
            Ok(()) => {
                let reply = format!(
                    "Saved {field} = {value} to {}. Changes apply on the next start.",
                    path.display()
                );
                self.saved_config = next;
                reply
            }
            Err(error) => format!("Could not save config: {error}"),
        }
    }

    fn logs(&self, n: usize) -> String {
        let entries = self.app.activity().tail(n);
        if entries.is_empty() {
            return "No activity yet.".to_string();
        }
        entries
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl std::fmt::Debug for Console {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Console")
            .field("session", &self.session.as_ref().map(Principal::actor))
            .finish_non_exhaustive()
    }
}

fn start_message(app: &WavePassApp, principal: &Principal) -> String {
    let actor = principal.actor();
    match app.start(principal) {
        Ok(()) => match principal {
            Principal::Vendor(_) => format!("{actor} started releasing tickets."),
            Principal::Customer(_) => format!("{actor} started purchasing tickets."),
        },
        Err(SupervisorError::AlreadyRunning(_)) => format!("{actor} is already running."),
        Err(error) => capitalize(&error.to_string()),
    }
}

fn params(
    app: &WavePassApp,
    principal: &Principal,
    total: u32,
    per_release: Option<u32>,
) -> String {
    let result = match (principal, per_release) {
        (Principal::Vendor(vendor), Some(per_release)) => {
            app.update_vendor(vendor, total, per_release)
        }
        (Principal::Vendor(_), None) => {
            return "Vendors must give both <total> and <per_release>.".to_string();
        }
        (Principal::Customer(customer), None) => app.update_customer(customer, total),
        (Principal::Customer(_), Some(_)) => {
            return "Customers only give <total>.".to_string();
        }
    };
    match result {
        Ok(()) => match principal {
            Principal::Vendor(_) => "Releasing parameters updated.".to_string(),
            Principal::Customer(_) => "Purchasing parameters updated.".to_string(),
        },
        Err(error) => capitalize(&error.to_string()),
    }
}

fn tickets(app: &WavePassApp, principal: &Principal) -> String {
    match principal {
        Principal::Vendor(vendor) => {
            let released = app.vendor_tickets(vendor.id());
            if released.is_empty() {
                return "You have not released any tickets yet.".to_string();
            }
            let mut out = String::from("--- Your Tickets ---");
            for ticket in &released {
                let _ = write!(out, "\n - {}", describe(app, ticket));
            }
            out
        }
        Principal::Customer(customer) => {
            let owned = app.customer_tickets(customer.id());
            if owned.is_empty() {
                return "You have no tickets.".to_string();
            }
            let mut out = String::from("Your Tickets:");
            for ticket in &owned {
                let _ = write!(out, "\n - Ticket ID: {} ({})", ticket.id(), ticket.price());
            }
            out
        }
    }
}

fn describe(app: &WavePassApp, ticket: &Ticket) -> String {
    match ticket.status() {
        TicketStatus::Available => format!("Ticket ID: {}, Status: available", ticket.id()),
        TicketStatus::Sold { owner } => match app.registry().customer_summary(owner) {
            Some(account) => format!(
                "Ticket ID: {}, Status: sold (Purchased by Customer ID: {}, Name: {})",
                ticket.id(),
                owner.value(),
                account.name
            ),
            None => format!(
                "Ticket ID: {}, Status: sold (Purchased by Customer ID: {})",
                ticket.id(),
                owner.value()
            ),
        },
    }
}

/// Render the status screen
#[must_use]
pub fn render_status(status: &SystemStatus) -> String {
    let running = if status.running.is_empty() {
        "none".to_string()
    } else {
        status
            .running
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    };
    format!(
        "--- Current System Status ---\n\
         Total tickets released: {}\n\
         Total tickets sold: {}\n\
         Tickets remaining in pool: {}\n\
         Pool capacity used: {}/{}\n\
         Release allowance left: {}\n\
         Revenue: {}\n\
         Registered vendors: {}\n\
         Registered customers: {}\n\
         Running workers: {}",
        status.pool.released,
        status.pool.sold,
        status.pool.available,
        status.pool.stored,
        status.pool.capacity,
        status.remaining_allowance,
        status.pool.revenue,
        status.vendors,
        status.customers,
        running,
    )
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}
