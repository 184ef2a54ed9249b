#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]
//! Operator console sessions driven line by line.

use std::sync::Arc;
use std::time::Duration;
use wavepass::{Config, Console, Reply, WavePassApp};
use wavepass_runtime::WorkerState;
use wavepass_testing::helpers::eventually;
use wavepass_testing::test_clock;

fn console() -> (Console, Arc<WavePassApp>) {
    let mut config = Config::default();
    config.tickets.total_tickets = 20;
    config.tickets.max_capacity = 10;
    config.tickets.release_interval_ms = 100;
    config.tickets.retrieval_interval_ms = 100;
    config.logging.activity_log_path = None;
    let app = Arc::new(WavePassApp::with_clock(config, Arc::new(test_clock())).unwrap());
    (Console::new(Arc::clone(&app), None), app)
}

fn say(console: &mut Console, line: &str) -> String {
    match console.handle_line(line) {
        Reply::Continue(text) | Reply::Follow(text) => text,
        Reply::Exit(text) => panic!("unexpected exit: {text}"),
    }
}

#[tokio::test(start_paused = true)]
async fn vendor_session_releases_and_lists_tickets() {
    let (mut console, app) = console();

    let reply = say(
        &mut console,
        "register vendor Harbour harbour@wave.lk 0771234567 secret1 4 2",
    );
    assert_eq!(
        reply,
        "Vendor registered: Harbour (Vendor-1). Log in to start releasing."
    );

    let reply = say(&mut console, "login harbour@wave.lk secret1");
    assert_eq!(
        reply,
        "Login successful. Welcome, Harbour!\nVendor-1 started releasing tickets."
    );
    assert_eq!(console.prompt(), "Vendor-1@wavepass> ");

    let vendor = app.registry().vendors()[0].clone();
    assert!(
        eventually(Duration::from_secs(1), || vendor.state() == WorkerState::Completed).await
    );

    let listing = say(&mut console, "tickets");
    assert!(listing.starts_with("--- Your Tickets ---"));
    assert_eq!(listing.matches("Status: available").count(), 4);

    assert_eq!(
        say(&mut console, "refund 1"),
        "Only customers can refund tickets."
    );
    assert_eq!(
        say(&mut console, "params 3"),
        "Vendors must give both <total> and <per_release>."
    );
    assert_eq!(say(&mut console, "params 3 1"), "Releasing parameters updated.");
    assert_eq!(say(&mut console, "logout"), "Logged out Harbour.");
    assert_eq!(console.prompt(), "wavepass> ");
}

#[tokio::test(start_paused = true)]
async fn customer_session_buys_and_refunds() {
    let (mut console, app) = console();
    say(
        &mut console,
        "register vendor Harbour harbour@wave.lk 0771234567 secret1 5 5",
    );
    say(&mut console, "login harbour@wave.lk secret1");
    assert!(eventually(Duration::from_secs(1), || app.pool().available() == 5).await);
    say(&mut console, "logout");

    say(
        &mut console,
        "register customer Ann ann@wave.lk +94771234567 secret1 2",
    );
    assert_eq!(
        say(&mut console, "login ANN@wave.lk secret1"),
        "Login successful. Welcome, Ann!\nCustomer-1 started purchasing tickets."
    );
    let customer = app.registry().customers()[0].clone();
    assert!(
        eventually(Duration::from_secs(1), || customer.state() == WorkerState::Completed).await
    );

    assert_eq!(
        say(&mut console, "tickets"),
        "Your Tickets:\n - Ticket ID: 1 (LKR 25.00)\n - Ticket ID: 2 (LKR 25.00)"
    );
    assert_eq!(
        say(&mut console, "refund 1"),
        "Ticket ID 1 has been successfully refunded."
    );
    assert_eq!(
        say(&mut console, "refund 1"),
        "Refund failed. Please ensure the Ticket ID is correct and you own the ticket."
    );
    assert_eq!(
        say(&mut console, "tickets"),
        "Your Tickets:\n - Ticket ID: 2 (LKR 25.00)"
    );
    assert!(say(&mut console, "logs 1").ends_with("Customer-1 refunded Ticket ID 1."));
}

#[tokio::test(start_paused = true)]
async fn vendor_listing_names_buyers() {
    let (mut console, app) = console();
    say(
        &mut console,
        "register vendor Harbour harbour@wave.lk 0771234567 secret1 1 1",
    );
    say(
        &mut console,
        "register customer Ann ann@wave.lk 0777654321 secret1 1",
    );
    say(&mut console, "login harbour@wave.lk secret1");
    assert!(eventually(Duration::from_secs(1), || app.pool().available() == 1).await);
    say(&mut console, "logout");
    say(&mut console, "login ann@wave.lk secret1");
    assert!(eventually(Duration::from_secs(1), || app.pool().sold() == 1).await);
    say(&mut console, "logout");

    say(&mut console, "login harbour@wave.lk secret1");
    assert_eq!(
        say(&mut console, "tickets"),
        "--- Your Tickets ---\n - Ticket ID: 1, Status: sold \
         (Purchased by Customer ID: 1, Name: Ann)"
    );
}

#[tokio::test(start_paused = true)]
async fn session_commands_need_login() {
    let (mut console, _app) = console();
    for line in ["start", "stop", "tickets", "params 2", "refund 3"] {
        assert_eq!(say(&mut console, line), "Log in first.", "{line}");
    }
    assert_eq!(say(&mut console, "logout"), "Not logged in.");
    assert_eq!(
        say(&mut console, "login nobody@wave.lk secret1"),
        "Invalid email or password."
    );
}

#[tokio::test(start_paused = true)]
async fn start_and_stop_report_worker_state() {
    let (mut console, _app) = console();
    say(
        &mut console,
        "register customer Ann ann@wave.lk 0777654321 secret1 3",
    );
    say(
        &mut console,
        "register vendor Harbour harbour@wave.lk 0771234567 secret1 10 1",
    );

    say(&mut console, "login harbour@wave.lk secret1");
    assert_eq!(say(&mut console, "start"), "Vendor-1 is already running.");
    assert_eq!(say(&mut console, "stop"), "Vendor-1 stopped.");
    assert!(say(&mut console, "stop").starts_with("Vendor-1 is not"));
    assert_eq!(say(&mut console, "start"), "Vendor-1 started releasing tickets.");
}

#[tokio::test(start_paused = true)]
async fn registration_errors_are_shown() {
    let (mut console, _app) = console();
    assert_eq!(
        say(&mut console, "register customer Ann not-an-email 0777654321 secret1 3"),
        "Registration failed: invalid email address: not-an-email"
    );
    assert_eq!(
        say(&mut console, "register vendor Big big@wave.lk 0777654321 secret1 21 1"),
        "Registration failed: can only release up to 20 tickets, requested 21"
    );
    assert_eq!(say(&mut console, "register"), "usage: register <vendor|customer> ...");
    assert_eq!(
        say(&mut console, "fly"),
        "unknown command 'fly', type 'help' for a list"
    );
    assert_eq!(say(&mut console, "   "), "");
}

#[tokio::test(start_paused = true)]
async fn status_config_metrics_and_exit() {
    let (mut console, _app) = console();
    let status = say(&mut console, "status");
    assert!(status.starts_with("--- Current System Status ---"));
    assert!(status.contains("Release allowance left: 20"));
    assert!(status.contains("Running workers: none"));

    let config: Config = serde_json::from_str(&say(&mut console, "config")).unwrap();
    assert_eq!(config.tickets.max_capacity, 10);

    assert_eq!(say(&mut console, "metrics"), "Metrics recorder is not installed.");
    assert_eq!(say(&mut console, "logs"), "No activity yet.");
    assert!(say(&mut console, "help").contains("refund <ticket_id>"));

    assert_eq!(
        console.handle_line("exit"),
        Reply::Exit("Shutting down...".to_string())
    );
}

#[tokio::test(start_paused = true)]
async fn config_set_saves_for_the_next_start() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    let (console, app) = console();
    let mut console = console.with_config_path(path.clone());

    assert_eq!(
        say(&mut console, "config set tickets.max_capacity 15"),
        format!(
            "Saved tickets.max_capacity = 15 to {}. Changes apply on the next start.",
            path.display()
        )
    );
    say(&mut console, "config set tickets.total_tickets 40");
    let saved = Config::load(&path).unwrap();
    assert_eq!(saved.tickets.max_capacity, 15);
    assert_eq!(saved.tickets.total_tickets, 40);
    assert_eq!(app.config().tickets.max_capacity, 10, "running app is unchanged");

    assert_eq!(
        say(&mut console, "config set tickets.max_capacity 41"),
        "Invalid configuration: tickets.total_tickets must be at least tickets.max_capacity"
    );
    assert_eq!(
        say(&mut console, "config set tickets.colour blue"),
        "Unknown configuration field 'tickets.colour'"
    );
    assert_eq!(
        say(&mut console, "config set workers.vendor_concurrency lots"),
        "'lots' is not a valid value for workers.vendor_concurrency"
    );
    assert_eq!(Config::load(&path).unwrap(), saved);
}

#[tokio::test(start_paused = true)]
async fn config_set_needs_a_config_file() {
    let (mut console, _app) = console();
    assert_eq!(
        say(&mut console, "config set tickets.max_capacity 15"),
        "No config file in use, nothing to update."
    );
    assert_eq!(
        say(&mut console, "config set tickets.max_capacity"),
        "usage: config [set <field> <value>]"
    );
}

#[tokio::test(start_paused = true)]
async fn logs_follow_shows_each_new_line_once() {
    let (mut console, app) = console();
    assert_eq!(
        console.handle_line("logs follow"),
        Reply::Follow("Following activity, press Enter to stop.".to_string())
    );
    assert!(console.follow_activity().is_empty());

    say(
        &mut console,
        "register vendor Harbour harbour@wave.lk 0771234567 secret1 2 1",
    );
    say(&mut console, "login harbour@wave.lk secret1");
    let vendor = app.registry().vendors()[0].clone();
    assert!(
        eventually(Duration::from_secs(1), || vendor.state() == WorkerState::Completed).await
    );

    let followed = console.follow_activity();
    assert_eq!(followed.len(), app.activity().len());
    assert!(
        followed
            .iter()
            .any(|line| line.ends_with("Vendor-1 has released all tickets (2)."))
    );
    assert!(console.follow_activity().is_empty());

    let again = say(&mut console, "logs follow");
    assert!(again.contains("Vendor-1 has released all tickets (2)."));
    assert!(again.ends_with("press Enter to stop."));
    assert!(console.follow_activity().is_empty());
}
