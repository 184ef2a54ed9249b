#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]
//! End-to-end marketplace scenarios through [`WavePassApp`], on paused time.

use std::sync::Arc;
use std::time::Duration;
use wavepass::registry::{Principal, RegistryError, SignUp};
use wavepass::{AppError, Config, WavePassApp};
use wavepass_core::{TicketStatus, VendorId};
use wavepass_runtime::{SupervisorError, WorkerState};
use wavepass_testing::helpers::eventually;
use wavepass_testing::test_clock;

fn config(total_tickets: u64, max_capacity: u64) -> Config {
    let mut config = Config::default();
    config.tickets.total_tickets = total_tickets;
    config.tickets.max_capacity = max_capacity;
    config.tickets.release_interval_ms = 100;
    config.tickets.retrieval_interval_ms = 150;
    config.logging.activity_log_path = None;
    config
}

fn app(config: Config) -> WavePassApp {
    WavePassApp::with_clock(config, Arc::new(test_clock())).unwrap()
}

fn sign_up(name: &str) -> SignUp {
    SignUp {
        name: name.to_string(),
        email: format!("{}@wavepass.lk", name.to_ascii_lowercase()),
        mobile: "0771234567".to_string(),
        password: "secret1".to_string(),
    }
}

#[tokio::test(start_paused = true)]
async fn vendors_and_customers_trade_through_the_pool() {
    let app = app(config(30, 20));
    let vendor = app.register_vendor(&sign_up("Harbour"), 10, 5).unwrap();
    let customer = app.register_customer(&sign_up("Ann"), 4).unwrap();

    app.start(&Principal::Vendor(vendor.clone())).unwrap();
    assert!(eventually(Duration::from_secs(1), || app.pool().available() >= 5).await);
    app.start(&Principal::Customer(customer.clone())).unwrap();

    assert!(
        eventually(Duration::from_secs(5), || {
            vendor.state().is_terminal() && customer.state().is_terminal()
        })
        .await
    );
    assert_eq!(vendor.state(), WorkerState::Completed);
    assert_eq!(customer.state(), WorkerState::Completed);
    assert_eq!(customer.purchased(), 4);

    let status = app.status();
    assert_eq!(status.pool.released, 10);
    assert_eq!(status.pool.sold, 4);
    assert_eq!(status.pool.available, 6);
    assert_eq!(status.remaining_allowance, 20);
    assert_eq!(status.vendors, 1);
    assert_eq!(status.customers, 1);
    assert_eq!(status.pool.revenue, config(30, 20).tickets.ticket_price.times(4));

    let owned = app.customer_tickets(customer.id());
    assert_eq!(owned.len(), 4);
    assert!(owned.iter().all(|t| t.owner() == Some(customer.id())));
    assert!(
        app.vendor_tickets(vendor.id())
            .iter()
            .all(|t| t.vendor() == vendor.id())
    );
}

#[tokio::test(start_paused = true)]
async fn refund_returns_ticket_and_is_logged() {
    let app = app(config(10, 10));
    let vendor = app.register_vendor(&sign_up("Harbour"), 3, 3).unwrap();
    let ann = app.register_customer(&sign_up("Ann"), 1).unwrap();
    let bob = app.register_customer(&sign_up("Bob"), 1).unwrap();

    app.start(&Principal::Vendor(vendor.clone())).unwrap();
    assert!(eventually(Duration::from_secs(1), || vendor.state().is_terminal()).await);
    app.start(&Principal::Customer(ann.clone())).unwrap();
    assert!(eventually(Duration::from_secs(1), || ann.state().is_terminal()).await);

    let ticket = app.customer_tickets(ann.id())[0].id();
    assert!(!app.refund(bob.id(), ticket), "only the owner may refund");
    assert_eq!(app.pool().sold(), 1);

    assert!(app.refund(ann.id(), ticket));
    assert!(!app.refund(ann.id(), ticket), "a refunded ticket is available again");
    assert_eq!(app.pool().sold(), 0);
    assert_eq!(app.pool().ticket(ticket).unwrap().status(), TicketStatus::Available);

    let refunds: Vec<String> = app
        .activity()
        .entries()
        .iter()
        .map(|entry| entry.event.to_string())
        .filter(|line| line.contains("refunded"))
        .collect();
    assert_eq!(refunds, vec![format!("{} refunded Ticket ID {ticket}.", ann.id())]);
}

#[tokio::test(start_paused = true)]
async fn ceiling_limits_vendor_registration() {
    let app = app(config(10, 10));

    let err = app.register_vendor(&sign_up("Greedy"), 11, 5).unwrap_err();
    assert!(matches!(
        err,
        AppError::Registry(RegistryError::ExceedsAllowance {
            requested: 11,
            remaining: 10
        })
    ));

    let vendor = app.register_vendor(&sign_up("Harbour"), 10, 5).unwrap();
    app.start(&Principal::Vendor(vendor.clone())).unwrap();
    assert!(eventually(Duration::from_secs(2), || vendor.state().is_terminal()).await);
    assert_eq!(app.remaining_allowance(), 0);

    let err = app.register_vendor(&sign_up("Late"), 1, 1).unwrap_err();
    assert!(matches!(err, AppError::Registry(RegistryError::CeilingReached)));
}

#[tokio::test(start_paused = true)]
async fn zero_plans_are_rejected() {
    let app = app(config(10, 10));
    assert!(matches!(
        app.register_vendor(&sign_up("Harbour"), 0, 1),
        Err(AppError::Worker(_))
    ));
    assert!(matches!(
        app.register_customer(&sign_up("Ann"), 0),
        Err(AppError::Worker(_))
    ));

    let vendor = app.register_vendor(&sign_up("Harbour"), 5, 1).unwrap();
    assert!(app.update_vendor(&vendor, 5, 0).is_err());
    assert_eq!(vendor.plan().tickets_per_release(), 1);
}

#[tokio::test(start_paused = true)]
async fn login_finds_vendors_before_customers() {
    let app = app(config(10, 10));
    let shared = sign_up("Shared");
    let vendor = app.register_vendor(&shared, 5, 1).unwrap();
    app.register_customer(&shared, 5).unwrap();

    match app.login("SHARED@wavepass.lk", "secret1") {
        Some(Principal::Vendor(found)) => assert_eq!(found.id(), vendor.id()),
        other => panic!("expected the vendor, got {other:?}"),
    }
    assert!(app.login("shared@wavepass.lk", "wrong-password").is_none());
}

#[tokio::test(start_paused = true)]
async fn stop_and_restart_through_the_app() {
    let app = app(config(100, 100));
    let vendor = app.register_vendor(&sign_up("Harbour"), 50, 1).unwrap();
    let principal = Principal::Vendor(vendor.clone());

    app.start(&principal).unwrap();
    assert!(matches!(
        app.start(&principal),
        Err(SupervisorError::AlreadyRunning(_))
    ));
    assert!(eventually(Duration::from_secs(1), || vendor.released() >= 3).await);

    app.stop(&principal).unwrap();
    assert!(!app.is_running(&principal));
    assert!(eventually(Duration::from_secs(1), || vendor.state() == WorkerState::Stopped).await);
    let paused_at = vendor.released();

    app.update_vendor(&vendor, 2, 2).unwrap();
    assert_eq!(vendor.released(), 0);
    app.start(&principal).unwrap();
    assert!(eventually(Duration::from_secs(1), || vendor.state() == WorkerState::Completed).await);
    assert_eq!(app.pool().released(), u64::from(paused_at) + 2);
    assert_eq!(app.vendor_tickets(VendorId::new(1)).len(), usize::try_from(paused_at).unwrap() + 2);
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_everyone_and_reports() {
    let app = app(config(100, 100));
    let vendor = app.register_vendor(&sign_up("Harbour"), 100, 1).unwrap();
    let customer = app.register_customer(&sign_up("Ann"), 100).unwrap();
    app.start(&Principal::Vendor(vendor.clone())).unwrap();
    app.start(&Principal::Customer(customer.clone())).unwrap();
    assert!(eventually(Duration::from_secs(1), || vendor.released() >= 5).await);

    let (report, status) = app.shutdown().await;
    assert!(report.drained);
    assert_eq!(report.aborted, 0);
    assert!(status.running.is_empty());
    assert_eq!(vendor.state(), WorkerState::Stopped);
    assert_eq!(status.pool.released, u64::from(vendor.released()));
    assert_eq!(status.pool.sold, u64::from(customer.purchased()));

    assert!(matches!(
        app.start(&Principal::Vendor(vendor)),
        Err(SupervisorError::ShutDown)
    ));
}

#[tokio::test(start_paused = true)]
async fn activity_file_collects_every_line() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("activity.log");
    let mut config = config(10, 10);
    config.logging.activity_log_path = Some(path.clone());

    let app = app(config);
    let vendor = app.register_vendor(&sign_up("Harbour"), 4, 2).unwrap();
    app.start(&Principal::Vendor(vendor.clone())).unwrap();
    assert!(eventually(Duration::from_secs(1), || vendor.state().is_terminal()).await);
    app.shutdown().await;

    let on_disk = std::fs::read_to_string(&path).unwrap();
    let in_memory: Vec<String> = app.activity().entries().iter().map(ToString::to_string).collect();
    assert_eq!(on_disk.lines().collect::<Vec<_>>(), in_memory);
    assert!(on_disk.contains("Vendor-1 has released all tickets (4)."));
}

#[test]
fn invalid_config_is_refused() {
    let mut bad = config(5, 10);
    bad.logging.activity_log_path = None;
    assert!(matches!(WavePassApp::new(bad), Err(AppError::Config(_))));
}
