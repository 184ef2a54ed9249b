//! Scripted WavePass simulation.
//!
//! Registers a few vendors and customers, runs them against a small pool
//! with fast cadences, refunds one ticket, then shuts down and prints the
//! activity log and the final status.
//!
//! ```bash
//! cargo run --bin demo
//! RUST_LOG=wavepass=trace cargo run --bin demo
//! ```

use rand::Rng;
use std::time::Duration;
use wavepass::console::render_status;
use wavepass::registry::{Principal, SignUp};
use wavepass::telemetry;
use wavepass::{Config, WavePassApp};

fn sign_up(name: &str, n: usize) -> SignUp {
    SignUp {
        name: name.to_string(),
        email: format!("{}{n}@wavepass.lk", name.to_ascii_lowercase()),
        mobile: format!("07{n:08}"),
        password: "demo-pass".to_string(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    telemetry::init_tracing("warn,wavepass=info");

    let mut config = Config::default();
    config.tickets.total_tickets = 40;
    config.tickets.max_capacity = 30;
    config.tickets.release_interval_ms = 120;
    config.tickets.retrieval_interval_ms = 80;
    config.logging.activity_log_path = None;

    let app = WavePassApp::new(config)?;

    for (n, (total, per_release)) in [(12, 4), (15, 5)].into_iter().enumerate() {
        let vendor = app.register_vendor(&sign_up("Harbour", n), total, per_release)?;
        app.start(&Principal::Vendor(vendor))?;
    }

    let mut rng = rand::thread_rng();
    let mut customers = Vec::new();
    for n in 0..5 {
        let wanted = rng.gen_range(2..=8);
        let customer = app.register_customer(&sign_up("Rider", n), wanted)?;
        app.start(&Principal::Customer(customer.clone()))?;
        customers.push(customer);
    }

    tokio::time::sleep(Duration::from_secs(2)).await;

    if let Some(customer) = customers.first() {
        if let Some(ticket) = app.customer_tickets(customer.id()).first() {
            let refunded = app.refund(customer.id(), ticket.id());
            tracing::info!(
                customer = %customer.id(),
                ticket = %ticket.id(),
                refunded,
                "Demo refund"
            );
        }
    }

    let (report, status) = app.shutdown().await;

    println!("--- Activity ---");
    for entry in app.activity().entries() {
        println!("{entry}");
    }
    println!();
    println!("{}", render_status(&status));
    println!("Workers drained cleanly: {}", report.drained);
    Ok(())
}
