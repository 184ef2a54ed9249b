#![allow(clippy::expect_used, clippy::unwrap_used)]
//! Worker lifecycle tests: batching, reconfiguration, stop, restart and
//! shutdown, all on paused time so intervals cost nothing.

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wavepass_core::{ActivityEvent, ActorId, CustomerOutcome, VendorOutcome};
use wavepass_runtime::{
    CustomerWorker, ReleasePlan, Supervisor, SupervisorConfig, SupervisorError, VendorWorker,
    WorkerState,
};
use wavepass_testing::RecordingSink;
use wavepass_testing::helpers::{customer, eventually, pool, stocked_pool, vendor};

fn supervisor(capacity: usize, config: SupervisorConfig) -> (Supervisor, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::new());
    let supervisor = Supervisor::new(pool(capacity), sink.clone(), config);
    (supervisor, sink)
}

#[tokio::test(start_paused = true)]
async fn vendor_releases_three_three_three_one() {
    let pool = pool(100);
    let sink = Arc::new(RecordingSink::new());
    let vendor = vendor(1, 10, 3);

    let outcome = VendorWorker::new(Arc::clone(&vendor), Arc::clone(&pool), sink.clone())
        .run(CancellationToken::new())
        .await;

    assert_eq!(outcome, VendorOutcome::Completed);
    let availability: Vec<u64> = sink
        .events()
        .into_iter()
        .filter_map(|event| match event {
            ActivityEvent::TicketReleased { available, .. } => Some(available),
            _ => None,
        })
        .collect();
    assert_eq!(availability, vec![3, 3, 3, 6, 6, 6, 9, 9, 9, 10]);
    assert_eq!(
        sink.lines().last().unwrap(),
        "Vendor-1 has released all tickets (10)."
    );
}

#[tokio::test(start_paused = true)]
async fn customer_sold_out_on_first_attempt() {
    let pool = pool(10);
    let sink = Arc::new(RecordingSink::new());

    let outcome = CustomerWorker::new(customer(1, 5), pool, sink.clone())
        .run(CancellationToken::new())
        .await;

    assert_eq!(outcome, CustomerOutcome::SoldOut);
    assert_eq!(
        sink.lines(),
        vec![
            "Customer-1 failed to purchase a ticket: No tickets available.".to_string(),
            "Customer-1 stopped purchasing: sold out. Tickets purchased: 0.".to_string(),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn reconfiguring_a_running_vendor_restarts_its_count() {
    wavepass_testing::helpers::init_tracing();
    let (supervisor, _sink) = supervisor(100, SupervisorConfig::default());
    let vendor = vendor(1, 10, 2);
    supervisor.start_vendor(&vendor).unwrap();

    assert!(eventually(Duration::from_secs(1), || vendor.released() == 4).await);
    vendor.update_plan(ReleasePlan::new(3, 3, Duration::from_millis(100)).unwrap());
    assert_eq!(vendor.released(), 0);

    assert!(
        eventually(Duration::from_secs(1), || vendor.state() == WorkerState::Completed).await
    );
    assert_eq!(vendor.released(), 3);
    assert_eq!(supervisor.pool().released(), 7);
}

#[tokio::test(start_paused = true)]
async fn stop_interrupts_a_sleeping_worker() {
    let (supervisor, sink) = supervisor(100, SupervisorConfig::default());
    let vendor = vendor(1, 10, 1);
    vendor.update_plan(ReleasePlan::new(10, 1, Duration::from_secs(3_600)).unwrap());
    supervisor.start_vendor(&vendor).unwrap();

    assert!(eventually(Duration::from_secs(1), || vendor.released() == 1).await);
    let actor = ActorId::from(vendor.id());
    supervisor.stop(actor).unwrap();

    assert!(
        eventually(Duration::from_millis(10), || vendor.state() == WorkerState::Stopped).await
    );
    assert_eq!(vendor.released(), 1);
    assert!(!supervisor.is_running(actor));
    assert_eq!(
        sink.count(|e| matches!(e, ActivityEvent::WorkerStopped { .. })),
        1
    );
    assert_eq!(
        sink.count(|e| matches!(
            e,
            ActivityEvent::VendorFinished {
                outcome: VendorOutcome::Stopped,
                ..
            }
        )),
        1
    );
}

#[tokio::test(start_paused = true)]
async fn start_and_stop_report_misuse() {
    let (supervisor, _sink) = supervisor(100, SupervisorConfig::default());
    let vendor = vendor(2, 50, 1);
    let actor = ActorId::from(vendor.id());

    assert_eq!(supervisor.stop(actor), Err(SupervisorError::NotRunning(actor)));

    tokio_test::assert_ok!(supervisor.start_vendor(&vendor));
    assert_eq!(
        supervisor.start_vendor(&vendor),
        Err(SupervisorError::AlreadyRunning(actor))
    );

    tokio_test::assert_ok!(supervisor.stop(actor));
    assert_eq!(supervisor.stop(actor), Err(SupervisorError::NotRunning(actor)));
}

#[tokio::test(start_paused = true)]
async fn finished_actor_can_be_started_again() {
    let (supervisor, _sink) = supervisor(100, SupervisorConfig::default());
    let vendor = vendor(1, 2, 2);
    let actor = ActorId::from(vendor.id());

    supervisor.start_vendor(&vendor).unwrap();
    assert!(eventually(Duration::from_secs(1), || !supervisor.is_running(actor)).await);
    assert_eq!(vendor.state(), WorkerState::Completed);

    vendor.update_plan(ReleasePlan::new(3, 3, Duration::from_millis(100)).unwrap());
    supervisor.start_vendor(&vendor).unwrap();
    assert!(eventually(Duration::from_secs(1), || !supervisor.is_running(actor)).await);
    assert_eq!(supervisor.pool().released(), 5);
}

#[tokio::test(start_paused = true)]
async fn customers_drain_what_vendors_release() {
    let (supervisor, _sink) = supervisor(5, SupervisorConfig::default());
    let vendor = vendor(1, 5, 5);
    supervisor.start_vendor(&vendor).unwrap();
    assert!(eventually(Duration::from_secs(1), || vendor.state() == WorkerState::Completed).await);

    let buyers: Vec<_> = (1..=3).map(|id| customer(id, 2)).collect();
    for buyer in &buyers {
        supervisor.start_customer(buyer).unwrap();
    }

    assert!(eventually(Duration::from_secs(5), || supervisor.running().is_empty()).await);
    let bought: u32 = buyers.iter().map(|b| b.purchased()).sum();
    assert_eq!(bought, 5);
    assert!(buyers.iter().any(|b| b.state() == WorkerState::SoldOut));
}

#[tokio::test(start_paused = true)]
async fn queued_worker_stopped_before_it_runs() {
    let config = SupervisorConfig {
        vendor_concurrency: 1,
        ..SupervisorConfig::default()
    };
    let (supervisor, _sink) = supervisor(100, config);
    let first = vendor(1, 10, 1);
    let second = vendor(2, 10, 1);
    first.update_plan(ReleasePlan::new(10, 1, Duration::from_secs(3_600)).unwrap());

    supervisor.start_vendor(&first).unwrap();
    supervisor.start_vendor(&second).unwrap();
    assert!(eventually(Duration::from_secs(1), || first.released() == 1).await);
    assert_eq!(second.state(), WorkerState::Pending);

    supervisor.stop(ActorId::from(second.id())).unwrap();
    assert_eq!(second.state(), WorkerState::Stopped);
    assert_eq!(second.released(), 0);
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_everything_and_refuses_new_work() {
    let (supervisor, _sink) = supervisor(1_000, SupervisorConfig::default());
    let vendors: Vec<_> = (1..=4).map(|id| vendor(id, 500, 1)).collect();
    let buyers: Vec<_> = (1..=4).map(|id| customer(id, 500)).collect();
    for v in &vendors {
        supervisor.start_vendor(v).unwrap();
    }
    for c in &buyers {
        supervisor.start_customer(c).unwrap();
    }
    tokio::time::sleep(Duration::from_millis(350)).await;

    let report = supervisor.shutdown().await;

    assert!(report.drained);
    assert_eq!(report.aborted, 0);
    assert!(vendors.iter().all(|v| v.state() == WorkerState::Stopped));
    assert!(buyers.iter().all(|c| c.state().is_terminal()));
    assert_eq!(
        supervisor.start_vendor(&vendors[0]),
        Err(SupervisorError::ShutDown)
    );
    assert!(supervisor.shutdown().await.drained);
}

#[tokio::test(start_paused = true)]
async fn shutdown_logs_a_stop_for_running_and_queued_workers() {
    let config = SupervisorConfig {
        vendor_concurrency: 1,
        ..SupervisorConfig::default()
    };
    let (supervisor, sink) = supervisor(100, config);
    let first = vendor(1, 10, 1);
    let second = vendor(2, 10, 1);
    let finished = customer(1, 1);
    first.update_plan(ReleasePlan::new(10, 1, Duration::from_secs(3_600)).unwrap());

    supervisor.start_vendor(&first).unwrap();
    supervisor.start_vendor(&second).unwrap();
    supervisor.start_customer(&finished).unwrap();
    let finished_actor = ActorId::from(finished.id());
    assert!(eventually(Duration::from_secs(1), || !supervisor.is_running(finished_actor)).await);
    assert_eq!(second.state(), WorkerState::Pending);

    supervisor.shutdown().await;

    let stopped: Vec<ActorId> = sink
        .events()
        .into_iter()
        .filter_map(|event| match event {
            ActivityEvent::WorkerStopped { actor } => Some(actor),
            _ => None,
        })
        .collect();
    assert_eq!(
        stopped,
        vec![ActorId::from(first.id()), ActorId::from(second.id())]
    );
    assert_eq!(second.state(), WorkerState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn stocked_pool_sells_oldest_first() {
    let pool = stocked_pool(10, 3);
    let sink = Arc::new(RecordingSink::new());

    CustomerWorker::new(customer(4, 2), Arc::clone(&pool), sink)
        .run(CancellationToken::new())
        .await;

    let owned: Vec<u64> = pool
        .tickets_by_customer(wavepass_core::CustomerId::new(4))
        .iter()
        .map(|t| t.id().value())
        .collect();
    assert_eq!(owned, vec![1, 2]);
}
