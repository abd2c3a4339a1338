//! Demo command implementation.
//!
//! Seeds a small fleet, wires an event printer and drives loans, queue joins
//! and returns through the worker pool. Individual failures are logged and
//! do not change the exit status.

use crate::error::CliError;
use crate::utils::{GlobalOptions, Session};
use clap::Args;
use loaner::{
    NewDevice, NewRequester, QueueOutcome, ReservationEvent, ReservationStatus, Tier, WorkerPool,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Sample fleet: brand, model, capacity, RAM.
const SAMPLE_DEVICES: [(&str, &str, u32, u32); 4] = [
    ("Dell", "Precision 5570", 1024, 32),
    ("Apple", "MacBook Pro 14", 512, 36),
    ("Acer", "Chromebook 314", 64, 4),
    ("Lenovo", "ThinkPad E14", 256, 8),
];

/// Sample requesters and the tier each needs.
const SAMPLE_REQUESTERS: [(&str, Tier); 6] = [
    ("Ada", Tier::High),
    ("Grace", Tier::High),
    ("Linus", Tier::High),
    ("Barbara", Tier::Low),
    ("Ken", Tier::Low),
    ("Margaret", Tier::Low),
];

/// Run a self-contained demonstration against the database.
#[derive(Args)]
pub struct DemoCommand {
    /// Upper bound on how long to wait for submitted work
    #[arg(long, value_name = "SECONDS", default_value_t = 10)]
    pub wait_secs: u64,
}

impl DemoCommand {
    /// Execute the demo command.
    pub fn execute(self, global: &GlobalOptions) -> Result<(), CliError> {
        let Session {
            config, manager, ..
        } = Session::open_or_create(global)?;
        let manager = Arc::new(manager);

        if !global.quiet {
            manager.events().subscribe(|event: &ReservationEvent| {
                println!("[event] {}", describe(event));
                Ok(())
            });
        }

        let threshold = config.high_min_ram_gb();
        for (brand, model, capacity_gb, ram_gb) in SAMPLE_DEVICES {
            let tier = Tier::classify(ram_gb, threshold);
            manager.register_device(NewDevice::new(brand, model, capacity_gb, ram_gb, tier))?;
        }
        let requesters = SAMPLE_REQUESTERS
            .into_iter()
            .map(|(name, tier)| manager.register_requester(NewRequester::new(name, tier)))
            .collect::<Result<Vec<_>, _>>()?;

        let pool = WorkerPool::new(config.worker_threads(), config.worker_queue_capacity())?;
        let deadline = Instant::now() + Duration::from_secs(self.wait_secs);

        // Everyone asks for a device; the surplus waits in line
        for requester in &requesters {
            let manager = Arc::clone(&manager);
            let (id, tier) = (requester.id(), requester.tier_needed());
            submit(&pool, move || match manager.add_to_queue(id, tier) {
                Ok(QueueOutcome::Reserved(r)) => {
                    log::info!("requester {id} got device {}", r.device_id());
                }
                Ok(outcome) => log::debug!("requester {id}: {outcome:?}"),
                Err(e) => log::warn!("queueing requester {id} failed: {e}"),
            });
        }
        wait(&pool, deadline);

        // Return every loan in rounds until the queues drain
        let mut round = 0_usize;
        while Instant::now() < deadline {
            let active = manager.active_reservations();
            if active.is_empty() {
                break;
            }
            for reservation in active {
                let manager = Arc::clone(&manager);
                let status = if round % 2 == 0 {
                    ReservationStatus::Completed
                } else {
                    ReservationStatus::Cancelled
                };
                let id = reservation.id();
                submit(&pool, move || {
                    if let Err(e) = manager.update_reservation_status(id, status) {
                        log::warn!("ending reservation {id} failed: {e}");
                    }
                });
            }
            wait(&pool, deadline);
            round += 1;
        }
        pool.shutdown();

        if !global.quiet {
            println!(
                "Demo finished after {round} return round(s): {} active loan(s), {} high / {} low waiting",
                manager.active_reservations().len(),
                manager.queue_size(Tier::High),
                manager.queue_size(Tier::Low),
            );
        }
        match manager.verify_consistency() {
            Ok(violations) if violations.is_empty() => {}
            Ok(violations) => {
                for violation in violations {
                    log::warn!("demo left an inconsistency: {violation}");
                }
            }
            Err(e) => log::warn!("consistency check failed: {e}"),
        }
        Ok(())
    }
}

fn submit<F>(pool: &WorkerPool, job: F)
where
    F: FnOnce() + Send + 'static,
{
    if let Err(e) = pool.submit(job) {
        log::warn!("dropping demo job: {e}");
    }
}

fn wait(pool: &WorkerPool, deadline: Instant) {
    let remaining = deadline.saturating_duration_since(Instant::now());
    if !pool.wait_idle(remaining) {
        log::warn!("gave up waiting with {} job(s) pending", pool.pending());
    }
}

/// One-line rendering of an event.
fn describe(event: &ReservationEvent) -> String {
    match event {
        ReservationEvent::ReservationCreated { reservation } => format!(
            "reservation {} created: device {} -> requester {}",
            reservation.id(),
            reservation.device_id(),
            reservation.requester_id()
        ),
        ReservationEvent::ReservationStatusChanged {
            reservation,
            old_status,
            new_status,
        } => format!(
            "reservation {} {old_status} -> {new_status}",
            reservation.id()
        ),
        ReservationEvent::QueueSizeChanged {
            tier,
            old_size,
            new_size,
        } => format!("{tier} queue {old_size} -> {new_size}"),
        ReservationEvent::OperationError { message, cause } => {
            format!("error while trying to {message}: {cause}")
        }
    }
}
