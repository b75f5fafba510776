//! Client loops
//!
//! Each loop is an open-loop arrival process: it sleeps until the next
//! Poisson arrival, applies ramp gating, and runs one attempt to completion
//! before drawing the next arrival. Arrival instants accumulate from a
//! reference instant instead of from "now", so scheduling jitter does not
//! drift the rate; a loop that falls behind catches up without sleeping.

use crate::attempt::TransactionAttempt;
use crate::context::WorkloadContext;
use crate::error::BenchResult;
use rand::Rng;
use rwbench_core::KvStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{sleep, sleep_until, Instant};
use tracing::{debug, info};

/// Poisson arrival schedule
#[derive(Debug, Clone)]
pub struct PoissonPacer {
    next: Instant,
    mean: Duration,
}

impl PoissonPacer {
    /// Schedule with mean inter-arrival `mean`, starting at `start`
    pub fn new(start: Instant, mean: Duration) -> Self {
        Self { next: start, mean }
    }

    /// Advance to the next arrival and return it
    pub fn advance<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Instant {
        // 1 - [0, 1) keeps ln away from zero
        let u = 1.0 - rng.gen::<f64>();
        self.next += self.mean.mul_f64(-u.ln());
        self.next
    }

    /// Most recent arrival
    pub fn next_arrival(&self) -> Instant {
        self.next
    }
}

/// Resolve once the stop flag is raised or its sender is gone
async fn stopped(stop: &mut watch::Receiver<bool>) {
    let _ = stop.wait_for(|raised| *raised).await;
}

/// One concurrently running client
pub struct ClientLoop<S: KvStore> {
    ctx: Arc<WorkloadContext<S>>,
    index: usize,
    stop: watch::Receiver<bool>,
}

impl<S: KvStore> ClientLoop<S> {
    /// Client loop `index`, stopping softly when `stop` turns true
    pub fn new(ctx: Arc<WorkloadContext<S>>, index: usize, stop: watch::Receiver<bool>) -> Self {
        Self { ctx, index, stop }
    }

    /// Run until stopped; returns the number of attempts completed
    ///
    /// Stop is only observed between attempts, so an issued attempt always
    /// runs to completion. Fatal store errors end the loop.
    pub async fn run(mut self) -> BenchResult<u64> {
        let ctx = Arc::clone(&self.ctx);
        let ramp = ctx.ramp();
        let index = self.index;

        if let Some(delay) = ramp.start_delay(index) {
            tokio::select! {
                biased;
                _ = stopped(&mut self.stop) => return Ok(0),
                _ = sleep(delay) => {}
            }
            info!(
                target: "rwbench::client",
                actor_index = index,
                client_id = ctx.config().client_id,
                active_clients = ramp.global_ordinal(index) + 1,
                "Client starting"
            );
        }

        let mut pacer = PoissonPacer::new(Instant::now(), ctx.config().mean_arrival_interval());
        let mut completed = 0u64;

        loop {
            let arrival = ctx.with_rng(|rng| pacer.advance(rng));
            // A loop that fell behind has arrivals in the past; stop wins
            tokio::select! {
                biased;
                _ = stopped(&mut self.stop) => break,
                _ = sleep_until(arrival) => {}
            }

            let elapsed = ctx.elapsed();
            if ramp.is_past_stop(index, elapsed) {
                info!(
                    target: "rwbench::client",
                    actor_index = index,
                    client_id = ctx.config().client_id,
                    active_clients = ramp.global_ordinal(index),
                    "Client stopping"
                );
                stopped(&mut self.stop).await;
                break;
            }

            let u: f64 = ctx.with_rng(|rng| rng.gen());
            if !ramp.should_fire(u, elapsed) {
                continue;
            }

            TransactionAttempt::new(&ctx).run().await?;
            completed += 1;
        }

        debug!(target: "rwbench::client", actor_index = index, completed, "Client finished");
        Ok(completed)
    }
}
