use async_stream::stream;
use futures::stream::Stream;
use futures::stream::StreamExt;
use parking_lot::Mutex;
use plateful_sdk::{
    Client, ClientConfigBuilder, Feature, MemoryServer, Result, ToggleCallbacks, ToggleSnapshot,
    VisitId,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Statistics collected during stress testing
#[derive(Clone, Debug)]
pub struct StressTestStats {
    pub num_entities: usize,
    pub taps_per_entity: usize,
    pub total_taps: usize,
    pub total_requests: usize,
    pub converged: usize,
    pub max_in_flight: usize,
    pub total_time: Duration,
}

impl StressTestStats {
    /// Taps absorbed per request sent.
    pub fn coalescing_ratio(&self) -> f64 {
        if self.total_requests == 0 {
            return 0.0;
        }
        self.total_taps as f64 / self.total_requests as f64
    }

    pub fn all_converged(&self) -> bool {
        self.converged == self.num_entities
    }

    pub fn print(&self) {
        println!("\n╔════════════════════════════════════════════════════════════╗");
        println!("║              Stress Test Statistics                         ║");
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║  Entities:                  {:>38} ║", self.num_entities);
        println!("║  Taps per Entity:           {:>38} ║", self.taps_per_entity);
        println!("║  Total Taps:                {:>38} ║", self.total_taps);
        println!("║  Requests Sent:             {:>38} ║", self.total_requests);
        println!("║  Taps per Request:          {:>38} ║", format!("{:.2}", self.coalescing_ratio()));
        println!("║  Peak In-Flight per Entity: {:>38} ║", self.max_in_flight);
        println!("║  Converged:                 {:>38} ║", format!("{}/{}", self.converged, self.num_entities));
        println!("║  Total Time:                {:>39}s ║", format!("{:.3}", self.total_time.as_secs_f64()));
        println!("╚════════════════════════════════════════════════════════════╝");
    }
}

/// Generator that yields which entity the next tap lands on, and after how long
fn tap_generator(num_entities: usize, num_taps: usize, max_gap_ms: u64) -> impl Stream<Item = (usize, Duration)> {
    stream! {
        let mut rng = StdRng::from_entropy();
        for _ in 0..num_taps {
            let entity = rng.gen_range(0..num_entities);
            let gap = Duration::from_millis(rng.gen_range(0..=max_gap_ms));
            yield (entity, gap);
        }
    }
}

/// A feed card: the heart icon and its counter.
fn card_hooks(card: &Arc<Mutex<ToggleSnapshot>>) -> ToggleCallbacks {
    let optimistic = Arc::clone(card);
    let confirmed = Arc::clone(card);
    ToggleCallbacks::new()
        .on_optimistic(move |state| optimistic.lock().apply_optimistic(state))
        .on_confirmed(move |state, count| confirmed.lock().apply_confirmed(state, count))
}

/// Wait until no like has a pending debounce or an outstanding request.
async fn settle(client: &Client<MemoryServer>, deadline: Duration) {
    let start = Instant::now();
    while !client.likes().tracked_entities().is_empty() && start.elapsed() < deadline {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

async fn run_likes(
    label: &str,
    num_entities: usize,
    taps_per_entity: usize,
    latency_ms: u64,
    contention: f64,
) -> Result<StressTestStats> {
    println!("\n╔════════════════════════════════════════════════════════════╗");
    println!("║        {:<52}║", label);
    println!("║  Entities: {} | Taps/Entity: {} | Latency: {}ms ║",
             num_entities, taps_per_entity, latency_ms);
    println!("╚════════════════════════════════════════════════════════════╝");

    let start = Instant::now();

    let server = Arc::new(MemoryServer::with_latency(Duration::from_millis(latency_ms)));
    let config = ClientConfigBuilder::new().debounce(30).max_attempts(5).build();
    let client = Client::new(Arc::clone(&server), config)?;

    let visits: Vec<VisitId> = (0..num_entities).map(|_| VisitId::new()).collect();
    let cards: Vec<Arc<Mutex<ToggleSnapshot>>> = visits
        .iter()
        .map(|visit| {
            server.seed(Feature::Like, visit, false, 100);
            Arc::new(Mutex::new(ToggleSnapshot::new(false, 100)))
        })
        .collect();

    println!("\n[Phase 1/2] Tapping...");

    let total_taps = num_entities * taps_per_entity;
    let mut taps = Box::pin(tap_generator(num_entities, total_taps, 25));
    let mut rng = StdRng::from_entropy();
    let mut done = 0;
    while let Some((idx, gap)) = taps.next().await {
        tokio::time::sleep(gap).await;

        if contention > 0.0 && rng.gen_bool(contention) {
            server.disagree_next(Feature::Like, visits[idx], 1);
        }

        let observed = cards[idx].lock().state;
        client.likes().toggle(visits[idx], observed, card_hooks(&cards[idx]));

        done += 1;
        if done % 100 == 0 {
            println!("  Taps completed: {}/{}", done, total_taps);
        }
    }

    println!("[Phase 1/2] ✓ Completed");
    println!("[Phase 2/2] Waiting for convergence...");

    settle(&client, Duration::from_secs(30)).await;

    let converged = visits
        .iter()
        .zip(&cards)
        .filter(|(visit, card)| {
            let shown = *card.lock();
            server
                .state_of(Feature::Like, visit)
                .is_some_and(|(state, count)| shown == ToggleSnapshot::new(state, count))
        })
        .count();
    let max_in_flight = visits
        .iter()
        .map(|visit| server.peak_concurrency(Feature::Like, visit))
        .max()
        .unwrap_or(0);

    println!("[Phase 2/2] ✓ Completed");

    Ok(StressTestStats {
        num_entities,
        taps_per_entity,
        total_taps,
        total_requests: server.calls().len(),
        converged,
        max_in_flight,
        total_time: start.elapsed(),
    })
}

/// Stress test for likes against a well-behaved server
pub async fn stress_test_likes(
    num_entities: usize,
    taps_per_entity: usize,
    latency_ms: u64,
) -> Result<StressTestStats> {
    run_likes("Like Stress Test (Async)", num_entities, taps_per_entity, latency_ms, 0.0).await
}

/// Stress test for likes while other clients occasionally overwrite the state
pub async fn stress_test_contended(
    num_entities: usize,
    taps_per_entity: usize,
    latency_ms: u64,
) -> Result<StressTestStats> {
    run_likes("Contended Like Stress Test (Async)", num_entities, taps_per_entity, latency_ms, 0.2).await
}

/// Stress test comparing different entity counts
pub async fn stress_test_scaling(max_entities: usize, step_size: usize) -> Result<()> {
    println!("\n╔════════════════════════════════════════════════════════════╗");
    println!("║      Scaling Analysis - Coalescing vs Entity Count         ║");
    println!("╚════════════════════════════════════════════════════════════╝");

    let mut current_entities = step_size;
    while current_entities <= max_entities {
        let stats = stress_test_likes(current_entities, 20, 15).await?;
        stats.print();
        current_entities += step_size;
    }
    Ok(())
}
