//! The parallel growth driver.
//!
//! Each worker repeats: take the candidate mutex and extract one node via
//! selection, then run the alpha expansion on it (which serialises its
//! geometric reads and inserts behind an area lock), then report progress.
//! Workers drain until the candidate set is empty. The set shrinks when an
//! expansion terminates or exhausts its tries, and the spacing rule bounds
//! how many nodes fit inland, so the loop always ends.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use super::{rules, GrowthParams};

/// Run growth to completion over `workers` threads.
///
/// Each worker draws headings from its own ChaCha8 generator seeded
/// `seed + worker index`. `on_progress` runs once per expanded candidate.
pub fn grow<F>(params: &GrowthParams, seed: u64, workers: usize, on_progress: F)
where
    F: Fn() + Sync,
{
    let workers = workers.max(1);
    log::info!("growing river network: {workers} workers, seed {seed}");

    std::thread::scope(|scope| {
        for worker in 0..workers {
            let on_progress = &on_progress;
            let mut rng = ChaCha8Rng::seed_from_u64(seed.wrapping_add(worker as u64));
            scope.spawn(move || {
                while let Some(selected) = params.pop_candidate() {
                    rules::alpha(selected, params, &mut rng);
                    on_progress();
                }
            });
        }
    });

    log::info!(
        "river network complete: {} nodes",
        params.hydrology.num_nodes()
    );
}
