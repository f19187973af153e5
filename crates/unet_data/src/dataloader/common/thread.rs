//! Thread-local RNG driving every random decision in the pipeline.
//!
//! Randomized transforms never own an RNG. They draw from `WORKER_RNG`. A
//! loader owns its stream and installs it in `WORKER_RNG` only while it
//! fetches a batch (see [`with_scoped_rng`]), so loaders pulled on the same
//! thread never consume each other's draws.

use rand::distr::uniform::{SampleRange, SampleUniform};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use std::cell::RefCell;

thread_local! {
    /// Thread-local RNG for deterministic randomness in transforms
    pub static WORKER_RNG: RefCell<Option<StdRng>> = const { RefCell::new(None) };
}

/// Seed formula: base_seed + (epoch << 32) + worker_id
pub fn worker_seed(worker_id: usize, epoch: usize, base_seed: u64) -> u64 {
    base_seed
        .wrapping_add((epoch as u64) << 32)
        .wrapping_add(worker_id as u64)
}

/// RNG for one worker and epoch, seeded with [`worker_seed`].
pub fn worker_rng(worker_id: usize, epoch: usize, base_seed: u64) -> StdRng {
    StdRng::seed_from_u64(worker_seed(worker_id, epoch, base_seed))
}

/// Initialize the thread's RNG based on worker_id, epoch, and base seed.
pub fn init_worker_rng(worker_id: usize, epoch: usize, base_seed: u64) {
    WORKER_RNG.with(|rng| *rng.borrow_mut() = Some(worker_rng(worker_id, epoch, base_seed)));
}

/// Runs `f` with `rng` installed as the thread's RNG.
///
/// Draws made by `f` advance `rng`; the thread's previous RNG is restored
/// afterwards, also when `f` unwinds.
pub fn with_scoped_rng<T>(rng: &mut StdRng, f: impl FnOnce() -> T) -> T {
    struct Restore<'a> {
        owner: &'a mut StdRng,
        previous: Option<StdRng>,
    }

    impl Drop for Restore<'_> {
        fn drop(&mut self) {
            let previous = self.previous.take();
            if let Some(used) = WORKER_RNG.with(|slot| slot.replace(previous)) {
                *self.owner = used;
            }
        }
    }

    let installed = Some(rng.clone());
    let previous = WORKER_RNG.with(|slot| slot.replace(installed));
    let _restore = Restore {
        owner: rng,
        previous,
    };
    f()
}

/// Runs `f` with the thread's RNG, seeding it from OS entropy when no loader
/// has initialized it yet.
pub fn with_worker_rng<T>(f: impl FnOnce(&mut StdRng) -> T) -> T {
    WORKER_RNG.with(|rng| {
        let mut rng_ref = rng.borrow_mut();
        f(rng_ref.get_or_insert_with(StdRng::from_os_rng))
    })
}

/// Random bool with probability `p`.
pub fn worker_gen_bool(p: f64) -> bool {
    with_worker_rng(|rng| rng.random_bool(p))
}

/// Uniform draw from `range`.
pub fn worker_gen_range<T, R>(range: R) -> T
where
    T: SampleUniform,
    R: SampleRange<T>,
{
    with_worker_rng(|rng| rng.random_range(range))
}

/// Standard normal draw.
pub fn worker_standard_normal() -> f64 {
    with_worker_rng(|rng| rng.sample(StandardNormal))
}
