//! Random number generation
//!
//! Worker threads each own an [`EvoRng`] drawn from a process-wide seed
//! source, so no generator is ever shared across threads and no lock sits
//! on an evolution loop.

use std::sync::{Mutex, OnceLock};

use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};

static SEED_SOURCE: OnceLock<Mutex<StdRng>> = OnceLock::new();

fn seed_source() -> &'static Mutex<StdRng> {
    SEED_SOURCE.get_or_init(|| Mutex::new(StdRng::from_entropy()))
}

/// Uniform generator owned by a single thread
///
/// Wraps a [`StdRng`] and exposes the two primitives the evolution code
/// needs: inclusive integer ranges and half-open real ranges. It also
/// implements [`RngCore`], so it plugs into any operator taking
/// `&mut R: Rng`.
#[derive(Clone, Debug)]
pub struct EvoRng {
    inner: StdRng,
}

impl EvoRng {
    /// Create a generator seeded from the process-wide seed source
    pub fn spawn() -> Self {
        let mut source = seed_source()
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Self {
            inner: StdRng::seed_from_u64(source.next_u64()),
        }
    }

    /// Create a generator with a fixed seed (tests, reproducible runs)
    pub fn seeded(seed: u64) -> Self {
        Self {
            inner: StdRng::seed_from_u64(seed),
        }
    }

    /// Uniform integer in `[min, max]`, both ends inclusive
    ///
    /// Arguments may be given in either order.
    pub fn int(&mut self, min: i64, max: i64) -> i64 {
        let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
        self.inner.gen_range(lo..=hi)
    }

    /// Uniform real in `[min, max)`
    ///
    /// Arguments may be given in either order. Returns `min` when the
    /// range is empty.
    pub fn real(&mut self, min: f64, max: f64) -> f64 {
        let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
        if lo == hi {
            return lo;
        }
        self.inner.gen_range(lo..hi)
    }
}

impl RngCore for EvoRng {
    fn next_u32(&mut self) -> u32 {
        self.inner.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.inner.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.inner.fill_bytes(dest)
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.inner.try_fill_bytes(dest)
    }
}
