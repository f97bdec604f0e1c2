//! Seeded RNG for reproducible randomized tests.
//!
//! The seed comes from `RECKON_TEST_SEED` when set, otherwise it is drawn
//! randomly and logged, so any failing randomized run can be replayed
//! exactly by exporting the printed seed.

use parking_lot::Mutex;
use std::ops::Range;

pub const SEED_ENV: &str = "RECKON_TEST_SEED";

/// Deterministic xorshift64* generator with interior mutability so it can
/// be shared by reference inside a test.
pub struct TestRng {
    seed: u64,
    state: Mutex<u64>,
}

impl TestRng {
    /// Seed from `RECKON_TEST_SEED` (hex with `0x` prefix or decimal),
    /// falling back to a random seed. The chosen seed is always logged.
    pub fn from_env() -> Self {
        let seed = match std::env::var(SEED_ENV) {
            Ok(raw) => match parse_seed(&raw) {
                Some(seed) => seed,
                None => {
                    log::warn!("Ignoring unparsable {SEED_ENV}={raw:?}");
                    rand::random()
                }
            },
            Err(_) => rand::random(),
        };
        let rng = Self::with_seed(seed);
        log::info!("TestRng seed: 0x{seed:016x} ({})", rng.replay_hint());
        rng
    }

    pub fn with_seed(seed: u64) -> Self {
        // xorshift state must be non-zero
        let state = if seed == 0 { 0x9E3779B97F4A7C15 } else { seed };
        Self {
            seed,
            state: Mutex::new(state),
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Shell line that reproduces this run.
    pub fn replay_hint(&self) -> String {
        format!("replay with {SEED_ENV}=0x{:016x} cargo test", self.seed)
    }

    pub fn next_u64(&self) -> u64 {
        let mut state = self.state.lock();
        let mut x = *state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        *state = x;
        x.wrapping_mul(0x2545F4914F6CDD1D)
    }

    /// Uniform-ish value in `range`; modulo bias is acceptable for tests.
    pub fn gen_range(&self, range: Range<u64>) -> u64 {
        assert!(range.start < range.end, "empty range");
        let span = range.end - range.start;
        range.start + self.next_u64() % span
    }
}

fn parse_seed(raw: &str) -> Option<u64> {
    if let Some(hex) = raw.strip_prefix("0x") {
        u64::from_str_radix(hex, 16).ok()
    } else {
        raw.parse().ok()
    }
}
