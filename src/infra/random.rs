use rand::{rngs::StdRng, Rng, SeedableRng};
use tokio::sync::Mutex;

use crate::ports::random::RandomSource;

/// Shared RNG used to pick a user agent per attempt.
pub struct MutexRng {
    inner: Mutex<StdRng>,
}

impl MutexRng {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            inner: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl Default for MutexRng {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl RandomSource for MutexRng {
    async fn next_f64(&self) -> f64 {
        self.inner.lock().await.gen::<f64>()
    }
}
