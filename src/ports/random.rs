//! Random source abstraction (0-1 floats).
#[async_trait::async_trait]
pub trait RandomSource: Send + Sync {
    async fn next_f64(&self) -> f64; // expected in [0,1)

    /// Uniform index into a collection of `len` items. `len` must be non-zero.
    async fn pick_index(&self, len: usize) -> usize {
        let idx = (self.next_f64().await * len as f64) as usize;
        idx.min(len.saturating_sub(1))
    }
}
