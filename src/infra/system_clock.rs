//! Wall-clock `Clock`.
use chrono::Utc;

use crate::ports::clock::Clock;

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

#[async_trait::async_trait]
impl Clock for SystemClock {
    async fn now_epoch_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}
