//! Clock abstraction (epoch milliseconds).
use chrono::{DateTime, TimeZone, Utc};

#[async_trait::async_trait]
pub trait Clock: Send + Sync {
    async fn now_epoch_ms(&self) -> i64;

    async fn now(&self) -> DateTime<Utc> {
        let ms = self.now_epoch_ms().await;
        Utc.timestamp_millis_opt(ms)
            .single()
            .unwrap_or_else(Utc::now)
    }
}
