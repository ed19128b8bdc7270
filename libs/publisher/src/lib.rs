mod nats;
mod null;

pub use nats::NatsPublisher;
pub use null::NullPublisher;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("bus connection error: {0}")]
    Connection(String),
    #[error("bus rejected the publish: {0}")]
    Rejected(String),
}

/// A thin, single-writer fan-in onto the durable bus. `publish` is
/// synchronous from the caller's point of view: it blocks until the bus
/// confirms acceptance of `(subject, payload)` under `dedup_key`, or
/// returns an error. Silent drops are forbidden -- there is no
/// fire-and-forget variant of this trait.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(
        &self,
        subject: &str,
        payload: &[u8],
        dedup_key: &str,
    ) -> Result<(), PublishError>;
}
