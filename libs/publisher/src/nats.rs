use std::time::Duration;

use async_nats::jetstream;
use async_nats::{ConnectOptions, HeaderMap};
use async_trait::async_trait;

use crate::{PublishError, Publisher};

/// Backed by `async-nats` JetStream. Dedup is broker-side: the
/// `Nats-Msg-Id` header carries `dedup_key`, so republishing the same key
/// within the stream's dedup window is a silent no-op acknowledgement
/// rather than a duplicate message -- exactly the bus-layer idempotence
/// §3 requires of Activities keyed by `(origin.type, origin.id,
/// policy-version)`.
///
/// Reconnection is handled by the client itself: `ConnectOptions` is
/// configured with an unbounded retry count and an exponential,
/// capped backoff between attempts. The caller of `publish` only ever
/// sees the eventual acknowledgement or a terminal error; it never
/// observes an intermediate reconnect attempt.
pub struct NatsPublisher {
    context: jetstream::Context,
}

impl NatsPublisher {
    pub async fn connect(url: &str, reconnect_cap: Duration) -> Result<Self, PublishError> {
        let client = ConnectOptions::new()
            .retry_on_initial_connect()
            .reconnect_delay_callback(move |attempt| {
                let backoff = Duration::from_millis(100 * 2u64.saturating_pow(attempt as u32));
                backoff.min(reconnect_cap)
            })
            .connect(url)
            .await
            .map_err(|e| PublishError::Connection(e.to_string()))?;
        let context = jetstream::new(client);
        Ok(Self { context })
    }

    pub fn from_context(context: jetstream::Context) -> Self {
        Self { context }
    }
}

#[async_trait]
impl Publisher for NatsPublisher {
    async fn publish(
        &self,
        subject: &str,
        payload: &[u8],
        dedup_key: &str,
    ) -> Result<(), PublishError> {
        let mut headers = HeaderMap::new();
        headers.insert("Nats-Msg-Id", dedup_key);

        let ack_future = self
            .context
            .publish_with_headers(subject.to_string(), headers, payload.to_vec().into())
            .await
            .map_err(|e| PublishError::Connection(e.to_string()))?;

        ack_future
            .await
            .map_err(|e| PublishError::Rejected(e.to_string()))?;
        Ok(())
    }
}
