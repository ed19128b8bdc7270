use async_trait::async_trait;
use std::sync::Mutex;

use crate::{PublishError, Publisher};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedPublish {
    pub subject: String,
    pub payload: Vec<u8>,
    pub dedup_key: String,
}

/// In-memory stand-in for the durable bus, used by re-index's `dry_run`
/// mode and by unit tests that need to assert on what would have been
/// published without a real bus connection.
#[derive(Default)]
pub struct NullPublisher {
    published: Mutex<Vec<RecordedPublish>>,
}

impl NullPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published(&self) -> Vec<RecordedPublish> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl Publisher for NullPublisher {
    async fn publish(
        &self,
        subject: &str,
        payload: &[u8],
        dedup_key: &str,
    ) -> Result<(), PublishError> {
        self.published.lock().unwrap().push(RecordedPublish {
            subject: subject.to_string(),
            payload: payload.to_vec(),
            dedup_key: dedup_key.to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_every_publish() {
        let publisher = NullPublisher::new();
        publisher.publish("activity.default", b"{}", "audit|1|v1").await.unwrap();
        publisher.publish("activity.default", b"{}", "audit|2|v1").await.unwrap();
        assert_eq!(publisher.published().len(), 2);
    }
}
