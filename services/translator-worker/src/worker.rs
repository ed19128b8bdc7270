use std::sync::Arc;

use futures::StreamExt;

use activity_models::{Ingested, Record, RecordKind, Scope};
use activity_publisher::Publisher;
use activity_translator::Translator;

/// One queue-group member consuming a bus subject and feeding every
/// message through the translator, publishing any resulting Activity.
///
/// Records arrive on a per-source subject (§6), so a single member would
/// process one source's records in strict arrival order (§5). Spreading
/// `worker_count` members across a shared queue group trades that
/// subject-wide ordering guarantee for horizontal throughput when many
/// source clusters share the same wildcard subscription -- an explicit
/// deviation worth calling out, not an oversight. Deployments that need
/// the strict guarantee should run with `worker_count = 1`.
pub async fn consume_audit(
    client: async_nats::Client,
    subject: String,
    queue_group: String,
    translator: Arc<Translator>,
    publisher: Arc<dyn Publisher>,
) {
    consume(client, subject, queue_group, RecordKind::Audit, translator, publisher).await;
}

pub async fn consume_events(
    client: async_nats::Client,
    subject: String,
    queue_group: String,
    translator: Arc<Translator>,
    publisher: Arc<dyn Publisher>,
) {
    consume(client, subject, queue_group, RecordKind::Event, translator, publisher).await;
}

async fn consume(
    client: async_nats::Client,
    subject: String,
    queue_group: String,
    kind: RecordKind,
    translator: Arc<Translator>,
    publisher: Arc<dyn Publisher>,
) {
    let mut subscription = match client.queue_subscribe(subject.clone(), queue_group).await {
        Ok(sub) => sub,
        Err(error) => {
            tracing::error!(%error, %subject, "failed to subscribe, worker exiting");
            return;
        }
    };

    tracing::info!(%subject, "subscribed");

    while let Some(message) = subscription.next().await {
        if let Err(error) = handle_one(kind, &message.payload, &translator, publisher.as_ref()).await {
            tracing::warn!(%error, %subject, "failed to process message");
        }
    }
}

async fn handle_one(
    kind: RecordKind,
    payload: &[u8],
    translator: &Translator,
    publisher: &dyn Publisher,
) -> Result<(), anyhow::Error> {
    let (record, annotations) = decode(kind, payload)?;
    let tenant = Scope::from_annotations(
        annotations.get("scope.type").map(String::as_str),
        annotations.get("scope.name").map(String::as_str),
    )
    .ok_or_else(|| anyhow::anyhow!("source record is missing scope.type/scope.name annotations"))?;

    let ingested = Ingested::new(record, tenant.clone());
    let Some(activity) = translator.translate(&ingested)? else {
        return Ok(());
    };

    let policy_version = activity
        .metadata
        .labels
        .get("policy-version")
        .cloned()
        .unwrap_or_default();
    let dedup_key = activity.dedup_key(&policy_version);
    let subject = format!(
        "activity.{}.{}",
        tenant.name,
        activity.spec.resource.kind.to_lowercase()
    );
    let body = serde_json::to_vec(&activity)?;
    publisher.publish(&subject, &body, &dedup_key).await?;
    Ok(())
}

fn decode(
    kind: RecordKind,
    payload: &[u8],
) -> Result<(Record, std::collections::HashMap<String, String>), anyhow::Error> {
    match kind {
        RecordKind::Audit => {
            let record: activity_models::AuditRecord = serde_json::from_slice(payload)?;
            let annotations = record.annotations.clone();
            Ok((Record::Audit(record), annotations))
        }
        RecordKind::Event => {
            let record: activity_models::EventRecord = serde_json::from_slice(payload)?;
            let annotations = record.metadata.annotations.clone();
            Ok((Record::Event(record), annotations))
        }
    }
}
