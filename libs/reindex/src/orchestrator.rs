use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use activity_common::AppError;
use activity_database::{ColumnStore, StoreKind};
use activity_models::{Ingested, Record, Scope};
use activity_policy_cache::PolicyCache;
use activity_publisher::Publisher;
use activity_query::{QueryEngine, QueryItem, QuerySpec};
use activity_translator::{ActorClassifierConfig, Translator};

use crate::options::{Progress, RunOptions, RunOutcome, RunState};
use crate::rate_limiter::BatchRateLimiter;
use crate::selector::resolve_selection;

/// Replays historical records through the current policy set and
/// re-publishes the Activities they produce. See §4.5: this is the only
/// component that reads through the query engine and writes through the
/// publisher in the same operation.
pub struct Reindexer<S: ColumnStore> {
    query: Arc<QueryEngine<S>>,
    cache: Arc<PolicyCache>,
    translator: Translator,
    publisher: Arc<dyn Publisher>,
}

impl<S: ColumnStore> Reindexer<S> {
    pub fn new(
        query: Arc<QueryEngine<S>>,
        cache: Arc<PolicyCache>,
        classifier: ActorClassifierConfig,
        publisher: Arc<dyn Publisher>,
    ) -> Self {
        let translator = Translator::new(cache.clone(), classifier);
        Self {
            query,
            cache,
            translator,
            publisher,
        }
    }

    pub async fn run(
        &self,
        scope: Scope,
        opts: RunOptions,
        cancellation: CancellationToken,
        mut on_progress: impl FnMut(&Progress),
    ) -> RunOutcome {
        let mut progress = Progress::default();

        let selected = resolve_selection(&self.cache, &opts);
        if selected.is_empty() {
            return RunOutcome {
                state: RunState::Succeeded,
                progress,
            };
        }

        let limiter = BatchRateLimiter::new(opts.rate_limit);

        // Order matters only for which bucket is replayed first; within
        // each bucket the query engine's own cursor keeps every record
        // visited exactly once. See DESIGN.md for why batch-level
        // ascending-time ordering (named in §4.5) is not load-bearing
        // here: publish is deduplicated by `(origin.type, origin.id,
        // policy_version)` regardless of visitation order.
        for kind in [StoreKind::Audit, StoreKind::Event] {
            match self
                .run_kind(kind, &scope, &opts, &selected, &limiter, &cancellation, &mut progress, &mut on_progress)
                .await
            {
                Ok(RunState::Cancelled) => {
                    return RunOutcome {
                        state: RunState::Cancelled,
                        progress,
                    }
                }
                Ok(_) => continue,
                Err(error) => {
                    tracing::error!(%error, "re-index run failed");
                    return RunOutcome {
                        state: RunState::Failed,
                        progress,
                    };
                }
            }
        }

        RunOutcome {
            state: RunState::Succeeded,
            progress,
        }
    }

    async fn run_kind(
        &self,
        kind: StoreKind,
        scope: &Scope,
        opts: &RunOptions,
        selected: &HashSet<String>,
        limiter: &BatchRateLimiter,
        cancellation: &CancellationToken,
        progress: &mut Progress,
        on_progress: &mut impl FnMut(&Progress),
    ) -> Result<RunState, AppError> {
        let mut continue_token: Option<String> = None;

        loop {
            if cancellation.is_cancelled() {
                return Ok(RunState::Cancelled);
            }

            let spec = QuerySpec {
                start_time: opts.start_time.to_rfc3339(),
                end_time: opts.end_time.to_rfc3339(),
                limit: opts.batch_size,
                continue_token: continue_token.clone(),
                ..Default::default()
            };

            let page = self.query.query(kind, &spec, scope.clone(), Utc::now()).await?;
            progress.current_batch += 1;

            if limiter.wait(page.items.len() as u32, cancellation).await.is_err() {
                return Ok(RunState::Cancelled);
            }

            for item in page.items {
                progress.processed_events += 1;
                let Some(record) = to_record(item) else {
                    continue;
                };
                let ingested = Ingested::new(record, scope.clone());

                match self.translator.translate(&ingested) {
                    Ok(Some(activity)) => {
                        let policy_name = activity.metadata.labels.get("policy-name").cloned();
                        if policy_name.map_or(true, |name| !selected.contains(&name)) {
                            continue;
                        }
                        progress.activities_generated += 1;
                        if !opts.dry_run {
                            let policy_version = activity
                                .metadata
                                .labels
                                .get("policy-version")
                                .cloned()
                                .unwrap_or_default();
                            let dedup_key = activity.dedup_key(&policy_version);
                            let subject = format!(
                                "activity.{}.{}",
                                scope_segment(scope),
                                activity.spec.resource.kind.to_lowercase()
                            );
                            let payload = match serde_json::to_vec(&activity) {
                                Ok(bytes) => bytes,
                                Err(e) => {
                                    tracing::error!(error = %e, "failed to serialize activity for publish");
                                    progress.errors += 1;
                                    continue;
                                }
                            };
                            if let Err(e) =
                                self.publisher.publish(&subject, &payload, &dedup_key).await
                            {
                                return Err(AppError::Publish(e.to_string()));
                            }
                        }
                    }
                    Ok(None) => {}
                    Err(error) => {
                        tracing::warn!(%error, "re-index translation failed for one record");
                        progress.errors += 1;
                    }
                }
            }

            on_progress(progress);

            continue_token = page.continue_token;
            if continue_token.is_none() {
                break;
            }
        }

        Ok(RunState::Running)
    }
}

fn to_record(item: QueryItem) -> Option<Record> {
    match item {
        QueryItem::Audit(record) => Some(Record::Audit(record)),
        QueryItem::Event(record) => Some(Record::Event(record)),
        QueryItem::Activity(_) => None,
    }
}

fn scope_segment(scope: &Scope) -> &str {
    &scope.name
}
