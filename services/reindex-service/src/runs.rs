use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use activity_reindex::{Progress, RunState};

/// Snapshot of one in-flight or finished run, polled by `GET /reindex/{id}`.
/// The orchestrator itself is fire-and-forget once spawned (§4.5 describes
/// `Run` as a long operation reporting progress, not a request/response
/// call), so something has to hold the latest `Progress`/`RunState` between
/// polls -- this registry is that something.
#[derive(Debug, Clone)]
pub struct RunSnapshot {
    pub state: RunState,
    pub progress: Progress,
}

struct RunEntry {
    snapshot: Mutex<RunSnapshot>,
    cancellation: CancellationToken,
}

#[derive(Default)]
pub struct RunRegistry {
    runs: Mutex<HashMap<Uuid, Arc<RunEntry>>>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new run id before the orchestrator task starts, so a
    /// poll landing immediately after the response carrying the id is
    /// never met with a 404.
    pub fn start(&self) -> (Uuid, CancellationToken) {
        let id = Uuid::new_v4();
        let cancellation = CancellationToken::new();
        let entry = Arc::new(RunEntry {
            snapshot: Mutex::new(RunSnapshot {
                state: RunState::Pending,
                progress: Progress::default(),
            }),
            cancellation: cancellation.clone(),
        });
        self.runs.lock().unwrap().insert(id, entry);
        (id, cancellation)
    }

    pub fn update(&self, id: Uuid, state: RunState, progress: Progress) {
        if let Some(entry) = self.runs.lock().unwrap().get(&id) {
            *entry.snapshot.lock().unwrap() = RunSnapshot { state, progress };
        }
    }

    pub fn get(&self, id: Uuid) -> Option<RunSnapshot> {
        self.runs
            .lock()
            .unwrap()
            .get(&id)
            .map(|entry| entry.snapshot.lock().unwrap().clone())
    }

    pub fn cancel(&self, id: Uuid) -> bool {
        match self.runs.lock().unwrap().get(&id) {
            Some(entry) => {
                entry.cancellation.cancel();
                true
            }
            None => false,
        }
    }
}
