use std::cell::RefCell;
use std::collections::HashMap;

use activity_models::ResourceRef;
use serde_json::Value as Json;

/// One `link()` call recorded during evaluation of a summary template.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkRecord {
    pub marker: String,
    pub resource: ResourceRef,
}

/// Default per-evaluation step budget. Chosen generously above any
/// realistic rule so legitimate expressions never hit it; it exists to
/// bound pathological input, not to constrain normal rules.
pub const DEFAULT_STEP_BUDGET: u32 = 10_000;

/// The bindings and side-channel state visible to one `evaluate` call.
///
/// The `link()` side-channel is a `RefCell<Vec<LinkRecord>>` owned by the
/// `Env` for the duration of one call, not a true thread-local: evaluation
/// is single-threaded per call, and the engine runs inside async workers
/// where a real thread-local would leak across `.await` points.
pub struct Env {
    bindings: HashMap<String, Json>,
    links: RefCell<Vec<LinkRecord>>,
    steps: RefCell<u32>,
    step_budget: u32,
}

impl Env {
    pub fn new() -> Self {
        Self {
            bindings: HashMap::new(),
            links: RefCell::new(Vec::new()),
            steps: RefCell::new(0),
            step_budget: DEFAULT_STEP_BUDGET,
        }
    }

    pub fn with_step_budget(mut self, budget: u32) -> Self {
        self.step_budget = budget;
        self
    }

    pub fn bind(mut self, name: impl Into<String>, value: Json) -> Self {
        self.bindings.insert(name.into(), value);
        self
    }

    pub(crate) fn lookup(&self, name: &str) -> Option<&Json> {
        self.bindings.get(name)
    }

    pub(crate) fn step_budget(&self) -> u32 {
        self.step_budget
    }

    pub(crate) fn steps(&self) -> &RefCell<u32> {
        &self.steps
    }

    pub(crate) fn record_link(&self, record: LinkRecord) {
        self.links.borrow_mut().push(record);
    }

    /// Consume the environment and return every `link()` call recorded
    /// during evaluation.
    pub fn into_links(self) -> Vec<LinkRecord> {
        self.links.into_inner()
    }

    pub fn links(&self) -> Vec<LinkRecord> {
        self.links.borrow().clone()
    }
}

impl Default for Env {
    fn default() -> Self {
        Self::new()
    }
}
