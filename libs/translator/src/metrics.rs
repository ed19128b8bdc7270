use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide, monotonic translation counters. These are the only
/// global mutable state this crate carries, per §5's resource model.
#[derive(Debug, Default)]
pub struct TranslatorMetrics {
    pub matched: AtomicU64,
    pub skipped_no_match: AtomicU64,
    pub translation_failures: AtomicU64,
    pub link_marker_mismatches: AtomicU64,
}

impl TranslatorMetrics {
    pub const fn new() -> Self {
        Self {
            matched: AtomicU64::new(0),
            skipped_no_match: AtomicU64::new(0),
            translation_failures: AtomicU64::new(0),
            link_marker_mismatches: AtomicU64::new(0),
        }
    }

    pub fn record_matched(&self) {
        self.matched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped_no_match(&self) {
        self.skipped_no_match.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_translation_failure(&self) {
        self.translation_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_link_marker_mismatch(&self) {
        self.link_marker_mismatches.fetch_add(1, Ordering::Relaxed);
    }
}

pub static METRICS: TranslatorMetrics = TranslatorMetrics::new();
