use chrono::Duration;

/// Tunables that bound query cost. `0`/`None` means "unlimited" per the
/// spec's configuration semantics, except `default_page_size` which is
/// always a concrete positive number.
#[derive(Debug, Clone)]
pub struct QueryConfig {
    /// `0` duration means unlimited.
    pub max_query_window: Duration,
    /// `0` means unlimited; otherwise a hard cap of 1000 is still applied.
    pub max_page_size: i64,
    pub default_page_size: i64,
    pub expr_step_budget: u32,
    pub filter_cache_capacity: usize,
}

impl QueryConfig {
    pub fn effective_max_page_size(&self) -> i64 {
        if self.max_page_size == 0 {
            1000
        } else {
            self.max_page_size.min(1000)
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            max_query_window: Duration::zero(),
            max_page_size: 0,
            default_page_size: 100,
            expr_step_budget: activity_expr::DEFAULT_STEP_BUDGET,
            filter_cache_capacity: 256,
        }
    }
}
