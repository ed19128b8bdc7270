mod config;
mod cursor;
mod engine;
mod facet;
mod field_label;
mod spec;
mod time;

pub use config::QueryConfig;
pub use cursor::Cursor;
pub use engine::{Page, QueryEngine, QueryItem};
pub use facet::{
    resolve_facet_time_range, validate_facet_count, FacetRequest, FacetResult, FacetSpec,
    FacetValue, DEFAULT_FACET_LIMIT, MAX_FACET_LIMIT,
};
pub use field_label::event_selector_to_field;
pub use spec::{After, QuerySpec, ValidatedQuery};
pub use time::parse_time;
