pub mod pool;
pub mod rows;
pub mod store;

pub use pool::create_pool;
pub use rows::{ActivityRow, AuditRow, EventRow};
pub use store::{ColumnStore, CursorPosition, PgColumnStore, StoreFilters, StoreKind, StoreRow};

#[cfg(feature = "mock")]
pub use store::MockColumnStore;
