//! Contact record store: a flat `{name, email}` list served over REST.

pub mod cache;
pub mod model;
pub mod routes;

pub use cache::{CachedRecord, parse_cached_records};
pub use model::{ContactRecord, CreateContact};
pub use routes::{RecordRouteState, record_routes};
