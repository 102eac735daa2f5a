//! Materialized state and dirty tracking.

mod dirty;
mod store;

pub use dirty::DirtySet;
pub use store::{RemovedCity, StateStore, StoreError, StoreSnapshot};
