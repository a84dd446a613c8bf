//! holiday-keeper: keeps a local copy of public-holiday data in sync with the
//! Nager.Date API and serves it over HTTP.
pub mod api;
pub mod bootstrap;
pub mod config;
pub mod database_ops;
pub mod error;
pub mod model;
pub mod scheduler;
pub mod search;
pub mod sync;
pub mod telemetry;

pub mod util {
    pub mod env;
}

#[cfg(test)]
pub(crate) mod testing;

pub use error::{ProviderError, StoreError, SyncError, SyncResult};
