// HTTP API for holiday-keeper: sync triggers, scope refresh/delete and search.

pub mod auth;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod server;

pub use handlers::AppState;
pub use server::ApiServer;
