pub mod db;
pub mod memory;
pub mod nager;
pub mod pg_store;
pub mod provider;
pub mod store;
