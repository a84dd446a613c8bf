pub mod provider;

pub use provider::NagerProvider;
