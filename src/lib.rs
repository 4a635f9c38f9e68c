pub mod config;
pub mod netsh_client;
pub mod services;

pub use services::profile_store;
pub use services::reconciliation;
