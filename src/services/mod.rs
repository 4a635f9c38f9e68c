//! Reconciliation services
//!
//! The observer and the loop only talk to the OS through
//! [`NetworkConfigurator`](crate::netsh_client::NetworkConfigurator), so they
//! can be exercised against a mock.

pub mod observer;
pub mod profile_store;
pub mod reconciliation;
