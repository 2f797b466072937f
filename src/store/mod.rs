//! Event persistence: backend contract, record kinds, routing, and the dual-path store.

pub mod backend;
pub mod client_ip;
pub mod event_store;
pub mod fallback;
pub mod memory;
pub mod records;
pub mod selector;
#[cfg(feature = "sqlite")]
pub mod sqlite;
