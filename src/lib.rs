#![forbid(unsafe_code)]

//! toolpulse: client-side telemetry capture for a collection of utility tools.
//!
//! Records tool usage, form submissions, generated content and user actions
//! into a remote document store, or into an in-process fallback buffer when
//! no remote store is configured:
//! 1. **Event store**: one record/query API over both backends, chosen per call
//! 2. **Tracking facade**: named events whose failures never reach the caller
//! 3. **Instrumented generation**: telemetry around content-generation requests
//!
//! # Library usage
//!
//! Use the [`prelude`] for convenient access to the most common types:
//!
//! ```rust,no_run
//! use toolpulse::prelude::*;
//! ```
//!
//! Individual modules can also be imported directly:
//!
//! ```rust,no_run
//! use toolpulse::core::config::Config;
//! use toolpulse::store::event_store::EventStore;
//! ```

pub mod prelude;

pub mod core;
pub mod page;
pub mod session;
pub mod store;
pub mod tracking;
