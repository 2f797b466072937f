//! Core types: errors, configuration, logging setup.

pub mod config;
pub mod errors;
pub mod logging;
