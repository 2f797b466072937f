//! Tracking facades: containment, named events, instrumented generation.

pub mod containment;
pub mod facade;
pub mod generation;
pub mod tools;
