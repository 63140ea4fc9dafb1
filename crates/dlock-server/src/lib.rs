//! dlock demo server
//!
//! Exposes lock protected HTTP endpoints backed by the in-process or redis
//! lock store.

pub mod api;
pub mod model;
pub mod startup;
