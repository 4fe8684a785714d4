//! Error kinds shared across the crate.
//!
//! Each concern gets its own enum; `PipelineError` aggregates the ones that
//! can surface while a session travels from the protocol path to the store.

pub mod types;
