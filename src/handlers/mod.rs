//! HTTP handlers.

pub mod trigger;

pub use trigger::{router, TriggerError, LIFECYCLE_PATH};
