//! Metrics provider clients.

pub mod http;
pub mod mock;

pub use http::HttpMetricsProvider;
pub use mock::{MockMetricsProvider, ScriptedResponse};
