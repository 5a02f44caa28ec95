//! Configuration for the upstream selector

pub mod settings;

pub use settings::{SelectorConfig, UpstreamConfig};
