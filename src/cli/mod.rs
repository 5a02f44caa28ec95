//! Command-line interface for probing and running the upstream selector

pub mod probe;
pub mod run;

pub use probe::*;
pub use run::*;
