//! Utility functions for the upstream selector

pub mod url;
pub mod time;

pub use self::url::*;
pub use self::time::*;
