//! Tandem Core: error taxonomy, hybrid configuration, shared result types.

pub mod config;
pub mod error;
pub mod types;

pub use config::{FusionStrategy, HybridConfig};
pub use error::{Error, Result};
pub use types::{RankedItem, ResultSource};
