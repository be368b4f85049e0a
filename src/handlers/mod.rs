//! HTTP handlers compiled into each collection's route group.

pub mod collection;
pub use collection::*;
