//! Request extractors shared by handlers and middleware.

pub mod context;
pub use context::{Operation, RequestContext};
