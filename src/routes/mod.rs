//! Route builders: per-collection CRUD groups and hub metadata.

pub mod collection;
pub mod meta;
pub use collection::collection_routes;
pub use meta::{meta_routes, CollectionMeta, HubMeta};
