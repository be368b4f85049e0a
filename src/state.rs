//! State shared by one collection's compiled routes.

use crate::config::SanitizedCollection;
use crate::driver::Driver;
use std::sync::Arc;

/// The database handle is injected per route group instead of living in a global.
#[derive(Clone)]
pub struct CollectionState<D> {
    pub collection: Arc<SanitizedCollection<D>>,
    pub driver: Arc<dyn Driver>,
    pub db: D,
}
