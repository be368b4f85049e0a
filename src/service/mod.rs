//! Record validation shared by every driver.

mod validation;
pub use validation::{value_eq, RecordValidator};
