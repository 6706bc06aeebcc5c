//!
//! Utility module for the sync job.
//!
//! Formatting helpers shared by the classifier and the log output.
/// Amount formatting in a currency's native precision
pub mod amount;

pub use amount::format_amount;
