pub mod cancel;
pub mod error;
pub mod hasher;
pub mod report;
pub mod repository;
pub mod scan;
#[cfg(test)]
pub mod test_utils;
pub mod trigger;
pub mod workflows;

pub use cancel::CancelFlag;
pub use error::{Result, ScanError};
pub use report::{Finding, ScanSummary};
pub use scan::{ScanOptions, ScanRequest, Scanner};
pub use trigger::{TriggerExtractor, TriggerMatch, TARGET_EVENT};
