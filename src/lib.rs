//! Destructive, self-restoring integrity test for block devices.
//!
//! Each block of the selected window is saved, overwritten with random data,
//! read back and compared, then restored. A run stops at the first block whose
//! read-back deviates from what was written.

pub mod confirm;
pub mod device;
pub mod format;
pub mod log;
pub mod plan;
pub mod position;
pub mod tester;

pub use device::{BlockDevice, FileDevice};
pub use plan::{plan, Block, Plan, PlanError, TestWindow};
pub use position::{Direction, ParseError, Quantity, Range, Unit};
pub use tester::{BlockOutcome, BlockProgress, BlockTester, RunSummary, TestError};

#[cfg(test)]
mod tests;
