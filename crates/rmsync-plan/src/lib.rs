//! Reconciliation planning for rmsync.
//!
//! Given the device tree, the mirror tree and the time of the last
//! successful sync, the planner decides for every path whether to PULL it
//! from the device, PUSH it to the device, DROP it from the mirror or leave
//! it alone, and orders the result so it can be executed top to bottom:
//!
//! 1. All PULLs, parents before children
//! 2. All PUSHes, parents before children
//! 3. All DROPs, children before parents
//!
//! ```rust,ignore
//! use rmsync_plan::SyncPlanner;
//! use rmsync_scan::Correspondence;
//!
//! let resolver = Correspondence::new();
//! let plan = SyncPlanner::new().plan(&device, &mirror, &resolver, watermark)?;
//!
//! for op in &plan {
//!     println!("{op}");
//! }
//! println!("{}", plan.summary());
//! ```

mod decision;
mod planner;

pub use decision::{decide, reference_time, Decision, Pair};
pub use planner::{Plan, PlanConfig, PlanConfigBuilder, SyncPlanner};
