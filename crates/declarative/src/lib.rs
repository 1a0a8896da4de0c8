//! # Declarative
//!
//! A framework for declarative resource management.
//!
//! This crate provides the core abstractions for declaring desired state,
//! detecting current state, and converging systems to match the desired state.
//!
//! ## Core Concepts
//!
//! - **Resource**: Something with state that can be managed (a catalog entry, a file)
//! - **ResourceState**: The current or desired state of a resource
//! - **ExecutionPlan**: An ordered list of resources
//! - **Executor**: Applies resources in order, stopping at the first failure
//!
//! Resources pick their own error type, so a failed apply hands the caller
//! back its own error wrapped in an [`ApplyError`] together with a summary
//! of what was completed before the failure.
//!
//! ## Provider Traits
//!
//! - [`ProgressCallback`]: Receives progress updates
//!
//! This allows the crate to be used without hard dependencies on
//! a specific logging or UI framework.

pub mod context;
pub mod diff;
pub mod executor;
pub mod planner;
pub mod resource;
pub mod types;

// Re-export main types at crate root
pub use context::ProgressCallback;
pub use diff::{compute_diffs, DiffSummary, ResourceDiff};
pub use executor::{execute, ApplyError};
pub use planner::ExecutionPlan;
pub use resource::{BoxedResource, Resource};
pub use types::{ApplyResult, ExecuteSummary, ResourceState};
