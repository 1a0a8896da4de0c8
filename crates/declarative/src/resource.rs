//! Resource trait for declarative state management
//!
//! A Resource represents something that can be in a certain state,
//! and can be changed to reach a desired state.

use crate::types::{ApplyResult, ResourceState};

/// Core trait for declarative resources
///
/// Every resource in the system implements this trait, which provides:
/// - Identity (id, description, type)
/// - State detection (current vs desired)
/// - State convergence (apply)
///
/// The error type is chosen by the implementor so callers keep their own
/// error taxonomy through planning and execution.
///
/// # Example
///
/// ```
/// use declarative::{ApplyResult, Resource, ResourceState};
/// use std::cell::Cell;
///
/// struct Counter {
///     value: Cell<u32>,
///     target: u32,
/// }
///
/// impl Resource for Counter {
///     type Error = std::fmt::Error;
///
///     fn id(&self) -> String {
///         "counter".into()
///     }
///
///     fn description(&self) -> String {
///         format!("Counter at {}", self.target)
///     }
///
///     fn resource_type(&self) -> &'static str {
///         "counter"
///     }
///
///     fn current_state(&self) -> Result<ResourceState, Self::Error> {
///         Ok(ResourceState::Present {
///             details: Some(self.value.get().to_string()),
///         })
///     }
///
///     fn desired_state(&self) -> ResourceState {
///         ResourceState::Present {
///             details: Some(self.target.to_string()),
///         }
///     }
///
///     fn apply(&self) -> Result<ApplyResult, Self::Error> {
///         if self.value.get() == self.target {
///             return Ok(ApplyResult::NoChange);
///         }
///         self.value.set(self.target);
///         Ok(ApplyResult::Modified)
///     }
/// }
///
/// let counter = Counter { value: Cell::new(1), target: 3 };
/// assert_eq!(counter.apply().unwrap(), ApplyResult::Modified);
/// assert_eq!(counter.current_state().unwrap(), counter.desired_state());
/// ```
pub trait Resource {
    /// Error raised while observing or converging the resource
    type Error: std::error::Error + 'static;

    /// Unique identifier for this resource
    ///
    /// This should be stable and uniquely identify the resource
    /// within its type, e.g. "endpoint/public".
    fn id(&self) -> String;

    /// Human-readable description of what this resource does
    fn description(&self) -> String;

    /// Resource type category, used for grouping and reporting
    fn resource_type(&self) -> &'static str;

    /// Detect the current state of this resource
    fn current_state(&self) -> Result<ResourceState, Self::Error>;

    /// Get the desired state for this resource
    fn desired_state(&self) -> ResourceState;

    /// Apply changes to reach the desired state
    ///
    /// This method should:
    /// 1. Check if already in desired state (return NoChange)
    /// 2. Make the necessary changes
    /// 3. Return the appropriate ApplyResult
    fn apply(&self) -> Result<ApplyResult, Self::Error>;
}

/// A boxed resource for type-erased storage
pub type BoxedResource<'a, E> = Box<dyn Resource<Error = E> + 'a>;
