//! Execution planner - ordered list of resources to converge

use crate::resource::{BoxedResource, Resource};

/// An ordered execution plan
///
/// Resources are applied in insertion order.
pub struct ExecutionPlan<'a, E: std::error::Error + 'static> {
    resources: Vec<BoxedResource<'a, E>>,
}

impl<'a, E: std::error::Error + 'static> ExecutionPlan<'a, E> {
    /// Create a new empty plan
    pub fn new() -> Self {
        Self {
            resources: Vec::new(),
        }
    }

    /// Append a resource to the plan
    pub fn push(&mut self, resource: BoxedResource<'a, E>) {
        self.resources.push(resource);
    }

    /// Iterate resources in application order
    pub fn iter(&self) -> impl Iterator<Item = &(dyn Resource<Error = E> + 'a)> {
        self.resources.iter().map(|r| &**r)
    }
}

impl<E: std::error::Error + 'static> Default for ExecutionPlan<'_, E> {
    fn default() -> Self {
        Self::new()
    }
}
