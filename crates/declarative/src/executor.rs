//! Execution engine - applies resources in order, stopping at the first failure

use crate::context::ProgressCallback;
use crate::planner::ExecutionPlan;
use crate::types::ExecuteSummary;

/// A resource failed to apply
///
/// Carries what was completed before the failure so callers can report
/// partial progress. Resources after the failing one were not touched.
#[derive(Debug, thiserror::Error)]
#[error("failed to apply {resource_id}: {source}")]
pub struct ApplyError<E: std::error::Error + 'static> {
    /// Id of the resource that failed
    pub resource_id: String,
    /// Results for the resources applied before the failure
    pub completed: ExecuteSummary,
    /// Underlying resource error
    #[source]
    pub source: E,
}

impl<E: std::error::Error + 'static> ApplyError<E> {
    /// Unwrap the resource error
    pub fn into_source(self) -> E {
        self.source
    }
}

/// Execute a plan with the given options and progress callback
///
/// Resources are applied sequentially in plan order. The first error stops
/// execution and is returned with the summary of what had completed.
pub fn execute<E, P>(
    plan: &ExecutionPlan<'_, E>,
    progress: &mut P,
) -> Result<ExecuteSummary, ApplyError<E>>
where
    E: std::error::Error + 'static,
    P: ProgressCallback,
{
    let mut summary = ExecuteSummary::default();

    for resource in plan.iter() {
        let id = resource.id();
        progress.on_resource_start(&id, &resource.description());

        match resource.apply() {
            Ok(result) => {
                progress.on_resource_complete(&id, &result);
                summary.add_result(&result);
            }
            Err(source) => {
                progress.on_resource_failed(&id, &source);
                return Err(ApplyError {
                    resource_id: id,
                    completed: summary,
                    source,
                });
            }
        }
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::Resource;
    use crate::types::{ApplyResult, ResourceState};
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Debug, thiserror::Error)]
    #[error("boom: {0}")]
    struct Boom(String);

    struct TestResource {
        id: String,
        should_change: bool,
        fail: bool,
        log: Rc<RefCell<Vec<String>>>,
    }

    impl TestResource {
        fn new(id: &str, should_change: bool, log: &Rc<RefCell<Vec<String>>>) -> Self {
            Self {
                id: id.into(),
                should_change,
                fail: false,
                log: Rc::clone(log),
            }
        }
    }

    impl Resource for TestResource {
        type Error = Boom;

        fn id(&self) -> String {
            self.id.clone()
        }

        fn description(&self) -> String {
            format!("Test resource {}", self.id)
        }

        fn resource_type(&self) -> &'static str {
            "test"
        }

        fn current_state(&self) -> Result<ResourceState, Boom> {
            if self.should_change {
                Ok(ResourceState::Absent)
            } else {
                Ok(ResourceState::Present { details: None })
            }
        }

        fn desired_state(&self) -> ResourceState {
            ResourceState::Present { details: None }
        }

        fn apply(&self) -> Result<ApplyResult, Boom> {
            self.log.borrow_mut().push(self.id.clone());
            if self.fail {
                return Err(Boom(self.id.clone()));
            }
            if !self.should_change {
                return Ok(ApplyResult::NoChange);
            }
            Ok(ApplyResult::Created)
        }
    }

    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
    }

    impl ProgressCallback for Recorder {
        fn on_resource_start(&mut self, id: &str, _description: &str) {
            self.events.push(format!("start {id}"));
        }

        fn on_resource_complete(&mut self, id: &str, result: &ApplyResult) {
            self.events.push(format!("done {id} {result:?}"));
        }

        fn on_resource_failed(&mut self, id: &str, error: &dyn std::error::Error) {
            self.events.push(format!("failed {id} {error}"));
        }
    }

    #[test]
    fn test_execute_empty_plan() {
        let plan: ExecutionPlan<'_, Boom> = ExecutionPlan::new();
        let mut recorder = Recorder::default();

        let summary = execute(&plan, &mut recorder).unwrap();

        assert_eq!(summary, ExecuteSummary::default());
        assert!(recorder.events.is_empty());
    }

    #[test]
    fn test_execute_in_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut plan: ExecutionPlan<'_, Boom> = ExecutionPlan::new();
        plan.push(Box::new(TestResource::new("a", true, &log)));
        plan.push(Box::new(TestResource::new("b", false, &log)));
        plan.push(Box::new(TestResource::new("c", true, &log)));

        let mut recorder = Recorder::default();
        let summary = execute(&plan, &mut recorder).unwrap();

        assert_eq!(*log.borrow(), vec!["a", "b", "c"]);
        assert_eq!(summary.created, 2);
        assert_eq!(summary.no_change, 1);
        assert_eq!(recorder.events[0], "start a");
        assert_eq!(recorder.events[3], "done b NoChange");
    }

    #[test]
    fn test_execute_stops_at_first_failure() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut failing = TestResource::new("b", true, &log);
        failing.fail = true;

        let mut plan: ExecutionPlan<'_, Boom> = ExecutionPlan::new();
        plan.push(Box::new(TestResource::new("a", true, &log)));
        plan.push(Box::new(failing));
        plan.push(Box::new(TestResource::new("c", true, &log)));

        let mut recorder = Recorder::default();
        let err = execute(&plan, &mut recorder).unwrap_err();

        assert_eq!(err.resource_id, "b");
        assert_eq!(err.completed.created, 1);
        assert_eq!(*log.borrow(), vec!["a", "b"]);
        assert_eq!(recorder.events.last().unwrap(), "failed b boom: b");
        assert!(err.to_string().contains("failed to apply b"));
        assert_eq!(err.into_source().0, "b");
    }
}
