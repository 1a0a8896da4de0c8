//! Reconciliation of one `KeystoneService`
//!
//! A run walks these steps in order and stops at the first failure:
//! 1. Keystone bootstrap gate (defer while not bootstrapped)
//! 2. Load the service; a missing service has been deleted and needs nothing
//! 3. Authenticate with the connection parameters of the service
//! 4. Upsert the service and persist its ID if it changed
//! 5. Converge the admin, internal and public endpoints, in that order
//!
//! Running it again on unchanged inputs creates nothing new.

use crate::api::{KeystoneService, KeystoneServiceSpec, KeystoneServiceStatus, ObjectKey};
use crate::endpoint::EndpointResource;
use crate::error::ReconcileError;
use crate::gate::{self, BOOTSTRAP_REQUEUE_DELAY, Gate};
use crate::service::{service_opts, upsert_service};
use crate::store::{ObjectStore, StoreError};
use declarative::{
    ApplyError, ApplyResult, DiffSummary, ExecuteSummary, ExecutionPlan, ProgressCallback,
    ResourceDiff, ResourceState, compute_diffs, execute,
};
use identity::{Authenticator, Availability, Backend, ServiceOpts};
use serde::Serialize;
use std::time::Duration;

/// What the scheduler should do after a successful run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Converged; wait for the next change
    Done,
    /// Not finished; run again no sooner than this
    RequeueAfter(Duration),
}

/// Result of a successful run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub action: Action,
    /// Keystone ID of the service, when the run got that far
    pub service_id: Option<String>,
    pub endpoints: ExecuteSummary,
}

impl Outcome {
    fn action(action: Action) -> Self {
        Self {
            action,
            service_id: None,
            endpoints: ExecuteSummary::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    /// Name of the `KeystoneAPI` object in each namespace
    pub keystone_api_name: String,
    pub bootstrap_delay: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            keystone_api_name: "keystone".to_string(),
            bootstrap_delay: BOOTSTRAP_REQUEUE_DELAY,
        }
    }
}

enum Prepared {
    Ready(KeystoneService),
    /// Stop here with this action
    Stop(Action),
}

pub struct Reconciler<S, A> {
    store: S,
    auth: A,
    settings: Settings,
}

impl<S: ObjectStore, A: Authenticator> Reconciler<S, A> {
    pub fn new(store: S, auth: A) -> Self {
        Self::with_settings(store, auth, Settings::default())
    }

    pub fn with_settings(store: S, auth: A, settings: Settings) -> Self {
        Self {
            store,
            auth,
            settings,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn keystone_api_key(&self, key: &ObjectKey) -> ObjectKey {
        ObjectKey::new(&key.namespace, &self.settings.keystone_api_name)
    }

    /// Bootstrap gate then service load
    fn prepare(&self, key: &ObjectKey) -> Result<Prepared, ReconcileError> {
        let api_key = self.keystone_api_key(key);
        let delay = self.settings.bootstrap_delay;
        if let Gate::Defer(delay) = gate::check(&self.store, &api_key, delay)? {
            log::info!("{key}: KeystoneAPI {api_key} not bootstrapped yet, requeueing in {delay:?}");
            return Ok(Prepared::Stop(Action::RequeueAfter(delay)));
        }

        match self.store.get_service(key) {
            Ok(service) => Ok(Prepared::Ready(service)),
            Err(StoreError::NotFound { .. }) => {
                log::debug!("{key}: not found, nothing to do");
                Ok(Prepared::Stop(Action::Done))
            }
            Err(source) => Err(ReconcileError::Read {
                key: key.clone(),
                source,
            }),
        }
    }

    /// Run one reconciliation of the service at `key`
    pub fn reconcile(&self, key: &ObjectKey) -> Result<Outcome, ReconcileError> {
        let service = match self.prepare(key)? {
            Prepared::Ready(service) => service,
            Prepared::Stop(action) => return Ok(Outcome::action(action)),
        };
        let spec = &service.spec;

        let backend = self
            .auth
            .authenticate(&spec.auth_options())
            .map_err(ReconcileError::Auth)?;

        let observed = service.status.service_id();
        let service_id = upsert_service(backend.as_ref(), spec, observed)
            .map_err(ReconcileError::ServiceUpsert)?;

        if observed != Some(service_id.as_str()) {
            let status = KeystoneServiceStatus {
                service_id: Some(service_id.clone()),
            };
            self.store
                .update_service_status(key, service.metadata.resource_version, &status)
                .map_err(|source| ReconcileError::PersistStatus {
                    key: key.clone(),
                    source,
                })?;
            log::debug!("{key}: recorded service ID {service_id}");
        }

        let plan = endpoint_plan(backend.as_ref(), &service_id, spec)?;
        let endpoints = execute(&plan, &mut LogProgress { key })
            .map_err(ApplyError::into_source)?;

        log::info!(
            "{key}: reconciled service {service_id} ({} endpoint changes)",
            endpoints.total_changes()
        );
        Ok(Outcome {
            action: Action::Done,
            service_id: Some(service_id),
            endpoints,
        })
    }

    /// Report what `reconcile` would change without changing anything
    ///
    /// Authenticates and lists endpoints, but issues no writes to Keystone or
    /// the store.
    pub fn plan(&self, key: &ObjectKey) -> Result<ReconcilePlan, ReconcileError> {
        let service = match self.prepare(key)? {
            Prepared::Ready(service) => service,
            Prepared::Stop(Action::RequeueAfter(delay)) => {
                return Ok(ReconcilePlan::Deferred {
                    after_secs: delay.as_secs(),
                });
            }
            Prepared::Stop(Action::Done) => return Ok(ReconcilePlan::Deleted),
        };
        let spec = &service.spec;
        let opts = service_opts(spec);

        let Some(service_id) = service.status.service_id() else {
            // Nothing to look up before the service exists
            let endpoints: Vec<_> = spec
                .endpoints()
                .into_iter()
                .map(|(role, url)| EndpointPlan {
                    role,
                    url: url.map(str::to_string),
                    change: match url {
                        Some(_) => EndpointChange::Add,
                        None => EndpointChange::Unmanaged,
                    },
                })
                .collect();
            let summary = DiffSummary {
                additions: endpoints
                    .iter()
                    .filter(|e| e.change == EndpointChange::Add)
                    .count(),
                ..Default::default()
            };
            return Ok(ReconcilePlan::Ready {
                service: ServicePlan::Create { opts },
                endpoints,
                summary,
            });
        };

        let backend = self
            .auth
            .authenticate(&spec.auth_options())
            .map_err(ReconcileError::Auth)?;
        let plan = endpoint_plan(backend.as_ref(), service_id, spec)?;
        let diffs = compute_diffs(&plan)?;

        let endpoints = spec
            .endpoints()
            .into_iter()
            .map(|(role, url)| {
                let change = match url {
                    None => EndpointChange::Unmanaged,
                    Some(_) => diffs
                        .iter()
                        .find(|d| d.resource_id == format!("endpoint/{role}"))
                        .map_or(EndpointChange::Unchanged, EndpointChange::from_diff),
                };
                EndpointPlan {
                    role,
                    url: url.map(str::to_string),
                    change,
                }
            })
            .collect();

        Ok(ReconcilePlan::Ready {
            service: ServicePlan::Overwrite {
                id: service_id.to_string(),
                opts,
            },
            endpoints,
            summary: DiffSummary::from_diffs(&diffs),
        })
    }
}

/// Endpoint resources for every declared role, in admin, internal, public order
fn endpoint_plan<'a>(
    backend: &'a dyn Backend,
    service_id: &str,
    spec: &KeystoneServiceSpec,
) -> Result<ExecutionPlan<'a, ReconcileError>, ReconcileError> {
    let mut plan = ExecutionPlan::new();
    for (role, url) in spec.endpoints() {
        if let Some(resource) = EndpointResource::for_role(
            backend,
            service_id,
            &spec.service_name,
            &spec.region,
            role.as_str(),
            url,
        )? {
            plan.push(Box::new(resource));
        }
    }
    Ok(plan)
}

struct LogProgress<'k> {
    key: &'k ObjectKey,
}

impl ProgressCallback for LogProgress<'_> {
    fn on_resource_start(&mut self, _id: &str, description: &str) {
        log::debug!("{}: converging {description}", self.key);
    }

    fn on_resource_complete(&mut self, id: &str, result: &ApplyResult) {
        if *result == ApplyResult::NoChange {
            log::debug!("{}: {id} up to date", self.key);
        }
    }

    fn on_resource_failed(&mut self, id: &str, error: &dyn std::error::Error) {
        log::warn!("{}: {id} failed: {error}", self.key);
    }
}

// ============================================================================
// Plan
// ============================================================================

/// Dry-run report of a reconciliation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReconcilePlan {
    /// Keystone is not bootstrapped yet
    Deferred { after_secs: u64 },
    /// The service object does not exist
    Deleted,
    Ready {
        service: ServicePlan,
        endpoints: Vec<EndpointPlan>,
        summary: DiffSummary,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ServicePlan {
    Create { opts: ServiceOpts },
    /// Declared fields are always written back
    Overwrite { id: String, opts: ServiceOpts },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EndpointPlan {
    pub role: Availability,
    pub url: Option<String>,
    pub change: EndpointChange,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EndpointChange {
    /// No URL declared for this role
    Unmanaged,
    Unchanged,
    Add,
    Modify { from: String, to: String },
}

impl EndpointChange {
    fn from_diff(diff: &ResourceDiff) -> Self {
        match &diff.current {
            ResourceState::Modified { from, to } => Self::Modify {
                from: from.clone(),
                to: to.clone(),
            },
            _ => Self::Add,
        }
    }
}
