//! Backend traits and implementations for the Keystone catalog.
//!
//! An [`Authenticator`] turns [`AuthOptions`] into an authenticated
//! [`Backend`] session. The HTTP implementation lives in [`keystone`];
//! [`MockBackend`] keeps the catalog in memory and records every call.
//!
//! # Testing
//!
//! ```
//! use identity::backend::{Authenticator, Backend, Call, MockBackend};
//! use identity::{AuthOptions, ServiceOpts};
//!
//! let mock = MockBackend::new();
//! let session = mock.authenticate(&AuthOptions::default()).unwrap();
//! let service = session
//!     .create_service(&ServiceOpts {
//!         service_type: "compute".to_string(),
//!         enabled: true,
//!         name: "nova".to_string(),
//!         description: "Compute".to_string(),
//!     })
//!     .unwrap();
//!
//! assert_eq!(mock.services(), vec![service]);
//! assert_eq!(mock.mutating_calls().len(), 1);
//! assert!(matches!(mock.calls()[0], Call::Authenticate { .. }));
//! ```

pub mod keystone;

use crate::error::{Error, Result};
use crate::types::{AuthOptions, Endpoint, EndpointOpts, EndpointQuery, Service, ServiceOpts};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// An authenticated session against the identity catalog.
pub trait Backend: Send + Sync {
    /// Create a service and return it with its assigned identifier.
    fn create_service(&self, opts: &ServiceOpts) -> Result<Service>;

    /// Overwrite every field of an existing service.
    fn update_service(&self, id: &str, opts: &ServiceOpts) -> Result<Service>;

    /// List endpoints matching a filter, following pagination.
    fn list_endpoints(&self, query: &EndpointQuery) -> Result<Vec<Endpoint>>;

    /// Create an endpoint and return it with its assigned identifier.
    fn create_endpoint(&self, opts: &EndpointOpts) -> Result<Endpoint>;

    /// Overwrite every field of an existing endpoint.
    fn update_endpoint(&self, id: &str, opts: &EndpointOpts) -> Result<Endpoint>;
}

/// Opens authenticated sessions.
pub trait Authenticator: Send + Sync {
    /// Authenticate and return a session bound to the identity endpoint.
    fn authenticate(&self, opts: &AuthOptions) -> Result<Box<dyn Backend>>;
}

/// Operations a [`MockBackend`] can be told to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Authenticate,
    CreateService,
    UpdateService,
    ListEndpoints,
    CreateEndpoint,
    UpdateEndpoint,
}

/// A call recorded by [`MockBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Authenticate {
        auth_url: String,
        username: String,
        project: String,
        domain_name: String,
    },
    CreateService(ServiceOpts),
    UpdateService {
        id: String,
        opts: ServiceOpts,
    },
    ListEndpoints(EndpointQuery),
    CreateEndpoint(EndpointOpts),
    UpdateEndpoint {
        id: String,
        opts: EndpointOpts,
    },
}

impl Call {
    /// The operation this call performed.
    #[must_use]
    pub fn operation(&self) -> Operation {
        match self {
            Self::Authenticate { .. } => Operation::Authenticate,
            Self::CreateService(_) => Operation::CreateService,
            Self::UpdateService { .. } => Operation::UpdateService,
            Self::ListEndpoints(_) => Operation::ListEndpoints,
            Self::CreateEndpoint(_) => Operation::CreateEndpoint,
            Self::UpdateEndpoint { .. } => Operation::UpdateEndpoint,
        }
    }

    /// Whether this call changes the catalog.
    #[must_use]
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            Self::CreateService(_)
                | Self::UpdateService { .. }
                | Self::CreateEndpoint(_)
                | Self::UpdateEndpoint { .. }
        )
    }
}

#[derive(Debug, Default)]
struct MockState {
    services: BTreeMap<String, Service>,
    endpoints: BTreeMap<String, Endpoint>,
    calls: Vec<Call>,
    failures: HashMap<Operation, Error>,
    next_id: u64,
}

impl MockState {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{:04}", prefix, self.next_id)
    }

    fn record(&mut self, call: Call) -> Result<()> {
        let operation = call.operation();
        self.calls.push(call);
        match self.failures.remove(&operation) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// In-memory identity catalog for tests.
///
/// Clones share state, so a test can keep one handle for assertions while
/// handing another to the code under test. Authenticating returns a session
/// backed by the same catalog.
#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
}

impl MockBackend {
    /// Create an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seed a service, bypassing the call log.
    pub fn insert_service(&self, service: Service) {
        self.lock().services.insert(service.id.clone(), service);
    }

    /// Seed an endpoint, bypassing the call log.
    pub fn insert_endpoint(&self, endpoint: Endpoint) {
        self.lock().endpoints.insert(endpoint.id.clone(), endpoint);
    }

    /// Make the next call of `operation` fail with `error`.
    pub fn fail_next(&self, operation: Operation, error: Error) {
        self.lock().failures.insert(operation, error);
    }

    /// Services currently in the catalog, ordered by identifier.
    #[must_use]
    pub fn services(&self) -> Vec<Service> {
        self.lock().services.values().cloned().collect()
    }

    /// Endpoints currently in the catalog, ordered by identifier.
    #[must_use]
    pub fn endpoints(&self) -> Vec<Endpoint> {
        self.lock().endpoints.values().cloned().collect()
    }

    /// Every call made so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    /// Calls that changed the catalog, in order.
    #[must_use]
    pub fn mutating_calls(&self) -> Vec<Call> {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.is_mutating())
            .cloned()
            .collect()
    }

    /// Number of calls of one operation.
    #[must_use]
    pub fn count(&self, operation: Operation) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.operation() == operation)
            .count()
    }

    /// Forget recorded calls, keeping the catalog.
    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }
}

impl Authenticator for MockBackend {
    fn authenticate(&self, opts: &AuthOptions) -> Result<Box<dyn Backend>> {
        self.lock().record(Call::Authenticate {
            auth_url: opts.auth_url.clone(),
            username: opts.username.clone(),
            project: opts.project.clone(),
            domain_name: opts.domain_name.clone(),
        })?;
        Ok(Box::new(self.clone()))
    }
}

impl Backend for MockBackend {
    fn create_service(&self, opts: &ServiceOpts) -> Result<Service> {
        let mut state = self.lock();
        state.record(Call::CreateService(opts.clone()))?;
        let service = Service {
            id: state.next_id("svc"),
            service_type: opts.service_type.clone(),
            enabled: opts.enabled,
            name: opts.name.clone(),
            description: opts.description.clone(),
        };
        state.services.insert(service.id.clone(), service.clone());
        Ok(service)
    }

    fn update_service(&self, id: &str, opts: &ServiceOpts) -> Result<Service> {
        let mut state = self.lock();
        state.record(Call::UpdateService {
            id: id.to_string(),
            opts: opts.clone(),
        })?;
        let service = state
            .services
            .get_mut(id)
            .ok_or_else(|| Error::api(404, format!("Could not find service: {}.", id)))?;
        service.service_type = opts.service_type.clone();
        service.enabled = opts.enabled;
        service.name = opts.name.clone();
        service.description = opts.description.clone();
        Ok(service.clone())
    }

    fn list_endpoints(&self, query: &EndpointQuery) -> Result<Vec<Endpoint>> {
        let mut state = self.lock();
        state.record(Call::ListEndpoints(query.clone()))?;
        Ok(state
            .endpoints
            .values()
            .filter(|e| query.matches(e))
            .cloned()
            .collect())
    }

    fn create_endpoint(&self, opts: &EndpointOpts) -> Result<Endpoint> {
        let mut state = self.lock();
        state.record(Call::CreateEndpoint(opts.clone()))?;
        let endpoint = Endpoint {
            id: state.next_id("ep"),
            service_id: opts.service_id.clone(),
            availability: opts.availability,
            region: opts.region.clone(),
            name: opts.name.clone(),
            url: opts.url.clone(),
        };
        state.endpoints.insert(endpoint.id.clone(), endpoint.clone());
        Ok(endpoint)
    }

    fn update_endpoint(&self, id: &str, opts: &EndpointOpts) -> Result<Endpoint> {
        let mut state = self.lock();
        state.record(Call::UpdateEndpoint {
            id: id.to_string(),
            opts: opts.clone(),
        })?;
        let endpoint = state
            .endpoints
            .get_mut(id)
            .ok_or_else(|| Error::api(404, format!("Could not find endpoint: {}.", id)))?;
        endpoint.service_id = opts.service_id.clone();
        endpoint.availability = opts.availability;
        endpoint.region = opts.region.clone();
        endpoint.name = opts.name.clone();
        endpoint.url = opts.url.clone();
        Ok(endpoint.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Availability;

    fn service_opts() -> ServiceOpts {
        ServiceOpts {
            service_type: "image".to_string(),
            enabled: true,
            name: "glance".to_string(),
            description: "Image service".to_string(),
        }
    }

    fn endpoint_opts(service_id: &str, availability: Availability, url: &str) -> EndpointOpts {
        EndpointOpts {
            availability,
            name: "glance".to_string(),
            region: "regionOne".to_string(),
            service_id: service_id.to_string(),
            url: url.to_string(),
        }
    }

    #[test]
    fn test_mock_backend_new() {
        let mock = MockBackend::new();
        assert!(mock.services().is_empty());
        assert!(mock.endpoints().is_empty());
        assert!(mock.calls().is_empty());
    }

    #[test]
    fn test_mock_create_and_update_service() {
        let mock = MockBackend::new();
        let created = mock.create_service(&service_opts()).unwrap();
        assert!(!created.id.is_empty());

        let mut opts = service_opts();
        opts.enabled = false;
        let updated = mock.update_service(&created.id, &opts).unwrap();
        assert_eq!(updated.id, created.id);
        assert!(!updated.enabled);
        assert_eq!(mock.services().len(), 1);
        assert_eq!(mock.count(Operation::CreateService), 1);
        assert_eq!(mock.count(Operation::UpdateService), 1);
    }

    #[test]
    fn test_mock_update_missing_service() {
        let mock = MockBackend::new();
        let err = mock.update_service("nope", &service_opts()).unwrap_err();
        assert_eq!(err.status(), Some(404));
    }

    #[test]
    fn test_mock_list_endpoints_filters() {
        let mock = MockBackend::new();
        mock.create_endpoint(&endpoint_opts("svc", Availability::Admin, "http://a"))
            .unwrap();
        mock.create_endpoint(&endpoint_opts("svc", Availability::Public, "http://p"))
            .unwrap();
        mock.create_endpoint(&endpoint_opts("other", Availability::Admin, "http://o"))
            .unwrap();

        let found = mock
            .list_endpoints(&EndpointQuery {
                service_id: "svc".to_string(),
                availability: Availability::Admin,
                region: "regionOne".to_string(),
            })
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].url, "http://a");
    }

    #[test]
    fn test_mock_update_endpoint_keeps_id() {
        let mock = MockBackend::new();
        let created = mock
            .create_endpoint(&endpoint_opts("svc", Availability::Internal, "http://old"))
            .unwrap();
        let updated = mock
            .update_endpoint(
                &created.id,
                &endpoint_opts("svc", Availability::Internal, "http://new"),
            )
            .unwrap();
        assert_eq!(updated.id, created.id);
        assert_eq!(mock.endpoints()[0].url, "http://new");
    }

    #[test]
    fn test_mock_fail_next_is_one_shot() {
        let mock = MockBackend::new();
        mock.fail_next(Operation::CreateService, Error::http("connection reset"));

        assert!(mock.create_service(&service_opts()).is_err());
        assert!(mock.services().is_empty());
        assert!(mock.create_service(&service_opts()).is_ok());
        // Failed calls are still recorded.
        assert_eq!(mock.count(Operation::CreateService), 2);
    }

    #[test]
    fn test_mock_authenticate_shares_catalog() {
        let mock = MockBackend::new();
        let session = mock
            .authenticate(&AuthOptions {
                auth_url: "http://keystone:5000/v3".to_string(),
                ..AuthOptions::default()
            })
            .unwrap();
        session.create_service(&service_opts()).unwrap();

        assert_eq!(mock.services().len(), 1);
        assert_eq!(mock.calls().len(), 2);
        assert_eq!(mock.mutating_calls().len(), 1);
    }

    #[test]
    fn test_mock_authenticate_failure() {
        let mock = MockBackend::new();
        mock.fail_next(Operation::Authenticate, Error::api(401, "bad credentials"));
        assert!(mock.authenticate(&AuthOptions::default()).is_err());
    }

    #[test]
    fn test_mock_clear_calls() {
        let mock = MockBackend::new();
        mock.create_service(&service_opts()).unwrap();
        mock.clear_calls();
        assert!(mock.calls().is_empty());
        assert_eq!(mock.services().len(), 1);
    }
}
