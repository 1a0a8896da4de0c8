//! Endpoint reconciliation
//!
//! Endpoints are not tracked in status. Each run looks them up by
//! `(service, interface, region)` and converges the single match onto the
//! declared URL.

use crate::error::ReconcileError;
use declarative::{ApplyResult, Resource, ResourceState};
use identity::{Availability, Backend, Endpoint, EndpointOpts, EndpointQuery};

/// One declared endpoint of a service
pub struct EndpointResource<'a> {
    backend: &'a dyn Backend,
    service_id: String,
    service_name: String,
    region: String,
    availability: Availability,
    url: String,
}

impl<'a> EndpointResource<'a> {
    /// Build the resource for a declared role
    ///
    /// Returns `None` when no URL is declared: that role is left unmanaged.
    /// The URL is checked before the role name.
    pub fn for_role(
        backend: &'a dyn Backend,
        service_id: &str,
        service_name: &str,
        region: &str,
        role: &str,
        url: Option<&str>,
    ) -> Result<Option<Self>, ReconcileError> {
        let Some(url) = url.filter(|u| !u.is_empty()) else {
            return Ok(None);
        };
        let availability: Availability = role
            .parse()
            .map_err(|_| ReconcileError::InvalidRole(role.to_string()))?;

        Ok(Some(Self {
            backend,
            service_id: service_id.to_string(),
            service_name: service_name.to_string(),
            region: region.to_string(),
            availability,
            url: url.to_string(),
        }))
    }

    pub fn availability(&self) -> Availability {
        self.availability
    }

    fn query(&self) -> EndpointQuery {
        EndpointQuery {
            service_id: self.service_id.clone(),
            availability: self.availability,
            region: self.region.clone(),
        }
    }

    fn opts(&self) -> EndpointOpts {
        EndpointOpts {
            availability: self.availability,
            name: self.service_name.clone(),
            region: self.region.clone(),
            service_id: self.service_id.clone(),
            url: self.url.clone(),
        }
    }

    fn remote_err(&self, source: identity::Error) -> ReconcileError {
        ReconcileError::Endpoint {
            role: self.availability,
            source,
        }
    }

    /// The existing endpoint for this role, if any
    ///
    /// More than one match is refused rather than guessed at.
    pub fn lookup(&self) -> Result<Option<Endpoint>, ReconcileError> {
        let mut matches = self
            .backend
            .list_endpoints(&self.query())
            .map_err(|e| self.remote_err(e))?;

        match matches.len() {
            0 => Ok(None),
            1 => Ok(matches.pop()),
            _ => Err(ReconcileError::AmbiguousEndpoints {
                role: self.availability,
                region: self.region.clone(),
                ids: matches.into_iter().map(|e| e.id).collect(),
            }),
        }
    }
}

impl Resource for EndpointResource<'_> {
    type Error = ReconcileError;

    fn id(&self) -> String {
        format!("endpoint/{}", self.availability)
    }

    fn description(&self) -> String {
        format!(
            "{} endpoint of {} in {}: {}",
            self.availability, self.service_name, self.region, self.url
        )
    }

    fn resource_type(&self) -> &'static str {
        "endpoint"
    }

    fn current_state(&self) -> Result<ResourceState, ReconcileError> {
        Ok(match self.lookup()? {
            None => ResourceState::Absent,
            Some(existing) if existing.url == self.url => ResourceState::Present {
                details: Some(existing.url),
            },
            Some(existing) => ResourceState::Modified {
                from: existing.url,
                to: self.url.clone(),
            },
        })
    }

    fn desired_state(&self) -> ResourceState {
        ResourceState::Present {
            details: Some(self.url.clone()),
        }
    }

    fn apply(&self) -> Result<ApplyResult, ReconcileError> {
        match self.lookup()? {
            None => {
                let created = self
                    .backend
                    .create_endpoint(&self.opts())
                    .map_err(|e| self.remote_err(e))?;
                log::info!(
                    "Created {} endpoint {} for service {}",
                    self.availability,
                    created.id,
                    self.service_id
                );
                Ok(ApplyResult::Created)
            }
            Some(existing) if existing.url == self.url => Ok(ApplyResult::NoChange),
            Some(existing) => {
                self.backend
                    .update_endpoint(&existing.id, &self.opts())
                    .map_err(|e| self.remote_err(e))?;
                log::info!(
                    "Updated {} endpoint {}: {} -> {}",
                    self.availability,
                    existing.id,
                    existing.url,
                    self.url
                );
                Ok(ApplyResult::Modified)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;
    use identity::{Call, MockBackend, Operation};

    const SERVICE: &str = "svc-1";
    const REGION: &str = "regionOne";

    fn reconcile(
        backend: &MockBackend,
        role: &str,
        url: Option<&str>,
    ) -> Result<Option<ApplyResult>, ReconcileError> {
        EndpointResource::for_role(backend, SERVICE, "glance", REGION, role, url)?
            .map(|resource| resource.apply())
            .transpose()
    }

    fn existing(id: &str, availability: Availability, url: &str) -> Endpoint {
        Endpoint {
            id: id.into(),
            service_id: SERVICE.into(),
            availability,
            region: REGION.into(),
            name: "glance".into(),
            url: url.into(),
        }
    }

    #[test]
    fn test_missing_url_makes_no_calls() {
        let backend = MockBackend::new();

        assert_eq!(reconcile(&backend, "public", None).unwrap(), None);
        assert_eq!(reconcile(&backend, "admin", Some("")).unwrap(), None);

        assert!(backend.calls().is_empty());
    }

    #[test]
    fn test_missing_url_wins_over_unknown_role() {
        let backend = MockBackend::new();
        assert!(matches!(reconcile(&backend, "private", None), Ok(None)));
    }

    #[test]
    fn test_unknown_role_is_invalid_input() {
        let backend = MockBackend::new();

        let err = reconcile(&backend, "private", Some("http://x")).unwrap_err();

        assert_eq!(err.category(), ErrorCategory::InvalidInput);
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn test_creates_when_absent() {
        let backend = MockBackend::new();

        let result = reconcile(&backend, "public", Some("http://svc.example/public")).unwrap();

        assert_eq!(result, Some(ApplyResult::Created));
        assert_eq!(
            backend.mutating_calls(),
            vec![Call::CreateEndpoint(EndpointOpts {
                availability: Availability::Public,
                name: "glance".into(),
                region: REGION.into(),
                service_id: SERVICE.into(),
                url: "http://svc.example/public".into(),
            })]
        );
    }

    #[test]
    fn test_updates_drifted_url_in_place() {
        let backend = MockBackend::new();
        backend.insert_endpoint(existing("ep-7", Availability::Internal, "http://old"));

        let result = reconcile(&backend, "internal", Some("http://new")).unwrap();

        assert_eq!(result, Some(ApplyResult::Modified));
        assert_eq!(backend.count(Operation::UpdateEndpoint), 1);
        assert_eq!(backend.count(Operation::CreateEndpoint), 0);
        let endpoints = backend.endpoints();
        assert_eq!(endpoints.len(), 1);
        assert_eq!(endpoints[0].id, "ep-7");
        assert_eq!(endpoints[0].url, "http://new");
    }

    #[test]
    fn test_matching_url_is_untouched() {
        let backend = MockBackend::new();
        backend.insert_endpoint(existing("ep-7", Availability::Admin, "http://same"));

        let result = reconcile(&backend, "admin", Some("http://same")).unwrap();

        assert_eq!(result, Some(ApplyResult::NoChange));
        assert!(backend.mutating_calls().is_empty());
        assert_eq!(backend.count(Operation::ListEndpoints), 1);
    }

    #[test]
    fn test_other_roles_and_regions_are_ignored() {
        let backend = MockBackend::new();
        backend.insert_endpoint(existing("ep-1", Availability::Admin, "http://admin"));
        let mut elsewhere = existing("ep-2", Availability::Public, "http://far");
        elsewhere.region = "regionTwo".into();
        backend.insert_endpoint(elsewhere);

        let result = reconcile(&backend, "public", Some("http://near")).unwrap();

        assert_eq!(result, Some(ApplyResult::Created));
        assert_eq!(backend.endpoints().len(), 3);
    }

    #[test]
    fn test_duplicates_are_refused_without_mutation() {
        let backend = MockBackend::new();
        backend.insert_endpoint(existing("ep-1", Availability::Public, "http://a"));
        backend.insert_endpoint(existing("ep-2", Availability::Public, "http://b"));

        let err = reconcile(&backend, "public", Some("http://c")).unwrap_err();

        match err {
            ReconcileError::AmbiguousEndpoints { role, ids, .. } => {
                assert_eq!(role, Availability::Public);
                assert_eq!(ids, vec!["ep-1", "ep-2"]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(backend.mutating_calls().is_empty());
    }

    #[test]
    fn test_remote_failure_names_role() {
        let backend = MockBackend::new();
        backend.fail_next(Operation::ListEndpoints, identity::Error::http("timed out"));

        let err = reconcile(&backend, "admin", Some("http://x")).unwrap_err();

        assert!(matches!(
            err,
            ReconcileError::Endpoint {
                role: Availability::Admin,
                ..
            }
        ));
    }

    #[test]
    fn test_current_state_reports_drift_without_writing() {
        let backend = MockBackend::new();
        backend.insert_endpoint(existing("ep-7", Availability::Public, "http://old"));
        let resource =
            EndpointResource::for_role(&backend, SERVICE, "glance", REGION, "public", Some("http://new"))
                .unwrap()
                .unwrap();

        assert_eq!(
            resource.current_state().unwrap(),
            ResourceState::Modified {
                from: "http://old".into(),
                to: "http://new".into(),
            }
        );
        assert!(backend.mutating_calls().is_empty());
        assert_eq!(resource.id(), "endpoint/public");
    }
}
