//! Core types for the Keystone service catalog.
//!
//! These are the domain-level shapes exchanged with a [`Backend`](crate::Backend):
//! services, endpoints, the options used to create or overwrite them, and the
//! credentials used to open a session.

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Network-reachability classification of an endpoint.
///
/// Keystone calls this the endpoint "interface". Every service may expose at
/// most one endpoint per availability and region.
///
/// # Example
///
/// ```
/// use identity::Availability;
///
/// let availability: Availability = "internal".parse().unwrap();
/// assert_eq!(availability, Availability::Internal);
/// assert_eq!(availability.as_str(), "internal");
/// assert!("private".parse::<Availability>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Availability {
    /// Administrative endpoint, usually reachable only by operators.
    Admin,
    /// Endpoint on the internal (service-to-service) network.
    Internal,
    /// Endpoint reachable by end users.
    Public,
}

impl Availability {
    /// All availabilities, in reconciliation order.
    pub const ALL: [Availability; 3] = [Self::Admin, Self::Internal, Self::Public];

    /// Wire name of this availability.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Internal => "internal",
            Self::Public => "public",
        }
    }
}

impl fmt::Display for Availability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Availability {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "internal" => Ok(Self::Internal),
            "public" => Ok(Self::Public),
            other => Err(Error::UnknownAvailability(other.to_string())),
        }
    }
}

/// Credentials and scope used to open an authenticated session.
///
/// The user and the project are both resolved inside `domain_name`.
/// `region` selects which identity endpoint of the service catalog the
/// session talks to.
#[derive(Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AuthOptions {
    /// Keystone URL used for authentication (e.g. `http://keystone:5000/v3`).
    pub auth_url: String,
    /// User name.
    pub username: String,
    /// User password.
    pub password: String,
    /// Project (tenant) name the token is scoped to.
    pub project: String,
    /// Domain of both the user and the project.
    pub domain_name: String,
    /// Region used to pick the identity endpoint from the catalog.
    pub region: String,
}

impl fmt::Debug for AuthOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthOptions")
            .field("auth_url", &self.auth_url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("project", &self.project)
            .field("domain_name", &self.domain_name)
            .field("region", &self.region)
            .finish()
    }
}

/// A service registered in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    /// Identifier assigned by Keystone.
    pub id: String,
    /// Service type (e.g. `compute`, `image`).
    pub service_type: String,
    /// Whether the service is enabled.
    pub enabled: bool,
    /// Service name.
    pub name: String,
    /// Free-form description.
    pub description: String,
}

/// Fields written when creating or overwriting a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceOpts {
    /// Service type.
    pub service_type: String,
    /// Whether the service is enabled.
    pub enabled: bool,
    /// Service name.
    pub name: String,
    /// Free-form description.
    pub description: String,
}

/// An endpoint registered in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    /// Identifier assigned by Keystone.
    pub id: String,
    /// Service this endpoint belongs to.
    pub service_id: String,
    /// Interface of the endpoint.
    pub availability: Availability,
    /// Region the endpoint lives in.
    pub region: String,
    /// Endpoint name.
    pub name: String,
    /// Endpoint URL.
    pub url: String,
}

/// Fields written when creating or overwriting an endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointOpts {
    /// Interface of the endpoint.
    pub availability: Availability,
    /// Endpoint name.
    pub name: String,
    /// Region the endpoint lives in.
    pub region: String,
    /// Service this endpoint belongs to.
    pub service_id: String,
    /// Endpoint URL.
    pub url: String,
}

/// Filter for listing endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointQuery {
    /// Only endpoints of this service.
    pub service_id: String,
    /// Only endpoints with this interface.
    pub availability: Availability,
    /// Only endpoints in this region; empty means any region.
    pub region: String,
}

impl EndpointQuery {
    /// Check whether an endpoint satisfies this filter.
    #[must_use]
    pub fn matches(&self, endpoint: &Endpoint) -> bool {
        endpoint.service_id == self.service_id
            && endpoint.availability == self.availability
            && (self.region.is_empty() || endpoint.region == self.region)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_availability_order() {
        assert_eq!(
            Availability::ALL,
            [
                Availability::Admin,
                Availability::Internal,
                Availability::Public
            ]
        );
    }

    #[test]
    fn test_availability_parse_roundtrip() {
        for availability in Availability::ALL {
            let parsed: Availability = availability.as_str().parse().unwrap();
            assert_eq!(parsed, availability);
        }
    }

    #[test]
    fn test_availability_parse_unknown() {
        let err = "Admin".parse::<Availability>().unwrap_err();
        assert!(matches!(err, Error::UnknownAvailability(ref s) if s == "Admin"));
    }

    #[test]
    fn test_availability_serde_lowercase() {
        let json = serde_json::to_string(&Availability::Public).unwrap();
        assert_eq!(json, "\"public\"");
    }

    #[test]
    fn test_auth_options_debug_redacts_password() {
        let opts = AuthOptions {
            auth_url: "http://keystone:5000/v3".to_string(),
            username: "admin".to_string(),
            password: "hunter2".to_string(),
            project: "admin".to_string(),
            domain_name: "Default".to_string(),
            region: "regionOne".to_string(),
        };
        let debug = format!("{:?}", opts);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<redacted>"));
        assert!(debug.contains("regionOne"));
    }

    #[test]
    fn test_endpoint_query_matches() {
        let query = EndpointQuery {
            service_id: "svc".to_string(),
            availability: Availability::Admin,
            region: "regionOne".to_string(),
        };
        let mut endpoint = Endpoint {
            id: "ep".to_string(),
            service_id: "svc".to_string(),
            availability: Availability::Admin,
            region: "regionOne".to_string(),
            name: "nova".to_string(),
            url: "http://nova:8774".to_string(),
        };
        assert!(query.matches(&endpoint));

        endpoint.availability = Availability::Public;
        assert!(!query.matches(&endpoint));

        endpoint.availability = Availability::Admin;
        endpoint.region = "regionTwo".to_string();
        assert!(!query.matches(&endpoint));
    }

    #[test]
    fn test_endpoint_query_without_region_matches_any_region() {
        let query = EndpointQuery {
            service_id: "svc".to_string(),
            availability: Availability::Public,
            region: String::new(),
        };
        let endpoint = Endpoint {
            id: "ep".to_string(),
            service_id: "svc".to_string(),
            availability: Availability::Public,
            region: "regionTwo".to_string(),
            name: "nova".to_string(),
            url: "http://nova:8774".to_string(),
        };
        assert!(query.matches(&endpoint));
    }
}
