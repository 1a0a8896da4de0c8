//! Stored object schema
//!
//! A `KeystoneService` declares one catalog service plus up to three endpoints;
//! a `KeystoneAPI` carries the bootstrap marker of the Keystone deployment
//! those services register against. Documents use the camelCase field names
//! operators write by hand.

use identity::{AuthOptions, Availability};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Stable identity of a stored object: `namespace/name`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

impl FromStr for ObjectKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((namespace, name))
                if !namespace.is_empty() && !name.is_empty() && !name.contains('/') =>
            {
                Ok(Self::new(namespace, name))
            }
            _ => Err(format!("expected <namespace>/<name>, got '{s}'")),
        }
    }
}

/// Metadata shared by every stored object
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    /// Bumped by the store on every write; status updates must present the
    /// version they read
    #[serde(default)]
    pub resource_version: u64,
}

impl ObjectMeta {
    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(&self.namespace, &self.name)
    }
}

/// Desired state of a catalog service registration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeystoneServiceSpec {
    pub service_type: String,
    pub service_name: String,
    #[serde(default)]
    pub service_description: String,
    #[serde(default)]
    pub enabled: bool,
    pub region: String,

    #[serde(default, rename = "adminURL", skip_serializing_if = "Option::is_none")]
    pub admin_url: Option<String>,
    #[serde(default, rename = "internalURL", skip_serializing_if = "Option::is_none")]
    pub internal_url: Option<String>,
    #[serde(default, rename = "publicURL", skip_serializing_if = "Option::is_none")]
    pub public_url: Option<String>,

    /// Keystone connection parameters
    #[serde(rename = "authURL")]
    pub auth_url: String,
    pub username: String,
    pub password: String,
    pub project: String,
    pub domain_name: String,
}

impl KeystoneServiceSpec {
    /// Connection parameters for this spec, read fresh on every call
    pub fn auth_options(&self) -> AuthOptions {
        AuthOptions {
            auth_url: self.auth_url.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            project: self.project.clone(),
            domain_name: self.domain_name.clone(),
            region: self.region.clone(),
        }
    }

    /// Declared URL for a role; empty strings count as undeclared
    pub fn url_for(&self, availability: Availability) -> Option<&str> {
        let url = match availability {
            Availability::Admin => self.admin_url.as_deref(),
            Availability::Internal => self.internal_url.as_deref(),
            Availability::Public => self.public_url.as_deref(),
        };
        url.filter(|u| !u.is_empty())
    }

    /// Declared endpoint URLs in reconciliation order: admin, internal, public
    pub fn endpoints(&self) -> [(Availability, Option<&str>); 3] {
        Availability::ALL.map(|a| (a, self.url_for(a)))
    }
}

/// Observed state written back by the reconciler
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeystoneServiceStatus {
    #[serde(default, rename = "serviceID", skip_serializing_if = "Option::is_none")]
    pub service_id: Option<String>,
}

impl KeystoneServiceStatus {
    /// Recorded service ID; an empty string means the service was never created
    pub fn service_id(&self) -> Option<&str> {
        self.service_id.as_deref().filter(|id| !id.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeystoneService {
    pub metadata: ObjectMeta,
    pub spec: KeystoneServiceSpec,
    #[serde(default)]
    pub status: KeystoneServiceStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeystoneApiStatus {
    /// Set once Keystone bootstrap has completed
    #[serde(default)]
    pub bootstrap_hash: String,
}

/// The Keystone deployment services register against (read-only here)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeystoneApi {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub status: KeystoneApiStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOCUMENT: &str = r#"{
        "metadata": {"name": "glance", "namespace": "openstack", "resourceVersion": 4},
        "spec": {
            "serviceType": "image",
            "serviceName": "glance",
            "serviceDescription": "Glance Image Service",
            "enabled": true,
            "region": "regionOne",
            "adminURL": "http://glance-admin:9292",
            "internalURL": "",
            "publicURL": "http://glance.example:9292",
            "authURL": "http://keystone:5000/v3",
            "username": "admin",
            "password": "secret",
            "project": "admin",
            "domainName": "Default"
        },
        "status": {"serviceID": "abc123"}
    }"#;

    #[test]
    fn test_parse_service_document() {
        let service: KeystoneService = serde_json::from_str(DOCUMENT).unwrap();

        assert_eq!(service.metadata.key(), ObjectKey::new("openstack", "glance"));
        assert_eq!(service.metadata.resource_version, 4);
        assert_eq!(service.spec.service_type, "image");
        assert_eq!(service.spec.auth_url, "http://keystone:5000/v3");
        assert_eq!(service.status.service_id(), Some("abc123"));
    }

    #[test]
    fn test_endpoints_in_role_order_with_empty_urls_unmanaged() {
        let service: KeystoneService = serde_json::from_str(DOCUMENT).unwrap();
        let endpoints = service.spec.endpoints();

        assert_eq!(
            endpoints,
            [
                (Availability::Admin, Some("http://glance-admin:9292")),
                (Availability::Internal, None),
                (Availability::Public, Some("http://glance.example:9292")),
            ]
        );
    }

    #[test]
    fn test_empty_service_id_is_absent() {
        let status = KeystoneServiceStatus {
            service_id: Some(String::new()),
        };
        assert_eq!(status.service_id(), None);
        assert_eq!(KeystoneServiceStatus::default().service_id(), None);
    }

    #[test]
    fn test_missing_status_defaults() {
        let doc = r#"{
            "metadata": {"name": "keystone", "namespace": "openstack"}
        }"#;
        let api: KeystoneApi = serde_json::from_str(doc).unwrap();
        assert!(api.status.bootstrap_hash.is_empty());
        assert_eq!(api.metadata.resource_version, 0);
    }

    #[test]
    fn test_auth_options_carry_region() {
        let service: KeystoneService = serde_json::from_str(DOCUMENT).unwrap();
        let opts = service.spec.auth_options();
        assert_eq!(opts.domain_name, "Default");
        assert_eq!(opts.region, "regionOne");
        assert_eq!(opts.password, "secret");
    }

    #[test]
    fn test_object_key_parse() {
        let key: ObjectKey = "openstack/glance".parse().unwrap();
        assert_eq!(key.to_string(), "openstack/glance");
        assert!("glance".parse::<ObjectKey>().is_err());
        assert!("/glance".parse::<ObjectKey>().is_err());
        assert!("a/b/c".parse::<ObjectKey>().is_err());
    }
}
