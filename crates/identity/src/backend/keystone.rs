//! Keystone v3 HTTP backend.
//!
//! [`KeystoneAuthenticator`] performs password authentication against
//! `POST /v3/auth/tokens`, resolves the identity endpoint from the returned
//! service catalog and hands out a [`KeystoneBackend`] session that carries
//! the token on every request.

use crate::backend::{Authenticator, Backend};
use crate::error::{Error, Result};
use crate::types::{
    AuthOptions, Availability, Endpoint, EndpointOpts, EndpointQuery, Service, ServiceOpts,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::time::Duration;
use ureq::http::Response;
use ureq::typestate::WithBody;
use ureq::{Body, RequestBuilder};

/// Default timeout for a whole request.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Header carrying the issued token in the authentication response.
const SUBJECT_TOKEN_HEADER: &str = "X-Subject-Token";

/// Header carrying the token on authenticated requests.
const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";

/// Upper bound on followed `links.next` pages when listing.
const MAX_PAGES: usize = 100;

/// Opens [`KeystoneBackend`] sessions using password authentication.
///
/// # Example
///
/// ```no_run
/// use identity::backend::Authenticator;
/// use identity::backend::keystone::KeystoneAuthenticator;
/// use identity::AuthOptions;
///
/// let authenticator = KeystoneAuthenticator::new();
/// let session = authenticator
///     .authenticate(&AuthOptions {
///         auth_url: "http://keystone:5000/v3".to_string(),
///         username: "admin".to_string(),
///         password: "secret".to_string(),
///         project: "admin".to_string(),
///         domain_name: "Default".to_string(),
///         region: "regionOne".to_string(),
///     })
///     .unwrap();
/// # let _ = session;
/// ```
pub struct KeystoneAuthenticator {
    agent: ureq::Agent,
}

impl KeystoneAuthenticator {
    /// Create an authenticator with the default request timeout.
    #[must_use]
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    /// Create an authenticator with a custom request timeout.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(timeout))
            .build();
        Self {
            agent: config.into(),
        }
    }
}

impl Default for KeystoneAuthenticator {
    fn default() -> Self {
        Self::new()
    }
}

impl Authenticator for KeystoneAuthenticator {
    fn authenticate(&self, opts: &AuthOptions) -> Result<Box<dyn Backend>> {
        let auth_base = normalize_base(&opts.auth_url);
        let url = format!("{}/auth/tokens", auth_base);

        let response = self
            .agent
            .post(&url)
            .header("Accept", "application/json")
            .send_json(auth_request(opts))?;
        let mut response = check_status(response)?;

        let token = response
            .headers()
            .get(SUBJECT_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or(Error::MissingToken)?;

        let body: TokenResponse = response.body_mut().read_json()?;
        let base = identity_endpoint(&body.token.catalog, &opts.region)
            .map_or(auth_base, |url| normalize_base(&url));

        Ok(Box::new(KeystoneBackend {
            agent: self.agent.clone(),
            base,
            token,
        }))
    }
}

/// An authenticated Keystone session.
pub struct KeystoneBackend {
    agent: ureq::Agent,
    base: String,
    token: String,
}

impl fmt::Debug for KeystoneBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeystoneBackend")
            .field("base", &self.base)
            .field("token", &"<redacted>")
            .finish_non_exhaustive()
    }
}

impl KeystoneBackend {
    /// Identity API base URL this session talks to (always ends in `/v3`).
    #[must_use]
    pub fn base(&self) -> &str {
        &self.base
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base, path)
    }

    fn send<T: Serialize>(
        &self,
        request: RequestBuilder<WithBody>,
        body: T,
    ) -> Result<Response<Body>> {
        let response = request
            .header(AUTH_TOKEN_HEADER, &self.token)
            .header("Accept", "application/json")
            .send_json(body)?;
        check_status(response)
    }

    fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<Response<Body>> {
        let mut request = self
            .agent
            .get(url)
            .header(AUTH_TOKEN_HEADER, &self.token)
            .header("Accept", "application/json");
        for (key, value) in query {
            request = request.query(*key, *value);
        }
        check_status(request.call()?)
    }
}

impl Backend for KeystoneBackend {
    fn create_service(&self, opts: &ServiceOpts) -> Result<Service> {
        let mut response = self.send(self.agent.post(&self.url("services")), service_body(opts))?;
        let body: ServiceEnvelope = response.body_mut().read_json()?;
        Ok(body.service.into())
    }

    fn update_service(&self, id: &str, opts: &ServiceOpts) -> Result<Service> {
        let url = self.url(&format!("services/{}", id));
        let mut response = self.send(self.agent.patch(&url), service_body(opts))?;
        let body: ServiceEnvelope = response.body_mut().read_json()?;
        Ok(body.service.into())
    }

    fn list_endpoints(&self, query: &EndpointQuery) -> Result<Vec<Endpoint>> {
        let first = self.url("endpoints");
        let mut response = self.get(&first, &list_params(query))?;
        let mut page: EndpointPage = response.body_mut().read_json()?;
        let mut endpoints = Vec::new();

        for _ in 0..MAX_PAGES {
            for wire in page.endpoints {
                endpoints.push(wire.into_endpoint()?);
            }
            // The next link already carries the query string.
            match page.links.and_then(|l| l.next) {
                Some(next) if !next.is_empty() => {
                    let mut response = self.get(&next, &[])?;
                    page = response.body_mut().read_json()?;
                }
                _ => return Ok(endpoints),
            }
        }

        Err(Error::InvalidResponse(format!(
            "endpoint listing did not finish after {} pages",
            MAX_PAGES
        )))
    }

    fn create_endpoint(&self, opts: &EndpointOpts) -> Result<Endpoint> {
        let mut response = self.send(self.agent.post(&self.url("endpoints")), endpoint_body(opts))?;
        let body: EndpointEnvelope = response.body_mut().read_json()?;
        body.endpoint.into_endpoint()
    }

    fn update_endpoint(&self, id: &str, opts: &EndpointOpts) -> Result<Endpoint> {
        let url = self.url(&format!("endpoints/{}", id));
        let mut response = self.send(self.agent.patch(&url), endpoint_body(opts))?;
        let body: EndpointEnvelope = response.body_mut().read_json()?;
        body.endpoint.into_endpoint()
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Normalize an identity URL to `<scheme>://<host>[/prefix]/v3`.
fn normalize_base(url: &str) -> String {
    let trimmed = url.trim().trim_end_matches('/');
    if trimmed.ends_with("/v3") {
        trimmed.to_string()
    } else {
        format!("{}/v3", trimmed)
    }
}

/// Turn an error status into an [`Error::Api`], reading Keystone's message.
fn check_status(mut response: Response<Body>) -> Result<Response<Body>> {
    let status = response.status().as_u16();
    if status < 400 {
        return Ok(response);
    }
    let message = response
        .body_mut()
        .read_json::<ErrorEnvelope>()
        .map(|e| e.error.message)
        .unwrap_or_else(|_| format!("HTTP {}", status));
    Err(Error::api(status, message))
}

fn auth_request(opts: &AuthOptions) -> serde_json::Value {
    json!({
        "auth": {
            "identity": {
                "methods": ["password"],
                "password": {
                    "user": {
                        "name": opts.username,
                        "domain": { "name": opts.domain_name },
                        "password": opts.password,
                    }
                }
            },
            "scope": {
                "project": {
                    "name": opts.project,
                    "domain": { "name": opts.domain_name },
                }
            }
        }
    })
}

fn service_body(opts: &ServiceOpts) -> serde_json::Value {
    json!({
        "service": {
            "type": opts.service_type,
            "enabled": opts.enabled,
            "name": opts.name,
            "description": opts.description,
        }
    })
}

/// Query for listing endpoints; an empty region is not sent as a filter.
fn list_params(query: &EndpointQuery) -> Vec<(&'static str, &str)> {
    let mut params = vec![
        ("service_id", query.service_id.as_str()),
        ("interface", query.availability.as_str()),
    ];
    if !query.region.is_empty() {
        params.push(("region_id", query.region.as_str()));
    }
    params
}

/// Body for creating or updating an endpoint; an empty region is omitted.
fn endpoint_body(opts: &EndpointOpts) -> serde_json::Value {
    let mut endpoint = json!({
        "interface": opts.availability.as_str(),
        "name": opts.name,
        "service_id": opts.service_id,
        "url": opts.url,
    });
    if !opts.region.is_empty() {
        endpoint["region_id"] = json!(opts.region);
    }
    json!({ "endpoint": endpoint })
}

/// Pick the public identity endpoint for `region` from a token catalog.
///
/// An empty region matches any endpoint.
fn identity_endpoint(catalog: &[CatalogEntry], region: &str) -> Option<String> {
    catalog
        .iter()
        .filter(|entry| entry.service_type == "identity")
        .flat_map(|entry| entry.endpoints.iter())
        .find(|ep| {
            ep.interface == Availability::Public.as_str()
                && (region.is_empty()
                    || ep.region.as_deref() == Some(region)
                    || ep.region_id.as_deref() == Some(region))
        })
        .map(|ep| ep.url.clone())
}

// =============================================================================
// Keystone API wire types
// =============================================================================

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: Token,
}

#[derive(Debug, Deserialize)]
struct Token {
    #[serde(default)]
    catalog: Vec<CatalogEntry>,
}

#[derive(Debug, Deserialize)]
struct CatalogEntry {
    #[serde(rename = "type")]
    service_type: String,
    #[serde(default)]
    endpoints: Vec<CatalogEndpoint>,
}

#[derive(Debug, Deserialize)]
struct CatalogEndpoint {
    interface: String,
    region: Option<String>,
    region_id: Option<String>,
    url: String,
}

#[derive(Debug, Deserialize)]
struct ServiceEnvelope {
    service: WireService,
}

#[derive(Debug, Deserialize)]
struct WireService {
    id: String,
    #[serde(rename = "type")]
    service_type: String,
    #[serde(default = "default_enabled")]
    enabled: bool,
    name: Option<String>,
    description: Option<String>,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct EndpointEnvelope {
    endpoint: WireEndpoint,
}

#[derive(Debug, Deserialize)]
struct EndpointPage {
    #[serde(default)]
    endpoints: Vec<WireEndpoint>,
    links: Option<PageLinks>,
}

#[derive(Debug, Deserialize)]
struct PageLinks {
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireEndpoint {
    id: String,
    interface: String,
    region: Option<String>,
    region_id: Option<String>,
    service_id: String,
    url: String,
    name: Option<String>,
}

impl From<WireService> for Service {
    fn from(s: WireService) -> Self {
        Self {
            id: s.id,
            service_type: s.service_type,
            enabled: s.enabled,
            name: s.name.unwrap_or_default(),
            description: s.description.unwrap_or_default(),
        }
    }
}

impl WireEndpoint {
    fn into_endpoint(self) -> Result<Endpoint> {
        let availability = self
            .interface
            .parse::<Availability>()
            .map_err(|_| Error::InvalidResponse(format!("unknown interface {}", self.interface)))?;
        Ok(Endpoint {
            id: self.id,
            service_id: self.service_id,
            availability,
            region: self.region_id.or(self.region).unwrap_or_default(),
            name: self.name.unwrap_or_default(),
            url: self.url,
        })
    }
}
