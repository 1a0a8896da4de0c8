//! # identity
//!
//! Blocking client for the parts of the OpenStack Keystone v3 API that manage
//! the service catalog: services and their endpoints.
//!
//! The crate is split along the same seam callers test against:
//! - [`Authenticator`] opens an authenticated session from [`AuthOptions`]
//! - [`Backend`] is that session: create/update services, list/create/update
//!   endpoints
//!
//! [`KeystoneAuthenticator`] talks HTTP to a real Keystone;
//! [`MockBackend`] keeps an in-memory catalog and records every call.
//!
//! ## Example
//!
//! ```no_run
//! use identity::{
//!     AuthOptions, Authenticator, Availability, Backend, EndpointQuery, KeystoneAuthenticator,
//! };
//!
//! let session = KeystoneAuthenticator::new()
//!     .authenticate(&AuthOptions {
//!         auth_url: "http://keystone:5000/v3".to_string(),
//!         username: "admin".to_string(),
//!         password: "secret".to_string(),
//!         project: "admin".to_string(),
//!         domain_name: "Default".to_string(),
//!         region: "regionOne".to_string(),
//!     })
//!     .expect("authentication failed");
//!
//! let endpoints = session
//!     .list_endpoints(&EndpointQuery {
//!         service_id: "4f1c...".to_string(),
//!         availability: Availability::Public,
//!         region: "regionOne".to_string(),
//!     })
//!     .expect("listing failed");
//! println!("{} public endpoints", endpoints.len());
//! ```

pub mod backend;
pub mod error;
pub mod types;

pub use backend::keystone::{KeystoneAuthenticator, KeystoneBackend};
pub use backend::{Authenticator, Backend, Call, MockBackend, Operation};
pub use error::{Error, ErrorCategory, Result};
pub use types::{
    AuthOptions, Availability, Endpoint, EndpointOpts, EndpointQuery, Service, ServiceOpts,
};
