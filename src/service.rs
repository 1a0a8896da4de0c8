//! Service upsert
//!
//! The service is tracked by the ID recorded in status rather than looked up
//! by name: no recorded ID means create, otherwise the declared fields
//! overwrite whatever Keystone holds.

use crate::api::KeystoneServiceSpec;
use identity::{Backend, ServiceOpts};

/// Fields written to Keystone for a declared service
pub fn service_opts(spec: &KeystoneServiceSpec) -> ServiceOpts {
    ServiceOpts {
        service_type: spec.service_type.clone(),
        enabled: spec.enabled,
        name: spec.service_name.clone(),
        description: spec.service_description.clone(),
    }
}

/// Create or overwrite the service and return its ID
///
/// Errors are returned as-is; the caller decides about retries.
pub fn upsert_service(
    backend: &dyn Backend,
    spec: &KeystoneServiceSpec,
    observed_id: Option<&str>,
) -> identity::Result<String> {
    let opts = service_opts(spec);
    match observed_id {
        None => {
            let service = backend.create_service(&opts)?;
            log::info!("Created service {} ({})", service.name, service.id);
            Ok(service.id)
        }
        Some(id) => {
            backend.update_service(id, &opts)?;
            log::debug!("Updated service {} ({})", opts.name, id);
            Ok(id.to_string())
        }
    }
}
