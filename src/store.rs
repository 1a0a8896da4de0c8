//! Object store for declared services and their status
//!
//! Two implementations share the [`ObjectStore`] contract:
//! - [`MemoryStore`] for tests and embedding
//! - [`FileStore`] keeping one JSON document per object on disk
//!
//! Status writes are optimistic: the caller presents the `resourceVersion` it
//! read and the write fails with [`StoreError::Conflict`] if the object moved on.

use crate::api::{KeystoneApi, KeystoneService, KeystoneServiceStatus, ObjectKey};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

const KEYSTONE_APIS: &str = "keystoneapis";
const KEYSTONE_SERVICES: &str = "keystoneservices";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{kind} {key} not found")]
    NotFound { kind: &'static str, key: ObjectKey },

    #[error("{key} was modified concurrently (read version {expected}, stored version {actual})")]
    Conflict {
        key: ObjectKey,
        expected: u64,
        actual: u64,
    },

    #[error("failed to access {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid document {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Read access to declared objects plus the one write the reconciler owns
pub trait ObjectStore: Send + Sync {
    /// Fetch a `KeystoneAPI` object
    fn get_keystone_api(&self, key: &ObjectKey) -> Result<KeystoneApi>;

    /// Fetch a `KeystoneService` object
    fn get_service(&self, key: &ObjectKey) -> Result<KeystoneService>;

    /// Replace the status of a service if it is still at `resource_version`
    ///
    /// Returns the stored object with its new version.
    fn update_service_status(
        &self,
        key: &ObjectKey,
        resource_version: u64,
        status: &KeystoneServiceStatus,
    ) -> Result<KeystoneService>;

    /// All services, optionally restricted to one namespace, ordered by key
    fn list_services(&self, namespace: Option<&str>) -> Result<Vec<KeystoneService>>;
}

// ============================================================================
// In-memory store
// ============================================================================

#[derive(Debug, Default)]
struct MemoryState {
    apis: BTreeMap<ObjectKey, KeystoneApi>,
    services: BTreeMap<ObjectKey, KeystoneService>,
    status_updates: usize,
    fail_status_update: Option<StoreError>,
}

/// Shared in-memory store; clones see the same objects
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert or replace a `KeystoneAPI`, bumping its version
    pub fn put_keystone_api(&self, mut api: KeystoneApi) {
        let mut state = self.lock();
        let key = api.metadata.key();
        api.metadata.resource_version = state
            .apis
            .get(&key)
            .map_or(1, |old| old.metadata.resource_version + 1);
        state.apis.insert(key, api);
    }

    /// Insert or replace a service, bumping its version
    pub fn put_service(&self, mut service: KeystoneService) {
        let mut state = self.lock();
        let key = service.metadata.key();
        service.metadata.resource_version = state
            .services
            .get(&key)
            .map_or(1, |old| old.metadata.resource_version + 1);
        state.services.insert(key, service);
    }

    pub fn remove_service(&self, key: &ObjectKey) -> Option<KeystoneService> {
        self.lock().services.remove(key)
    }

    /// Make the next status update fail with `error`
    pub fn fail_next_status_update(&self, error: StoreError) {
        self.lock().fail_status_update = Some(error);
    }

    /// Number of successful status writes
    pub fn status_updates(&self) -> usize {
        self.lock().status_updates
    }
}

impl ObjectStore for MemoryStore {
    fn get_keystone_api(&self, key: &ObjectKey) -> Result<KeystoneApi> {
        self.lock()
            .apis
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                kind: "KeystoneAPI",
                key: key.clone(),
            })
    }

    fn get_service(&self, key: &ObjectKey) -> Result<KeystoneService> {
        self.lock()
            .services
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                kind: "KeystoneService",
                key: key.clone(),
            })
    }

    fn update_service_status(
        &self,
        key: &ObjectKey,
        resource_version: u64,
        status: &KeystoneServiceStatus,
    ) -> Result<KeystoneService> {
        let mut state = self.lock();
        if let Some(err) = state.fail_status_update.take() {
            return Err(err);
        }

        let service = state
            .services
            .get_mut(key)
            .ok_or_else(|| StoreError::NotFound {
                kind: "KeystoneService",
                key: key.clone(),
            })?;
        if service.metadata.resource_version != resource_version {
            return Err(StoreError::Conflict {
                key: key.clone(),
                expected: resource_version,
                actual: service.metadata.resource_version,
            });
        }

        service.status = status.clone();
        service.metadata.resource_version += 1;
        let updated = service.clone();
        state.status_updates += 1;
        Ok(updated)
    }

    fn list_services(&self, namespace: Option<&str>) -> Result<Vec<KeystoneService>> {
        Ok(self
            .lock()
            .services
            .values()
            .filter(|s| namespace.is_none_or(|ns| s.metadata.namespace == ns))
            .cloned()
            .collect())
    }
}

// ============================================================================
// File store
// ============================================================================

/// JSON documents under a root directory:
///
/// ```text
/// <root>/<namespace>/keystoneapis/<name>.json
/// <root>/<namespace>/keystoneservices/<name>.json
/// ```
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, kind_dir: &str, key: &ObjectKey) -> PathBuf {
        self.root
            .join(&key.namespace)
            .join(kind_dir)
            .join(format!("{}.json", key.name))
    }

    /// Write a service document, creating directories as needed
    pub fn put_service(&self, service: &KeystoneService) -> Result<()> {
        let path = self.path(KEYSTONE_SERVICES, &service.metadata.key());
        write_atomic(&path, service)
    }

    /// Write a `KeystoneAPI` document, creating directories as needed
    pub fn put_keystone_api(&self, api: &KeystoneApi) -> Result<()> {
        let path = self.path(KEYSTONE_APIS, &api.metadata.key());
        write_atomic(&path, api)
    }

    fn read_service(&self, key: &ObjectKey) -> Result<(PathBuf, KeystoneService)> {
        let path = self.path(KEYSTONE_SERVICES, key);
        let mut service: KeystoneService = read_document(&path, "KeystoneService", key)?;
        service.metadata.namespace.clone_from(&key.namespace);
        service.metadata.name.clone_from(&key.name);
        Ok((path, service))
    }
}

impl ObjectStore for FileStore {
    fn get_keystone_api(&self, key: &ObjectKey) -> Result<KeystoneApi> {
        let path = self.path(KEYSTONE_APIS, key);
        let mut api: KeystoneApi = read_document(&path, "KeystoneAPI", key)?;
        api.metadata.namespace.clone_from(&key.namespace);
        api.metadata.name.clone_from(&key.name);
        Ok(api)
    }

    fn get_service(&self, key: &ObjectKey) -> Result<KeystoneService> {
        self.read_service(key).map(|(_, service)| service)
    }

    fn update_service_status(
        &self,
        key: &ObjectKey,
        resource_version: u64,
        status: &KeystoneServiceStatus,
    ) -> Result<KeystoneService> {
        let (path, mut service) = self.read_service(key)?;
        if service.metadata.resource_version != resource_version {
            return Err(StoreError::Conflict {
                key: key.clone(),
                expected: resource_version,
                actual: service.metadata.resource_version,
            });
        }

        service.status = status.clone();
        service.metadata.resource_version += 1;
        write_atomic(&path, &service)?;
        log::debug!(
            "Stored status of {} at version {}",
            key,
            service.metadata.resource_version
        );
        Ok(service)
    }

    fn list_services(&self, namespace: Option<&str>) -> Result<Vec<KeystoneService>> {
        let namespaces = match namespace {
            Some(ns) => vec![ns.to_string()],
            None => list_dir(&self.root, |p| p.is_dir())?,
        };

        let mut services = Vec::new();
        for ns in namespaces {
            let dir = self.root.join(&ns).join(KEYSTONE_SERVICES);
            let names = list_dir(&dir, |p| {
                p.is_file() && p.extension().is_some_and(|ext| ext == "json")
            })?;
            for file in names {
                let Some(name) = file.strip_suffix(".json") else {
                    continue;
                };
                let key = ObjectKey::new(&ns, name);
                match self.get_service(&key) {
                    Ok(service) => services.push(service),
                    // Removed between listing and reading
                    Err(StoreError::NotFound { .. }) => {}
                    Err(e) => return Err(e),
                }
            }
        }

        services.sort_by(|a, b| a.metadata.key().cmp(&b.metadata.key()));
        Ok(services)
    }
}

/// Names of directory entries accepted by `keep`; a missing directory is empty
fn list_dir(dir: &Path, keep: impl Fn(&Path) -> bool) -> Result<Vec<String>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(StoreError::Io {
                path: dir.to_path_buf(),
                source,
            });
        }
    };

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| StoreError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if !keep(&path) {
            continue;
        }
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            // Skip in-flight temp files
            if !name.starts_with('.') {
                names.push(name.to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}

fn read_document<T: serde::de::DeserializeOwned>(
    path: &Path,
    kind: &'static str,
    key: &ObjectKey,
) -> Result<T> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(StoreError::NotFound {
                kind,
                key: key.clone(),
            });
        }
        Err(source) => {
            return Err(StoreError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    serde_json::from_str(&content).map_err(|source| StoreError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Write to a sibling temp file and rename over the target
fn write_atomic<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let io_err = |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_err)?;
    }

    let content = serde_json::to_string_pretty(value).map_err(|source| StoreError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("object.json");
    let tmp = path.with_file_name(format!(".{file_name}.tmp"));
    fs::write(&tmp, content + "\n").map_err(io_err)?;
    fs::rename(&tmp, path).map_err(io_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{KeystoneApiStatus, KeystoneServiceSpec, ObjectMeta};
    use tempfile::TempDir;

    fn service(namespace: &str, name: &str) -> KeystoneService {
        KeystoneService {
            metadata: ObjectMeta {
                name: name.to_string(),
                namespace: namespace.to_string(),
                resource_version: 0,
            },
            spec: KeystoneServiceSpec {
                service_type: "image".into(),
                service_name: name.into(),
                region: "regionOne".into(),
                ..Default::default()
            },
            status: KeystoneServiceStatus::default(),
        }
    }

    fn status(id: &str) -> KeystoneServiceStatus {
        KeystoneServiceStatus {
            service_id: Some(id.to_string()),
        }
    }

    #[test]
    fn test_memory_store_not_found() {
        let store = MemoryStore::new();
        let key = ObjectKey::new("openstack", "glance");

        assert!(store.get_service(&key).unwrap_err().is_not_found());
        assert!(store.get_keystone_api(&key).unwrap_err().is_not_found());
    }

    #[test]
    fn test_memory_store_status_update_bumps_version() {
        let store = MemoryStore::new();
        store.put_service(service("openstack", "glance"));
        let key = ObjectKey::new("openstack", "glance");

        let read = store.get_service(&key).unwrap();
        assert_eq!(read.metadata.resource_version, 1);

        let updated = store
            .update_service_status(&key, 1, &status("svc-1"))
            .unwrap();
        assert_eq!(updated.metadata.resource_version, 2);
        assert_eq!(updated.status.service_id(), Some("svc-1"));
        assert_eq!(store.status_updates(), 1);
    }

    #[test]
    fn test_memory_store_stale_update_conflicts() {
        let store = MemoryStore::new();
        store.put_service(service("openstack", "glance"));
        let key = ObjectKey::new("openstack", "glance");

        // Someone else writes in between
        store.put_service(service("openstack", "glance"));

        let err = store
            .update_service_status(&key, 1, &status("svc-1"))
            .unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(store.get_service(&key).unwrap().status.service_id(), None);
    }

    #[test]
    fn test_memory_store_list_filters_namespace() {
        let store = MemoryStore::new();
        store.put_service(service("a", "nova"));
        store.put_service(service("b", "glance"));
        store.put_service(service("a", "cinder"));

        let all: Vec<_> = store
            .list_services(None)
            .unwrap()
            .iter()
            .map(|s| s.metadata.key().to_string())
            .collect();
        assert_eq!(all, vec!["a/cinder", "a/nova", "b/glance"]);

        assert_eq!(store.list_services(Some("b")).unwrap().len(), 1);
    }

    #[test]
    fn test_memory_store_injected_failure_is_one_shot() {
        let store = MemoryStore::new();
        store.put_service(service("openstack", "glance"));
        let key = ObjectKey::new("openstack", "glance");
        store.fail_next_status_update(StoreError::Conflict {
            key: key.clone(),
            expected: 1,
            actual: 2,
        });

        assert!(store.update_service_status(&key, 1, &status("x")).is_err());
        assert!(store.update_service_status(&key, 1, &status("x")).is_ok());
    }

    #[test]
    fn test_file_store_round_trip_and_conflict() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());
        let mut svc = service("openstack", "glance");
        svc.metadata.resource_version = 3;
        store.put_service(&svc).unwrap();
        let key = ObjectKey::new("openstack", "glance");

        let updated = store
            .update_service_status(&key, 3, &status("svc-1"))
            .unwrap();
        assert_eq!(updated.metadata.resource_version, 4);

        let reread = store.get_service(&key).unwrap();
        assert_eq!(reread.status.service_id(), Some("svc-1"));
        assert_eq!(reread.metadata.resource_version, 4);

        let err = store
            .update_service_status(&key, 3, &status("svc-2"))
            .unwrap_err();
        assert!(err.is_conflict());

        assert!(!dir
            .path()
            .join("openstack/keystoneservices/.glance.json.tmp")
            .exists());
    }

    #[test]
    fn test_file_store_fills_metadata_from_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("openstack").join(KEYSTONE_APIS);
        fs::create_dir_all(&path).unwrap();
        fs::write(
            path.join("keystone.json"),
            r#"{"metadata": {}, "status": {"bootstrapHash": "h1"}}"#,
        )
        .unwrap();

        let store = FileStore::new(dir.path());
        let api = store
            .get_keystone_api(&ObjectKey::new("openstack", "keystone"))
            .unwrap();
        assert_eq!(api.metadata.name, "keystone");
        assert_eq!(api.metadata.namespace, "openstack");
        assert_eq!(
            api.status,
            KeystoneApiStatus {
                bootstrap_hash: "h1".into()
            }
        );
    }

    #[test]
    fn test_file_store_list_and_parse_errors() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());
        assert!(store.list_services(None).unwrap().is_empty());

        store.put_service(&service("b", "glance")).unwrap();
        store.put_service(&service("a", "nova")).unwrap();
        let keys: Vec<_> = store
            .list_services(None)
            .unwrap()
            .iter()
            .map(|s| s.metadata.key().to_string())
            .collect();
        assert_eq!(keys, vec!["a/nova", "b/glance"]);

        fs::write(dir.path().join("a/keystoneservices/broken.json"), "{").unwrap();
        let err = store
            .get_service(&ObjectKey::new("a", "broken"))
            .unwrap_err();
        assert!(matches!(err, StoreError::Parse { .. }));
    }
}
