use std::sync::Arc;

use {
    dashmap::DashMap,
    tracing::{debug, info},
};

use crate::{Result, backend::StorageBackend, model::ClientIdentity};

/// Deterministic destination folder name for a client:
/// `"{client_id} - {name}"` with apostrophes removed.
pub fn composed_folder_name(client: &ClientIdentity) -> String {
    format!("{} - {}", client.client_id, client.name)
        .replace('\'', "")
        .trim()
        .to_string()
}

/// Find-or-create lookup of a client's destination folder.
///
/// Lookup and creation are two separate backend calls; the backend has no
/// uniqueness constraint on folder names. Calls for the same composed name
/// are serialised within this process, so the immediate single-file path and
/// the flush task cannot both create the folder. Two processes sharing a
/// parent folder can still race and end up with duplicates.
pub struct FolderResolver {
    storage: Arc<dyn StorageBackend>,
    in_flight: DashMap<String, Arc<tokio::sync::Mutex<()>>>,
}

impl FolderResolver {
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self {
            storage,
            in_flight: DashMap::new(),
        }
    }

    /// Return the identifier of the client's folder under `parent_id`,
    /// creating it when missing. Backend failures propagate unchanged; there
    /// is no retry here.
    pub async fn resolve(&self, parent_id: &str, client: &ClientIdentity) -> Result<String> {
        let name = composed_folder_name(client);
        let key = format!("{parent_id}/{name}");
        let lock = Arc::clone(self.in_flight.entry(key.clone()).or_default().value());
        let result = {
            let _guard = lock.lock().await;
            self.lookup_or_create(parent_id, &name).await
        };
        drop(lock);
        // Only the map still holds the lock once no other caller is waiting.
        self.in_flight
            .remove_if(&key, |_, held| Arc::strong_count(held) == 1);
        result
    }

    /// The unserialised two-step operation: list, then create if nothing
    /// matched. When several folders match, the first one in backend order
    /// wins.
    pub async fn lookup_or_create(&self, parent_id: &str, name: &str) -> Result<String> {
        let existing = self.storage.find_folders(parent_id, name).await?;
        if let Some(first) = existing.into_iter().next() {
            debug!(parent_id, folder = name, folder_id = %first.id, "destination folder exists");
            return Ok(first.id);
        }

        let folder_id = self.storage.create_folder(parent_id, name).await?;
        info!(parent_id, folder = name, folder_id, "created destination folder");
        Ok(folder_id)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {
        super::*,
        crate::{
            backend::FolderEntry,
            testing::{MemoryStorage, count},
        },
    };

    fn client(id: &str, name: &str) -> ClientIdentity {
        ClientIdentity {
            client_id: id.into(),
            name: name.into(),
        }
    }

    #[test]
    fn composed_name_strips_apostrophes() {
        assert_eq!(
            composed_folder_name(&client("ID001", "John Smith")),
            "ID001 - John Smith"
        );
        assert_eq!(
            composed_folder_name(&client("ID007", "Sinéad O'Connor'")),
            "ID007 - Sinéad OConnor"
        );
    }

    #[tokio::test]
    async fn creates_missing_folder() {
        let storage = Arc::new(MemoryStorage::default());
        let resolver = FolderResolver::new(storage.clone());

        let id = resolver
            .resolve("root", &client("ID001", "John Smith"))
            .await
            .unwrap();

        assert_eq!(id, "folder-1");
        assert_eq!(storage.folders_named("root", "ID001 - John Smith"), 1);
    }

    #[tokio::test]
    async fn sequential_resolves_are_idempotent() {
        let storage = Arc::new(MemoryStorage::default());
        let resolver = FolderResolver::new(storage.clone());
        let who = client("ID001", "John Smith");

        let first = resolver.resolve("root", &who).await.unwrap();
        let second = resolver.resolve("root", &who).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(count(&storage.creates), 1);
        assert_eq!(count(&storage.lookups), 2);
    }

    #[tokio::test]
    async fn first_match_wins_when_duplicates_exist() {
        let storage = Arc::new(MemoryStorage::default());
        {
            let mut folders = storage.folders.lock().unwrap();
            for id in ["dup-a", "dup-b"] {
                folders.push(("root".into(), FolderEntry {
                    id: id.into(),
                    name: "ID002 - Jane Doe".into(),
                }));
            }
        }
        let resolver = FolderResolver::new(storage.clone());

        let id = resolver
            .resolve("root", &client("ID002", "Jane Doe"))
            .await
            .unwrap();

        assert_eq!(id, "dup-a");
        assert_eq!(count(&storage.creates), 0);
    }

    #[tokio::test]
    async fn same_name_under_other_parent_is_separate() {
        let storage = Arc::new(MemoryStorage::default());
        let resolver = FolderResolver::new(storage.clone());
        let who = client("ID001", "John Smith");

        let a = resolver.resolve("parent-a", &who).await.unwrap();
        let b = resolver.resolve("parent-b", &who).await.unwrap();

        assert_ne!(a, b);
        assert_eq!(count(&storage.creates), 2);
    }

    #[tokio::test]
    async fn concurrent_resolves_in_one_process_share_a_folder() {
        let storage = Arc::new(MemoryStorage::default());
        let resolver = FolderResolver::new(storage.clone());
        let who = client("ID003", "Ann Lee");

        let (a, b) = tokio::join!(
            resolver.resolve("root", &who),
            resolver.resolve("root", &who)
        );

        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(storage.folders_named("root", "ID003 - Ann Lee"), 1);
        assert!(resolver.in_flight.is_empty());
    }

    #[tokio::test]
    async fn name_locks_are_released_after_resolve() {
        let storage = Arc::new(MemoryStorage::default());
        let resolver = FolderResolver::new(storage.clone());

        for n in 0..20 {
            resolver
                .resolve("root", &client(&format!("ID{n:03}"), "Client"))
                .await
                .unwrap();
        }
        assert!(resolver.in_flight.is_empty());

        let failing = FolderResolver::new(Arc::new(MemoryStorage {
            fail_lookups: true,
            ..Default::default()
        }));
        failing
            .resolve("root", &client("ID001", "John Smith"))
            .await
            .unwrap_err();
        assert!(failing.in_flight.is_empty());
    }

    /// The bare lookup-then-create is not atomic: two interleaved calls can
    /// both miss and both create. This is the accepted cross-process race.
    #[tokio::test]
    async fn unserialised_lookup_or_create_may_duplicate() {
        let storage = Arc::new(MemoryStorage::default());
        let resolver = FolderResolver::new(storage.clone());

        let (a, b) = tokio::join!(
            resolver.lookup_or_create("root", "ID004 - Race"),
            resolver.lookup_or_create("root", "ID004 - Race")
        );
        a.unwrap();
        b.unwrap();

        let created = storage.folders_named("root", "ID004 - Race");
        assert!((1..=2).contains(&created), "created {created} folders");
    }

    #[tokio::test]
    async fn lookup_failure_propagates_as_uplink_error() {
        let storage = Arc::new(MemoryStorage {
            fail_lookups: true,
            ..Default::default()
        });
        let resolver = FolderResolver::new(storage.clone());

        let err = resolver
            .resolve("root", &client("ID001", "John Smith"))
            .await
            .unwrap_err();

        assert!(err.is_uplink());
        assert_eq!(count(&storage.creates), 0);
    }
}
