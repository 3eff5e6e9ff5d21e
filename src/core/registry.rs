//! Registry of currently known downstream services, keyed by address.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use arc_swap::ArcSwap;
use log::info;

use super::service::Service;

/// Immutable point-in-time view of the registry.
pub type RegistrySnapshot = Arc<HashMap<String, Arc<Service>>>;

/// Copy-on-write service registry.
///
/// Every mutation swaps in a whole new map, so a [`RegistrySnapshot`] is
/// always a consistent view and iteration never observes a concurrent
/// deregistration. The generation counter advances after every mutation;
/// dependency resolutions memoized under an older generation are stale.
pub struct ServiceRegistry {
    services: ArcSwap<HashMap<String, Arc<Service>>>,
    generation: AtomicU64,
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self {
            services: ArcSwap::from_pointee(HashMap::new()),
            generation: AtomicU64::new(0),
        }
    }

    /// Insert or replace a service; the latest registration for an address wins.
    pub fn register(&self, service: Service) -> Arc<Service> {
        let service = Arc::new(service);
        let previous = self.services.rcu(|current| {
            let mut next = HashMap::clone(current);
            next.insert(service.address().to_string(), service.clone());
            next
        });
        self.generation.fetch_add(1, Ordering::SeqCst);

        if previous.contains_key(service.address()) {
            info!("Replaced service {} ({})", service.address(), service.name);
        } else {
            info!("Registered service {} ({})", service.address(), service.name);
        }
        service
    }

    /// Remove a service by address. Returns whether an entry was removed.
    pub fn deregister(&self, address: &str) -> bool {
        let previous = self.services.rcu(|current| {
            let mut next = HashMap::clone(current);
            next.remove(address);
            next
        });

        let removed = previous.contains_key(address);
        if removed {
            self.generation.fetch_add(1, Ordering::SeqCst);
            info!("Deregistered service {address}");
        }
        removed
    }

    /// Read before taking the snapshot a resolution runs against, so a
    /// mutation racing with it always leaves the memo behind.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn get(&self, address: &str) -> Option<Arc<Service>> {
        self.services.load().get(address).cloned()
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        self.services.load_full()
    }

    pub fn len(&self) -> usize {
        self.services.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.load().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::service::DependencyDescriptor;

    fn service(address: &str, name: &str) -> Service {
        Service::new(address, name, "tester", "tile", Vec::new())
    }

    #[test]
    fn test_registry_operations() {
        let registry = ServiceRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.get("127.0.0.1:5001").is_none());

        registry.register(service("127.0.0.1:5001", "weather"));
        registry.register(service("127.0.0.1:5002", "traffic"));
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get("127.0.0.1:5001").unwrap().name, "weather");

        assert!(registry.deregister("127.0.0.1:5001"));
        assert!(!registry.deregister("127.0.0.1:5001"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_duplicate_registration_replaces() {
        let registry = ServiceRegistry::new();
        registry.register(service("127.0.0.1:5001", "weather"));
        registry.register(Service::new(
            "127.0.0.1:5001",
            "weather-v2",
            "tester",
            "tile",
            vec![DependencyDescriptor::ByAddress {
                address: "127.0.0.1:5002".into(),
            }],
        ));

        assert_eq!(registry.len(), 1);
        let svc = registry.get("127.0.0.1:5001").unwrap();
        assert_eq!(svc.name, "weather-v2");
        assert_eq!(svc.descriptors().len(), 1);
    }

    #[test]
    fn test_snapshot_is_point_in_time() {
        let registry = ServiceRegistry::new();
        registry.register(service("127.0.0.1:5001", "weather"));

        let snapshot = registry.snapshot();
        registry.deregister("127.0.0.1:5001");
        registry.register(service("127.0.0.1:5002", "traffic"));

        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.contains_key("127.0.0.1:5001"));
        assert!(registry.get("127.0.0.1:5001").is_none());
    }

    #[test]
    fn test_generation_advances_on_mutation() {
        let registry = ServiceRegistry::new();
        let start = registry.generation();

        registry.register(service("127.0.0.1:5001", "weather"));
        let registered = registry.generation();
        assert!(registered > start);

        assert!(!registry.deregister("127.0.0.1:5999"));
        assert_eq!(registry.generation(), registered);

        assert!(registry.deregister("127.0.0.1:5001"));
        assert!(registry.generation() > registered);
    }
}
