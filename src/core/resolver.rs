//! Turns dependency descriptors into live service references.

use std::sync::Arc;

use log::{debug, warn};

use super::{
    error::{GatewayError, GatewayResult},
    registry::{RegistrySnapshot, ServiceRegistry},
    service::{DependencyDescriptor, Service},
};

pub struct DependencyResolver {
    registry: Arc<ServiceRegistry>,
}

impl DependencyResolver {
    pub fn new(registry: Arc<ServiceRegistry>) -> Self {
        Self { registry }
    }

    /// Returns the service's dependencies in declaration order, resolving
    /// them against a fresh registry snapshot on first use.
    ///
    /// Only a successful resolution is memoized on the service, tagged with
    /// the registry generation it was made against; any later registry
    /// mutation makes it stale. A `DependencyNotFound` leaves the service
    /// unresolved so the next attempt starts from scratch.
    pub fn dependencies(&self, service: &Service) -> GatewayResult<Vec<Arc<Service>>> {
        let generation = self.registry.generation();
        if let Some(resolved) = service.resolved_dependencies(generation) {
            return Ok(resolved);
        }

        let snapshot = self.registry.snapshot();
        let resolved = resolve_descriptors(service, &snapshot)?;
        debug!(
            "Resolved {} dependencies for {}",
            resolved.len(),
            service.address()
        );
        service.set_resolved_dependencies(generation, &resolved);
        Ok(resolved)
    }

    /// Addresses a service depends on, for status listings. Uses the memo
    /// when present, otherwise matches descriptors against `snapshot`
    /// without memoizing and skips descriptors that match nothing.
    pub fn describe(&self, service: &Service, snapshot: &RegistrySnapshot) -> Vec<String> {
        if let Some(resolved) = service.resolved_dependencies(self.registry.generation()) {
            return resolved.iter().map(|s| s.address().to_string()).collect();
        }

        service
            .descriptors()
            .iter()
            .filter_map(|descriptor| match descriptor {
                DependencyDescriptor::ByAddress { address } => Some(address.clone()),
                DependencyDescriptor::ByIdentity { .. } => find(descriptor, snapshot)
                    .map(|s| s.address().to_string()),
            })
            .collect()
    }
}

fn resolve_descriptors(
    service: &Service,
    snapshot: &RegistrySnapshot,
) -> GatewayResult<Vec<Arc<Service>>> {
    service
        .descriptors()
        .iter()
        .map(|descriptor| {
            find(descriptor, snapshot).ok_or_else(|| {
                let missing = match descriptor {
                    DependencyDescriptor::ByAddress { address } => address.clone(),
                    DependencyDescriptor::ByIdentity { name, creator } => {
                        format!("{name} by {creator}")
                    }
                };
                warn!(
                    "Service {} depends on {missing}, which is not registered",
                    service.address()
                );
                GatewayError::DependencyNotFound(missing)
            })
        })
        .collect()
}

/// Identity descriptors matching several services pick the lowest address.
fn find(descriptor: &DependencyDescriptor, snapshot: &RegistrySnapshot) -> Option<Arc<Service>> {
    match descriptor {
        DependencyDescriptor::ByAddress { address } => snapshot.get(address).cloned(),
        DependencyDescriptor::ByIdentity { .. } => snapshot
            .values()
            .filter(|s| descriptor.matches(s))
            .min_by(|a, b| a.address().cmp(b.address()))
            .cloned(),
    }
}
