//! Registered downstream information modules.

use std::{
    hash::{Hash, Hasher},
    sync::{Arc, Weak},
};

use arc_swap::ArcSwapOption;
use once_cell::sync::OnceCell;

/// Unresolved reference to a dependency, as declared at registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencyDescriptor {
    ByAddress { address: String },
    ByIdentity { name: String, creator: String },
}

impl DependencyDescriptor {
    pub fn matches(&self, service: &Service) -> bool {
        match self {
            DependencyDescriptor::ByAddress { address } => service.address() == address.as_str(),
            DependencyDescriptor::ByIdentity { name, creator } => {
                service.name == *name && service.creator == *creator
            }
        }
    }
}

/// Display metadata attached to every aggregated response.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceMetadata {
    pub name: String,
    pub creator: String,
    pub tile: String,
    pub max_age: Option<u64>,
}

/// Dependencies resolved against one registry generation.
#[derive(Debug)]
struct ResolvedDependencies {
    generation: u64,
    services: Vec<Weak<Service>>,
}

/// A registered downstream service.
///
/// Identity is the network address alone: `Eq` and `Hash` ignore every
/// other field. Metadata and descriptors are fixed at construction; the
/// learned `max_age` and the memoized dependency resolution are the only
/// state that changes afterwards.
#[derive(Debug)]
pub struct Service {
    address: String,
    pub name: String,
    pub creator: String,
    pub tile: String,
    descriptors: Vec<DependencyDescriptor>,
    resolved: ArcSwapOption<ResolvedDependencies>,
    max_age: OnceCell<u64>,
}

impl Service {
    pub fn new(
        address: impl Into<String>,
        name: impl Into<String>,
        creator: impl Into<String>,
        tile: impl Into<String>,
        descriptors: Vec<DependencyDescriptor>,
    ) -> Self {
        Self {
            address: address.into(),
            name: name.into(),
            creator: creator.into(),
            tile: tile.into(),
            descriptors,
            resolved: ArcSwapOption::empty(),
            max_age: OnceCell::new(),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn descriptors(&self) -> &[DependencyDescriptor] {
        &self.descriptors
    }

    /// Learned TTL in seconds; `None` until the first successful response.
    pub fn max_age(&self) -> Option<u64> {
        self.max_age.get().copied()
    }

    /// Records the TTL learned from the first successful response. Later
    /// calls keep the first value and return it.
    pub fn learn_max_age(&self, max_age: u64) -> u64 {
        *self.max_age.get_or_init(|| max_age)
    }

    /// Memoized dependencies, in declaration order.
    ///
    /// Returns `None` when resolution has not run yet or was made against a
    /// registry generation other than `generation`. A mismatched memo is
    /// cleared so the next resolution starts from scratch.
    pub fn resolved_dependencies(&self, generation: u64) -> Option<Vec<Arc<Service>>> {
        let resolved = self.resolved.load_full()?;
        let live = if resolved.generation == generation {
            resolved.services.iter().map(Weak::upgrade).collect()
        } else {
            None
        };
        if live.is_none() {
            log::debug!(
                "Resolved dependencies of {} are stale, clearing memo",
                self.address
            );
            self.resolved.store(None);
        }
        live
    }

    /// Memoizes `dependencies` as resolved at registry `generation`. Only weak
    /// references are kept so mutually dependent services can still be freed.
    pub fn set_resolved_dependencies(&self, generation: u64, dependencies: &[Arc<Service>]) {
        let services = dependencies.iter().map(Arc::downgrade).collect();
        self.resolved.store(Some(Arc::new(ResolvedDependencies {
            generation,
            services,
        })));
    }

    pub fn metadata(&self) -> ServiceMetadata {
        ServiceMetadata {
            name: self.name.clone(),
            creator: self.creator.clone(),
            tile: self.tile.clone(),
            max_age: self.max_age(),
        }
    }
}

impl PartialEq for Service {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address
    }
}

impl Eq for Service {}

impl Hash for Service {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.address.hash(state);
    }
}
