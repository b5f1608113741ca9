use crate::transport::MethodId;

/// Marker carried by every RPC service implementation
///
/// Zero behavior on purpose: scanning for registered implementations only
/// needs set membership, which this explicit declaration makes cheap.
/// Registration through [`ServiceRegistry::register`] requires the bound,
/// so no real implementation can be missed; the registry's dedup pass
/// drops anything registered more than once.
pub trait ServiceMarker: Send + Sync + 'static {}

/// A service implementation that can describe its callable surface
pub trait Service: ServiceMarker {
    fn descriptor() -> ServiceDescriptor;
}

/// Name and method set of one service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDescriptor {
    name: &'static str,
    methods: &'static [&'static str],
}

impl ServiceDescriptor {
    pub const fn new(name: &'static str, methods: &'static [&'static str]) -> Self {
        Self { name, methods }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn methods(&self) -> &'static [&'static str] {
        self.methods
    }

    /// Method identifier for a declared method, `None` otherwise
    pub fn method_id(&self, method: &str) -> Option<MethodId> {
        self.methods
            .contains(&method)
            .then(|| MethodId::new(self.name, method))
    }
}

/// Registry of declared service implementations
///
/// The scanning collaborator's view: enumerate what was registered instead
/// of probing every loaded type.
#[derive(Debug, Default)]
pub struct ServiceRegistry {
    entries: Vec<ServiceDescriptor>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a service implementation
    ///
    /// Returns false if a service with the same name was already present.
    pub fn register<S: Service>(&mut self) -> bool {
        let descriptor = S::descriptor();
        if self.contains(descriptor.name()) {
            return false;
        }
        tracing::debug!(service = descriptor.name(), "registering service");
        self.entries.push(descriptor);
        true
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|entry| entry.name() == name)
    }

    pub fn services(&self) -> &[ServiceDescriptor] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
