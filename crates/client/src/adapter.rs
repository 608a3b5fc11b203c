//! Request adapters and the ordered registry that applies them.
//!
//! An adapter sees every outbound request exactly once, before credentials are
//! injected and the request is sent. It may inspect and change the request,
//! or return an error to veto sending altogether.
//!
//! The registry is assembled while the [`crate::MeshClient`] is being built and
//! is immutable afterwards; every request issued through that client shares
//! it. Adapters run in registration order and each one observes the
//! cumulative effect of those before it.

use std::sync::Arc;

use tracing::trace;

use envelope::MeshError;

use crate::request::OutboundRequest;

/// A cross-cutting hook applied to every outbound request.
///
/// Any `Fn(&mut OutboundRequest) -> Result<(), MeshError> + Send + Sync`
/// closure is an adapter.
pub trait RequestAdapter: Send + Sync {
    /// Inspects or mutates `request`. Returning an error aborts the send and
    /// the error reaches the caller unchanged.
    fn adapt(&self, request: &mut OutboundRequest) -> Result<(), MeshError>;

    /// Name used in trace output.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

impl<F> RequestAdapter for F
where
    F: Fn(&mut OutboundRequest) -> Result<(), MeshError> + Send + Sync,
{
    fn adapt(&self, request: &mut OutboundRequest) -> Result<(), MeshError> {
        self(request)
    }
}

/// Ordered, append-only list of [`RequestAdapter`]s.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: Vec<Arc<dyn RequestAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `adapter` after every adapter registered so far.
    pub fn register<A>(&mut self, adapter: A) -> &mut Self
    where
        A: RequestAdapter + 'static,
    {
        self.adapters.push(Arc::new(adapter));
        self
    }

    /// Appends an adapter that is already shared elsewhere.
    pub fn register_shared(&mut self, adapter: Arc<dyn RequestAdapter>) -> &mut Self {
        self.adapters.push(adapter);
        self
    }

    /// Runs every adapter against `request` in registration order.
    ///
    /// Stops at the first error. Adapters that already ran are not undone.
    pub fn apply_all(&self, request: &mut OutboundRequest) -> Result<(), MeshError> {
        for adapter in &self.adapters {
            trace!(adapter = adapter.name(), "applying request adapter");
            adapter.adapt(request)?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.adapters.iter().map(|a| a.name()))
            .finish()
    }
}
