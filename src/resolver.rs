//! Resolution contexts for interceptors
//!
//! Interceptor callbacks may look up other services while they run. Two kinds
//! of context exist:
//!
//! - [`ServiceRegistry`]: the process-wide registry, built once at startup.
//! - [`RequestScope`]: a per-request scope with its own instances that falls
//!   back to its parent registry.
//!
//! [`ContextSource::resolve`] picks the context for one call. Lookup order:
//!
//! 1. the scope attached to the request with [`HttpRequest::with_scope`],
//! 2. the scope reported by the [`ScopeAccessor`] registered in the root
//!    registry (for example [`TaskScopeAccessor`]),
//! 3. the root registry itself.
//!
//! A missing scope is never an error; the same client works inside and outside
//! a request-handling scope.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};

use crate::types::HttpRequest;

type Instance = Arc<dyn Any + Send + Sync>;

fn downcast<T: Send + Sync + 'static>(instance: &Instance) -> Option<Arc<T>> {
    instance.clone().downcast::<T>().ok()
}

/// Reports the request scope that is current for the caller, if any.
pub trait ScopeAccessor: Send + Sync {
    /// The scope current for the calling task. `None` is not an error.
    fn current_scope(&self) -> Option<RequestScope>;
}

/// Process-wide service registry.
///
/// Populated during setup and shared behind an `Arc` afterwards; it is never
/// mutated once clients are built.
#[derive(Default)]
pub struct ServiceRegistry {
    singletons: HashMap<TypeId, Instance>,
    accessor: Option<Arc<dyn ScopeAccessor>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a shared instance, replacing any previous one of the same type.
    pub fn register_singleton<T: Send + Sync + 'static>(&mut self, instance: Arc<T>) -> &mut Self {
        self.singletons.insert(TypeId::of::<T>(), instance);
        self
    }

    /// Install the ambient request-scope accessor.
    pub fn register_accessor(&mut self, accessor: Arc<dyn ScopeAccessor>) -> &mut Self {
        self.accessor = Some(accessor);
        self
    }

    /// The installed ambient accessor, if any.
    pub fn accessor(&self) -> Option<&Arc<dyn ScopeAccessor>> {
        self.accessor.as_ref()
    }

    /// Resolve a registered instance, or `None` if nothing of type `T` exists.
    pub fn resolve_optional<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.singletons.get(&TypeId::of::<T>()).and_then(downcast::<T>)
    }

    /// Whether an instance of `T` is registered.
    pub fn contains<T: 'static>(&self) -> bool {
        self.singletons.contains_key(&TypeId::of::<T>())
    }

    /// Number of registered instances.
    pub fn len(&self) -> usize {
        self.singletons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.singletons.is_empty()
    }
}

impl std::fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("singletons", &self.singletons.len())
            .field("accessor", &self.accessor.is_some())
            .finish()
    }
}

struct ScopeInner {
    parent: Arc<ServiceRegistry>,
    instances: RwLock<HashMap<TypeId, Instance>>,
}

/// A per-request resolution scope.
///
/// Cloning is cheap; clones share the same instances.
#[derive(Clone)]
pub struct RequestScope {
    inner: Arc<ScopeInner>,
}

impl RequestScope {
    /// Empty scope that falls back to `parent`.
    pub fn new(parent: Arc<ServiceRegistry>) -> Self {
        Self {
            inner: Arc::new(ScopeInner {
                parent,
                instances: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Add a scope-local instance. Scope instances shadow the parent's.
    pub fn insert<T: Send + Sync + 'static>(&self, instance: Arc<T>) {
        self.inner
            .instances
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(TypeId::of::<T>(), instance);
    }

    /// Resolve from this scope first, then from the parent registry.
    pub fn resolve_optional<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        let local = self
            .inner
            .instances
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&TypeId::of::<T>())
            .and_then(downcast::<T>);
        local.or_else(|| self.inner.parent.resolve_optional::<T>())
    }

    /// The registry this scope falls back to.
    pub fn parent(&self) -> &Arc<ServiceRegistry> {
        &self.inner.parent
    }

    /// Returns `true` if both handles refer to the same scope.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Run `fut` with this scope visible to [`TaskScopeAccessor`].
    pub async fn enter<F: Future>(&self, fut: F) -> F::Output {
        CURRENT_SCOPE.scope(self.clone(), fut).await
    }
}

impl std::fmt::Debug for RequestScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let instances = self
            .inner
            .instances
            .read()
            .map(|map| map.len())
            .unwrap_or_default();
        f.debug_struct("RequestScope")
            .field("instances", &instances)
            .finish()
    }
}

tokio::task_local! {
    static CURRENT_SCOPE: RequestScope;
}

/// [`ScopeAccessor`] backed by a tokio task-local set with
/// [`RequestScope::enter`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TaskScopeAccessor;

impl ScopeAccessor for TaskScopeAccessor {
    fn current_scope(&self) -> Option<RequestScope> {
        CURRENT_SCOPE.try_with(RequestScope::clone).ok()
    }
}

/// The context handed to a before-send callback.
#[derive(Clone, Debug)]
pub enum ResolutionContext {
    /// A request scope was found.
    Scoped(RequestScope),
    /// No request scope; the process-wide registry.
    Root(Arc<ServiceRegistry>),
}

impl ResolutionContext {
    /// Resolve `T` from the scope (with its fallback) or the root registry.
    pub fn resolve_optional<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        match self {
            Self::Scoped(scope) => scope.resolve_optional::<T>(),
            Self::Root(root) => root.resolve_optional::<T>(),
        }
    }

    pub fn is_request_scoped(&self) -> bool {
        matches!(self, Self::Scoped(_))
    }

    /// The request scope, when the context is request scoped.
    pub fn scope(&self) -> Option<&RequestScope> {
        match self {
            Self::Scoped(scope) => Some(scope),
            Self::Root(_) => None,
        }
    }
}

/// Two-step context lookup bound to a root registry.
#[derive(Clone, Debug)]
pub struct ContextSource {
    root: Arc<ServiceRegistry>,
}

impl ContextSource {
    pub fn new(root: Arc<ServiceRegistry>) -> Self {
        Self { root }
    }

    /// Resolve the context for one call (see the module docs for the order).
    pub fn resolve(&self, request: &HttpRequest) -> ResolutionContext {
        if let Some(scope) = request.scope() {
            return ResolutionContext::Scoped(scope.clone());
        }
        if let Some(scope) = self.root.accessor().and_then(|a| a.current_scope()) {
            return ResolutionContext::Scoped(scope);
        }
        ResolutionContext::Root(self.root.clone())
    }
}
