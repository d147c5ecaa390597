//! Component base (C4) — generic over a capability-kind provider trait.
//!
//! Grounded in `original_source/irene/components/base.py`'s `Component`
//! base class: first-registered-provider-becomes-default, fallback to
//! first-in-insertion-order when no default is set, and a best-effort
//! `shutdown()`. The atomic-swap-on-reload pattern and single-flight lazy
//! load are adapted from the teacher's `ConfigurableToolRegistry`
//! (`crates/tools/src/registry.rs`).

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use va_core::error::RuntimeError;
use va_core::traits::Provider;

/// When providers within a Component are constructed (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleMode {
    /// All enabled providers constructed and probed at component init.
    Eager,
    /// Only the essential set constructed at init; others load on first use.
    Lazy,
}

/// One entry in the fallback chain: either already constructed, or known
/// but not yet loaded (lazy mode).
enum Slot<P: ?Sized> {
    Loaded(Arc<P>),
    NotLoaded,
}

/// Generic Component: owns every Provider for one capability kind and
/// exposes the shared selection/lifecycle surface (§4.4). Capability-kind
/// specific methods (e.g. `synthesize_to_file`) are added by the crate that
/// constructs a `Component<dyn TextToSpeech>` and calls through
/// `current()`.
pub struct Component<P: ?Sized + Provider> {
    name: &'static str,
    providers: RwLock<HashMap<String, Slot<P>>>,
    /// Insertion order, used as the fallback-to-first rule when no default
    /// is set (`original_source/irene/components/base.py`).
    insertion_order: RwLock<Vec<String>>,
    default: RwLock<Option<String>>,
    fallback_order: RwLock<Vec<String>>,
    mode: LifecycleMode,
    initialised: std::sync::atomic::AtomicBool,
}

impl<P: ?Sized + Provider> Component<P> {
    pub fn new(name: &'static str, mode: LifecycleMode) -> Self {
        Self {
            name,
            providers: RwLock::new(HashMap::new()),
            insertion_order: RwLock::new(Vec::new()),
            default: RwLock::new(None),
            fallback_order: RwLock::new(Vec::new()),
            mode,
            initialised: std::sync::atomic::AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn mark_initialised(&self) {
        self.initialised.store(true, std::sync::atomic::Ordering::SeqCst);
    }

    /// The first provider added becomes the default automatically.
    pub fn add_provider(&self, provider: Arc<P>) {
        let name = provider.name().to_string();
        self.providers.write().insert(name.clone(), Slot::Loaded(provider));
        self.insertion_order.write().push(name.clone());
        let mut default = self.default.write();
        if default.is_none() {
            *default = Some(name);
        }
    }

    /// Declares a provider known to config but not yet constructed (lazy
    /// mode); `load_on_demand` later replaces the slot.
    pub fn declare_lazy(&self, name: impl Into<String>) {
        let name = name.into();
        self.providers.write().insert(name.clone(), Slot::NotLoaded);
        self.insertion_order.write().push(name);
    }

    /// Single-flight construction for a lazily-declared provider. `build`
    /// is only invoked if the slot is still unloaded when this call takes
    /// the write lock.
    pub fn load_on_demand<F>(&self, name: &str, build: F) -> Option<Arc<P>>
    where
        F: FnOnce() -> Option<Arc<P>>,
    {
        {
            let providers = self.providers.read();
            if let Some(Slot::Loaded(p)) = providers.get(name) {
                return Some(p.clone());
            }
        }
        let mut providers = self.providers.write();
        match providers.get(name) {
            Some(Slot::Loaded(p)) => Some(p.clone()),
            Some(Slot::NotLoaded) => {
                let built = build()?;
                providers.insert(name.to_string(), Slot::Loaded(built.clone()));
                Some(built)
            }
            None => None,
        }
    }

    pub fn set_fallback_order(&self, order: Vec<String>) {
        *self.fallback_order.write() = order;
    }

    /// Returns `false`, never an error, for an unknown name (§4.4).
    pub fn set_default_provider(&self, name: &str) -> bool {
        if !self.providers.read().contains_key(name) {
            return false;
        }
        *self.default.write() = Some(name.to_string());
        true
    }

    fn loaded(&self, name: &str) -> Option<Arc<P>> {
        match self.providers.read().get(name) {
            Some(Slot::Loaded(p)) => Some(p.clone()),
            _ => None,
        }
    }

    /// Falls back to the first provider in insertion order when no default
    /// is set; `None` only when the provider map is empty.
    pub fn get_current_provider(&self) -> Option<Arc<P>> {
        if let Some(name) = self.default.read().clone() {
            if let Some(p) = self.loaded(&name) {
                return Some(p);
            }
        }
        for name in self.insertion_order.read().iter() {
            if let Some(p) = self.loaded(name) {
                return Some(p);
            }
        }
        None
    }

    pub fn list_available_providers(&self) -> Vec<String> {
        self.insertion_order.read().clone()
    }

    /// Every currently-loaded provider, insertion order, skipping any
    /// lazy slot not yet built. Used by normaliser chains (§4.8 stages 3/7)
    /// which run every applicable provider in a Component, not just the
    /// selected default.
    pub fn loaded_in_order(&self) -> Vec<Arc<P>> {
        let order = self.insertion_order.read();
        let providers = self.providers.read();
        order
            .iter()
            .filter_map(|name| match providers.get(name) {
                Some(Slot::Loaded(p)) => Some(p.clone()),
                _ => None,
            })
            .collect()
    }

    /// `false` until `initialise` has run; after that, delegates to the
    /// current provider's own `is_available()`.
    pub async fn is_available(&self) -> bool {
        if !self.initialised.load(std::sync::atomic::Ordering::SeqCst) {
            return false;
        }
        match self.get_current_provider() {
            Some(p) => p.is_available().await,
            None => false,
        }
    }

    /// Defined as `is_available()` at the base level; components with
    /// extra health semantics override it in their own wrapper type.
    pub async fn is_healthy(&self) -> bool {
        self.is_available().await
    }

    pub fn get_capabilities(&self) -> HashMap<String, serde_json::Value> {
        let mut merged = HashMap::new();
        let providers = self.providers.read();
        for slot in providers.values() {
            if let Slot::Loaded(p) = slot {
                merged.extend(p.capabilities());
            }
        }
        merged
    }

    /// Pinned-name-first, then default, then fallback chain, skipping
    /// unavailable providers (§4.4 provider selection).
    pub async fn select(&self, pinned: Option<&str>) -> Result<Arc<P>, RuntimeError> {
        if let Some(name) = pinned {
            if let Some(p) = self.loaded(name) {
                if p.is_available().await {
                    return Ok(p);
                }
            }
        }
        if let Some(p) = self.get_current_provider() {
            if p.is_available().await {
                return Ok(p);
            }
        }
        for name in self.fallback_order.read().clone() {
            if let Some(p) = self.loaded(&name) {
                if p.is_available().await {
                    return Ok(p);
                }
            }
        }
        Err(RuntimeError::CapabilityUnavailable {
            component: self.name.to_string(),
        })
    }

    pub fn mode(&self) -> LifecycleMode {
        self.mode
    }

    /// Iterates every registered provider, logging and continuing past any
    /// individual shutdown failure (§4.3 best-effort shutdown contract).
    pub async fn shutdown<F, Fut>(&self, shutdown_one: F)
    where
        F: Fn(Arc<P>) -> Fut,
        Fut: std::future::Future<Output = Result<(), RuntimeError>>,
    {
        let loaded: Vec<Arc<P>> = {
            let providers = self.providers.read();
            providers
                .values()
                .filter_map(|s| match s {
                    Slot::Loaded(p) => Some(p.clone()),
                    Slot::NotLoaded => None,
                })
                .collect()
        };
        for provider in loaded {
            let name = provider.name().to_string();
            if let Err(err) = shutdown_one(provider).await {
                tracing::warn!(component = self.name, provider = %name, error = %err, "provider shutdown failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::Value;

    struct StubProvider {
        name: String,
        available: std::sync::atomic::AtomicBool,
    }

    #[async_trait]
    impl Provider for StubProvider {
        fn name(&self) -> &str {
            &self.name
        }

        async fn is_available(&self) -> bool {
            self.available.load(std::sync::atomic::Ordering::SeqCst)
        }

        fn capabilities(&self) -> HashMap<String, Value> {
            HashMap::new()
        }

        fn parameter_schema(&self) -> Value {
            serde_json::json!({})
        }
    }

    fn stub(name: &str, available: bool) -> Arc<StubProvider> {
        Arc::new(StubProvider {
            name: name.to_string(),
            available: std::sync::atomic::AtomicBool::new(available),
        })
    }

    #[test]
    fn first_provider_becomes_default() {
        let component: Component<StubProvider> = Component::new("tts", LifecycleMode::Eager);
        component.add_provider(stub("a", true));
        component.add_provider(stub("b", true));
        assert_eq!(component.get_current_provider().unwrap().name(), "a");
    }

    #[test]
    fn set_default_provider_rejects_unknown_name() {
        let component: Component<StubProvider> = Component::new("tts", LifecycleMode::Eager);
        component.add_provider(stub("a", true));
        assert!(!component.set_default_provider("ghost"));
        assert!(component.set_default_provider("a"));
    }

    #[tokio::test]
    async fn is_available_false_before_initialise() {
        let component: Component<StubProvider> = Component::new("tts", LifecycleMode::Eager);
        component.add_provider(stub("a", true));
        assert!(!component.is_available().await);
        component.mark_initialised();
        assert!(component.is_available().await);
    }

    #[tokio::test]
    async fn select_falls_back_past_unavailable_default() {
        let component: Component<StubProvider> = Component::new("tts", LifecycleMode::Eager);
        component.add_provider(stub("a", false));
        component.add_provider(stub("b", true));
        component.mark_initialised();
        component.set_fallback_order(vec!["a".to_string(), "b".to_string()]);
        let selected = component.select(None).await.unwrap();
        assert_eq!(selected.name(), "b");
    }

    #[tokio::test]
    async fn select_fails_when_all_unavailable() {
        let component: Component<StubProvider> = Component::new("tts", LifecycleMode::Eager);
        component.add_provider(stub("a", false));
        component.mark_initialised();
        assert!(component.select(None).await.is_err());
    }

    #[test]
    fn lazy_load_is_single_flight() {
        let component: Component<StubProvider> = Component::new("tts", LifecycleMode::Lazy);
        component.declare_lazy("a");
        let built = component.load_on_demand("a", || Some(stub("a", true)));
        assert!(built.is_some());
        let cached = component.load_on_demand("a", || panic!("should not rebuild"));
        assert!(cached.is_some());
    }
}
