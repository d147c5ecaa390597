//! Component Manager (C5) — four-phase startup/shutdown (§4.3).

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use va_core::error::DependencyError;
use va_core::{ComponentDescriptor, ComponentKind};

/// What the Component Manager needs from every concrete Component wrapper
/// (a `Component<dyn Tts>`-style type built by the crate assembling the
/// runtime). Capability-specific methods live on the wrapper itself and
/// are reached by downcasting or by a capability-specific handle held
/// alongside this trait object.
#[async_trait]
pub trait ManagedComponent: Send + Sync {
    fn kind(&self) -> ComponentKind;
    async fn initialise(&self) -> Result<(), DependencyError>;
    async fn is_healthy(&self) -> bool;
    async fn shutdown(&self);
}

/// Builds the fixed-universe `ComponentDescriptor`s out of a typed
/// `Settings` (phase 1's enablement resolution source, §4.3).
pub fn descriptors_from_settings(settings: &va_config::Settings) -> Vec<ComponentDescriptor> {
    ComponentKind::ALL
        .iter()
        .map(|kind| {
            let mut descriptor = ComponentDescriptor::new(*kind);
            descriptor.enabled = settings.components.is_enabled(kind.as_str()).unwrap_or(false);

            let provider_cfg = match kind {
                ComponentKind::Tts => Some(&settings.tts),
                ComponentKind::Audio => Some(&settings.audio),
                ComponentKind::Asr => Some(&settings.asr),
                ComponentKind::Llm => Some(&settings.llm),
                ComponentKind::VoiceTrigger => Some(&settings.voice_trigger),
                ComponentKind::Nlu => Some(&settings.nlu),
                ComponentKind::TextProcessor => Some(&settings.text_processor),
                _ => None,
            };
            if let Some(cfg) = provider_cfg {
                descriptor.default_provider = cfg.default_provider.clone();
                descriptor.fallback_providers = cfg.fallback_providers.clone();
                descriptor.provider_configs = cfg.providers.clone();
            }
            if *kind == ComponentKind::Tts {
                descriptor.component_dependencies.push(ComponentKind::Audio);
            }
            descriptor
        })
        .collect()
}

pub struct ComponentManager {
    descriptors: HashMap<ComponentKind, ComponentDescriptor>,
    components: HashMap<ComponentKind, Arc<dyn ManagedComponent>>,
    order: parking_lot::RwLock<Vec<ComponentKind>>,
}

impl ComponentManager {
    pub fn new(
        descriptors: Vec<ComponentDescriptor>,
        components: HashMap<ComponentKind, Arc<dyn ManagedComponent>>,
    ) -> Self {
        Self {
            descriptors: descriptors.into_iter().map(|d| (d.kind, d)).collect(),
            components,
            order: parking_lot::RwLock::new(Vec::new()),
        }
    }

    /// Phase 1: the active set is every descriptor with `enabled=true`.
    fn active_set(&self) -> HashSet<ComponentKind> {
        self.descriptors
            .values()
            .filter(|d| d.enabled)
            .map(|d| d.kind)
            .collect()
    }

    /// Phase 2: Kahn's algorithm with deterministic tie-break by declared
    /// name (§4.3 "ties broken by declared name").
    fn topological_order(&self, active: &HashSet<ComponentKind>) -> Result<Vec<ComponentKind>, DependencyError> {
        let mut in_degree: HashMap<ComponentKind, usize> = active.iter().map(|k| (*k, 0)).collect();
        let mut edges: HashMap<ComponentKind, Vec<ComponentKind>> = active.iter().map(|k| (*k, Vec::new())).collect();

        for kind in active {
            let descriptor = &self.descriptors[kind];
            for dep in &descriptor.component_dependencies {
                if !self.descriptors.contains_key(dep) {
                    return Err(DependencyError::UnknownDependency {
                        component: kind.as_str().to_string(),
                        dependency: dep.as_str().to_string(),
                    });
                }
                if !active.contains(dep) {
                    return Err(DependencyError::DisabledDependency {
                        component: kind.as_str().to_string(),
                        dependency: dep.as_str().to_string(),
                    });
                }
                edges.get_mut(dep).unwrap().push(*kind);
                *in_degree.get_mut(kind).unwrap() += 1;
            }
        }

        let mut ready: Vec<ComponentKind> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(k, _)| *k)
            .collect();
        ready.sort_by_key(|k| k.as_str());

        let mut order = Vec::new();
        while let Some(next) = {
            ready.sort_by_key(|k| k.as_str());
            ready.pop()
        } {
            order.push(next);
            for dependent in edges.get(&next).cloned().unwrap_or_default() {
                let degree = in_degree.get_mut(&dependent).unwrap();
                *degree -= 1;
                if *degree == 0 {
                    ready.push(dependent);
                }
            }
        }

        if order.len() != active.len() {
            let stuck: Vec<String> = active
                .iter()
                .filter(|k| !order.contains(k))
                .map(|k| k.as_str().to_string())
                .collect();
            return Err(DependencyError::Cycle(stuck));
        }

        Ok(order)
    }

    /// Runs all four phases. On success, the constructed order is cached
    /// for `shutdown()` to reverse. Fatal at startup (§7): the caller is
    /// expected to terminate the process with a non-zero exit on `Err`.
    pub async fn initialise(&self) -> Result<(), DependencyError> {
        let active = self.active_set();
        let order = self.topological_order(&active)?;

        for kind in &order {
            if let Some(component) = self.components.get(kind) {
                component.initialise().await?;
            }
        }

        for kind in &order {
            if let Some(component) = self.components.get(kind) {
                let descriptor = &self.descriptors[kind];
                if !component.is_healthy().await && !descriptor.optional {
                    return Err(DependencyError::UnhealthyComponent {
                        component: kind.as_str().to_string(),
                    });
                }
            }
        }

        *self.order.write() = order;
        Ok(())
    }

    pub fn get(&self, kind: ComponentKind) -> Option<Arc<dyn ManagedComponent>> {
        if !self.descriptors.get(&kind).map(|d| d.enabled).unwrap_or(false) {
            return None;
        }
        self.components.get(&kind).cloned()
    }

    /// Reverse topological order; best-effort, errors are logged and do
    /// not halt the sequence (§4.3).
    pub async fn shutdown(&self) {
        let order = self.order.read().clone();
        for kind in order.iter().rev() {
            if let Some(component) = self.components.get(kind) {
                component.shutdown().await;
            }
        }
    }

    /// Human label computed from active capabilities, for diagnostics.
    pub fn deployment_profile(&self) -> String {
        let mut active: Vec<&str> = self.active_set().iter().map(|k| k.as_str()).collect();
        active.sort_unstable();
        if active.is_empty() {
            "minimal".to_string()
        } else {
            active.join("+")
        }
    }
}
