//! Loaded host modules and the per-session record of which ones the
//! evaluator references.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use glimpse_script::{Module, CORE_MODULE};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::debug;

use crate::evaluator::Evaluator;

/// Modules that are part of every evaluator already and must never be
/// referenced again.
pub const IMPLICIT_MODULES: &[&str] = &[CORE_MODULE, "glimpse-script", "glimpse-engine"];

pub fn is_implicit(name: &str) -> bool {
    IMPLICIT_MODULES.contains(&name)
}

#[derive(Debug, Default)]
struct CatalogInner {
    modules: Vec<Arc<Module>>,
    subscribers: Vec<UnboundedSender<Arc<Module>>>,
}

/// The host process's set of loaded modules.
///
/// Cloning yields another handle to the same catalog.
#[derive(Debug, Clone)]
pub struct ModuleCatalog {
    inner: Arc<Mutex<CatalogInner>>,
}

impl Default for ModuleCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleCatalog {
    /// A catalog holding only the built-in `core` module.
    pub fn new() -> Self {
        let inner = CatalogInner {
            modules: vec![Arc::new(glimpse_script::core_module())],
            subscribers: Vec::new(),
        };
        Self {
            inner: Arc::new(Mutex::new(inner)),
        }
    }

    /// Load a module and notify live subscribers.
    ///
    /// Returns `false` if a module with the same name is already loaded.
    pub fn load(&self, module: Module) -> bool {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if inner.modules.iter().any(|m| m.name == module.name) {
            return false;
        }
        let module = Arc::new(module);
        inner.modules.push(module.clone());
        // Dropped subscriptions fail to receive and are pruned here.
        inner.subscribers.retain(|tx| tx.send(module.clone()).is_ok());
        true
    }

    pub fn loaded(&self) -> Vec<Arc<Module>> {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.modules.clone()
    }

    pub fn subscribe(&self) -> ModuleSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.subscribers.push(tx);
        ModuleSubscription { rx }
    }

    pub fn subscriber_count(&self) -> usize {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.subscribers.iter().filter(|tx| !tx.is_closed()).count()
    }
}

/// Load notifications for one session.
#[derive(Debug)]
pub struct ModuleSubscription {
    rx: UnboundedReceiver<Arc<Module>>,
}

impl ModuleSubscription {
    /// Modules loaded since the last call, without blocking.
    pub fn pending(&mut self) -> Vec<Arc<Module>> {
        let mut modules = Vec::new();
        while let Ok(module) = self.rx.try_recv() {
            modules.push(module);
        }
        modules
    }
}

/// How a module came to be registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Loaded before the session was built.
    Static,
    /// Loaded while the session was alive.
    Dynamic,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Static => write!(f, "static"),
            Origin::Dynamic => write!(f, "dynamic"),
        }
    }
}

/// Tracks the modules one session's evaluator references.
#[derive(Debug, Default)]
pub struct ModuleTracker {
    registered: BTreeSet<String>,
}

impl ModuleTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reference `module` in `evaluator` unless it is implicit or already
    /// registered. Returns whether a reference was added.
    pub fn register(&mut self, evaluator: &mut dyn Evaluator, module: Arc<Module>, origin: Origin) -> bool {
        if is_implicit(&module.name) || self.registered.contains(&module.name) {
            return false;
        }
        debug!(module = %module.name, %origin, "Referencing module");
        self.registered.insert(module.name.clone());
        evaluator.reference(module);
        true
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.registered.contains(name)
    }

    pub fn registered(&self) -> impl Iterator<Item = &str> {
        self.registered.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EvalFailure;
    use glimpse_script::Value;

    #[derive(Default)]
    struct Recorder {
        references: Vec<String>,
    }

    impl Evaluator for Recorder {
        fn evaluate(&mut self, _code: &str) -> Result<Option<Value>, EvalFailure> {
            Ok(None)
        }

        fn reference(&mut self, module: Arc<Module>) {
            self.references.push(module.name.clone());
        }

        fn referenced_modules(&self) -> Vec<String> {
            self.references.clone()
        }
    }

    #[test]
    fn test_denylisted_modules_are_skipped() {
        let mut tracker = ModuleTracker::new();
        let mut eval = Recorder::default();
        for name in IMPLICIT_MODULES {
            assert!(!tracker.register(&mut eval, Arc::new(Module::new(*name)), Origin::Static));
        }
        assert!(eval.references.is_empty());
    }

    #[test]
    fn test_register_once() {
        let mut tracker = ModuleTracker::new();
        let mut eval = Recorder::default();
        let module = Arc::new(Module::new("app"));
        assert!(tracker.register(&mut eval, module.clone(), Origin::Static));
        assert!(!tracker.register(&mut eval, module, Origin::Dynamic));
        assert_eq!(eval.references, vec!["app"]);
        assert!(tracker.is_registered("app"));
    }

    #[test]
    fn test_catalog_dedupes_and_notifies() {
        let catalog = ModuleCatalog::new();
        let mut sub = catalog.subscribe();
        assert!(catalog.load(Module::new("app")));
        assert!(!catalog.load(Module::new("app")));

        let pending: Vec<_> = sub.pending().into_iter().map(|m| m.name.clone()).collect();
        assert_eq!(pending, vec!["app"]);
        assert!(sub.pending().is_empty());

        let names: Vec<_> = catalog.loaded().iter().map(|m| m.name.clone()).collect();
        assert_eq!(names, vec![CORE_MODULE, "app"]);
    }

    #[test]
    fn test_dropped_subscribers_are_pruned() {
        let catalog = ModuleCatalog::new();
        let sub = catalog.subscribe();
        let _kept = catalog.subscribe();
        drop(sub);
        catalog.load(Module::new("app"));
        assert_eq!(catalog.subscriber_count(), 1);
    }
}
