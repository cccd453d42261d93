//! The single live evaluation session and its lifecycle.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::diagnostics::DiagnosticSink;
use crate::error::EvalFailure;
use crate::evaluator::{Evaluator, EvaluatorFactory, EvaluatorSettings};
use crate::modules::{ModuleCatalog, ModuleSubscription, ModuleTracker, Origin};
use crate::options::EngineOptions;

/// Symbols defined in every session.
pub const DEFAULT_SYMBOLS: &[&str] = &["GLIMPSE", "DEBUG"];

/// Namespaces imported into every session.
pub const DEFAULT_IMPORTS: &[&str] = &["core", "core.collections", "core.text"];

/// A live evaluator with the modules it references.
pub struct Session {
    evaluator: Box<dyn Evaluator>,
    tracker: ModuleTracker,
    subscription: ModuleSubscription,
    generation: u64,
}

impl Session {
    pub fn evaluator(&mut self) -> &mut dyn Evaluator {
        self.evaluator.as_mut()
    }

    pub fn tracker(&self) -> &ModuleTracker {
        &self.tracker
    }

    /// Which build of the session this is, starting at 1.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Reference modules loaded since the last sync.
    fn sync_modules(&mut self) {
        for module in self.subscription.pending() {
            self.tracker
                .register(self.evaluator.as_mut(), module, Origin::Dynamic);
        }
    }
}

/// Holds the session, if one is built.
#[derive(Default)]
pub enum SessionSlot {
    #[default]
    Absent,
    Ready(Session),
}

/// Builds, hands out and throws away the session.
pub struct SessionManager {
    slot: SessionSlot,
    factory: Arc<dyn EvaluatorFactory>,
    catalog: ModuleCatalog,
    options: EngineOptions,
    /// Shared so other threads can read it without touching the session.
    generation: Arc<AtomicU64>,
}

impl SessionManager {
    pub fn new(factory: Arc<dyn EvaluatorFactory>, catalog: ModuleCatalog, options: EngineOptions) -> Self {
        Self {
            slot: SessionSlot::Absent,
            factory,
            catalog,
            options,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.slot, SessionSlot::Ready(_))
    }

    /// How many sessions have been built so far.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// A live view of [`generation`](Self::generation) readable from any thread.
    pub fn generation_counter(&self) -> Arc<AtomicU64> {
        self.generation.clone()
    }

    /// Conditional symbols for a new session.
    pub fn symbols(&self) -> BTreeSet<String> {
        let mut symbols: BTreeSet<String> = DEFAULT_SYMBOLS.iter().map(|s| s.to_string()).collect();
        if self.options.include_platform_symbol {
            symbols.insert(std::env::consts::OS.to_uppercase());
        }
        symbols.extend(self.options.extra_symbols.iter().cloned());
        symbols
    }

    /// Return the session, building it first if there is none.
    ///
    /// Modules loaded since the previous call are referenced before the
    /// session is handed out. A failed build leaves the slot empty.
    pub fn ensure_ready(&mut self, sink: &DiagnosticSink) -> Result<&mut Session, EvalFailure> {
        if let SessionSlot::Absent = self.slot {
            let session = self.build(sink)?;
            self.slot = SessionSlot::Ready(session);
        }
        match &mut self.slot {
            SessionSlot::Ready(session) => {
                session.sync_modules();
                Ok(session)
            }
            SessionSlot::Absent => Err(EvalFailure::fatal("session slot empty after build")),
        }
    }

    /// Drop the session. The next `ensure_ready` starts from scratch.
    pub fn invalidate(&mut self, reason: &str) {
        if let SessionSlot::Ready(session) = std::mem::take(&mut self.slot) {
            warn!(generation = session.generation, reason, "Invalidating evaluation session");
        }
    }

    fn build(&mut self, sink: &DiagnosticSink) -> Result<Session, EvalFailure> {
        let generation = self.generation() + 1;
        let settings = EvaluatorSettings {
            symbols: self.symbols(),
            sink: sink.sender(),
        };
        debug!(generation, symbols = ?settings.symbols, "Building evaluation session");

        let mut evaluator = self.factory.create(settings)?;

        let subscription = self.catalog.subscribe();
        let mut tracker = ModuleTracker::new();
        for module in self.catalog.loaded() {
            tracker.register(evaluator.as_mut(), module, Origin::Static);
        }

        let imports = DEFAULT_IMPORTS
            .iter()
            .map(|s| s.to_string())
            .chain(self.options.extra_imports.iter().cloned());
        for namespace in imports {
            evaluator.evaluate(&format!("use {};", namespace))?;
        }

        self.generation.store(generation, Ordering::Release);
        Ok(Session {
            evaluator,
            tracker,
            subscription,
            generation,
        })
    }
}
