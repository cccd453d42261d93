//! The thread-safe entry point: marshal each request onto the UI thread and
//! run it there with exclusive access to the session.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use glimpse_script::Diagnostic;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::diagnostics::DiagnosticSink;
use crate::error::{EngineError, EvalFailure};
use crate::evaluator::{EvaluatorFactory, ScriptEvaluatorFactory};
use crate::handlers::{self, Handled};
use crate::markup::{MarkupLoader, XmlMarkupLoader};
use crate::modules::ModuleCatalog;
use crate::options::EngineOptions;
use crate::request::{EvaluationRequest, EvaluationResult};
use crate::session::SessionManager;
use crate::ui::{panic_message, UiScheduler};

/// Everything only the UI thread touches.
struct EngineState {
    sessions: SessionManager,
    sink: DiagnosticSink,
    markup: Arc<dyn MarkupLoader>,
}

/// Evaluates requests on the UI thread, one at a time.
///
/// `evaluate` may be called from any thread. Callers queue on a gate and
/// complete in the order they acquired it.
pub struct Dispatcher {
    gate: Mutex<()>,
    state: Arc<Mutex<EngineState>>,
    scheduler: UiScheduler,
    catalog: ModuleCatalog,
    generation: Arc<AtomicU64>,
    timeout: Option<Duration>,
}

pub struct DispatcherBuilder {
    scheduler: UiScheduler,
    factory: Arc<dyn EvaluatorFactory>,
    catalog: ModuleCatalog,
    options: EngineOptions,
    markup: Arc<dyn MarkupLoader>,
}

impl DispatcherBuilder {
    pub fn factory(mut self, factory: Arc<dyn EvaluatorFactory>) -> Self {
        self.factory = factory;
        self
    }

    pub fn catalog(mut self, catalog: ModuleCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn markup_loader(mut self, loader: Arc<dyn MarkupLoader>) -> Self {
        self.markup = loader;
        self
    }

    pub fn build(self) -> Dispatcher {
        let timeout = self.options.timeout();
        let sessions = SessionManager::new(self.factory, self.catalog.clone(), self.options);
        let generation = sessions.generation_counter();
        let state = EngineState {
            sessions,
            sink: DiagnosticSink::new(),
            markup: self.markup,
        };
        Dispatcher {
            gate: Mutex::new(()),
            state: Arc::new(Mutex::new(state)),
            scheduler: self.scheduler,
            catalog: self.catalog,
            generation,
            timeout,
        }
    }
}

impl Dispatcher {
    pub fn builder(scheduler: UiScheduler) -> DispatcherBuilder {
        DispatcherBuilder {
            scheduler,
            factory: Arc::new(ScriptEvaluatorFactory::new()),
            catalog: ModuleCatalog::new(),
            options: EngineOptions::default(),
            markup: Arc::new(XmlMarkupLoader),
        }
    }

    pub fn new(scheduler: UiScheduler, catalog: ModuleCatalog, options: EngineOptions) -> Self {
        Self::builder(scheduler).catalog(catalog).options(options).build()
    }

    pub fn scheduler(&self) -> &UiScheduler {
        &self.scheduler
    }

    pub fn catalog(&self) -> &ModuleCatalog {
        &self.catalog
    }

    /// Number of sessions built so far.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Evaluate `request` on the UI thread and wait for the result.
    ///
    /// Failures inside the evaluation are reported as error diagnostics in
    /// the result. `Err` only means the request never got a result:
    /// cancelled before it started, timed out, or no UI thread.
    pub fn evaluate(
        &self,
        request: EvaluationRequest,
        token: &CancellationToken,
    ) -> Result<EvaluationResult, EngineError> {
        // The UI thread skips the gate: the caller holding it may be waiting
        // on the UI thread.
        let _gate = if self.scheduler.is_ui_thread() {
            None
        } else {
            Some(self.gate.lock().unwrap_or_else(PoisonError::into_inner))
        };

        let state = self.state.clone();
        self.scheduler.invoke(
            move || {
                panic::catch_unwind(AssertUnwindSafe(|| run_exclusive(&state, &request)))
                    .unwrap_or_else(|payload| {
                        let message = format!("evaluation aborted: {}", panic_message(payload.as_ref()));
                        error!(%message, "Evaluation panicked outside the handler");
                        EvaluationResult {
                            messages: vec![Diagnostic::error(message)],
                            duration: Duration::ZERO,
                            value: None,
                        }
                    })
            },
            token,
            self.timeout,
        )
    }
}

/// Lock the engine state. A poisoned lock means a previous request died
/// half way, so the session is thrown away.
fn lock_state(state: &Mutex<EngineState>) -> MutexGuard<'_, EngineState> {
    match state.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            let mut guard = poisoned.into_inner();
            state.clear_poison();
            guard.sessions.invalidate("engine state lock poisoned");
            guard
        }
    }
}

fn run_exclusive(state: &Mutex<EngineState>, request: &EvaluationRequest) -> EvaluationResult {
    let mut guard = lock_state(state);
    let EngineState {
        sessions,
        sink,
        markup,
    } = &mut *guard;

    let current = thread::current();
    let thread_name = current.name().unwrap_or("unnamed");

    let ready = sessions.ensure_ready(sink);
    debug!(thread = thread_name, "Evaluation started");
    sink.clear();
    let start = Instant::now();

    let handled = match ready {
        Ok(session) => {
            let evaluator = session.evaluator();
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                handlers::handle(request, evaluator, sink, &**markup)
            }));
            outcome.unwrap_or_else(|payload| {
                let failure = EvalFailure::fatal(format!(
                    "evaluator panicked: {}",
                    panic_message(payload.as_ref())
                ));
                error!(error = %failure, "Evaluator panicked");
                sink.error(&failure);
                Handled {
                    value: None,
                    corrupted: true,
                }
            })
        }
        Err(failure) => {
            error!(error = %failure, "Failed to build evaluation session");
            sink.error(&failure);
            Handled {
                value: None,
                corrupted: failure.is_fatal(),
            }
        }
    };

    let duration = start.elapsed();
    if handled.corrupted {
        sessions.invalidate("fatal evaluation failure");
    }
    debug!(thread = thread_name, ?duration, "Evaluation finished");

    EvaluationResult {
        messages: sink.drain(),
        duration,
        value: handled.value,
    }
}
