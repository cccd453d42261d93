//! Glimpse live evaluation engine.
//!
//! Hosts hand [`EvaluationRequest`]s to a [`Dispatcher`] from any thread. The
//! dispatcher runs each one on the UI thread against a single persistent
//! session, one at a time, and returns an [`EvaluationResult`] with the
//! value and the diagnostics reported along the way. A session that suffers
//! a fatal failure is dropped and rebuilt on the next request.

mod diagnostics;
mod dispatcher;
mod error;
mod evaluator;
mod handlers;
mod markup;
mod modules;
mod options;
mod preview;
mod request;
mod session;
mod ui;

pub use diagnostics::DiagnosticSink;
pub use dispatcher::{Dispatcher, DispatcherBuilder};
pub use error::{EngineError, EvalFailure, FailureKind, MarkupError, Result};
pub use evaluator::{
    classify, Evaluator, EvaluatorFactory, EvaluatorSettings, ScriptEvaluator, ScriptEvaluatorFactory,
};
pub use handlers::{handle, handle_code, handle_markup, Handled};
pub use markup::{construct, EvaluatorInstanceFactory, InstanceFactory, MarkupLoader, XmlMarkupLoader, TEXT_PROPERTY};
pub use modules::{is_implicit, ModuleCatalog, ModuleSubscription, ModuleTracker, Origin, IMPLICIT_MODULES};
pub use options::EngineOptions;
pub use preview::{
    ErrorViewModel, PreviewSurface, Previewer, Screen, BINDING_CONTEXT_PROPERTY, CONTENT_PAGE, CONTENT_PROPERTY,
};
pub use request::{EvaluationRequest, EvaluationResult, RequestFields};
pub use session::{Session, SessionManager, SessionSlot, DEFAULT_IMPORTS, DEFAULT_SYMBOLS};
pub use ui::{UiLoop, UiScheduler, UiThread, UI_STACK_SIZE, UI_THREAD_NAME};

pub use tokio_util::sync::CancellationToken;
