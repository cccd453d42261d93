//! Per-request diagnostic collection.

use std::sync::mpsc::{self, Receiver};

use glimpse_script::{Diagnostic, DiagnosticSender};

use crate::error::EvalFailure;

/// Collects diagnostics reported during one request.
///
/// The evaluator writes through a cloned [`DiagnosticSender`]; the dispatcher
/// clears the sink at the start of each request and drains it at the end.
#[derive(Debug)]
pub struct DiagnosticSink {
    tx: DiagnosticSender,
    rx: Receiver<Diagnostic>,
}

impl Default for DiagnosticSink {
    fn default() -> Self {
        Self::new()
    }
}

impl DiagnosticSink {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self { tx, rx }
    }

    pub fn sender(&self) -> DiagnosticSender {
        self.tx.clone()
    }

    /// Discard everything pending.
    pub fn clear(&self) {
        while self.rx.try_recv().is_ok() {}
    }

    pub fn add(&self, diagnostic: Diagnostic) {
        // The receiver lives as long as `self`, so this cannot fail.
        let _ = self.tx.send(diagnostic);
    }

    /// Record a failure as one error entry.
    pub fn error(&self, failure: &EvalFailure) {
        let mut diagnostic = Diagnostic::error(failure.message.clone());
        if let Some(detail) = &failure.detail {
            diagnostic = diagnostic.with_detail(detail.clone());
        }
        self.add(diagnostic);
    }

    /// Take every pending entry, in the order reported.
    pub fn drain(&self) -> Vec<Diagnostic> {
        self.rx.try_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glimpse_script::Severity;

    #[test]
    fn test_drain_keeps_order() {
        let sink = DiagnosticSink::new();
        sink.add(Diagnostic::info("one"));
        sink.sender().send(Diagnostic::warning("two")).unwrap();
        sink.error(&EvalFailure::recoverable("three").with_detail("trace"));

        let drained = sink.drain();
        let texts: Vec<_> = drained.iter().map(|d| d.text.as_str()).collect();
        assert_eq!(texts, vec!["one", "two", "three"]);
        assert_eq!(drained[2].severity, Severity::Error);
        assert_eq!(drained[2].detail.as_deref(), Some("trace"));
        assert!(sink.drain().is_empty());
    }

    #[test]
    fn test_clear_discards_pending() {
        let sink = DiagnosticSink::new();
        sink.add(Diagnostic::info("stale"));
        sink.clear();
        sink.add(Diagnostic::info("fresh"));
        let drained = sink.drain();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].text, "fresh");
    }
}
