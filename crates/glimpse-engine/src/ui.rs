//! The UI thread: a work queue bound to one thread, plus a blocking way for
//! other threads to run work on it.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::error::EngineError;

/// Name of the thread started by [`UiThread::spawn`].
pub const UI_THREAD_NAME: &str = "glimpse-ui";

/// Stack reserved for the UI thread. Script evaluation recurses on it.
pub const UI_STACK_SIZE: usize = 64 * 1024 * 1024;

/// How often a blocked caller re-checks cancellation and its deadline.
const POLL_INTERVAL: Duration = Duration::from_millis(5);

// Job states for `invoke`. A job moves from PENDING to RUNNING when the UI
// thread picks it up, or to ABANDONED when the caller gives up first.
const PENDING: u8 = 0;
const RUNNING: u8 = 1;
const ABANDONED: u8 = 2;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Handle for queueing work onto the UI thread. Cheap to clone.
#[derive(Debug, Clone)]
pub struct UiScheduler {
    tx: Sender<Job>,
    thread: Arc<OnceLock<ThreadId>>,
}

/// The receiving end, run by whichever thread the host makes its UI thread.
/// That thread needs a stack of [`UI_STACK_SIZE`] for deep scripts.
#[derive(Debug)]
pub struct UiLoop {
    rx: Receiver<Job>,
    thread: Arc<OnceLock<ThreadId>>,
}

impl UiLoop {
    pub fn new() -> (UiScheduler, UiLoop) {
        let (tx, rx) = mpsc::channel();
        let thread = Arc::new(OnceLock::new());
        (
            UiScheduler {
                tx,
                thread: thread.clone(),
            },
            UiLoop { rx, thread },
        )
    }

    /// Bind the loop to the current thread and run jobs until every
    /// scheduler is dropped. A panicking job is logged and the loop goes on.
    pub fn run(self) {
        let current = thread::current();
        if self.thread.set(current.id()).is_err() {
            error!("UI loop is already bound to a thread");
            return;
        }
        debug!(thread = current.name().unwrap_or("unnamed"), "UI loop started");

        for job in self.rx.iter() {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(job)) {
                error!(panic = %panic_message(payload.as_ref()), "UI job panicked");
            }
        }

        debug!("UI loop stopped");
    }
}

/// A UI loop running on its own named thread.
#[derive(Debug)]
pub struct UiThread {
    handle: JoinHandle<()>,
}

impl UiThread {
    pub fn spawn() -> std::io::Result<(UiScheduler, UiThread)> {
        let (scheduler, ui_loop) = UiLoop::new();
        let handle = thread::Builder::new()
            .name(UI_THREAD_NAME.to_string())
            .stack_size(UI_STACK_SIZE)
            .spawn(move || ui_loop.run())?;
        Ok((scheduler, UiThread { handle }))
    }

    /// Wait for the loop to stop. It stops once every scheduler is dropped.
    pub fn join(self) -> thread::Result<()> {
        self.handle.join()
    }
}

impl UiScheduler {
    /// Whether the caller is the UI thread.
    pub fn is_ui_thread(&self) -> bool {
        self.thread.get() == Some(&thread::current().id())
    }

    /// Queue `job` without waiting for it.
    pub fn schedule<F>(&self, job: F) -> Result<(), EngineError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.tx
            .send(Box::new(job))
            .map_err(|_| EngineError::UiThreadGone)
    }

    /// Run `f` on the UI thread and block until it returns.
    ///
    /// If `token` is cancelled before `f` starts, `f` never runs and the
    /// result is [`EngineError::Cancelled`]. Once `f` has started the caller
    /// waits for it regardless. With a `timeout`, the caller stops waiting
    /// after that long; `f` is skipped if it has not started yet.
    ///
    /// Called on the UI thread itself, `f` runs inline.
    pub fn invoke<T, F>(
        &self,
        f: F,
        token: &CancellationToken,
        timeout: Option<Duration>,
    ) -> Result<T, EngineError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        if token.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        if self.is_ui_thread() {
            return Ok(f());
        }

        let state = Arc::new(AtomicU8::new(PENDING));
        let (done_tx, done_rx) = mpsc::sync_channel(1);

        let job_state = state.clone();
        let job_token = token.clone();
        self.schedule(move || {
            if job_token.is_cancelled() {
                let _ = job_state.compare_exchange(PENDING, ABANDONED, Ordering::AcqRel, Ordering::Acquire);
            }
            if job_state
                .compare_exchange(PENDING, RUNNING, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                return;
            }
            let _ = done_tx.send(f());
        })?;

        let deadline = timeout.map(|t| (t, Instant::now() + t));
        loop {
            match done_rx.recv_timeout(POLL_INTERVAL) {
                Ok(value) => return Ok(value),
                Err(RecvTimeoutError::Disconnected) => {
                    // The job was dropped without producing a value.
                    return Err(match state.load(Ordering::Acquire) {
                        ABANDONED => EngineError::Cancelled,
                        RUNNING => EngineError::JobPanicked,
                        _ => EngineError::UiThreadGone,
                    });
                }
                Err(RecvTimeoutError::Timeout) => {
                    if token.is_cancelled() && abandon(&state) {
                        return Err(EngineError::Cancelled);
                    }
                    if let Some((timeout, deadline)) = deadline {
                        if Instant::now() >= deadline {
                            abandon(&state);
                            return Err(EngineError::TimedOut(timeout));
                        }
                    }
                }
            }
        }
    }
}

/// Mark a job abandoned. Fails if it already started.
fn abandon(state: &AtomicU8) -> bool {
    state
        .compare_exchange(PENDING, ABANDONED, Ordering::AcqRel, Ordering::Acquire)
        .is_ok()
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    #[test]
    fn test_invoke_runs_on_ui_thread() {
        let (scheduler, ui) = UiThread::spawn().unwrap();
        let name = scheduler
            .invoke(
                || thread::current().name().map(str::to_string),
                &CancellationToken::new(),
                None,
            )
            .unwrap();
        assert_eq!(name.as_deref(), Some(UI_THREAD_NAME));
        assert!(!scheduler.is_ui_thread());
        drop(scheduler);
        ui.join().unwrap();
    }

    #[test]
    fn test_invoke_from_ui_thread_is_inline() {
        let (scheduler, _ui) = UiThread::spawn().unwrap();
        let inner = scheduler.clone();
        let nested = scheduler
            .invoke(
                move || {
                    let token = CancellationToken::new();
                    inner.invoke(|| 7, &token, None)
                },
                &CancellationToken::new(),
                None,
            )
            .unwrap();
        assert_eq!(nested, Ok(7));
    }

    #[test]
    fn test_cancelled_job_never_runs() {
        let (scheduler, ui_loop) = UiLoop::new();
        let ran = Arc::new(AtomicBool::new(false));
        let token = CancellationToken::new();

        // Nothing is running the loop yet, so the job stays queued.
        let flag = ran.clone();
        let canceller = token.clone();
        let waiter = thread::spawn(move || {
            scheduler.invoke(move || flag.store(true, Ordering::SeqCst), &token, None)
        });
        thread::sleep(Duration::from_millis(20));
        canceller.cancel();

        assert_eq!(waiter.join().unwrap(), Err(EngineError::Cancelled));
        ui_loop.run();
        assert!(!ran.load(Ordering::SeqCst));
    }

    #[test]
    fn test_timeout_while_queued() {
        let (scheduler, ui_loop) = UiLoop::new();
        let result = scheduler.invoke(|| (), &CancellationToken::new(), Some(Duration::from_millis(20)));
        assert_eq!(result, Err(EngineError::TimedOut(Duration::from_millis(20))));
        drop(scheduler);
        ui_loop.run();
    }

    #[test]
    fn test_loop_gone() {
        let (scheduler, ui_loop) = UiLoop::new();
        drop(ui_loop);
        assert_eq!(
            scheduler.invoke(|| (), &CancellationToken::new(), None),
            Err(EngineError::UiThreadGone)
        );
    }

    #[test]
    fn test_loop_survives_panicking_job() {
        let (scheduler, _ui) = UiThread::spawn().unwrap();
        let token = CancellationToken::new();
        let result: Result<(), _> = scheduler.invoke(|| panic!("job failed"), &token, None);
        assert_eq!(result, Err(EngineError::JobPanicked));
        assert_eq!(scheduler.invoke(|| 1, &token, None), Ok(1));
    }
}
