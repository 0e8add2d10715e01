//! Background execution of one long-running task at a time.
//!
//! The task runs on its own worker thread with a current-thread runtime,
//! so the caller's thread stays free. Each spawn reports exactly one
//! [`TaskEvent`], whether the task returned an error or panicked.

use crate::error::error_chain;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, error};

/// Callback type for task completion.
pub type OnCompleteCallback<T> = Box<dyn FnOnce(TaskEvent<T>) + Send + 'static>;

/// Outcome of one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskEvent<T> {
    Succeeded(T),
    Failed {
        message: String,
        /// Error source chain, or the panic payload.
        trace: String,
    },
}

/// Why a task could not be started.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("A task is already running")]
    Busy,
    #[error("Failed to start worker thread: {0}")]
    ThreadSpawn(#[from] std::io::Error),
}

/// Completion handle for a spawned task.
#[derive(Debug)]
pub struct TaskHandle<T> {
    rx: oneshot::Receiver<TaskEvent<T>>,
}

impl<T> TaskHandle<T> {
    /// Wait for the task's single event.
    pub async fn wait(self) -> TaskEvent<T> {
        self.rx.await.unwrap_or_else(|_| TaskEvent::Failed {
            message: "worker exited without reporting".to_string(),
            trace: String::new(),
        })
    }
}

/// Runs at most one task at a time.
#[derive(Debug, Clone, Default)]
pub struct TaskRunner {
    busy: Arc<AtomicBool>,
}

/// Clears the busy flag when the worker finishes, panic or not.
struct BusyReset(Arc<AtomicBool>);

impl Drop for BusyReset {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl TaskRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a task is in flight.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Start `make_future()` on a worker thread.
    ///
    /// The future is built on the worker, so it need not be `Send`.
    pub fn try_spawn<F, Fut, T, E>(&self, make_future: F) -> Result<TaskHandle<T>, RunnerError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + 'static,
        T: Send + 'static,
        E: std::error::Error + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.spawn_inner(make_future, move |event| {
            // The receiver may have been dropped; nothing else to report to.
            let _ = tx.send(event);
        })?;
        Ok(TaskHandle { rx })
    }

    /// Start `make_future()` and hand its event to `on_complete` on the worker thread.
    pub fn try_spawn_with_callback<F, Fut, T, E>(
        &self,
        make_future: F,
        on_complete: OnCompleteCallback<T>,
    ) -> Result<(), RunnerError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + 'static,
        T: Send + 'static,
        E: std::error::Error + 'static,
    {
        self.spawn_inner(make_future, on_complete)
    }

    fn spawn_inner<F, Fut, T, E, D>(&self, make_future: F, deliver: D) -> Result<(), RunnerError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + 'static,
        T: Send + 'static,
        E: std::error::Error + 'static,
        D: FnOnce(TaskEvent<T>) + Send + 'static,
    {
        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(RunnerError::Busy);
        }

        let busy = Arc::clone(&self.busy);
        let spawned = thread::Builder::new()
            .name("meetgraph-task".to_string())
            .spawn(move || {
                let reset = BusyReset(busy);
                let event = run_to_event(make_future);
                drop(reset);
                deliver(event);
            });

        match spawned {
            Ok(_) => {
                debug!("Task worker started");
                Ok(())
            }
            Err(e) => {
                self.busy.store(false, Ordering::SeqCst);
                Err(RunnerError::ThreadSpawn(e))
            }
        }
    }
}

fn run_to_event<F, Fut, T, E>(make_future: F) -> TaskEvent<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::error::Error + 'static,
{
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!("Failed to build task runtime: {}", e);
            return TaskEvent::Failed {
                message: format!("Failed to build task runtime: {e}"),
                trace: String::new(),
            };
        }
    };

    match catch_unwind(AssertUnwindSafe(|| runtime.block_on(make_future()))) {
        Ok(Ok(value)) => TaskEvent::Succeeded(value),
        Ok(Err(e)) => {
            let trace = error_chain(&e);
            error!("Task failed: {}", trace);
            TaskEvent::Failed {
                message: e.to_string(),
                trace,
            }
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            error!("Task panicked: {}", message);
            TaskEvent::Failed {
                trace: format!("panicked at: {message}"),
                message,
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;

    #[derive(Debug, Error)]
    #[error("outer failure")]
    struct Outer(#[source] std::io::Error);

    #[tokio::test]
    async fn test_success_event() {
        let runner = TaskRunner::new();
        let handle = runner
            .try_spawn(|| async { Ok::<_, std::io::Error>(42) })
            .unwrap();
        assert_eq!(handle.wait().await, TaskEvent::Succeeded(42));
        assert!(!runner.is_busy());
    }

    #[tokio::test]
    async fn test_error_event_has_chain() {
        let runner = TaskRunner::new();
        let handle = runner
            .try_spawn(|| async {
                Err::<(), _>(Outer(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "inner cause",
                )))
            })
            .unwrap();
        match handle.wait().await {
            TaskEvent::Failed { message, trace } => {
                assert_eq!(message, "outer failure");
                assert!(trace.contains("inner cause"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_panic_becomes_failure() {
        let runner = TaskRunner::new();
        let handle = runner
            .try_spawn(|| async {
                if true {
                    panic!("boom");
                }
                Ok::<(), std::io::Error>(())
            })
            .unwrap();
        match handle.wait().await {
            TaskEvent::Failed { message, .. } => assert_eq!(message, "boom"),
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(!runner.is_busy());
    }

    #[tokio::test]
    async fn test_busy_while_in_flight() {
        let runner = TaskRunner::new();
        let (release_tx, release_rx) = oneshot::channel::<()>();
        let handle = runner
            .try_spawn(move || async move {
                let _ = release_rx.await;
                Ok::<_, std::io::Error>("done")
            })
            .unwrap();

        assert!(runner.is_busy());
        assert!(matches!(
            runner.try_spawn(|| async { Ok::<_, std::io::Error>("second") }),
            Err(RunnerError::Busy)
        ));

        release_tx.send(()).unwrap();
        assert_eq!(handle.wait().await, TaskEvent::Succeeded("done"));

        let again = runner
            .try_spawn(|| async { Ok::<_, std::io::Error>("third") })
            .unwrap();
        assert_eq!(again.wait().await, TaskEvent::Succeeded("third"));
    }

    #[test]
    fn test_callback_called_once() {
        let runner = TaskRunner::new();
        let (tx, rx) = mpsc::channel();
        runner
            .try_spawn_with_callback(
                || async { Ok::<_, std::io::Error>(7) },
                Box::new(move |event| {
                    tx.send(event).unwrap();
                }),
            )
            .unwrap();

        let event = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(event, TaskEvent::Succeeded(7));
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    }
}
