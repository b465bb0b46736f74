//! Debounced render scheduling
//!
//! Coalesces bursts of edit notifications into a single callback that
//! fires once the input has been quiet for a fixed period. The timer
//! mechanism is abstracted behind [`Timer`]; [`TokioTimer`] is the
//! runtime implementation.
//!
//! At most one timer is pending at a time. Every scheduled timer carries
//! a token id that is checked under the state lock when it fires, so a
//! timer that was superseded or cancelled never runs the callback, even
//! if it was already in flight.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::error::PreviewError;

/// Work scheduled on a timer
pub type TimerTask = Box<dyn FnOnce() + Send + 'static>;

/// Callback invoked with the revision that triggered a debounced fire
pub type FireCallback = Arc<dyn Fn(u64) + Send + Sync + 'static>;

/// Cancellable delayed execution.
///
/// `schedule` must not run the task before returning.
pub trait Timer: Send + Sync + 'static {
    type Token: Send + 'static;

    /// Run `task` after `delay`
    fn schedule(&self, delay: Duration, task: TimerTask) -> Self::Token;

    /// Prevent a scheduled task from running, if it has not started
    fn cancel(&self, token: Self::Token);
}

/// Timer backed by tokio tasks
#[derive(Debug, Clone)]
pub struct TokioTimer {
    handle: Handle,
}

impl TokioTimer {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Use the runtime of the calling context
    pub fn current() -> Result<Self, PreviewError> {
        Handle::try_current()
            .map(Self::new)
            .map_err(|e| PreviewError::NoRuntime(e.to_string()))
    }
}

impl Timer for TokioTimer {
    type Token = JoinHandle<()>;

    fn schedule(&self, delay: Duration, task: TimerTask) -> Self::Token {
        self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            task();
        })
    }

    fn cancel(&self, token: Self::Token) {
        token.abort();
    }
}

enum State<Token> {
    Idle,
    Pending {
        id: u64,
        revision: u64,
        token: Token,
    },
}

struct Inner<Token> {
    state: State<Token>,
    next_id: u64,
}

type Shared<Token> = Arc<Mutex<Inner<Token>>>;

fn lock<Token>(shared: &Shared<Token>) -> MutexGuard<'_, Inner<Token>> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Idle/Pending debounce state machine
pub struct DebounceScheduler<T: Timer = TokioTimer> {
    timer: T,
    quiet_period: Duration,
    callback: FireCallback,
    shared: Shared<T::Token>,
}

impl DebounceScheduler<TokioTimer> {
    /// Create a scheduler on the current tokio runtime
    pub fn new_current(
        quiet_period: Duration,
        callback: impl Fn(u64) + Send + Sync + 'static,
    ) -> Result<Self, PreviewError> {
        Ok(Self::new(TokioTimer::current()?, quiet_period, callback))
    }
}

impl<T: Timer> DebounceScheduler<T> {
    pub fn new(
        timer: T,
        quiet_period: Duration,
        callback: impl Fn(u64) + Send + Sync + 'static,
    ) -> Self {
        Self {
            timer,
            quiet_period,
            callback: Arc::new(callback),
            shared: Arc::new(Mutex::new(Inner {
                state: State::Idle,
                next_id: 0,
            })),
        }
    }

    /// Quiet period before a pending notification fires
    pub fn quiet_period(&self) -> Duration {
        self.quiet_period
    }

    /// Record a change. Replaces any pending timer with a fresh one.
    pub fn notify(&self, revision: u64) {
        let mut inner = lock(&self.shared);
        inner.next_id += 1;
        let id = inner.next_id;

        if let State::Pending { token, .. } = std::mem::replace(&mut inner.state, State::Idle) {
            self.timer.cancel(token);
        }

        let shared = Arc::clone(&self.shared);
        let callback = Arc::clone(&self.callback);
        let token = self.timer.schedule(
            self.quiet_period,
            Box::new(move || fire(&shared, &callback, id)),
        );
        inner.state = State::Pending {
            id,
            revision,
            token,
        };
    }

    /// Fire a pending timer now. Returns false when idle.
    pub fn flush(&self) -> bool {
        match self.take_pending() {
            Some(revision) => {
                (self.callback)(revision);
                true
            }
            None => false,
        }
    }

    /// Drop a pending timer without firing. Returns false when idle.
    pub fn cancel(&self) -> bool {
        self.take_pending().is_some()
    }

    /// Whether a timer is pending
    pub fn is_pending(&self) -> bool {
        matches!(lock(&self.shared).state, State::Pending { .. })
    }

    /// Revision the pending timer will fire with
    pub fn pending_revision(&self) -> Option<u64> {
        match lock(&self.shared).state {
            State::Pending { revision, .. } => Some(revision),
            State::Idle => None,
        }
    }

    fn take_pending(&self) -> Option<u64> {
        let mut inner = lock(&self.shared);
        match std::mem::replace(&mut inner.state, State::Idle) {
            State::Pending {
                revision, token, ..
            } => {
                self.timer.cancel(token);
                Some(revision)
            }
            State::Idle => None,
        }
    }
}

impl<T: Timer> Drop for DebounceScheduler<T> {
    fn drop(&mut self) {
        if self.cancel() {
            log::debug!("Debounce scheduler dropped with a pending timer");
        }
    }
}

/// Timer body: only the current token may fire
fn fire<Token>(shared: &Shared<Token>, callback: &FireCallback, id: u64) {
    let revision = {
        let mut inner = lock(shared);
        let revision = match inner.state {
            State::Pending {
                id: pending_id,
                revision,
                ..
            } if pending_id == id => revision,
            _ => return,
        };
        inner.state = State::Idle;
        revision
    };
    callback(revision);
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    fn recording_scheduler(quiet_ms: u64) -> (DebounceScheduler, Arc<Mutex<Vec<u64>>>) {
        let fired = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&fired);
        let scheduler = DebounceScheduler::new_current(Duration::from_millis(quiet_ms), move |rev| {
            sink.lock().unwrap().push(rev)
        })
        .unwrap();
        (scheduler, fired)
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_fires_once_with_last_revision() {
        let (scheduler, fired) = recording_scheduler(100);
        for rev in 1..=5 {
            scheduler.notify(rev);
            sleep(Duration::from_millis(50)).await;
        }
        assert!(fired.lock().unwrap().is_empty());
        sleep(Duration::from_millis(200)).await;
        assert_eq!(*fired.lock().unwrap(), vec![5]);
        assert!(!scheduler.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_spaced_notifications_fire_each() {
        let (scheduler, fired) = recording_scheduler(100);
        for rev in 1..=4 {
            scheduler.notify(rev);
            sleep(Duration::from_millis(150)).await;
        }
        assert_eq!(*fired.lock().unwrap(), vec![1, 2, 3, 4]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_fires_immediately() {
        let (scheduler, fired) = recording_scheduler(100);
        assert!(!scheduler.flush());
        scheduler.notify(7);
        assert_eq!(scheduler.pending_revision(), Some(7));
        assert!(scheduler.flush());
        assert_eq!(*fired.lock().unwrap(), vec![7]);
        sleep(Duration::from_millis(300)).await;
        assert_eq!(*fired.lock().unwrap(), vec![7]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_fire() {
        let (scheduler, fired) = recording_scheduler(100);
        scheduler.notify(1);
        assert!(scheduler.cancel());
        assert!(!scheduler.cancel());
        sleep(Duration::from_millis(300)).await;
        assert!(fired.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels_pending() {
        let (scheduler, fired) = recording_scheduler(100);
        scheduler.notify(1);
        drop(scheduler);
        sleep(Duration::from_millis(300)).await;
        assert!(fired.lock().unwrap().is_empty());
    }

    /// Timer that never cancels and runs tasks on demand, standing in
    /// for a timer that fires after it was superseded
    #[derive(Default, Clone)]
    struct LeakyTimer {
        tasks: Arc<Mutex<Vec<TimerTask>>>,
    }

    impl LeakyTimer {
        fn run_all(&self) {
            let tasks: Vec<TimerTask> = self.tasks.lock().unwrap().drain(..).collect();
            for task in tasks {
                task();
            }
        }
    }

    impl Timer for LeakyTimer {
        type Token = ();

        fn schedule(&self, _delay: Duration, task: TimerTask) {
            self.tasks.lock().unwrap().push(task);
        }

        fn cancel(&self, _token: ()) {}
    }

    #[test]
    fn test_superseded_timer_never_fires() {
        let timer = LeakyTimer::default();
        let fired = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&fired);
        let scheduler = DebounceScheduler::new(timer.clone(), Duration::from_millis(100), move |rev| {
            sink.lock().unwrap().push(rev)
        });

        scheduler.notify(1);
        scheduler.notify(2);
        scheduler.notify(3);
        timer.run_all();
        assert_eq!(*fired.lock().unwrap(), vec![3]);

        scheduler.notify(4);
        scheduler.cancel();
        timer.run_all();
        assert_eq!(*fired.lock().unwrap(), vec![3]);
    }

    #[test]
    fn test_no_runtime_is_error() {
        let result = DebounceScheduler::new_current(Duration::from_millis(10), |_| {});
        assert!(matches!(result, Err(PreviewError::NoRuntime(_))));
    }
}
