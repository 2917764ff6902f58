//! Shutdown primitives.
//!
//! [Latch] is the stop signal of background loops: no message is ever sent, receivers wake up
//! when the sender is dropped. [DestroyOnce] guards the teardown that releases it.

use crossfire::{MAsyncRx, MTx, mpmc};
use parking_lot::Mutex;
use std::future::Future;

/// A one-way gate, opened by [Latch::release].
pub struct Latch {
    tx: Mutex<Option<MTx<()>>>,
    rx: MAsyncRx<()>,
}

impl Latch {
    pub fn new() -> Self {
        let (tx, rx) = mpmc::unbounded_async::<()>();
        Self { tx: Mutex::new(Some(tx)), rx }
    }

    /// Return true on the first call
    #[inline]
    pub fn release(&self) -> bool {
        self.tx.lock().take().is_some()
    }

    #[inline]
    pub fn is_released(&self) -> bool {
        self.tx.lock().is_none()
    }

    /// Resolve once released.
    #[inline]
    pub fn wait(&self) -> impl Future<Output = ()> + Send + '_ {
        async move {
            // recv only fails after the sender is gone
            let _ = self.rx.recv().await;
        }
    }

    /// A detached receiver for loops that outlive a borrow of the latch
    #[inline]
    pub fn subscribe(&self) -> MAsyncRx<()> {
        self.rx.clone()
    }
}

impl Default for Latch {
    fn default() -> Self {
        Self::new()
    }
}

enum DestroyState {
    Idle,
    /// Closed when the running teardown finishes or is cancelled
    Running(MAsyncRx<()>),
    Done,
}

/// Runs a teardown to completion exactly once.
///
/// The first caller runs the teardown, concurrent callers wait until it has completed. If the
/// running caller is dropped before the teardown finishes, one of the waiters (or the next
/// caller) runs its own teardown instead, so the teardown must tolerate a partial earlier run.
pub struct DestroyOnce {
    state: Mutex<DestroyState>,
}

enum Step {
    Wait(MAsyncRx<()>),
    Run(MTx<()>),
}

struct RunningGuard<'a> {
    state: &'a Mutex<DestroyState>,
    completed: bool,
    _tx: MTx<()>,
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        // waiters wake up after the state is settled, when _tx drops
        let mut state = self.state.lock();
        *state = if self.completed { DestroyState::Done } else { DestroyState::Idle };
    }
}

impl DestroyOnce {
    pub fn new() -> Self {
        Self { state: Mutex::new(DestroyState::Idle) }
    }

    /// True once a teardown is running or has completed
    #[inline]
    pub fn is_started(&self) -> bool {
        !matches!(*self.state.lock(), DestroyState::Idle)
    }

    #[inline]
    pub fn is_done(&self) -> bool {
        matches!(*self.state.lock(), DestroyState::Done)
    }

    /// Return true if this call ran the teardown to completion.
    pub async fn call_once<F, Fut>(&self, teardown: F) -> bool
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ()>,
    {
        loop {
            let step = {
                let mut state = self.state.lock();
                match *state {
                    DestroyState::Done => return false,
                    DestroyState::Running(ref rx) => Step::Wait(rx.clone()),
                    DestroyState::Idle => {
                        let (tx, rx) = mpmc::unbounded_async::<()>();
                        *state = DestroyState::Running(rx);
                        Step::Run(tx)
                    }
                }
            };
            match step {
                Step::Wait(rx) => {
                    let _ = rx.recv().await;
                }
                Step::Run(tx) => {
                    let mut guard = RunningGuard { state: &self.state, completed: false, _tx: tx };
                    teardown().await;
                    guard.completed = true;
                    return true;
                }
            }
        }
    }
}

impl Default for DestroyOnce {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_latch_release() {
        let latch = Arc::new(Latch::new());
        let rx = latch.subscribe();
        let _latch = latch.clone();
        let th = tokio::spawn(async move {
            _latch.wait().await;
            assert!(_latch.is_released());
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!latch.is_released());
        assert!(latch.release());
        assert!(!latch.release());
        th.await.expect("join");
        assert!(rx.recv().await.is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_destroy_once_concurrent() {
        let once = Arc::new(DestroyOnce::new());
        let runs = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let once = once.clone();
            let runs = runs.clone();
            handles.push(tokio::spawn(async move {
                let ran = once
                    .call_once(|| async {
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        runs.fetch_add(1, Ordering::SeqCst);
                    })
                    .await;
                // every caller observes the completed teardown
                assert_eq!(runs.load(Ordering::SeqCst), 1);
                ran
            }));
        }
        let mut ran = 0;
        for h in handles {
            if h.await.expect("join") {
                ran += 1;
            }
        }
        assert_eq!(ran, 1);
        assert!(once.is_done());
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_destroy_once_first_caller_cancelled() {
        let once = Arc::new(DestroyOnce::new());
        let runs = Arc::new(AtomicUsize::new(0));
        let slow = once.call_once(|| async {
            tokio::time::sleep(Duration::from_millis(500)).await;
            runs.fetch_add(1, Ordering::SeqCst);
        });
        assert!(tokio::time::timeout(Duration::from_millis(20), slow).await.is_err());
        assert!(!once.is_started());

        // a waiter blocked behind a cancelled caller takes over
        let _once = once.clone();
        let _runs = runs.clone();
        let slow = tokio::spawn(async move {
            _once
                .call_once(|| async {
                    tokio::time::sleep(Duration::from_secs(10)).await;
                    _runs.fetch_add(1, Ordering::SeqCst);
                })
                .await
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(once.is_started());
        let _once = once.clone();
        let _runs = runs.clone();
        let waiter = tokio::spawn(async move {
            _once
                .call_once(|| async {
                    _runs.fetch_add(1, Ordering::SeqCst);
                })
                .await
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        slow.abort();
        let ran = tokio::time::timeout(Duration::from_secs(2), waiter)
            .await
            .expect("waiter finished")
            .expect("join");
        assert!(ran);
        assert!(once.is_done());
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(!once.call_once(|| async {}).await);
    }
}
