//! Blocking future for load completion.

use crate::error::{MediaError, Result};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::Duration;

type Continuation = Box<dyn FnOnce(&Result<()>) + Send>;

#[derive(Default)]
struct Slot {
    result: Option<Result<()>>,
    continuations: Vec<Continuation>,
}

#[derive(Default)]
struct Shared {
    slot: Mutex<Slot>,
    ready: Condvar,
}

/// Completion of a load, shared by every caller that joined it.
///
/// Completion may happen on any thread. Continuations registered with
/// [`LoadFuture::on_complete`] run on the completing thread, or immediately
/// on the caller's thread when the future is already resolved.
#[derive(Clone, Default)]
pub struct LoadFuture {
    shared: Arc<Shared>,
}

impl LoadFuture {
    pub(crate) fn pending() -> Self {
        Self::default()
    }

    pub(crate) fn ready(result: Result<()>) -> Self {
        let future = Self::pending();
        future.complete(result);
        future
    }

    /// Resolve the future. Later calls are ignored.
    pub(crate) fn complete(&self, result: Result<()>) {
        let continuations = {
            let mut slot = self.shared.slot.lock();
            if slot.result.is_some() {
                return;
            }
            slot.result = Some(result.clone());
            std::mem::take(&mut slot.continuations)
        };

        for continuation in continuations {
            continuation(&result);
        }

        self.shared.ready.notify_all();
    }

    /// Run `f` once the future resolves.
    pub fn on_complete<F>(&self, f: F)
    where
        F: FnOnce(&Result<()>) + Send + 'static,
    {
        let resolved = {
            let mut slot = self.shared.slot.lock();
            match &slot.result {
                Some(result) => result.clone(),
                None => {
                    slot.continuations.push(Box::new(f));
                    return;
                }
            }
        };

        f(&resolved);
    }

    pub fn is_ready(&self) -> bool {
        self.shared.slot.lock().result.is_some()
    }

    pub fn try_result(&self) -> Option<Result<()>> {
        self.shared.slot.lock().result.clone()
    }

    /// Block until the future resolves.
    pub fn wait(&self) -> Result<()> {
        let mut slot = self.shared.slot.lock();
        loop {
            if let Some(result) = &slot.result {
                return result.clone();
            }
            self.shared.ready.wait(&mut slot);
        }
    }

    /// Block for at most `timeout`. Returns `None` on timeout.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Result<()>> {
        let mut slot = self.shared.slot.lock();
        if slot.result.is_none() {
            let _ = self.shared.ready.wait_for(&mut slot, timeout);
        }
        slot.result.clone()
    }
}

impl std::fmt::Debug for LoadFuture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadFuture")
            .field("result", &self.try_result())
            .finish()
    }
}

impl From<MediaError> for LoadFuture {
    fn from(error: MediaError) -> Self {
        LoadFuture::ready(Err(error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_ready_future() {
        let future = LoadFuture::ready(Ok(()));
        assert!(future.is_ready());
        assert_eq!(future.wait(), Ok(()));
    }

    #[test]
    fn test_completion_from_other_thread() {
        let future = LoadFuture::pending();
        let completer = future.clone();

        let worker = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            completer.complete(Err(MediaError::StreamingCancelled(7)));
        });

        assert_eq!(future.wait(), Err(MediaError::StreamingCancelled(7)));
        worker.join().unwrap();
    }

    #[test]
    fn test_continuations_run_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let future = LoadFuture::pending();

        let before = calls.clone();
        future.on_complete(move |_| {
            before.fetch_add(1, Ordering::SeqCst);
        });

        future.complete(Ok(()));
        future.complete(Err(MediaError::NoPayload(1)));

        let after = calls.clone();
        future.on_complete(move |result| {
            assert!(result.is_ok());
            after.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(future.try_result(), Some(Ok(())));
    }

    #[test]
    fn test_wait_timeout() {
        let future = LoadFuture::pending();
        assert_eq!(future.wait_timeout(Duration::from_millis(5)), None);
    }
}
