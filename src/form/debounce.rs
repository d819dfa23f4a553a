use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures::FutureExt;
use futures::future::{AbortHandle, Abortable, BoxFuture};
use futures::task::{Spawn, SpawnExt};
use futures_timer::Delay;

use super::error::{FormError, FormResult};

/// Executor for fire-and-forget form work.
pub type Spawner = Arc<dyn Spawn + Send + Sync>;

type DebouncedAction<A> = Arc<dyn Fn(A) -> BoxFuture<'static, ()> + Send + Sync>;

#[derive(Default)]
struct PendingCall {
    timer: Option<AbortHandle>,
    closed: bool,
}

/// Collapses bursts of calls into one trailing invocation with the latest
/// arguments. Only the timer is cancellable; a started action runs to the end.
pub struct Debouncer<A> {
    spawner: Spawner,
    delay: Duration,
    action: DebouncedAction<A>,
    pending: Mutex<PendingCall>,
}

impl<A> Debouncer<A>
where
    A: Send + 'static,
{
    pub fn new<F, Fut>(spawner: Spawner, delay: Duration, action: F) -> Self
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self {
            spawner,
            delay,
            action: Arc::new(move |args| action(args).boxed()),
            pending: Mutex::new(PendingCall::default()),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn call(&self, args: A) -> FormResult<()> {
        let mut pending = self.lock("scheduling debounced call")?;
        if pending.closed {
            tracing::debug!("debouncer closed, dropping call");
            return Ok(());
        }
        if let Some(timer) = pending.timer.take() {
            timer.abort();
        }

        let (handle, registration) = AbortHandle::new_pair();
        let timer = Abortable::new(Delay::new(self.delay), registration);
        let action = self.action.clone();
        self.spawner
            .spawn(async move {
                if timer.await.is_ok() {
                    action(args).await;
                }
            })
            .map_err(|error| FormError::Spawn(error.to_string()))?;
        pending.timer = Some(handle);
        tracing::debug!(delay_ms = self.delay.as_millis() as u64, "scheduled debounced call");
        Ok(())
    }

    pub fn cancel(&self) -> FormResult<()> {
        if let Some(timer) = self.lock("cancelling debounced call")?.timer.take() {
            timer.abort();
            tracing::debug!("cancelled pending debounced call");
        }
        Ok(())
    }

    /// Cancels the pending call and ignores every later one.
    pub fn close(&self) -> FormResult<()> {
        let mut pending = self.lock("closing debouncer")?;
        pending.closed = true;
        if let Some(timer) = pending.timer.take() {
            timer.abort();
        }
        Ok(())
    }

    pub fn is_closed(&self) -> FormResult<bool> {
        Ok(self.lock("reading debouncer state")?.closed)
    }

    fn lock(&self, context: &'static str) -> FormResult<MutexGuard<'_, PendingCall>> {
        self.pending
            .lock()
            .map_err(|_| FormError::StatePoisoned(context))
    }
}

impl<A> Drop for Debouncer<A> {
    fn drop(&mut self) {
        let pending = match self.pending.get_mut() {
            Ok(pending) => pending,
            Err(poisoned) => poisoned.into_inner(),
        };
        pending.closed = true;
        if let Some(timer) = pending.timer.take() {
            timer.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::ThreadPool;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    fn spawner() -> Spawner {
        Arc::new(ThreadPool::new().expect("thread pool"))
    }

    fn recording_debouncer(
        delay_ms: u64,
    ) -> (Debouncer<u32>, Arc<AtomicUsize>, Arc<Mutex<Vec<u32>>>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let debouncer = {
            let calls = calls.clone();
            let seen = seen.clone();
            Debouncer::new(spawner(), Duration::from_millis(delay_ms), move |value| {
                let calls = calls.clone();
                let seen = seen.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    seen.lock().expect("seen lock").push(value);
                }
            })
        };
        (debouncer, calls, seen)
    }

    #[test]
    fn burst_collapses_to_one_trailing_call_with_latest_args() {
        let (debouncer, calls, seen) = recording_debouncer(60);
        for value in 1..=4 {
            debouncer.call(value).expect("call");
            thread::sleep(Duration::from_millis(5));
        }
        thread::sleep(Duration::from_millis(250));

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(*seen.lock().expect("seen lock"), vec![4]);
    }

    #[test]
    fn calls_spaced_beyond_the_window_each_fire() {
        let (debouncer, calls, _) = recording_debouncer(10);
        debouncer.call(1).expect("first call");
        thread::sleep(Duration::from_millis(150));
        debouncer.call(2).expect("second call");
        thread::sleep(Duration::from_millis(150));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn closing_or_dropping_prevents_firing() {
        let (debouncer, calls, _) = recording_debouncer(40);
        debouncer.call(1).expect("call");
        debouncer.close().expect("close");
        debouncer.call(2).expect("calls after close are ignored");
        assert!(debouncer.is_closed().expect("closed flag"));

        let (dropped, dropped_calls, _) = recording_debouncer(40);
        dropped.call(1).expect("call");
        drop(dropped);

        thread::sleep(Duration::from_millis(200));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(dropped_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn cancel_drops_pending_call_but_keeps_accepting() {
        let (debouncer, calls, seen) = recording_debouncer(40);
        assert_eq!(debouncer.delay(), Duration::from_millis(40));
        debouncer.call(1).expect("call");
        debouncer.cancel().expect("cancel");
        debouncer.call(2).expect("call after cancel");
        thread::sleep(Duration::from_millis(200));

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(*seen.lock().expect("seen lock"), vec![2]);
    }
}
