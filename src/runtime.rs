//! Runtime abstraction layer for async operations
//!
//! This module provides runtime-agnostic interfaces for spawning tasks and
//! arming timers, so the editor can run on Tokio in production and on a
//! manually driven scheduler in deterministic tests.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use futures::future::BoxFuture;

use crate::input::events::{EditorEvent, EventSender, TimerToken};

/// A trait for spawning async tasks (object-safe version)
pub trait AsyncSpawner: Send + Sync + 'static {
    /// Spawn a future and return a handle to it
    fn spawn_boxed(&self, future: BoxFuture<'static, ()>) -> Box<dyn AsyncHandle>;
}

/// Handle to a spawned async task or armed timer
pub trait AsyncHandle: Send + Sync {
    /// Check if the task is finished
    fn is_finished(&self) -> bool;

    /// Cancel the task
    fn cancel(&self);
}

/// Convenience function for spawning with type safety
pub fn spawn<F>(future: F) -> Box<dyn AsyncHandle>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    runtime().spawn_boxed(Box::pin(future))
}

/// Default spawner implementations
pub mod spawners {
    use super::*;

    pub mod tokio_impl {
        use super::*;
        use ::tokio::task::JoinHandle;

        /// Tokio-based async spawner
        pub struct TokioSpawner;

        impl AsyncSpawner for TokioSpawner {
            fn spawn_boxed(&self, future: BoxFuture<'static, ()>) -> Box<dyn AsyncHandle> {
                let handle = ::tokio::spawn(future);
                Box::new(TokioHandle(handle))
            }
        }

        struct TokioHandle(JoinHandle<()>);

        impl AsyncHandle for TokioHandle {
            fn is_finished(&self) -> bool {
                self.0.is_finished()
            }

            fn cancel(&self) {
                self.0.abort();
            }
        }
    }
}

/// Async delay on the active runtime
pub async fn async_delay(duration: Duration) {
    tokio::time::sleep(duration).await;
}

/// Arms one-shot timers that report back as [`EditorEvent::Timer`].
pub trait TimerScheduler: Send + Sync {
    fn schedule(&self, delay: Duration, token: TimerToken) -> Box<dyn AsyncHandle>;
}

/// Production scheduler: a spawned sleep that posts the token on the
/// session's event channel. Cancelling aborts the sleeping task.
#[derive(Debug, Clone)]
pub struct ChannelTimer {
    events: EventSender,
}

impl ChannelTimer {
    pub fn new(events: EventSender) -> Self {
        Self { events }
    }
}

impl TimerScheduler for ChannelTimer {
    fn schedule(&self, delay: Duration, token: TimerToken) -> Box<dyn AsyncHandle> {
        let events = self.events.clone();
        spawn(async move {
            async_delay(delay).await;
            if events.send(EditorEvent::Timer(token)).is_err() {
                log::debug!("timer {:?} elapsed after its session closed", token);
            }
        })
    }
}

#[derive(Debug)]
struct ManualTimer {
    delay: Duration,
    token: TimerToken,
    cancelled: Arc<AtomicBool>,
    fired: Arc<AtomicBool>,
}

#[derive(Debug)]
struct ManualHandle {
    cancelled: Arc<AtomicBool>,
    fired: Arc<AtomicBool>,
}

impl AsyncHandle for ManualHandle {
    fn is_finished(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst) || self.fired.load(Ordering::SeqCst)
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}

/// Scheduler that only records timers. The owner decides when they fire, which
/// keeps headless drivers and tests free of wall-clock sleeps.
#[derive(Debug, Clone, Default)]
pub struct ManualScheduler {
    timers: Arc<Mutex<Vec<ManualTimer>>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of timers ever armed.
    pub fn scheduled_count(&self) -> usize {
        self.timers.lock().map(|timers| timers.len()).unwrap_or(0)
    }

    /// Tokens of timers that are neither cancelled nor fired.
    pub fn pending(&self) -> Vec<TimerToken> {
        self.timers
            .lock()
            .map(|timers| {
                timers
                    .iter()
                    .filter(|t| !t.cancelled.load(Ordering::SeqCst) && !t.fired.load(Ordering::SeqCst))
                    .map(|t| t.token)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Delay a pending timer was armed with.
    pub fn delay_of(&self, token: TimerToken) -> Option<Duration> {
        self.timers.lock().ok().and_then(|timers| {
            timers
                .iter()
                .rev()
                .find(|t| t.token == token)
                .map(|t| t.delay)
        })
    }

    pub fn is_cancelled(&self, token: TimerToken) -> bool {
        self.timers
            .lock()
            .map(|timers| {
                timers
                    .iter()
                    .any(|t| t.token == token && t.cancelled.load(Ordering::SeqCst))
            })
            .unwrap_or(false)
    }

    /// Marks every pending timer as fired and returns their tokens so the
    /// caller can deliver them.
    pub fn fire_pending(&self) -> Vec<TimerToken> {
        self.timers
            .lock()
            .map(|timers| {
                timers
                    .iter()
                    .filter(|t| !t.cancelled.load(Ordering::SeqCst) && !t.fired.load(Ordering::SeqCst))
                    .map(|t| {
                        t.fired.store(true, Ordering::SeqCst);
                        t.token
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl TimerScheduler for ManualScheduler {
    fn schedule(&self, delay: Duration, token: TimerToken) -> Box<dyn AsyncHandle> {
        let cancelled = Arc::new(AtomicBool::new(false));
        let fired = Arc::new(AtomicBool::new(false));
        if let Ok(mut timers) = self.timers.lock() {
            timers.push(ManualTimer {
                delay,
                token,
                cancelled: cancelled.clone(),
                fired: fired.clone(),
            });
        }
        Box::new(ManualHandle { cancelled, fired })
    }
}

/// Global runtime instance
static RUNTIME: std::sync::OnceLock<Box<dyn AsyncSpawner>> = std::sync::OnceLock::new();

/// Initialize the runtime with a specific spawner
pub fn init_runtime(spawner: Box<dyn AsyncSpawner>) {
    let _ = RUNTIME.set(spawner);
}

/// Get the global runtime spawner
pub fn runtime() -> &'static dyn AsyncSpawner {
    RUNTIME
        .get_or_init(|| Box::new(spawners::tokio_impl::TokioSpawner))
        .as_ref()
}
