use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use std::time::Duration;

/// Callback invoked on every tick of a refresh timer.
pub type OnTick = Arc<dyn Fn() + Send + Sync>;

/// Drives the periodic token refresh of a `SessionManager`.
///
/// The default implementation is `IntervalTicker`, backed by a browser interval.
/// Substitute your own to control time, e.g. in tests.
pub trait RefreshTicker: Send + Sync + 'static {
    /// Start calling `on_tick` every `period` until the returned handle is stopped or dropped.
    fn start(&self, period: Duration, on_tick: OnTick) -> TickerHandle;
}

/// Owned handle of a running refresh timer. Stops the timer when stopped or dropped.
pub struct TickerHandle {
    stop: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Debug for TickerHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TickerHandle")
            .field("running", &self.stop.is_some())
            .finish()
    }
}

impl TickerHandle {
    pub fn new(stop: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            stop: Some(Box::new(stop)),
        }
    }

    /// A handle with nothing to stop. Used when no timer could be started.
    pub fn detached() -> Self {
        Self { stop: None }
    }

    pub fn stop(mut self) {
        self.stop_inner();
    }

    fn stop_inner(&mut self) {
        if let Some(stop) = self.stop.take() {
            tracing::trace!("Stopping refresh timer");
            stop();
        }
    }
}

impl Drop for TickerHandle {
    fn drop(&mut self) {
        self.stop_inner();
    }
}

/// Browser interval based ticker.
///
/// Only functional on the client (wasm). The interval is paused when the handle is stopped.
#[derive(Debug, Default, Clone, Copy)]
pub struct IntervalTicker;

impl RefreshTicker for IntervalTicker {
    fn start(&self, period: Duration, on_tick: OnTick) -> TickerHandle {
        let millis = u64::try_from(period.as_millis()).unwrap_or(u64::MAX);
        let leptos_use::utils::Pausable { pause, .. } =
            leptos_use::use_interval_fn(move || on_tick(), millis);
        TickerHandle::new(pause)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assertr::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn dropping_the_handle_stops_the_timer() {
        let stops = Arc::new(AtomicUsize::new(0));
        let handle = {
            let stops = stops.clone();
            TickerHandle::new(move || {
                stops.fetch_add(1, Ordering::SeqCst);
            })
        };
        drop(handle);
        assert_that(stops.load(Ordering::SeqCst)).is_equal_to(1);
    }

    #[test]
    fn explicit_stop_only_stops_once() {
        let stops = Arc::new(AtomicUsize::new(0));
        let handle = {
            let stops = stops.clone();
            TickerHandle::new(move || {
                stops.fetch_add(1, Ordering::SeqCst);
            })
        };
        handle.stop();
        assert_that(stops.load(Ordering::SeqCst)).is_equal_to(1);
    }

    #[test]
    fn detached_handle_stops_nothing() {
        let handle = TickerHandle::detached();
        assert_that(format!("{handle:?}").contains("running: false")).is_true();
        handle.stop();
    }
}
