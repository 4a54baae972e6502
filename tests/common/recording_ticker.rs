use leptos_keycloak_session::{OnTick, RefreshTicker, TickerHandle};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Ticker which never ticks on its own, but records how it was started and stopped.
#[derive(Clone, Default)]
pub struct RecordingTicker {
    started: Arc<Mutex<Vec<Duration>>>,
    stopped: Arc<AtomicUsize>,
    last_on_tick: Arc<Mutex<Option<OnTick>>>,
}

impl RecordingTicker {
    pub fn started(&self) -> Vec<Duration> {
        self.started.lock().expect("not poisoned").clone()
    }

    pub fn stopped(&self) -> usize {
        self.stopped.load(Ordering::SeqCst)
    }

    pub fn running(&self) -> usize {
        self.started().len() - self.stopped()
    }

    /// Run the callback of the most recently started timer, as if its period elapsed.
    ///
    /// Also works after the timer was stopped, mimicking a tick which was already queued.
    pub fn fire(&self) {
        let on_tick = self.last_on_tick.lock().expect("not poisoned").clone();
        match on_tick {
            Some(on_tick) => on_tick(),
            None => panic!("no timer was ever started"),
        }
    }
}

impl RefreshTicker for RecordingTicker {
    fn start(&self, period: Duration, on_tick: OnTick) -> TickerHandle {
        self.started.lock().expect("not poisoned").push(period);
        *self.last_on_tick.lock().expect("not poisoned") = Some(on_tick);
        let stopped = self.stopped.clone();
        TickerHandle::new(move || {
            stopped.fetch_add(1, Ordering::SeqCst);
        })
    }
}
