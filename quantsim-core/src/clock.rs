//! Logical and wall clocks with named timers.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::UnixNanos;

/// Callback invoked when a timer fires.
pub type TimerCallback = Rc<dyn Fn(&TimeEvent)>;

/// A single timer firing.
#[derive(Clone)]
pub struct TimeEvent {
    pub name: String,
    pub fire_ts: UnixNanos,
    callback: TimerCallback,
}

impl TimeEvent {
    /// Run the timer's callback with this event.
    pub fn fire(&self) {
        (self.callback)(self);
    }
}

impl fmt::Debug for TimeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimeEvent")
            .field("name", &self.name)
            .field("fire_ts", &self.fire_ts)
            .finish()
    }
}

struct Timer {
    name: String,
    callback: TimerCallback,
    interval_ns: i64,
    next_time_ns: UnixNanos,
    stop_time_ns: Option<UnixNanos>,
}

/// Read/installation surface shared by the test and live clocks.
pub trait Clock {
    fn timestamp_ns(&self) -> UnixNanos;

    fn timestamp_ms(&self) -> i64 {
        self.timestamp_ns() / 1_000_000
    }

    /// Install (or replace) the named timer.
    fn set_timer(
        &self,
        name: &str,
        interval_ns: i64,
        start_time_ns: Option<UnixNanos>,
        stop_time_ns: Option<UnixNanos>,
        callback: TimerCallback,
    );

    fn cancel_timer(&self, name: &str);

    fn timer_names(&self) -> Vec<String>;
}

/// Deterministic clock driven by `advance_to` from the backtest loop.
pub struct TestClock {
    time_ns: Cell<UnixNanos>,
    timers: RefCell<Vec<Timer>>,
}

impl TestClock {
    pub fn new(initial_ns: UnixNanos) -> Self {
        Self {
            time_ns: Cell::new(initial_ns),
            timers: RefCell::new(Vec::new()),
        }
    }

    /// Advance to `to_time_ns`, returning every timer event with a nominal
    /// fire time in `(now, to_time_ns]` in non-decreasing `fire_ts` order
    /// (ties by timer installation order).
    ///
    /// Advancing to the current time or earlier fires nothing and leaves
    /// the clock unchanged, so repeated calls are idempotent.
    pub fn advance_to(&self, to_time_ns: UnixNanos) -> Vec<TimeEvent> {
        if to_time_ns <= self.time_ns.get() {
            return Vec::new();
        }

        let mut events = Vec::new();
        {
            let mut timers = self.timers.borrow_mut();
            for timer in timers.iter_mut() {
                // One event per nominal tick, even when the advance spans
                // several intervals.
                while timer.next_time_ns <= to_time_ns {
                    if let Some(stop) = timer.stop_time_ns {
                        if timer.next_time_ns > stop {
                            break;
                        }
                    }
                    events.push(TimeEvent {
                        name: timer.name.clone(),
                        fire_ts: timer.next_time_ns,
                        callback: Rc::clone(&timer.callback),
                    });
                    timer.next_time_ns += timer.interval_ns;
                }
            }
            timers.retain(|t| match t.stop_time_ns {
                Some(stop) => t.next_time_ns <= stop,
                None => true,
            });
        }

        self.time_ns.set(to_time_ns);
        // Stable sort keeps installation order for equal fire times.
        events.sort_by_key(|e| e.fire_ts);
        events
    }
}

impl Clock for TestClock {
    fn timestamp_ns(&self) -> UnixNanos {
        self.time_ns.get()
    }

    fn set_timer(
        &self,
        name: &str,
        interval_ns: i64,
        start_time_ns: Option<UnixNanos>,
        stop_time_ns: Option<UnixNanos>,
        callback: TimerCallback,
    ) {
        assert!(interval_ns > 0, "timer interval must be positive");
        let start = start_time_ns.unwrap_or_else(|| self.time_ns.get());
        let mut timers = self.timers.borrow_mut();
        timers.retain(|t| t.name != name);
        timers.push(Timer {
            name: name.to_string(),
            callback,
            interval_ns,
            next_time_ns: start + interval_ns,
            stop_time_ns,
        });
    }

    fn cancel_timer(&self, name: &str) {
        self.timers.borrow_mut().retain(|t| t.name != name);
    }

    fn timer_names(&self) -> Vec<String> {
        self.timers.borrow().iter().map(|t| t.name.clone()).collect()
    }
}

impl Default for TestClock {
    fn default() -> Self {
        Self::new(0)
    }
}

/// Wall clock. Timers can be installed but nothing drives them here; the
/// live scheduling loop is outside this crate.
#[derive(Default)]
pub struct LiveClock {
    timers: RefCell<Vec<Timer>>,
}

impl LiveClock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clock for LiveClock {
    fn timestamp_ns(&self) -> UnixNanos {
        // Saturates if the platform clock overflows i64 nanoseconds (year 2262).
        chrono::Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX)
    }

    fn set_timer(
        &self,
        name: &str,
        interval_ns: i64,
        start_time_ns: Option<UnixNanos>,
        stop_time_ns: Option<UnixNanos>,
        callback: TimerCallback,
    ) {
        assert!(interval_ns > 0, "timer interval must be positive");
        let start = start_time_ns.unwrap_or_else(|| self.timestamp_ns());
        let mut timers = self.timers.borrow_mut();
        timers.retain(|t| t.name != name);
        timers.push(Timer {
            name: name.to_string(),
            callback,
            interval_ns,
            next_time_ns: start + interval_ns,
            stop_time_ns,
        });
    }

    fn cancel_timer(&self, name: &str) {
        self.timers.borrow_mut().retain(|t| t.name != name);
    }

    fn timer_names(&self) -> Vec<String> {
        self.timers.borrow().iter().map(|t| t.name.clone()).collect()
    }
}
